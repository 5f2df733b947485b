// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use qr_scanner::backends::camera::PixelFormat;
use qr_scanner::constants::{analysis, capture, ui};

#[test]
fn test_analysis_bounds() {
    assert!(analysis::MIN_DIMENSION <= analysis::MAX_DIMENSION);
    assert!(analysis::MAX_DIMENSION <= capture::DEFAULT_WIDTH.max(capture::DEFAULT_HEIGHT));
}

#[test]
fn test_scan_window_fits_preview() {
    assert!(ui::SCAN_WINDOW_FRACTION > 0.0 && ui::SCAN_WINDOW_FRACTION < 1.0);
    assert!(ui::OVERLAY_DIM > 0.0 && ui::OVERLAY_DIM < 1.0);
}

#[test]
fn test_preferred_fourccs_are_readable() {
    // Everything except MJPEG must map straight to a pixel format
    for fourcc in capture::PREFERRED_FOURCC {
        if fourcc == b"MJPG" {
            continue;
        }
        assert!(
            PixelFormat::from_fourcc(fourcc).is_some(),
            "{} has no pixel format",
            String::from_utf8_lossy(fourcc)
        );
    }
}

#[test]
fn test_titles() {
    assert_eq!(ui::TITLE, "QR Scanner");
    assert_eq!(ui::DIALOG_TITLE, "Scan result");
}
