// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Application identifier (config/cache directory names, log file name)
pub const APP_ID: &str = "qr-scanner";

/// Capture defaults
pub mod capture {
    use super::Duration;

    /// Requested capture width; QR codes decode fine at VGA
    pub const DEFAULT_WIDTH: u32 = 640;

    /// Requested capture height
    pub const DEFAULT_HEIGHT: u32 = 480;

    /// Number of mmap buffers requested from V4L2
    pub const V4L2_BUFFER_COUNT: u32 = 4;

    /// Pause before retrying after a failed frame read
    pub const RETRY_DELAY: Duration = Duration::from_millis(10);

    /// Interval between frames replayed by the still-image source (~15 fps)
    pub const STILL_FRAME_INTERVAL: Duration = Duration::from_millis(66);

    /// Preferred FourCC codes, most preferred first
    pub const PREFERRED_FOURCC: [&[u8; 4]; 3] = [b"YUYV", b"MJPG", b"NV12"];
}

/// Frame analysis defaults
pub mod analysis {
    /// Frames are downscaled so their long edge is at most this many pixels
    pub const MAX_DIMENSION: u32 = 640;

    /// Smallest accepted max dimension (below this QR modules blur together)
    pub const MIN_DIMENSION: u32 = 64;
}

/// Scanner screen layout and timing
pub mod ui {
    use super::Duration;

    /// Input poll timeout per UI tick (~60 Hz redraw)
    pub const TICK: Duration = Duration::from_millis(16);

    /// Side of the scan window as a fraction of the preview's short edge
    pub const SCAN_WINDOW_FRACTION: f32 = 0.7;

    /// Brightness multiplier applied to the preview outside the scan window
    pub const OVERLAY_DIM: f32 = 0.5;

    /// Title shown at the top of the screen
    pub const TITLE: &str = "QR Scanner";

    /// Result dialog title
    pub const DIALOG_TITLE: &str = "Scan result";
}
