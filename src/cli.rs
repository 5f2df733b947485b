// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Decoding QR codes from image files

use qr_scanner::app::frame_processor::{AnalysisOutcome, FrameAnalyzer};
use qr_scanner::backends::camera::types::{CameraFrame, FrameBuffer, PixelFormat};
use qr_scanner::backends::camera::v4l2::{enumerate_cameras, list_formats};
use std::path::{Path, PathBuf};
use tracing::warn;

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Device: {} ({})", camera.path, camera.driver);

        let formats = match list_formats(Path::new(&camera.path)) {
            Ok(formats) => formats,
            Err(e) => {
                warn!(path = %camera.path, error = %e, "Could not query formats");
                Vec::new()
            }
        };
        if !formats.is_empty() {
            // Group by resolution, remembering which FourCCs offer it
            let mut resolutions: Vec<(u32, u32, Vec<String>)> = Vec::new();
            for format in &formats {
                if let Some(existing) = resolutions
                    .iter_mut()
                    .find(|(w, h, _)| *w == format.width && *h == format.height)
                {
                    if !existing.2.contains(&format.pixel_format) {
                        existing.2.push(format.pixel_format.clone());
                    }
                } else {
                    resolutions.push((
                        format.width,
                        format.height,
                        vec![format.pixel_format.clone()],
                    ));
                }
            }

            // Sort by resolution (highest first)
            resolutions.sort_by(|a, b| (b.0 * b.1).cmp(&(a.0 * a.1)));

            let res_strs: Vec<String> = resolutions
                .iter()
                .take(3)
                .map(|(w, h, fourccs)| format!("{}x{} {}", w, h, fourccs.join("/")))
                .collect();

            println!("      Formats: {}", res_strs.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Decode each image file once and print the first QR payload found
///
/// Fails if no file yielded a code, so scripts can test the exit status.
pub fn decode_images(
    paths: &[PathBuf],
    max_dimension: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut analyzer = FrameAnalyzer::new().with_max_dimension(max_dimension);
    let mut found_any = false;

    for path in paths {
        let frame = match load_frame(path) {
            Ok(frame) => frame,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                continue;
            }
        };

        let mut decoded = None;
        let outcome = analyzer.analyze(frame, |result| decoded = Some(result));

        match (outcome, decoded) {
            (AnalysisOutcome::Decoded, Some(result)) => {
                found_any = true;
                if paths.len() > 1 {
                    println!("{}: {}", path.display(), result);
                } else {
                    println!("{}", result);
                }
            }
            (AnalysisOutcome::Failed(e), _) => {
                eprintln!("{}: could not decode ({})", path.display(), e);
            }
            _ => eprintln!("{}: no QR code found", path.display()),
        }
    }

    if found_any {
        Ok(())
    } else {
        Err("no QR code found".into())
    }
}

fn load_frame(path: &Path) -> Result<CameraFrame, image::ImageError> {
    let rgba = image::open(path)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(CameraFrame::new(FrameBuffer::new(
        width,
        height,
        PixelFormat::RGBA,
        rgba.into_raw(),
    )))
}
