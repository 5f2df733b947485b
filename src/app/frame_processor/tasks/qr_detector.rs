// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection task
//!
//! This module implements QR code detection using the rqrr crate.
//! Camera frames are reduced to an 8-bit luma image (downscaled for speed)
//! and searched for QR symbols, returning their decoded content.

use crate::backends::camera::types::{FrameBuffer, PixelFormat};
use crate::constants::analysis;
use crate::errors::DecodeError;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use tracing::{debug, trace};

/// A decoded symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Raw payload text
    pub content: String,
}

/// Barcode decoding engine
///
/// Implementations receive a prepared luma image and return every symbol
/// they could read, in detection order. Returning `Err` means symbols were
/// found but none could be read; the caller treats it like "no code".
pub trait Decoder: Send {
    fn decode(&mut self, image: &GrayImage) -> Result<Vec<Decoded>, DecodeError>;
}

/// QR decoder backed by rqrr
#[derive(Debug, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for RqrrDecoder {
    fn decode(&mut self, image: &GrayImage) -> Result<Vec<Decoded>, DecodeError> {
        let start = std::time::Instant::now();
        let (width, height) = image.dimensions();

        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                image.get_pixel(x as u32, y as u32).0[0]
            });
        let grids = prepared.detect_grids();

        trace!(
            grids = grids.len(),
            detection_ms = start.elapsed().as_millis(),
            "QR grid detection complete"
        );

        let mut decoded = Vec::with_capacity(grids.len());
        let mut last_error = None;

        for grid in grids {
            match grid.decode() {
                Ok((meta, content)) => {
                    debug!(
                        version = meta.version.0,
                        ecc_level = meta.ecc_level,
                        length = content.len(),
                        "Decoded QR code"
                    );
                    decoded.push(Decoded { content });
                }
                Err(e) => {
                    debug!(error = ?e, "Failed to decode QR grid");
                    last_error = Some(format!("{:?}", e));
                }
            }
        }

        match (decoded.is_empty(), last_error) {
            (true, Some(e)) => Err(DecodeError::Corrupt(e)),
            _ => Ok(decoded),
        }
    }
}

/// Convert a frame to a luma image no larger than `max_dimension`
///
/// Only the luma plane of YUV formats is read; RGB formats use BT.601
/// weights. Row padding (stride) is skipped.
pub fn frame_to_luma(frame: &FrameBuffer, max_dimension: u32) -> Result<GrayImage, DecodeError> {
    if !frame.is_complete() {
        return Err(DecodeError::InvalidFrame(format!(
            "{}x{} {} (stride {}) needs {} bytes, got {}",
            frame.width,
            frame.height,
            frame.format,
            frame.stride,
            frame.expected_len(),
            frame.data.len()
        )));
    }

    let luma = GrayImage::from_fn(frame.width, frame.height, |x, y| {
        Luma([luma_at(frame, x, y)])
    });

    let max_dimension = max_dimension.max(analysis::MIN_DIMENSION);
    let (width, height) = luma.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return Ok(luma);
    }

    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let new_width = ((width as f32 / scale) as u32).max(1);
    let new_height = ((height as f32 / scale) as u32).max(1);
    trace!(width, height, new_width, new_height, "Downscaling frame for analysis");

    Ok(imageops::resize(&luma, new_width, new_height, FilterType::Triangle))
}

/// Luma of one pixel; callers guarantee the buffer is complete
fn luma_at(frame: &FrameBuffer, x: u32, y: u32) -> u8 {
    let data = &frame.data;
    let row = y as usize * frame.stride as usize;
    let x = x as usize;

    match frame.format {
        PixelFormat::Gray8 | PixelFormat::NV12 | PixelFormat::NV21 | PixelFormat::I420 => {
            data[row + x]
        }
        PixelFormat::RGBA => {
            let i = row + x * 4;
            rgb_to_luma(data[i], data[i + 1], data[i + 2])
        }
        PixelFormat::BGRA => {
            let i = row + x * 4;
            rgb_to_luma(data[i + 2], data[i + 1], data[i])
        }
        PixelFormat::RGB24 => {
            let i = row + x * 3;
            rgb_to_luma(data[i], data[i + 1], data[i + 2])
        }
        // Y0 U Y1 V / Y0 V Y1 U: luma on even bytes
        PixelFormat::YUYV | PixelFormat::YVYU => data[row + x * 2],
        // U Y0 V Y1 / V Y0 U Y1: luma on odd bytes
        PixelFormat::UYVY | PixelFormat::VYUY => data[row + x * 2 + 1],
    }
}

/// BT.601 luma from 8-bit RGB
fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_skips_stride_padding() {
        // 2x2 RGBA frame with 2 bytes of padding per row
        let data: Vec<u8> = vec![
            255, 255, 255, 255, // White pixel
            0, 0, 0, 255, // Black pixel
            9, 9, // stride padding
            0, 0, 0, 255, // Black pixel
            255, 255, 255, 255, // White pixel
            9, 9, // stride padding
        ];
        let frame = FrameBuffer::new(2, 2, PixelFormat::RGBA, data).with_stride(10);

        let luma = frame_to_luma(&frame, 640).unwrap();
        assert_eq!(luma.dimensions(), (2, 2));
        assert_eq!(luma.get_pixel(0, 0).0[0], 255);
        assert_eq!(luma.get_pixel(1, 0).0[0], 0);
        assert_eq!(luma.get_pixel(0, 1).0[0], 0);
        assert_eq!(luma.get_pixel(1, 1).0[0], 255);
    }

    #[test]
    fn test_luma_from_packed_yuv() {
        // One row, two pixels: Y0=10 U=128 Y1=200 V=128
        let yuyv = FrameBuffer::new(2, 1, PixelFormat::YUYV, vec![10, 128, 200, 128]);
        let luma = frame_to_luma(&yuyv, 640).unwrap();
        assert_eq!(luma.as_raw(), &vec![10, 200]);

        let uyvy = FrameBuffer::new(2, 1, PixelFormat::UYVY, vec![128, 10, 128, 200]);
        let luma = frame_to_luma(&uyvy, 640).unwrap();
        assert_eq!(luma.as_raw(), &vec![10, 200]);
    }

    #[test]
    fn test_luma_from_nv12_reads_y_plane_only() {
        let mut data = vec![42u8; 4 * 2];
        data.extend_from_slice(&[0u8; 4]); // UV plane
        let frame = FrameBuffer::new(4, 2, PixelFormat::NV12, data);

        let luma = frame_to_luma(&frame, 640).unwrap();
        assert!(luma.pixels().all(|p| p.0[0] == 42));
    }

    #[test]
    fn test_bgra_channel_order() {
        // Pure blue in BGRA and RGBA must give the same luma
        let bgra = FrameBuffer::new(1, 1, PixelFormat::BGRA, vec![255, 0, 0, 255]);
        let rgba = FrameBuffer::new(1, 1, PixelFormat::RGBA, vec![0, 0, 255, 255]);
        assert_eq!(
            frame_to_luma(&bgra, 640).unwrap().as_raw(),
            frame_to_luma(&rgba, 640).unwrap().as_raw()
        );
    }

    #[test]
    fn test_downscale_to_max_dimension() {
        let frame = FrameBuffer::new(1280, 720, PixelFormat::Gray8, vec![128u8; 1280 * 720]);
        let luma = frame_to_luma(&frame, 640).unwrap();
        assert_eq!(luma.dimensions(), (640, 360));
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let frame = FrameBuffer::new(4, 4, PixelFormat::RGBA, vec![0u8; 10]);
        assert!(matches!(
            frame_to_luma(&frame, 640),
            Err(DecodeError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_blank_image_has_no_codes() {
        let image = GrayImage::from_pixel(64, 64, Luma([255]));
        let decoded = RqrrDecoder::new().decode(&image).unwrap();
        assert!(decoded.is_empty());
    }
}
