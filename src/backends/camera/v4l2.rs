// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture
//!
//! Uses the v4l crate to enumerate capture devices and stream frames from
//! memory-mapped buffers. Raw formats are copied out as-is; MJPEG frames are
//! decoded to RGBA on the capture thread so the rest of the pipeline only
//! deals with uncompressed pixels.

use super::CameraSource;
use super::types::*;
use crate::constants::capture;
use crate::flash::{NoTorch, SysfsTorch, TorchControl};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::frameinterval::FrameIntervalEnum;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

const MJPG: &[u8; 4] = b"MJPG";

/// List V4L2 video capture devices
///
/// Metadata-only nodes (UVC cameras expose two per device) are skipped.
pub fn enumerate_cameras() -> Vec<CameraDevice> {
    let mut cameras: Vec<CameraDevice> = v4l::context::enum_devices()
        .into_iter()
        .filter_map(|node| {
            let path = node.path().to_string_lossy().to_string();
            let dev = match Device::with_path(node.path()) {
                Ok(dev) => dev,
                Err(e) => {
                    debug!(path = %path, error = %e, "Skipping unopenable video node");
                    return None;
                }
            };
            let caps = dev.query_caps().ok()?;
            if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                debug!(path = %path, "Skipping node without video capture");
                return None;
            }
            Some(CameraDevice {
                name: caps.card,
                path,
                driver: caps.driver,
                bus: caps.bus,
            })
        })
        .collect();

    cameras.sort_by(|a, b| a.path.cmp(&b.path));
    cameras
}

/// Formats a device offers, with their discrete frame sizes
pub fn list_formats(path: &Path) -> BackendResult<Vec<CameraFormat>> {
    let dev = Device::with_path(path)?;
    let mut formats = Vec::new();

    for desc in dev.enum_formats()? {
        let fourcc = String::from_utf8_lossy(&desc.fourcc.repr).to_string();
        let sizes = dev.enum_framesizes(desc.fourcc).unwrap_or_default();
        for size in sizes {
            // Stepwise ranges are skipped; webcams list discrete sizes
            let FrameSizeEnum::Discrete(discrete) = size.size else {
                continue;
            };

            let framerate = dev
                .enum_frameintervals(desc.fourcc, discrete.width, discrete.height)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|interval| match interval.interval {
                    FrameIntervalEnum::Discrete(frac) if frac.numerator > 0 => {
                        Some(Framerate::new(frac.denominator, frac.numerator))
                    }
                    _ => None,
                })
                .max_by(|a, b| a.as_f64().total_cmp(&b.as_f64()));

            formats.push(CameraFormat {
                width: discrete.width,
                height: discrete.height,
                framerate,
                pixel_format: fourcc.clone(),
            });
        }
    }

    Ok(formats)
}

/// Open stream state, created by `start`
struct Streaming {
    stream: MmapStream<'static>,
    width: u32,
    height: u32,
    stride: u32,
    /// `None` for MJPEG
    pixel_format: Option<PixelFormat>,
}

/// Camera source reading a V4L2 device node
pub struct V4l2Source {
    path: String,
    name: String,
    width: u32,
    height: u32,
    streaming: Option<Streaming>,
}

impl V4l2Source {
    /// Source for `path`, requesting `width`x`height`
    ///
    /// The driver may pick a different size; the frames report what was
    /// actually negotiated.
    pub fn new(path: impl Into<String>, width: u32, height: u32) -> Self {
        let path = path.into();
        Self {
            name: path.clone(),
            path,
            width,
            height,
            streaming: None,
        }
    }

    /// Pick the FourCC to request: preferred list first, then anything we can read
    fn choose_fourcc(dev: &Device) -> BackendResult<FourCC> {
        let offered: Vec<FourCC> = dev.enum_formats()?.into_iter().map(|d| d.fourcc).collect();

        for preferred in capture::PREFERRED_FOURCC {
            if let Some(fourcc) = offered.iter().find(|f| &f.repr == preferred) {
                return Ok(*fourcc);
            }
        }

        offered
            .into_iter()
            .find(|f| PixelFormat::from_fourcc(&f.repr).is_some())
            .ok_or_else(|| {
                BackendError::FormatNotSupported("device offers no readable pixel format".into())
            })
    }

    fn negotiate(&self, dev: &Device) -> BackendResult<Format> {
        let fourcc = Self::choose_fourcc(dev)?;
        let mut format = dev.format()?;
        format.width = self.width;
        format.height = self.height;
        format.fourcc = fourcc;

        let applied = dev.set_format(&format)?;
        if applied.fourcc != fourcc {
            warn!(
                requested = %fourcc,
                got = %applied.fourcc,
                "Driver substituted pixel format"
            );
        }
        Ok(applied)
    }

    fn decode_mjpeg(data: &[u8], captured_at: std::time::Instant) -> BackendResult<FrameBuffer> {
        let rgba = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
            .map_err(|e| BackendError::Other(format!("MJPEG decode failed: {}", e)))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut buffer = FrameBuffer::new(width, height, PixelFormat::RGBA, rgba.into_raw());
        buffer.captured_at = captured_at;
        Ok(buffer)
    }
}

impl CameraSource for V4l2Source {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> BackendResult<()> {
        info!(path = %self.path, width = self.width, height = self.height, "Opening V4L2 device");

        let mut dev = Device::with_path(&self.path)?;
        let format = self.negotiate(&dev)?;

        let pixel_format = if &format.fourcc.repr == MJPG {
            None
        } else {
            Some(PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
                BackendError::FormatNotSupported(format!("unsupported fourcc {}", format.fourcc))
            })?)
        };

        let stream = MmapStream::with_buffers(&mut dev, Type::VideoCapture, capture::V4L2_BUFFER_COUNT)
            .map_err(|e| {
                BackendError::InitializationFailed(format!("failed to create buffer stream: {}", e))
            })?;

        info!(
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            stride = format.stride,
            "V4L2 capture stream started"
        );

        self.streaming = Some(Streaming {
            stream,
            width: format.width,
            height: format.height,
            stride: format.stride,
            pixel_format,
        });
        Ok(())
    }

    fn next_frame(&mut self) -> BackendResult<CameraFrame> {
        let streaming = self.streaming.as_mut().ok_or(BackendError::Disconnected)?;
        let captured_at = std::time::Instant::now();

        let (buf, meta) = streaming.stream.next().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::BrokenPipe => {
                BackendError::Disconnected
            }
            _ => BackendError::IoError(e.to_string()),
        })?;

        let used = (meta.bytesused as usize).min(buf.len());
        let data = &buf[..used];

        let buffer = match streaming.pixel_format {
            None => Self::decode_mjpeg(data, captured_at)?,
            Some(format) => FrameBuffer {
                width: streaming.width,
                height: streaming.height,
                stride: streaming.stride,
                format,
                data: Arc::from(data),
                captured_at,
            },
        };

        Ok(CameraFrame::new(buffer))
    }

    fn stop(&mut self) {
        if self.streaming.take().is_some() {
            info!(path = %self.path, "V4L2 capture stream stopped");
        }
    }

    fn torch(&self) -> Arc<dyn TorchControl> {
        let torch = SysfsTorch::detect();
        if torch.is_available() {
            Arc::new(torch)
        } else {
            Arc::new(NoTorch)
        }
    }
}
