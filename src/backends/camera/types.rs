// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Pixel format for camera frames
///
/// Covers the formats V4L2 webcams commonly deliver plus the RGB layouts
/// produced by decoded still images. The analyzer only needs luma, so the
/// YUV formats are never converted to RGB for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// BGRA - 32-bit with alpha (B G R A byte order)
    BGRA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// NV12 - Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    NV12,
    /// NV21 - Semi-planar 4:2:0 (Y plane + interleaved VU plane)
    NV21,
    /// I420 - Planar 4:2:0 (separate Y, U, V planes)
    I420,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    /// Common raw format from webcam sensors
    YUYV,
    /// UYVY - Packed 4:2:2 (U Y0 V Y1 interleaved)
    UYVY,
    /// YVYU - Packed 4:2:2 (Y0 V Y1 U interleaved)
    YVYU,
    /// VYUY - Packed 4:2:2 (V Y0 U Y1 interleaved)
    VYUY,
}

impl PixelFormat {
    /// Bytes per pixel in the first (luma or packed) plane
    pub fn row_bytes_per_pixel(&self) -> u32 {
        match self {
            Self::RGBA | Self::BGRA => 4,
            Self::RGB24 => 3,
            Self::YUYV | Self::UYVY | Self::YVYU | Self::VYUY => 2,
            Self::Gray8 | Self::NV12 | Self::NV21 | Self::I420 => 1,
        }
    }

    /// Parse format from a V4L2 FourCC code
    ///
    /// MJPEG is handled by the V4L2 source itself (decoded to RGBA) and is
    /// therefore not a `PixelFormat`.
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"YUYV" => Some(Self::YUYV),
            b"UYVY" => Some(Self::UYVY),
            b"YVYU" => Some(Self::YVYU),
            b"VYUY" => Some(Self::VYUY),
            b"NV12" => Some(Self::NV12),
            b"NV21" => Some(Self::NV21),
            b"YU12" => Some(Self::I420),
            b"GREY" => Some(Self::Gray8),
            b"RGB3" => Some(Self::RGB24),
            b"AB24" => Some(Self::RGBA),
            b"AR24" => Some(Self::BGRA),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RGBA => "RGBA",
            Self::BGRA => "BGRA",
            Self::RGB24 => "RGB24",
            Self::Gray8 => "GRAY8",
            Self::NV12 => "NV12",
            Self::NV21 => "NV21",
            Self::I420 => "I420",
            Self::YUYV => "YUYV",
            Self::UYVY => "UYVY",
            Self::YVYU => "YVYU",
            Self::VYUY => "VYUY",
        };
        f.write_str(name)
    }
}

/// Pixel data and geometry of one captured image
///
/// Cloning is cheap (the bytes are reference counted), which lets the
/// preview stream share the pixels of a frame that is also being analyzed.
#[derive(Clone)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    /// Bytes per row of the first plane, including padding
    pub stride: u32,
    pub format: PixelFormat,
    pub data: Arc<[u8]>,
    pub captured_at: Instant,
}

impl FrameBuffer {
    /// Create a frame buffer with a tightly packed stride
    pub fn new(width: u32, height: u32, format: PixelFormat, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            stride: width * format.row_bytes_per_pixel(),
            format,
            data: data.into(),
            captured_at: Instant::now(),
        }
    }

    /// Override the row stride (for buffers with row padding)
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    /// Minimum number of bytes a buffer of this geometry must hold
    pub fn expected_len(&self) -> usize {
        let luma = self.stride as usize * self.height as usize;
        match self.format {
            PixelFormat::NV12 | PixelFormat::NV21 | PixelFormat::I420 => {
                luma + luma.div_ceil(2)
            }
            _ => luma,
        }
    }

    /// Whether `data` is large enough for the declared geometry
    pub fn is_complete(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.stride >= self.width * self.format.row_bytes_per_pixel()
            && self.data.len() >= self.expected_len()
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Callback run when a frame is released
pub type ReleaseHook = Box<dyn FnOnce() + Send + 'static>;

/// A captured frame in flight between the camera and the analyzer
///
/// The frame carries a release obligation: its hook runs exactly once, when
/// the frame is dropped. Whoever owns the frame last (the analyzer, or the
/// keep-latest slot when a newer frame supersedes it) discharges it simply
/// by letting it go out of scope.
pub struct CameraFrame {
    buffer: FrameBuffer,
    release: Option<ReleaseHook>,
}

impl CameraFrame {
    /// Wrap a buffer with no release hook
    pub fn new(buffer: FrameBuffer) -> Self {
        Self {
            buffer,
            release: None,
        }
    }

    /// Attach a release hook; hooks attached earlier still run, first
    pub fn on_release<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(match self.release.take() {
            Some(previous) => Box::new(move || {
                previous();
                hook();
            }),
            None => Box::new(hook),
        });
        self
    }

    /// Pixel data of this frame
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Release the frame now
    pub fn release(self) {
        drop(self);
    }
}

impl std::ops::Deref for CameraFrame {
    type Target = FrameBuffer;

    fn deref(&self) -> &FrameBuffer {
        &self.buffer
    }
}

impl Drop for CameraFrame {
    fn drop(&mut self) {
        if let Some(hook) = self.release.take() {
            hook();
        }
    }
}

impl fmt::Debug for CameraFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraFrame")
            .field("buffer", &self.buffer)
            .field("pending_release", &self.release.is_some())
            .finish()
    }
}

/// Framerate as a fraction (numerator/denominator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show decimal for non-integer framerates (NTSC)
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

/// Camera format specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: Option<Framerate>,
    /// FourCC code (e.g., "MJPG", "YUYV")
    pub pixel_format: String,
}

impl fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.pixel_format)?;
        if let Some(fps) = &self.framerate {
            write!(f, " @ {}fps", fps)?;
        }
        Ok(())
    }
}

/// Represents a camera device
#[derive(Debug, Clone, Default)]
pub struct CameraDevice {
    /// Name of the device (V4L2 card)
    pub name: String,
    /// Device node (e.g., /dev/video0)
    pub path: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Bus the device is attached to (e.g., usb-0000:00:14.0-1)
    pub bus: String,
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Access to the device node was refused
    PermissionDenied(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// The stream ended or the device went away
    Disconnected,
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::Disconnected => write!(f, "Camera disconnected"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => BackendError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::NotFound => BackendError::DeviceNotFound(err.to_string()),
            _ => BackendError::IoError(err.to_string()),
        }
    }
}
