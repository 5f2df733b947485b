// SPDX-License-Identifier: GPL-3.0-only

//! Still image camera source
//!
//! Serves decoded image files as a camera stream, paced like a real camera.
//! Useful for scanning a screenshot or photo through the same pipeline, and
//! for exercising the pipeline without hardware.

use super::CameraSource;
use super::types::*;
use crate::constants::capture;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// A camera source backed by in-memory frames
pub struct StillImageSource {
    name: String,
    frames: Vec<FrameBuffer>,
    interval: Duration,
    looping: bool,
    position: usize,
    started: bool,
}

impl StillImageSource {
    /// Decode image files into RGBA frames
    ///
    /// Frames repeat until the session ends.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> BackendResult<Self> {
        if paths.is_empty() {
            return Err(BackendError::DeviceNotFound("no image files given".into()));
        }

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let rgba = image::open(path)
                .map_err(|e| {
                    BackendError::InitializationFailed(format!(
                        "failed to load {}: {}",
                        path.display(),
                        e
                    ))
                })?
                .to_rgba8();
            let (width, height) = rgba.dimensions();
            debug!(path = %path.display(), width, height, "Loaded still image");
            frames.push(FrameBuffer::new(width, height, PixelFormat::RGBA, rgba.into_raw()));
        }

        let name = match paths {
            [single] => single.as_ref().display().to_string(),
            _ => format!("{} images", paths.len()),
        };
        Ok(Self::from_frames(name, frames))
    }

    /// Serve prepared frames, looping until the session ends
    pub fn from_frames(name: impl Into<String>, frames: Vec<FrameBuffer>) -> Self {
        Self {
            name: name.into(),
            frames,
            interval: capture::STILL_FRAME_INTERVAL,
            looping: true,
            position: 0,
            started: false,
        }
    }

    /// Delay between frames
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Serve each frame once, then report the stream as disconnected
    pub fn once(mut self) -> Self {
        self.looping = false;
        self
    }
}

impl CameraSource for StillImageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> BackendResult<()> {
        if self.frames.is_empty() {
            return Err(BackendError::InitializationFailed(
                "still image source has no frames".into(),
            ));
        }
        info!(name = %self.name, frames = self.frames.len(), "Still image source started");
        self.position = 0;
        self.started = true;
        Ok(())
    }

    fn next_frame(&mut self) -> BackendResult<CameraFrame> {
        if !self.started {
            return Err(BackendError::Disconnected);
        }

        if self.position >= self.frames.len() {
            if !self.looping {
                debug!(name = %self.name, "Still image source exhausted");
                return Err(BackendError::Disconnected);
            }
            self.position = 0;
        }

        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }

        let mut buffer = self.frames[self.position].clone();
        buffer.captured_at = std::time::Instant::now();
        self.position += 1;
        Ok(CameraFrame::new(buffer))
    }

    fn stop(&mut self) {
        self.started = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(value: u8) -> FrameBuffer {
        FrameBuffer::new(2, 2, PixelFormat::Gray8, vec![value; 4])
    }

    #[test]
    fn test_frames_loop() {
        let mut source = StillImageSource::from_frames("test", vec![gray(1), gray(2)])
            .with_interval(Duration::ZERO);
        source.start().unwrap();

        let values: Vec<u8> = (0..5)
            .map(|_| source.next_frame().unwrap().data[0])
            .collect();
        assert_eq!(values, vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_once_disconnects_when_exhausted() {
        let mut source = StillImageSource::from_frames("test", vec![gray(9)])
            .with_interval(Duration::ZERO)
            .once();
        source.start().unwrap();

        assert!(source.next_frame().is_ok());
        assert!(matches!(source.next_frame(), Err(BackendError::Disconnected)));
    }

    #[test]
    fn test_empty_source_fails_to_start() {
        let mut source = StillImageSource::from_frames("empty", Vec::new());
        assert!(matches!(
            source.start(),
            Err(BackendError::InitializationFailed(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = StillImageSource::from_paths(&["/nonexistent/code.png"]);
        assert!(matches!(result, Err(BackendError::InitializationFailed(_))));
    }
}
