// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← Lifecycle, preview + analysis outputs
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraSource trait │  ← Common interface
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌──────┐  ┌───────────┐
//!   │ V4L2 │  │Still image│
//!   └──────┘  └───────────┘
//! ```

pub mod frame_loop;
pub mod permission;
pub mod still;
pub mod types;
pub mod v4l2;

pub use frame_loop::{CaptureLoopController, LoopAction};
pub use permission::CameraPermission;
pub use still::StillImageSource;
pub use types::*;
pub use v4l2::V4l2Source;

use crate::flash::{NoTorch, TorchControl};
use std::sync::Arc;

/// A producer of camera frames
///
/// `start` runs on the caller's thread so binding failures surface
/// synchronously; afterwards the source is moved to the capture thread and
/// `next_frame` is called in a loop until it fails with
/// [`BackendError::Disconnected`] or the session ends. `stop` runs on the
/// capture thread when the loop exits.
pub trait CameraSource: Send {
    /// Human-readable source name for logs and the status line
    fn name(&self) -> &str;

    /// Open the device and start streaming
    fn start(&mut self) -> BackendResult<()>;

    /// Block until the next frame is available
    fn next_frame(&mut self) -> BackendResult<CameraFrame>;

    /// Stop streaming and close the device
    fn stop(&mut self) {}

    /// Torch associated with this camera
    fn torch(&self) -> Arc<dyn TorchControl> {
        Arc::new(NoTorch)
    }
}

impl<T: CameraSource + ?Sized> CameraSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&mut self) -> BackendResult<()> {
        (**self).start()
    }

    fn next_frame(&mut self) -> BackendResult<CameraFrame> {
        (**self).next_frame()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn torch(&self) -> Arc<dyn TorchControl> {
        (**self).torch()
    }
}
