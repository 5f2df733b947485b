// SPDX-License-Identifier: GPL-3.0-only

//! QR Scanner - scan QR codes from a camera feed in the terminal
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Frame analysis, scan state machine, capture session, result actions
//! - [`backends`]: Camera sources (V4L2, still images) and capture threading
//! - [`flash`]: Torch control
//! - [`terminal`]: The scanner screen
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let mut coordinator = ScanCoordinator::new();
//! let session = CaptureSession::bind(
//!     V4l2Source::new("/dev/video0", 640, 480),
//!     FrameAnalyzer::new(),
//!     tx,
//!     coordinator.gate(),
//!     runtime.handle(),
//! )?;
//!
//! while let Some(result) = rx.recv().await {
//!     coordinator.on_decoded(result);
//! }
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flash;
pub mod terminal;

// Re-export commonly used types
pub use app::coordinator::{ScanCoordinator, ScanGate, ScanState, TorchState};
pub use app::frame_processor::{FrameAnalyzer, ScanResult};
pub use app::presenter::{DialogAction, PresenterOutcome, ResultPresenter};
pub use app::session::{CameraControl, CaptureSession, SessionStats};
pub use config::Config;
pub use errors::{AppError, AppResult};
