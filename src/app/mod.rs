// SPDX-License-Identifier: GPL-3.0-only

//! Scanner application logic
//!
//! # Architecture
//!
//! - `frame_processor`: Frame analysis (QR decoding) and the keep-latest frame channel
//! - `session`: Camera lifecycle with preview and analysis outputs
//! - `coordinator`: Scanning/displaying state machine and torch state
//! - `presenter`: Result dialog actions (copy, open, scan again)
//!
//! The terminal screen in [`crate::terminal`] drives these.

pub mod coordinator;
pub mod frame_processor;
pub mod presenter;
pub mod session;

pub use coordinator::{ScanCoordinator, ScanGate, ScanState, TorchState};
pub use presenter::{
    Clipboard, DialogAction, Osc52Clipboard, PresenterOutcome, ResultPresenter, SystemOpener,
    UrlOpener,
};
pub use session::{CameraControl, CaptureSession, SessionStats};
