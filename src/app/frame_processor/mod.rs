// SPDX-License-Identifier: GPL-3.0-only

//! Frame processor module for frame analysis
//!
//! Frames flow from the capture thread through a keep-only-latest channel
//! ([`latest`]) into a single [`FrameAnalyzer`], which decodes QR codes and
//! reports the first payload it finds as a [`ScanResult`].

pub mod analyzer;
pub mod latest;
pub mod tasks;
pub mod types;

pub use analyzer::{AnalysisOutcome, FrameAnalyzer};
pub use tasks::qr_detector::{self, Decoded, Decoder, RqrrDecoder};
pub use types::{ScanResult, is_url};
