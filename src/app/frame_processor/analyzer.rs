// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame analysis
//!
//! [`FrameAnalyzer`] takes ownership of one frame, decodes it, reports at
//! most one result, and releases the frame before returning. Nothing that
//! goes wrong inside a single analysis escapes it: conversion errors,
//! decoder errors and decoder panics are logged and the frame counts as
//! having no code.

use super::tasks::qr_detector::{Decoder, RqrrDecoder, frame_to_luma};
use super::types::ScanResult;
use crate::backends::camera::types::CameraFrame;
use crate::constants::analysis;
use crate::errors::DecodeError;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, trace, warn};

/// What happened to one analyzed frame
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// A code was decoded and the result callback was invoked
    Decoded,
    /// The frame contained no readable code
    NoCode,
    /// Conversion or decoding failed; treated like `NoCode`
    Failed(DecodeError),
}

/// Decodes camera frames into scan results
pub struct FrameAnalyzer {
    decoder: Box<dyn Decoder>,
    max_dimension: u32,
}

impl Default for FrameAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAnalyzer {
    /// Analyzer using the rqrr QR decoder at the default analysis size
    pub fn new() -> Self {
        Self::with_decoder(RqrrDecoder::new())
    }

    /// Analyzer with a custom decoding engine
    pub fn with_decoder(decoder: impl Decoder + 'static) -> Self {
        Self {
            decoder: Box::new(decoder),
            max_dimension: analysis::MAX_DIMENSION,
        }
    }

    /// Change the long-edge limit frames are downscaled to
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(analysis::MIN_DIMENSION);
        self
    }

    /// Analyze one frame
    ///
    /// `on_result` is called at most once, with the first decoded payload
    /// regardless of how many symbols the frame holds. The frame is released
    /// before this returns, whatever the outcome.
    pub fn analyze<F>(&mut self, frame: CameraFrame, on_result: F) -> AnalysisOutcome
    where
        F: FnOnce(ScanResult),
    {
        let start = std::time::Instant::now();
        let decoded = self.decode_frame(&frame);
        frame.release();

        let outcome = match decoded {
            Ok(Some(text)) => {
                on_result(ScanResult::new(text));
                AnalysisOutcome::Decoded
            }
            Ok(None) => AnalysisOutcome::NoCode,
            Err(e) => {
                warn!(error = %e, "Frame analysis failed");
                AnalysisOutcome::Failed(e)
            }
        };

        trace!(
            outcome = ?outcome,
            elapsed_ms = start.elapsed().as_millis(),
            "Frame analyzed"
        );
        outcome
    }

    fn decode_frame(&mut self, frame: &CameraFrame) -> Result<Option<String>, DecodeError> {
        let luma = frame_to_luma(frame.buffer(), self.max_dimension)?;

        let decoder = &mut self.decoder;
        let decoded = panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(&luma)))
            .map_err(|payload| DecodeError::Panicked(panic_message(payload.as_ref())))??;

        if decoded.len() > 1 {
            debug!(count = decoded.len(), "Multiple codes in frame, keeping the first");
        }
        Ok(decoded.into_iter().next().map(|d| d.content))
    }
}

impl std::fmt::Debug for FrameAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameAnalyzer")
            .field("max_dimension", &self.max_dimension)
            .finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
