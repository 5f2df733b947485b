// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing tasks
//!
//! Decoding engines and the frame conversions they need.

pub mod qr_detector;

pub use qr_detector::{Decoder, RqrrDecoder};
