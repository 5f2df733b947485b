// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type
///
/// Camera, decode and torch failures have their own types and never bubble
/// up this far: the screen degrades instead of exiting.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
}

/// Errors raised while turning a frame into a decoded payload
///
/// None of these are fatal: the analyzer logs them and treats the frame as
/// containing no code.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Frame geometry and buffer size disagree
    InvalidFrame(String),
    /// A symbol was located but its payload could not be read
    Corrupt(String),
    /// The decoder panicked while processing the frame
    Panicked(String),
}

/// Torch (flash LED) errors
#[derive(Debug, Clone, PartialEq)]
pub enum TorchError {
    /// The camera has no controllable torch
    Unavailable,
    /// The hardware rejected the request
    WriteFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            DecodeError::Corrupt(msg) => write!(f, "Corrupt symbol: {}", msg),
            DecodeError::Panicked(msg) => write!(f, "Decoder panicked: {}", msg),
        }
    }
}

impl fmt::Display for TorchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TorchError::Unavailable => write!(f, "No controllable torch"),
            TorchError::WriteFailed(msg) => write!(f, "Failed to set torch: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for TorchError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for TorchError {
    fn from(err: std::io::Error) -> Self {
        TorchError::WriteFailed(err.to_string())
    }
}
