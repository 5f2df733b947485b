// SPDX-License-Identifier: GPL-3.0-only

//! Camera access check
//!
//! Linux has no runtime permission prompt for cameras; access is decided by
//! the device node's mode and the user's groups (usually `video`). The
//! scanner checks once at startup and simply does not build the capture
//! pipeline when access is refused.

use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

/// Outcome of the startup access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraPermission {
    /// The device node can be opened for capture
    Granted,
    /// The node exists but the user may not open it
    Denied(String),
    /// No such device
    Missing(String),
}

impl CameraPermission {
    /// Check whether the camera at `path` can be opened read/write
    pub fn check(path: &Path) -> Self {
        match std::fs::OpenOptions::new().read(true).write(true).open(path) {
            Ok(_) => {
                info!(path = %path.display(), "Camera access granted");
                CameraPermission::Granted
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Camera access denied (user may need to be in the 'video' group)"
                );
                CameraPermission::Denied(e.to_string())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "Camera device not found");
                CameraPermission::Missing(e.to_string())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Camera device cannot be opened");
                CameraPermission::Denied(e.to_string())
            }
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, CameraPermission::Granted)
    }
}
