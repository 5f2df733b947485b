// SPDX-License-Identifier: GPL-3.0-only

//! Torch control
//!
//! [`TorchControl`] is the hardware seam the scanner toggles. On Linux the
//! torch is a flash LED exposed at `/sys/class/leds/*:flash`; writing its
//! `brightness` file (group-writable by `feedbackd` on most phones) keeps
//! it lit continuously.

use crate::errors::TorchError;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Hardware torch switch
pub trait TorchControl: Send + Sync {
    /// Turn the torch on or off
    fn set_torch(&self, on: bool) -> Result<(), TorchError>;

    /// Whether this control can actually drive a light
    fn is_available(&self) -> bool {
        true
    }
}

/// Torch control for cameras without a light
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTorch;

impl TorchControl for NoTorch {
    fn set_torch(&self, _on: bool) -> Result<(), TorchError> {
        Err(TorchError::Unavailable)
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// A flash LED device discovered via sysfs
#[derive(Debug, Clone)]
pub struct FlashDevice {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    /// Maximum brightness value (from `max_brightness` file)
    max_brightness: u32,
    /// Human-readable name (directory basename)
    name: String,
}

impl FlashDevice {
    /// Get the device name (e.g. "white:flash")
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set raw brightness value (0 = off, max_brightness = full)
    pub fn set_brightness(&self, value: u32) -> io::Result<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.path.join("brightness"), clamped.to_string())
    }

    /// Turn off the LED
    pub fn off(&self) -> io::Result<()> {
        self.set_brightness(0)
    }

    /// Turn on at full brightness
    pub fn on(&self) -> io::Result<()> {
        self.set_brightness(self.max_brightness)
    }
}

/// Flash LEDs driven together as one torch
#[derive(Debug, Clone, Default)]
pub struct SysfsTorch {
    devices: Vec<FlashDevice>,
}

impl SysfsTorch {
    /// Scan `/sys/class/leds/` for writable `*:flash` entries
    pub fn detect() -> Self {
        Self::detect_in(Path::new("/sys/class/leds"))
    }

    /// Scan a leds directory laid out like `/sys/class/leds/`
    pub fn detect_in(leds_dir: &Path) -> Self {
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            debug!(path = %leds_dir.display(), "No LED class directory, torch unavailable");
            return Self::default();
        };

        let mut devices = Vec::new();
        let mut unwritable = 0usize;

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name_str) = name.to_str() else {
                continue;
            };

            // Match entries like "white:flash", "yellow:flash"
            if !name_str.ends_with(":flash") {
                continue;
            }

            let led_path = entry.path();
            let max_brightness_path = led_path.join("max_brightness");

            let max_brightness = match std::fs::read_to_string(&max_brightness_path) {
                Ok(s) => match s.trim().parse::<u32>() {
                    Ok(v) if v > 0 => v,
                    _ => {
                        warn!(
                            path = %max_brightness_path.display(),
                            "Invalid max_brightness value"
                        );
                        continue;
                    }
                },
                Err(e) => {
                    warn!(
                        path = %max_brightness_path.display(),
                        error = %e,
                        "Cannot read max_brightness"
                    );
                    continue;
                }
            };

            let brightness_path = led_path.join("brightness");
            if let Err(e) = std::fs::OpenOptions::new()
                .write(true)
                .open(&brightness_path)
            {
                warn!(
                    path = %brightness_path.display(),
                    error = %e,
                    "Flash LED found but not writable (user may need to be in 'feedbackd' group)"
                );
                unwritable += 1;
                continue;
            }

            info!(name = name_str, max_brightness, "Discovered flash LED");
            devices.push(FlashDevice {
                path: led_path,
                max_brightness,
                name: name_str.to_string(),
            });
        }

        // Sort by name for deterministic ordering (white before yellow)
        devices.sort_by(|a, b| a.name.cmp(&b.name));

        if devices.is_empty() && unwritable > 0 {
            warn!(count = unwritable, "Torch hardware present but not controllable");
        }

        Self { devices }
    }

    /// Discovered devices
    pub fn devices(&self) -> &[FlashDevice] {
        &self.devices
    }
}

impl TorchControl for SysfsTorch {
    fn set_torch(&self, on: bool) -> Result<(), TorchError> {
        if self.devices.is_empty() {
            return Err(TorchError::Unavailable);
        }

        let mut last_error = None;
        for dev in &self.devices {
            let result = if on { dev.on() } else { dev.off() };
            if let Err(e) = result {
                warn!(device = %dev.name, on, error = %e, "Failed to switch flash LED");
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn is_available(&self) -> bool {
        !self.devices.is_empty()
    }
}
