// SPDX-License-Identifier: GPL-3.0-only

//! Scan state machine
//!
//! The screen is either scanning or displaying one result. The first result
//! of a scanning cycle wins; anything decoded while a result is on screen is
//! discarded, not queued. Only dismissal starts a new cycle.
//!
//! The coordinator lives on the UI thread, but decoding happens on the
//! analysis task. A [`ScanGate`] shared between the two lets the analysis
//! task claim the cycle when it decodes, so results from a displayed cycle
//! are dropped at the source instead of waiting in the result channel.

use super::frame_processor::ScanResult;
use super::session::CameraControl;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Shared "a result is held" flag for one scanner screen
///
/// Open while scanning. The analysis task closes it with [`try_claim`]
/// when it has a result to deliver; only the coordinator reopens it, on
/// dismissal.
///
/// [`try_claim`]: ScanGate::try_claim
#[derive(Debug, Clone, Default)]
pub struct ScanGate {
    held: Arc<AtomicBool>,
}

impl ScanGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the current cycle for a freshly decoded result
    ///
    /// Returns false when a result is already held; the caller must then
    /// drop its result.
    pub fn try_claim(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether new results are accepted
    pub fn is_open(&self) -> bool {
        !self.held.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.held.store(true, Ordering::Release);
    }

    fn reopen(&self) {
        self.held.store(false, Ordering::Release);
    }
}

/// Latched scan state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Scanning,
    Displaying(ScanResult),
}

impl ScanState {
    /// Apply a decoded result
    pub fn on_decoded(self, result: ScanResult) -> ScanState {
        match self {
            ScanState::Scanning => ScanState::Displaying(result),
            displaying @ ScanState::Displaying(_) => displaying,
        }
    }

    /// Apply a dismissal of the displayed result
    pub fn on_dismissed(self) -> ScanState {
        ScanState::Scanning
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self, ScanState::Scanning)
    }

    /// The displayed result, if any
    pub fn result(&self) -> Option<&ScanResult> {
        match self {
            ScanState::Displaying(result) => Some(result),
            ScanState::Scanning => None,
        }
    }
}

/// Torch state requested by the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TorchState {
    pub enabled: bool,
}

/// Owner of the screen's scan and torch state
#[derive(Debug, Default)]
pub struct ScanCoordinator {
    state: ScanState,
    torch: TorchState,
    gate: ScanGate,
}

impl ScanCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate to hand to the capture session feeding this coordinator
    pub fn gate(&self) -> ScanGate {
        self.gate.clone()
    }

    /// Offer a decoded result; returns whether it was latched
    pub fn on_decoded(&mut self, result: ScanResult) -> bool {
        let state = std::mem::take(&mut self.state);
        let was_scanning = state.is_scanning();
        if !was_scanning {
            debug!(len = result.as_str().len(), "Result already displayed, discarding");
        }
        self.state = state.on_decoded(result);
        if was_scanning {
            self.gate.close();
            info!(is_url = self.state.result().is_some_and(ScanResult::is_url), "Scan result latched");
        }
        was_scanning
    }

    /// Clear the displayed result and resume scanning
    pub fn dismiss(&mut self) {
        if !self.state.is_scanning() {
            debug!("Scan result dismissed");
        }
        self.state = std::mem::take(&mut self.state).on_dismissed();
        self.gate.reopen();
    }

    pub fn current(&self) -> &ScanState {
        &self.state
    }

    pub fn torch(&self) -> TorchState {
        self.torch
    }

    /// Flip the torch and mirror the new state into the camera
    ///
    /// Without a bound camera only the requested state changes. When the
    /// hardware refuses, the failure is logged and the requested state is
    /// kept so the next toggle retries the opposite direction.
    pub fn toggle_torch(&mut self, camera: Option<&CameraControl>) -> TorchState {
        self.torch.enabled = !self.torch.enabled;

        if let Some(camera) = camera
            && let Err(e) = camera.enable_torch(self.torch.enabled)
        {
            warn!(enabled = self.torch.enabled, error = %e, "Failed to switch torch");
        }
        self.torch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TorchError;
    use crate::flash::TorchControl;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingTorch {
        writes: Mutex<Vec<bool>>,
    }

    impl TorchControl for RecordingTorch {
        fn set_torch(&self, on: bool) -> Result<(), TorchError> {
            self.writes.lock().unwrap().push(on);
            Ok(())
        }
    }

    #[test]
    fn test_first_result_wins() {
        let state = ScanState::Scanning
            .on_decoded(ScanResult::new("first"))
            .on_decoded(ScanResult::new("second"));
        assert_eq!(state, ScanState::Displaying(ScanResult::new("first")));
    }

    #[test]
    fn test_dismiss_in_scanning_is_noop() {
        assert_eq!(ScanState::Scanning.on_dismissed(), ScanState::Scanning);
    }

    #[test]
    fn test_same_payload_relatches_after_dismissal() {
        let mut coordinator = ScanCoordinator::new();
        assert!(coordinator.on_decoded(ScanResult::new("X")));
        assert!(!coordinator.on_decoded(ScanResult::new("X")));

        coordinator.dismiss();
        assert!(coordinator.current().is_scanning());
        assert!(coordinator.on_decoded(ScanResult::new("X")));
        assert_eq!(coordinator.current().result().map(ScanResult::as_str), Some("X"));
    }

    #[test]
    fn test_gate_follows_latch() {
        let mut coordinator = ScanCoordinator::new();
        let gate = coordinator.gate();
        assert!(gate.is_open());

        assert!(coordinator.on_decoded(ScanResult::new("X")));
        assert!(!gate.is_open());
        assert!(!gate.try_claim());

        coordinator.dismiss();
        assert!(gate.is_open());
    }

    #[test]
    fn test_gate_claim_is_single_shot() {
        let mut coordinator = ScanCoordinator::new();
        let gate = coordinator.gate();

        // Analysis side claims, then the UI latches the claimed result
        assert!(gate.try_claim());
        assert!(!gate.try_claim());
        assert!(coordinator.on_decoded(ScanResult::new("claimed")));

        coordinator.dismiss();
        assert!(gate.try_claim());
    }

    #[test]
    fn test_torch_toggle_mirrors_hardware() {
        let torch = Arc::new(RecordingTorch::default());
        let camera = CameraControl::new(torch.clone());
        let mut coordinator = ScanCoordinator::new();

        assert!(coordinator.toggle_torch(Some(&camera)).enabled);
        assert!(camera.torch_enabled());
        assert!(!coordinator.toggle_torch(Some(&camera)).enabled);
        assert!(!camera.torch_enabled());

        assert_eq!(*torch.writes.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_torch_toggle_without_camera() {
        let mut coordinator = ScanCoordinator::new();
        assert!(coordinator.toggle_torch(None).enabled);
        assert!(coordinator.torch().enabled);
    }
}
