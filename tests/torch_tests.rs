// SPDX-License-Identifier: GPL-3.0-only

//! Torch toggling through a bound session

use qr_scanner::backends::camera::{
    BackendResult, CameraFrame, CameraSource, FrameBuffer, PixelFormat,
};
use qr_scanner::errors::TorchError;
use qr_scanner::flash::TorchControl;
use qr_scanner::{CaptureSession, FrameAnalyzer, ScanCoordinator, ScanGate};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct FakeTorch {
    lit: Mutex<bool>,
    writes: Mutex<Vec<bool>>,
}

impl TorchControl for FakeTorch {
    fn set_torch(&self, on: bool) -> Result<(), TorchError> {
        *self.lit.lock().unwrap() = on;
        self.writes.lock().unwrap().push(on);
        Ok(())
    }
}

struct TorchCamera {
    torch: Arc<FakeTorch>,
}

impl CameraSource for TorchCamera {
    fn name(&self) -> &str {
        "torch-camera"
    }

    fn start(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> BackendResult<CameraFrame> {
        std::thread::sleep(Duration::from_millis(5));
        Ok(CameraFrame::new(FrameBuffer::new(
            8,
            8,
            PixelFormat::Gray8,
            vec![0u8; 64],
        )))
    }

    fn torch(&self) -> Arc<dyn TorchControl> {
        self.torch.clone()
    }
}

fn bind(torch: &Arc<FakeTorch>) -> CaptureSession {
    let (tx, _rx) = mpsc::unbounded_channel();
    CaptureSession::bind(
        TorchCamera {
            torch: Arc::clone(torch),
        },
        FrameAnalyzer::new(),
        tx,
        ScanGate::new(),
        &tokio::runtime::Handle::current(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_toggle_twice_restores_hardware() {
    let torch = Arc::new(FakeTorch::default());
    let session = bind(&torch);
    let mut coordinator = ScanCoordinator::new();
    let before = *torch.lit.lock().unwrap();

    assert!(session.camera().has_torch());
    coordinator.toggle_torch(Some(session.camera()));
    assert!(*torch.lit.lock().unwrap());
    assert!(session.camera().torch_enabled());

    coordinator.toggle_torch(Some(session.camera()));
    assert_eq!(*torch.lit.lock().unwrap(), before);
    assert!(!coordinator.torch().enabled);
}

#[tokio::test]
async fn test_dropping_session_turns_torch_off() {
    let torch = Arc::new(FakeTorch::default());
    let session = bind(&torch);
    let mut coordinator = ScanCoordinator::new();

    coordinator.toggle_torch(Some(session.camera()));
    assert!(*torch.lit.lock().unwrap());

    drop(session);
    assert!(!*torch.lit.lock().unwrap());
    assert_eq!(*torch.writes.lock().unwrap(), vec![true, false]);
}

#[tokio::test]
async fn test_session_without_lit_torch_leaves_it_alone() {
    let torch = Arc::new(FakeTorch::default());
    drop(bind(&torch));
    assert!(torch.writes.lock().unwrap().is_empty());
}
