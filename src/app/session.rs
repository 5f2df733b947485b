// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture session
//!
//! A [`CaptureSession`] owns everything that runs while the camera is in
//! use:
//!
//! ```text
//!  capture thread                    tokio runtime
//! ┌──────────────┐  keep-latest   ┌────────────────┐  mpsc   ┌─────────┐
//! │ CameraSource │───────────────▶│ analysis task  │────────▶│ UI loop │
//! └──────┬───────┘   (1 slot)     │ (spawn_blocking│         └─────────┘
//!        │ watch                  │  per frame)    │
//!        ▼                        └────────────────┘
//!     preview
//! ```
//!
//! A result only leaves the analysis task if it claims the screen's
//! [`ScanGate`]; while a result is displayed, new ones are counted and
//! dropped. Binding is synchronous so a device that cannot be opened is
//! reported to the caller directly. Dropping the session tears the pipeline down and
//! turns the torch off.

use crate::app::coordinator::ScanGate;
use crate::app::frame_processor::latest::{self, LatestSender, SendError};
use crate::app::frame_processor::{AnalysisOutcome, FrameAnalyzer, ScanResult};
use crate::backends::camera::{
    BackendError, BackendResult, CameraFrame, CameraSource, CaptureLoopController, FrameBuffer,
    LoopAction,
};
use crate::constants::capture;
use crate::errors::TorchError;
use crate::flash::TorchControl;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Live camera controls, available once a session is bound
pub struct CameraControl {
    torch: Arc<dyn TorchControl>,
    enabled: AtomicBool,
}

impl CameraControl {
    pub fn new(torch: Arc<dyn TorchControl>) -> Self {
        Self {
            torch,
            enabled: AtomicBool::new(false),
        }
    }

    /// Switch the torch; the recorded state only changes on success
    pub fn enable_torch(&self, on: bool) -> Result<(), TorchError> {
        self.torch.set_torch(on)?;
        self.enabled.store(on, Ordering::SeqCst);
        debug!(on, "Torch switched");
        Ok(())
    }

    /// Last state successfully written to the hardware
    pub fn torch_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Whether the camera has a controllable light at all
    pub fn has_torch(&self) -> bool {
        self.torch.is_available()
    }
}

impl std::fmt::Debug for CameraControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraControl")
            .field("has_torch", &self.has_torch())
            .field("torch_enabled", &self.torch_enabled())
            .finish()
    }
}

#[derive(Default)]
struct Counters {
    captured: AtomicU64,
    superseded: AtomicU64,
    analyzed: AtomicU64,
    decoded: AtomicU64,
    discarded: AtomicU64,
    failed: AtomicU64,
    released: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            captured: self.captured.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            analyzed: self.analyzed.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
        }
    }
}

/// Pipeline counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames delivered by the source
    pub captured: u64,
    /// Frames replaced in the keep-latest slot before analysis
    pub superseded: u64,
    /// Frames the analyzer processed
    pub analyzed: u64,
    /// Analyses that produced a result
    pub decoded: u64,
    /// Results dropped because another one was already held
    pub discarded: u64,
    /// Analyses that failed (treated as no code)
    pub failed: u64,
    /// Frames whose release hook has run
    pub released: u64,
}

/// State owned by the capture thread
struct CaptureState<S> {
    source: S,
    frames: LatestSender<CameraFrame>,
    preview: watch::Sender<Option<FrameBuffer>>,
    counters: Arc<Counters>,
}

impl<S: CameraSource> CaptureState<S> {
    fn step(&mut self) -> LoopAction {
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(BackendError::Disconnected) => {
                info!(source = %self.source.name(), "Camera stream ended");
                return LoopAction::Stop;
            }
            Err(e) => {
                warn!(source = %self.source.name(), error = %e, "Failed to capture frame");
                std::thread::sleep(capture::RETRY_DELAY);
                return LoopAction::Continue;
            }
        };

        Counters::bump(&self.counters.captured);
        let counters = Arc::clone(&self.counters);
        let frame = frame.on_release(move || Counters::bump(&counters.released));

        self.preview.send_replace(Some(frame.buffer().clone()));

        match self.frames.send(frame) {
            Ok(Some(superseded)) => {
                Counters::bump(&self.counters.superseded);
                drop(superseded);
                LoopAction::Continue
            }
            Ok(None) => LoopAction::Continue,
            Err(SendError(frame)) => {
                debug!("Analysis stage gone, stopping capture");
                drop(frame);
                LoopAction::Stop
            }
        }
    }
}

/// A bound camera with its preview and analysis pipeline
pub struct CaptureSession {
    name: String,
    capture: CaptureLoopController,
    analysis: JoinHandle<()>,
    preview: watch::Receiver<Option<FrameBuffer>>,
    camera: Arc<CameraControl>,
    counters: Arc<Counters>,
}

impl CaptureSession {
    /// Start `source` and run the scanning pipeline
    ///
    /// A decoded result is sent on `results` only if it claims `gate`, so
    /// at most one result per scanning cycle is ever in flight. The
    /// analysis task is spawned on `runtime`.
    pub fn bind<S>(
        mut source: S,
        analyzer: FrameAnalyzer,
        results: mpsc::UnboundedSender<ScanResult>,
        gate: ScanGate,
        runtime: &tokio::runtime::Handle,
    ) -> BackendResult<Self>
    where
        S: CameraSource + 'static,
    {
        let name = source.name().to_string();
        source.start().inspect_err(|e| {
            error!(source = %name, error = %e, "Failed to bind camera");
        })?;

        let camera = Arc::new(CameraControl::new(source.torch()));
        let counters = Arc::new(Counters::default());
        let (preview_tx, preview_rx) = watch::channel(None);
        let (frame_tx, mut frame_rx) = latest::channel::<CameraFrame>();

        let state = CaptureState {
            source,
            frames: frame_tx,
            preview: preview_tx,
            counters: Arc::clone(&counters),
        };
        let capture = CaptureLoopController::spawn_with_exit(
            "qr-capture",
            state,
            |state| state.step(),
            |state| state.source.stop(),
        )?;

        let task_counters = Arc::clone(&counters);
        let analysis = runtime.spawn(async move {
            let mut analyzer = analyzer;
            while let Some(frame) = frame_rx.recv().await {
                let joined = tokio::task::spawn_blocking(move || {
                    let mut found = None;
                    let outcome = analyzer.analyze(frame, |result| found = Some(result));
                    (analyzer, outcome, found)
                })
                .await;

                let (returned, outcome, found) = match joined {
                    Ok(done) => done,
                    Err(e) => {
                        error!(error = %e, "Analysis worker died");
                        break;
                    }
                };
                analyzer = returned;

                Counters::bump(&task_counters.analyzed);
                match outcome {
                    AnalysisOutcome::Decoded => Counters::bump(&task_counters.decoded),
                    AnalysisOutcome::Failed(_) => Counters::bump(&task_counters.failed),
                    AnalysisOutcome::NoCode => {}
                }

                let Some(result) = found else {
                    continue;
                };
                if !gate.try_claim() {
                    Counters::bump(&task_counters.discarded);
                    debug!("Result already held, discarding");
                    continue;
                }
                if results.send(result).is_err() {
                    debug!("Result receiver gone, stopping analysis");
                    break;
                }
            }
            debug!("Analysis task finished");
        });

        info!(source = %name, has_torch = camera.has_torch(), "Capture session bound");

        Ok(Self {
            name,
            capture,
            analysis,
            preview: preview_rx,
            camera,
            counters,
        })
    }

    /// Name of the bound source
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Torch and other live controls
    pub fn camera(&self) -> &CameraControl {
        &self.camera
    }

    /// Receiver for the most recent preview frame
    pub fn preview(&self) -> watch::Receiver<Option<FrameBuffer>> {
        self.preview.clone()
    }

    /// Whether the capture thread is still delivering frames
    pub fn is_running(&self) -> bool {
        self.capture.is_running()
    }

    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.capture.stop();
        self.analysis.abort();

        if self.camera.torch_enabled()
            && let Err(e) = self.camera.enable_torch(false)
        {
            warn!(error = %e, "Failed to turn torch off");
        }

        let stats = self.counters.snapshot();
        info!(
            source = %self.name,
            captured = stats.captured,
            superseded = stats.superseded,
            analyzed = stats.analyzed,
            decoded = stats.decoded,
            discarded = stats.discarded,
            "Capture session closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::frame_processor::Decoded;
    use crate::app::frame_processor::Decoder;
    use crate::backends::camera::{PixelFormat, StillImageSource};
    use crate::errors::DecodeError;
    use image::GrayImage;
    use std::time::Duration;

    /// Reports the frame's first pixel value as the payload, or nothing for 0
    struct PixelDecoder {
        delay: Duration,
    }

    impl Decoder for PixelDecoder {
        fn decode(&mut self, image: &GrayImage) -> Result<Vec<Decoded>, DecodeError> {
            std::thread::sleep(self.delay);
            let value = image.get_pixel(0, 0).0[0];
            if value == 0 {
                return Ok(Vec::new());
            }
            Ok(vec![Decoded {
                content: format!("pixel-{}", value),
            }])
        }
    }

    fn frame(value: u8) -> FrameBuffer {
        FrameBuffer::new(64, 64, PixelFormat::Gray8, vec![value; 64 * 64])
    }

    fn analyzer(delay: Duration) -> FrameAnalyzer {
        FrameAnalyzer::with_decoder(PixelDecoder { delay })
    }

    #[tokio::test]
    async fn test_results_reach_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let source = StillImageSource::from_frames("test", vec![frame(0), frame(7)])
            .with_interval(Duration::from_millis(5));

        let session = CaptureSession::bind(
            source,
            analyzer(Duration::ZERO),
            tx,
            ScanGate::new(),
            &tokio::runtime::Handle::current(),
        )
        .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("a result arrives")
            .unwrap();
        assert_eq!(result.as_str(), "pixel-7");
        assert!(session.stats().decoded >= 1);
    }

    #[tokio::test]
    async fn test_held_result_blocks_later_results() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let gate = ScanGate::new();
        let source = StillImageSource::from_frames("test", vec![frame(9)])
            .with_interval(Duration::from_millis(2));

        let session = CaptureSession::bind(
            source,
            analyzer(Duration::ZERO),
            tx,
            gate.clone(),
            &tokio::runtime::Handle::current(),
        )
        .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("a result arrives")
            .unwrap();
        assert_eq!(first.as_str(), "pixel-9");
        assert!(!gate.is_open());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "nothing queued behind the held result");
        let stats = session.stats();
        assert!(stats.discarded > 0);
        assert!(stats.decoded > stats.discarded);
    }

    #[tokio::test]
    async fn test_busy_analyzer_supersedes_frames_and_releases_all() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let source =
            StillImageSource::from_frames("test", vec![frame(0)]).with_interval(Duration::ZERO);

        let session = CaptureSession::bind(
            source,
            analyzer(Duration::from_millis(30)),
            tx,
            ScanGate::new(),
            &tokio::runtime::Handle::current(),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let running = session.stats();
        assert!(running.superseded > 0);
        assert!(running.analyzed < running.captured);
        assert!(running.released >= running.superseded);
    }

    #[tokio::test]
    async fn test_release_count_matches_capture_count_after_shutdown() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let source = StillImageSource::from_frames("test", vec![frame(0)])
            .with_interval(Duration::from_millis(1))
            .once();

        let session = CaptureSession::bind(
            source,
            analyzer(Duration::ZERO),
            tx,
            ScanGate::new(),
            &tokio::runtime::Handle::current(),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = session.stats();
        assert!(!session.is_running());
        assert_eq!(stats.captured, 1);
        assert_eq!(stats.released, 1);
    }

    #[test]
    fn test_bind_failure_is_reported() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let source = StillImageSource::from_frames("empty", Vec::new());

        let result = CaptureSession::bind(
            source,
            FrameAnalyzer::new(),
            tx,
            ScanGate::new(),
            runtime.handle(),
        );
        assert!(matches!(result, Err(BackendError::InitializationFailed(_))));
    }
}
