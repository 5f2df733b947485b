// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for capture loops
//!
//! A capture loop owns its state (usually an opened camera source) on a
//! dedicated thread and runs one iteration at a time until it asks to stop
//! or its controller is stopped or dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let controller = CaptureLoopController::spawn("capture", source, |source| {
///     match source.next_frame() {
///         Ok(frame) => {
///             publish(frame);
///             LoopAction::Continue
///         }
///         Err(_) => LoopAction::Stop,
///     }
/// })?;
///
/// // Later; dropping the controller does the same
/// controller.stop();
/// ```
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Move `state` onto a new thread and run `loop_fn` on it repeatedly
    ///
    /// The stop signal is checked before every iteration. `on_exit` runs on
    /// the loop thread once the loop ends, with the state still alive.
    pub fn spawn<S, F>(name: &str, state: S, loop_fn: F) -> std::io::Result<Self>
    where
        S: Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        Self::spawn_with_exit(name, state, loop_fn, |_| {})
    }

    /// Like [`spawn`](Self::spawn), with a cleanup hook run on the loop thread
    pub fn spawn_with_exit<S, F, E>(
        name: &str,
        mut state: S,
        mut loop_fn: F,
        on_exit: E,
    ) -> std::io::Result<Self>
    where
        S: Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
        E: FnOnce(&mut S) + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %name_clone, "Capture loop thread started");

                loop {
                    if stop_signal_clone.load(Ordering::SeqCst) {
                        debug!(name = %name_clone, "Stop signal received");
                        break;
                    }

                    if loop_fn(&mut state) == LoopAction::Stop {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }
                }

                on_exit(&mut state);
                info!(name = %name_clone, "Capture loop thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting for it
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for capture loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn test_loop_runs_until_it_stops_itself() {
        let mut controller = CaptureLoopController::spawn("test-loop", 0u32, |count| {
            *count += 1;
            if *count > 10 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        })
        .unwrap();

        controller.join();
        assert!(!controller.is_running());
    }

    #[test]
    fn test_stop_signal() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = CaptureLoopController::spawn("test-loop", (), move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            LoopAction::Continue
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));

        controller.stop();
        assert!(counter.load(Ordering::SeqCst) > 0);
        assert!(!controller.is_running());
    }

    #[test]
    fn test_exit_hook_sees_final_state() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = Arc::clone(&seen);

        let mut controller = CaptureLoopController::spawn_with_exit(
            "test-exit",
            41u32,
            |state| {
                *state += 1;
                LoopAction::Stop
            },
            move |state| seen_clone.store(*state, Ordering::SeqCst),
        )
        .unwrap();

        controller.join();
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_drop_stops_loop() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let controller = CaptureLoopController::spawn("test-drop", (), move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            LoopAction::Continue
        })
        .unwrap();
        assert!(controller.is_running());

        drop(controller);
        let after_drop = counter.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(counter.load(Ordering::SeqCst), after_drop);
    }
}
