// SPDX-License-Identifier: GPL-3.0-only

//! Result dialog actions
//!
//! The dialog shows the decoded text with up to three actions. Copy and Open
//! leave the dialog up; only "Scan again" dismisses it. The text is handed
//! to the clipboard and the URL opener exactly as decoded.

use super::frame_processor::ScanResult;
use std::io::{self, Write};
use tracing::{info, warn};

/// Destination for copied text
pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> io::Result<()>;
}

/// Handler for "open in browser"
pub trait UrlOpener {
    fn open_url(&mut self, url: &str) -> io::Result<()>;
}

/// Clipboard that asks the terminal emulator to copy (OSC 52)
///
/// Works over SSH and inside multiplexers that pass OSC 52 through; the
/// terminal decides whether to honor it.
#[derive(Debug, Default)]
pub struct Osc52Clipboard;

impl Clipboard for Osc52Clipboard {
    fn set_text(&mut self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        crossterm::execute!(
            stdout,
            crossterm::clipboard::CopyToClipboard::to_clipboard_from(text)
        )?;
        stdout.flush()
    }
}

/// Opener using the desktop's default handler
#[derive(Debug, Default)]
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open_url(&mut self, url: &str) -> io::Result<()> {
        open::that_detached(url)
    }
}

/// Buttons of the result dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    Copy,
    Open,
    ScanAgain,
}

impl DialogAction {
    pub fn label(&self) -> &'static str {
        match self {
            DialogAction::Copy => "Copy",
            DialogAction::Open => "Open",
            DialogAction::ScanAgain => "Scan again",
        }
    }

    /// Keyboard shortcut shown next to the label
    pub fn key(&self) -> char {
        match self {
            DialogAction::Copy => 'c',
            DialogAction::Open => 'o',
            DialogAction::ScanAgain => 's',
        }
    }
}

/// What the screen should do after an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterOutcome {
    /// Keep the dialog open
    Stay,
    /// Close the dialog and resume scanning
    Dismiss,
}

/// Presentation of one latched result
#[derive(Debug, Clone)]
pub struct ResultPresenter {
    result: ScanResult,
    is_url: bool,
}

impl ResultPresenter {
    pub fn new(result: &ScanResult) -> Self {
        Self {
            is_url: result.is_url(),
            result: result.clone(),
        }
    }

    /// Text to display
    pub fn text(&self) -> &str {
        self.result.as_str()
    }

    pub fn is_url(&self) -> bool {
        self.is_url
    }

    /// Actions in display order; Open only for URL-shaped text
    pub fn actions(&self) -> Vec<DialogAction> {
        let mut actions = vec![DialogAction::Copy];
        if self.is_url {
            actions.push(DialogAction::Open);
        }
        actions.push(DialogAction::ScanAgain);
        actions
    }

    /// Run `action`
    ///
    /// Failures of the clipboard or opener are logged only. An Open on text
    /// that is not URL-shaped is ignored.
    pub fn perform(
        &self,
        action: DialogAction,
        clipboard: &mut dyn Clipboard,
        opener: &mut dyn UrlOpener,
    ) -> PresenterOutcome {
        match action {
            DialogAction::Copy => {
                match clipboard.set_text(self.text()) {
                    Ok(()) => info!(len = self.text().len(), "Copied scan result"),
                    Err(e) => warn!(error = %e, "Failed to copy scan result"),
                }
                PresenterOutcome::Stay
            }
            DialogAction::Open => {
                if !self.is_url {
                    warn!("Open requested for text that is not a URL");
                    return PresenterOutcome::Stay;
                }
                match opener.open_url(self.text()) {
                    Ok(()) => info!(url = %self.text(), "Opened scan result"),
                    Err(e) => warn!(url = %self.text(), error = %e, "Failed to open URL"),
                }
                PresenterOutcome::Stay
            }
            DialogAction::ScanAgain => PresenterOutcome::Dismiss,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingClipboard {
        copied: Vec<String>,
    }

    impl Clipboard for RecordingClipboard {
        fn set_text(&mut self, text: &str) -> io::Result<()> {
            self.copied.push(text.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingOpener {
        opened: Vec<String>,
        fail: bool,
    }

    impl UrlOpener for RecordingOpener {
        fn open_url(&mut self, url: &str) -> io::Result<()> {
            self.opened.push(url.to_string());
            if self.fail {
                Err(io::Error::other("no browser"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_actions_for_url() {
        let presenter = ResultPresenter::new(&ScanResult::new("https://example.com"));
        assert_eq!(
            presenter.actions(),
            vec![DialogAction::Copy, DialogAction::Open, DialogAction::ScanAgain]
        );
    }

    #[test]
    fn test_actions_for_plain_text() {
        let presenter = ResultPresenter::new(&ScanResult::new("hello world"));
        assert_eq!(
            presenter.actions(),
            vec![DialogAction::Copy, DialogAction::ScanAgain]
        );
    }

    #[test]
    fn test_copy_is_verbatim_and_stays() {
        let mut clipboard = RecordingClipboard::default();
        let mut opener = RecordingOpener::default();

        for text in ["", "line one\nline two\r\n\ttabbed", "WIFI:S:home;T:WPA;P:p@ss;;"] {
            let presenter = ResultPresenter::new(&ScanResult::new(text));
            let outcome = presenter.perform(DialogAction::Copy, &mut clipboard, &mut opener);
            assert_eq!(outcome, PresenterOutcome::Stay);
        }

        assert_eq!(
            clipboard.copied,
            vec!["", "line one\nline two\r\n\ttabbed", "WIFI:S:home;T:WPA;P:p@ss;;"]
        );
        assert!(opener.opened.is_empty());
    }

    #[test]
    fn test_open_failure_is_contained() {
        let mut clipboard = RecordingClipboard::default();
        let mut opener = RecordingOpener {
            fail: true,
            ..Default::default()
        };
        let presenter = ResultPresenter::new(&ScanResult::new("http://example.org/a?b=c"));

        let outcome = presenter.perform(DialogAction::Open, &mut clipboard, &mut opener);
        assert_eq!(outcome, PresenterOutcome::Stay);
        assert_eq!(opener.opened, vec!["http://example.org/a?b=c"]);
    }

    #[test]
    fn test_open_ignored_for_plain_text() {
        let mut clipboard = RecordingClipboard::default();
        let mut opener = RecordingOpener::default();
        let presenter = ResultPresenter::new(&ScanResult::new("hello world"));

        presenter.perform(DialogAction::Open, &mut clipboard, &mut opener);
        assert!(opener.opened.is_empty());
    }

    #[test]
    fn test_scan_again_dismisses() {
        let presenter = ResultPresenter::new(&ScanResult::new("anything"));
        let outcome = presenter.perform(
            DialogAction::ScanAgain,
            &mut RecordingClipboard::default(),
            &mut RecordingOpener::default(),
        );
        assert_eq!(outcome, PresenterOutcome::Dismiss);
    }
}
