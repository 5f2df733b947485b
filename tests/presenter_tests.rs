// SPDX-License-Identifier: GPL-3.0-only

//! Result dialog behaviour seen from the public API

use qr_scanner::app::{Clipboard, UrlOpener};
use qr_scanner::{DialogAction, PresenterOutcome, ResultPresenter, ScanCoordinator, ScanResult};
use std::io;

#[derive(Default)]
struct Recorder {
    copied: Vec<String>,
    opened: Vec<String>,
}

struct ClipboardHalf<'a>(&'a mut Vec<String>);
struct OpenerHalf<'a>(&'a mut Vec<String>);

impl Clipboard for ClipboardHalf<'_> {
    fn set_text(&mut self, text: &str) -> io::Result<()> {
        self.0.push(text.to_string());
        Ok(())
    }
}

impl UrlOpener for OpenerHalf<'_> {
    fn open_url(&mut self, url: &str) -> io::Result<()> {
        self.0.push(url.to_string());
        Ok(())
    }
}

impl Recorder {
    fn perform(&mut self, presenter: &ResultPresenter, action: DialogAction) -> PresenterOutcome {
        presenter.perform(
            action,
            &mut ClipboardHalf(&mut self.copied),
            &mut OpenerHalf(&mut self.opened),
        )
    }
}

#[test]
fn test_url_offers_open() {
    let presenter = ResultPresenter::new(&ScanResult::new("https://example.com"));
    assert!(presenter.actions().contains(&DialogAction::Open));

    let presenter = ResultPresenter::new(&ScanResult::new("hello world"));
    assert!(!presenter.actions().contains(&DialogAction::Open));
}

#[test]
fn test_copy_and_open_keep_result_displayed() {
    let mut coordinator = ScanCoordinator::new();
    let mut recorder = Recorder::default();
    coordinator.on_decoded(ScanResult::new("https://example.com/path?q=1"));

    let presenter = ResultPresenter::new(coordinator.current().result().unwrap());
    for action in [DialogAction::Copy, DialogAction::Open] {
        if recorder.perform(&presenter, action) == PresenterOutcome::Dismiss {
            coordinator.dismiss();
        }
    }

    assert!(!coordinator.current().is_scanning());
    assert_eq!(recorder.copied, vec!["https://example.com/path?q=1"]);
    assert_eq!(recorder.opened, vec!["https://example.com/path?q=1"]);

    if recorder.perform(&presenter, DialogAction::ScanAgain) == PresenterOutcome::Dismiss {
        coordinator.dismiss();
    }
    assert!(coordinator.current().is_scanning());
}

#[test]
fn test_copy_preserves_bytes() {
    let mut recorder = Recorder::default();
    let texts = ["", "first\nsecond\n", "  padded  ", "BEGIN:VCARD\r\nFN:Ünïcødé\r\nEND:VCARD"];

    for text in texts {
        let presenter = ResultPresenter::new(&ScanResult::new(text));
        recorder.perform(&presenter, DialogAction::Copy);
    }

    assert_eq!(recorder.copied, texts);
}
