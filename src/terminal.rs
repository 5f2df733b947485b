// SPDX-License-Identifier: GPL-3.0-only

//! Terminal scanner screen
//!
//! Renders the camera feed to the terminal using Unicode half-block
//! characters, dims everything outside a square scan window, and shows the
//! latched result in a dialog. This loop is the only owner of the
//! [`ScanCoordinator`]; decode results reach it over a channel.
//!
//! While the screen is up, panics are routed to the log instead of stderr.
//! A panic on the screen thread itself restores the terminal first.

use crate::app::coordinator::{ScanCoordinator, ScanGate, ScanState};
use crate::app::frame_processor::analyzer::panic_message;
use crate::app::frame_processor::{FrameAnalyzer, ScanResult};
use crate::app::presenter::{
    Clipboard, DialogAction, Osc52Clipboard, PresenterOutcome, ResultPresenter, SystemOpener,
    UrlOpener,
};
use crate::app::session::CaptureSession;
use crate::backends::camera::types::{FrameBuffer, PixelFormat};
use crate::backends::camera::v4l2::enumerate_cameras;
use crate::backends::camera::{CameraPermission, StillImageSource, V4l2Source};
use crate::config::Config;
use crate::constants::ui;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph, Widget, Wrap},
};
use std::io::{self, stdout};
use std::panic::{self, PanicHookInfo};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// Where the preview comes from
#[derive(Debug, Clone)]
pub enum PreviewSource {
    /// A V4L2 device; `None` picks the configured or first camera
    Camera(Option<PathBuf>),
    /// Image files served as a looping stream
    Images(Vec<PathBuf>),
}

/// Run the scanner screen until the user quits
pub fn run(
    source: PreviewSource,
    config: &Config,
    runtime: &tokio::runtime::Handle,
) -> Result<(), Box<dyn std::error::Error>> {
    // Bind before taking over the terminal so device errors land in the log
    // with the terminal still usable
    let screen = Screen::new();
    let (results_tx, results_rx) = mpsc::unbounded_channel();
    let preview = open_preview(source, config, results_tx, screen.coordinator.gate(), runtime);

    let panic_guard = PanicHookGuard::install(restore_terminal);
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, screen, preview, results_rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    drop(panic_guard);

    result
}

/// Best-effort terminal reset from inside a panic
fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
}

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Panic hook installed for the lifetime of the screen
///
/// Every panic is logged through `tracing`. Panics on other threads (a
/// decoder caught by the analyzer, a dying capture thread) stop there, so
/// nothing is printed over the alternate screen. A panic on the installing
/// thread runs `restore` and then the previous hook, which prints normally.
/// Dropping the guard puts the previous hook back.
struct PanicHookGuard {
    previous: Arc<PanicHook>,
}

impl PanicHookGuard {
    fn install<R>(restore: R) -> Self
    where
        R: Fn() + Send + Sync + 'static,
    {
        let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
        let screen_thread: ThreadId = thread::current().id();
        let chained = Arc::clone(&previous);

        panic::set_hook(Box::new(move |info| {
            let current = thread::current();
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_default();
            error!(
                thread = current.name().unwrap_or("unnamed"),
                location = %location,
                message = %panic_message(info.payload()),
                "Panic"
            );

            if current.id() == screen_thread {
                restore();
                (**chained)(info);
            }
        }));

        Self { previous }
    }
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        // set_hook itself panics while unwinding
        if thread::panicking() {
            return;
        }
        let _ = panic::take_hook();
        let previous = Arc::clone(&self.previous);
        panic::set_hook(Box::new(move |info| (**previous)(info)));
    }
}

/// Outcome of trying to start the camera
enum Preview {
    Live {
        session: CaptureSession,
        frames: watch::Receiver<Option<FrameBuffer>>,
    },
    Unavailable(String),
}

impl Preview {
    fn session(&self) -> Option<&CaptureSession> {
        match self {
            Preview::Live { session, .. } => Some(session),
            Preview::Unavailable(_) => None,
        }
    }
}

fn open_preview(
    source: PreviewSource,
    config: &Config,
    results: mpsc::UnboundedSender<ScanResult>,
    gate: ScanGate,
    runtime: &tokio::runtime::Handle,
) -> Preview {
    let analyzer = FrameAnalyzer::new().with_max_dimension(config.analysis_max_dimension);

    let bound = match source {
        PreviewSource::Images(paths) => match StillImageSource::from_paths(&paths) {
            Ok(still) => CaptureSession::bind(still, analyzer, results, gate, runtime),
            Err(e) => Err(e),
        },
        PreviewSource::Camera(path) => {
            let path = path
                .or_else(|| config.camera_path.as_ref().map(PathBuf::from))
                .or_else(|| {
                    enumerate_cameras()
                        .into_iter()
                        .next()
                        .map(|device| PathBuf::from(device.path))
                });
            let Some(path) = path else {
                warn!("No camera found");
                return Preview::Unavailable("No camera found".into());
            };

            match CameraPermission::check(&path) {
                CameraPermission::Granted => {}
                CameraPermission::Denied(_) => {
                    return Preview::Unavailable(format!(
                        "No access to {} (is your user in the 'video' group?)",
                        path.display()
                    ));
                }
                CameraPermission::Missing(_) => {
                    return Preview::Unavailable(format!("{} not found", path.display()));
                }
            }

            let camera = V4l2Source::new(
                path.to_string_lossy(),
                config.capture_width,
                config.capture_height,
            );
            CaptureSession::bind(camera, analyzer, results, gate, runtime)
        }
    };

    match bound {
        Ok(session) => Preview::Live {
            frames: session.preview(),
            session,
        },
        Err(e) => {
            error!(error = %e, "Camera could not be started, running without preview");
            Preview::Unavailable(format!("Camera unavailable: {}", e))
        }
    }
}

/// Mutable screen state driven by the loop
struct Screen {
    coordinator: ScanCoordinator,
    presenter: Option<ResultPresenter>,
    notice: Option<String>,
}

impl Screen {
    fn new() -> Self {
        Self {
            coordinator: ScanCoordinator::new(),
            presenter: None,
            notice: None,
        }
    }

    fn on_decoded(&mut self, result: ScanResult) {
        if self.coordinator.on_decoded(result)
            && let ScanState::Displaying(latched) = self.coordinator.current()
        {
            self.presenter = Some(ResultPresenter::new(latched));
            self.notice = None;
        }
    }

    fn dismiss(&mut self) {
        self.coordinator.dismiss();
        self.presenter = None;
        self.notice = None;
    }

    fn status_message(&self, has_torch: bool) -> String {
        if let Some(notice) = &self.notice {
            return notice.clone();
        }
        match &self.presenter {
            Some(presenter) => {
                let mut msg = String::from("'c' copy");
                if presenter.is_url() {
                    msg.push_str(" | 'o' open");
                }
                msg.push_str(" | 's' scan again | 'q' quit");
                msg
            }
            None => {
                let mut msg = String::from("Point the camera at a QR code");
                if has_torch {
                    msg.push_str(" | 't' torch");
                }
                msg.push_str(" | 'q' quit");
                msg
            }
        }
    }
}

/// Whether the loop should keep running after a key
enum KeyResult {
    Continue,
    Quit,
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut screen: Screen,
    mut preview: Preview,
    mut results: mpsc::UnboundedReceiver<ScanResult>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut clipboard = Osc52Clipboard;
    let mut opener = SystemOpener;

    loop {
        while let Ok(result) = results.try_recv() {
            screen.on_decoded(result);
        }

        let frame = match &mut preview {
            Preview::Live { frames, .. } => frames.borrow_and_update().clone(),
            Preview::Unavailable(_) => None,
        };
        let has_torch = preview
            .session()
            .is_some_and(|session| session.camera().has_torch());
        let torch_on = screen.coordinator.torch().enabled;

        terminal.draw(|f| {
            let area = f.area();
            let [title_area, camera_area, status_area] = Layout::vertical([
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .areas(area);

            f.render_widget(
                TitleBar {
                    torch: if has_torch { Some(torch_on) } else { None },
                },
                title_area,
            );

            let placeholder = match &preview {
                Preview::Unavailable(msg) => msg.as_str(),
                Preview::Live { .. } => "Waiting for camera...",
            };
            f.render_widget(
                PreviewWidget {
                    frame: frame.as_ref(),
                    placeholder,
                },
                camera_area,
            );

            if let Some(presenter) = &screen.presenter {
                f.render_widget(ResultDialog { presenter }, camera_area);
            }

            let message = screen.status_message(has_torch);
            f.render_widget(StatusBar { message: &message }, status_area);
        })?;

        if event::poll(ui::TICK)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            let outcome = handle_key(
                key,
                &mut screen,
                &preview,
                &mut clipboard,
                &mut opener,
            );
            if matches!(outcome, KeyResult::Quit) {
                break;
            }
        }
    }

    if let Preview::Live { session, .. } = preview {
        let stats = session.stats();
        info!(
            captured = stats.captured,
            analyzed = stats.analyzed,
            decoded = stats.decoded,
            "Leaving scanner screen"
        );
    }
    Ok(())
}

fn handle_key(
    key: KeyEvent,
    screen: &mut Screen,
    preview: &Preview,
    clipboard: &mut dyn Clipboard,
    opener: &mut dyn UrlOpener,
) -> KeyResult {
    // Ctrl+C to quit
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return KeyResult::Quit;
    }
    if key.code == KeyCode::Char('q') {
        return KeyResult::Quit;
    }

    if key.code == KeyCode::Char('t') {
        let camera = preview.session().map(CaptureSession::camera);
        let torch = screen.coordinator.toggle_torch(camera);
        screen.notice = match camera {
            Some(camera) if camera.has_torch() => None,
            _ => Some(format!(
                "Torch {} (no controllable light)",
                if torch.enabled { "on" } else { "off" }
            )),
        };
        return KeyResult::Continue;
    }

    let Some(presenter) = screen.presenter.clone() else {
        return KeyResult::Continue;
    };

    let action = match key.code {
        KeyCode::Char('c') => Some(DialogAction::Copy),
        KeyCode::Char('o') if presenter.is_url() => Some(DialogAction::Open),
        KeyCode::Char('s') | KeyCode::Enter => Some(DialogAction::ScanAgain),
        KeyCode::Esc => {
            // Closing the dialog without a button
            screen.dismiss();
            None
        }
        _ => None,
    };

    if let Some(action) = action {
        match presenter.perform(action, clipboard, opener) {
            PresenterOutcome::Dismiss => screen.dismiss(),
            PresenterOutcome::Stay => {
                screen.notice = Some(match action {
                    DialogAction::Copy => "Copied to clipboard".into(),
                    DialogAction::Open => "Opening in browser...".into(),
                    DialogAction::ScanAgain => String::new(),
                });
            }
        }
    }
    KeyResult::Continue
}

/// Largest rect with the frame's aspect ratio, centered in `area`
///
/// Each terminal cell displays two vertical pixels.
fn fit_frame(area: Rect, frame: &FrameBuffer) -> Rect {
    let frame_aspect = frame.width as f64 / frame.height as f64;
    let term_width = area.width as f64;
    let term_height = (area.height * 2) as f64;

    let (display_width, display_height) = if term_width / term_height > frame_aspect {
        // Terminal is wider - fit to height
        let h = term_height;
        let w = h * frame_aspect;
        (w as u16, (h / 2.0) as u16)
    } else {
        // Terminal is taller - fit to width
        let w = term_width;
        let h = w / frame_aspect;
        (w as u16, (h / 2.0) as u16)
    };

    Rect {
        x: area.x + (area.width.saturating_sub(display_width)) / 2,
        y: area.y + (area.height.saturating_sub(display_height)) / 2,
        width: display_width.min(area.width),
        height: display_height.min(area.height),
    }
}

/// Square scan window centered in the displayed image
fn scan_window(display: Rect) -> Rect {
    let short_edge = display.width.min(display.height * 2) as f32;
    let side = ((short_edge * ui::SCAN_WINDOW_FRACTION).round() as u16).max(4);
    let width = side.min(display.width);
    let height = (side / 2).min(display.height);

    Rect {
        x: display.x + (display.width - width) / 2,
        y: display.y + (display.height - height) / 2,
        width,
        height,
    }
}

fn dim(color: Color) -> Color {
    match color {
        Color::Rgb(r, g, b) => {
            let scale = |c: u8| (c as f32 * (1.0 - ui::OVERLAY_DIM)) as u8;
            Color::Rgb(scale(r), scale(g), scale(b))
        }
        other => other,
    }
}

/// Camera preview with the scanner overlay
struct PreviewWidget<'a> {
    frame: Option<&'a FrameBuffer>,
    placeholder: &'a str,
}

impl Widget for PreviewWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.filter(|f| f.is_complete()) else {
            let msg = self.placeholder;
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        let display = fit_frame(area, frame);
        if display.width == 0 || display.height == 0 {
            return;
        }

        let x_scale = frame.width as f64 / display.width as f64;
        let y_scale = frame.height as f64 / (display.height * 2) as f64;
        let window = scan_window(display);

        // Each terminal cell represents 2 vertical pixels:
        // upper half (▀) colored with fg, lower half with bg
        for ty in 0..display.height {
            for tx in 0..display.width {
                let position = Position::new(display.x + tx, display.y + ty);

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let mut top = sample_pixel(frame, src_x, src_y_top);
                let mut bottom = sample_pixel(frame, src_x, src_y_bottom);
                if !window.contains(position) {
                    top = dim(top);
                    bottom = dim(bottom);
                }

                if let Some(cell) = buf.cell_mut(position) {
                    cell.set_char('▀');
                    cell.set_fg(top);
                    cell.set_bg(bottom);
                }
            }
        }

        Block::bordered()
            .border_style(Style::default().fg(Color::White))
            .render(window, buf);
    }
}

fn sample_pixel(frame: &FrameBuffer, x: u32, y: u32) -> Color {
    let (r, g, b) = sample_pixel_rgb(frame, x, y);
    Color::Rgb(r, g, b)
}

fn sample_pixel_rgb(frame: &FrameBuffer, x: u32, y: u32) -> (u8, u8, u8) {
    let x = x.min(frame.width - 1);
    let y = y.min(frame.height - 1);
    let data = &frame.data[..];

    match frame.format {
        PixelFormat::RGBA | PixelFormat::BGRA => {
            let idx = (y * frame.stride + x * 4) as usize;
            if idx + 2 >= data.len() {
                return (0, 0, 0);
            }
            if frame.format == PixelFormat::RGBA {
                (data[idx], data[idx + 1], data[idx + 2])
            } else {
                (data[idx + 2], data[idx + 1], data[idx])
            }
        }
        PixelFormat::RGB24 => {
            let idx = (y * frame.stride + x * 3) as usize;
            if idx + 2 < data.len() {
                (data[idx], data[idx + 1], data[idx + 2])
            } else {
                (0, 0, 0)
            }
        }
        PixelFormat::Gray8 => {
            let idx = (y * frame.stride + x) as usize;
            if idx < data.len() {
                let v = data[idx];
                (v, v, v)
            } else {
                (0, 0, 0)
            }
        }
        PixelFormat::NV12 | PixelFormat::NV21 => {
            let y_idx = (y * frame.stride + x) as usize;
            if y_idx >= data.len() {
                return (0, 0, 0);
            }
            let luma = data[y_idx];

            // Interleaved chroma plane follows the luma plane at half height
            let uv_offset = (frame.stride * frame.height) as usize;
            let uv_idx = uv_offset + (y / 2) as usize * frame.stride as usize + (x & !1) as usize;
            if uv_idx + 1 >= data.len() {
                return (luma, luma, luma);
            }

            let (u, v) = if frame.format == PixelFormat::NV12 {
                (data[uv_idx], data[uv_idx + 1])
            } else {
                (data[uv_idx + 1], data[uv_idx])
            };
            yuv_to_rgb(luma, u, v)
        }
        PixelFormat::I420 => {
            let y_idx = (y * frame.stride + x) as usize;
            if y_idx >= data.len() {
                return (0, 0, 0);
            }
            let luma = data[y_idx];

            let y_size = (frame.stride * frame.height) as usize;
            let half_stride = (frame.stride / 2) as usize;
            let u_size = half_stride * (frame.height / 2) as usize;
            let chroma = (y / 2) as usize * half_stride + (x / 2) as usize;
            let (u_idx, v_idx) = (y_size + chroma, y_size + u_size + chroma);
            if v_idx >= data.len() {
                return (luma, luma, luma);
            }
            yuv_to_rgb(luma, data[u_idx], data[v_idx])
        }
        PixelFormat::YUYV | PixelFormat::YVYU => {
            // YUYV: Y0 U Y1 V, YVYU: Y0 V Y1 U
            let base = y as usize * frame.stride as usize + (x & !1) as usize * 2;
            if base + 3 >= data.len() {
                return (0, 0, 0);
            }
            let luma = if x & 1 == 0 { data[base] } else { data[base + 2] };
            let (u, v) = if frame.format == PixelFormat::YUYV {
                (data[base + 1], data[base + 3])
            } else {
                (data[base + 3], data[base + 1])
            };
            yuv_to_rgb(luma, u, v)
        }
        PixelFormat::UYVY | PixelFormat::VYUY => {
            // UYVY: U Y0 V Y1, VYUY: V Y0 U Y1
            let base = y as usize * frame.stride as usize + (x & !1) as usize * 2;
            if base + 3 >= data.len() {
                return (0, 0, 0);
            }
            let luma = if x & 1 == 0 { data[base + 1] } else { data[base + 3] };
            let (u, v) = if frame.format == PixelFormat::UYVY {
                (data[base], data[base + 2])
            } else {
                (data[base + 2], data[base])
            };
            yuv_to_rgb(luma, u, v)
        }
    }
}

/// Convert YUV (BT.601) to RGB
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}

/// Title row with the torch indicator on the right
struct TitleBar {
    /// `None` when the camera has no controllable light
    torch: Option<bool>,
}

impl Widget for TitleBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default().fg(Color::White).bg(Color::Black);
        buf.set_style(area, style);

        let title_width = ui::TITLE.chars().count() as u16;
        let title_x = area.x + area.width.saturating_sub(title_width) / 2;
        buf.set_string(title_x, area.y, ui::TITLE, style.add_modifier(Modifier::BOLD));

        let indicator = match self.torch {
            Some(true) => "[t] Torch: on ",
            Some(false) => "[t] Torch: off",
            None => "",
        };
        let width = indicator.chars().count() as u16;
        // Only when it fits right of the title
        if !indicator.is_empty()
            && area.width > width + 1
            && area.x + area.width - width - 1 > title_x + title_width
        {
            let torch_style = if self.torch == Some(true) {
                style.fg(Color::Yellow)
            } else {
                style
            };
            buf.set_string(area.x + area.width - width - 1, area.y, indicator, torch_style);
        }
    }
}

/// Modal showing the latched result
struct ResultDialog<'a> {
    presenter: &'a ResultPresenter,
}

impl Widget for ResultDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = (area.width as f32 * ui::SCAN_WINDOW_FRACTION).max(20.0) as u16;
        let width = width.min(area.width);
        let inner_width = width.saturating_sub(2).max(1) as usize;
        let text_lines: usize = self
            .presenter
            .text()
            .split('\n')
            .map(|line| line.chars().count().div_ceil(inner_width).max(1))
            .sum();
        let height = (text_lines as u16 + 4).min(area.height);

        let dialog = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        };

        Clear.render(dialog, buf);
        let block = Block::bordered()
            .title(ui::DIALOG_TITLE)
            .border_style(Style::default().fg(Color::White));
        let inner = block.inner(dialog);
        block.render(dialog, buf);

        let [text_area, _, buttons_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(inner);

        Paragraph::new(self.presenter.text())
            .wrap(Wrap { trim: false })
            .render(text_area, buf);

        let mut spans = Vec::new();
        for action in self.presenter.actions() {
            if !spans.is_empty() {
                spans.push(Span::raw("  "));
            }
            spans.push(Span::styled(
                format!("[{}] {}", action.key(), action.label()),
                Style::default().fg(Color::Cyan),
            ));
        }
        Line::from(spans).render(buttons_area, buf);
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default().fg(Color::White).bg(Color::DarkGray);
        buf.set_style(area, style);

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(area.x, area.y, text, style);
    }
}
