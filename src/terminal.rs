// SPDX-License-Identifier: GPL-3.0-only

//! Terminal photobooth
//!
//! Renders the intake form, the live preview and the captured photo to the
//! terminal. Pictures use Unicode half-block characters for improved vertical
//! resolution. All camera work happens on the session task; this module only
//! sends [`Command`]s and draws the published snapshots.

use crate::app::{
    CaptureState, CapturedImage, Command, Notice, SessionHandle, SessionUpdate, StreamStatus,
};
use crate::backends::camera::types::{CameraFrame, Resolution};
use crate::constants::timing;
use crate::errors::AppResult;
use crate::fl;
use crate::pipelines::photo::PointerSample;

use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use image::RgbaImage;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use std::io::{Stdout, stdout};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Run the terminal photobooth until the user quits
///
/// The session is torn down before the terminal is restored, so the camera
/// is released even when drawing fails.
pub async fn run(handle: SessionHandle) -> AppResult<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &handle).await;

    handle.teardown().await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    handle: &SessionHandle,
) -> AppResult<()> {
    let mut app = TerminalApp::new(handle.clone());
    let mut events = EventStream::new();
    let mut updates = handle.updates();
    let mut ticker = tokio::time::interval(timing::UI_TICK);

    loop {
        terminal.draw(|f| app.draw(f))?;

        tokio::select! {
            _ = ticker.tick() => {}
            changed = updates.changed() => {
                if changed.is_err() {
                    info!("Session ended");
                    break;
                }
                let update = updates.borrow_and_update().clone();
                app.apply_update(update);
            }
            event = events.next() => match event {
                Some(Ok(event)) => {
                    if app.handle_event(event)? == Flow::Quit {
                        break;
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Intake,
    Booth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Field {
    #[default]
    Name,
    Branch,
}

/// Name and branch entry shown before the booth
#[derive(Debug, Default)]
struct IntakeForm {
    name: String,
    branch: String,
    focus: Field,
}

impl IntakeForm {
    /// Continue is enabled only when both fields have visible content
    fn can_continue(&self) -> bool {
        !self.name.trim().is_empty() && !self.branch.trim().is_empty()
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Field::Name => Field::Branch,
            Field::Branch => Field::Name,
        };
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            Field::Name => &mut self.name,
            Field::Branch => &mut self.branch,
        }
    }

    /// Move focus to the first field still missing
    fn focus_missing(&mut self) {
        if self.name.trim().is_empty() {
            self.focus = Field::Name;
        } else if self.branch.trim().is_empty() {
            self.focus = Field::Branch;
        }
    }
}

/// Where the last picture was drawn and what it showed
#[derive(Debug, Clone, Copy)]
struct PicturePlacement {
    area: Rect,
    source: Resolution,
}

struct TerminalApp {
    handle: SessionHandle,
    status: watch::Receiver<StreamStatus>,
    screen: Screen,
    intake: IntakeForm,
    update: SessionUpdate,
    /// Decoded copy of the captured PNG for display
    still: Option<Arc<RgbaImage>>,
    status_message: Option<String>,
    placement: Option<PicturePlacement>,
}

impl TerminalApp {
    fn new(handle: SessionHandle) -> Self {
        let update = handle.latest();
        let status = handle.stream_status();
        Self {
            handle,
            status,
            screen: Screen::Intake,
            intake: IntakeForm::default(),
            still: None,
            update,
            status_message: None,
            placement: None,
        }
    }

    fn apply_update(&mut self, update: SessionUpdate) {
        match &update.notice {
            Some(Notice::Saved(path)) => {
                self.status_message =
                    Some(fl!("status-saved", path = path.display().to_string()));
            }
            Some(Notice::SaveFailed(error)) => {
                self.status_message = Some(fl!("status-save-failed", error = error.clone()));
            }
            Some(Notice::IdentityRejected(reason)) => {
                self.screen = Screen::Intake;
                self.intake.focus_missing();
                self.status_message = Some(reason.clone());
            }
            None => {}
        }

        if update.snapshot.image != self.update.snapshot.image {
            self.still = update.snapshot.image.as_ref().and_then(decode_still);
        }
        self.update = update;
    }

    fn send(&mut self, command: Command) -> AppResult<()> {
        debug!(?command, "Sending command");
        self.status_message = None;
        self.handle.dispatch(command)
    }

    fn handle_event(&mut self, event: Event) -> AppResult<Flow> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                // Ctrl+C quits from any screen
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    return Ok(Flow::Quit);
                }
                match self.screen {
                    Screen::Intake => self.handle_intake_key(key),
                    Screen::Booth => self.handle_booth_key(key),
                }
            }
            Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                self.sample_pointer(mouse.column, mouse.row);
                Ok(Flow::Continue)
            }
            _ => Ok(Flow::Continue),
        }
    }

    fn handle_intake_key(&mut self, key: KeyEvent) -> AppResult<Flow> {
        match key.code {
            KeyCode::Esc => return Ok(Flow::Quit),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.intake.toggle_focus();
            }
            KeyCode::Enter => {
                if self.intake.can_continue() {
                    let command = Command::SubmitIdentity {
                        name: self.intake.name.clone(),
                        branch: self.intake.branch.clone(),
                    };
                    self.send(command)?;
                    self.screen = Screen::Booth;
                } else {
                    self.intake.focus_missing();
                }
            }
            KeyCode::Backspace => {
                self.intake.focused_mut().pop();
            }
            KeyCode::Char(c) => {
                self.intake.focused_mut().push(c);
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }

    fn handle_booth_key(&mut self, key: KeyEvent) -> AppResult<Flow> {
        let snapshot = &self.update.snapshot;
        let command = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(Flow::Quit),
            KeyCode::Char('c') | KeyCode::Char(' ') if snapshot.can_capture => Some(Command::Capture),
            KeyCode::Char('r') => match snapshot.state {
                CaptureState::Captured => Some(Command::Retake),
                CaptureState::Error => Some(Command::Retry),
                CaptureState::Preview => None,
            },
            KeyCode::Char('s') if snapshot.can_switch => Some(Command::SwitchCamera),
            KeyCode::Char('d') if snapshot.image.is_some() => Some(Command::Download),
            _ => None,
        };
        if let Some(command) = command {
            self.send(command)?;
        }
        Ok(Flow::Continue)
    }

    /// Show where a click lands on the picture in surface pixels
    fn sample_pointer(&mut self, column: u16, row: u16) {
        let Some(placement) = self.placement else {
            return;
        };
        let area = placement.area;
        if column < area.x || row < area.y {
            return;
        }
        // Cell centers, in cell units on both axes
        let x = (column - area.x) as f32 + 0.5;
        let y = (row - area.y) as f32 + 0.5;
        if let Some(sample) = PointerSample::from_display(
            x,
            y,
            (area.width as f32, area.height as f32),
            placement.source,
        ) {
            self.status_message = Some(fl!(
                "status-pointer",
                x = sample.x_pixels,
                xp = format!("{:.1}", sample.x_percent),
                y = sample.y_pixels,
                yp = format!("{:.1}", sample.y_percent)
            ));
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        match self.screen {
            Screen::Intake => {
                self.placement = None;
                self.draw_intake(frame, area);
            }
            Screen::Booth => self.draw_booth(frame, area),
        }
    }

    fn draw_intake(&self, frame: &mut Frame, area: Rect) {
        let form = centered(area, 48, 11);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(fl!("intake-title"));
        let inner = block.inner(form);
        frame.render_widget(block, form);

        let [name_label, name_input, branch_label, branch_input, _, button, hint] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .areas(inner);

        frame.render_widget(Paragraph::new(fl!("intake-name")), name_label);
        frame.render_widget(
            input_line(
                &self.intake.name,
                &fl!("intake-name-placeholder"),
                self.intake.focus == Field::Name,
            ),
            name_input,
        );
        frame.render_widget(Paragraph::new(fl!("intake-branch")), branch_label);
        frame.render_widget(
            input_line(
                &self.intake.branch,
                &fl!("intake-branch-placeholder"),
                self.intake.focus == Field::Branch,
            ),
            branch_input,
        );

        let button_style = if self.intake.can_continue() {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        frame.render_widget(
            Paragraph::new(Span::styled(format!("[ {} ]", fl!("intake-continue")), button_style))
                .alignment(Alignment::Center),
            button,
        );

        let hint_text = self
            .status_message
            .clone()
            .unwrap_or_else(|| fl!("intake-hint"));
        frame.render_widget(
            Paragraph::new(hint_text)
                .style(Style::default().fg(Color::Gray))
                .alignment(Alignment::Center),
            hint,
        );
    }

    fn draw_booth(&mut self, frame: &mut Frame, area: Rect) {
        let [header, body, footer] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .areas(area);

        let state = self.update.snapshot.state;
        let loading = self.status.borrow().loading;

        let header_text = match state {
            CaptureState::Preview if loading => fl!("preview-initializing"),
            CaptureState::Preview => fl!("preview-instructions"),
            CaptureState::Captured => fl!("preview-retake-hint"),
            CaptureState::Error => String::new(),
        };
        frame.render_widget(
            Paragraph::new(header_text).alignment(Alignment::Center),
            header,
        );

        self.placement = None;
        match state {
            CaptureState::Error => {
                let message = self
                    .update
                    .snapshot
                    .error
                    .as_ref()
                    .map(|e| e.user_message())
                    .unwrap_or_default();
                let box_area = centered(body, body.width.saturating_sub(4).min(72), 5);
                frame.render_widget(
                    Paragraph::new(message)
                        .style(Style::default().fg(Color::LightRed))
                        .alignment(Alignment::Center)
                        .wrap(Wrap { trim: true })
                        .block(Block::default().borders(Borders::ALL)),
                    box_area,
                );
            }
            CaptureState::Captured => {
                if let Some(still) = self.still.clone() {
                    self.draw_picture(frame, body, still.as_ref());
                }
            }
            CaptureState::Preview => match self.handle.sink().latest_frame() {
                Some(camera_frame) => self.draw_picture(frame, body, camera_frame.as_ref()),
                None => {
                    let message = if loading {
                        fl!("preview-initializing")
                    } else {
                        fl!("preview-waiting")
                    };
                    frame.render_widget(
                        Paragraph::new(message).alignment(Alignment::Center),
                        centered(body, body.width, 1),
                    );
                }
            },
        }

        let message = self
            .status_message
            .clone()
            .unwrap_or_else(|| controls_line(&self.update));
        frame.render_widget(StatusBar { message: &message }, footer);
    }

    fn draw_picture<P: PixelSource>(&mut self, frame: &mut Frame, body: Rect, picture: &P) {
        let (width, height) = picture.size();
        let area = fit_picture(body, width, height);
        frame.render_widget(PictureWidget { picture }, area);
        self.placement = Some(PicturePlacement {
            area,
            source: Resolution::new(width, height),
        });
    }
}

fn decode_still(image: &CapturedImage) -> Option<Arc<RgbaImage>> {
    match image::load_from_memory(image.bytes()) {
        Ok(decoded) => Some(Arc::new(decoded.to_rgba8())),
        Err(e) => {
            warn!(error = %e, "Failed to decode captured photo for display");
            None
        }
    }
}

fn input_line<'a>(value: &'a str, placeholder: &'a str, focused: bool) -> Paragraph<'a> {
    let marker = if focused { "> " } else { "  " };
    let content = if value.is_empty() {
        Span::styled(placeholder, Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(value)
    };
    let mut line = Line::from(vec![Span::raw(marker), content]);
    if focused {
        line = line.style(Style::default().add_modifier(Modifier::UNDERLINED));
    }
    Paragraph::new(line)
}

/// Key hints for the actions currently available
///
/// Switching is only listed while the session offers it.
fn controls_line(update: &SessionUpdate) -> String {
    let snapshot = &update.snapshot;
    let mut controls = Vec::new();
    match snapshot.state {
        CaptureState::Preview => {
            if snapshot.can_capture {
                controls.push(format!("'c' {}", fl!("control-capture")));
            }
            if snapshot.can_switch {
                controls.push(format!("'s' {}", fl!("control-switch")));
            }
        }
        CaptureState::Captured => {
            controls.push(format!("'d' {}", fl!("control-download")));
            controls.push(format!("'r' {}", fl!("control-retake")));
        }
        CaptureState::Error => {
            controls.push(format!("'r' {}", fl!("control-retry")));
        }
    }
    controls.push(format!("'q' {}", fl!("control-quit")));
    controls.join(" | ")
}

/// Rect of `width` x `height` cells centered in `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Largest centered rect showing a `width` x `height` picture undistorted
///
/// Each cell displays two vertical pixels.
fn fit_picture(area: Rect, width: u32, height: u32) -> Rect {
    if width == 0 || height == 0 || area.width == 0 || area.height == 0 {
        return Rect::new(area.x, area.y, 0, 0);
    }
    let aspect = width as f64 / height as f64;
    let term_width = area.width as f64;
    let term_height = area.height as f64 * 2.0;

    let (display_width, display_height) = if term_width / term_height > aspect {
        // Terminal is wider - fit to height
        let w = term_height * aspect;
        (w as u16, (term_height / 2.0) as u16)
    } else {
        // Terminal is taller - fit to width
        let h = term_width / aspect;
        (term_width as u16, (h / 2.0) as u16)
    };

    Rect {
        x: area.x + area.width.saturating_sub(display_width) / 2,
        y: area.y + area.height.saturating_sub(display_height) / 2,
        width: display_width.min(area.width),
        height: display_height.min(area.height),
    }
}

/// Anything the picture widget can sample
trait PixelSource {
    fn size(&self) -> (u32, u32);
    fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8);
}

impl PixelSource for CameraFrame {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        self.sample_rgb(x, y)
    }
}

impl PixelSource for RgbaImage {
    fn size(&self) -> (u32, u32) {
        self.dimensions()
    }

    fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return (0, 0, 0);
        }
        let [r, g, b, _] = self.get_pixel(x.min(width - 1), y.min(height - 1)).0;
        (r, g, b)
    }
}

/// Widget that stretches a picture over its area using half-block characters
struct PictureWidget<'a, P: PixelSource> {
    picture: &'a P,
}

impl<P: PixelSource> Widget for PictureWidget<'_, P> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (width, height) = self.picture.size();
        if area.width == 0 || area.height == 0 || width == 0 || height == 0 {
            return;
        }

        let x_scale = width as f64 / area.width as f64;
        let y_scale = height as f64 / (area.height as f64 * 2.0);

        // Upper half (▀) colored with fg, lower half with bg
        for ty in 0..area.height {
            for tx in 0..area.width {
                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let (r, g, b) = self.picture.pixel(src_x, src_y_top);
                let top = Color::Rgb(r, g, b);
                let (r, g, b) = self.picture.pixel(src_x, src_y_bottom);
                let bottom = Color::Rgb(r, g, b);

                if let Some(cell) = buf.cell_mut((area.x + tx, area.y + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(top);
                    cell.set_bg(bottom);
                }
            }
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default().fg(Color::White).bg(Color::DarkGray);
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }
        buf.set_stringn(area.x, area.y, self.message, area.width as usize, style);
    }
}
