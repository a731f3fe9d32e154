// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use capview_app::{
    AppCommand, AppEvent, AppMode, AppState, Capture, DetailToken, DetailView, SortOrder,
};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use std::io;
use std::ops::Range;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const PAGE_ROWS: isize = 10;
const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);

pub trait AppRuntime {
    fn load_captures(&mut self, order: SortOrder) -> Result<Vec<Capture>>;
    fn captures_today(&mut self) -> Result<usize>;
    fn resolve_detail(&mut self, file_name: &str) -> Result<DetailView>;
    /// Resolves on the calling thread by default. Runtimes backed by a slow
    /// source override this and answer from a worker thread.
    fn spawn_detail_request(
        &mut self,
        token: DetailToken,
        file_name: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let result = self
            .resolve_detail(file_name)
            .map_err(|error| error.to_string());
        tx.send(InternalEvent::Detail { token, result })
            .map_err(|_| anyhow!("detail event channel closed"))?;
        Ok(())
    }
    fn delete_capture(&mut self, file_name: &str) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    Detail {
        token: DetailToken,
        result: Result<DetailView, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    help_visible: bool,
    status_token: u64,
    captures_today: Option<usize>,
    pending_delete: Option<String>,
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = refresh_captures(state, runtime, &mut view_data) {
        warn!(error = %format!("{error:#}"), "initial capture load failed");
        state.dispatch(AppCommand::SetStatus(format!("load failed: {error}")));
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        match next_key_event(Duration::from_millis(120)) {
            Ok(Some(key)) => {
                if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                    break;
                }
            }
            Ok(None) => {}
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }

    restore_terminal(result)
}

fn next_key_event(timeout: Duration) -> Result<Option<KeyEvent>> {
    if !event::poll(timeout).context("poll event")? {
        return Ok(None);
    }
    match event::read().context("read event")? {
        Event::Key(key) => Ok(Some(key)),
        _ => Ok(None),
    }
}

// Runs on every exit path out of the event loop; a loop error takes priority
// over a failure to restore.
fn restore_terminal(result: Result<()>) -> Result<()> {
    let raw = disable_raw_mode().context("disable raw mode");
    let screen = execute!(io::stdout(), terminal::LeaveAlternateScreen)
        .context("leave alternate screen");
    result.and(raw).and(screen)
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Detail { token, result } => {
                let command = match result {
                    Ok(view) => AppCommand::DetailLoaded { token, view },
                    Err(error) => AppCommand::DetailFailed { token, error },
                };
                let events = state.dispatch(command);
                for event in &events {
                    match event {
                        AppEvent::StaleDetailDropped(token) => {
                            debug!(token = token.get(), "dropped stale detail response");
                        }
                        AppEvent::DetailFailed(error) => {
                            warn!(token = token.get(), %error, "detail request failed");
                        }
                        _ => {}
                    }
                }
                arm_status_clear(view_data, tx, &events);
            }
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    let events = state.dispatch(AppCommand::SetStatus(message.into()));
    arm_status_clear(view_data, internal_tx, &events);
}

// Any status the state machine sets on its own gets the same timed clear.
fn arm_status_clear(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    events: &[AppEvent],
) {
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
}

fn dispatch<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    let events = state.dispatch(command);
    arm_status_clear(view_data, internal_tx, &events);

    for event in events {
        let AppEvent::DetailRequested { token, file_name } = event else {
            continue;
        };
        debug!(token = token.get(), file = %file_name, "requesting detail");
        if let Err(error) = runtime.spawn_detail_request(token, &file_name, internal_tx.clone()) {
            let follow_up = state.dispatch(AppCommand::DetailFailed {
                token,
                error: error.to_string(),
            });
            arm_status_clear(view_data, internal_tx, &follow_up);
        }
    }
}

fn refresh_captures<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<usize> {
    let captures = runtime.load_captures(state.sort_order)?;
    let total = captures.len();
    state.dispatch(AppCommand::LoadCaptures(captures));

    view_data.captures_today = match runtime.captures_today() {
        Ok(count) => Some(count),
        Err(error) => {
            warn!(error = %format!("{error:#}"), "count captures from today");
            None
        }
    };
    Ok(total)
}

fn reload<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match refresh_captures(state, runtime, view_data) {
        Ok(total) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("reloaded {total} captures"),
        ),
        Err(error) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("reload failed: {error}"),
        ),
    }
}

fn confirm_delete<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    file_name: &str,
) {
    match runtime.delete_capture(file_name) {
        Ok(existed) => {
            let detail_open = state
                .detail
                .shown
                .as_ref()
                .is_some_and(|view| view.file_name == file_name);
            if detail_open {
                state.dispatch(AppCommand::CloseDetail);
            }
            if let Err(error) = refresh_captures(state, runtime, view_data) {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("deleted {file_name}; reload failed: {error}"),
                );
                return;
            }
            let message = if existed {
                format!("deleted {file_name}")
            } else {
                format!("{file_name} was already gone")
            };
            emit_status(state, view_data, internal_tx, message);
        }
        Err(error) => {
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("delete failed: {error}"),
            );
        }
    }
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return false;
    }

    if let Some(file_name) = view_data.pending_delete.take() {
        if key.code == KeyCode::Char('y') {
            confirm_delete(state, runtime, view_data, internal_tx, &file_name);
        } else {
            emit_status(state, view_data, internal_tx, "delete canceled");
        }
        return false;
    }

    if state.mode == AppMode::Search {
        handle_search_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('/'), _) => {
            dispatch(state, runtime, view_data, internal_tx, AppCommand::FocusSearch);
        }
        (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::MoveSelection(1),
            );
        }
        (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::MoveSelection(-1),
            );
        }
        (KeyCode::Char('d'), KeyModifiers::CONTROL) | (KeyCode::PageDown, _) => {
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::MoveSelection(PAGE_ROWS),
            );
        }
        (KeyCode::Char('u'), KeyModifiers::CONTROL) | (KeyCode::PageUp, _) => {
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::MoveSelection(-PAGE_ROWS),
            );
        }
        (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
            dispatch(state, runtime, view_data, internal_tx, AppCommand::SelectFirst);
        }
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => {
            dispatch(state, runtime, view_data, internal_tx, AppCommand::SelectLast);
        }
        (KeyCode::Enter, _) => {
            dispatch(state, runtime, view_data, internal_tx, AppCommand::RequestDetail);
        }
        (KeyCode::Char('s'), KeyModifiers::NONE) => {
            dispatch(state, runtime, view_data, internal_tx, AppCommand::ToggleSort);
        }
        (KeyCode::Char('r'), KeyModifiers::NONE) => {
            reload(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('x'), KeyModifiers::NONE) => {
            let Some(file_name) = state
                .selected_capture()
                .map(|capture| capture.file_name().to_owned())
            else {
                emit_status(state, view_data, internal_tx, "no capture selected");
                return false;
            };
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("delete {file_name}? y to confirm, any other key cancels"),
            );
            view_data.pending_delete = Some(file_name);
        }
        (KeyCode::Char('?'), _) => {
            view_data.help_visible = true;
        }
        (KeyCode::Esc, _) => {
            if state.detail.shown.is_some() || state.detail.pending.is_some() {
                dispatch(state, runtime, view_data, internal_tx, AppCommand::CloseDetail);
            } else if !state.query().is_empty() {
                dispatch(
                    state,
                    runtime,
                    view_data,
                    internal_tx,
                    AppCommand::SetQuery(String::new()),
                );
                emit_status(state, view_data, internal_tx, "filter cleared");
            }
        }
        _ => {}
    }
    false
}

fn handle_search_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let command = match (key.code, key.modifiers) {
        (KeyCode::Esc, _) | (KeyCode::Enter, _) => AppCommand::ExitSearch,
        (KeyCode::Backspace, _) => AppCommand::PopQueryChar,
        (KeyCode::Char('u'), KeyModifiers::CONTROL) => AppCommand::SetQuery(String::new()),
        (KeyCode::Down, _) => AppCommand::MoveSelection(1),
        (KeyCode::Up, _) => AppCommand::MoveSelection(-1),
        (KeyCode::Char(ch), modifiers)
            if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            AppCommand::PushQueryChar(ch)
        }
        _ => return,
    };
    dispatch(state, runtime, view_data, internal_tx, command);
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let search_style = if state.mode == AppMode::Search {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::White)
    };
    let search = Paragraph::new(search_bar_text(state)).style(search_style).block(
        Block::default()
            .title(header_title(state))
            .borders(Borders::ALL),
    );
    frame.render_widget(search, layout[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(layout[1]);
    render_gallery(frame, body[0], state);

    let detail = Paragraph::new(render_detail_text(state))
        .wrap(Wrap { trim: false })
        .block(Block::default().title("detail").borders(Borders::ALL));
    frame.render_widget(detail, body[1]);

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, layout[2]);

    if view_data.help_visible {
        let area = centered_rect(64, 50, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn header_title(state: &AppState) -> String {
    format!(
        "capview | {} | {}/{} shown",
        state.sort_order.label(),
        state.gallery.visible_count(),
        state.gallery.len()
    )
}

fn search_bar_text(state: &AppState) -> String {
    match state.mode {
        AppMode::Search => format!("/{}_", state.query()),
        AppMode::Browse if state.query().is_empty() => "press / to filter captures".to_owned(),
        AppMode::Browse => format!("/{}", state.query()),
    }
}

fn render_gallery(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState) {
    // Two border rows plus the header row.
    let body_rows = usize::from(area.height.saturating_sub(3));
    let window = gallery_window(state.selected, state.gallery.visible_count(), body_rows);

    let header = Row::new(["id", "capture", "taken"].map(|label| {
        Cell::from(label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = state
        .gallery
        .visible()
        .enumerate()
        .skip(window.start)
        .take(window.len())
        .map(|(index, capture)| {
            let style = if index == state.selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Row::new(gallery_cells(capture)).style(style)
        })
        .collect::<Vec<_>>();

    let widths = [
        Constraint::Length(6),
        Constraint::Min(12),
        Constraint::Length(24),
    ];
    let title = if state.gallery.visible_count() == 0 && !state.gallery.is_empty() {
        "captures (no match)"
    } else {
        "captures"
    };
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn gallery_cells(capture: &Capture) -> [String; 3] {
    let id = capture
        .name
        .detection_id
        .map(|id| id.get().to_string())
        .unwrap_or_else(|| "-".to_owned());
    let taken = match (&capture.name.date_raw, &capture.name.time_raw) {
        (Some(date), Some(clock)) => format!("{date} {clock}"),
        _ => String::new(),
    };
    [id, capture.label().to_owned(), taken]
}

/// Rows of the visible list to draw so the selection stays on screen.
fn gallery_window(selected: usize, count: usize, rows: usize) -> Range<usize> {
    if rows == 0 || count == 0 {
        return 0..0;
    }
    if count <= rows {
        return 0..count;
    }
    let start = selected.saturating_sub(rows - 1).min(count - rows);
    start..start + rows
}

fn render_detail_text(state: &AppState) -> String {
    let mut lines = Vec::new();
    if let Some(pending) = &state.detail.pending {
        lines.push(format!("loading {}...", pending.file_name));
        lines.push(String::new());
    }

    match &state.detail.shown {
        Some(view) => {
            lines.push(view.file_name.clone());
            lines.push(format!("image: {}", view.src));
            if let Some(index) = state.gallery.position_of(&view.file_name)
                && let Some(capture) = state.gallery.nth_visible(index)
            {
                if let Some(id) = capture.name.detection_id {
                    lines.push(format!("detection: {}", id.get()));
                }
                let [_, _, taken] = gallery_cells(capture);
                if !taken.is_empty() {
                    lines.push(format!("taken: {taken}"));
                }
                lines.push(format!("size: {}", format_size(capture.size_bytes)));
            }
            lines.push(String::new());
            lines.push("esc close".to_owned());
        }
        None if state.detail.pending.is_none() => {
            lines.push("enter shows the selected capture".to_owned());
        }
        None => {}
    }
    lines.join("\n")
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if let Some(status) = &state.status_line {
        return status.clone();
    }

    let today = view_data
        .captures_today
        .map(|count| format!("today: {count} | "))
        .unwrap_or_default();
    match state.mode {
        AppMode::Search => format!("{today}type to filter | enter/esc done | ctrl+u clear"),
        AppMode::Browse => format!(
            "{today}/ search | enter view | s sort | r reload | x delete | ? help | ctrl+q quit"
        ),
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ? help\n\
browse: j/k or up/down move | g/G first/last | pgup/pgdn or ctrl+u/ctrl+d page\n\
browse: enter view capture | esc close detail or clear filter\n\
browse: s toggle newest/oldest | r reload | x delete (y confirms)\n\
search: / focus | type to filter | backspace erase | ctrl+u clear | enter/esc done"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, ViewData, emit_status, format_size, gallery_window,
        handle_key_event, header_title, help_overlay_text, process_internal_events,
        refresh_captures, render_detail_text, restore_terminal, search_bar_text, status_text,
    };
    use anyhow::{Result, anyhow};
    use capview_app::{AppMode, AppState, Capture, DetailToken, DetailView, SortOrder};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::path::Path;
    use std::sync::mpsc::{self, Receiver, Sender};

    #[derive(Debug, Default)]
    struct TestRuntime {
        captures: Vec<String>,
        today: usize,
        failing: Vec<String>,
        defer_details: bool,
        deferred: Vec<(DetailToken, String)>,
        deleted: Vec<String>,
    }

    impl TestRuntime {
        fn with_captures(names: &[&str]) -> Self {
            Self {
                captures: names.iter().map(|name| (*name).to_owned()).collect(),
                ..Self::default()
            }
        }
    }

    impl AppRuntime for TestRuntime {
        fn load_captures(&mut self, _order: SortOrder) -> Result<Vec<Capture>> {
            Ok(self
                .captures
                .iter()
                .filter_map(|name| Capture::from_path(Path::new(name)))
                .collect())
        }

        fn captures_today(&mut self) -> Result<usize> {
            Ok(self.today)
        }

        fn resolve_detail(&mut self, file_name: &str) -> Result<DetailView> {
            if self.failing.iter().any(|name| name == file_name) {
                return Err(anyhow!("server returned 404"));
            }
            Ok(DetailView {
                file_name: file_name.to_owned(),
                src: format!("/static/{file_name}"),
            })
        }

        fn spawn_detail_request(
            &mut self,
            token: DetailToken,
            file_name: &str,
            tx: Sender<InternalEvent>,
        ) -> Result<()> {
            if self.defer_details {
                self.deferred.push((token, file_name.to_owned()));
                return Ok(());
            }
            let result = self
                .resolve_detail(file_name)
                .map_err(|error| error.to_string());
            tx.send(InternalEvent::Detail { token, result })
                .map_err(|_| anyhow!("detail event channel closed"))?;
            Ok(())
        }

        fn delete_capture(&mut self, file_name: &str) -> Result<bool> {
            let before = self.captures.len();
            self.captures.retain(|name| name != file_name);
            self.deleted.push(file_name.to_owned());
            Ok(self.captures.len() != before)
        }
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn new(runtime: TestRuntime) -> Self {
            let mut state = AppState::default();
            let mut runtime = runtime;
            let mut view_data = ViewData::default();
            refresh_captures(&mut state, &mut runtime, &mut view_data)
                .expect("test runtime loads");
            let (tx, rx) = mpsc::channel();
            Self {
                state,
                runtime,
                view_data,
                tx,
                rx,
            }
        }

        fn press(&mut self, code: KeyCode) -> bool {
            self.press_with(code, KeyModifiers::NONE)
        }

        fn press_with(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, modifiers),
            )
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.press(KeyCode::Char(ch));
            }
        }

        fn pump(&mut self) {
            process_internal_events(&mut self.state, &mut self.view_data, &self.tx, &self.rx);
        }

        fn visible_names(&self) -> Vec<String> {
            self.state
                .gallery
                .visible()
                .map(|capture| capture.file_name().to_owned())
                .collect()
        }
    }

    fn beach_runtime() -> TestRuntime {
        TestRuntime::with_captures(&["beach.png", "forest.png", "beach2.png"])
    }

    #[test]
    fn restore_terminal_keeps_the_event_loop_error() {
        let error = restore_terminal(Err(anyhow!("poll event: device gone")))
            .expect_err("loop error should survive terminal restore");
        assert!(error.to_string().contains("poll event"));
    }

    #[test]
    fn slash_then_typing_filters_gallery() {
        let mut harness = Harness::new(beach_runtime());
        harness.press(KeyCode::Char('/'));
        assert_eq!(harness.state.mode, AppMode::Search);

        harness.type_text("BEACH");
        let mut names = harness.visible_names();
        names.sort();
        assert_eq!(names, vec!["beach.png".to_owned(), "beach2.png".to_owned()]);
        assert_eq!(search_bar_text(&harness.state), "/BEACH_");

        harness.press(KeyCode::Esc);
        assert_eq!(harness.state.mode, AppMode::Browse);
        assert_eq!(harness.state.query(), "BEACH");
        assert_eq!(search_bar_text(&harness.state), "/BEACH");
    }

    #[test]
    fn search_mode_keys_do_not_trigger_browse_actions() {
        let mut harness = Harness::new(beach_runtime());
        harness.press(KeyCode::Char('/'));
        harness.type_text("xs");
        assert_eq!(harness.state.query(), "xs");
        assert_eq!(harness.state.sort_order, SortOrder::Newest);
        assert_eq!(harness.view_data.pending_delete, None);

        harness.press(KeyCode::Backspace);
        assert_eq!(harness.state.query(), "x");
        harness.press_with(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert_eq!(harness.state.query(), "");
        assert_eq!(harness.state.gallery.visible_count(), 3);
    }

    #[test]
    fn esc_in_browse_clears_filter() {
        let mut harness = Harness::new(beach_runtime());
        harness.press(KeyCode::Char('/'));
        harness.type_text("forest");
        harness.press(KeyCode::Enter);
        assert_eq!(harness.visible_names(), vec!["forest.png".to_owned()]);

        harness.press(KeyCode::Esc);
        assert_eq!(harness.state.query(), "");
        assert_eq!(harness.state.gallery.visible_count(), 3);
        assert_eq!(harness.state.status_line.as_deref(), Some("filter cleared"));
    }

    #[test]
    fn enter_shows_detail_after_event_arrives() {
        let mut harness = Harness::new(beach_runtime());
        harness.press(KeyCode::Enter);
        assert!(harness.state.detail.pending.is_some());
        assert_eq!(harness.state.detail.shown, None);

        harness.pump();
        let shown = harness.state.detail.shown.clone().expect("detail shown");
        assert_eq!(shown.file_name, "forest.png");
        assert_eq!(shown.src, "/static/forest.png");
        assert!(render_detail_text(&harness.state).contains("image: /static/forest.png"));

        harness.press(KeyCode::Esc);
        assert_eq!(harness.state.detail.shown, None);
    }

    #[test]
    fn out_of_order_detail_responses_keep_latest() {
        let mut runtime = beach_runtime();
        runtime.defer_details = true;
        let mut harness = Harness::new(runtime);

        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Enter);
        let [(first, first_name), (second, second_name)] = harness.runtime.deferred.as_slice()
        else {
            panic!("expected two requests: {:?}", harness.runtime.deferred);
        };
        assert_ne!(first_name, second_name);
        let (first, second) = (*first, *second);
        let second_name = second_name.clone();
        let first_name = first_name.clone();

        harness
            .tx
            .send(InternalEvent::Detail {
                token: second,
                result: Ok(DetailView {
                    file_name: second_name.clone(),
                    src: format!("/static/{second_name}"),
                }),
            })
            .expect("send detail");
        harness
            .tx
            .send(InternalEvent::Detail {
                token: first,
                result: Ok(DetailView {
                    file_name: first_name.clone(),
                    src: format!("/static/{first_name}"),
                }),
            })
            .expect("send detail");
        harness.pump();

        assert_eq!(
            harness
                .state
                .detail
                .shown
                .as_ref()
                .map(|view| view.file_name.as_str()),
            Some(second_name.as_str())
        );
    }

    #[test]
    fn failed_detail_keeps_previous_view_and_reports() {
        let mut runtime = beach_runtime();
        runtime.failing.push("beach2.png".to_owned());
        let mut harness = Harness::new(runtime);

        harness.press(KeyCode::Enter);
        harness.pump();
        assert!(harness.state.detail.shown.is_some());

        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Enter);
        harness.pump();

        assert_eq!(
            harness
                .state
                .detail
                .shown
                .as_ref()
                .map(|view| view.file_name.as_str()),
            Some("forest.png")
        );
        assert_eq!(
            status_text(&harness.state, &harness.view_data),
            "detail for beach2.png failed: server returned 404"
        );
        assert_eq!(harness.view_data.status_token, 1);
    }

    #[test]
    fn sort_key_flips_label_and_order() {
        let mut harness = Harness::new(TestRuntime::with_captures(&[
            "detection_1_2026-01-01_08-00-00AM.jpg",
            "detection_2_2026-01-02_08-00-00AM.jpg",
        ]));
        assert!(header_title(&harness.state).contains("Newest first"));
        assert_eq!(
            harness.visible_names()[0],
            "detection_2_2026-01-02_08-00-00AM.jpg"
        );

        harness.press(KeyCode::Char('s'));
        assert!(header_title(&harness.state).contains("Oldest first"));
        assert_eq!(
            harness.visible_names()[0],
            "detection_1_2026-01-01_08-00-00AM.jpg"
        );
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut harness = Harness::new(beach_runtime());
        harness.press(KeyCode::Char('x'));
        assert_eq!(
            harness.view_data.pending_delete.as_deref(),
            Some("forest.png")
        );
        harness.press(KeyCode::Char('n'));
        assert!(harness.runtime.deleted.is_empty());
        assert_eq!(harness.state.gallery.len(), 3);

        harness.press(KeyCode::Char('x'));
        harness.press(KeyCode::Char('y'));
        assert_eq!(harness.runtime.deleted, vec!["forest.png".to_owned()]);
        assert_eq!(harness.state.gallery.len(), 2);
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("deleted forest.png")
        );
    }

    #[test]
    fn deleting_shown_capture_closes_detail() {
        let mut harness = Harness::new(beach_runtime());
        harness.press(KeyCode::Enter);
        harness.pump();
        assert!(harness.state.detail.shown.is_some());

        harness.press(KeyCode::Char('x'));
        harness.press(KeyCode::Char('y'));
        assert_eq!(harness.state.detail.shown, None);
    }

    #[test]
    fn reload_picks_up_new_captures() {
        let mut harness = Harness::new(beach_runtime());
        harness.runtime.captures.push("porch.jpg".to_owned());
        harness.runtime.today = 2;
        harness.press(KeyCode::Char('r'));
        assert_eq!(harness.state.gallery.len(), 4);
        assert_eq!(harness.view_data.captures_today, Some(2));
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("reloaded 4 captures")
        );
    }

    #[test]
    fn status_clear_ignores_stale_tokens() {
        let mut harness = Harness::new(beach_runtime());
        emit_status(
            &mut harness.state,
            &mut harness.view_data,
            &harness.tx,
            "first",
        );
        emit_status(
            &mut harness.state,
            &mut harness.view_data,
            &harness.tx,
            "second",
        );

        harness
            .tx
            .send(InternalEvent::ClearStatus { token: 1 })
            .expect("send clear");
        harness.pump();
        assert_eq!(harness.state.status_line.as_deref(), Some("second"));

        harness
            .tx
            .send(InternalEvent::ClearStatus { token: 2 })
            .expect("send clear");
        harness.pump();
        assert_eq!(harness.state.status_line, None);
        assert!(status_text(&harness.state, &harness.view_data).contains("ctrl+q quit"));
    }

    #[test]
    fn help_overlay_swallows_keys_until_closed() {
        let mut harness = Harness::new(beach_runtime());
        harness.press(KeyCode::Char('?'));
        assert!(harness.view_data.help_visible);

        harness.press(KeyCode::Char('s'));
        assert_eq!(harness.state.sort_order, SortOrder::Newest);

        harness.press(KeyCode::Esc);
        assert!(!harness.view_data.help_visible);
        assert!(help_overlay_text().contains("ctrl+q quit"));
    }

    #[test]
    fn ctrl_q_quits_from_any_mode() {
        let mut harness = Harness::new(beach_runtime());
        harness.press(KeyCode::Char('/'));
        assert!(!harness.press(KeyCode::Char('q')));
        assert!(harness.press_with(KeyCode::Char('q'), KeyModifiers::CONTROL));
    }

    #[test]
    fn gallery_window_follows_selection() {
        assert_eq!(gallery_window(0, 0, 5), 0..0);
        assert_eq!(gallery_window(2, 3, 5), 0..3);
        assert_eq!(gallery_window(0, 20, 5), 0..5);
        assert_eq!(gallery_window(7, 20, 5), 3..8);
        assert_eq!(gallery_window(19, 20, 5), 15..20);
        assert_eq!(gallery_window(4, 20, 0), 0..0);
    }

    #[test]
    fn status_bar_shows_today_count() {
        let mut runtime = beach_runtime();
        runtime.today = 3;
        let harness = Harness::new(runtime);
        assert!(status_text(&harness.state, &harness.view_data).starts_with("today: 3 | "));
    }

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }
}
