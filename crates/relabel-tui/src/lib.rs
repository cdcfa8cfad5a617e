// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use relabel_app::{
    AnnotationRow, DeepLink, FilterCount, FilterGroup, ReviewStatus, SessionCommand, SessionEvent,
    ViewSession,
};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;

const STATUS_CLEAR_SECS: u64 = 4;
const CHIP_MARK_ACTIVE: &str = "▼";

/// What a refresh against the hub produced. `Unchanged` means the fetched
/// content fingerprint matched the stored one.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Unchanged,
    Replaced(Vec<AnnotationRow>),
}

/// Everything the view layer needs from the outside world: initial rows,
/// refreshes, saves, and the persisted deep link.
pub trait AppRuntime {
    fn initial_rows(&mut self) -> Result<Vec<AnnotationRow>>;
    fn refresh_rows(&mut self) -> Result<RefreshOutcome>;
    fn persist_row(&mut self, original_index: usize, row: &AnnotationRow) -> Result<()>;
    fn load_link(&mut self) -> Result<Option<String>>;
    fn store_link(&mut self, link: &str) -> Result<()>;
    fn dataset_label(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum AppMode {
    #[default]
    Browse,
    Edit,
    FilterPicker,
    Jump,
    ConfirmDiscard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EditField {
    Prompt,
    Input,
    #[default]
    Output,
}

impl EditField {
    const fn label(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Input => "input",
            Self::Output => "output",
        }
    }

    const fn next(self) -> Self {
        match self {
            Self::Prompt => Self::Input,
            Self::Input => Self::Output,
            Self::Output => Self::Prompt,
        }
    }
}

/// The action waiting behind the unsaved-changes prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingConfirm {
    Navigation,
    Refresh,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PickerEntry {
    group: FilterGroup,
    value: String,
    label: String,
    count: FilterCount,
    active: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    mode: AppMode,
    status: String,
    status_token: u64,
    edit_field: EditField,
    jump_input: String,
    picker_cursor: usize,
    pending_confirm: Option<PendingConfirm>,
    help_visible: bool,
}

/// Seed material for the random-row picker. Same generator as the rest of
/// the workspace, seeded from the wall clock at startup.
#[derive(Debug, Clone)]
struct PickerRng {
    state: u64,
}

impl PickerRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn from_clock() -> Self {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        Self::new(nanos as u64)
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        (x % (n as u64)) as usize
    }
}

/// Hydrate the session from the stored deep link, then install the initial
/// row set. Split out of `run_app` so the flow is testable headlessly.
pub fn bootstrap_session<R: AppRuntime>(session: &mut ViewSession, runtime: &mut R) -> Result<()> {
    let link = match runtime.load_link()? {
        Some(stored) => DeepLink::parse(&stored),
        None => DeepLink::default(),
    };
    session.dispatch(SessionCommand::Hydrate(link));

    let rows = runtime.initial_rows().context("load initial rows")?;
    session.dispatch(SessionCommand::ReplaceRows(rows));
    Ok(())
}

pub fn run_app<R: AppRuntime>(session: &mut ViewSession, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let mut rng = PickerRng::from_clock();
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = bootstrap_session(session, runtime) {
        view_data.status = format!("load failed: {error:#}");
    }

    let mut result = Ok(());
    loop {
        process_internal_events(&mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, runtime, session, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(session, runtime, &mut view_data, &mut rng, &internal_tx, key)
                    {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(view_data: &mut ViewData, rx: &Receiver<InternalEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                view_data.status.clear();
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(STATUS_CLEAR_SECS));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    view_data.status = message.into();
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: AppRuntime>(
    session: &mut ViewSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    rng: &mut PickerRng,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        view_data.help_visible = false;
        return false;
    }

    match view_data.mode {
        AppMode::Browse => handle_browse_key(session, runtime, view_data, rng, internal_tx, key),
        AppMode::Edit => handle_edit_key(session, runtime, view_data, internal_tx, key),
        AppMode::FilterPicker => {
            handle_picker_key(session, runtime, view_data, internal_tx, key);
            false
        }
        AppMode::Jump => {
            handle_jump_key(session, view_data, internal_tx, key);
            false
        }
        AppMode::ConfirmDiscard => handle_confirm_key(session, runtime, view_data, internal_tx, key),
    }
}

fn handle_browse_key<R: AppRuntime>(
    session: &mut ViewSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    rng: &mut PickerRng,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Char('q') => {
            if session.dirty() {
                view_data.pending_confirm = Some(PendingConfirm::Quit);
                view_data.mode = AppMode::ConfirmDiscard;
                return false;
            }
            return true;
        }
        KeyCode::Char('n') | KeyCode::Char('j') | KeyCode::Right | KeyCode::Down => {
            let events = session.dispatch(SessionCommand::Next);
            after_navigation(session, runtime, view_data, &events);
        }
        KeyCode::Char('p') | KeyCode::Char('k') | KeyCode::Left | KeyCode::Up => {
            let events = session.dispatch(SessionCommand::Previous);
            after_navigation(session, runtime, view_data, &events);
        }
        KeyCode::Char('r') => {
            if session.view().is_empty() {
                emit_status(view_data, internal_tx, "no rows in the current view");
            } else {
                let events = session.random_unreviewed(|count| rng.int_n(count));
                after_navigation(session, runtime, view_data, &events);
            }
        }
        KeyCode::Char('g') => {
            view_data.jump_input.clear();
            view_data.mode = AppMode::Jump;
        }
        KeyCode::Char('f') => {
            view_data.picker_cursor = 0;
            view_data.mode = AppMode::FilterPicker;
        }
        KeyCode::Char('c') => {
            let events = session.dispatch(SessionCommand::ClearFilters);
            if events.is_empty() {
                emit_status(view_data, internal_tx, "no active filters");
            } else {
                persist_link(session, runtime);
                emit_status(view_data, internal_tx, "filters cleared");
            }
        }
        KeyCode::Char('e') | KeyCode::Enter => {
            if session.current_row().is_some() {
                view_data.edit_field = EditField::Output;
                view_data.mode = AppMode::Edit;
            }
        }
        KeyCode::Char('R') => {
            if session.dirty() {
                view_data.pending_confirm = Some(PendingConfirm::Refresh);
                view_data.mode = AppMode::ConfirmDiscard;
            } else {
                do_refresh(session, runtime, view_data, internal_tx);
            }
        }
        KeyCode::Char('y') => {
            let link = session.deep_link().encode();
            match runtime.store_link(&link) {
                Ok(()) => emit_status(view_data, internal_tx, format!("link saved: {link}")),
                Err(error) => emit_status(view_data, internal_tx, format!("link save failed: {error:#}")),
            }
        }
        KeyCode::Char('?') => view_data.help_visible = true,
        _ => {}
    }
    false
}

fn handle_edit_key<R: AppRuntime>(
    session: &mut ViewSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
        save_current_row(session, runtime, view_data, internal_tx);
        return false;
    }

    match key.code {
        KeyCode::Esc => view_data.mode = AppMode::Browse,
        KeyCode::Tab => view_data.edit_field = view_data.edit_field.next(),
        KeyCode::Enter => {
            if view_data.edit_field == EditField::Output {
                push_edit_char(session, view_data, '\n');
            }
        }
        KeyCode::Backspace => pop_edit_char(session, view_data),
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            push_edit_char(session, view_data, ch);
        }
        _ => {}
    }
    false
}

fn handle_picker_key<R: AppRuntime>(
    session: &mut ViewSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let entries = picker_entries(session);
    match key.code {
        KeyCode::Esc | KeyCode::Char('f') => view_data.mode = AppMode::Browse,
        KeyCode::Char('j') | KeyCode::Down => {
            if !entries.is_empty() {
                view_data.picker_cursor = (view_data.picker_cursor + 1) % entries.len();
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if !entries.is_empty() {
                view_data.picker_cursor =
                    (view_data.picker_cursor + entries.len() - 1) % entries.len();
            }
        }
        KeyCode::Char(' ') | KeyCode::Enter => {
            let Some(entry) = entries.get(view_data.picker_cursor) else {
                return;
            };
            let events = session.dispatch(SessionCommand::ToggleFilter(
                entry.group,
                entry.value.clone(),
            ));
            persist_link(session, runtime);
            if let Some(moved) = cursor_moved(&events) {
                emit_status(
                    view_data,
                    internal_tx,
                    format!("cursor moved to row {}", moved + 1),
                );
            }
        }
        KeyCode::Char('c') => {
            session.dispatch(SessionCommand::ClearFilters);
            persist_link(session, runtime);
            view_data.picker_cursor = 0;
        }
        _ => {}
    }
}

fn handle_jump_key(
    session: &mut ViewSession,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => view_data.mode = AppMode::Browse,
        KeyCode::Char(ch) if ch.is_ascii_digit() => view_data.jump_input.push(ch),
        KeyCode::Backspace => {
            view_data.jump_input.pop();
        }
        KeyCode::Enter => {
            view_data.mode = AppMode::Browse;
            // Displayed row numbers are 1-based.
            let Ok(number) = view_data.jump_input.parse::<usize>() else {
                emit_status(view_data, internal_tx, "jump: enter a row number");
                return;
            };
            if number == 0 || number > session.rows().len() {
                emit_status(
                    view_data,
                    internal_tx,
                    format!("row {number} is out of range (1-{})", session.rows().len()),
                );
                return;
            }
            let events = session.dispatch(SessionCommand::JumpTo(number - 1));
            if events.contains(&SessionEvent::NavigationBlocked) {
                view_data.pending_confirm = Some(PendingConfirm::Navigation);
                view_data.mode = AppMode::ConfirmDiscard;
            }
        }
        _ => {}
    }
}

fn handle_confirm_key<R: AppRuntime>(
    session: &mut ViewSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            let pending = view_data.pending_confirm.take();
            view_data.mode = AppMode::Browse;
            match pending {
                Some(PendingConfirm::Navigation) => {
                    let events = session.dispatch(SessionCommand::ConfirmNavigation);
                    after_navigation(session, runtime, view_data, &events);
                }
                Some(PendingConfirm::Refresh) => {
                    session.dispatch(SessionCommand::DiscardEdits);
                    do_refresh(session, runtime, view_data, internal_tx);
                }
                Some(PendingConfirm::Quit) => return true,
                None => {}
            }
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            view_data.pending_confirm = None;
            session.dispatch(SessionCommand::CancelNavigation);
            view_data.mode = AppMode::Browse;
        }
        _ => {}
    }
    false
}

fn after_navigation<R: AppRuntime>(
    session: &mut ViewSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    events: &[SessionEvent],
) {
    if events.contains(&SessionEvent::NavigationBlocked) {
        view_data.pending_confirm = Some(PendingConfirm::Navigation);
        view_data.mode = AppMode::ConfirmDiscard;
        return;
    }
    if cursor_moved(events).is_some() {
        persist_link(session, runtime);
    }
}

fn save_current_row<R: AppRuntime>(
    session: &mut ViewSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let events = session.dispatch(SessionCommand::Save {
        now: OffsetDateTime::now_utc(),
    });
    let Some(SessionEvent::RowSaved { original_index }) = events
        .iter()
        .find(|event| matches!(event, SessionEvent::RowSaved { .. }))
        .cloned()
    else {
        emit_status(view_data, internal_tx, "nothing to save");
        return;
    };

    let Some(row) = session.rows().get(original_index).cloned() else {
        return;
    };
    match runtime.persist_row(original_index, &row) {
        Ok(()) => {
            persist_link(session, runtime);
            emit_status(
                view_data,
                internal_tx,
                format!("saved row {} (marked reviewed)", original_index + 1),
            );
        }
        Err(error) => emit_status(view_data, internal_tx, format!("save failed: {error:#}")),
    }
}

fn do_refresh<R: AppRuntime>(
    session: &mut ViewSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match runtime.refresh_rows() {
        Ok(RefreshOutcome::Unchanged) => {
            emit_status(view_data, internal_tx, "dataset unchanged");
        }
        Ok(RefreshOutcome::Replaced(rows)) => {
            let count = rows.len();
            session.dispatch(SessionCommand::ReplaceRows(rows));
            persist_link(session, runtime);
            emit_status(view_data, internal_tx, format!("refreshed {count} rows"));
        }
        Err(error) => emit_status(view_data, internal_tx, format!("refresh failed: {error:#}")),
    }
}

fn persist_link<R: AppRuntime>(session: &ViewSession, runtime: &mut R) {
    // Best effort; a failed write only loses resume position.
    let _ = runtime.store_link(&session.deep_link().encode());
}

fn cursor_moved(events: &[SessionEvent]) -> Option<usize> {
    events.iter().find_map(|event| match event {
        SessionEvent::CursorMoved { original_index } => Some(*original_index),
        _ => None,
    })
}

fn push_edit_char(session: &mut ViewSession, view_data: &ViewData, ch: char) {
    let command = match view_data.edit_field {
        EditField::Prompt => {
            let mut text = session.edited_prompt().to_owned();
            text.push(ch);
            SessionCommand::SetEditedPrompt(text)
        }
        EditField::Input => {
            let mut text = session.edited_input().to_owned();
            text.push(ch);
            SessionCommand::SetEditedInput(text)
        }
        EditField::Output => {
            let mut text = session.edited_output().to_owned();
            text.push(ch);
            SessionCommand::SetEditedOutput(text)
        }
    };
    session.dispatch(command);
}

fn pop_edit_char(session: &mut ViewSession, view_data: &ViewData) {
    let command = match view_data.edit_field {
        EditField::Prompt => {
            let mut text = session.edited_prompt().to_owned();
            text.pop();
            SessionCommand::SetEditedPrompt(text)
        }
        EditField::Input => {
            let mut text = session.edited_input().to_owned();
            text.pop();
            SessionCommand::SetEditedInput(text)
        }
        EditField::Output => {
            let mut text = session.edited_output().to_owned();
            text.pop();
            SessionCommand::SetEditedOutput(text)
        }
    };
    session.dispatch(command);
}

fn picker_entries(session: &ViewSession) -> Vec<PickerEntry> {
    let metrics = session.metrics();
    let filter = session.filter();
    let mut entries = Vec::new();

    for (value, count) in &metrics.prompt_counts {
        entries.push(PickerEntry {
            group: FilterGroup::Prompt,
            value: value.clone(),
            label: value.clone(),
            count: *count,
            active: filter.prompts.contains(value),
        });
    }
    for (value, count) in &metrics.action_counts {
        entries.push(PickerEntry {
            group: FilterGroup::Action,
            value: value.clone(),
            label: value.clone(),
            count: *count,
            active: filter.actions.contains(value),
        });
    }
    for status in ReviewStatus::ALL {
        entries.push(PickerEntry {
            group: FilterGroup::Review,
            value: status.as_str().to_owned(),
            label: status.label().to_owned(),
            count: metrics.review_count(status),
            active: filter.review.contains(&status),
        });
    }

    entries
}

fn render<R: AppRuntime>(
    frame: &mut ratatui::Frame<'_>,
    runtime: &R,
    session: &ViewSession,
    view_data: &ViewData,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(runtime, session))
        .style(Style::default().add_modifier(Modifier::BOLD));
    frame.render_widget(header, chunks[0]);

    let chips = Paragraph::new(chips_text(session));
    frame.render_widget(chips, chunks[1]);

    render_row_panels(frame, session, view_data, chunks[2]);

    let status = Paragraph::new(status_text(session, view_data))
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(status, chunks[3]);

    match view_data.mode {
        AppMode::FilterPicker => {
            render_overlay(frame, "filters", &picker_overlay_text(session, view_data));
        }
        AppMode::Jump => {
            render_overlay(frame, "jump to row", &jump_overlay_text(view_data));
        }
        AppMode::ConfirmDiscard => {
            render_overlay(frame, "unsaved changes", confirm_overlay_text(view_data));
        }
        AppMode::Browse | AppMode::Edit => {}
    }

    if view_data.help_visible {
        render_overlay(frame, "help", help_overlay_text());
    }
}

fn render_row_panels(
    frame: &mut ratatui::Frame<'_>,
    session: &ViewSession,
    view_data: &ViewData,
    area: Rect,
) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let focus = |field: EditField| -> Style {
        if view_data.mode == AppMode::Edit && view_data.edit_field == field {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        }
    };

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(columns[0]);

    let prompt = Paragraph::new(session.edited_prompt().to_owned())
        .block(Block::default().borders(Borders::ALL).title("prompt"))
        .style(focus(EditField::Prompt))
        .wrap(Wrap { trim: false });
    frame.render_widget(prompt, left[0]);

    let input = Paragraph::new(session.edited_input().to_owned())
        .block(Block::default().borders(Borders::ALL).title("input"))
        .style(focus(EditField::Input))
        .wrap(Wrap { trim: false });
    frame.render_widget(input, left[1]);

    let output_title = format!("output [{}]", row_badge(session));
    let output = Paragraph::new(session.edited_output().to_owned())
        .block(Block::default().borders(Borders::ALL).title(output_title))
        .style(focus(EditField::Output))
        .wrap(Wrap { trim: false });
    frame.render_widget(output, columns[1]);
}

fn render_overlay(frame: &mut ratatui::Frame<'_>, title: &str, body: &str) {
    let area = centered_rect(frame.area(), 70, 70);
    frame.render_widget(Clear, area);
    let widget = Paragraph::new(body.to_owned())
        .block(Block::default().borders(Borders::ALL).title(title.to_owned()))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
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
        .split(vertical[1])[1]
}

fn header_text<R: AppRuntime>(runtime: &R, session: &ViewSession) -> String {
    let total = session.rows().len();
    let filtered = session.view().len();
    let position = if session.view().contains_original(session.cursor()) {
        format!("{}/{}", session.filtered_position() + 1, filtered)
    } else {
        format!("-/{filtered}")
    };
    format!(
        "relabel · {} · row {}/{} · view {} · {} reviewed",
        runtime.dataset_label(),
        session.cursor() + 1,
        total,
        position,
        session.metrics().reviewed.total,
    )
}

fn chips_text(session: &ViewSession) -> String {
    let filter = session.filter();
    if !filter.has_active_filters() {
        return "no filters · press f".to_owned();
    }

    let chips: Vec<String> = filter
        .active_values()
        .into_iter()
        .map(|(group, value)| format!("{CHIP_MARK_ACTIVE} {}:{value}", group.label()))
        .collect();
    chips.join("  ")
}

fn row_badge(session: &ViewSession) -> String {
    let mut badge = session.cache().action_category(session.cursor()).to_owned();
    match session.current_row() {
        Some(row) if row.is_reviewed() => badge.push_str(" · reviewed"),
        Some(_) => badge.push_str(" · not reviewed"),
        None => {}
    }
    if session.dirty() {
        badge.push_str(" · edited");
    }
    badge
}

fn status_text(session: &ViewSession, view_data: &ViewData) -> String {
    if !view_data.status.is_empty() {
        return view_data.status.clone();
    }
    match view_data.mode {
        AppMode::Edit => format!(
            "editing {} · Tab switch field · Ctrl+S save · Esc back",
            view_data.edit_field.label()
        ),
        AppMode::Browse if session.dirty() => "unsaved edits · Ctrl+S to save".to_owned(),
        _ => "n/p move · g jump · r random · f filters · e edit · R refresh · ? help".to_owned(),
    }
}

fn picker_overlay_text(session: &ViewSession, view_data: &ViewData) -> String {
    let entries = picker_entries(session);
    if entries.is_empty() {
        return "no rows loaded".to_owned();
    }

    let mut out = String::new();
    let mut last_group = None;
    for (index, entry) in entries.iter().enumerate() {
        if last_group != Some(entry.group) {
            if last_group.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("── {} ──\n", entry.group.as_str()));
            last_group = Some(entry.group);
        }
        let cursor = if index == view_data.picker_cursor { ">" } else { " " };
        let mark = if entry.active { "[x]" } else { "[ ]" };
        out.push_str(&format!(
            "{cursor} {mark} {}  {} / {}\n",
            entry.label, entry.count.filtered, entry.count.total
        ));
    }
    out.push_str("\nspace toggle · c clear all · Esc close");
    out
}

fn jump_overlay_text(view_data: &ViewData) -> String {
    format!("row number: {}_\nEnter go · Esc cancel", view_data.jump_input)
}

fn confirm_overlay_text(view_data: &ViewData) -> &'static str {
    match view_data.pending_confirm {
        Some(PendingConfirm::Refresh) => "Discard unsaved edits and refresh? (y/n)",
        Some(PendingConfirm::Quit) => "Discard unsaved edits and quit? (y/n)",
        _ => "Discard unsaved edits and move on? (y/n)",
    }
}

fn help_overlay_text() -> &'static str {
    "\
n / p        next / previous row in the filtered view
g            jump to a row number (ignores filters)
r            random unreviewed row
f            filter picker (dual counts per value)
c            clear all filters
e / Enter    edit the current row
Tab          switch edit field (prompt / input / output)
Ctrl+S       save row (marks it reviewed)
R            refresh the dataset from the hub
y            save a resume link for this view
q            quit
any key closes this help"
}
