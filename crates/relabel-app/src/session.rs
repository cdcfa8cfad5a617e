// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::{
    AnnotationRow, DeepLink, FilterGroup, FilterState, FilteredView, ParsedRowCache, ViewMetrics,
    format_json,
};

/// Session lifecycle. `Initializing` covers deep-link hydration; the switch
/// to `Steady` is one-way and happens once row data has been installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Steady,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Apply a deep link (or stored fallback) before rows arrive.
    Hydrate(DeepLink),
    /// Install a fresh row set (initial load or refresh).
    ReplaceRows(Vec<AnnotationRow>),
    Next,
    Previous,
    JumpTo(usize),
    ToggleFilter(FilterGroup, String),
    RemoveFilter(FilterGroup, String),
    ClearFilters,
    SetEditedPrompt(String),
    SetEditedInput(String),
    SetEditedOutput(String),
    Save { now: OffsetDateTime },
    ConfirmNavigation,
    CancelNavigation,
    DiscardEdits,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged(SessionPhase),
    RowsReplaced { count: usize },
    CursorMoved { original_index: usize },
    FilterChanged,
    RowSaved { original_index: usize },
    NavigationBlocked,
    NavigationCanceled,
    EditsDiscarded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EditBuffers {
    prompt: String,
    input: String,
    output: String,
}

impl EditBuffers {
    fn from_row(row: &AnnotationRow) -> Self {
        Self {
            prompt: row.prompt_name.clone(),
            input: row.input.clone(),
            output: format_json(&row.output),
        }
    }
}

/// One annotation view session: rows, filter, derived view and metrics, and
/// the cursor expressed as an original index. All derivation is synchronous
/// and in-memory; the view and metrics are rebuilt only when rows or a filter
/// group actually change.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSession {
    rows: Vec<AnnotationRow>,
    cache: ParsedRowCache,
    filter: FilterState,
    view: FilteredView,
    metrics: ViewMetrics,
    cursor: usize,
    phase: SessionPhase,
    edit: EditBuffers,
    requested_cursor: Option<usize>,
    pending_navigation: Option<usize>,
}

impl Default for ViewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewSession {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            cache: ParsedRowCache::default(),
            filter: FilterState::default(),
            view: FilteredView::default(),
            metrics: ViewMetrics::default(),
            cursor: 0,
            phase: SessionPhase::Uninitialized,
            edit: EditBuffers::default(),
            requested_cursor: None,
            pending_navigation: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn rows(&self) -> &[AnnotationRow] {
        &self.rows
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn view(&self) -> &FilteredView {
        &self.view
    }

    pub fn metrics(&self) -> &ViewMetrics {
        &self.metrics
    }

    pub fn cache(&self) -> &ParsedRowCache {
        &self.cache
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_row(&self) -> Option<&AnnotationRow> {
        self.rows.get(self.cursor)
    }

    /// Position of the cursor within the filtered sequence. Falls back to the
    /// head of the sequence when the cursor's row is filtered out (a jump can
    /// legitimately land outside the view).
    pub fn filtered_position(&self) -> usize {
        self.view.map_original_to_filtered(self.cursor).unwrap_or(0)
    }

    pub fn edited_prompt(&self) -> &str {
        &self.edit.prompt
    }

    pub fn edited_input(&self) -> &str {
        &self.edit.input
    }

    pub fn edited_output(&self) -> &str {
        &self.edit.output
    }

    pub fn dirty(&self) -> bool {
        match self.current_row() {
            Some(row) => self.edit != EditBuffers::from_row(row),
            None => false,
        }
    }

    pub fn navigation_pending(&self) -> bool {
        self.pending_navigation.is_some()
    }

    pub fn deep_link(&self) -> DeepLink {
        DeepLink {
            row: Some(self.cursor),
            filter: self.filter.clone(),
        }
    }

    pub fn dispatch(&mut self, command: SessionCommand) -> Vec<SessionEvent> {
        match command {
            SessionCommand::Hydrate(link) => self.hydrate(link),
            SessionCommand::ReplaceRows(rows) => self.replace_rows(rows),
            SessionCommand::Next => self.step(1),
            SessionCommand::Previous => self.step(-1),
            SessionCommand::JumpTo(target) => self.jump_to(target),
            SessionCommand::ToggleFilter(group, value) => {
                self.filter.toggle(group, &value);
                self.apply_filter_change()
            }
            SessionCommand::RemoveFilter(group, value) => {
                self.filter.remove(group, &value);
                self.apply_filter_change()
            }
            SessionCommand::ClearFilters => {
                if !self.filter.has_active_filters() {
                    return Vec::new();
                }
                self.filter.clear();
                self.apply_filter_change()
            }
            SessionCommand::SetEditedPrompt(text) => {
                self.edit.prompt = text;
                Vec::new()
            }
            SessionCommand::SetEditedInput(text) => {
                self.edit.input = text;
                Vec::new()
            }
            SessionCommand::SetEditedOutput(text) => {
                self.edit.output = text;
                Vec::new()
            }
            SessionCommand::Save { now } => self.save(now),
            SessionCommand::ConfirmNavigation => self.confirm_navigation(),
            SessionCommand::CancelNavigation => {
                if self.pending_navigation.take().is_some() {
                    vec![SessionEvent::NavigationCanceled]
                } else {
                    Vec::new()
                }
            }
            SessionCommand::DiscardEdits => {
                self.sync_edit_buffers();
                vec![SessionEvent::EditsDiscarded]
            }
        }
    }

    /// Pick a random unreviewed row from the filtered sequence, falling back
    /// to any filtered row when everything is reviewed. The picker receives
    /// the candidate count and returns an index into it, keeping the session
    /// free of ambient randomness.
    pub fn random_unreviewed(&mut self, pick: impl FnOnce(usize) -> usize) -> Vec<SessionEvent> {
        let unreviewed: Vec<usize> = self
            .view
            .members()
            .iter()
            .copied()
            .filter(|&index| !self.rows[index].is_reviewed())
            .collect();
        let candidates = if unreviewed.is_empty() {
            self.view.members().to_vec()
        } else {
            unreviewed
        };
        if candidates.is_empty() {
            return Vec::new();
        }
        let target = candidates[pick(candidates.len()) % candidates.len()];
        self.navigate_to(target)
    }

    fn hydrate(&mut self, link: DeepLink) -> Vec<SessionEvent> {
        if self.phase != SessionPhase::Uninitialized {
            return Vec::new();
        }
        self.phase = SessionPhase::Initializing;
        self.filter = link.filter;
        self.requested_cursor = link.row;
        vec![SessionEvent::PhaseChanged(self.phase)]
    }

    fn replace_rows(&mut self, rows: Vec<AnnotationRow>) -> Vec<SessionEvent> {
        let count = rows.len();
        self.rows = rows;
        self.cache = ParsedRowCache::build(&self.rows);
        self.view = FilteredView::build(&self.rows, &self.filter, &self.cache);
        self.metrics = ViewMetrics::compute(&self.rows, &self.filter, &self.cache);

        let mut events = vec![SessionEvent::RowsReplaced { count }];
        match self.phase {
            SessionPhase::Uninitialized | SessionPhase::Initializing => {
                // Deep-linked cursors are honored verbatim, even when the row
                // sits outside the hydrated filter's view.
                if let Some(requested) = self.requested_cursor.take()
                    && requested < self.rows.len()
                {
                    self.cursor = requested;
                }
                self.phase = SessionPhase::Steady;
                events.push(SessionEvent::PhaseChanged(self.phase));
            }
            SessionPhase::Steady => {
                if self.cursor >= self.rows.len() {
                    self.cursor = self.rows.len().saturating_sub(1);
                }
                if let Some(event) = self.reconcile_cursor() {
                    events.push(event);
                }
            }
        }

        self.sync_edit_buffers();
        events
    }

    fn apply_filter_change(&mut self) -> Vec<SessionEvent> {
        self.view = FilteredView::build(&self.rows, &self.filter, &self.cache);
        self.metrics = ViewMetrics::compute(&self.rows, &self.filter, &self.cache);

        let mut events = vec![SessionEvent::FilterChanged];
        // Cursor reconciliation is a steady-state behavior only; hydration
        // must keep the deep-linked row even when the filter excludes it.
        if self.phase == SessionPhase::Steady
            && let Some(event) = self.reconcile_cursor()
        {
            events.push(event);
        }
        events
    }

    fn reconcile_cursor(&mut self) -> Option<SessionEvent> {
        if self.view.is_empty() || self.view.contains_original(self.cursor) {
            return None;
        }
        let first = self.view.first_original_index()?;
        self.cursor = first;
        self.sync_edit_buffers();
        Some(SessionEvent::CursorMoved {
            original_index: first,
        })
    }

    fn step(&mut self, delta: isize) -> Vec<SessionEvent> {
        let position = self.filtered_position() as isize + delta;
        if position < 0 || position as usize >= self.view.len() {
            return Vec::new();
        }
        let Some(target) = self.view.map_filtered_to_original(position as usize) else {
            return Vec::new();
        };
        self.navigate_to(target)
    }

    fn jump_to(&mut self, target: usize) -> Vec<SessionEvent> {
        // Jumps address the original index space and may leave the filtered
        // view; out-of-range targets are ignored.
        if target >= self.rows.len() {
            return Vec::new();
        }
        self.navigate_to(target)
    }

    fn navigate_to(&mut self, target: usize) -> Vec<SessionEvent> {
        if target == self.cursor {
            return Vec::new();
        }
        if self.dirty() {
            self.pending_navigation = Some(target);
            return vec![SessionEvent::NavigationBlocked];
        }
        self.move_cursor(target)
    }

    fn confirm_navigation(&mut self) -> Vec<SessionEvent> {
        let Some(target) = self.pending_navigation.take() else {
            return Vec::new();
        };
        let mut events = vec![SessionEvent::EditsDiscarded];
        self.sync_edit_buffers();
        if target < self.rows.len() {
            events.extend(self.move_cursor(target));
        }
        events
    }

    fn move_cursor(&mut self, target: usize) -> Vec<SessionEvent> {
        self.cursor = target;
        self.sync_edit_buffers();
        vec![SessionEvent::CursorMoved {
            original_index: target,
        }]
    }

    fn save(&mut self, now: OffsetDateTime) -> Vec<SessionEvent> {
        let Some(row) = self.rows.get_mut(self.cursor) else {
            return Vec::new();
        };

        row.prompt_name = self.edit.prompt.clone();
        row.input = self.edit.input.clone();
        row.output = self.edit.output.clone();
        row.manually_reviewed = Some(true);
        row.manually_reviewed_ts = Some(now.unix_timestamp());
        row.last_updated_ts = Some(
            now.format(&Rfc3339)
                .unwrap_or_else(|_| now.unix_timestamp().to_string()),
        );

        // The edited output may have changed the derived action, so every
        // derived structure is rebuilt, not patched.
        self.cache = ParsedRowCache::build(&self.rows);
        self.view = FilteredView::build(&self.rows, &self.filter, &self.cache);
        self.metrics = ViewMetrics::compute(&self.rows, &self.filter, &self.cache);
        self.sync_edit_buffers();

        let mut events = vec![SessionEvent::RowSaved {
            original_index: self.cursor,
        }];
        if self.phase == SessionPhase::Steady
            && let Some(event) = self.reconcile_cursor()
        {
            events.push(event);
        }
        events
    }

    fn sync_edit_buffers(&mut self) {
        self.edit = match self.current_row() {
            Some(row) => EditBuffers::from_row(row),
            None => EditBuffers::default(),
        };
    }
}
