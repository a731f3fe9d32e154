// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{Capture, DetailToken, DetailView, Gallery, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Browse,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDetail {
    pub token: DetailToken,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetailState {
    pub shown: Option<DetailView>,
    pub pending: Option<PendingDetail>,
    last_token: u64,
}

impl DetailState {
    fn next_token(&mut self) -> DetailToken {
        self.last_token = self.last_token.wrapping_add(1);
        if self.last_token == 0 {
            self.last_token = 1;
        }
        DetailToken::new(self.last_token)
    }

    fn is_current(&self, token: DetailToken) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| pending.token == token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub sort_order: SortOrder,
    pub gallery: Gallery,
    pub selected: usize,
    pub detail: DetailState,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Browse,
            sort_order: SortOrder::Newest,
            gallery: Gallery::default(),
            selected: 0,
            detail: DetailState::default(),
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    FocusSearch,
    ExitSearch,
    SetQuery(String),
    PushQueryChar(char),
    PopQueryChar,
    LoadCaptures(Vec<Capture>),
    ToggleSort,
    MoveSelection(isize),
    SelectFirst,
    SelectLast,
    RequestDetail,
    DetailLoaded {
        token: DetailToken,
        view: DetailView,
    },
    DetailFailed {
        token: DetailToken,
        error: String,
    },
    CloseDetail,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    QueryChanged { visible: usize },
    CapturesLoaded { total: usize, visible: usize },
    SortChanged(SortOrder),
    SelectionChanged(usize),
    DetailRequested { token: DetailToken, file_name: String },
    DetailShown(DetailView),
    DetailFailed(String),
    StaleDetailDropped(DetailToken),
    DetailClosed,
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::FocusSearch => {
                self.mode = AppMode::Search;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ExitSearch => {
                self.mode = AppMode::Browse;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::SetQuery(query) => self.apply_query(query),
            AppCommand::PushQueryChar(ch) => {
                let mut query = self.gallery.query().to_owned();
                query.push(ch);
                self.apply_query(query)
            }
            AppCommand::PopQueryChar => {
                let mut query = self.gallery.query().to_owned();
                if query.pop().is_none() {
                    return Vec::new();
                }
                self.apply_query(query)
            }
            AppCommand::LoadCaptures(mut captures) => {
                crate::sort_captures(&mut captures, self.sort_order);
                let total = captures.len();
                let visible = self.gallery.replace(captures);
                self.clamp_selection();
                vec![AppEvent::CapturesLoaded { total, visible }]
            }
            AppCommand::ToggleSort => {
                let keep = self.selected_capture().map(|capture| capture.file_name().to_owned());
                self.sort_order = self.sort_order.toggled();
                let label = self.sort_order.label();
                self.gallery.resort(self.sort_order);
                if let Some(index) = keep.and_then(|name| self.gallery.position_of(&name)) {
                    self.selected = index;
                }
                vec![
                    AppEvent::SortChanged(self.sort_order),
                    self.set_status(label),
                ]
            }
            AppCommand::MoveSelection(delta) => {
                let count = self.gallery.visible_count();
                if count == 0 {
                    return Vec::new();
                }
                let last = count.saturating_sub(1) as isize;
                let next = (self.selected as isize + delta).clamp(0, last) as usize;
                self.select(next)
            }
            AppCommand::SelectFirst => self.select(0),
            AppCommand::SelectLast => {
                let last = self.gallery.visible_count().saturating_sub(1);
                self.select(last)
            }
            AppCommand::RequestDetail => {
                let Some(file_name) = self
                    .selected_capture()
                    .map(|capture| capture.file_name().to_owned())
                else {
                    return vec![self.set_status("no capture selected")];
                };
                let token = self.detail.next_token();
                self.detail.pending = Some(PendingDetail {
                    token,
                    file_name: file_name.clone(),
                });
                vec![AppEvent::DetailRequested { token, file_name }]
            }
            AppCommand::DetailLoaded { token, view } => {
                if !self.detail.is_current(token) {
                    return vec![AppEvent::StaleDetailDropped(token)];
                }
                self.detail.pending = None;
                self.detail.shown = Some(view.clone());
                vec![AppEvent::DetailShown(view)]
            }
            AppCommand::DetailFailed { token, error } => {
                let Some(pending) = self
                    .detail
                    .pending
                    .take_if(|pending| pending.token == token)
                else {
                    return vec![AppEvent::StaleDetailDropped(token)];
                };
                let message = format!("detail for {} failed: {error}", pending.file_name);
                vec![
                    AppEvent::DetailFailed(error),
                    self.set_status(&message),
                ]
            }
            AppCommand::CloseDetail => {
                if self.detail.shown.is_none() && self.detail.pending.is_none() {
                    return Vec::new();
                }
                self.detail.shown = None;
                self.detail.pending = None;
                vec![AppEvent::DetailClosed]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    pub fn query(&self) -> &str {
        self.gallery.query()
    }

    pub fn selected_capture(&self) -> Option<&Capture> {
        self.gallery.nth_visible(self.selected)
    }

    fn apply_query(&mut self, query: String) -> Vec<AppEvent> {
        let visible = self.gallery.apply_query(&query);
        self.clamp_selection();
        vec![AppEvent::QueryChanged { visible }]
    }

    fn select(&mut self, index: usize) -> Vec<AppEvent> {
        if self.gallery.visible_count() == 0 || index == self.selected {
            return Vec::new();
        }
        self.selected = index;
        vec![AppEvent::SelectionChanged(index)]
    }

    fn clamp_selection(&mut self) {
        self.selected = self
            .selected
            .min(self.gallery.visible_count().saturating_sub(1));
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
