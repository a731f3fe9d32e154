// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::model::{Capture, SortOrder, compare_captures};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    pub capture: Capture,
    pub visible: bool,
}

/// The loaded captures plus the visibility derived from the current query.
///
/// Filtering only flips `visible`; the underlying collection keeps its order
/// and length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Gallery {
    items: Vec<GalleryItem>,
    query: String,
}

impl Gallery {
    pub fn new(captures: Vec<Capture>) -> Self {
        Self {
            items: captures
                .into_iter()
                .map(|capture| GalleryItem {
                    capture,
                    visible: true,
                })
                .collect(),
            query: String::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn apply_query(&mut self, query: &str) -> usize {
        self.query = query.to_owned();
        let needle = query.to_lowercase();
        for item in &mut self.items {
            item.visible = item.capture.label().to_lowercase().contains(&needle);
        }
        self.visible_count()
    }

    pub fn replace(&mut self, captures: Vec<Capture>) -> usize {
        let query = std::mem::take(&mut self.query);
        *self = Self::new(captures);
        self.apply_query(&query)
    }

    pub fn resort(&mut self, order: SortOrder) {
        self.items
            .sort_by(|left, right| compare_captures(&left.capture, &right.capture, order));
    }

    pub fn items(&self) -> &[GalleryItem] {
        &self.items
    }

    pub fn visible(&self) -> impl Iterator<Item = &Capture> {
        self.items
            .iter()
            .filter(|item| item.visible)
            .map(|item| &item.capture)
    }

    pub fn visible_count(&self) -> usize {
        self.items.iter().filter(|item| item.visible).count()
    }

    pub fn nth_visible(&self, index: usize) -> Option<&Capture> {
        self.visible().nth(index)
    }

    pub fn position_of(&self, file_name: &str) -> Option<usize> {
        self.visible()
            .position(|capture| capture.file_name() == file_name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub fn label_matches(label: &str, query: &str) -> bool {
    label.to_lowercase().contains(&query.to_lowercase())
}
