//! Derived views over the record collection: filtering and progressive
//! disclosure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::PhoneBookConfig;
use crate::record::{parse_date, Record};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionFilter {
    #[default]
    Any,
    OnlyDone,
    OnlyNotDone,
}

/// The active filter set. All criteria combine with logical AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    completion: CompletionFilter,
    date: Option<NaiveDate>,
    search: String,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completion(&self) -> CompletionFilter {
        self.completion
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// "Only done" checkbox. Checking it clears "only not done".
    pub fn set_only_done(&mut self, checked: bool) {
        if checked {
            self.completion = CompletionFilter::OnlyDone;
        } else if self.completion == CompletionFilter::OnlyDone {
            self.completion = CompletionFilter::Any;
        }
    }

    /// "Only not done" checkbox. Checking it clears "only done".
    pub fn set_only_not_done(&mut self, checked: bool) {
        if checked {
            self.completion = CompletionFilter::OnlyNotDone;
        } else if self.completion == CompletionFilter::OnlyNotDone {
            self.completion = CompletionFilter::Any;
        }
    }

    pub fn set_date(&mut self, date: Option<NaiveDate>) {
        self.date = date;
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.matches_completion(record) && self.matches_date(record) && self.matches_search(record)
    }

    pub fn apply<'a>(&self, records: &'a [Record]) -> Vec<&'a Record> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    fn matches_completion(&self, record: &Record) -> bool {
        match self.completion {
            CompletionFilter::Any => true,
            CompletionFilter::OnlyDone => record.done == Some(true),
            CompletionFilter::OnlyNotDone => record.done == Some(false),
        }
    }

    // Undated or unparseable records never match an active date filter.
    fn matches_date(&self, record: &Record) -> bool {
        match self.date {
            None => true,
            Some(day) => record.calendar_date() == Some(day),
        }
    }

    fn matches_search(&self, record: &Record) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let lowered = self.search.to_lowercase();

        record.name.to_lowercase().contains(&lowered)
            || record.phone.contains(&self.search)
            || record.description.to_lowercase().contains(&lowered)
            || record.price.contains(&self.search)
            || record
                .done
                .is_some_and(|done| done.to_string().contains(&lowered))
    }
}

/// Filter set as received over FFI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterQuery {
    pub only_done: bool,
    pub only_not_done: bool,
    /// `DD/MM/YYYY`
    pub date: Option<String>,
    pub search: String,
}

impl From<FilterQuery> for RecordFilter {
    fn from(query: FilterQuery) -> Self {
        let mut filter = RecordFilter::new();
        filter.set_only_done(query.only_done);
        filter.set_only_not_done(query.only_not_done);
        filter.set_date(query.date.as_deref().and_then(parse_date));
        filter.set_search(query.search);
        filter
    }
}

/// Where the viewport sits on the rendered list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub content_height: f64,
}

impl ScrollMetrics {
    pub fn scrolled_fraction(&self) -> f64 {
        if self.content_height <= 0.0 {
            return 0.0;
        }
        (self.scroll_top + self.viewport_height) / self.content_height
    }
}

/// How many filtered records are rendered.
///
/// The count is not reset when filters change; reads clamp it.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    visible: usize,
    increment: usize,
    threshold: f64,
}

impl Pagination {
    pub fn new(initial: usize, increment: usize, threshold: f64) -> Self {
        Self {
            visible: initial,
            increment,
            threshold,
        }
    }

    pub fn from_config(config: &PhoneBookConfig) -> Self {
        Self::new(config.page_size, config.page_increment, config.scroll_threshold)
    }

    pub fn visible(&self) -> usize {
        self.visible
    }

    /// Grows the count when the user is near the bottom and more records are
    /// waiting. Returns whether the count changed.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics, filtered_len: usize) -> bool {
        if metrics.scrolled_fraction() > self.threshold && self.visible < filtered_len {
            self.visible = (self.visible + self.increment).min(filtered_len);
            true
        } else {
            false
        }
    }

    pub fn window<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[..self.visible.min(items.len())]
    }
}
