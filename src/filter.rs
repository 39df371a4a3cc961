//! Free-text and completion filtering of merge items.

use log::{debug, warn};
use regex::{Regex, RegexBuilder};

use crate::config::RootConfiguration;
use crate::error::QueryError;
use crate::model::MergeItem;

const DEFAULT_PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Filter state: free text plus the "not completed only" flag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterQuery {
    pub text: String,
    pub not_completed_only: bool,
}

impl FilterQuery {
    pub fn new(text: impl Into<String>, not_completed_only: bool) -> Self {
        Self {
            text: text.into(),
            not_completed_only,
        }
    }

    pub fn from_configuration(configuration: &RootConfiguration) -> Self {
        Self::new(configuration.filter.clone(), configuration.not_completed_filter)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && !self.not_completed_only
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterResult {
    /// Visible items, most recently created first.
    pub items: Vec<MergeItem>,
    /// Number of stored items before filtering.
    pub total_count: usize,
}

impl FilterResult {
    pub fn ids(&self) -> Vec<u64> {
        self.items.iter().map(|item| item.id).collect()
    }
}

/// Case-insensitive literal matcher compiled from the filter text.
struct TextMatcher(Regex);

impl TextMatcher {
    fn matches(&self, value: &str) -> bool {
        self.0.is_match(value)
    }

    fn matches_item(&self, item: &MergeItem) -> bool {
        self.matches(&item.name)
            || item.targets.iter().any(|target| {
                self.matches(&target.work_item_id)
                    || self.matches(&target.changeset_id)
                    || self.matches(&target.target_branch)
                    || self.matches(&target.notes)
            })
    }
}

/// Computes the visible, ordered subset of merge items.
///
/// The filter text is escaped and compiled into a matcher; it is never spliced into a query
/// language, so characters such as `%`, `'` or `*` match literally.
#[derive(Clone, Debug)]
pub struct FilterEngine {
    size_limit: usize,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN_SIZE_LIMIT)
    }
}

impl FilterEngine {
    pub fn new(size_limit: usize) -> Self {
        Self { size_limit }
    }

    fn compile(&self, text: &str) -> Result<Option<TextMatcher>, QueryError> {
        if text.is_empty() {
            return Ok(None);
        }
        RegexBuilder::new(&regex::escape(text))
            .case_insensitive(true)
            .size_limit(self.size_limit)
            .build()
            .map(|regex| Some(TextMatcher(regex)))
            .map_err(|err| QueryError {
                filter: text.to_string(),
                reason: err.to_string(),
            })
    }

    /// Strict variant that reports a filter that cannot be compiled.
    pub fn try_filter(&self, items: &[MergeItem], query: &FilterQuery) -> Result<FilterResult, QueryError> {
        let matcher = self.compile(&query.text)?;
        let mut visible: Vec<MergeItem> = items
            .iter()
            // completion first, it prunes without touching the text
            .filter(|item| !query.not_completed_only || item.has_pending_target())
            .filter(|item| matcher.as_ref().map_or(true, |m| m.matches_item(item)))
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(FilterResult {
            items: visible,
            total_count: items.len(),
        })
    }

    /// Visible items for the query. A filter that cannot be evaluated yields no items.
    pub fn filter(&self, items: &[MergeItem], query: &FilterQuery) -> FilterResult {
        match self.try_filter(items, query) {
            Ok(result) => {
                debug!(
                    "Filter matched {} of {} merge item(s)",
                    result.items.len(),
                    result.total_count
                );
                result
            }
            Err(err) => {
                warn!("Filter could not be evaluated, showing no items");
                debug!("Filter failure details: {}", err);
                FilterResult {
                    items: Vec::new(),
                    total_count: items.len(),
                }
            }
        }
    }
}
