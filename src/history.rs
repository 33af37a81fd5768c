use std::collections::VecDeque;

use chrono::{Duration as ChronoDuration, Utc};

use crate::types::{
    EffectiveSearchParameters, FrequencyEntry, HistoryAnalytics, SearchHistoryRecord,
};

pub const HISTORY_CAP: usize = 100;
const TOP_N: usize = 5;

/// Bounded FIFO log of completed searches. Appends go at the tail; the
/// oldest records are dropped once the cap is exceeded. Only the
/// search-completion path writes here.
pub struct SearchHistory {
    records: VecDeque<SearchHistoryRecord>,
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchHistory {
    pub fn new() -> Self {
        Self {
            records: VecDeque::new(),
        }
    }

    pub fn record(&mut self, query: EffectiveSearchParameters, result_count: u64) {
        self.records.push_back(SearchHistoryRecord {
            query,
            timestamp: Utc::now(),
            result_count,
        });
        while self.records.len() > HISTORY_CAP {
            self.records.pop_front();
        }
    }

    /// Last `limit` records in insertion order, most recent last.
    pub fn recent(&self, limit: usize) -> Vec<SearchHistoryRecord> {
        let skip = self.records.len().saturating_sub(limit);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Aggregates over retained records. Location frequency uses `near`,
    /// falling back to `default_location` for records without one.
    pub fn analytics(&self, default_location: &str) -> HistoryAnalytics {
        let now = Utc::now();
        let day_ago = now - ChronoDuration::hours(24);
        let week_ago = now - ChronoDuration::days(7);

        let total = self.records.len() as u64;
        let last_24h = self
            .records
            .iter()
            .filter(|r| r.timestamp >= day_ago)
            .count() as u64;
        let last_7d = self
            .records
            .iter()
            .filter(|r| r.timestamp >= week_ago)
            .count() as u64;
        let average = if self.records.is_empty() {
            0.0
        } else {
            self.records.iter().map(|r| r.result_count).sum::<u64>() as f64 / total as f64
        };

        let top_categories = top_by_frequency(
            self.records
                .iter()
                .filter_map(|r| r.query.category.as_deref()),
        );
        let top_locations = top_by_frequency(
            self.records
                .iter()
                .map(|r| r.query.near.as_deref().unwrap_or(default_location)),
        );

        HistoryAnalytics {
            total_searches: total,
            searches_last_24h: last_24h,
            searches_last_7d: last_7d,
            average_result_count: average,
            top_categories,
            top_locations,
        }
    }
}

/// Frequency count in first-seen order, then a stable sort by descending
/// count so ties keep first-seen order, truncated to the top 5.
fn top_by_frequency<'a>(values: impl Iterator<Item = &'a str>) -> Vec<FrequencyEntry> {
    let mut counts: Vec<(String, u64)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(k, _)| k == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(TOP_N)
        .map(|(value, count)| FrequencyEntry { value, count })
        .collect()
}
