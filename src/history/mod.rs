// src/history/mod.rs

//! In-memory match history.
//!
//! [`EventHistory`] keeps the most recent [`MatchEvent`]s in a bounded FIFO
//! ring and feeds every recorded match into a per-rule
//! [`FrequencyTracker`] that raises a [`FrequencyWarning`] when a rule matches
//! abnormally often. Nothing here is persisted.

pub mod frequency;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::SystemTime;

use tracing::debug;

use crate::types::{RuleId, RuleSnapshot};

pub use frequency::{FrequencyTracker, FrequencyWarning, FREQUENCY_WARNING_THRESHOLD};

/// Maximum number of events kept.
pub const HISTORY_CAPACITY: usize = 100;

/// Maximum stored length of `matched_line`, in characters, including the
/// ellipsis marker.
pub const MAX_MATCHED_LINE_CHARS: usize = 200;

pub const ELLIPSIS: char = '…';

/// One matched line. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEvent {
    pub id: u64,
    pub rule_id: RuleId,
    pub rule_name: String,
    pub timestamp: SystemTime,
    pub matched_line: String,
    /// 1-based, counted from the moment the file started being tailed.
    pub line_number: u64,
    pub file_path: PathBuf,
    pub priority: usize,
}

impl MatchEvent {
    pub fn new(
        id: u64,
        rule: &RuleSnapshot,
        line: &str,
        line_number: u64,
        timestamp: SystemTime,
    ) -> Self {
        Self {
            id,
            rule_id: rule.rule.id.clone(),
            rule_name: rule.rule.name.clone(),
            timestamp,
            matched_line: truncate_line(line),
            line_number,
            file_path: rule.path.clone(),
            priority: rule.rule.priority,
        }
    }
}

/// Truncate to [`MAX_MATCHED_LINE_CHARS`] characters, replacing the tail with
/// an ellipsis when anything was cut.
pub fn truncate_line(line: &str) -> String {
    if line.chars().count() <= MAX_MATCHED_LINE_CHARS {
        return line.to_string();
    }
    let mut out: String = line.chars().take(MAX_MATCHED_LINE_CHARS - 1).collect();
    out.push(ELLIPSIS);
    out
}

#[derive(Debug)]
pub struct EventHistory {
    events: VecDeque<MatchEvent>,
    capacity: usize,
    next_id: u64,
    frequency: FrequencyTracker,
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHistory {
    pub fn new() -> Self {
        Self::with_frequency_threshold(FREQUENCY_WARNING_THRESHOLD)
    }

    pub fn with_frequency_threshold(threshold: u32) -> Self {
        Self {
            events: VecDeque::with_capacity(HISTORY_CAPACITY),
            capacity: HISTORY_CAPACITY,
            next_id: 0,
            frequency: FrequencyTracker::new(threshold),
        }
    }

    /// Allocate the id for the next event.
    pub fn next_event_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Append `event`, evicting the oldest entries beyond capacity.
    ///
    /// Returns a warning only when this match is the one that made the rule
    /// cross the frequency threshold.
    pub fn record(&mut self, event: MatchEvent) -> Option<FrequencyWarning> {
        let warning = self.frequency.record_match(&event.rule_id, &event.rule_name);

        self.events.push_back(event);
        if self.events.len() > self.capacity {
            let excess = self.events.len() - self.capacity;
            self.events.drain(..excess);
        }

        warning
    }

    /// Up to `limit` events, most recent first.
    pub fn recent(&self, limit: usize) -> Vec<MatchEvent> {
        self.events.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop all events. Frequency counters are left alone.
    pub fn clear(&mut self) {
        debug!(count = self.events.len(), "clearing match history");
        self.events.clear();
    }

    pub fn acknowledge(&mut self, rule_id: &str) -> Option<FrequencyWarning> {
        self.frequency.acknowledge(rule_id)
    }

    pub fn warning(&self, rule_id: &str) -> Option<&FrequencyWarning> {
        self.frequency.warning(rule_id)
    }

    pub fn warnings(&self) -> Vec<FrequencyWarning> {
        self.frequency.warnings()
    }

    pub fn consecutive_matches(&self, rule_id: &str) -> u32 {
        self.frequency.count(rule_id)
    }

    /// Cancel any warning and counter for a rule that is no longer watched.
    pub fn forget_rule(&mut self, rule_id: &str) {
        self.frequency.forget(rule_id);
    }
}
