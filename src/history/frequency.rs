// src/history/frequency.rs

use std::collections::HashMap;

use tracing::{info, warn};

use crate::types::RuleId;

/// Consecutive matches after which a rule is considered too noisy.
pub const FREQUENCY_WARNING_THRESHOLD: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyWarning {
    pub rule_id: RuleId,
    pub consecutive_match_count: u32,
    pub acknowledged: bool,
    pub message: String,
}

/// Per-rule consecutive-match counters.
///
/// Counters only reset on acknowledgement (or when the rule is forgotten).
#[derive(Debug)]
pub struct FrequencyTracker {
    threshold: u32,
    counts: HashMap<RuleId, u32>,
    warnings: HashMap<RuleId, FrequencyWarning>,
}

impl FrequencyTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            counts: HashMap::new(),
            warnings: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Count one match. Returns the warning when it is first created.
    pub fn record_match(&mut self, rule_id: &str, rule_name: &str) -> Option<FrequencyWarning> {
        let count = self.counts.entry(rule_id.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        let count = *count;

        if let Some(existing) = self.warnings.get_mut(rule_id) {
            existing.consecutive_match_count = count;
            return None;
        }

        if count < self.threshold {
            return None;
        }

        let warning = FrequencyWarning {
            rule_id: rule_id.to_string(),
            consecutive_match_count: count,
            acknowledged: false,
            message: format!(
                "Rule '{rule_name}' matched {count} times in a row. \
                 Consider making its pattern more specific."
            ),
        };
        warn!(rule = %rule_id, count, "rule is matching unusually often");
        self.warnings.insert(rule_id.to_string(), warning.clone());
        Some(warning)
    }

    /// Clear the warning and reset the counter. Returns the cleared warning,
    /// marked acknowledged.
    pub fn acknowledge(&mut self, rule_id: &str) -> Option<FrequencyWarning> {
        self.counts.remove(rule_id);
        let mut warning = self.warnings.remove(rule_id)?;
        warning.acknowledged = true;
        info!(rule = %rule_id, "frequency warning acknowledged");
        Some(warning)
    }

    pub fn warning(&self, rule_id: &str) -> Option<&FrequencyWarning> {
        self.warnings.get(rule_id)
    }

    pub fn warnings(&self) -> Vec<FrequencyWarning> {
        let mut out: Vec<_> = self.warnings.values().cloned().collect();
        out.sort_by(|a, b| a.rule_id.cmp(&b.rule_id));
        out
    }

    pub fn count(&self, rule_id: &str) -> u32 {
        self.counts.get(rule_id).copied().unwrap_or(0)
    }

    pub fn forget(&mut self, rule_id: &str) {
        self.counts.remove(rule_id);
        self.warnings.remove(rule_id);
    }
}
