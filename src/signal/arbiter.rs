// src/signal/arbiter.rs

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::signal::Renderer;
use crate::types::{RuleId, RuleSnapshot};

/// Minimum spacing between two triggers of the same rule.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// The rule currently driving the signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSignal {
    pub rule_id: RuleId,
    pub priority: usize,
    pub started_at: Instant,
}

/// Outcome of arbitrating one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No signal was active; this rule started one.
    Triggered,
    /// The same rule re-triggered its own signal outside the debounce window.
    Refreshed,
    /// A strictly higher-priority rule took over the signal.
    Preempted,
    /// Same rule inside its debounce window.
    Debounced,
    /// Another rule with equal or higher priority holds the signal.
    Outranked,
}

impl Decision {
    /// Whether this began a fresh signal sequence (as opposed to refreshing).
    pub fn is_fresh_start(self) -> bool {
        matches!(self, Decision::Triggered | Decision::Preempted)
    }
}

/// Priority + debounce arbitration for the single visual signal.
#[derive(Debug)]
pub struct SignalArbiter {
    debounce: Duration,
    active: Option<ActiveSignal>,
    last_trigger: HashMap<RuleId, Instant>,
}

impl Default for SignalArbiter {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl SignalArbiter {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            active: None,
            last_trigger: HashMap::new(),
        }
    }

    pub fn active(&self) -> Option<&ActiveSignal> {
        self.active.as_ref()
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Decide what a match of `rule` at `now` does to the signal.
    pub fn on_match(
        &mut self,
        rule: &RuleSnapshot,
        now: Instant,
        renderer: &mut dyn Renderer,
    ) -> Decision {
        let rule_id = rule.id();
        let priority = rule.priority();

        if renderer.is_idle() && self.active.is_some() {
            debug!("renderer went idle; clearing active signal");
            self.active = None;
        }

        if let Some(last) = self.last_trigger.get(rule_id) {
            if now.saturating_duration_since(*last) < self.debounce {
                debug!(rule = %rule_id, "match inside debounce window; suppressed");
                return Decision::Debounced;
            }
        }

        let decision = match &self.active {
            None => Decision::Triggered,
            Some(active) if active.rule_id == rule_id => Decision::Refreshed,
            Some(active) if priority < active.priority => Decision::Preempted,
            Some(active) => {
                debug!(
                    rule = %rule_id,
                    priority,
                    holder = %active.rule_id,
                    holder_priority = active.priority,
                    "signal held by a rule of equal or higher priority; suppressed"
                );
                return Decision::Outranked;
            }
        };

        self.last_trigger.insert(rule_id.to_string(), now);
        match decision {
            Decision::Refreshed => {}
            _ => {
                self.active = Some(ActiveSignal {
                    rule_id: rule_id.to_string(),
                    priority,
                    started_at: now,
                });
            }
        }

        info!(
            rule = %rule_id,
            priority,
            ?decision,
            style = %rule.rule.style,
            color = %rule.rule.color,
            "starting signal"
        );
        renderer.start_signal(rule.rule.style, &rule.rule.color);
        decision
    }

    /// Forget a rule's debounce state. If it holds the signal, the signal is
    /// ended and cleared. Returns true in that case.
    pub fn clear_rule(&mut self, rule_id: &str, renderer: &mut dyn Renderer) -> bool {
        self.last_trigger.remove(rule_id);
        let holds_signal = self
            .active
            .as_ref()
            .is_some_and(|active| active.rule_id == rule_id);
        if holds_signal {
            self.active = None;
            renderer.end_signal();
            debug!(rule = %rule_id, "ended signal of removed rule");
        }
        holds_signal
    }

    /// Re-rank the holder after the rule order changed. Rules missing from
    /// `priorities` keep their current rank.
    pub fn reprioritize(&mut self, priorities: &HashMap<RuleId, usize>) {
        if let Some(active) = self.active.as_mut() {
            if let Some(&priority) = priorities.get(&active.rule_id) {
                if priority != active.priority {
                    debug!(
                        rule = %active.rule_id,
                        from = active.priority,
                        to = priority,
                        "signal holder re-ranked"
                    );
                    active.priority = priority;
                }
            }
        }
    }

    /// Drop the active signal if the renderer reports it finished.
    pub fn sync_with(&mut self, renderer: &dyn Renderer) {
        if renderer.is_idle() {
            self.active = None;
        }
    }
}
