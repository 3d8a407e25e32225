// src/engine/coordinator.rs

//! The watcher coordinator.
//!
//! Owns every live [`TailReader`] (keyed by rule id), keeps that set in sync
//! with the rule list, and turns reader output into match handling.
//!
//! Two kinds of context touch it:
//! - The coordinating context (the runtime task) calls the `&mut self`
//!   methods. History, arbitration, the governor and every collaborator call
//!   live here.
//! - Reader tasks call into an [`EntrySink`], which only touches the shared
//!   watch table (under its mutex) and forwards hits over a channel.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::model::MonitorSection;
use crate::config::store::ConfigStore;
use crate::engine::alerts::{AlertPresenter, MissingFileChoice};
use crate::engine::reconcile::{plan_reconcile, validate_path};
use crate::engine::{MatchHit, MonitorEvent, MAX_WATCHER_COUNT};
use crate::errors::{CapacityError, FileAccessError, WatcherError};
use crate::fs::{FileSystem, PathExpander};
use crate::history::{EventHistory, FrequencyWarning, MatchEvent, FREQUENCY_WARNING_THRESHOLD};
use crate::pattern::PatternEngine;
use crate::signal::{
    ActiveSignal, Cadence, Decision, GovernorSettings, PerformanceGovernor, Renderer,
    SignalArbiter, DEFAULT_DEBOUNCE,
};
use crate::tail::{ChangeSource, LineSink, ReadLimits, TailReader};
use crate::types::{Rule, RuleId, RuleSnapshot};

/// Everything outside the core that the coordinator talks to.
pub struct Collaborators {
    pub fs: Arc<dyn FileSystem>,
    pub changes: Arc<dyn ChangeSource>,
    pub expander: Arc<dyn PathExpander>,
    pub clock: Arc<dyn Clock>,
    pub config: Box<dyn ConfigStore>,
    pub renderer: Box<dyn Renderer>,
    pub alerts: Box<dyn AlertPresenter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub debounce: Duration,
    pub governor: GovernorSettings,
    pub frequency_threshold: u32,
    pub max_watchers: usize,
    pub read_limits: ReadLimits,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            governor: GovernorSettings::default(),
            frequency_threshold: FREQUENCY_WARNING_THRESHOLD,
            max_watchers: MAX_WATCHER_COUNT,
            read_limits: ReadLimits::default(),
        }
    }
}

impl CoordinatorSettings {
    pub fn from_monitor(monitor: &MonitorSection) -> Self {
        Self {
            debounce: monitor.debounce(),
            governor: monitor.governor_settings(),
            frequency_threshold: monitor.frequency_threshold,
            ..Self::default()
        }
    }
}

/// Live pairing of a rule snapshot with its reader.
struct WatchEntry {
    snapshot: RuleSnapshot,
    reader: TailReader,
    lines_read: u64,
    /// Distinguishes this entry from earlier entries of the same rule id, so
    /// late callbacks from a replaced reader are ignored.
    generation: u64,
}

#[derive(Default)]
struct WatchTable {
    entries: HashMap<RuleId, WatchEntry>,
    /// Rules whose next watcher failure should not raise an alert.
    suppressed_alerts: HashSet<RuleId>,
}

fn lock_table(table: &Mutex<WatchTable>) -> MutexGuard<'_, WatchTable> {
    table.lock().unwrap_or_else(|poisoned| {
        warn!("watch table mutex poisoned; continuing with inner state");
        poisoned.into_inner()
    })
}

/// Callback handle given to one reader. Holds the table weakly so readers
/// never keep the coordinator's state alive.
struct EntrySink {
    rule_id: RuleId,
    generation: u64,
    table: Weak<Mutex<WatchTable>>,
    events_tx: mpsc::UnboundedSender<MonitorEvent>,
}

impl LineSink for EntrySink {
    fn deliver(&self, lines: Vec<String>) {
        let Some(table) = self.table.upgrade() else {
            return;
        };

        let (snapshot, first_line) = {
            let guard = lock_table(&table);
            match guard.entries.get(&self.rule_id) {
                Some(entry) if entry.generation == self.generation => {
                    (entry.snapshot.clone(), entry.lines_read)
                }
                _ => return,
            }
        };

        // Evaluate without holding the lock.
        let pattern = &snapshot.rule.pattern;
        let hits: Vec<(u64, &String)> =
            PatternEngine::matching_indices(lines.iter().map(String::as_str), pattern)
                .into_iter()
                .map(|idx| (first_line + idx as u64 + 1, &lines[idx]))
                .collect();

        {
            let mut guard = lock_table(&table);
            match guard.entries.get_mut(&self.rule_id) {
                Some(entry) if entry.generation == self.generation => {
                    entry.lines_read += lines.len() as u64;
                }
                _ => return,
            }
        }

        if !hits.is_empty() {
            debug!(
                rule = %self.rule_id,
                lines = lines.len(),
                matches = hits.len(),
                "batch evaluated"
            );
        }

        for (line_number, line) in hits {
            let hit = MatchHit {
                rule: snapshot.clone(),
                generation: self.generation,
                line: line.clone(),
                line_number,
            };
            if self.events_tx.send(MonitorEvent::Matched(hit)).is_err() {
                debug!(rule = %self.rule_id, "runtime channel closed; dropping matches");
                return;
            }
        }
    }

    fn fail(&self, error: WatcherError) {
        let _ = self.events_tx.send(MonitorEvent::WatcherFailed {
            rule_id: self.rule_id.clone(),
            generation: self.generation,
            error,
        });
    }
}

/// Per-watcher view for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchStatus {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub path: PathBuf,
    pub priority: usize,
    pub lines_read: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorStatus {
    /// Sorted by priority.
    pub watchers: Vec<WatchStatus>,
    pub active_signal: Option<ActiveSignal>,
    pub cadence: Cadence,
    pub history_len: usize,
    pub warnings: Vec<FrequencyWarning>,
}

pub struct WatcherCoordinator {
    fs: Arc<dyn FileSystem>,
    changes: Arc<dyn ChangeSource>,
    expander: Arc<dyn PathExpander>,
    clock: Arc<dyn Clock>,
    config: Box<dyn ConfigStore>,
    renderer: Box<dyn Renderer>,
    alerts: Box<dyn AlertPresenter>,

    table: Arc<Mutex<WatchTable>>,
    events_tx: mpsc::UnboundedSender<MonitorEvent>,

    history: EventHistory,
    arbiter: SignalArbiter,
    governor: PerformanceGovernor,

    settings: CoordinatorSettings,
    capacity_alert_armed: bool,
    next_generation: u64,
}

impl std::fmt::Debug for WatcherCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherCoordinator")
            .field("watchers", &self.watcher_count())
            .field("history", &self.history.len())
            .field("active", &self.arbiter.active())
            .finish_non_exhaustive()
    }
}

impl WatcherCoordinator {
    /// Build a coordinator and the receiving end of its event channel, which
    /// the runtime drains.
    pub fn new(
        collaborators: Collaborators,
        settings: CoordinatorSettings,
    ) -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let Collaborators {
            fs,
            changes,
            expander,
            clock,
            config,
            renderer,
            alerts,
        } = collaborators;

        let coordinator = Self {
            fs,
            changes,
            expander,
            clock,
            config,
            renderer,
            alerts,
            table: Arc::new(Mutex::new(WatchTable::default())),
            events_tx,
            history: EventHistory::with_frequency_threshold(settings.frequency_threshold),
            arbiter: SignalArbiter::new(settings.debounce),
            governor: PerformanceGovernor::new(settings.governor),
            settings,
            capacity_alert_armed: true,
            next_generation: 0,
        };
        (coordinator, events_rx)
    }

    /// Sender for feeding events (reload, render timings, shutdown...) into
    /// the runtime from outside.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<MonitorEvent> {
        self.events_tx.clone()
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Reload rules from the configuration store and reconcile.
    pub fn reload(&mut self) {
        match self.config.load_rules() {
            Ok(rules) => self.configure_watchers(rules),
            Err(err) => {
                error!(error = %err, "failed to load rules; keeping current watchers");
                self.alerts
                    .present_alert("Could not load rules", &format!("{err}"));
            }
        }
    }

    /// Bring the live watcher set in line with `rules` (in priority order).
    ///
    /// 1. Disabled rules are skipped; enabled rules whose file fails
    ///    validation are disabled (and persisted) with an alert, after the
    ///    missing-file prompt for missing files.
    /// 2. Survivors get `priority` = position, capped at the watcher limit
    ///    with a one-shot capacity alert.
    /// 3. Live watchers are diffed by rule id: removed, restarted on path
    ///    change, added, or refreshed in place.
    pub fn configure_watchers(&mut self, rules: Vec<Rule>) {
        let mut desired: Vec<RuleSnapshot> = Vec::new();
        for rule in rules.into_iter().filter(|r| r.enabled) {
            if let Some(snapshot) = self.resolve_rule(rule) {
                desired.push(snapshot);
            }
        }

        for (priority, snapshot) in desired.iter_mut().enumerate() {
            snapshot.rule.priority = priority;
        }

        self.enforce_capacity(&mut desired);

        let current: HashMap<RuleId, PathBuf> = {
            let table = lock_table(&self.table);
            table
                .entries
                .iter()
                .map(|(id, entry)| (id.clone(), entry.snapshot.path.clone()))
                .collect()
        };
        let plan = plan_reconcile(&current, &desired);
        if plan.is_noop() {
            debug!(update = plan.update.len(), "no watchers to start or stop");
        } else {
            debug!(
                remove = plan.remove.len(),
                restart = plan.restart.len(),
                add = plan.add.len(),
                update = plan.update.len(),
                "reconciling watchers"
            );
        }

        for rule_id in &plan.remove {
            self.remove_watcher(rule_id);
        }

        {
            let mut table = lock_table(&self.table);
            for snapshot in plan.update {
                if let Some(entry) = table.entries.get_mut(snapshot.id()) {
                    entry.snapshot = snapshot;
                }
            }
        }
        let priorities: HashMap<RuleId, usize> = desired
            .iter()
            .map(|snapshot| (snapshot.id().to_string(), snapshot.priority()))
            .collect();
        self.arbiter.reprioritize(&priorities);

        for snapshot in plan.restart {
            info!(rule = %snapshot.id(), path = ?snapshot.path, "rule path changed; restarting watcher");
            self.remove_watcher(snapshot.id());
            self.add_watcher(snapshot);
        }

        for snapshot in plan.add {
            self.add_watcher(snapshot);
        }

        info!(watchers = self.watcher_count(), "watchers reconciled");
    }

    fn enforce_capacity(&mut self, desired: &mut Vec<RuleSnapshot>) {
        let limit = self.settings.max_watchers;
        if desired.len() <= limit {
            self.capacity_alert_armed = true;
            return;
        }

        let err = CapacityError::WatcherLimitExceeded {
            requested: desired.len(),
            limit,
        };
        let skipped: Vec<&str> = desired[limit..].iter().map(|s| s.id()).collect();
        warn!(error = %err, ?skipped, "watcher limit reached; lowest-priority rules left unwatched");

        if self.capacity_alert_armed {
            self.capacity_alert_armed = false;
            self.alerts.present_alert(
                "Watcher limit reached",
                &format!(
                    "{err}. The {} lowest-priority rules are not being watched.",
                    desired.len() - limit
                ),
            );
        }
        desired.truncate(limit);
    }

    /// Expand and validate a rule's path, running the missing-file flow when
    /// needed. Returns the snapshot to watch, or `None` if the rule was
    /// excluded from this pass.
    fn resolve_rule(&mut self, mut rule: Rule) -> Option<RuleSnapshot> {
        let mut path = self.expander.expand(&rule.file);

        loop {
            match validate_path(self.fs.as_ref(), &rule.file, &path) {
                Ok(()) => return Some(RuleSnapshot { rule, path }),
                Err(FileAccessError::Missing(missing)) => {
                    match self.alerts.missing_file_prompt(&rule.name, &missing) {
                        MissingFileChoice::Locate(raw) => {
                            info!(rule = %rule.id, new_path = %raw, "user relocated missing file");
                            rule.file = raw;
                            path = self.expander.expand(&rule.file);
                            if validate_path(self.fs.as_ref(), &rule.file, &path).is_ok() {
                                self.persist_rule(&rule);
                            }
                        }
                        MissingFileChoice::Disable => {
                            info!(rule = %rule.id, "user disabled rule with missing file");
                            rule.enabled = false;
                            self.persist_rule(&rule);
                            return None;
                        }
                        MissingFileChoice::Cancel => {
                            self.disable_invalid_rule(rule, FileAccessError::Missing(missing));
                            return None;
                        }
                    }
                }
                Err(err) => {
                    self.disable_invalid_rule(rule, err);
                    return None;
                }
            }
        }
    }

    fn disable_invalid_rule(&mut self, mut rule: Rule, err: FileAccessError) {
        warn!(rule = %rule.id, error = %err, "rule failed validation; disabling");
        rule.enabled = false;
        self.persist_rule(&rule);
        self.alerts.present_alert(
            &format!("Rule '{}' disabled", rule.name),
            &format!("Cannot watch {:?} for rule '{}': {err}", err.path(), rule.name),
        );
    }

    fn persist_rule(&mut self, rule: &Rule) {
        if let Err(err) = self.config.update_rule(rule) {
            warn!(rule = %rule.id, error = %err, "could not persist rule change");
        }
    }

    // ------------------------------------------------------------------
    // Watcher lifecycle
    // ------------------------------------------------------------------

    /// Create, register and start a watcher. On start failure the entry is
    /// removed again and the error logged; there is no retry.
    pub fn add_watcher(&mut self, snapshot: RuleSnapshot) -> bool {
        let rule_id = snapshot.id().to_string();
        self.next_generation += 1;
        let generation = self.next_generation;

        let sink = Arc::new(EntrySink {
            rule_id: rule_id.clone(),
            generation,
            table: Arc::downgrade(&self.table),
            events_tx: self.events_tx.clone(),
        });
        let reader = TailReader::new(
            snapshot.path.clone(),
            Arc::clone(&self.fs),
            Arc::clone(&self.changes),
            sink,
        )
        .with_limits(self.settings.read_limits);

        let mut table = lock_table(&self.table);
        if !table.entries.contains_key(&rule_id)
            && table.entries.len() >= self.settings.max_watchers
        {
            warn!(rule = %rule_id, "watcher limit reached; not adding watcher");
            return false;
        }
        table.suppressed_alerts.remove(&rule_id);

        let path = snapshot.path.clone();
        if let Some(mut previous) = table.entries.insert(
            rule_id.clone(),
            WatchEntry {
                snapshot,
                reader,
                lines_read: 0,
                generation,
            },
        ) {
            previous.reader.stop();
        }

        let started = match table.entries.get_mut(&rule_id) {
            Some(entry) => entry.reader.start(),
            None => return false,
        };

        match started {
            Ok(()) => {
                info!(rule = %rule_id, ?path, generation, "watcher added");
                true
            }
            Err(err) => {
                table.entries.remove(&rule_id);
                error!(rule = %rule_id, ?path, error = %err, "failed to start watcher");
                false
            }
        }
    }

    /// Stop a rule's reader and drop its bookkeeping, including its debounce
    /// state, its hold on the signal and any pending frequency warning.
    pub fn remove_watcher(&mut self, rule_id: &str) {
        let removed = lock_table(&self.table).entries.remove(rule_id);
        if let Some(mut entry) = removed {
            entry.reader.stop();
            info!(rule = %rule_id, "watcher removed");
        }
        self.arbiter.clear_rule(rule_id, self.renderer.as_mut());
        self.history.forget_rule(rule_id);
    }

    /// Ignore the next watcher failure of `rule_id` for alerting purposes.
    pub fn suppress_alerts_for(&mut self, rule_id: &str) {
        lock_table(&self.table)
            .suppressed_alerts
            .insert(rule_id.to_string());
    }

    /// The user turned a rule off: persist it and stop watching without
    /// raising a failure alert.
    pub fn disable_rule(&mut self, rule_id: &str) {
        self.suppress_alerts_for(rule_id);
        match self.config.load_rules() {
            Ok(rules) => {
                if let Some(mut rule) = rules.into_iter().find(|r| r.id == rule_id) {
                    rule.enabled = false;
                    self.persist_rule(&rule);
                }
            }
            Err(err) => warn!(rule = %rule_id, error = %err, "could not load rules to disable"),
        }
        self.remove_watcher(rule_id);
    }

    /// React to a reader that stopped itself: drop the watcher, disable and
    /// persist the rule, alert once, then reload so the rule list reflects
    /// the change. Failures from replaced or removed watchers are ignored.
    pub fn handle_watcher_error(&mut self, rule_id: &str, generation: u64, error: WatcherError) {
        let (snapshot, suppressed) = {
            let mut table = lock_table(&self.table);
            let snapshot = match table.entries.get(rule_id) {
                Some(entry) if entry.generation == generation => entry.snapshot.clone(),
                _ => {
                    debug!(rule = %rule_id, generation, "failure from stale watcher ignored");
                    return;
                }
            };
            (snapshot, table.suppressed_alerts.remove(rule_id))
        };

        self.remove_watcher(rule_id);

        if suppressed {
            info!(rule = %rule_id, error = %error, "watcher stopped while being disabled");
            return;
        }

        error!(rule = %rule_id, error = %error, "watcher failed; disabling rule");

        let mut rule = match self.config.load_rules() {
            Ok(rules) => rules
                .into_iter()
                .find(|r| r.id == rule_id)
                .unwrap_or_else(|| snapshot.rule.clone()),
            Err(err) => {
                warn!(error = %err, "could not load rules; disabling from snapshot");
                snapshot.rule.clone()
            }
        };
        rule.enabled = false;
        self.persist_rule(&rule);

        self.alerts.present_alert(
            &format!("Rule '{}' stopped: {}", snapshot.rule.name, error.kind_label()),
            &format!(
                "Stopped watching {:?} for rule '{}' ({error}). The rule has been disabled; \
                 relocate the file and re-enable it to resume.",
                error.path(),
                snapshot.rule.name
            ),
        );

        self.reload();
    }

    // ------------------------------------------------------------------
    // Matches and signal
    // ------------------------------------------------------------------

    /// Record a match and arbitrate the signal. Returns `None` when the hit
    /// came from a watcher that is no longer live.
    pub fn handle_match(&mut self, hit: MatchHit) -> Option<Decision> {
        // Arbitrate with the rule as it is now; a reconcile may have moved its
        // priority since the batch was evaluated.
        let live = lock_table(&self.table)
            .entries
            .get(hit.rule.id())
            .filter(|entry| entry.generation == hit.generation)
            .map(|entry| entry.snapshot.clone());
        let Some(rule) = live else {
            debug!(rule = %hit.rule.id(), "match from removed watcher dropped");
            return None;
        };

        let now = self.clock.now();
        let id = self.history.next_event_id();
        let event = MatchEvent::new(id, &rule, &hit.line, hit.line_number, self.clock.wall());
        info!(
            rule = %event.rule_id,
            line_number = event.line_number,
            line = %event.matched_line,
            "pattern matched"
        );

        if let Some(warning) = self.history.record(event) {
            self.alerts
                .present_alert(&format!("Rule '{}' is noisy", rule.rule.name), &warning.message);
        }

        let decision = self.arbiter.on_match(&rule, now, self.renderer.as_mut());
        if decision.is_fresh_start() {
            self.governor.reset();
        }
        Some(decision)
    }

    /// Draw one frame through the renderer (if a signal is showing) and feed
    /// its timing to the governor. Returns the new cadence on a transition.
    pub fn render_tick(&mut self) -> Option<Cadence> {
        let change = self
            .renderer
            .render_frame()
            .and_then(|duration| self.governor.record_render_duration(duration));
        self.arbiter.sync_with(self.renderer.as_ref());
        change
    }

    /// Feed a render timing measured by the renderer itself.
    pub fn record_frame_duration(&mut self, duration: Duration) -> Option<Cadence> {
        self.governor.record_render_duration(duration)
    }

    pub fn acknowledge_warning(&mut self, rule_id: &str) -> Option<FrequencyWarning> {
        self.history.acknowledge(rule_id)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn recent_matches(&self, limit: usize) -> Vec<MatchEvent> {
        self.history.recent(limit)
    }

    pub fn frequency_warning(&self, rule_id: &str) -> Option<&FrequencyWarning> {
        self.history.warning(rule_id)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn watcher_count(&self) -> usize {
        lock_table(&self.table).entries.len()
    }

    pub fn is_watching(&self, rule_id: &str) -> bool {
        lock_table(&self.table).entries.contains_key(rule_id)
    }

    /// Watched rule ids in priority order.
    pub fn watched_rule_ids(&self) -> Vec<RuleId> {
        self.status().watchers.into_iter().map(|w| w.rule_id).collect()
    }

    pub fn active_signal(&self) -> Option<&ActiveSignal> {
        self.arbiter.active()
    }

    pub fn cadence(&self) -> Cadence {
        self.governor.cadence()
    }

    pub fn frame_interval(&self) -> Duration {
        self.governor.interval()
    }

    pub fn status(&self) -> CoordinatorStatus {
        let mut watchers: Vec<WatchStatus> = lock_table(&self.table)
            .entries
            .values()
            .map(|entry| WatchStatus {
                rule_id: entry.snapshot.rule.id.clone(),
                rule_name: entry.snapshot.rule.name.clone(),
                path: entry.snapshot.path.clone(),
                priority: entry.snapshot.rule.priority,
                lines_read: entry.lines_read,
            })
            .collect();
        watchers.sort_by_key(|w| w.priority);

        CoordinatorStatus {
            watchers,
            active_signal: self.arbiter.active().cloned(),
            cadence: self.governor.cadence(),
            history_len: self.history.len(),
            warnings: self.history.warnings(),
        }
    }

    // ------------------------------------------------------------------
    // Event dispatch
    // ------------------------------------------------------------------

    /// Handle one runtime event. Returns whether the runtime should keep
    /// running.
    pub fn handle_event(&mut self, event: MonitorEvent) -> bool {
        match event {
            MonitorEvent::Matched(hit) => {
                self.handle_match(hit);
            }
            MonitorEvent::WatcherFailed {
                rule_id,
                generation,
                error,
            } => self.handle_watcher_error(&rule_id, generation, error),
            MonitorEvent::FrameRendered { duration } => {
                self.record_frame_duration(duration);
            }
            MonitorEvent::Reload => self.reload(),
            MonitorEvent::ClearHistory => self.clear_history(),
            MonitorEvent::AcknowledgeWarning { rule_id } => {
                self.acknowledge_warning(&rule_id);
            }
            MonitorEvent::DisableRule { rule_id } => self.disable_rule(&rule_id),
            MonitorEvent::ShutdownRequested => return false,
        }
        true
    }

    /// Stop every reader and end any signal.
    pub fn shutdown(&mut self) {
        let entries: Vec<WatchEntry> = lock_table(&self.table)
            .entries
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        for mut entry in entries {
            entry.reader.stop();
        }
        if self.arbiter.active().is_some() {
            self.renderer.end_signal();
        }
        self.arbiter = SignalArbiter::new(self.settings.debounce);
        info!("all watchers stopped");
    }
}
