#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use logbeacon::clock::ManualClock;
use logbeacon::config::MemoryConfigStore;
use logbeacon::engine::{
    Collaborators, CoordinatorSettings, MonitorEvent, WatcherCoordinator,
};
use logbeacon::fs::mock::MockFileSystem;
use logbeacon::fs::EnvPathExpander;
use logbeacon::tail::{FileChange, ManualChangeSource};
use logbeacon::types::Rule;

pub use logbeacon_test_utils::builders::{ConfigBuilder, RuleBuilder};
pub use logbeacon_test_utils::fakes::{RecordingAlerts, RecordingRenderer, RenderCall};
pub use logbeacon_test_utils::{eventually, init_tracing, with_timeout};

pub const HOME: &str = "/home/tester";

/// A coordinator wired to in-memory collaborators, plus test-side handles to
/// all of them.
pub struct Harness {
    pub fs: MockFileSystem,
    pub changes: ManualChangeSource,
    pub clock: ManualClock,
    pub store: MemoryConfigStore,
    pub renderer: RecordingRenderer,
    pub alerts: RecordingAlerts,
    pub coordinator: WatcherCoordinator,
    pub events: mpsc::UnboundedReceiver<MonitorEvent>,
}

impl Harness {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self::with_settings(rules, CoordinatorSettings::default())
    }

    pub fn with_settings(rules: Vec<Rule>, settings: CoordinatorSettings) -> Self {
        init_tracing();

        let fs = MockFileSystem::new();
        let changes = ManualChangeSource::new();
        let clock = ManualClock::new();
        let store = MemoryConfigStore::new(rules);
        let renderer = RecordingRenderer::new();
        let alerts = RecordingAlerts::new();

        let mut vars = HashMap::new();
        vars.insert("LOGS".to_string(), "/var/log".to_string());
        let expander = EnvPathExpander::with_lookup(Some(PathBuf::from(HOME)), vars);

        let (coordinator, events) = WatcherCoordinator::new(
            Collaborators {
                fs: Arc::new(fs.clone()),
                changes: Arc::new(changes.clone()),
                expander: Arc::new(expander),
                clock: Arc::new(clock.clone()),
                config: Box::new(store.clone()),
                renderer: Box::new(renderer.clone()),
                alerts: Box::new(alerts.clone()),
            },
            settings,
        );

        Self {
            fs,
            changes,
            clock,
            store,
            renderer,
            alerts,
            coordinator,
            events,
        }
    }

    /// Reconcile against whatever the store currently holds.
    pub fn reload(&mut self) {
        self.coordinator.reload();
    }

    /// Append to a watched file and notify its readers.
    pub fn write_lines(&self, path: &str, text: &str) {
        self.fs.append(path, text.as_bytes());
        self.changes.fire(path, FileChange::Modified);
    }

    pub async fn next_event(&mut self) -> MonitorEvent {
        timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for a monitor event")
            .expect("event channel closed")
    }

    /// Receive `n` events and hand each one to the coordinator.
    pub async fn pump(&mut self, n: usize) -> Vec<MonitorEvent> {
        let mut seen = Vec::with_capacity(n);
        for _ in 0..n {
            let event = self.next_event().await;
            seen.push(event.clone());
            self.coordinator.handle_event(event);
        }
        seen
    }

    /// Assert that nothing arrives for a short while.
    pub async fn assert_quiet(&mut self) {
        let got = timeout(Duration::from_millis(100), self.events.recv()).await;
        assert!(got.is_err(), "unexpected event: {got:?}");
    }
}

/// `count` rules watching `/logs/rule{i}.log` for "ERROR", with the files
/// created in `fs`.
pub fn error_rules(fs: &MockFileSystem, count: usize) -> Vec<Rule> {
    (0..count)
        .map(|i| {
            let path = format!("/logs/rule{i}.log");
            fs.add_file(&path, b"boot\n".to_vec());
            RuleBuilder::new(&format!("rule{i}"), "ERROR", &path).build()
        })
        .collect()
}
