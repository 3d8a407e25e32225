// src/engine/mod.rs

//! Orchestration engine for logbeacon.
//!
//! This module ties together:
//! - reconciliation of the desired rule set against live tail readers
//! - per-line pattern evaluation for each reader's batches
//! - match history, frequency warnings and signal arbitration
//! - the runtime event loop that reacts to:
//!   - matches and watcher failures coming from reader tasks
//!   - frame ticks and render timings
//!   - reload / acknowledge / clear requests and shutdown
//!
//! [`WatcherCoordinator`] owns all state; [`Runtime`] is the async shell that
//! serialises every event onto one coordinating task.

use std::time::Duration;

use crate::errors::WatcherError;
use crate::types::{RuleId, RuleSnapshot};

/// Hard cap on concurrently watched files.
pub const MAX_WATCHER_COUNT: usize = 20;

/// A matched line on its way from a reader task to the coordinating context.
#[derive(Debug, Clone)]
pub struct MatchHit {
    /// Rule snapshot taken when the batch was evaluated.
    pub rule: RuleSnapshot,
    /// Watch entry generation that produced the hit.
    pub generation: u64,
    pub line: String,
    pub line_number: u64,
}

/// Events flowing into the runtime from readers, the renderer, the UI, etc.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Matched(MatchHit),
    /// A reader stopped itself after a fatal error.
    WatcherFailed {
        rule_id: RuleId,
        generation: u64,
        error: WatcherError,
    },
    /// A render timing measured outside the runtime's own frame loop.
    FrameRendered { duration: Duration },
    /// Reload rules from the configuration store and reconcile.
    Reload,
    ClearHistory,
    AcknowledgeWarning { rule_id: RuleId },
    /// The user turned a rule off.
    DisableRule { rule_id: RuleId },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod alerts;
pub mod coordinator;
pub mod reconcile;
pub mod runtime;

pub use alerts::{AlertPresenter, LogAlertPresenter, MissingFileChoice};
pub use coordinator::{
    Collaborators, CoordinatorSettings, CoordinatorStatus, WatchStatus, WatcherCoordinator,
};
pub use reconcile::{plan_reconcile, validate_path, ReconcilePlan};
pub use runtime::Runtime;
