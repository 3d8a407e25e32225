// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::errors::Result;

use super::coordinator::WatcherCoordinator;
use super::MonitorEvent;

/// Async shell around [`WatcherCoordinator`].
///
/// Every event (reader hits, failures, reload requests, shutdown) and every
/// frame tick is handled on this one task, so the coordinator never sees two
/// callers at once.
pub struct Runtime {
    coordinator: WatcherCoordinator,
    event_rx: mpsc::UnboundedReceiver<MonitorEvent>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

fn frame_ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

impl Runtime {
    pub fn new(
        coordinator: WatcherCoordinator,
        event_rx: mpsc::UnboundedReceiver<MonitorEvent>,
    ) -> Self {
        Self {
            coordinator,
            event_rx,
        }
    }

    pub fn coordinator(&self) -> &WatcherCoordinator {
        &self.coordinator
    }

    /// Main event loop.
    ///
    /// - Consumes `MonitorEvent`s and hands them to the coordinator.
    /// - While a signal is showing, ticks frames at the governor's cadence.
    /// - Stops every watcher on the way out.
    pub async fn run(mut self) -> Result<()> {
        info!(
            watchers = self.coordinator.watcher_count(),
            "logbeacon runtime started"
        );

        let mut period = self.coordinator.frame_interval();
        let mut ticker = frame_ticker(period);

        loop {
            let rendering = self.coordinator.active_signal().is_some();

            tokio::select! {
                maybe_event = self.event_rx.recv() => {
                    let Some(event) = maybe_event else {
                        info!("runtime event channel closed; exiting");
                        break;
                    };
                    debug!(?event, "runtime received event");
                    if !self.coordinator.handle_event(event) {
                        info!("shutdown requested; stopping runtime");
                        break;
                    }
                }
                _ = ticker.tick(), if rendering => {
                    if let Some(cadence) = self.coordinator.render_tick() {
                        debug!(?cadence, "frame cadence changed");
                    }
                }
            }

            let wanted = self.coordinator.frame_interval();
            if wanted != period {
                period = wanted;
                ticker = frame_ticker(period);
            }
        }

        self.coordinator.shutdown();
        info!("runtime exiting");
        Ok(())
    }
}
