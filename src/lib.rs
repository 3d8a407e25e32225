// src/lib.rs

pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod history;
pub mod logging;
pub mod pattern;
pub mod signal;
pub mod tail;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::clock::{Clock, SystemClock};
use crate::config::model::ConfigFile;
use crate::config::TomlConfigStore;
use crate::engine::{
    Collaborators, CoordinatorSettings, LogAlertPresenter, MonitorEvent, Runtime,
    WatcherCoordinator,
};
use crate::fs::{EnvPathExpander, FileSystem, PathExpander, RealFileSystem};
use crate::signal::HeadlessRenderer;
use crate::tail::NotifyChangeSource;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - rule file loading
/// - the real filesystem, notify-based change source and path expansion
/// - the headless renderer and log-based alerts
/// - the coordinator / runtime pair
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config_path();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let store = TomlConfigStore::new(&config_path, Arc::clone(&fs));
    let cfg = store
        .load_config()
        .with_context(|| format!("loading rule file {config_path:?}"))?;

    let expander: Arc<dyn PathExpander> = Arc::new(EnvPathExpander::new());

    if args.dry_run {
        print_dry_run(&config_path, &cfg, expander.as_ref());
        return Ok(());
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let renderer = HeadlessRenderer::new(Arc::clone(&clock), cfg.monitor().signal_duration());
    let settings = CoordinatorSettings::from_monitor(cfg.monitor());

    let collaborators = Collaborators {
        fs,
        changes: Arc::new(NotifyChangeSource),
        expander,
        clock,
        config: Box::new(store),
        renderer: Box::new(renderer),
        alerts: Box::new(LogAlertPresenter),
    };

    let (mut coordinator, events_rx) = WatcherCoordinator::new(collaborators, settings);
    coordinator.configure_watchers(cfg.into_rules());

    let watched = coordinator.watched_rule_ids();
    info!(?watched, "initial watchers configured");
    println!(
        "[logbeacon] watching {} file(s) from {:?}",
        watched.len(),
        config_path
    );

    // Ctrl-C → graceful shutdown.
    {
        let tx = coordinator.event_sender();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(MonitorEvent::ShutdownRequested);
        });
    }

    let runtime = Runtime::new(coordinator, events_rx);
    runtime.run().await?;
    Ok(())
}

/// Print the parsed rules in priority order with their expanded paths.
fn print_dry_run(config_path: &Path, cfg: &ConfigFile, expander: &dyn PathExpander) {
    let monitor = cfg.monitor();
    println!("logbeacon dry-run ({config_path:?})");
    println!("  monitor.debounce_ms = {}", monitor.debounce_ms);
    println!(
        "  monitor.frame_rate = {} (reduced {})",
        monitor.frame_rate, monitor.reduced_frame_rate
    );
    println!(
        "  monitor.frequency_threshold = {}",
        monitor.frequency_threshold
    );
    println!();

    println!("rules ({}):", cfg.rules().len());
    for (position, rule) in cfg.rules().iter().enumerate() {
        let state = if rule.enabled { "" } else { " (disabled)" };
        println!("  {position}. {} [{}]{state}", rule.name, rule.id);
        println!("      pattern: {}", rule.pattern.as_str());
        if rule.pattern.is_case_insensitive() {
            println!("      case_insensitive: true");
        }
        println!("      file: {} -> {:?}", rule.file, expander.expand(&rule.file));
        println!("      signal: {} {}", rule.style, rule.color);
    }

    debug!("dry-run complete (nothing watched)");
}
