// src/config/model.rs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::signal::GovernorSettings;
use crate::types::{Rule, SignalStyle};

pub const DEFAULT_COLOR: &str = "#ff3b30";

/// Rule file as read from TOML, before validation.
///
/// ```toml
/// [monitor]
/// debounce_ms = 100
/// frame_rate = 60
///
/// [[rule]]
/// id = "errors"
/// name = "Errors"
/// pattern = "ERROR"
/// file = "~/logs/app.log"
/// style = "pulse"
/// color = "#ff3b30"
/// ```
///
/// All sections are optional and have reasonable defaults. The order of
/// `[[rule]]` entries is the priority order.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub monitor: MonitorSection,

    #[serde(default)]
    pub rule: Vec<RuleConfig>,
}

/// `[monitor]` section: timing knobs for the signal pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitorSection {
    /// Minimum spacing between two triggers of the same rule.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Target frames per second while the render budget holds.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Frames per second after falling back under load.
    #[serde(default = "default_reduced_frame_rate")]
    pub reduced_frame_rate: u32,

    #[serde(default = "default_fallback_violation_threshold")]
    pub fallback_violation_threshold: u32,

    #[serde(default = "default_recovery_frame_threshold")]
    pub recovery_frame_threshold: u32,

    /// How long the headless renderer keeps a signal up.
    #[serde(default = "default_signal_duration_ms")]
    pub signal_duration_ms: u64,

    /// Consecutive matches before a rule gets a frequency warning.
    #[serde(default = "default_frequency_threshold")]
    pub frequency_threshold: u32,
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_frame_rate() -> u32 {
    60
}

fn default_reduced_frame_rate() -> u32 {
    30
}

fn default_fallback_violation_threshold() -> u32 {
    5
}

fn default_recovery_frame_threshold() -> u32 {
    30
}

fn default_signal_duration_ms() -> u64 {
    3000
}

fn default_frequency_threshold() -> u32 {
    50
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            frame_rate: default_frame_rate(),
            reduced_frame_rate: default_reduced_frame_rate(),
            fallback_violation_threshold: default_fallback_violation_threshold(),
            recovery_frame_threshold: default_recovery_frame_threshold(),
            signal_duration_ms: default_signal_duration_ms(),
            frequency_threshold: default_frequency_threshold(),
        }
    }
}

impl MonitorSection {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn signal_duration(&self) -> Duration {
        Duration::from_millis(self.signal_duration_ms)
    }

    pub fn governor_settings(&self) -> GovernorSettings {
        GovernorSettings {
            fallback_violation_threshold: self.fallback_violation_threshold,
            recovery_frame_threshold: self.recovery_frame_threshold,
            ..GovernorSettings::from_frame_rates(self.frame_rate, self.reduced_frame_rate)
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

/// `[[rule]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuleConfig {
    pub id: String,

    pub name: String,

    /// Regular expression evaluated against each new line.
    pub pattern: String,

    /// File to tail; `~` and `$VARS` are expanded.
    pub file: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub case_insensitive: bool,

    #[serde(default)]
    pub style: SignalStyle,

    #[serde(default = "default_color")]
    pub color: String,
}

impl From<&Rule> for RuleConfig {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            pattern: rule.pattern.as_str().to_string(),
            file: rule.file.clone(),
            enabled: rule.enabled,
            case_insensitive: rule.pattern.is_case_insensitive(),
            style: rule.style,
            color: rule.color.clone(),
        }
    }
}

/// Validated configuration: every pattern compiled, ids unique.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    monitor: MonitorSection,
    rules: Vec<Rule>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(monitor: MonitorSection, rules: Vec<Rule>) -> Self {
        Self { monitor, rules }
    }

    pub fn monitor(&self) -> &MonitorSection {
        &self.monitor
    }

    /// Rules in file order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }
}
