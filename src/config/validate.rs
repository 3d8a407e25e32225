// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, MonitorSection, RawConfigFile, RuleConfig};
use crate::errors::{LogbeaconError, Result};
use crate::pattern::CompiledPattern;
use crate::types::Rule;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::LogbeaconError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_monitor(&raw.monitor)?;
        validate_rule_ids(&raw.rule)?;
        let rules = raw
            .rule
            .iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>>>()?;
        Ok(ConfigFile::new_unchecked(raw.monitor, rules))
    }
}

fn validate_monitor(monitor: &MonitorSection) -> Result<()> {
    if monitor.frame_rate == 0 || monitor.reduced_frame_rate == 0 {
        return Err(LogbeaconError::ConfigError(
            "[monitor].frame_rate and reduced_frame_rate must be >= 1".to_string(),
        ));
    }
    if monitor.reduced_frame_rate > monitor.frame_rate {
        return Err(LogbeaconError::ConfigError(format!(
            "[monitor].reduced_frame_rate ({}) must not exceed frame_rate ({})",
            monitor.reduced_frame_rate, monitor.frame_rate
        )));
    }
    if monitor.fallback_violation_threshold == 0 || monitor.recovery_frame_threshold == 0 {
        return Err(LogbeaconError::ConfigError(
            "[monitor] frame thresholds must be >= 1".to_string(),
        ));
    }
    if monitor.frequency_threshold == 0 {
        return Err(LogbeaconError::ConfigError(
            "[monitor].frequency_threshold must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_rule_ids(rules: &[RuleConfig]) -> Result<()> {
    let mut seen = HashSet::new();
    for rule in rules {
        if rule.id.trim().is_empty() {
            return Err(LogbeaconError::ConfigError(format!(
                "rule '{}' has an empty id",
                rule.name
            )));
        }
        if rule.name.trim().is_empty() {
            return Err(LogbeaconError::ConfigError(format!(
                "rule '{}' has an empty name",
                rule.id
            )));
        }
        if !seen.insert(rule.id.as_str()) {
            return Err(LogbeaconError::ConfigError(format!(
                "duplicate rule id '{}'",
                rule.id
            )));
        }
        if !is_hex_color(&rule.color) {
            return Err(LogbeaconError::ConfigError(format!(
                "rule '{}' has invalid color '{}' (expected #rrggbb)",
                rule.id, rule.color
            )));
        }
    }
    Ok(())
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Compile a rule's pattern once. The file path is not checked here; that
/// happens when watchers are reconciled.
pub fn compile_rule(cfg: &RuleConfig) -> Result<Rule> {
    let pattern = CompiledPattern::with_options(&cfg.pattern, cfg.case_insensitive).map_err(
        |source| LogbeaconError::InvalidPattern {
            rule: cfg.id.clone(),
            source,
        },
    )?;

    Ok(Rule {
        id: cfg.id.clone(),
        name: cfg.name.clone(),
        pattern,
        file: cfg.file.clone(),
        enabled: cfg.enabled,
        style: cfg.style,
        color: cfg.color.clone(),
        priority: 0,
    })
}
