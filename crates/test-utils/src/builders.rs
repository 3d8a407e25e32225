#![allow(dead_code)]

use logbeacon::config::{ConfigFile, MonitorSection, RawConfigFile, RuleConfig, DEFAULT_COLOR};
use logbeacon::pattern::CompiledPattern;
use logbeacon::types::{Rule, RuleSnapshot, SignalStyle};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                monitor: MonitorSection::default(),
                rule: vec![],
            },
        }
    }

    pub fn with_rule(mut self, rule: RuleConfig) -> Self {
        self.config.rule.push(rule);
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.monitor.debounce_ms = ms;
        self
    }

    pub fn with_frequency_threshold(mut self, threshold: u32) -> Self {
        self.config.monitor.frequency_threshold = threshold;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a single rule, usable both as a compiled `Rule` and as a raw
/// `RuleConfig` entry.
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    rule: RuleConfig,
}

impl RuleBuilder {
    pub fn new(id: &str, pattern: &str, file: &str) -> Self {
        Self {
            rule: RuleConfig {
                id: id.to_string(),
                name: id.to_string(),
                pattern: pattern.to_string(),
                file: file.to_string(),
                enabled: true,
                case_insensitive: false,
                style: SignalStyle::default(),
                color: DEFAULT_COLOR.to_string(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.rule.name = name.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.rule.enabled = false;
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.rule.case_insensitive = true;
        self
    }

    pub fn style(mut self, style: SignalStyle) -> Self {
        self.rule.style = style;
        self
    }

    pub fn color(mut self, color: &str) -> Self {
        self.rule.color = color.to_string();
        self
    }

    pub fn config(self) -> RuleConfig {
        self.rule
    }

    pub fn build(self) -> Rule {
        let pattern = CompiledPattern::with_options(&self.rule.pattern, self.rule.case_insensitive)
            .expect("Failed to compile pattern from builder");
        Rule {
            enabled: self.rule.enabled,
            style: self.rule.style,
            color: self.rule.color.clone(),
            ..Rule::new(self.rule.id, self.rule.name, pattern, self.rule.file)
        }
    }

    /// A snapshot whose path is the configured file as-is.
    pub fn snapshot(self, priority: usize) -> RuleSnapshot {
        let mut rule = self.build();
        rule.priority = priority;
        let path = rule.file.clone().into();
        RuleSnapshot { rule, path }
    }
}
