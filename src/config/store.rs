// src/config/store.rs

//! Configuration collaborator: where rules come from and where enable/path
//! changes made by the core are written back.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::debug;

use crate::config::loader::parse_str;
use crate::config::model::{ConfigFile, RawConfigFile, RuleConfig};
use crate::errors::{ConfigurationPersistError, Result};
use crate::fs::FileSystem;
use crate::types::Rule;

pub trait ConfigStore: Send {
    /// All rules, enabled or not, in priority order.
    fn load_rules(&self) -> Result<Vec<Rule>>;

    /// Persist one rule's current state (matched by id).
    fn update_rule(&mut self, rule: &Rule) -> std::result::Result<(), ConfigurationPersistError>;

    /// Replace the whole rule list.
    fn save_rules(&mut self, rules: &[Rule]) -> std::result::Result<(), ConfigurationPersistError>;
}

/// Rule store backed by the TOML rule file. Writes keep the `[monitor]`
/// section as it is on disk.
#[derive(Debug)]
pub struct TomlConfigStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_raw(&self) -> Result<RawConfigFile> {
        let contents = self.fs.read_to_string(&self.path)?;
        parse_str(&contents)
    }

    /// Load and validate the whole file, including `[monitor]`.
    pub fn load_config(&self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.load_raw()?)
    }

    fn write_raw(&self, raw: &RawConfigFile) -> std::result::Result<(), ConfigurationPersistError> {
        let text = toml::to_string_pretty(raw)
            .map_err(|e| ConfigurationPersistError(format!("serializing rules: {e}")))?;
        self.fs
            .write(&self.path, text.as_bytes())
            .with_context(|| format!("writing rule file {:?}", self.path))?;
        debug!(path = ?self.path, "rule file written");
        Ok(())
    }
}

impl ConfigStore for TomlConfigStore {
    fn load_rules(&self) -> Result<Vec<Rule>> {
        Ok(self.load_config()?.into_rules())
    }

    fn update_rule(&mut self, rule: &Rule) -> std::result::Result<(), ConfigurationPersistError> {
        let mut raw = self
            .load_raw()
            .map_err(|e| ConfigurationPersistError(format!("reading rule file: {e}")))?;
        let slot = raw
            .rule
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or_else(|| ConfigurationPersistError(format!("unknown rule id '{}'", rule.id)))?;
        *slot = RuleConfig::from(rule);
        self.write_raw(&raw)
    }

    fn save_rules(&mut self, rules: &[Rule]) -> std::result::Result<(), ConfigurationPersistError> {
        let mut raw = if self.fs.exists(&self.path) {
            self.load_raw()
                .map_err(|e| ConfigurationPersistError(format!("reading rule file: {e}")))?
        } else {
            RawConfigFile::default()
        };
        raw.rule = rules.iter().map(RuleConfig::from).collect();
        self.write_raw(&raw)
    }
}

/// In-memory rule store. Clones share state, so a test can keep a handle
/// after moving one into the coordinator.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    rules: Arc<Mutex<Vec<Rule>>>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<Mutex<usize>>,
}

impl MemoryConfigStore {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules: Arc::new(Mutex::new(rules)),
            ..Self::default()
        }
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.rules.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn rule(&self, id: &str) -> Option<Rule> {
        self.rules().into_iter().find(|r| r.id == id)
    }

    /// Replace the stored rules, as a user editing the configuration would.
    pub fn set_rules(&self, rules: Vec<Rule>) {
        *self.rules.lock().unwrap_or_else(|p| p.into_inner()) = rules;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn check_writable(&self) -> std::result::Result<(), ConfigurationPersistError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ConfigurationPersistError("store is read-only".to_string()));
        }
        *self.writes.lock().unwrap_or_else(|p| p.into_inner()) += 1;
        Ok(())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_rules(&self) -> Result<Vec<Rule>> {
        Ok(self.rules())
    }

    fn update_rule(&mut self, rule: &Rule) -> std::result::Result<(), ConfigurationPersistError> {
        self.check_writable()?;
        let mut rules = self.rules.lock().unwrap_or_else(|p| p.into_inner());
        let slot = rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or_else(|| ConfigurationPersistError(format!("unknown rule id '{}'", rule.id)))?;
        *slot = rule.clone();
        Ok(())
    }

    fn save_rules(&mut self, rules: &[Rule]) -> std::result::Result<(), ConfigurationPersistError> {
        self.check_writable()?;
        *self.rules.lock().unwrap_or_else(|p| p.into_inner()) = rules.to_vec();
        Ok(())
    }
}
