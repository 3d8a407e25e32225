use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pattern::CompiledPattern;

/// Stable rule identifier, as written in the rule file.
pub type RuleId = String;

/// How the visual signal animates while a rule holds it.
///
/// Passed through opaquely to the renderer; the core never interprets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStyle {
    #[default]
    Pulse,
    Blink,
    Solid,
}

impl fmt::Display for SignalStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalStyle::Pulse => write!(f, "pulse"),
            SignalStyle::Blink => write!(f, "blink"),
            SignalStyle::Solid => write!(f, "solid"),
        }
    }
}

impl FromStr for SignalStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pulse" => Ok(SignalStyle::Pulse),
            "blink" => Ok(SignalStyle::Blink),
            "solid" => Ok(SignalStyle::Solid),
            other => Err(format!(
                "invalid signal style: {other} (expected \"pulse\", \"blink\" or \"solid\")"
            )),
        }
    }
}

/// A rule as seen by the core.
///
/// `priority` is derived: it is the rule's position in the enabled, validated
/// rule list at the last reconciliation, lower meaning more important. It is
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub pattern: CompiledPattern,
    /// Path as configured (may contain `~` or environment variables).
    pub file: String,
    pub enabled: bool,
    pub style: SignalStyle,
    pub color: String,
    pub priority: usize,
}

impl Rule {
    /// A rule with default presentation and priority 0.
    pub fn new(
        id: impl Into<RuleId>,
        name: impl Into<String>,
        pattern: CompiledPattern,
        file: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            pattern,
            file: file.into(),
            enabled: true,
            style: SignalStyle::default(),
            color: crate::config::model::DEFAULT_COLOR.to_string(),
            priority: 0,
        }
    }
}

/// A rule with its path already expanded, taken by value when a watcher is
/// created. Readers of match results only ever see these snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSnapshot {
    pub rule: Rule,
    pub path: PathBuf,
}

impl RuleSnapshot {
    pub fn id(&self) -> &str {
        &self.rule.id
    }

    pub fn priority(&self) -> usize {
        self.rule.priority
    }
}
