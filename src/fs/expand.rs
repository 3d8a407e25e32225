// src/fs/expand.rs

//! Expansion of `~` and environment variables in configured paths.
//!
//! Rule files store paths the way users type them (`~/logs/app.log`,
//! `$XDG_STATE_HOME/app.log`). They are expanded once, before validation or
//! opening, and the core only ever sees the expanded form.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::{Captures, Regex};

pub trait PathExpander: Send + Sync + Debug {
    fn expand(&self, raw: &str) -> PathBuf;
}

/// Expands a leading `~` to the home directory and `$VAR` / `${VAR}` to the
/// value of the variable. Unknown variables are left untouched.
#[derive(Debug, Clone, Default)]
pub struct EnvPathExpander {
    /// Fixed lookups; `None` means "use the process environment".
    overrides: Option<(Option<PathBuf>, HashMap<String, String>)>,
}

fn var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("variable regex is valid")
    })
}

impl EnvPathExpander {
    pub fn new() -> Self {
        Self { overrides: None }
    }

    /// Expander with a fixed home directory and variable table.
    pub fn with_lookup(home: Option<PathBuf>, vars: HashMap<String, String>) -> Self {
        Self {
            overrides: Some((home, vars)),
        }
    }

    fn home(&self) -> Option<PathBuf> {
        match &self.overrides {
            Some((home, _)) => home.clone(),
            None => dirs::home_dir(),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        match &self.overrides {
            Some((_, vars)) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }
}

impl PathExpander for EnvPathExpander {
    fn expand(&self, raw: &str) -> PathBuf {
        let raw = raw.trim();

        let with_home = match raw.strip_prefix('~') {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => match self.home() {
                Some(home) => format!("{}{}", home.to_string_lossy(), rest),
                None => raw.to_string(),
            },
            _ => raw.to_string(),
        };

        let expanded = var_regex().replace_all(&with_home, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            self.var(name)
                .unwrap_or_else(|| caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default())
        });

        PathBuf::from(expanded.into_owned())
    }
}
