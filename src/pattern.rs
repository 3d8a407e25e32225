// src/pattern.rs

//! Line predicate evaluation.
//!
//! Patterns are compiled once, when a rule is loaded, into a
//! [`CompiledPattern`]. Evaluation is a pure function of the line and the
//! compiled pattern; there is no shared mutable state, so the same pattern can
//! be evaluated concurrently from any number of reader tasks.

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

/// A pre-compiled rule pattern.
///
/// Cloning is cheap (the compiled program is shared), which lets rule
/// snapshots be handed across tasks by value.
#[derive(Clone)]
pub struct CompiledPattern {
    source: String,
    case_insensitive: bool,
    regex: Arc<Regex>,
}

impl CompiledPattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Self::with_options(source, false)
    }

    pub fn with_options(source: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            source: source.to_string(),
            case_insensitive,
            regex: Arc::new(regex),
        })
    }

    /// The pattern text as written in the rule file.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("source", &self.source)
            .field("case_insensitive", &self.case_insensitive)
            .finish()
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

impl Eq for CompiledPattern {}

/// Stateless evaluator for compiled patterns.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternEngine;

impl PatternEngine {
    /// Returns true if `line` matches `pattern` anywhere.
    pub fn evaluate(line: &str, pattern: &CompiledPattern) -> bool {
        pattern.regex.is_match(line)
    }

    /// Capture groups of the first match, if any. Group 0 is the whole match;
    /// groups that did not participate are returned as empty strings.
    pub fn captures(line: &str, pattern: &CompiledPattern) -> Option<Vec<String>> {
        let caps = pattern.regex.captures(line)?;
        Some(
            caps.iter()
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }

    /// Evaluate a batch of lines, returning the zero-based indices that matched.
    pub fn matching_indices<'a, I>(lines: I, pattern: &CompiledPattern) -> Vec<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines
            .into_iter()
            .enumerate()
            .filter(|(_, line)| Self::evaluate(line, pattern))
            .map(|(idx, _)| idx)
            .collect()
    }
}
