// src/engine/reconcile.rs

//! Pure pieces of reconciliation: path validation and the diff between the
//! live watch set and the desired one.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::errors::FileAccessError;
use crate::fs::FileSystem;
use crate::types::{RuleId, RuleSnapshot};

/// Check that a rule's expanded path points at a readable regular file.
///
/// `raw` is the path as configured; an empty one is reported as missing.
pub fn validate_path(fs: &dyn FileSystem, raw: &str, path: &Path) -> Result<(), FileAccessError> {
    if raw.trim().is_empty() || !fs.exists(path) {
        return Err(FileAccessError::Missing(path.to_path_buf()));
    }
    if fs.is_dir(path) {
        return Err(FileAccessError::IsDirectory(path.to_path_buf()));
    }
    if !fs.is_readable(path) {
        return Err(FileAccessError::Unreadable(path.to_path_buf()));
    }
    Ok(())
}

/// What has to change to go from the live watch set to the desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Watched but no longer desired.
    pub remove: Vec<RuleId>,
    /// Desired with a different path than the live watcher: stop and recreate.
    pub restart: Vec<RuleSnapshot>,
    /// Not watched yet.
    pub add: Vec<RuleSnapshot>,
    /// Same path; only the snapshot (pattern, name, priority...) is refreshed.
    pub update: Vec<RuleSnapshot>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.remove.is_empty() && self.restart.is_empty() && self.add.is_empty()
    }
}

/// Diff `current` (rule id -> watched path) against `desired`, by rule id.
/// Output lists keep the order of `desired`; `remove` is sorted.
pub fn plan_reconcile(
    current: &HashMap<RuleId, PathBuf>,
    desired: &[RuleSnapshot],
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();
    let desired_ids: HashSet<&str> = desired.iter().map(|s| s.id()).collect();

    plan.remove = current
        .keys()
        .filter(|id| !desired_ids.contains(id.as_str()))
        .cloned()
        .collect();
    plan.remove.sort();

    for snapshot in desired {
        match current.get(snapshot.id()) {
            None => plan.add.push(snapshot.clone()),
            Some(path) if *path != snapshot.path => plan.restart.push(snapshot.clone()),
            Some(_) => plan.update.push(snapshot.clone()),
        }
    }

    plan
}
