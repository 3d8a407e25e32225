// src/engine/alerts.rs

//! Alert collaborator: how the core tells the user something went wrong.

use std::path::Path;

use tracing::warn;

/// The user's answer to "the file for this rule is missing".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingFileChoice {
    /// Use this path instead (raw, before expansion).
    Locate(String),
    /// Turn the rule off.
    Disable,
    Cancel,
}

pub trait AlertPresenter: Send {
    fn present_alert(&mut self, title: &str, message: &str);

    /// Ask what to do about a rule whose file does not exist. Called
    /// repeatedly until the answer is not a `Locate` pointing at another
    /// missing file.
    fn missing_file_prompt(&mut self, rule_name: &str, missing_path: &Path) -> MissingFileChoice;
}

/// Non-interactive presenter for the headless binary: alerts go to stdout and
/// the log, missing-file prompts are answered with `Cancel`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertPresenter;

impl AlertPresenter for LogAlertPresenter {
    fn present_alert(&mut self, title: &str, message: &str) {
        println!("[logbeacon] {title}: {message}");
        warn!(%title, %message, "alert raised");
    }

    fn missing_file_prompt(&mut self, rule_name: &str, missing_path: &Path) -> MissingFileChoice {
        warn!(
            rule = %rule_name,
            path = ?missing_path,
            "watched file is missing and no interactive prompt is available"
        );
        MissingFileChoice::Cancel
    }
}
