//! Recording collaborators for coordinator tests.
//!
//! Each fake is cheap to clone and clones share state, so a test keeps one
//! handle and moves the other into the coordinator.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use logbeacon::engine::{AlertPresenter, MissingFileChoice};
use logbeacon::signal::Renderer;
use logbeacon::types::SignalStyle;

/// One call made on a [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    Start { style: SignalStyle, color: String },
    End,
}

/// Renderer that records calls. It stays "showing" after `start_signal`
/// until `end_signal` or [`RecordingRenderer::finish`].
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    calls: Arc<Mutex<Vec<RenderCall>>>,
    showing: Arc<AtomicBool>,
    frame_time: Arc<Mutex<Option<Duration>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn starts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RenderCall::Start { .. }))
            .count()
    }

    pub fn ends(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RenderCall::End))
            .count()
    }

    pub fn last_color(&self) -> Option<String> {
        self.calls().into_iter().rev().find_map(|c| match c {
            RenderCall::Start { color, .. } => Some(color),
            RenderCall::End => None,
        })
    }

    /// Simulate the signal running its course.
    pub fn finish(&self) {
        self.showing.store(false, Ordering::SeqCst);
    }

    /// Every `render_frame` while showing reports this duration.
    pub fn set_frame_time(&self, duration: Duration) {
        *self.frame_time.lock().unwrap() = Some(duration);
    }
}

impl Renderer for RecordingRenderer {
    fn start_signal(&mut self, style: SignalStyle, color: &str) {
        self.showing.store(true, Ordering::SeqCst);
        self.calls.lock().unwrap().push(RenderCall::Start {
            style,
            color: color.to_string(),
        });
    }

    fn end_signal(&mut self) {
        self.showing.store(false, Ordering::SeqCst);
        self.calls.lock().unwrap().push(RenderCall::End);
    }

    fn is_idle(&self) -> bool {
        !self.showing.load(Ordering::SeqCst)
    }

    fn render_frame(&mut self) -> Option<Duration> {
        if self.is_idle() {
            return None;
        }
        *self.frame_time.lock().unwrap()
    }
}

/// Alert presenter that records alerts and answers missing-file prompts from
/// a script (defaulting to `Cancel` once the script runs out).
#[derive(Debug, Clone, Default)]
pub struct RecordingAlerts {
    alerts: Arc<Mutex<Vec<(String, String)>>>,
    prompts: Arc<Mutex<Vec<(String, PathBuf)>>>,
    answers: Arc<Mutex<VecDeque<MissingFileChoice>>>,
}

impl RecordingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_with(&self, choice: MissingFileChoice) {
        self.answers.lock().unwrap().push_back(choice);
    }

    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn titles(&self) -> Vec<String> {
        self.alerts().into_iter().map(|(title, _)| title).collect()
    }

    pub fn prompts(&self) -> Vec<(String, PathBuf)> {
        self.prompts.lock().unwrap().clone()
    }
}

impl AlertPresenter for RecordingAlerts {
    fn present_alert(&mut self, title: &str, message: &str) {
        self.alerts
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }

    fn missing_file_prompt(&mut self, rule_name: &str, missing_path: &Path) -> MissingFileChoice {
        self.prompts
            .lock()
            .unwrap()
            .push((rule_name.to_string(), missing_path.to_path_buf()));
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MissingFileChoice::Cancel)
    }
}
