// src/signal/headless.rs

//! Terminal stand-in for the status indicator.
//!
//! Prints a line when a signal starts or ends and "renders" frames by
//! computing the indicator intensity for the current animation phase. Each
//! frame is timed and reported back so the governor sees real host load.

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::clock::Clock;
use crate::signal::{Renderer, SignalState};
use crate::types::SignalStyle;

/// Period of one pulse/blink cycle.
const CYCLE: Duration = Duration::from_millis(1000);

#[derive(Debug)]
pub struct HeadlessRenderer {
    clock: Arc<dyn Clock>,
    state: SignalState,
    /// How long a signal stays up before going idle on its own.
    hold: Duration,
    frames: u64,
    quiet: bool,
}

impl HeadlessRenderer {
    pub fn new(clock: Arc<dyn Clock>, hold: Duration) -> Self {
        Self {
            clock,
            state: SignalState::Idle,
            hold,
            frames: 0,
            quiet: false,
        }
    }

    /// Suppress stdout output.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn state(&self) -> &SignalState {
        &self.state
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    fn expired(&self) -> bool {
        match &self.state {
            SignalState::Idle => true,
            SignalState::Active { since, .. } => {
                self.clock.now().saturating_duration_since(*since) >= self.hold
            }
        }
    }
}

/// Indicator intensity in `0.0..=1.0` for a style at a point in its cycle.
pub fn intensity(style: SignalStyle, elapsed: Duration) -> f32 {
    let phase = (elapsed.as_millis() % CYCLE.as_millis()) as f32 / CYCLE.as_millis() as f32;
    match style {
        SignalStyle::Solid => 1.0,
        SignalStyle::Blink => {
            if phase < 0.5 {
                1.0
            } else {
                0.0
            }
        }
        SignalStyle::Pulse => 0.5 - 0.5 * (phase * std::f32::consts::TAU).cos(),
    }
}

impl Renderer for HeadlessRenderer {
    fn start_signal(&mut self, style: SignalStyle, color: &str) {
        if !self.quiet {
            println!("[logbeacon] signal on  ({style}, {color})");
        }
        self.state = SignalState::Active {
            style,
            color: color.to_string(),
            since: self.clock.now(),
        };
    }

    fn end_signal(&mut self) {
        if !self.state.is_idle() && !self.quiet {
            println!("[logbeacon] signal off");
        }
        self.state = SignalState::Idle;
    }

    fn is_idle(&self) -> bool {
        self.expired()
    }

    fn render_frame(&mut self) -> Option<Duration> {
        if self.expired() {
            self.end_signal();
            return None;
        }

        let started = self.clock.now();
        let SignalState::Active { style, since, .. } = &self.state else {
            return None;
        };
        let level = intensity(*style, started.saturating_duration_since(*since));
        self.frames += 1;
        trace!(frame = self.frames, level, "rendered signal frame");

        Some(self.clock.now().saturating_duration_since(started))
    }
}
