// src/signal/mod.rs

//! The single visual signal.
//!
//! - [`arbiter`] decides which matching rule gets to drive the signal, under
//!   priority and per-rule debounce.
//! - [`governor`] watches render timings and advises a normal or reduced frame
//!   cadence, with hysteresis.
//! - [`headless`] is a terminal renderer used by the `logbeacon` binary.
//!
//! Rendering itself is an external concern reached through [`Renderer`].

pub mod arbiter;
pub mod governor;
pub mod headless;

use std::time::{Duration, Instant};

use crate::types::SignalStyle;

pub use arbiter::{ActiveSignal, Decision, SignalArbiter, DEFAULT_DEBOUNCE};
pub use governor::{Cadence, GovernorSettings, PerformanceGovernor};
pub use headless::HeadlessRenderer;

/// What the renderer is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalState {
    Idle,
    Active {
        style: SignalStyle,
        color: String,
        since: Instant,
    },
}

impl SignalState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SignalState::Idle)
    }
}

/// Rendering collaborator.
///
/// All calls arrive from the coordinating context, one at a time.
pub trait Renderer: Send {
    /// Start (or restart) the signal with the given presentation.
    fn start_signal(&mut self, style: SignalStyle, color: &str);

    fn end_signal(&mut self);

    /// True when no signal is showing, including when a signal ran its course
    /// on its own.
    fn is_idle(&self) -> bool;

    /// Draw one frame if a signal is showing and report how long it took.
    /// Renderers that time their own frames can leave this as `None` and feed
    /// durations back through the runtime instead.
    fn render_frame(&mut self) -> Option<Duration> {
        None
    }
}
