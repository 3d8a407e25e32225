// src/signal/governor.rs

use std::time::Duration;

use tracing::{info, trace};

/// Frame cadence advised to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Normal,
    Reduced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernorSettings {
    pub normal_interval: Duration,
    pub reduced_interval: Duration,
    /// Consecutive late frames before dropping to `Reduced`.
    pub fallback_violation_threshold: u32,
    /// Consecutive healthy frames in `Reduced` before returning to `Normal`.
    pub recovery_frame_threshold: u32,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            normal_interval: Duration::from_secs(1) / 60,
            reduced_interval: Duration::from_secs(1) / 30,
            fallback_violation_threshold: 5,
            recovery_frame_threshold: 30,
        }
    }
}

impl GovernorSettings {
    pub fn from_frame_rates(normal_fps: u32, reduced_fps: u32) -> Self {
        Self {
            normal_interval: Duration::from_secs(1) / normal_fps.max(1),
            reduced_interval: Duration::from_secs(1) / reduced_fps.max(1),
            ..Self::default()
        }
    }
}

/// Tracks frame-budget compliance and switches cadence with hysteresis.
///
/// The governor never stops the signal; it only changes the interval it
/// advises for the next frames.
#[derive(Debug)]
pub struct PerformanceGovernor {
    settings: GovernorSettings,
    cadence: Cadence,
    violations: u32,
    healthy: u32,
}

impl Default for PerformanceGovernor {
    fn default() -> Self {
        Self::new(GovernorSettings::default())
    }
}

impl PerformanceGovernor {
    pub fn new(settings: GovernorSettings) -> Self {
        Self {
            settings,
            cadence: Cadence::Normal,
            violations: 0,
            healthy: 0,
        }
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn settings(&self) -> &GovernorSettings {
        &self.settings
    }

    /// Interval to use for the next frame.
    pub fn interval(&self) -> Duration {
        match self.cadence {
            Cadence::Normal => self.settings.normal_interval,
            Cadence::Reduced => self.settings.reduced_interval,
        }
    }

    /// Feed one frame. Returns the new cadence when this frame caused a
    /// transition.
    pub fn record_frame(&mut self, exceeded_budget: bool) -> Option<Cadence> {
        if exceeded_budget {
            self.violations = self.violations.saturating_add(1);
            self.healthy = 0;
            trace!(violations = self.violations, "frame over budget");

            if self.cadence == Cadence::Normal
                && self.violations >= self.settings.fallback_violation_threshold
            {
                self.cadence = Cadence::Reduced;
                self.violations = 0;
                info!(
                    interval = ?self.settings.reduced_interval,
                    "render budget repeatedly exceeded; reducing signal cadence"
                );
                return Some(Cadence::Reduced);
            }
            return None;
        }

        self.violations = 0;
        match self.cadence {
            Cadence::Normal => {
                self.healthy = (self.healthy + 1).min(self.settings.recovery_frame_threshold);
                None
            }
            Cadence::Reduced => {
                self.healthy = self.healthy.saturating_add(1);
                if self.healthy >= self.settings.recovery_frame_threshold {
                    self.cadence = Cadence::Normal;
                    self.healthy = 0;
                    info!(
                        interval = ?self.settings.normal_interval,
                        "render timings recovered; restoring normal signal cadence"
                    );
                    return Some(Cadence::Normal);
                }
                None
            }
        }
    }

    /// Feed a measured frame duration, judged against the current interval.
    pub fn record_render_duration(&mut self, duration: Duration) -> Option<Cadence> {
        let exceeded = duration > self.interval();
        self.record_frame(exceeded)
    }

    /// Back to `Normal` with all counters cleared. Called when a signal
    /// sequence starts fresh.
    pub fn reset(&mut self) {
        self.cadence = Cadence::Normal;
        self.violations = 0;
        self.healthy = 0;
    }
}
