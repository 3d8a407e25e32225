// tests/signal.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;

use logbeacon::clock::{Clock, ManualClock};
use logbeacon::signal::headless::intensity;
use logbeacon::signal::{
    Cadence, Decision, GovernorSettings, HeadlessRenderer, PerformanceGovernor, Renderer,
    SignalArbiter, SignalState, DEFAULT_DEBOUNCE,
};
use logbeacon::types::{RuleSnapshot, SignalStyle};
use logbeacon_test_utils::builders::RuleBuilder;
use logbeacon_test_utils::fakes::{RecordingRenderer, RenderCall};

fn rule(id: &str, priority: usize, color: &str) -> RuleSnapshot {
    RuleBuilder::new(id, "ERROR", &format!("/logs/{id}.log"))
        .color(color)
        .snapshot(priority)
}

#[test]
fn first_match_triggers_and_repeat_inside_window_is_debounced() {
    let mut arbiter = SignalArbiter::default();
    let mut renderer = RecordingRenderer::new();
    let app = rule("app", 0, "#ff0000");
    let t0 = Instant::now();

    assert_eq!(arbiter.on_match(&app, t0, &mut renderer), Decision::Triggered);
    assert_eq!(
        arbiter.on_match(&app, t0 + Duration::from_millis(50), &mut renderer),
        Decision::Debounced
    );
    assert_eq!(renderer.starts(), 1);

    assert_eq!(
        arbiter.on_match(&app, t0 + DEFAULT_DEBOUNCE, &mut renderer),
        Decision::Refreshed
    );
    assert_eq!(renderer.starts(), 2);
}

#[test]
fn debounce_is_per_rule() {
    let mut arbiter = SignalArbiter::new(Duration::from_millis(100));
    let mut renderer = RecordingRenderer::new();
    let high = rule("high", 0, "#ff0000");
    let low = rule("low", 1, "#00ff00");
    let t0 = Instant::now();

    arbiter.on_match(&low, t0, &mut renderer);
    assert_eq!(arbiter.on_match(&high, t0, &mut renderer), Decision::Preempted);
}

#[test]
fn highest_priority_wins_regardless_of_order() {
    let high = rule("high", 0, "#ff0000");
    let low = rule("low", 1, "#00ff00");
    let t0 = Instant::now();

    for order in [[&high, &low], [&low, &high]] {
        let mut arbiter = SignalArbiter::default();
        let mut renderer = RecordingRenderer::new();
        for r in order {
            arbiter.on_match(r, t0, &mut renderer);
        }
        assert_eq!(arbiter.active().map(|a| a.rule_id.as_str()), Some("high"));
        assert_eq!(renderer.last_color().as_deref(), Some("#ff0000"));
    }
}

#[test]
fn equal_priority_keeps_the_current_holder() {
    let mut arbiter = SignalArbiter::default();
    let mut renderer = RecordingRenderer::new();
    let a = rule("a", 2, "#111111");
    let b = rule("b", 2, "#222222");
    let t0 = Instant::now();

    arbiter.on_match(&a, t0, &mut renderer);
    assert_eq!(arbiter.on_match(&b, t0, &mut renderer), Decision::Outranked);
    assert_eq!(arbiter.active().map(|x| x.rule_id.as_str()), Some("a"));
}

#[test]
fn idle_renderer_frees_the_signal_for_any_rule() {
    let mut arbiter = SignalArbiter::default();
    let mut renderer = RecordingRenderer::new();
    let high = rule("high", 0, "#ff0000");
    let low = rule("low", 5, "#00ff00");
    let t0 = Instant::now();

    arbiter.on_match(&high, t0, &mut renderer);
    renderer.finish();
    assert_eq!(arbiter.on_match(&low, t0, &mut renderer), Decision::Triggered);
    assert_eq!(arbiter.active().map(|a| a.rule_id.as_str()), Some("low"));
}

#[test]
fn clearing_the_holder_ends_the_signal() {
    let mut arbiter = SignalArbiter::default();
    let mut renderer = RecordingRenderer::new();
    let app = rule("app", 0, "#ff0000");
    let t0 = Instant::now();

    arbiter.on_match(&app, t0, &mut renderer);
    assert!(!arbiter.clear_rule("other", &mut renderer));
    assert!(arbiter.clear_rule("app", &mut renderer));
    assert!(arbiter.active().is_none());
    assert_eq!(renderer.calls().last(), Some(&RenderCall::End));

    // Debounce state went with it.
    assert_eq!(arbiter.on_match(&app, t0, &mut renderer), Decision::Triggered);
}

#[test]
fn reprioritized_holder_can_be_preempted() {
    let mut arbiter = SignalArbiter::default();
    let mut renderer = RecordingRenderer::new();
    let a = rule("a", 0, "#111111");
    let t0 = Instant::now();

    arbiter.on_match(&a, t0, &mut renderer);
    arbiter.reprioritize(&HashMap::from([("a".to_string(), 1), ("b".to_string(), 0)]));
    assert_eq!(arbiter.active().map(|x| x.priority), Some(1));

    let b = rule("b", 0, "#222222");
    assert_eq!(arbiter.on_match(&b, t0, &mut renderer), Decision::Preempted);
}

#[test]
fn governor_falls_back_after_consecutive_violations() {
    let mut governor = PerformanceGovernor::new(GovernorSettings::default());

    for _ in 0..4 {
        assert_eq!(governor.record_frame(true), None);
    }
    // A healthy frame breaks the streak.
    assert_eq!(governor.record_frame(false), None);
    for _ in 0..4 {
        assert_eq!(governor.record_frame(true), None);
    }
    assert_eq!(governor.record_frame(true), Some(Cadence::Reduced));
    assert_eq!(governor.interval(), Duration::from_secs(1) / 30);
}

#[test]
fn governor_recovers_after_healthy_frames() {
    let settings = GovernorSettings::default();
    let mut governor = PerformanceGovernor::new(settings);
    for _ in 0..settings.fallback_violation_threshold {
        governor.record_frame(true);
    }
    assert_eq!(governor.cadence(), Cadence::Reduced);

    for _ in 1..settings.recovery_frame_threshold {
        assert_eq!(governor.record_frame(false), None);
    }
    assert_eq!(governor.record_frame(false), Some(Cadence::Normal));
    assert_eq!(governor.interval(), Duration::from_secs(1) / 60);
}

#[test]
fn render_duration_is_judged_against_current_interval() {
    let mut governor = PerformanceGovernor::new(GovernorSettings::from_frame_rates(100, 50));
    for _ in 0..5 {
        governor.record_render_duration(Duration::from_millis(15));
    }
    assert_eq!(governor.cadence(), Cadence::Reduced);

    // 15ms fits the reduced 20ms budget, so it counts as healthy now.
    for _ in 0..30 {
        governor.record_render_duration(Duration::from_millis(15));
    }
    assert_eq!(governor.cadence(), Cadence::Normal);

    governor.record_frame(true);
    governor.reset();
    assert_eq!(governor.cadence(), Cadence::Normal);
}

proptest! {
    /// Cadence only changes on the exact frame a threshold is reached.
    #[test]
    fn governor_transitions_match_streaks(frames in proptest::collection::vec(any::<bool>(), 0..300)) {
        let settings = GovernorSettings::default();
        let mut governor = PerformanceGovernor::new(settings);
        let mut late = 0u32;
        let mut healthy = 0u32;
        let mut cadence = Cadence::Normal;

        for exceeded in frames {
            let change = governor.record_frame(exceeded);
            let expected = if exceeded {
                healthy = 0;
                late += 1;
                if cadence == Cadence::Normal && late >= settings.fallback_violation_threshold {
                    late = 0;
                    cadence = Cadence::Reduced;
                    Some(Cadence::Reduced)
                } else {
                    None
                }
            } else {
                late = 0;
                healthy += 1;
                if cadence == Cadence::Reduced && healthy >= settings.recovery_frame_threshold {
                    healthy = 0;
                    cadence = Cadence::Normal;
                    Some(Cadence::Normal)
                } else {
                    if cadence == Cadence::Normal {
                        healthy = healthy.min(settings.recovery_frame_threshold);
                    }
                    None
                }
            };
            prop_assert_eq!(change, expected);
            prop_assert_eq!(governor.cadence(), cadence);
        }
    }
}

#[test]
fn headless_signal_goes_idle_after_hold() {
    let clock = ManualClock::new();
    let mut renderer =
        HeadlessRenderer::new(Arc::new(clock.clone()), Duration::from_millis(500)).quiet();
    assert!(renderer.is_idle());

    renderer.start_signal(SignalStyle::Blink, "#ff0000");
    assert!(!renderer.is_idle());
    assert!(renderer.render_frame().is_some());
    assert_eq!(renderer.frames_rendered(), 1);

    clock.advance(Duration::from_millis(500));
    assert!(renderer.is_idle());
    assert!(renderer.render_frame().is_none());
    assert_eq!(renderer.state(), &SignalState::Idle);
}

#[test]
fn restarting_a_signal_resets_its_hold() {
    let clock = ManualClock::new();
    let mut renderer =
        HeadlessRenderer::new(Arc::new(clock.clone()), Duration::from_millis(500)).quiet();

    renderer.start_signal(SignalStyle::Solid, "#ff0000");
    clock.advance(Duration::from_millis(400));
    renderer.start_signal(SignalStyle::Solid, "#00ff00");
    clock.advance(Duration::from_millis(400));
    assert!(!renderer.is_idle());

    match renderer.state() {
        SignalState::Active { color, since, .. } => {
            assert_eq!(color, "#00ff00");
            assert!(clock.now() > *since);
        }
        SignalState::Idle => panic!("signal should still be showing"),
    }
}

#[test]
fn intensity_follows_style() {
    assert_eq!(intensity(SignalStyle::Solid, Duration::from_millis(730)), 1.0);
    assert_eq!(intensity(SignalStyle::Blink, Duration::from_millis(100)), 1.0);
    assert_eq!(intensity(SignalStyle::Blink, Duration::from_millis(600)), 0.0);
    assert!(intensity(SignalStyle::Pulse, Duration::ZERO) < 0.01);
    assert!(intensity(SignalStyle::Pulse, Duration::from_millis(500)) > 0.99);
}
