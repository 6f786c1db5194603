use super::*;
use crate::audio::engine::PlayerEvent;
use crate::audio::fade::FadeCurve;
use crate::error::{DecodeError, PlayerError};
use crate::models::PlaybackState;

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn test_crossfade_begins_when_remaining_reaches_duration() {
    let mut engine = engine_with(crossfade_settings(5.0), &[tone(10.0), tone(20.0), tone(20.0)]);
    engine.play(0, 0.0).unwrap();

    run_until(&mut engine, 4.99);
    assert!(!engine.session().crossfade_in_progress);
    assert_eq!(engine.session().len(), 1);

    run_until(&mut engine, 5.0);
    assert!(engine.session().crossfade_in_progress);
    assert_eq!(engine.session().len(), 2);
    assert_eq!(engine.sequencer().current(), Some(1));

    // Progress now follows the incoming track.
    let snap = engine.snapshot();
    assert_eq!(snap.track_label, "Track 2");
    assert!(snap.elapsed < 0.05);
    assert!(snap.crossfading);
}

#[test]
fn test_outgoing_source_released_after_fade() {
    let mut engine = engine_with(crossfade_settings(5.0), &[tone(10.0), tone(20.0), tone(20.0)]);
    let mut rx = engine.subscribe();
    engine.play(0, 0.0).unwrap();

    run_until(&mut engine, 9.9);
    assert_eq!(engine.session().len(), 2);
    assert_eq!(engine.graph().unwrap().active_source_count(), 2);

    run_until(&mut engine, 10.1);
    assert_eq!(engine.session().len(), 1);
    assert_eq!(engine.graph().unwrap().active_source_count(), 1);
    assert!(!engine.session().crossfade_in_progress);
    assert!(engine.is_playing());
    assert_eq!(engine.snapshot().track_label, "Track 2");

    let events = drain(&mut rx);
    assert!(events.contains(&PlayerEvent::CrossfadeStarted { to: 1, duration: 5.0 }));
    assert!(events.contains(&PlayerEvent::CrossfadeFinished));
    assert_eq!(engine.logger().get_event_statistics().crossfades, 1);
}

#[test]
fn test_equal_power_gains_during_window() {
    let mut engine = engine_with(crossfade_settings(4.0), &[tone(10.0), tone(10.0)]);
    engine.play(0, 0.0).unwrap();
    run_until(&mut engine, 6.0);

    // Fade started at 6.0; sample the midpoint.
    run_until(&mut engine, 8.0);
    let graph = engine.graph().unwrap().clone();
    let ids: Vec<_> = engine.session().sources.iter().map(|s| s.id).collect();
    assert_eq!(ids.len(), 2);

    let out = graph.gain_of(ids[0]).unwrap();
    let inc = graph.gain_of(ids[1]).unwrap();
    assert!((out - inc).abs() < 0.01);
    assert!((out * out + inc * inc - 1.0).abs() < 1e-3);
}

#[test]
fn test_linear_gains_during_window() {
    let settings = EngineSettings {
        crossfade_seconds: 4.0,
        fade_curve: FadeCurve::Linear,
        ..EngineSettings::default()
    };
    let mut engine = engine_with(settings, &[tone(10.0), tone(10.0)]);
    engine.play(0, 0.0).unwrap();
    run_until(&mut engine, 8.0);

    let graph = engine.graph().unwrap().clone();
    let ids: Vec<_> = engine.session().sources.iter().map(|s| s.id).collect();
    let out = graph.gain_of(ids[0]).unwrap();
    let inc = graph.gain_of(ids[1]).unwrap();
    assert!((out + inc - 1.0).abs() < 1e-3);
    assert!((out - 0.5).abs() < 0.01);
}

#[test]
fn test_zero_crossfade_is_hard_transition() {
    let mut engine = engine_with(crossfade_settings(0.0), &[tone(2.0), tone(3.0), tone(3.0)]);
    let mut rx = engine.subscribe();
    engine.play(0, 0.0).unwrap();

    let mut max_sources = 0;
    for _ in 0..200 {
        engine.pump_output(TICK);
        engine.tick().unwrap();
        max_sources = max_sources.max(engine.graph().unwrap().active_source_count());
        max_sources = max_sources.max(engine.session().len());
    }

    assert_eq!(max_sources, 1);
    assert_eq!(engine.sequencer().current(), Some(1));
    assert!(engine.is_playing());
    assert!(engine.snapshot().elapsed < 0.02);
    assert!(!drain(&mut rx)
        .iter()
        .any(|event| matches!(event, PlayerEvent::CrossfadeStarted { .. })));
}

#[test]
fn test_guard_delays_crossfade_out_of_short_track() {
    let mut engine = engine_with(crossfade_settings(5.0), &[tone(3.0), tone(10.0)]);
    engine.play(0, 0.0).unwrap();

    run_until(&mut engine, 1.0);
    assert!(!engine.session().crossfade_in_progress);

    run_until(&mut engine, 1.02);
    assert!(engine.session().crossfade_in_progress);
    assert_eq!(engine.sequencer().current(), Some(1));
}

#[test]
fn test_no_crossfade_with_single_track() {
    let mut engine = engine_with(crossfade_settings(2.0), &[tone(4.0)]);
    engine.set_repeat(true);
    engine.play(0, 0.0).unwrap();

    run_until(&mut engine, 3.5);
    assert!(!engine.session().crossfade_in_progress);
    assert_eq!(engine.session().len(), 1);

    // Natural end wraps around with a hard restart.
    run_until(&mut engine, 4.05);
    assert!(engine.is_playing());
    assert_eq!(engine.sequencer().current(), Some(0));
    assert!(engine.snapshot().elapsed < 0.1);
}

#[test]
fn test_no_crossfade_past_last_track() {
    let mut engine = engine_with(crossfade_settings(3.0), &[tone(5.0), tone(5.0)]);
    engine.play(1, 0.0).unwrap();

    run_until(&mut engine, 4.0);
    assert!(!engine.session().crossfade_in_progress);

    run_until(&mut engine, 5.05);
    assert!(!engine.is_playing());
    assert_eq!(engine.session().len(), 0);
    assert_eq!(engine.sequencer().current(), Some(1));
}

#[test]
fn test_failed_crossfade_falls_back_to_hard_play() {
    let mut engine = engine_with(crossfade_settings(2.0), &[tone(4.0), malformed(), tone(4.0)]);
    let mut rx = engine.subscribe();
    engine.play(0, 0.0).unwrap();
    run_until(&mut engine, 1.99);

    // The trigger fires on the next tick; the target cannot be decoded.
    engine.pump_output(TICK);
    let err = engine.tick().unwrap_err();
    assert!(matches!(
        err,
        PlayerError::Decode(DecodeError::UnsupportedFormat { .. })
    ));

    assert!(!engine.is_playing());
    assert!(!engine.session().crossfade_in_progress);
    assert_eq!(engine.session().len(), 0);
    assert_eq!(engine.graph().unwrap().active_source_count(), 0);
    assert_eq!(engine.sequencer().current(), Some(1));

    let events = drain(&mut rx);
    assert!(events.contains(&PlayerEvent::Status("Transition failed".to_string())));
    assert_eq!(engine.snapshot().status_message.as_deref(), Some("Error loading Track 2"));

    let stats = engine.logger().get_event_statistics();
    assert_eq!(stats.transition_failures, 1);
    assert_eq!(stats.decode_errors, 1);

    // Skipping past the bad track recovers.
    engine.next_track(false).unwrap();
    assert!(engine.is_playing());
    assert_eq!(engine.sequencer().current(), Some(2));
}

#[test]
fn test_stop_during_crossfade_cancels_retirement() {
    let mut engine = engine_with(crossfade_settings(3.0), &[tone(6.0), tone(6.0)]);
    engine.play(0, 0.0).unwrap();
    run_until(&mut engine, 4.0);
    assert_eq!(engine.session().len(), 2);

    engine.stop();
    assert_eq!(engine.session().len(), 0);
    assert_eq!(engine.graph().unwrap().active_source_count(), 0);

    // Nothing scheduled for the released sources may bring playback back.
    run_for(&mut engine, 4.0);
    assert!(!engine.is_playing());
    assert_eq!(engine.session().len(), 0);
    assert_eq!(engine.snapshot().state, PlaybackState::Stopped);
}

#[test]
fn test_manual_skip_during_crossfade() {
    let mut engine = engine_with(crossfade_settings(3.0), &[tone(6.0), tone(6.0), tone(6.0)]);
    engine.play(0, 0.0).unwrap();
    run_until(&mut engine, 4.0);
    assert!(engine.session().crossfade_in_progress);

    engine.next_track(false).unwrap();
    assert_eq!(engine.session().len(), 1);
    assert!(!engine.session().crossfade_in_progress);
    assert_eq!(engine.sequencer().current(), Some(2));

    // The cancelled retirement never touches the new source.
    run_until(&mut engine, 6.5);
    assert!(engine.is_playing());
    assert_eq!(engine.session().len(), 1);
    assert_eq!(engine.sequencer().current(), Some(2));
}

#[test]
fn test_pause_during_crossfade_resumes_incoming_track() {
    let mut engine = engine_with(crossfade_settings(3.0), &[tone(6.0), tone(10.0)]);
    engine.play(0, 0.0).unwrap();
    run_until(&mut engine, 4.0);

    let at = engine.pause().unwrap();
    assert!((at - 1.0).abs() < 0.02);
    assert_eq!(engine.session().len(), 0);

    engine.resume().unwrap();
    assert_eq!(engine.session().len(), 1);
    assert_eq!(engine.sequencer().current(), Some(1));
    assert!((engine.snapshot().elapsed - at).abs() < 1e-6);
}

#[test]
fn test_incoming_shorter_than_fade_advances_after_retirement() {
    let mut engine = engine_with(crossfade_settings(5.0), &[tone(10.0), tone(2.0), tone(10.0)]);
    engine.play(0, 0.0).unwrap();

    run_until(&mut engine, 7.5);
    // Track 2 is over but the fade out of track 1 is still running.
    assert!(engine.session().crossfade_in_progress);
    assert_eq!(engine.sequencer().current(), Some(1));

    run_until(&mut engine, 10.1);
    assert!(engine.is_playing());
    assert!(!engine.session().crossfade_in_progress);
    assert_eq!(engine.session().len(), 1);
    assert_eq!(engine.sequencer().current(), Some(2));
}

#[test]
fn test_volume_change_applies_during_crossfade() {
    let mut engine = engine_with(crossfade_settings(3.0), &[tone(6.0), tone(6.0)]);
    engine.play(0, 0.0).unwrap();
    run_until(&mut engine, 4.0);

    engine.set_volume(0.1);
    assert!((engine.graph().unwrap().master_gain() - 0.1).abs() < 1e-6);
    assert_eq!(engine.session().len(), 2);
}
