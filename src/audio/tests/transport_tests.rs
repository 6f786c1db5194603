use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::audio::engine::PlayerEvent;
use crate::error::{DecodeError, PlayerError};
use crate::models::PlaybackState;

#[test]
fn test_malformed_file_leaves_engine_stopped() {
    let mut engine = engine_with(EngineSettings::default(), &[malformed(), tone(3.0)]);

    let err = engine.play(0, 0.0).unwrap_err();
    assert!(matches!(err, PlayerError::Decode(DecodeError::UnsupportedFormat { .. })));

    assert!(!engine.is_playing());
    assert_eq!(engine.session().len(), 0);
    assert_eq!(engine.graph().unwrap().active_source_count(), 0);

    let snap = engine.snapshot();
    assert_eq!(snap.state, PlaybackState::Stopped);
    assert_eq!(snap.status_message.as_deref(), Some("Error loading Track 1"));
    assert!(!snap.indicator_active);
    assert_eq!(engine.logger().get_event_statistics().decode_errors, 1);
}

#[test]
fn test_malformed_file_replaces_playing_track() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(3.0), malformed()]);
    engine.play(0, 0.0).unwrap();
    run_for(&mut engine, 0.5);

    assert!(engine.play(1, 0.0).is_err());
    assert!(!engine.is_playing());
    assert_eq!(engine.graph().unwrap().active_source_count(), 0);
}

#[test]
fn test_pause_resume_round_trip() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(10.0)]);
    engine.play(0, 0.0).unwrap();
    run_for(&mut engine, 3.37);

    let paused_at = engine.pause().unwrap();
    assert!((paused_at - 3.37).abs() < 1e-6);
    assert_eq!(engine.session().len(), 0);

    // Time passing while paused does not move the position.
    engine.pump_output(Duration::from_secs(2));
    engine.tick().unwrap();
    assert!((engine.snapshot().elapsed - paused_at).abs() < 1e-6);

    engine.resume().unwrap();
    assert!((engine.snapshot().elapsed - paused_at).abs() < 1e-6);

    run_for(&mut engine, 0.5);
    assert!((engine.snapshot().elapsed - (paused_at + 0.5)).abs() < 1e-6);
}

#[test]
fn test_resume_while_playing_is_noop() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(5.0)]);
    engine.play(0, 0.0).unwrap();
    run_for(&mut engine, 1.0);
    let source = engine.session().primary().unwrap().id;

    engine.resume().unwrap();
    assert_eq!(engine.session().primary().unwrap().id, source);
}

#[test]
fn test_stop_rewinds() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(5.0)]);
    engine.play(0, 0.0).unwrap();
    run_for(&mut engine, 2.0);
    engine.pause();

    engine.stop_and_rewind();
    assert_eq!(engine.snapshot().state, PlaybackState::Stopped);
    engine.resume().unwrap();
    assert!(engine.snapshot().elapsed < 1e-6);
}

#[test]
fn test_random_transport_sequences_keep_at_most_one_source() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let mut engine = engine_with(
        EngineSettings::default(),
        &[tone(1.5), tone(2.0), tone(0.5), tone(3.0)],
    );

    for _ in 0..400 {
        let result = match rng.gen_range(0..8) {
            0 => engine.play(rng.gen_range(0..4), rng.gen_range(0.0..3.0)),
            1 => {
                engine.pause();
                Ok(())
            }
            2 => engine.resume(),
            3 => {
                engine.stop();
                Ok(())
            }
            4 => engine.seek(rng.gen_range(0.0..2.0)),
            5 => engine.next_track(false),
            6 => engine.prev_track(),
            _ => {
                run_for(&mut engine, rng.gen_range(0.0..1.0));
                Ok(())
            }
        };
        assert!(result.is_ok());

        let sources = engine.session().len();
        let graph_sources = engine.graph().map_or(0, |graph| graph.active_source_count());
        assert!(sources <= 1, "{} sources active", sources);
        assert!(graph_sources <= sources);
        if engine.is_playing() {
            assert_eq!(sources, 1);
        } else {
            assert_eq!(sources, 0);
            assert_eq!(graph_sources, 0);
        }
    }
}

#[test]
fn test_end_of_playlist_without_repeat() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(1.0), tone(1.0), tone(1.0)]);
    let mut rx = engine.subscribe();
    engine.play(2, 0.0).unwrap();

    engine.next_track(false).unwrap();
    assert!(!engine.is_playing());
    assert_eq!(engine.session().len(), 0);
    assert_eq!(engine.sequencer().current(), Some(2));

    let mut ended = false;
    while let Ok(event) = rx.try_recv() {
        ended |= event == PlayerEvent::PlaylistEnded;
    }
    assert!(ended);
}

#[test]
fn test_end_of_playlist_with_repeat_wraps() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(1.0), tone(1.0), tone(1.0)]);
    engine.set_repeat(true);
    engine.play(2, 0.0).unwrap();

    engine.next_track(false).unwrap();
    assert!(engine.is_playing());
    assert_eq!(engine.sequencer().current(), Some(0));
}

#[test]
fn test_natural_end_of_last_track_stops() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(1.0), tone(1.0)]);
    engine.play(0, 0.0).unwrap();

    run_for(&mut engine, 1.0);
    assert_eq!(engine.sequencer().current(), Some(1));
    assert!(engine.is_playing());

    run_for(&mut engine, 1.0);
    assert!(!engine.is_playing());
    assert_eq!(engine.sequencer().current(), Some(1));
    assert_eq!(engine.snapshot().state, PlaybackState::Stopped);
}

#[test]
fn test_shuffle_never_repeats_current() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(5.0), tone(5.0), tone(5.0)]);
    assert!(engine.toggle_shuffle());
    engine.play(0, 0.0).unwrap();

    for _ in 0..50 {
        let before = engine.sequencer().current();
        engine.next_track(false).unwrap();
        assert_ne!(engine.sequencer().current(), before);
        assert!(engine.is_playing());
    }
}

#[test]
fn test_shuffle_with_single_track_terminates() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(5.0)]);
    engine.toggle_shuffle();
    engine.play(0, 0.0).unwrap();

    engine.next_track(false).unwrap();
    assert_eq!(engine.sequencer().current(), Some(0));
    assert!(engine.is_playing());
}

#[test]
fn test_prev_always_hard_cuts() {
    let mut engine = engine_with(crossfade_settings(2.0), &[tone(5.0), tone(5.0)]);
    engine.play(1, 0.0).unwrap();
    engine.prev_track().unwrap();
    assert_eq!(engine.session().len(), 1);
    assert!(!engine.session().crossfade_in_progress);
    assert_eq!(engine.sequencer().current(), Some(0));

    engine.prev_track().unwrap();
    assert_eq!(engine.sequencer().current(), Some(1));
}

#[test]
fn test_manual_next_never_crossfades() {
    let mut engine = engine_with(crossfade_settings(4.0), &[tone(10.0), tone(10.0)]);
    engine.play(0, 0.0).unwrap();
    run_for(&mut engine, 2.0);

    engine.next_track(false).unwrap();
    assert_eq!(engine.session().len(), 1);
    assert!(!engine.session().crossfade_in_progress);
}

#[test]
fn test_stale_end_notice_after_stop_is_ignored() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(1.0), tone(1.0)]);
    engine.play(0, 0.0).unwrap();

    // The source ends on the audio thread, but the controller stops first.
    engine.pump_output(Duration::from_millis(1100));
    engine.stop();
    engine.tick().unwrap();

    assert!(!engine.is_playing());
    assert_eq!(engine.sequencer().current(), Some(0));
}

#[test]
fn test_stale_end_notice_after_replay_is_ignored() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(1.0), tone(4.0)]);
    engine.play(0, 0.0).unwrap();
    engine.pump_output(Duration::from_millis(1100));

    // A new source is playing before the old end notice is drained.
    engine.play(1, 0.0).unwrap();
    engine.tick().unwrap();
    assert!(engine.is_playing());
    assert_eq!(engine.sequencer().current(), Some(1));
}

#[test]
fn test_seek_to_fraction_when_paused() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(8.0)]);
    engine.play(0, 0.0).unwrap();
    run_for(&mut engine, 1.0);
    engine.pause();

    engine.seek_to_fraction(0.75).unwrap();
    assert!(!engine.is_playing());
    assert!((engine.snapshot().elapsed - 6.0).abs() < 1e-3);
    assert!((engine.snapshot().progress() - 0.75).abs() < 1e-3);
}

#[test]
fn test_progress_is_clamped() {
    let mut engine = engine_with(EngineSettings::default(), &[tone(2.0)]);
    engine.play(0, 1.0).unwrap();
    let snap = engine.snapshot();
    assert!((snap.progress() - 0.5).abs() < 1e-6);
    assert_eq!(snap.duration_formatted(), "0:02");
}
