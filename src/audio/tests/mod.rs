//! Scenario suites for the playback engine.
//!
//! The engine runs against an [`OfflineOutput`], so the audio clock only
//! moves when a test pumps it. Tracks are in-memory "tone" descriptors that
//! [`ToneDecoder`] expands to a sine wave of the requested length.

mod crossfade_scenarios;
mod transport_tests;

use std::sync::Arc;
use std::time::Duration;

use crate::audio::device::OfflineOutput;
use crate::audio::engine::{EngineSettings, PlayerEngine};
use crate::audio::AudioDecoder;
use crate::error::DecodeError;
use crate::models::DecodedBuffer;
use crate::queue::TrackSource;

pub const TEST_RATE: u32 = 8000;

/// Step used when driving the engine, close to a display frame
pub const TICK: Duration = Duration::from_millis(10);

/// Decodes `tone:<seconds>` into a 440 Hz mono sine; anything else is rejected
pub struct ToneDecoder;

impl AudioDecoder for ToneDecoder {
    fn decode(&self, bytes: &[u8], hint: Option<&str>) -> Result<DecodedBuffer, DecodeError> {
        let seconds = std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.strip_prefix("tone:"))
            .and_then(|secs| secs.parse::<f64>().ok())
            .ok_or_else(|| DecodeError::UnsupportedFormat {
                format: hint.unwrap_or("unknown").to_string(),
            })?;

        let frames = (seconds * TEST_RATE as f64).round() as usize;
        let samples = (0..frames)
            .map(|n| {
                let t = n as f32 / TEST_RATE as f32;
                0.25 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect();
        Ok(DecodedBuffer::new(samples, 1, TEST_RATE))
    }
}

pub fn tone(seconds: f64) -> TrackSource {
    TrackSource::Memory {
        bytes: Arc::from(format!("tone:{}", seconds).into_bytes()),
        extension: Some("tone".to_string()),
    }
}

pub fn malformed() -> TrackSource {
    TrackSource::Memory {
        bytes: Arc::from(&b"\x00\x01 definitely not audio"[..]),
        extension: Some("mp3".to_string()),
    }
}

pub fn engine_with(settings: EngineSettings, tracks: &[TrackSource]) -> PlayerEngine {
    let mut engine = PlayerEngine::new(
        Box::new(OfflineOutput::new(TEST_RATE, 1)),
        Box::new(ToneDecoder),
        settings,
    )
    .with_seed(42);
    for (i, source) in tracks.iter().enumerate() {
        engine.add_track(format!("Track {}", i + 1), source.clone());
    }
    engine
}

pub fn crossfade_settings(seconds: f64) -> EngineSettings {
    EngineSettings {
        crossfade_seconds: seconds,
        ..EngineSettings::default()
    }
}

/// Pump the output and tick the engine until `seconds` of audio have played
pub fn run_for(engine: &mut PlayerEngine, seconds: f64) {
    let steps = (seconds / TICK.as_secs_f64()).round() as usize;
    for _ in 0..steps {
        engine.pump_output(TICK);
        engine.tick().expect("tick failed");
    }
}

/// Run until `engine.current_time()` reaches `t`
pub fn run_until(engine: &mut PlayerEngine, t: f64) {
    let remaining = t - engine.current_time();
    if remaining > 0.0 {
        run_for(engine, remaining);
    }
}
