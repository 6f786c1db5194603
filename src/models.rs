use serde::{Deserialize, Serialize};
use std::fmt;
use crate::config::EqBand;

/// Stable identity of a track, assigned when it is added to the playlist.
///
/// Position in the playlist can change; the id never does, so decoded
/// buffers are cached against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fully decoded PCM audio, interleaved f32 samples
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
    pub frames: usize,
}

impl DecodedBuffer {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let frames = if channels > 0 {
            samples.len() / channels as usize
        } else {
            0
        };
        Self {
            samples,
            channels,
            sample_rate,
            frames,
        }
    }

    /// A buffer of silence, mostly useful for tests and placeholders
    pub fn silence(channels: u16, sample_rate: u32, frames: usize) -> Self {
        Self::new(vec![0.0; frames * channels as usize], channels, sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Length of the buffer in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate > 0 {
            self.frames as f64 / self.sample_rate as f64
        } else {
            0.0
        }
    }

    /// Sample at `frame` for output channel `channel` of an `out_channels`
    /// layout. Mono is copied to every output channel. When the buffer has
    /// more channels than the output, each output channel averages the source
    /// channels that fold onto it, so stereo on a mono device hears both sides.
    pub fn sample(&self, frame: usize, channel: usize, out_channels: usize) -> f32 {
        if frame >= self.frames || self.channels == 0 {
            return 0.0;
        }
        let src_channels = self.channels as usize;
        let row = &self.samples[frame * src_channels..(frame + 1) * src_channels];
        let out_channels = out_channels.max(1);

        if src_channels <= out_channels {
            return row[channel.min(src_channels - 1)];
        }

        let channel = channel.min(out_channels - 1);
        let (sum, count) = row
            .iter()
            .skip(channel)
            .step_by(out_channels)
            .fold((0.0f32, 0usize), |(sum, count), s| (sum + s, count + 1));
        sum / count as f32
    }
}

/// Playback state enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Get a human-readable string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared equalizer and master settings applied to every source.
///
/// Band gains are in dB, `volume` is a linear gain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqSettings {
    pub volume: f32,
    pub bass_db: f32,
    pub mid_db: f32,
    pub treble_db: f32,
}

impl Default for EqSettings {
    fn default() -> Self {
        Self {
            volume: 0.8,
            bass_db: 0.0,
            mid_db: 0.0,
            treble_db: 0.0,
        }
    }
}

impl EqSettings {
    pub fn flat(volume: f32) -> Self {
        Self {
            volume,
            ..Self::default()
        }
    }

    pub fn band_db(&self, band: EqBand) -> f32 {
        match band {
            EqBand::Bass => self.bass_db,
            EqBand::Mid => self.mid_db,
            EqBand::Treble => self.treble_db,
        }
    }

    pub fn set_band_db(&mut self, band: EqBand, gain_db: f32) {
        match band {
            EqBand::Bass => self.bass_db = gain_db,
            EqBand::Mid => self.mid_db = gain_db,
            EqBand::Treble => self.treble_db = gain_db,
        }
    }
}

/// Everything a front end needs to draw the player
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub track_label: String,
    pub current_index: Option<usize>,
    pub elapsed: f64,
    pub duration: f64,
    pub shuffle: bool,
    pub repeat: bool,
    pub crossfading: bool,
    /// Spinning "now playing" indicator
    pub indicator_active: bool,
    pub status_message: Option<String>,
    pub active_sources: usize,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            state: PlaybackState::Stopped,
            track_label: "No track selected".to_string(),
            current_index: None,
            elapsed: 0.0,
            duration: 0.0,
            shuffle: false,
            repeat: false,
            crossfading: false,
            indicator_active: false,
            status_message: None,
            active_sources: 0,
        }
    }
}

impl PlaybackSnapshot {
    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing)
    }

    /// Get progress as a fraction clamped to [0, 1]
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn elapsed_formatted(&self) -> String {
        format_time(self.elapsed)
    }

    pub fn duration_formatted(&self) -> String {
        format_time(self.duration)
    }
}

/// Format seconds as `m:ss`
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoded_buffer_duration() {
        let buffer = DecodedBuffer::silence(2, 48000, 96000);
        assert_eq!(buffer.frames, 96000);
        assert!((buffer.duration_secs() - 2.0).abs() < 1e-9);
        assert!(!buffer.is_empty());

        let empty = DecodedBuffer::new(Vec::new(), 0, 0);
        assert_eq!(empty.duration_secs(), 0.0);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_decoded_buffer_channel_mapping() {
        let mono = DecodedBuffer::new(vec![0.1, 0.2, 0.3], 1, 8000);
        assert_eq!(mono.sample(1, 0, 2), 0.2);
        assert_eq!(mono.sample(1, 1, 2), 0.2);
        assert_eq!(mono.sample(3, 0, 2), 0.0);

        let stereo = DecodedBuffer::new(vec![0.1, -0.1, 0.2, -0.2], 2, 8000);
        assert_eq!(stereo.frames, 2);
        assert_eq!(stereo.sample(1, 1, 2), -0.2);
    }

    #[test]
    fn test_stereo_folds_down_to_mono() {
        let stereo = DecodedBuffer::new(vec![0.6, 0.2, 0.4, 0.0], 2, 8000);
        assert!((stereo.sample(0, 0, 1) - 0.4).abs() < 1e-6);
        assert!((stereo.sample(1, 0, 1) - 0.2).abs() < 1e-6);

        // Right-only content is still audible on a mono device.
        let right_only = DecodedBuffer::new(vec![0.0, 0.8], 2, 8000);
        assert!((right_only.sample(0, 0, 1) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_surround_folds_onto_stereo_pairs() {
        let six = DecodedBuffer::new(vec![0.3, 0.6, 0.3, 0.6, 0.3, 0.6], 6, 8000);
        assert!((six.sample(0, 0, 2) - 0.3).abs() < 1e-6);
        assert!((six.sample(0, 1, 2) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_snapshot_progress_is_clamped() {
        let mut snapshot = PlaybackSnapshot {
            elapsed: 12.0,
            duration: 10.0,
            ..PlaybackSnapshot::default()
        };
        assert_eq!(snapshot.progress(), 1.0);

        snapshot.elapsed = 2.5;
        assert!((snapshot.progress() - 0.25).abs() < 1e-9);

        snapshot.duration = 0.0;
        assert_eq!(snapshot.progress(), 0.0);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(9.99), "0:09");
        assert_eq!(format_time(65.0), "1:05");
        assert_eq!(format_time(3600.0), "60:00");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(-3.0), "0:00");
    }

    #[test]
    fn test_playback_state_display() {
        assert_eq!(format!("{}", PlaybackState::Playing), "Playing");
        assert_eq!(PlaybackState::Stopped.as_str(), "Stopped");
    }

    #[test]
    fn test_eq_settings_default() {
        let eq = EqSettings::default();
        assert_eq!(eq.volume, 0.8);
        assert_eq!(eq.bass_db, 0.0);
        assert_eq!(EqSettings::flat(0.5).volume, 0.5);
    }
}
