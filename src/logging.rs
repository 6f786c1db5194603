use chrono::{DateTime, Utc};
use log::{debug, error, info, trace, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Environment variable that selects the log level
pub const LOG_LEVEL_ENV: &str = "XFPLAY_LOG_LEVEL";

/// Initialize env_logger with a timestamped format
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let log_level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "warn".to_string());

    let mut builder = env_logger::Builder::new();
    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}:{}] {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });
    builder.filter_level(parse_level(&log_level));
    builder.try_init()?;

    info!("Logging initialized with level: {}", log_level);
    Ok(())
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Warn,
    }
}

/// A recorded playback event
#[derive(Debug, Clone)]
pub struct PlaybackLogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: PlaybackEventKind,
    pub duration: Option<Duration>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEventKind {
    PlaybackStarted,
    PlaybackPaused,
    PlaybackStopped,
    TrackChanged,
    CrossfadeStarted,
    CrossfadeFinished,
    Seek,
    DecodeError,
    TransitionFailed,
}

impl PlaybackEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackEventKind::PlaybackStarted => "PLAYBACK_STARTED",
            PlaybackEventKind::PlaybackPaused => "PLAYBACK_PAUSED",
            PlaybackEventKind::PlaybackStopped => "PLAYBACK_STOPPED",
            PlaybackEventKind::TrackChanged => "TRACK_CHANGED",
            PlaybackEventKind::CrossfadeStarted => "CROSSFADE_STARTED",
            PlaybackEventKind::CrossfadeFinished => "CROSSFADE_FINISHED",
            PlaybackEventKind::Seek => "SEEK",
            PlaybackEventKind::DecodeError => "DECODE_ERROR",
            PlaybackEventKind::TransitionFailed => "TRANSITION_FAILED",
        }
    }
}

/// Bounded history of playback events, mirrored to the `log` facade
#[derive(Clone)]
pub struct PlaybackLogger {
    events: Arc<Mutex<VecDeque<PlaybackLogEntry>>>,
    max_events: usize,
}

impl Default for PlaybackLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackLogger {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: max_events.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PlaybackLogEntry>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn log_event(&self, kind: PlaybackEventKind, details: String, duration: Option<Duration>) {
        match kind {
            PlaybackEventKind::PlaybackStarted
            | PlaybackEventKind::PlaybackPaused
            | PlaybackEventKind::PlaybackStopped
            | PlaybackEventKind::TrackChanged
            | PlaybackEventKind::CrossfadeStarted => info!("[{}] {}", kind.as_str(), details),
            PlaybackEventKind::CrossfadeFinished | PlaybackEventKind::Seek => {
                debug!("[{}] {}", kind.as_str(), details)
            }
            PlaybackEventKind::TransitionFailed => warn!("[{}] {}", kind.as_str(), details),
            PlaybackEventKind::DecodeError => error!("[{}] {}", kind.as_str(), details),
        }

        let mut events = self.lock();
        events.push_back(PlaybackLogEntry {
            timestamp: Utc::now(),
            kind,
            duration,
            details,
        });
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    pub fn log_playback_started(&self, track: &str, offset: f64) {
        self.log_event(
            PlaybackEventKind::PlaybackStarted,
            format!("Started '{}' at {:.2}s", track, offset),
            None,
        );
    }

    pub fn log_playback_paused(&self, position: f64) {
        self.log_event(
            PlaybackEventKind::PlaybackPaused,
            format!("Paused at {:.2}s", position),
            None,
        );
    }

    pub fn log_playback_stopped(&self, reason: &str) {
        self.log_event(
            PlaybackEventKind::PlaybackStopped,
            format!("Stopped: {}", reason),
            None,
        );
    }

    pub fn log_track_changed(&self, index: usize, track: &str) {
        self.log_event(
            PlaybackEventKind::TrackChanged,
            format!("Now playing #{} '{}'", index + 1, track),
            None,
        );
    }

    pub fn log_crossfade_started(&self, to_track: &str, length: f64) {
        self.log_event(
            PlaybackEventKind::CrossfadeStarted,
            format!("Crossfading into '{}' over {:.2}s", to_track, length),
            Some(Duration::from_secs_f64(length.max(0.0))),
        );
    }

    pub fn log_crossfade_finished(&self, retired: &str) {
        self.log_event(
            PlaybackEventKind::CrossfadeFinished,
            format!("Retired outgoing source {}", retired),
            None,
        );
    }

    pub fn log_seek(&self, to_position: f64) {
        self.log_event(PlaybackEventKind::Seek, format!("Seek to {:.2}s", to_position), None);
    }

    pub fn log_decode_error(&self, track: &str, error: &str) {
        self.log_event(
            PlaybackEventKind::DecodeError,
            format!("Decode error for '{}': {}", track, error),
            None,
        );
    }

    pub fn log_transition_failed(&self, target: &str, error: &str) {
        self.log_event(
            PlaybackEventKind::TransitionFailed,
            format!("Crossfade into '{}' failed, falling back to hard cut: {}", target, error),
            None,
        );
    }

    /// Most recent `count` events, oldest first
    pub fn get_recent_events(&self, count: usize) -> Vec<PlaybackLogEntry> {
        let events = self.lock();
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn clear_events(&self) {
        self.lock().clear();
    }

    pub fn get_event_statistics(&self) -> EventStatistics {
        let events = self.lock();
        let mut stats = EventStatistics::default();
        for event in events.iter() {
            match event.kind {
                PlaybackEventKind::CrossfadeStarted => stats.crossfades += 1,
                PlaybackEventKind::DecodeError => stats.decode_errors += 1,
                PlaybackEventKind::TransitionFailed => stats.transition_failures += 1,
                PlaybackEventKind::Seek => stats.seeks += 1,
                PlaybackEventKind::TrackChanged => stats.track_changes += 1,
                _ => {}
            }
        }
        stats.total_events = events.len();
        stats
    }
}

/// Counts of notable events in the history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStatistics {
    pub total_events: usize,
    pub track_changes: usize,
    pub crossfades: usize,
    pub decode_errors: usize,
    pub transition_failures: usize,
    pub seeks: usize,
}

/// Timer utility for measuring operation durations
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn new(operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish(self) -> Duration {
        let duration = self.elapsed();
        trace!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        duration
    }

    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let duration = self.elapsed();
        if duration > threshold {
            warn!(
                "Operation '{}' took {}ms (threshold: {}ms)",
                self.operation_name,
                duration.as_millis(),
                threshold.as_millis()
            );
        } else {
            debug!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        }
        duration
    }
}
