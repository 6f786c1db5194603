use crate::audio::engine::EngineSettings;
use crate::error::{DecodeError, ErrorSeverity, PlayerError, PlaylistError};
use crate::models::{PlaybackSnapshot, PlaybackState};
use crate::queue::Playlist;

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Display the full player status with sound settings
    pub fn display_full_status(snapshot: &PlaybackSnapshot, settings: &EngineSettings) {
        println!("┌─ Player Status ─────────────────────────────────────────┐");
        println!("│ Track: {}", Self::truncate(&snapshot.track_label, 50));
        println!("│ Status: {}", Self::format_playback_state(snapshot.state));

        if snapshot.duration > 0.0 {
            println!(
                "│ Position: {} / {}",
                snapshot.elapsed_formatted(),
                snapshot.duration_formatted()
            );
            println!(
                "│ Progress: [{}] {:.1}%",
                Self::create_progress_bar(snapshot.progress(), 40),
                snapshot.progress() * 100.0
            );
        }
        if snapshot.crossfading {
            println!("│ Crossfading ({} sources)", snapshot.active_sources);
        }

        println!("│");
        println!(
            "│ Shuffle: {} | Repeat: {}",
            Self::on_off(snapshot.shuffle),
            Self::on_off(snapshot.repeat)
        );
        Self::display_sound_settings(settings);

        if let Some(message) = &snapshot.status_message {
            println!("│");
            println!("│ {}", Self::truncate(message, 55));
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    fn display_sound_settings(settings: &EngineSettings) {
        println!("│ Volume: {}%", (settings.eq.volume * 100.0).round() as u8);
        println!(
            "│ EQ: bass {:+.1} dB | mid {:+.1} dB | treble {:+.1} dB",
            settings.eq.bass_db, settings.eq.mid_db, settings.eq.treble_db
        );
        if settings.crossfade_seconds > 0.0 {
            println!(
                "│ Crossfade: {:.1}s ({})",
                settings.crossfade_seconds, settings.fade_curve
            );
        } else {
            println!("│ Crossfade: off");
        }
    }

    /// One-line status
    pub fn format_compact_status(snapshot: &PlaybackSnapshot) -> String {
        let mut line = format!(
            "{} | {} | {}/{} ({}%)",
            Self::format_playback_state(snapshot.state),
            Self::truncate(&snapshot.track_label, 30),
            snapshot.elapsed_formatted(),
            snapshot.duration_formatted(),
            (snapshot.progress() * 100.0) as u8
        );
        if snapshot.crossfading {
            line.push_str(" | crossfading");
        }
        line
    }

    pub fn display_compact_status(snapshot: &PlaybackSnapshot) {
        println!("{}", Self::format_compact_status(snapshot));
    }

    /// Display real-time position update (single line)
    pub fn display_position_update(snapshot: &PlaybackSnapshot) {
        use std::io::{self, Write};

        print!(
            "\r{} [{}] {}/{}{}   ",
            if snapshot.indicator_active { "♪" } else { " " },
            Self::create_progress_bar(snapshot.progress(), 30),
            snapshot.elapsed_formatted(),
            snapshot.duration_formatted(),
            if snapshot.crossfading { " ⇄" } else { "" }
        );
        let _ = io::stdout().flush();
    }

    /// Display the playlist with the current track marked
    pub fn display_playlist(playlist: &Playlist, current: Option<usize>) {
        if playlist.is_empty() {
            println!("Playlist is empty. Add files with 'add <path>'.");
            return;
        }

        println!("Playlist ({} tracks):", playlist.len());
        for (index, track) in playlist.tracks().iter().enumerate() {
            let marker = if current == Some(index) { "▶" } else { " " };
            println!("{} {:>3}. {}", marker, index + 1, Self::truncate(track.display_name(), 60));
        }
    }

    pub fn display_devices(devices: &[String]) {
        if devices.is_empty() {
            println!("No audio output devices found");
            return;
        }
        println!("Audio output devices:");
        for (index, name) in devices.iter().enumerate() {
            println!("  {}. {}", index + 1, name);
        }
    }

    /// Display error message with formatting
    pub fn display_error(error: &PlayerError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!(
            "┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon,
            severity.as_str()
        );
        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }
        if let Some(hint) = Self::error_hint(error) {
            eprintln!("│");
            eprintln!("│ {}", hint);
        }
        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    /// Extra guidance for errors the user can act on
    fn error_hint(error: &PlayerError) -> Option<&'static str> {
        match error {
            PlayerError::Audio(crate::error::AudioError::DeviceNotFound { .. }) => {
                Some("Use 'devices' to see available outputs")
            }
            PlayerError::Decode(DecodeError::UnsupportedFormat { .. }) => {
                Some("Supported: FLAC, WAV, MP3, OGG/Vorbis, AAC/M4A")
            }
            PlayerError::Decode(DecodeError::CorruptedFile(_)) => {
                Some("File may need to be re-downloaded or re-encoded")
            }
            PlayerError::Playlist(PlaylistError::EmptyPlaylist) => Some("Add files with 'add <path>'"),
            PlayerError::Config(_) => Some("Configuration will use default values"),
            _ => None,
        }
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.chars().count() + word.chars().count() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }
        lines
    }

    /// Truncate string to fit display width
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }

    /// Create a progress bar string
    pub fn create_progress_bar(progress: f64, width: usize) -> String {
        let filled = ((progress.clamp(0.0, 1.0) * width as f64) as usize).min(width);
        format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
    }

    pub fn format_playback_state(state: PlaybackState) -> String {
        match state {
            PlaybackState::Playing => "▶ Playing".to_string(),
            PlaybackState::Paused => "⏸ Paused".to_string(),
            PlaybackState::Stopped => "⏹ Stopped".to_string(),
        }
    }

    fn on_off(enabled: bool) -> &'static str {
        if enabled {
            "on"
        } else {
            "off"
        }
    }
}
