use thiserror::Error;

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Crossfade error: {0}")]
    Crossfade(#[from] CrossfadeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    #[error("CLI parse error: {0}")]
    Parse(#[from] crate::cli::ParseError),
}

impl PlayerError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Audio(err) => err.user_message(),
            PlayerError::File(err) => Self::format_file_error(err),
            PlayerError::Decode(err) => err.user_message(),
            PlayerError::Crossfade(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::Playlist(err) => err.user_message(),
            PlayerError::Parse(err) => format!("Command error: {}", err),
        }
    }

    /// Check if the player can keep going after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlayerError::Audio(err) => err.is_recoverable(),
            PlayerError::File(_) => false,
            PlayerError::Decode(err) => err.is_recoverable(),
            PlayerError::Crossfade(_) => true, // falls back to a hard transition
            PlayerError::Config(err) => err.is_recoverable(),
            PlayerError::Playlist(err) => err.is_recoverable(),
            PlayerError::Parse(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Audio(AudioError::UnknownSource { .. }) => ErrorSeverity::Info,
            PlayerError::Audio(AudioError::DeviceNotFound { .. }) => ErrorSeverity::Error,
            PlayerError::Audio(_) => ErrorSeverity::Critical,
            PlayerError::File(_) => ErrorSeverity::Error,
            PlayerError::Decode(DecodeError::UnsupportedFormat { .. }) => ErrorSeverity::Warning,
            PlayerError::Decode(_) => ErrorSeverity::Error,
            PlayerError::Crossfade(_) => ErrorSeverity::Warning,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::Playlist(PlaylistError::EmptyPlaylist) => ErrorSeverity::Info,
            PlayerError::Playlist(_) => ErrorSeverity::Warning,
            PlayerError::Parse(_) => ErrorSeverity::Info,
        }
    }

    fn format_file_error(err: &std::io::Error) -> String {
        match err.kind() {
            std::io::ErrorKind::NotFound => "File or directory not found".to_string(),
            std::io::ErrorKind::PermissionDenied => "Permission denied - cannot access file".to_string(),
            std::io::ErrorKind::InvalidData => "File contains invalid or corrupted data".to_string(),
            _ => format!("File system error: {}", err),
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Audio output and graph errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Unsupported sample format: {format}")]
    UnsupportedSampleFormat { format: String },

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Audio initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Unknown source: {id}")]
    UnknownSource { id: u64 },
}

impl AudioError {
    pub fn user_message(&self) -> String {
        match self {
            AudioError::DeviceNotFound { device } => {
                format!("Audio device '{}' is not available or has been disconnected", device)
            }
            AudioError::UnsupportedSampleFormat { format } => {
                format!("The output device uses an unsupported sample format ({})", format)
            }
            AudioError::StreamError(msg) => format!("Audio playback interrupted: {}", msg),
            AudioError::InitializationFailed(msg) => {
                format!("Failed to initialize audio output: {}", msg)
            }
            AudioError::UnknownSource { id } => {
                format!("Source {} is no longer part of the audio graph", id)
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            AudioError::DeviceNotFound { .. } => true, // default device fallback
            AudioError::UnsupportedSampleFormat { .. } => false,
            AudioError::StreamError(_) => true,
            AudioError::InitializationFailed(_) => true,
            AudioError::UnknownSource { .. } => true,
        }
    }
}

/// Audio decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Corrupted file: {0}")]
    CorruptedFile(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Unreadable source: {0}")]
    Unreadable(#[from] std::io::Error),
}

impl DecodeError {
    pub fn user_message(&self) -> String {
        match self {
            DecodeError::UnsupportedFormat { format } => {
                format!("Audio format '{}' is not supported by this player", format)
            }
            DecodeError::CorruptedFile(msg) => {
                format!("Audio file appears to be corrupted or damaged: {}", msg)
            }
            DecodeError::DecodeFailed(msg) => format!("Failed to decode audio data: {}", msg),
            DecodeError::Unreadable(err) => format!("Cannot read audio file: {}", err),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        // The track is skipped; playback state stays consistent.
        matches!(self, DecodeError::Unreadable(_))
    }
}

/// Failures while setting up a crossfade transition
#[derive(Debug, Error)]
pub enum CrossfadeError {
    #[error("Incoming track failed to decode: {0}")]
    Decode(#[from] DecodeError),

    #[error("Audio graph rejected the transition: {0}")]
    Graph(#[from] AudioError),

    #[error("No outgoing source to fade from")]
    NoOutgoingSource,

    #[error("Invalid crossfade target: {index}")]
    InvalidTarget { index: usize },

    #[error("Crossfade target {index} is not decoded yet")]
    NotLoaded { index: usize },
}

impl CrossfadeError {
    pub fn user_message(&self) -> String {
        match self {
            CrossfadeError::Decode(err) => err.user_message(),
            CrossfadeError::Graph(err) => err.user_message(),
            CrossfadeError::NoOutgoingSource => "Nothing is playing to crossfade from".to_string(),
            CrossfadeError::InvalidTarget { index } => {
                format!("Track number {} cannot be crossfaded into", index + 1)
            }
            CrossfadeError::NotLoaded { index } => format!("Track number {} is still loading", index + 1),
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => format!("Cannot access configuration file: {}", err),
            ConfigError::SerializationError(_) => "Failed to save configuration settings".to_string(),
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        // Every configuration failure falls back to defaults.
        true
    }
}

/// Playlist editing errors
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: String },

    #[error("Invalid index: {index}")]
    InvalidIndex { index: usize },

    #[error("Playlist is empty")]
    EmptyPlaylist,
}

impl PlaylistError {
    pub fn user_message(&self) -> String {
        match self {
            PlaylistError::FileNotFound { path } => format!("Cannot find audio file: {}", path),
            PlaylistError::UnsupportedFormat { path } => {
                format!("File '{}' is not a supported audio format", path)
            }
            PlaylistError::InvalidIndex { index } => {
                format!("Track number {} is not in the playlist", index + 1)
            }
            PlaylistError::EmptyPlaylist => "No tracks loaded - add some files first".to_string(),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        true
    }
}
