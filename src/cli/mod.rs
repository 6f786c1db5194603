use crate::audio::fade::FadeCurve;
use crate::config::EqBand;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub mod status;
pub use status::StatusDisplay;

/// Crossfading audio player
#[derive(Debug, Parser)]
#[command(name = "xfplay")]
#[command(about = "A terminal audio player with equal-power crossfades and a 3-band EQ")]
#[command(version)]
pub struct CliApp {
    /// Audio files or directories to load into the playlist
    pub files: Vec<PathBuf>,

    /// Crossfade length in seconds (0 disables crossfading)
    #[arg(short = 'x', long)]
    pub crossfade: Option<f64>,

    /// Fade curve: linear or equal-power
    #[arg(long, value_parser = parse_curve)]
    pub curve: Option<FadeCurve>,

    /// Start with shuffle enabled
    #[arg(long)]
    pub shuffle: bool,

    /// Start with repeat enabled
    #[arg(long)]
    pub repeat: bool,

    /// Output device name
    #[arg(short, long)]
    pub device: Option<String>,

    /// Volume level (0-100)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub volume: Option<u8>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Render to a silent offline output instead of a sound device
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_curve(value: &str) -> Result<FadeCurve, String> {
    value.parse()
}

/// Where a `seek` command should land
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// Fraction of the current track, 0.0 to 1.0
    Fraction(f64),
    Time(Duration),
}

/// Interactive commands
#[derive(Debug, Clone, PartialEq)]
pub enum Commands {
    /// Play the given track (0-based), or resume when none is given
    Play { index: Option<usize> },
    Pause,
    Resume,
    Stop,
    Next,
    Prev,
    Shuffle,
    Repeat,
    Seek { target: SeekTarget },
    Volume { level: u8 },
    Eq { band: EqBand, gain_db: f32 },
    Crossfade { seconds: f64 },
    Curve { curve: FadeCurve },
    Add { path: PathBuf },
    List,
    Move { from: usize, to: usize },
    Remove { index: usize },
    Clear,
    Status,
    Devices,
    Quit,
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home_dir) => home_dir.join(rest),
                None => PathBuf::from(path),
            }
        } else if path == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
        } else {
            PathBuf::from(path)
        }
    }

    /// Parse command from string (for interactive mode)
    pub fn parse_command(input: &str) -> Result<Commands, ParseError> {
        let args: Vec<&str> = input.split_whitespace().collect();
        if args.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        match args[0] {
            "play" => match args.get(1) {
                Some(number) => Ok(Commands::Play {
                    index: Some(Self::parse_track_number(number)?),
                }),
                None => Ok(Commands::Play { index: None }),
            },
            "pause" => Ok(Commands::Pause),
            "resume" => Ok(Commands::Resume),
            "stop" => Ok(Commands::Stop),
            "next" => Ok(Commands::Next),
            "prev" | "previous" => Ok(Commands::Prev),
            "shuffle" => Ok(Commands::Shuffle),
            "repeat" => Ok(Commands::Repeat),
            "seek" => {
                let position = Self::require(&args, 1, "seek", "position")?;
                Ok(Commands::Seek {
                    target: Self::parse_seek_target(position)?,
                })
            }
            "volume" => {
                let value = Self::require(&args, 1, "volume", "level")?;
                match value.parse::<u8>() {
                    Ok(level) if level <= 100 => Ok(Commands::Volume { level }),
                    _ => Err(ParseError::InvalidArgument {
                        argument: "volume level".to_string(),
                        value: value.to_string(),
                        expected: "number 0-100".to_string(),
                    }),
                }
            }
            "bass" | "mid" | "treble" => {
                let band = match args[0] {
                    "bass" => EqBand::Bass,
                    "mid" => EqBand::Mid,
                    _ => EqBand::Treble,
                };
                let value = Self::require(&args, 1, args[0], "gain")?;
                let gain_db = value
                    .trim_end_matches("dB")
                    .trim_end_matches("db")
                    .parse::<f32>()
                    .ok()
                    .filter(|gain| gain.is_finite())
                    .ok_or_else(|| ParseError::InvalidArgument {
                        argument: format!("{} gain", args[0]),
                        value: value.to_string(),
                        expected: "decibels, e.g. -6 or 3.5".to_string(),
                    })?;
                Ok(Commands::Eq { band, gain_db })
            }
            "crossfade" | "xfade" => {
                let value = Self::require(&args, 1, "crossfade", "seconds")?;
                let seconds = Self::parse_time(value)?.as_secs_f64();
                Ok(Commands::Crossfade { seconds })
            }
            "curve" => {
                let value = Self::require(&args, 1, "curve", "shape")?;
                let curve = value.parse().map_err(|_| ParseError::InvalidArgument {
                    argument: "fade curve".to_string(),
                    value: value.to_string(),
                    expected: "linear or equal-power".to_string(),
                })?;
                Ok(Commands::Curve { curve })
            }
            "add" => {
                if args.len() < 2 {
                    return Err(ParseError::MissingArgument {
                        command: "add".to_string(),
                        argument: "path".to_string(),
                    });
                }
                let path = Self::expand_path(&args[1..].join(" "));
                Ok(Commands::Add { path })
            }
            "list" | "ls" => Ok(Commands::List),
            "move" | "mv" => {
                let from = Self::parse_track_number(Self::require(&args, 1, "move", "from")?)?;
                let to = Self::parse_track_number(Self::require(&args, 2, "move", "to")?)?;
                Ok(Commands::Move { from, to })
            }
            "remove" | "rm" => {
                let index = Self::parse_track_number(Self::require(&args, 1, "remove", "track")?)?;
                Ok(Commands::Remove { index })
            }
            "clear" => Ok(Commands::Clear),
            "status" => Ok(Commands::Status),
            "devices" => Ok(Commands::Devices),
            "quit" | "exit" | "q" => Ok(Commands::Quit),
            "help" | "?" => Err(ParseError::HelpRequested),
            _ => Err(ParseError::UnknownCommand {
                command: args[0].to_string(),
            }),
        }
    }

    fn require<'a>(args: &[&'a str], position: usize, command: &str, argument: &str) -> Result<&'a str, ParseError> {
        args.get(position).copied().ok_or_else(|| ParseError::MissingArgument {
            command: command.to_string(),
            argument: argument.to_string(),
        })
    }

    /// Track numbers are 1-based on the command line
    fn parse_track_number(value: &str) -> Result<usize, ParseError> {
        match value.parse::<usize>() {
            Ok(number) if number >= 1 => Ok(number - 1),
            _ => Err(ParseError::InvalidArgument {
                argument: "track number".to_string(),
                value: value.to_string(),
                expected: "a number starting at 1".to_string(),
            }),
        }
    }

    /// `50%` seeks to a fraction of the track; anything else is a time
    pub fn parse_seek_target(value: &str) -> Result<SeekTarget, ParseError> {
        if let Some(percent) = value.trim().strip_suffix('%') {
            return match percent.parse::<f64>() {
                Ok(percent) if (0.0..=100.0).contains(&percent) => Ok(SeekTarget::Fraction(percent / 100.0)),
                _ => Err(ParseError::InvalidArgument {
                    argument: "seek percentage".to_string(),
                    value: value.to_string(),
                    expected: "0% to 100%".to_string(),
                }),
            };
        }
        Self::parse_time(value).map(SeekTarget::Time)
    }

    /// Display help information
    pub fn display_help() {
        println!("xfplay - Available Commands:");
        println!();
        println!("Playback Control:");
        println!("  play [n]        - Play track n, or resume");
        println!("  pause           - Pause playback");
        println!("  resume          - Resume playback");
        println!("  stop            - Stop playback and rewind");
        println!("  next            - Next track");
        println!("  prev            - Previous track");
        println!("  shuffle         - Toggle shuffle");
        println!("  repeat          - Toggle repeat");
        println!("  seek <pos>      - Seek to a time ('1:30', '90s') or percentage ('50%')");
        println!();
        println!("Sound:");
        println!("  volume <0-100>  - Set volume level");
        println!("  bass <dB>       - Low shelf gain at 200 Hz");
        println!("  mid <dB>        - Peaking gain at 1 kHz");
        println!("  treble <dB>     - High shelf gain at 3 kHz");
        println!("  crossfade <s>   - Crossfade length in seconds (0 disables)");
        println!("  curve <shape>   - Fade curve: linear or equal-power");
        println!();
        println!("Playlist:");
        println!("  add <path>      - Add a file or directory");
        println!("  list            - List the playlist");
        println!("  move <a> <b>    - Move track a to position b");
        println!("  remove <n>      - Remove track n");
        println!("  clear           - Remove every track");
        println!();
        println!("General:");
        println!("  status          - Show current player status");
        println!("  devices         - List audio output devices");
        println!("  help            - Show this help message");
        println!("  quit, exit      - Exit the player");
    }

    /// Parse time string to Duration
    pub fn parse_time(time_str: &str) -> Result<Duration, ParseError> {
        let trimmed = time_str.trim();
        let invalid = || ParseError::InvalidTimeFormat {
            input: time_str.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        // "1:30", "1:30.5", "90", "90s", "2.5"
        let seconds = if let Some((minutes, seconds)) = trimmed.split_once(':') {
            let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
            let seconds: f64 = seconds.parse().map_err(|_| invalid())?;
            if !(0.0..60.0).contains(&seconds) {
                return Err(invalid());
            }
            minutes as f64 * 60.0 + seconds
        } else {
            let seconds: f64 = trimmed.trim_end_matches('s').parse().map_err(|_| invalid())?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(invalid());
            }
            seconds
        };

        Ok(Duration::from_secs_f64(seconds))
    }
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },

    #[error("Invalid time format: {input}")]
    InvalidTimeFormat { input: String },

    #[error("Help requested")]
    HelpRequested,
}
