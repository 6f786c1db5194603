use std::path::Path;
use std::time::Duration;

use log::{info, warn};

use crate::audio::device::list_output_devices;
use crate::audio::engine::{EngineSettings, PlayerEngine, PlayerEvent};
use crate::audio::{AudioOutput, SymphoniaDecoder};
use crate::cli::{Commands, SeekTarget, StatusDisplay};
use crate::config::ConfigManager;
use crate::error::{ConfigError, PlayerError};

/// What the caller should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Quit,
}

/// Main application controller that coordinates the engine and the saved configuration
pub struct AppController {
    engine: PlayerEngine,
    config_manager: ConfigManager,
}

impl AppController {
    /// Build an engine on `output` using the symphonia decoder on a background
    /// thread and the saved settings
    pub fn new(output: Box<dyn AudioOutput>, config_manager: ConfigManager) -> Self {
        let settings = EngineSettings::from(config_manager.get_config());
        let engine =
            PlayerEngine::new(output, Box::new(SymphoniaDecoder::new()), settings).with_background_decoding();
        Self::with_engine(engine, config_manager)
    }

    /// Wrap an existing engine, e.g. one with a test decoder
    pub fn with_engine(engine: PlayerEngine, config_manager: ConfigManager) -> Self {
        info!("Application controller initialized on '{}'", engine.output_name());
        Self { engine, config_manager }
    }

    pub fn engine(&self) -> &PlayerEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PlayerEngine {
        &mut self.engine
    }

    pub fn config_manager(&self) -> &ConfigManager {
        &self.config_manager
    }

    /// Add a file, or every playable file in a directory. Returns how many tracks were added.
    pub fn add_path(&mut self, path: &Path) -> Result<usize, PlayerError> {
        if path.is_dir() {
            Ok(self.engine.add_directory(path)?.len())
        } else {
            self.engine.add_file(path)?;
            Ok(1)
        }
    }

    /// Advance the clock by `elapsed` and run the engine's periodic work
    pub fn tick(&mut self, elapsed: Duration) -> Result<(), PlayerError> {
        self.engine.pump_output(elapsed);
        self.engine.tick()
    }

    /// Execute a single command
    pub async fn execute_command(&mut self, command: Commands) -> Result<CommandOutcome, PlayerError> {
        match command {
            Commands::Play { index: Some(index) } => {
                self.engine.play(index, 0.0)?;
                self.print_loading();
            }
            Commands::Play { index: None } | Commands::Resume => {
                self.engine.resume()?;
                self.print_loading();
            }
            Commands::Pause => match self.engine.pause() {
                Some(at) => println!("OK: Paused at {}", crate::models::format_time(at)),
                None => println!("Nothing is playing"),
            },
            Commands::Stop => {
                self.engine.stop_and_rewind();
                println!("OK: Stopped");
            }
            Commands::Next => {
                self.engine.next_track(false)?;
                self.print_loading();
            }
            Commands::Prev => {
                self.engine.prev_track()?;
                self.print_loading();
            }
            Commands::Shuffle => {
                let enabled = self.engine.toggle_shuffle();
                println!("OK: Shuffle {}", if enabled { "on" } else { "off" });
            }
            Commands::Repeat => {
                let enabled = self.engine.toggle_repeat();
                println!("OK: Repeat {}", if enabled { "on" } else { "off" });
            }
            Commands::Seek { target } => {
                match target {
                    SeekTarget::Fraction(fraction) => self.engine.seek_to_fraction(fraction)?,
                    SeekTarget::Time(time) => self.engine.seek(time.as_secs_f64())?,
                }
                println!("OK: Position {}", self.engine.snapshot().elapsed_formatted());
            }
            Commands::Volume { level } => {
                let volume = f32::from(level) / 100.0;
                self.engine.set_volume(volume);
                Self::persist(self.config_manager.set_volume(volume));
                println!("OK: Volume {}%", level);
            }
            Commands::Eq { band, gain_db } => {
                self.engine.set_band(band, gain_db);
                let applied = self.engine.settings().eq.band_db(band);
                Self::persist(self.config_manager.set_band(band, applied));
                println!("OK: {:?} {:+.1} dB", band, applied);
            }
            Commands::Crossfade { seconds } => {
                self.engine.set_crossfade_seconds(seconds);
                let applied = self.engine.settings().crossfade_seconds;
                Self::persist(self.config_manager.set_crossfade_seconds(applied));
                if applied > 0.0 {
                    println!("OK: Crossfade {:.1}s", applied);
                } else {
                    println!("OK: Crossfade off");
                }
            }
            Commands::Curve { curve } => {
                self.engine.set_fade_curve(curve);
                Self::persist(self.config_manager.set_fade_curve(curve));
                println!("OK: Fade curve {}", curve);
            }
            Commands::Add { path } => {
                let added = self.add_path(&path)?;
                println!("OK: Added {} track(s) from {}", added, path.display());
            }
            Commands::List => {
                StatusDisplay::display_playlist(self.engine.playlist(), self.engine.sequencer().current());
            }
            Commands::Move { from, to } => {
                self.engine.move_track(from, to)?;
                println!("OK: Moved track {} to {}", from + 1, to + 1);
            }
            Commands::Remove { index } => {
                let removed = self.engine.remove_track(index)?;
                println!("OK: Removed {}", removed.display_name());
            }
            Commands::Clear => {
                self.engine.clear_playlist();
                println!("OK: Playlist cleared");
            }
            Commands::Status => {
                StatusDisplay::display_full_status(&self.engine.snapshot(), self.engine.settings());
            }
            Commands::Devices => {
                let devices = list_output_devices()?;
                StatusDisplay::display_devices(&devices);
            }
            Commands::Quit => return Ok(CommandOutcome::Quit),
        }

        Ok(CommandOutcome::Continue)
    }

    /// Print notable engine events between prompts
    pub fn report_event(&self, event: &PlayerEvent) {
        match event {
            PlayerEvent::CrossfadeStarted { to, duration } => {
                if let Some(track) = self.engine.playlist().get(*to) {
                    println!("\n⇄ Crossfading into {} ({:.1}s)", track.display_name(), duration);
                }
            }
            PlayerEvent::TrackChanged { name, .. } if !self.engine.session().crossfade_in_progress => {
                println!("\n♪ Now playing: {}", name);
            }
            PlayerEvent::PlaylistEnded => println!("\nPlaylist finished"),
            PlayerEvent::Status(message) if message == "Transition failed" || message.starts_with("Error loading") => {
                println!("\n⚠ {}", message);
            }
            _ => {}
        }
    }

    /// Starts are announced through [`PlayerEvent::TrackChanged`]; only a
    /// start still waiting on the decoder is reported here
    fn print_loading(&self) {
        if self.engine.is_loading() {
            println!("OK: Loading {}", self.engine.snapshot().track_label);
        }
    }

    /// Settings still apply for this session when the config file cannot be written
    fn persist(result: Result<(), ConfigError>) {
        if let Err(e) = result {
            warn!("Could not save configuration: {}", e);
        }
    }

    /// Stop playback and save the current sound settings
    pub fn shutdown(&mut self) {
        self.engine.stop();

        let settings = self.engine.settings().clone();
        let result = self.config_manager.update_config(|config| {
            config.volume = settings.eq.volume;
            config.bass_db = settings.eq.bass_db;
            config.mid_db = settings.eq.mid_db;
            config.treble_db = settings.eq.treble_db;
            config.crossfade_seconds = settings.crossfade_seconds;
            config.fade_curve = settings.fade_curve;
        });
        if let Err(e) = result {
            eprintln!("Warning: Error saving configuration: {}", e);
        }
        info!("Application shutdown complete");
    }
}
