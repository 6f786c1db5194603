use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audio::eq::{MAX_BAND_DB, MIN_BAND_DB};
use crate::audio::fade::FadeCurve;
use crate::error::ConfigError;
use crate::models::EqSettings;

/// Longest crossfade the player accepts, in seconds
pub const MAX_CROSSFADE_SECONDS: f64 = 30.0;

/// Player configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub volume: f32,
    pub bass_db: f32,
    pub mid_db: f32,
    pub treble_db: f32,
    /// 0 disables crossfading
    pub crossfade_seconds: f64,
    pub fade_curve: FadeCurve,
    pub preferred_device: Option<String>,
    /// How often the progress display and crossfade trigger are sampled
    pub progress_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: 0.8,
            bass_db: 0.0,
            mid_db: 0.0,
            treble_db: 0.0,
            crossfade_seconds: 0.0,
            fade_curve: FadeCurve::EqualPower,
            preferred_device: None,
            progress_interval_ms: 16,
        }
    }
}

impl PlayerConfig {
    pub fn eq_settings(&self) -> EqSettings {
        EqSettings {
            volume: self.volume,
            bass_db: self.bass_db,
            mid_db: self.mid_db,
            treble_db: self.treble_db,
        }
    }
}

/// Clamp a volume to [0, 1]; non-numbers become silence
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Clamp a band gain to the EQ range; non-numbers become flat
pub fn clamp_band_db(gain_db: f32) -> f32 {
    if gain_db.is_finite() {
        gain_db.clamp(MIN_BAND_DB, MAX_BAND_DB)
    } else {
        0.0
    }
}

/// Clamp a crossfade length; negative or non-numbers disable crossfading
pub fn clamp_crossfade(seconds: f64) -> f64 {
    if seconds.is_finite() {
        seconds.clamp(0.0, MAX_CROSSFADE_SECONDS)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqBand {
    Bass,
    Mid,
    Treble,
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: PlayerConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Ok(Self::with_path(config_path))
    }

    /// Use a specific config file, falling back to defaults if it is missing or unreadable
    pub fn with_path(config_path: PathBuf) -> Self {
        let config = match Self::load_config(&config_path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Ignoring config at {}: {}", config_path.display(), err);
                PlayerConfig::default()
            }
        };
        Self {
            config,
            config_path,
        }
    }

    pub fn get_config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut PlayerConfig),
    {
        updater(&mut self.config);
        self.save_config()
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), ConfigError> {
        self.config.volume = clamp_volume(volume);
        self.save_config()
    }

    pub fn set_band(&mut self, band: EqBand, gain_db: f32) -> Result<(), ConfigError> {
        let gain_db = clamp_band_db(gain_db);
        match band {
            EqBand::Bass => self.config.bass_db = gain_db,
            EqBand::Mid => self.config.mid_db = gain_db,
            EqBand::Treble => self.config.treble_db = gain_db,
        }
        self.save_config()
    }

    pub fn set_crossfade_seconds(&mut self, seconds: f64) -> Result<(), ConfigError> {
        self.config.crossfade_seconds = clamp_crossfade(seconds);
        self.save_config()
    }

    pub fn set_fade_curve(&mut self, curve: FadeCurve) -> Result<(), ConfigError> {
        self.config.fade_curve = curve;
        self.save_config()
    }

    pub fn set_preferred_device(&mut self, device: Option<String>) -> Result<(), ConfigError> {
        self.config.preferred_device = device;
        self.save_config()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = PlayerConfig::default();
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join("xfplay");

        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<PlayerConfig, ConfigError> {
        if !path.exists() {
            return Ok(PlayerConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let mut config: PlayerConfig = toml::from_str(&config_content)?;

        // Hand-edited files may hold out-of-range values.
        config.volume = clamp_volume(config.volume);
        config.bass_db = clamp_band_db(config.bass_db);
        config.mid_db = clamp_band_db(config.mid_db);
        config.treble_db = clamp_band_db(config.treble_db);
        config.crossfade_seconds = clamp_crossfade(config.crossfade_seconds);
        config.progress_interval_ms = config.progress_interval_ms.clamp(1, 1000);
        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        (ConfigManager::with_path(config_path), temp_dir)
    }

    #[test]
    fn test_player_config_default() {
        let config = PlayerConfig::default();
        assert_eq!(config.volume, 0.8);
        assert_eq!(config.crossfade_seconds, 0.0);
        assert_eq!(config.fade_curve, FadeCurve::EqualPower);
        assert_eq!(config.preferred_device, None);
        assert_eq!(config.progress_interval_ms, 16);
        assert_eq!(config.eq_settings(), EqSettings::default());
    }

    #[test]
    fn test_config_serialization() {
        let config = PlayerConfig {
            volume: 0.5,
            bass_db: 6.0,
            crossfade_seconds: 4.5,
            fade_curve: FadeCurve::Linear,
            preferred_device: Some("Test Device".to_string()),
            ..PlayerConfig::default()
        };

        let serialized = toml::to_string(&config).unwrap();
        assert!(serialized.contains("fade_curve = \"linear\""));
        let deserialized: PlayerConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: PlayerConfig = toml::from_str("crossfade_seconds = 3.0\n").unwrap();
        assert_eq!(config.crossfade_seconds, 3.0);
        assert_eq!(config.volume, 0.8);
        assert_eq!(config.fade_curve, FadeCurve::EqualPower);
    }

    #[test]
    fn test_load_nonexistent_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.toml");
        let config = ConfigManager::load_config(&path).unwrap();
        assert_eq!(config, PlayerConfig::default());
    }

    #[test]
    fn test_load_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "volume = \"loud\"").unwrap();

        assert!(matches!(
            ConfigManager::load_config(&path),
            Err(ConfigError::DeserializationError(_))
        ));
        // The manager itself falls back to defaults.
        let manager = ConfigManager::with_path(path);
        assert_eq!(manager.get_config(), &PlayerConfig::default());
    }

    #[test]
    fn test_load_clamps_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "volume = 3.0\nbass_db = -90.0\ncrossfade_seconds = -2.0\n").unwrap();

        let config = ConfigManager::load_config(&path).unwrap();
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.bass_db, MIN_BAND_DB);
        assert_eq!(config.crossfade_seconds, 0.0);
    }

    #[test]
    fn test_setters_persist() {
        let (mut manager, _temp_dir) = create_test_config_manager();
        manager.set_volume(1.7).unwrap();
        manager.set_band(EqBand::Treble, 4.0).unwrap();
        manager.set_crossfade_seconds(8.0).unwrap();
        manager.set_fade_curve(FadeCurve::Linear).unwrap();
        manager.set_preferred_device(Some("DAC".to_string())).unwrap();

        let reloaded = ConfigManager::with_path(manager.config_path().to_path_buf());
        let config = reloaded.get_config();
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.treble_db, 4.0);
        assert_eq!(config.crossfade_seconds, 8.0);
        assert_eq!(config.fade_curve, FadeCurve::Linear);
        assert_eq!(config.preferred_device.as_deref(), Some("DAC"));
    }

    #[test]
    fn test_update_and_reset() {
        let (mut manager, _temp_dir) = create_test_config_manager();
        manager.update_config(|c| c.mid_db = -3.0).unwrap();
        assert_eq!(manager.get_config().mid_db, -3.0);

        manager.reset_to_defaults().unwrap();
        assert_eq!(manager.get_config(), &PlayerConfig::default());
        assert!(manager.config_path().exists());
    }

    #[test]
    fn test_clamp_helpers() {
        assert_eq!(clamp_volume(f32::NAN), 0.0);
        assert_eq!(clamp_band_db(100.0), MAX_BAND_DB);
        assert_eq!(clamp_crossfade(f64::INFINITY), 0.0);
        assert_eq!(clamp_crossfade(120.0), MAX_CROSSFADE_SECONDS);
    }
}
