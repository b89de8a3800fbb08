use config::{Config, Environment, File};
use honkwatch_audio::CaptureConfig;
use honkwatch_detect::{AlertPolicy, DetectorConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Input device name; `None` selects the system default.
    pub device: Option<String>,
    /// Seconds without captured audio before the stream is restarted.
    pub watchdog_timeout_secs: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        AudioSettings {
            device: None,
            watchdog_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// WAV file played when a honk fires an alert.
    pub sound_path: PathBuf,
    /// Alerts allowed before further detections are suppressed.
    pub max_consecutive: u32,
    /// Quiet seconds required before the alert counter resets.
    pub cooldown_secs: u64,
    /// Pause after each detection before analysis resumes.
    pub dead_time_ms: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        AlertSettings {
            sound_path: PathBuf::from("alert.wav"),
            max_consecutive: 2,
            cooldown_secs: 10,
            dead_time_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub detector: DetectorConfig,
    pub alert: AlertSettings,
}

impl Settings {
    /// Load settings from a specific config file path (for tests)
    pub fn from_path(config_path: impl AsRef<Path>) -> Result<Self, String> {
        let mut builder = Config::builder();

        // Add the specific file source.
        builder = builder.add_source(File::from(config_path.as_ref()).required(true));

        // Add environment variables, which will override the file's settings.
        builder = builder.add_source(
            Environment::with_prefix("HONKWATCH")
                .separator("__")
                .try_parsing(true),
        );

        // Build and deserialize
        let config = builder
            .build()
            .map_err(|e| format!("Failed to build config: {}", e))?;

        let mut settings: Settings = config
            .try_deserialize()
            .map_err(|e| format!("Failed to deserialize settings: {}", e))?;

        // Validate the final settings
        settings.validate()?;

        Ok(settings)
    }

    pub fn new() -> Result<Self, String> {
        let mut builder = Config::builder();

        // Find and add config file source.
        let config_path = Path::new("config/default.toml");
        if config_path.exists() {
            tracing::info!("Loading configuration from: {}", config_path.display());
            builder = builder.add_source(File::from(config_path).required(true));
        } else {
            tracing::warn!(
                "No configuration file at 'config/default.toml'. Using defaults and environment variables."
            );
        }

        // Add environment variables, which will override the file's settings.
        builder = builder.add_source(
            Environment::with_prefix("HONKWATCH")
                .separator("__")
                .try_parsing(true),
        );

        // Build and deserialize
        let config = builder
            .build()
            .map_err(|e| format!("Failed to build config: {}", e))?;

        let mut settings: Settings = config
            .try_deserialize()
            .map_err(|e| format!("Failed to deserialize settings: {}", e))?;

        // Validate the final settings
        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&mut self) -> Result<(), String> {
        let mut errors = Vec::new();

        // Validate detector settings
        if let Err(e) = self.detector.validate() {
            errors.push(e.to_string());
        }

        // Validate audio settings
        if self.audio.watchdog_timeout_secs == 0 {
            errors.push("Audio watchdog_timeout_secs must be >0".to_string());
        }

        // Validate alert settings
        if self.alert.sound_path.as_os_str().is_empty() {
            errors.push("Alert sound_path must not be empty".to_string());
        }
        if self.alert.cooldown_secs == 0 {
            errors.push("Alert cooldown_secs must be >0".to_string());
        }
        if self.alert.max_consecutive == 0 {
            tracing::warn!("Invalid max_consecutive 0. Clamping to 1.");
            self.alert.max_consecutive = 1;
        }

        if !errors.is_empty() {
            let error_msg = format!("Critical config validation errors: {:?}", errors);
            return Err(error_msg);
        }

        tracing::info!("Configuration validation completed successfully.");

        Ok(())
    }

    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy {
            max_consecutive: self.alert.max_consecutive,
            cooldown: Duration::from_secs(self.alert.cooldown_secs),
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            device: self.audio.device.clone(),
            sample_rate_hz: self.detector.sample_rate_hz,
            frame_size_samples: self.detector.frame_size_samples,
            watchdog_timeout: Duration::from_secs(self.audio.watchdog_timeout_secs),
        }
    }

    pub fn dead_time(&self) -> Duration {
        Duration::from_millis(self.alert.dead_time_ms)
    }
}

pub mod monitor;
pub mod runtime;
