use honkwatch_app::Settings;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

fn write_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("honkwatch.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn default_settings_match_documented_constants() {
    let settings = Settings::default();
    assert_eq!(settings.detector.sample_rate_hz, 44_100);
    assert_eq!(settings.detector.frame_size_samples, 1024);
    assert_eq!(settings.detector.passband_low_hz, 2_500.0);
    assert_eq!(settings.detector.passband_high_hz, 4_000.0);
    assert_eq!(settings.detector.filter_order, 4);
    assert_eq!(settings.detector.rms_threshold, 0.3);
    assert_eq!(settings.alert.sound_path.to_str(), Some("alert.wav"));
    assert_eq!(settings.alert.max_consecutive, 2);
    assert_eq!(settings.alert.cooldown_secs, 10);
    assert_eq!(settings.alert.dead_time_ms, 1000);
    assert_eq!(settings.audio.device, None);
    assert_eq!(settings.audio.watchdog_timeout_secs, 5);
}

#[test]
fn file_values_override_defaults() {
    let (_dir, path) = write_config(
        r#"
[detector]
rms_threshold = 0.5
passband_low_hz = 2000.0

[alert]
sound_path = "sounds/horn.wav"
cooldown_secs = 30

[audio]
device = "USB Microphone"
"#,
    );

    let settings = Settings::from_path(&path).unwrap();
    assert_eq!(settings.detector.rms_threshold, 0.5);
    assert_eq!(settings.detector.passband_low_hz, 2000.0);
    assert_eq!(settings.alert.sound_path.to_str(), Some("sounds/horn.wav"));
    assert_eq!(settings.alert.cooldown_secs, 30);
    assert_eq!(settings.audio.device.as_deref(), Some("USB Microphone"));

    // Unset fields keep their defaults.
    assert_eq!(settings.detector.passband_high_hz, 4000.0);
    assert_eq!(settings.alert.dead_time_ms, 1000);
}

#[test]
fn environment_overrides_file_values() {
    let (_dir, path) = write_config("[alert]\nmax_consecutive = 3\n");
    env::set_var("HONKWATCH_ALERT__MAX_CONSECUTIVE", "4");
    let result = Settings::from_path(&path);
    env::remove_var("HONKWATCH_ALERT__MAX_CONSECUTIVE");
    assert_eq!(result.unwrap().alert.max_consecutive, 4);
}

#[test]
fn missing_config_file_is_an_error() {
    let result = Settings::from_path("does/not/exist.toml");
    assert!(result.is_err());
}

#[test]
fn zero_cooldown_is_rejected() {
    let mut settings = Settings::default();
    settings.alert.cooldown_secs = 0;
    let result = settings.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("cooldown_secs"));
}

#[test]
fn passband_above_nyquist_is_rejected() {
    let mut settings = Settings::default();
    settings.detector.passband_high_hz = 30_000.0;
    let result = settings.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Nyquist"));
}

#[test]
fn empty_sound_path_is_rejected() {
    let mut settings = Settings::default();
    settings.alert.sound_path = PathBuf::new();
    let result = settings.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("sound_path"));
}

#[test]
fn zero_max_consecutive_clamps_to_one() {
    let mut settings = Settings::default();
    settings.alert.max_consecutive = 0;
    assert!(settings.validate().is_ok());
    assert_eq!(settings.alert.max_consecutive, 1);
}

#[test]
fn helper_conversions_use_configured_values() {
    let settings = Settings::default();

    let policy = settings.alert_policy();
    assert_eq!(policy.max_consecutive, 2);
    assert_eq!(policy.cooldown, Duration::from_secs(10));

    let capture = settings.capture_config();
    assert_eq!(capture.sample_rate_hz, 44_100);
    assert_eq!(capture.frame_size_samples, 1024);
    assert_eq!(capture.watchdog_timeout, Duration::from_secs(5));

    assert_eq!(settings.dead_time(), Duration::from_millis(1000));
}
