use clap::Parser;
use honkwatch_app::{runtime, Settings};
use honkwatch_audio::DeviceManager;
use honkwatch_foundation::{AppError, AppState, ShutdownHandler, StateManager};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[derive(Parser)]
#[command(name = "honkwatch")]
#[command(about = "Listens for vehicle horns and plays an audible alert")]
struct Cli {
    /// Path to a TOML config file (defaults to config/default.toml)
    #[arg(short, long, env = "HONKWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Audio input device name
    #[arg(short = 'D', long, env = "HONKWATCH_DEVICE")]
    device: Option<String>,

    /// WAV file played when an alert fires
    #[arg(long, env = "HONKWATCH_ALERT_SOUND")]
    alert_sound: Option<PathBuf>,

    /// RMS detection threshold override
    #[arg(long)]
    threshold: Option<f32>,

    /// List audio input devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "honkwatch.log");
    let (non_blocking_file, _guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(_guard);
    Ok(())
}

fn print_input_devices() {
    let manager = DeviceManager::new();
    let devices = manager.list_inputs();
    if devices.is_empty() {
        println!("No input devices found.");
        return;
    }
    for device in devices {
        if device.is_default {
            println!("{} (default)", device.name);
        } else {
            println!("{}", device.name);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.list_devices {
        print_input_devices();
        return Ok(());
    }

    init_logging()?;
    tracing::info!("Starting honkwatch");

    let mut settings = match &cli.config {
        Some(path) => Settings::from_path(path),
        None => Settings::new(),
    }
    .map_err(AppError::Config)?;

    // CLI flags override file and environment settings.
    if let Some(device) = cli.device {
        settings.audio.device = Some(device);
    }
    if let Some(path) = cli.alert_sound {
        settings.alert.sound_path = path;
    }
    if let Some(threshold) = cli.threshold {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(AppError::Config(format!(
                "threshold must be a positive number, got {}",
                threshold
            ))
            .into());
        }
        settings.detector.rms_threshold = threshold;
    }

    let state_manager = StateManager::new();
    let shutdown = ShutdownHandler::new().install().await;

    tracing::info!(
        "Listening for honks in [{:.0}, {:.0}] Hz, RMS threshold {:.2}",
        settings.detector.passband_low_hz,
        settings.detector.passband_high_hz,
        settings.detector.rms_threshold,
    );
    tracing::info!(
        "Alert policy: max {} consecutive, {}s cooldown, {}ms dead time",
        settings.alert.max_consecutive,
        settings.alert.cooldown_secs,
        settings.alert.dead_time_ms,
    );

    let app = runtime::start(&settings).await?;
    state_manager.transition(AppState::Running)?;
    tracing::info!(
        "Capture running: {} Hz, {} channel(s)",
        app.device_config.sample_rate,
        app.device_config.channels
    );

    // --- Main Application Loop ---
    let mut stats_interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = stats_interval.tick() => {
                tracing::info!(
                    buffers = app.metrics.capture_buffers.load(Ordering::Relaxed),
                    overflow_samples = app.metrics.capture_overflow_samples.load(Ordering::Relaxed),
                    frames = app.metrics.detector_frames.load(Ordering::Relaxed),
                    fps = app.metrics.detector_fps.load(Ordering::Relaxed) as f64 / 10.0,
                    detections = app.metrics.detections.load(Ordering::Relaxed),
                    fired = app.metrics.alerts_fired.load(Ordering::Relaxed),
                    suppressed = app.metrics.alerts_suppressed.load(Ordering::Relaxed),
                    level_db = app.metrics.audio_level_db.load(Ordering::Relaxed) as f64 / 10.0,
                    restarts = app.capture_stats.restarts.load(Ordering::Relaxed),
                    "Pipeline status"
                );
            }
        }
    }

    // --- Graceful Shutdown ---
    tracing::info!("Beginning graceful shutdown");
    state_manager.transition(AppState::Draining)?;
    app.shutdown().await;
    state_manager.transition(AppState::Stopped)?;
    tracing::info!("Shutdown complete");

    Ok(())
}
