use std::sync::Arc;

use tracing::info;

use honkwatch_audio::{
    AlertSound, AudioRingBuffer, CaptureStats, CaptureThread, CpalSink, DeviceConfig, FrameReader,
    PlaybackWorker,
};
use honkwatch_detect::{AlertRateLimiter, BandEnergyDetector};
use honkwatch_foundation::{AppError, RealClock, SharedClock};
use honkwatch_telemetry::PipelineMetrics;

use crate::monitor::{HonkMonitor, MonitorHandle};
use crate::Settings;

/// Handle to the running monitoring pipeline.
pub struct AppHandle {
    pub metrics: Arc<PipelineMetrics>,
    pub capture_stats: Arc<CaptureStats>,
    pub device_config: DeviceConfig,

    monitor: MonitorHandle,
    capture: CaptureThread,
    playback: PlaybackWorker,
}

impl AppHandle {
    /// Gracefully stop the pipeline and wait for shutdown.
    pub async fn shutdown(self) {
        info!("Shutting down honkwatch pipeline...");

        // Stop audio capture first to quiesce the source.
        self.capture.stop();
        info!("Audio capture thread stopped");

        self.monitor.stop().await;

        // Queued alerts finish playing before the worker exits.
        self.playback.shutdown();
        info!("Alert playback worker stopped");

        info!("Pipeline shutdown complete");
    }
}

/// Start the capture, detection, and playback pipeline.
///
/// Fails when the alert sound cannot be loaded, no usable input device
/// exists, or the device does not offer the required format.
pub async fn start(settings: &Settings) -> Result<AppHandle, AppError> {
    // Metrics shared across components
    let metrics = Arc::new(PipelineMetrics::default());
    let clock: SharedClock = Arc::new(RealClock::new());

    // 1) Detector, built first so a bad analysis config fails startup
    let detector = BandEnergyDetector::new(settings.detector.clone())
        .map_err(|e| AppError::Config(e.to_string()))?;

    // 2) Alert sound, loaded up front rather than at first alert
    let alert_sound = AlertSound::load(&settings.alert.sound_path)?;
    info!(
        "Loaded alert sound: {} ({:.2}s at {} Hz)",
        settings.alert.sound_path.display(),
        alert_sound.duration().as_secs_f64(),
        alert_sound.sample_rate()
    );

    // 3) Audio capture feeding the ring buffer
    let capture_config = settings.capture_config();
    let dead_time = settings.dead_time();
    // Headroom for one dead-time pause plus a second of capture.
    let capacity = (capture_config.sample_rate_hz as usize
        * (dead_time.as_millis() as usize + 1000)
        / 1000)
        .max(capture_config.frame_size_samples * 64);
    let (producer, consumer) = AudioRingBuffer::new(capacity).split();
    let capture_stats = Arc::new(CaptureStats::default());
    let (capture, device_config) = CaptureThread::spawn(
        capture_config,
        producer,
        capture_stats.clone(),
        metrics.clone(),
    )?;

    // 4) Playback worker owning the output device
    let playback = PlaybackWorker::spawn(alert_sound, CpalSink, metrics.clone())?;

    // 5) Monitor task draining the ring
    let frame_reader = FrameReader::new(consumer, device_config.sample_rate);
    let limiter = AlertRateLimiter::new(settings.alert_policy());
    let monitor = HonkMonitor::new(
        frame_reader,
        detector,
        limiter,
        playback.command_sender(),
        metrics.clone(),
        clock,
        dead_time,
    )
    .spawn();

    Ok(AppHandle {
        metrics,
        capture_stats,
        device_config,
        monitor,
        capture,
        playback,
    })
}
