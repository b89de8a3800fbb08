//! Detection loop joining capture frames to alert decisions.

use crossbeam_channel::Sender;
use honkwatch_audio::{FrameReader, PlaybackCommand};
use honkwatch_detect::{AlertDecision, AlertRateLimiter, BandEnergyDetector};
use honkwatch_foundation::SharedClock;
use honkwatch_telemetry::{PipelineMetrics, RateTracker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Polling interval while the ring buffer has no complete frame.
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Pulls frames from the capture ring, runs honk detection, and queues
/// alert playback. Runs as a tokio task; the capture thread never waits
/// on it.
pub struct HonkMonitor {
    frame_reader: FrameReader,
    detector: BandEnergyDetector,
    limiter: AlertRateLimiter,
    playback_tx: Sender<PlaybackCommand>,
    metrics: Arc<PipelineMetrics>,
    clock: SharedClock,
    dead_time: Duration,
    frame_size: usize,
    fps: RateTracker,
}

impl HonkMonitor {
    pub fn new(
        frame_reader: FrameReader,
        detector: BandEnergyDetector,
        limiter: AlertRateLimiter,
        playback_tx: Sender<PlaybackCommand>,
        metrics: Arc<PipelineMetrics>,
        clock: SharedClock,
        dead_time: Duration,
    ) -> Self {
        let frame_size = detector.config().frame_size_samples;
        Self {
            frame_reader,
            detector,
            limiter,
            playback_tx,
            metrics,
            clock,
            dead_time,
            frame_size,
            fps: RateTracker::new(),
        }
    }

    /// Analyze one frame. Returns the alert decision when a honk was
    /// detected, `None` otherwise.
    fn handle_frame(&mut self, samples: &[f32]) -> Option<AlertDecision> {
        self.metrics.update_audio_level(samples);
        self.metrics.increment_detector_frames();

        match self.detector.detect(samples) {
            Ok(true) => {
                let now = self.clock.now();
                self.metrics.record_detection(now);
                let decision = self.limiter.evaluate(now);
                match decision {
                    AlertDecision::Fire { count, max } => {
                        info!("Honk detected! Alert {}/{}", count, max);
                        self.metrics.increment_alerts_fired();
                        if self.playback_tx.send(PlaybackCommand::Play).is_err() {
                            warn!("Alert playback worker unavailable; alert dropped");
                        }
                    }
                    AlertDecision::Suppress { reset_after } => {
                        info!(
                            "Honk detected, alert suppressed; {}s of quiet resets the limit",
                            reset_after.as_secs()
                        );
                        self.metrics.increment_alerts_suppressed();
                    }
                }
                Some(decision)
            }
            Ok(false) => None,
            Err(e) => {
                error!("Dropping frame: {}", e);
                None
            }
        }
    }

    async fn run(mut self, running: Arc<AtomicBool>, stop: Arc<Notify>) {
        info!(
            "Honk monitor started: {} sample frames at {} Hz",
            self.frame_size,
            self.frame_reader.sample_rate()
        );

        while running.load(Ordering::Relaxed) {
            let frame = match self.frame_reader.read_frame(self.frame_size) {
                Some(frame) => frame,
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                        _ = stop.notified() => {}
                    }
                    continue;
                }
            };

            if let Some(fps) = self.fps.tick() {
                self.metrics.update_detector_fps(fps);
            }

            // Dead time after any detection, fired or suppressed, so a
            // single sustained honk does not retrigger every frame.
            if self.handle_frame(&frame.samples).is_some() && !self.dead_time.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.dead_time) => {}
                    _ = stop.notified() => {}
                }
            }
        }

        info!("Honk monitor stopped");
    }

    /// Spawn the monitor loop onto the current tokio runtime.
    pub fn spawn(self) -> MonitorHandle {
        let running = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(Notify::new());
        let task = tokio::spawn(self.run(running.clone(), stop.clone()));
        MonitorHandle {
            task,
            running,
            stop,
        }
    }
}

pub struct MonitorHandle {
    task: tokio::task::JoinHandle<()>,
    running: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

impl MonitorHandle {
    /// Stop the loop and wait for it to finish the frame in flight.
    pub async fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        self.stop.notify_one();
        let _ = self.task.await;
    }
}
