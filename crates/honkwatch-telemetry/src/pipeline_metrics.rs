use parking_lot::RwLock;
use std::sync::atomic::{AtomicI16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared metrics for cross-thread pipeline monitoring.
///
/// Every field is an `Arc`ed atomic so the capture callback, the monitor
/// task and the playback worker can all update counters without locks. The
/// main loop reads them for the periodic status line.
#[derive(Clone)]
pub struct PipelineMetrics {
    // Audio level monitoring
    pub current_peak_milli: Arc<AtomicU64>, // |peak| * 1000 of the raw frame
    pub current_rms_milli: Arc<AtomicU64>,  // raw RMS * 1000
    pub audio_level_db: Arc<AtomicI16>,     // dBFS * 10

    // Capture stage
    pub capture_buffers: Arc<AtomicU64>, // callback buffers written to the ring
    pub capture_overflow_samples: Arc<AtomicU64>,
    pub capture_errors: Arc<AtomicU64>,

    // Detector stage
    pub detector_frames: Arc<AtomicU64>,
    pub detector_fps: Arc<AtomicU64>, // frames per second * 10
    pub detections: Arc<AtomicU64>,
    pub last_detection: Arc<RwLock<Option<Instant>>>,

    // Alert stage
    pub alerts_fired: Arc<AtomicU64>,
    pub alerts_suppressed: Arc<AtomicU64>,

    // Playback stage
    pub playback_completed: Arc<AtomicU64>,
    pub playback_errors: Arc<AtomicU64>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            current_peak_milli: Arc::new(AtomicU64::new(0)),
            current_rms_milli: Arc::new(AtomicU64::new(0)),
            audio_level_db: Arc::new(AtomicI16::new(-900)),

            capture_buffers: Arc::new(AtomicU64::new(0)),
            capture_overflow_samples: Arc::new(AtomicU64::new(0)),
            capture_errors: Arc::new(AtomicU64::new(0)),

            detector_frames: Arc::new(AtomicU64::new(0)),
            detector_fps: Arc::new(AtomicU64::new(0)),
            detections: Arc::new(AtomicU64::new(0)),
            last_detection: Arc::new(RwLock::new(None)),

            alerts_fired: Arc::new(AtomicU64::new(0)),
            alerts_suppressed: Arc::new(AtomicU64::new(0)),

            playback_completed: Arc::new(AtomicU64::new(0)),
            playback_errors: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl PipelineMetrics {
    pub fn update_audio_level(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
        self.current_peak_milli
            .store((peak as f64 * 1000.0) as u64, Ordering::Relaxed);

        let sum: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
        let rms = (sum / samples.len() as f64).sqrt();
        self.current_rms_milli
            .store((rms * 1000.0) as u64, Ordering::Relaxed);

        let db = if peak > 0.0 {
            (20.0 * (peak as f64).log10() * 10.0) as i16
        } else {
            -900
        };
        self.audio_level_db.store(db.max(-900), Ordering::Relaxed);
    }

    pub fn increment_capture_buffers(&self) {
        self.capture_buffers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_overflow_samples(&self, count: usize) {
        self.capture_overflow_samples
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn increment_capture_errors(&self) {
        self.capture_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_detector_frames(&self) {
        self.detector_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_detector_fps(&self, fps: f64) {
        self.detector_fps.store((fps * 10.0) as u64, Ordering::Relaxed);
    }

    pub fn record_detection(&self, at: Instant) {
        self.detections.fetch_add(1, Ordering::Relaxed);
        *self.last_detection.write() = Some(at);
    }

    pub fn increment_alerts_fired(&self) {
        self.alerts_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_alerts_suppressed(&self) {
        self.alerts_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_playback_completed(&self) {
        self.playback_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_playback_errors(&self) {
        self.playback_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counts events and reports a rate roughly once per second.
#[derive(Debug)]
pub struct RateTracker {
    last_update: Instant,
    event_count: u64,
}

impl RateTracker {
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            event_count: 0,
        }
    }

    pub fn tick(&mut self) -> Option<f64> {
        self.event_count += 1;
        let elapsed = self.last_update.elapsed();

        if elapsed >= Duration::from_secs(1) {
            let rate = self.event_count as f64 / elapsed.as_secs_f64();
            self.last_update = Instant::now();
            self.event_count = 0;
            Some(rate)
        } else {
            None
        }
    }
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new()
    }
}
