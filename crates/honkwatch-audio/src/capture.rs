use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::device::DeviceManager;
use crate::ring_buffer::AudioProducer;
use crate::watchdog::WatchdogTimer;
use honkwatch_foundation::AudioError;
use honkwatch_telemetry::PipelineMetrics;

const READY_TIMEOUT: Duration = Duration::from_secs(5);
const RESTART_BACKOFF_MIN: Duration = Duration::from_millis(200);
const RESTART_BACKOFF_MAX: Duration = Duration::from_secs(5);

/// What the capture stream must deliver. The detector is calibrated for one
/// exact format, so anything else is refused rather than converted.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub device: Option<String>,
    pub sample_rate_hz: u32,
    pub frame_size_samples: usize,
    pub watchdog_timeout: Duration,
}

/// Format actually negotiated with the device.
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Default)]
pub struct CaptureStats {
    pub buffers_captured: AtomicU64,
    pub buffers_dropped: AtomicU64,
    pub restarts: AtomicU64,
}

/// Handle to the dedicated capture thread.
pub struct CaptureThread {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl CaptureThread {
    /// Spawns the capture thread and waits for the first stream to come up.
    /// Device or format problems during that first start are returned here,
    /// so the caller can fail startup with the real cause. Later stream
    /// failures are handled inside the thread by restarting.
    pub fn spawn(
        config: CaptureConfig,
        producer: AudioProducer,
        stats: Arc<CaptureStats>,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<(Self, DeviceConfig), AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<DeviceConfig, AudioError>>(1);

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let mut session =
                    CaptureSession::new(config, producer, stats, metrics, thread_running.clone());

                match session.start() {
                    Ok(cfg) => {
                        let _ = ready_tx.send(Ok(cfg));
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                }

                session.run(thread_running);
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn audio thread: {}", e)))?;

        match ready_rx.recv_timeout(READY_TIMEOUT) {
            Ok(Ok(cfg)) => Ok((Self { handle, running }, cfg)),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(AudioError::Fatal(
                    "Capture thread did not report readiness in time".to_string(),
                ))
            }
        }
    }

    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

struct CaptureSession {
    config: CaptureConfig,
    device_manager: DeviceManager,
    stream: Option<Stream>,
    stream_running: Option<Arc<AtomicBool>>,
    producer: Arc<Mutex<AudioProducer>>,
    watchdog: WatchdogTimer,
    stats: Arc<CaptureStats>,
    metrics: Arc<PipelineMetrics>,
    running: Arc<AtomicBool>,
    restart_needed: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<AudioError>>>,
}

impl CaptureSession {
    fn new(
        config: CaptureConfig,
        producer: AudioProducer,
        stats: Arc<CaptureStats>,
        metrics: Arc<PipelineMetrics>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let watchdog = WatchdogTimer::new(config.watchdog_timeout);
        Self {
            config,
            device_manager: DeviceManager::new(),
            stream: None,
            stream_running: None,
            producer: Arc::new(Mutex::new(producer)),
            watchdog,
            stats,
            metrics,
            running,
            restart_needed: Arc::new(AtomicBool::new(false)),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Opens the device, negotiates the required format and starts the
    /// stream and its watchdog.
    fn start(&mut self) -> Result<DeviceConfig, AudioError> {
        let device = self.device_manager.open_input(self.config.device.as_deref())?;
        if let Ok(name) = device.name() {
            tracing::info!(
                "Selected input device: {} (host: {:?})",
                name,
                self.device_manager.host_id()
            );
        }

        let stream_config = self.negotiate_config(&device)?;
        let device_config = DeviceConfig {
            sample_rate: stream_config.sample_rate.0,
            channels: stream_config.channels,
        };

        let stream = self.build_stream(device, stream_config)?;
        stream.play()?;
        self.stream = Some(stream);

        let stream_running = Arc::new(AtomicBool::new(true));
        self.watchdog.start(Arc::clone(&stream_running));
        self.stream_running = Some(stream_running);

        Ok(device_config)
    }

    /// Monitors the stream until shutdown, restarting it when the watchdog
    /// fires or the stream reports an error. Restart failures back off and
    /// retry for as long as the monitor keeps running.
    fn run(&mut self, running: Arc<AtomicBool>) {
        let mut backoff = RESTART_BACKOFF_MIN;

        while running.load(Ordering::SeqCst) {
            if self.watchdog.is_triggered() || self.restart_needed.swap(false, Ordering::SeqCst) {
                if let Some(err) = self.last_error.lock().take() {
                    tracing::warn!("Capture stream error: {}", err);
                }
                tracing::warn!("Capture stream stalled; restarting");
                self.stats.restarts.fetch_add(1, Ordering::Relaxed);
                self.stop_stream();
            }

            if self.stream.is_none() {
                match self.start() {
                    Ok(cfg) => {
                        tracing::info!(
                            sample_rate = cfg.sample_rate,
                            channels = cfg.channels,
                            "Capture stream restarted"
                        );
                        backoff = RESTART_BACKOFF_MIN;
                    }
                    Err(e) => {
                        tracing::error!("Capture restart failed: {}", e);
                        thread::sleep(backoff);
                        backoff = (backoff * 2).min(RESTART_BACKOFF_MAX);
                    }
                }
            }

            thread::sleep(Duration::from_millis(100));
        }

        tracing::info!("Audio capture thread shutting down");
        self.stop_stream();
    }

    fn build_stream(
        &mut self,
        device: cpal::Device,
        config: StreamConfig,
    ) -> Result<Stream, AudioError> {
        let producer = Arc::clone(&self.producer);
        let stats = Arc::clone(&self.stats);
        let metrics = Arc::clone(&self.metrics);
        let watchdog = self.watchdog.clone();
        let running = Arc::clone(&self.running);
        let restart_needed = Arc::clone(&self.restart_needed);
        let last_error = Arc::clone(&self.last_error);

        let err_metrics = Arc::clone(&metrics);
        let err_fn = move |err: cpal::StreamError| {
            err_metrics.increment_capture_errors();
            *last_error.lock() = Some(AudioError::from(err));
            restart_needed.store(true, Ordering::SeqCst);
        };

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                watchdog.feed();

                match producer.lock().write(data) {
                    Ok(_) => {
                        stats.buffers_captured.fetch_add(1, Ordering::Relaxed);
                        metrics.increment_capture_buffers();
                    }
                    Err(err) => {
                        stats.buffers_dropped.fetch_add(1, Ordering::Relaxed);
                        if let AudioError::BufferOverflow { count } = err {
                            metrics.add_overflow_samples(count);
                        }
                    }
                }
            },
            err_fn,
            None,
        )?;

        Ok(stream)
    }

    /// Finds a supported config matching the required format exactly: f32
    /// samples, mono, at the configured rate. The device buffer size is
    /// pinned to one frame when the driver allows it; the frame reader
    /// reassembles exact frames either way.
    fn negotiate_config(&self, device: &cpal::Device) -> Result<StreamConfig, AudioError> {
        let required_rate = SampleRate(self.config.sample_rate_hz);

        let chosen = device.supported_input_configs()?.find(|range| {
            range.sample_format() == SampleFormat::F32
                && range.channels() == 1
                && range.min_sample_rate() <= required_rate
                && range.max_sample_rate() >= required_rate
        });

        let Some(range) = chosen else {
            return Err(AudioError::FormatNotSupported {
                format: format!("{} Hz mono f32 input", self.config.sample_rate_hz),
            });
        };

        let frame = self.config.frame_size_samples as u32;
        let buffer_size = match range.buffer_size() {
            cpal::SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frame) => {
                cpal::BufferSize::Fixed(frame)
            }
            _ => cpal::BufferSize::Default,
        };

        Ok(StreamConfig {
            channels: 1,
            sample_rate: required_rate,
            buffer_size,
        })
    }

    fn stop_stream(&mut self) {
        if let Some(flag) = self.stream_running.take() {
            flag.store(false, Ordering::SeqCst);
        }
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
        self.watchdog.stop();
        // Stale restart requests refer to the stream just torn down.
        self.restart_needed.store(false, Ordering::SeqCst);
    }
}
