use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::alert::AlertSound;
use honkwatch_foundation::AudioError;
use honkwatch_telemetry::PipelineMetrics;

/// Commands accepted by the playback worker. `Shutdown` is the sentinel:
/// queued plays ahead of it still complete, then the worker exits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackCommand {
    Play,
    Shutdown,
}

/// Something that can render the alert clip to completion. The production
/// implementation opens an OS output stream; tests substitute their own.
pub trait AlertSink: Send {
    fn play(&mut self, sound: &AlertSound) -> Result<(), AudioError>;
}

/// Plays the alert through the default output device. A fresh stream is
/// opened per alert and dropped when the clip finishes, so the device is
/// only held while an alert is audible.
pub struct CpalSink;

impl AlertSink for CpalSink {
    fn play(&mut self, sound: &AlertSound) -> Result<(), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::DeviceNotFound { name: None })?;

        let clip_rate = SampleRate(sound.sample_rate());
        let range = device
            .supported_output_configs()?
            .find(|range| {
                range.sample_format() == SampleFormat::F32
                    && range.min_sample_rate() <= clip_rate
                    && range.max_sample_rate() >= clip_rate
            })
            .ok_or_else(|| {
                AudioError::PlaybackFailed(format!(
                    "no f32 output config at {} Hz",
                    sound.sample_rate()
                ))
            })?;

        let config = cpal::StreamConfig {
            channels: range.channels(),
            sample_rate: clip_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let channels = config.channels as usize;
        let samples = sound.samples();
        let total = samples.len();
        let mut pos = 0usize;
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let failed = Arc::new(AtomicBool::new(false));
        let err_flag = Arc::clone(&failed);
        let err_fn = move |err: cpal::StreamError| {
            tracing::warn!("Alert output stream error: {}", err);
            err_flag.store(true, Ordering::SeqCst);
        };

        let stream = device.build_output_stream(
            &config,
            move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in out.chunks_mut(channels) {
                    // Mono clip duplicated across all output channels,
                    // silence once it runs out.
                    let sample = samples.get(pos).copied().unwrap_or(0.0);
                    for slot in frame.iter_mut() {
                        *slot = sample;
                    }
                    pos = pos.saturating_add(1);
                }
                if pos >= total {
                    let _ = done_tx.try_send(());
                }
            },
            err_fn,
            None,
        )?;

        stream.play()?;

        // Block until the clip has been rendered. The timeout covers
        // devices that stall without reporting an error.
        let timeout = sound.duration() + Duration::from_millis(500);
        let _ = done_rx.recv_timeout(timeout);
        drop(stream);

        if failed.load(Ordering::SeqCst) {
            return Err(AudioError::PlaybackFailed(
                "output stream error during alert".to_string(),
            ));
        }
        Ok(())
    }
}

/// Owns the playback thread. Alerts are queued and played one at a time in
/// request order; a failed playback is logged and the worker keeps serving
/// the queue.
pub struct PlaybackWorker {
    tx: Sender<PlaybackCommand>,
    handle: JoinHandle<()>,
}

impl PlaybackWorker {
    pub fn spawn<S>(
        sound: AlertSound,
        sink: S,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<Self, AudioError>
    where
        S: AlertSink + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded::<PlaybackCommand>();

        let handle = thread::Builder::new()
            .name("alert-playback".to_string())
            .spawn(move || run_worker(rx, sound, sink, metrics))
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn playback thread: {}", e)))?;

        Ok(Self { tx, handle })
    }

    /// Queues one alert without blocking. The caller never waits on audio
    /// output.
    pub fn request_play(&self) {
        if self.tx.send(PlaybackCommand::Play).is_err() {
            tracing::warn!("Alert playback worker unavailable; alert dropped");
        }
    }

    /// Cloneable sender for components that queue alerts but do not own
    /// the worker.
    pub fn command_sender(&self) -> Sender<PlaybackCommand> {
        self.tx.clone()
    }

    /// Alerts queued but not yet played.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }

    /// Sends the shutdown sentinel and joins the worker. Alerts already
    /// queued finish playing first.
    pub fn shutdown(self) {
        let _ = self.tx.send(PlaybackCommand::Shutdown);
        let _ = self.handle.join();
    }
}

fn run_worker<S: AlertSink>(
    rx: Receiver<PlaybackCommand>,
    sound: AlertSound,
    mut sink: S,
    metrics: Arc<PipelineMetrics>,
) {
    loop {
        match rx.recv() {
            Ok(PlaybackCommand::Play) => match sink.play(&sound) {
                Ok(()) => {
                    metrics.increment_playback_completed();
                    tracing::debug!("Alert playback finished");
                }
                Err(e) => {
                    metrics.increment_playback_errors();
                    tracing::error!("Alert playback failed: {}", e);
                }
            },
            // A closed channel means every handle is gone; treat it like
            // the sentinel.
            Ok(PlaybackCommand::Shutdown) | Err(_) => break,
        }
    }
    tracing::debug!("Alert playback worker stopped");
}
