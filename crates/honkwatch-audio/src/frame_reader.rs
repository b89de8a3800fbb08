use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::ring_buffer::AudioConsumer;

/// One analysis frame. Always exactly the frame size requested from
/// [`FrameReader::read_frame`], mono.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub timestamp: Instant,
}

/// Drains the capture ring buffer and reassembles fixed-size frames.
///
/// The capture callback delivers whatever buffer size the device uses, so
/// samples are staged until a full frame is available. Timestamps are
/// reconstructed from the emitted sample count rather than wall-clock reads,
/// so consecutive frames are spaced exactly one frame apart.
pub struct FrameReader {
    consumer: AudioConsumer,
    sample_rate: u32,
    pending: VecDeque<f32>,
    samples_emitted: u64,
    start_time: Instant,
}

impl FrameReader {
    pub fn new(consumer: AudioConsumer, sample_rate: u32) -> Self {
        Self {
            consumer,
            sample_rate,
            pending: VecDeque::new(),
            samples_emitted: 0,
            start_time: Instant::now(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Read the next full frame, or `None` if fewer than `frame_size`
    /// samples have been captured so far.
    pub fn read_frame(&mut self, frame_size: usize) -> Option<AudioFrame> {
        if frame_size == 0 {
            return None;
        }

        if self.pending.len() < frame_size {
            let want = frame_size - self.pending.len();
            let mut buffer = vec![0.0f32; want];
            let read = self.consumer.read(&mut buffer);
            self.pending.extend(&buffer[..read]);
        }

        if self.pending.len() < frame_size {
            return None;
        }

        let samples: Vec<f32> = self.pending.drain(..frame_size).collect();

        let elapsed_ms = (self.samples_emitted * 1000) / self.sample_rate as u64;
        let timestamp = self.start_time + Duration::from_millis(elapsed_ms);
        self.samples_emitted += frame_size as u64;

        Some(AudioFrame {
            samples,
            sample_rate: self.sample_rate,
            timestamp,
        })
    }

    /// Samples currently staged plus waiting in the ring buffer.
    pub fn available_samples(&self) -> usize {
        self.pending.len() + self.consumer.slots()
    }
}
