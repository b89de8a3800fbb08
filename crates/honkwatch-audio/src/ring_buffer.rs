use honkwatch_foundation::AudioError;
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::warn;

/// Audio ring buffer using rtrb (real-time safe)
pub struct AudioRingBuffer {
    producer: Producer<f32>,
    consumer: Consumer<f32>,
}

impl AudioRingBuffer {
    /// Create a new ring buffer with the specified capacity in samples
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self { producer, consumer }
    }

    /// Split into producer and consumer for separate threads
    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        (
            AudioProducer {
                producer: self.producer,
            },
            AudioConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Producer half of the ring buffer (for audio callback thread)
pub struct AudioProducer {
    producer: Producer<f32>,
}

impl AudioProducer {
    /// Write samples from the audio callback (non-blocking). The write is
    /// all-or-nothing: on overflow the whole buffer is dropped and the
    /// dropped sample count is reported in the error.
    pub fn write(&mut self, samples: &[f32]) -> Result<usize, AudioError> {
        let mut chunk = match self.producer.write_chunk(samples.len()) {
            Ok(chunk) => chunk,
            Err(_) => {
                warn!(
                    "Ring buffer overflow: tried to write {} samples, buffer full",
                    samples.len()
                );
                return Err(AudioError::BufferOverflow {
                    count: samples.len(),
                });
            }
        };

        // Write may wrap; fill both slices
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        if split > 0 {
            first.copy_from_slice(&samples[..split]);
        }
        if !second.is_empty() {
            second.copy_from_slice(&samples[split..]);
        }
        chunk.commit_all();
        Ok(samples.len())
    }

    /// Check available space
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Consumer half of the ring buffer (for the monitor task)
pub struct AudioConsumer {
    consumer: Consumer<f32>,
}

impl AudioConsumer {
    /// Read available samples (non-blocking)
    pub fn read(&mut self, buffer: &mut [f32]) -> usize {
        let chunk = match self.consumer.read_chunk(buffer.len()) {
            Ok(chunk) => chunk,
            Err(rtrb::chunks::ChunkError::TooFewSlots(available)) => {
                if available == 0 {
                    return 0;
                }
                match self.consumer.read_chunk(available) {
                    Ok(chunk) => chunk,
                    Err(_) => return 0,
                }
            }
        };

        let len = chunk.len();
        let (first, second) = chunk.as_slices();
        let split = first.len();
        if split > 0 {
            buffer[..split].copy_from_slice(first);
        }
        if !second.is_empty() {
            buffer[split..split + second.len()].copy_from_slice(second);
        }
        chunk.commit_all();
        len
    }

    /// Check available samples to read
    pub fn slots(&self) -> usize {
        self.consumer.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_write_read() {
        let rb = AudioRingBuffer::new(1024);
        let (mut producer, mut consumer) = rb.split();

        let samples = vec![0.1f32, 0.2, 0.3, 0.4, 0.5];
        assert_eq!(producer.write(&samples).unwrap(), 5);

        let mut buffer = vec![0.0f32; 10];
        let read = consumer.read(&mut buffer);

        assert_eq!(read, 5);
        assert_eq!(&buffer[..5], &[0.1, 0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn test_overflow_reports_dropped_count() {
        let rb = AudioRingBuffer::new(16);
        let (mut producer, mut _consumer) = rb.split();

        let samples = vec![0.5f32; 20];
        match producer.write(&samples) {
            Err(AudioError::BufferOverflow { count }) => assert_eq!(count, 20),
            other => panic!("expected overflow, got {:?}", other),
        }

        let samples = vec![0.5f32; 16];
        assert!(producer.write(&samples).is_ok());

        let samples = vec![0.5f32; 1];
        assert!(producer.write(&samples).is_err());
    }

    #[test]
    fn test_wrapping_write_preserves_order() {
        let rb = AudioRingBuffer::new(8);
        let (mut producer, mut consumer) = rb.split();

        // Fill, drain half, then write across the wrap point.
        producer.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mut buffer = vec![0.0f32; 4];
        assert_eq!(consumer.read(&mut buffer), 4);

        producer.write(&[7.0, 8.0, 9.0, 10.0]).unwrap();
        let mut buffer = vec![0.0f32; 8];
        let read = consumer.read(&mut buffer);
        assert_eq!(read, 6);
        assert_eq!(&buffer[..6], &[5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
    }
}
