pub mod alert;
pub mod capture;
pub mod device;
pub mod frame_reader;
pub mod playback;
pub mod ring_buffer;
pub mod watchdog;

// Public API
pub use alert::AlertSound;
pub use capture::{CaptureConfig, CaptureStats, CaptureThread, DeviceConfig};
pub use device::{DeviceManager, InputDeviceInfo};
pub use frame_reader::{AudioFrame, FrameReader};
pub use playback::{AlertSink, CpalSink, PlaybackCommand, PlaybackWorker};
pub use ring_buffer::{AudioConsumer, AudioProducer, AudioRingBuffer};
pub use watchdog::WatchdogTimer;
