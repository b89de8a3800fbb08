use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Alert sound error: {0}")]
    AlertSound(String),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Buffer overflow, dropped {count} samples")]
    BufferOverflow { count: usize },

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Stream error: {0}")]
    Stream(#[from] cpal::StreamError),

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Supported stream configs error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_errors_convert_into_app_errors() {
        let err: AppError = AudioError::DeviceNotFound {
            name: Some("hw:1,0".into()),
        }
        .into();
        assert!(matches!(err, AppError::Audio(AudioError::DeviceNotFound { .. })));
        assert!(err.to_string().contains("hw:1,0"));
    }

    #[test]
    fn overflow_message_carries_dropped_count() {
        let err = AudioError::BufferOverflow { count: 1024 };
        assert!(err.to_string().contains("1024"));
    }
}
