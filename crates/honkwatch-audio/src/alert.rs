use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use honkwatch_foundation::AppError;

/// The alert clip, decoded once at startup and shared with the playback
/// worker. Stored as mono f32; multi-channel files are downmixed by
/// averaging.
#[derive(Debug, Clone)]
pub struct AlertSound {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AlertSound {
    /// Decodes a WAV file. Integer and float sample formats are accepted;
    /// anything unreadable is a startup error.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let mut reader = hound::WavReader::open(path)
            .map_err(|e| AppError::AlertSound(format!("{}: {}", path.display(), e)))?;
        let spec = reader.spec();

        if spec.sample_rate == 0 {
            return Err(AppError::AlertSound(format!(
                "{}: invalid sample rate in header",
                path.display()
            )));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| AppError::AlertSound(format!("{}: {}", path.display(), e)))?,
            hound::SampleFormat::Int => {
                let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| AppError::AlertSound(format!("{}: {}", path.display(), e)))?
            }
        };

        let channels = spec.channels as usize;
        let samples: Vec<f32> = if channels <= 1 {
            interleaved
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        if samples.is_empty() {
            return Err(AppError::AlertSound(format!(
                "{}: contains no samples",
                path.display()
            )));
        }

        Ok(Self {
            samples: samples.into(),
            sample_rate: spec.sample_rate,
        })
    }

    pub fn samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_wav(path: &Path, spec: hound::WavSpec, frames: &[&[f32]]) {
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &sample in *frame {
                match spec.sample_format {
                    hound::SampleFormat::Float => writer.write_sample(sample).unwrap(),
                    hound::SampleFormat::Int => writer
                        .write_sample((sample * 32767.0).round() as i16)
                        .unwrap(),
                }
            }
        }
        writer.finalize().unwrap();
    }

    fn int_spec(channels: u16) -> hound::WavSpec {
        hound::WavSpec {
            channels,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    #[test]
    fn loads_mono_int16() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alert.wav");
        write_wav(&path, int_spec(1), &[&[0.0], &[0.5], &[-0.5]]);

        let sound = AlertSound::load(&path).unwrap();
        assert_eq!(sound.sample_rate(), 44_100);
        let samples = sound.samples();
        assert_eq!(samples.len(), 3);
        assert!((samples[1] - 0.5).abs() < 0.001);
        assert!((samples[2] + 0.5).abs() < 0.001);
    }

    #[test]
    fn loads_float_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alert.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        write_wav(&path, spec, &[&[0.25], &[-0.75]]);

        let sound = AlertSound::load(&path).unwrap();
        assert_eq!(sound.sample_rate(), 22_050);
        let samples = sound.samples();
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.25).abs() < 1e-6);
        assert!((samples[1] + 0.75).abs() < 1e-6);
    }

    #[test]
    fn stereo_is_downmixed_by_averaging() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alert.wav");
        write_wav(&path, int_spec(2), &[&[0.5, -0.5], &[0.25, 0.75]]);

        let sound = AlertSound::load(&path).unwrap();
        let samples = sound.samples();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].abs() < 0.001);
        assert!((samples[1] - 0.5).abs() < 0.001);
    }

    #[test]
    fn duration_matches_sample_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alert.wav");
        let half_second = vec![0.1f32; 22_050];
        let frames: Vec<&[f32]> = half_second.chunks(1).collect();
        write_wav(&path, int_spec(1), &frames);

        let sound = AlertSound::load(&path).unwrap();
        let duration = sound.duration();
        assert!((duration.as_secs_f64() - 0.5).abs() < 0.001);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.wav");
        let err = AlertSound::load(&path).unwrap_err();
        assert!(matches!(err, AppError::AlertSound(_)));
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, int_spec(1), &[]);
        assert!(AlertSound::load(&path).is_err());
    }
}
