use serde::Deserialize;

use crate::DetectorError;

/// Detection parameters, fixed after startup.
///
/// The passband brackets the fundamental of a typical car horn; anything
/// outside it is attenuated before the energy check so traffic rumble and
/// speech do not trip the detector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub sample_rate_hz: u32,
    pub frame_size_samples: usize,
    pub passband_low_hz: f32,
    pub passband_high_hz: f32,
    pub filter_order: usize,
    pub rms_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100,
            frame_size_samples: 1024,
            passband_low_hz: 2_500.0,
            passband_high_hz: 4_000.0,
            filter_order: 4,
            rms_threshold: 0.3,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.sample_rate_hz == 0 {
            return Err(DetectorError::InvalidConfig(
                "sample_rate_hz must be positive".into(),
            ));
        }
        if self.frame_size_samples == 0 {
            return Err(DetectorError::InvalidConfig(
                "frame_size_samples must be positive".into(),
            ));
        }
        let nyquist = self.sample_rate_hz as f32 / 2.0;
        if !(self.passband_low_hz > 0.0
            && self.passband_low_hz < self.passband_high_hz
            && self.passband_high_hz < nyquist)
        {
            return Err(DetectorError::InvalidConfig(format!(
                "passband [{}, {}] Hz must satisfy 0 < low < high < {} (Nyquist)",
                self.passband_low_hz, self.passband_high_hz, nyquist
            )));
        }
        if self.filter_order == 0 || self.filter_order > 16 {
            return Err(DetectorError::InvalidConfig(format!(
                "filter_order {} outside supported range 1..=16",
                self.filter_order
            )));
        }
        if !self.rms_threshold.is_finite() || self.rms_threshold <= 0.0 {
            return Err(DetectorError::InvalidConfig(format!(
                "rms_threshold {} must be a positive number",
                self.rms_threshold
            )));
        }
        Ok(())
    }
}
