pub struct EnergyMeter {
    epsilon: f32,
}

impl EnergyMeter {
    pub fn new() -> Self {
        Self { epsilon: 1e-10 }
    }

    pub fn calculate_rms(&self, frame: &[f32]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }

        let sum_squares: f64 = frame
            .iter()
            .map(|&sample| {
                let s = sample as f64;
                s * s
            })
            .sum();

        let mean_square = sum_squares / frame.len() as f64;
        mean_square.sqrt() as f32
    }

    pub fn rms_to_dbfs(&self, rms: f32) -> f32 {
        if rms <= self.epsilon {
            return -100.0;
        }
        20.0 * rms.log10()
    }

    pub fn calculate_dbfs(&self, frame: &[f32]) -> f32 {
        let rms = self.calculate_rms(frame);
        self.rms_to_dbfs(rms)
    }
}

impl Default for EnergyMeter {
    fn default() -> Self {
        Self::new()
    }
}
