//! Butterworth bandpass filter, designed once at startup and applied per
//! frame.
//!
//! The design is the textbook digital IIR recipe: prewarp the band edges,
//! place the analog lowpass prototype poles, apply the lowpass-to-bandpass
//! transform, map to the z-plane with the bilinear transform, and pair the
//! resulting poles into second-order sections. Coefficients and filter state
//! are kept in f64; input and output are the pipeline's f32 samples.
//!
//! Each [`BandpassFilter::apply`] call starts from zeroed section state, so
//! frames are filtered independently. At 1024-sample frames the edge
//! transient is a negligible fraction of the frame.

use std::f64::consts::PI;

use crate::DetectorError;

/// One denominator pair of the cascade. All numerators are `[1, 0, -1]`
/// (a zero at DC and a zero at Nyquist), with the overall gain applied to
/// the input once.
#[derive(Debug, Clone, Copy)]
struct Biquad {
    a1: f64,
    a2: f64,
}

#[derive(Debug, Clone)]
pub struct BandpassFilter {
    sections: Vec<Biquad>,
    gain: f64,
}

impl BandpassFilter {
    /// Designs an order-`order` Butterworth bandpass for the given passband.
    /// The digital filter has `2 * order` poles.
    pub fn design(
        order: usize,
        low_hz: f32,
        high_hz: f32,
        sample_rate_hz: u32,
    ) -> Result<Self, DetectorError> {
        let fs = sample_rate_hz as f64;
        let low = low_hz as f64;
        let high = high_hz as f64;

        if order == 0 || order > 16 {
            return Err(DetectorError::InvalidConfig(format!(
                "filter_order {} outside supported range 1..=16",
                order
            )));
        }
        if !(low > 0.0 && low < high && high < fs / 2.0) {
            return Err(DetectorError::InvalidConfig(format!(
                "passband [{}, {}] Hz must satisfy 0 < low < high < {} (Nyquist)",
                low,
                high,
                fs / 2.0
            )));
        }

        // Prewarped analog band edges for the bilinear transform.
        let fs2 = 2.0 * fs;
        let w1 = fs2 * (PI * low / fs).tan();
        let w2 = fs2 * (PI * high / fs).tan();
        let w0 = (w1 * w2).sqrt();
        let bw = w2 - w1;

        // Analog Butterworth lowpass prototype: poles evenly spaced on the
        // left half of the unit circle.
        let mut prototype = Vec::with_capacity(order);
        for k in 0..order {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            prototype.push(Complex::new(theta.cos(), theta.sin()));
        }

        // Lowpass-to-bandpass: each prototype pole splits into two.
        let mut analog_poles = Vec::with_capacity(2 * order);
        for p in prototype {
            let pb = p.scale(bw / 2.0);
            let disc = pb.mul(pb).sub(Complex::new(w0 * w0, 0.0)).sqrt();
            analog_poles.push(pb.add(disc));
            analog_poles.push(pb.sub(disc));
        }

        // Bilinear transform to the z-plane. The bandpass transform leaves
        // `order` zeros at s = 0 which land on z = 1; the remaining `order`
        // zeros land on z = -1, giving the [1, 0, -1] section numerators.
        let mut digital_poles = Vec::with_capacity(analog_poles.len());
        let mut gain_den = Complex::new(1.0, 0.0);
        for s in &analog_poles {
            let num = Complex::new(fs2 + s.re, s.im);
            let den = Complex::new(fs2 - s.re, -s.im);
            digital_poles.push(num.div(den));
            gain_den = gain_den.mul(den);
        }
        let gain_num = bw.powi(order as i32) * fs2.powi(order as i32);
        let gain = Complex::new(gain_num, 0.0).div(gain_den).re;

        let sections = pair_into_sections(&digital_poles)?;

        Ok(Self { sections, gain })
    }

    /// Filters one frame with zeroed initial state, returning the filtered
    /// samples. Accepts any frame length.
    pub fn apply(&self, samples: &[f32]) -> Vec<f32> {
        let mut work: Vec<f64> = samples.iter().map(|&s| s as f64 * self.gain).collect();

        for section in &self.sections {
            // Direct form II transposed, b = [1, 0, -1].
            let mut s1 = 0.0f64;
            let mut s2 = 0.0f64;
            for v in work.iter_mut() {
                let x = *v;
                let y = x + s1;
                s1 = s2 - section.a1 * y;
                s2 = -x - section.a2 * y;
                *v = y;
            }
        }

        work.into_iter().map(|v| v as f32).collect()
    }

    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }
}

/// Groups the digital poles into conjugate-pair biquads. Real poles (which
/// the bandpass transform only produces in even counts) are paired with
/// each other.
fn pair_into_sections(poles: &[Complex]) -> Result<Vec<Biquad>, DetectorError> {
    const IM_EPS: f64 = 1e-8;

    let mut sections = Vec::new();
    let mut real_poles = Vec::new();
    let mut upper_count = 0usize;

    for p in poles {
        if p.im.abs() < IM_EPS {
            real_poles.push(p.re);
        } else if p.im > 0.0 {
            upper_count += 1;
            sections.push(Biquad {
                a1: -2.0 * p.re,
                a2: p.norm_sqr(),
            });
        }
    }

    if upper_count * 2 + real_poles.len() != poles.len() {
        return Err(DetectorError::InvalidConfig(
            "filter design produced unpaired complex poles".into(),
        ));
    }

    let mut reals = real_poles.chunks_exact(2);
    for pair in &mut reals {
        sections.push(Biquad {
            a1: -(pair[0] + pair[1]),
            a2: pair[0] * pair[1],
        });
    }
    if let [r] = reals.remainder() {
        sections.push(Biquad { a1: -r, a2: 0.0 });
    }

    Ok(sections)
}

/// Minimal complex arithmetic for the pole computations above.
#[derive(Debug, Clone, Copy)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    fn add(self, o: Self) -> Self {
        Self::new(self.re + o.re, self.im + o.im)
    }

    fn sub(self, o: Self) -> Self {
        Self::new(self.re - o.re, self.im - o.im)
    }

    fn mul(self, o: Self) -> Self {
        Self::new(
            self.re * o.re - self.im * o.im,
            self.re * o.im + self.im * o.re,
        )
    }

    fn div(self, o: Self) -> Self {
        let d = o.norm_sqr();
        Self::new(
            (self.re * o.re + self.im * o.im) / d,
            (self.im * o.re - self.re * o.im) / d,
        )
    }

    fn scale(self, k: f64) -> Self {
        Self::new(self.re * k, self.im * k)
    }

    fn norm_sqr(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    /// Principal square root.
    fn sqrt(self) -> Self {
        let r = self.norm_sqr().sqrt();
        let re = ((r + self.re) / 2.0).sqrt();
        let im = ((r - self.re) / 2.0).sqrt();
        Self::new(re, if self.im < 0.0 { -im } else { im })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq_hz: f32, amplitude: f32, sample_rate_hz: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let phase =
                    2.0 * std::f32::consts::PI * freq_hz * i as f32 / sample_rate_hz as f32;
                amplitude * phase.sin()
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        let sum: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
        ((sum / samples.len() as f64).sqrt()) as f32
    }

    fn default_filter() -> BandpassFilter {
        BandpassFilter::design(4, 2500.0, 4000.0, 44_100).unwrap()
    }

    #[test]
    fn order_four_bandpass_has_four_sections() {
        assert_eq!(default_filter().num_sections(), 4);
    }

    #[test]
    fn in_band_tone_passes_nearly_unattenuated() {
        let filter = default_filter();
        // Long signal so the startup transient is negligible.
        let input = sine(3200.0, 1.0, 44_100, 8192);
        let output = filter.apply(&input);
        let ratio = rms(&output) / rms(&input);
        assert!(
            (0.9..=1.05).contains(&ratio),
            "passband gain should be near unity, got {}",
            ratio
        );
    }

    #[test]
    fn band_edges_sit_near_half_power() {
        let filter = default_filter();
        for edge in [2500.0f32, 4000.0] {
            let input = sine(edge, 1.0, 44_100, 8192);
            let output = filter.apply(&input);
            let ratio = rms(&output) / rms(&input);
            assert!(
                (0.6..=0.8).contains(&ratio),
                "edge {} Hz should be near -3 dB, got {}",
                edge,
                ratio
            );
        }
    }

    #[test]
    fn out_of_band_tones_are_strongly_attenuated() {
        let filter = default_filter();
        for freq in [500.0f32, 1000.0, 8000.0, 12_000.0] {
            let input = sine(freq, 1.0, 44_100, 8192);
            let output = filter.apply(&input);
            let ratio = rms(&output) / rms(&input);
            assert!(
                ratio < 0.05,
                "{} Hz should be rejected, got gain {}",
                freq,
                ratio
            );
        }
    }

    #[test]
    fn dc_is_blocked() {
        let filter = default_filter();
        let input = vec![1.0f32; 4096];
        let output = filter.apply(&input);
        // All sections carry a zero at z = 1, so the tail must settle to zero.
        let tail_rms = rms(&output[2048..]);
        assert!(tail_rms < 1e-3, "DC leak: {}", tail_rms);
    }

    #[test]
    fn output_is_finite_for_noise() {
        use rand::Rng;
        let filter = default_filter();
        let mut rng = rand::thread_rng();
        let input: Vec<f32> = (0..1024).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        let output = filter.apply(&input);
        assert_eq!(output.len(), input.len());
        assert!(output.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn frames_are_filtered_independently() {
        let filter = default_filter();
        let frame = sine(3200.0, 0.5, 44_100, 1024);
        let first = filter.apply(&frame);
        let second = filter.apply(&frame);
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_band_is_rejected() {
        assert!(BandpassFilter::design(4, 4000.0, 2500.0, 44_100).is_err());
        assert!(BandpassFilter::design(4, 2500.0, 23_000.0, 44_100).is_err());
        assert!(BandpassFilter::design(0, 2500.0, 4000.0, 44_100).is_err());
        assert!(BandpassFilter::design(4, 0.0, 4000.0, 44_100).is_err());
    }
}
