pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f64).sqrt()
    }

    /// Largest sample, or zero for an empty slice.
    pub fn max(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Maps negative, NaN and infinite values to zero.
    pub fn sanitize(value: f64) -> f64 {
        if value.is_finite() && value > 0.0 {
            value
        } else {
            0.0
        }
    }

    pub fn clamp_non_negative(samples: &mut [f64]) {
        for sample in samples.iter_mut() {
            *sample = Self::sanitize(*sample);
        }
    }
}
