/// Uniform moving-average kernel with zero padding at the signal edges.
///
/// Alignment follows a centered "same" convolution: for width `w` the output
/// at `n` averages `x[n - (w - 1 - (w - 1) / 2) ..= n + (w - 1) / 2]`, so even
/// widths lean one sample to the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingAverage {
    width: usize,
}

impl MovingAverage {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    fn span(&self, index: usize, len: usize) -> (usize, usize) {
        let ahead = (self.width - 1) / 2;
        let behind = self.width - 1 - ahead;
        let lo = index.saturating_sub(behind);
        let hi = (index + ahead).min(len.saturating_sub(1));
        (lo, hi)
    }

    /// Cumulative sums with a leading zero, shared by repeated evaluations.
    pub fn prefix_sums(signal: &[f64]) -> Vec<f64> {
        let mut prefix = Vec::with_capacity(signal.len() + 1);
        prefix.push(0.0);
        let mut running = 0.0;
        for &value in signal {
            running += value;
            prefix.push(running);
        }
        prefix
    }

    /// Average at a single index, given the signal's prefix sums.
    pub fn at(&self, prefix: &[f64], index: usize) -> f64 {
        let len = prefix.len().saturating_sub(1);
        if index >= len {
            return 0.0;
        }
        let (lo, hi) = self.span(index, len);
        (prefix[hi + 1] - prefix[lo]) / self.width as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smooth(width: usize, signal: &[f64]) -> Vec<f64> {
        let kernel = MovingAverage::new(width);
        let prefix = MovingAverage::prefix_sums(signal);
        (0..signal.len()).map(|index| kernel.at(&prefix, index)).collect()
    }

    #[test]
    fn odd_width_is_centered() {
        let smoothed = smooth(3, &[0.0, 3.0, 0.0, 0.0]);
        assert_eq!(smoothed, vec![1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn even_width_leans_left() {
        // width 2 averages x[n-1] and x[n]
        let smoothed = smooth(2, &[2.0, 4.0, 6.0]);
        assert_eq!(smoothed, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn edges_are_zero_padded() {
        let smoothed = smooth(10, &[10.0; 20]);
        assert_eq!(smoothed.len(), 20);
        assert!((smoothed[10] - 10.0).abs() < 1e-12);
        assert!((smoothed[0] - 5.0).abs() < 1e-12);
        assert!((smoothed[19] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn index_past_the_end_is_zero() {
        let prefix = MovingAverage::prefix_sums(&[1.0, 2.0]);
        assert_eq!(MovingAverage::new(3).at(&prefix, 2), 0.0);
    }
}
