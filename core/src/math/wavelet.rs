use std::f64::consts::FRAC_1_SQRT_2;

/// Multi-level Haar decomposition of a signal.
///
/// `details[0]` is the finest level. `lengths[l]` is the length of the signal
/// that level `l` was computed from, used to undo odd-length extension.
#[derive(Debug, Clone)]
pub struct HaarDecomposition {
    pub approximation: Vec<f64>,
    pub details: Vec<Vec<f64>>,
    lengths: Vec<usize>,
}

pub struct HaarWavelet;

impl HaarWavelet {
    /// Deepest level at which every band still holds at least one coefficient.
    pub fn max_level(len: usize) -> usize {
        if len < 2 {
            0
        } else {
            len.ilog2() as usize
        }
    }

    pub fn decompose(signal: &[f64], levels: usize) -> HaarDecomposition {
        let mut approximation = signal.to_vec();
        let mut details = Vec::with_capacity(levels);
        let mut lengths = Vec::with_capacity(levels);

        for _ in 0..levels {
            if approximation.len() < 2 {
                break;
            }
            lengths.push(approximation.len());
            if approximation.len() % 2 == 1 {
                // symmetric extension repeats the edge sample
                let last = approximation[approximation.len() - 1];
                approximation.push(last);
            }
            let (next, detail): (Vec<f64>, Vec<f64>) = approximation
                .chunks_exact(2)
                .map(|pair| {
                    (
                        (pair[0] + pair[1]) * FRAC_1_SQRT_2,
                        (pair[0] - pair[1]) * FRAC_1_SQRT_2,
                    )
                })
                .unzip();
            details.push(detail);
            approximation = next;
        }

        HaarDecomposition {
            approximation,
            details,
            lengths,
        }
    }

    pub fn reconstruct(decomposition: &HaarDecomposition) -> Vec<f64> {
        let mut signal = decomposition.approximation.clone();
        for (detail, &len) in decomposition
            .details
            .iter()
            .zip(decomposition.lengths.iter())
            .rev()
        {
            let mut expanded = Vec::with_capacity(detail.len() * 2);
            for (&a, &d) in signal.iter().zip(detail.iter()) {
                expanded.push((a + d) * FRAC_1_SQRT_2);
                expanded.push((a - d) * FRAC_1_SQRT_2);
            }
            expanded.truncate(len);
            signal = expanded;
        }
        signal
    }

    /// Shrinks a coefficient towards zero by `threshold`.
    pub fn soft_threshold(value: f64, threshold: f64) -> f64 {
        let magnitude = value.abs() - threshold;
        if magnitude > 0.0 {
            magnitude.copysign(value)
        } else {
            0.0
        }
    }

    /// Full-depth Haar shrinkage: every detail band is soft-thresholded, the
    /// approximation is kept as is.
    pub fn denoise(signal: &[f64], threshold: f64) -> Vec<f64> {
        let mut decomposition = Self::decompose(signal, Self::max_level(signal.len()));
        for band in decomposition.details.iter_mut() {
            for coefficient in band.iter_mut() {
                *coefficient = Self::soft_threshold(*coefficient, threshold);
            }
        }
        Self::reconstruct(&decomposition)
    }
}
