use crate::elements::registry;
use crate::interface::Spectrum;
use crate::math::{HaarWavelet, MovingAverage, StatsHelper};
use crate::prelude::{AnalysisConfig, ProcessingStage, XrfError, XrfResult};
use crate::telemetry::log::LogManager;

/// Sample spectrum with an optional background to subtract.
#[derive(Debug, Clone)]
pub struct PreprocessInput {
    pub sample: Spectrum,
    pub background: Option<Spectrum>,
}

/// Wavelet shrinkage followed by line-aware moving-average smoothing.
pub struct Preprocessor {
    wavelet_threshold: f64,
    wide: MovingAverage,
    narrow: MovingAverage,
    roi_half_width_kev: f64,
    background_scale: f64,
    logger: LogManager,
}

impl Preprocessor {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            wavelet_threshold: config.wavelet_threshold,
            wide: MovingAverage::new(config.smoothing_width),
            narrow: MovingAverage::new(config.roi_width),
            roi_half_width_kev: config.roi_half_width_kev,
            background_scale: config.background_scale,
            logger: LogManager::new("preprocess"),
        }
    }

    /// Marks the channels within the half-width of any registry line.
    pub fn roi_mask(&self, len: usize, kev_per_channel: f64) -> Vec<bool> {
        let mut mask = vec![false; len];
        if len == 0 {
            return mask;
        }
        for (_, line) in registry() {
            let lo = ((line.energy_kev - self.roi_half_width_kev) / kev_per_channel).max(0.0) as usize;
            let hi = ((line.energy_kev + self.roi_half_width_kev) / kev_per_channel) as usize;
            if lo >= len {
                continue;
            }
            for flag in &mut mask[lo..=hi.min(len - 1)] {
                *flag = true;
            }
        }
        mask
    }

    /// Denoises and smooths raw counts; the result is clamped to be non-negative.
    pub fn clean(&self, counts: &[f64], kev_per_channel: f64) -> Vec<f64> {
        let denoised = HaarWavelet::denoise(counts, self.wavelet_threshold);
        let prefix = MovingAverage::prefix_sums(&denoised);
        let mask = self.roi_mask(denoised.len(), kev_per_channel);

        let mut smoothed: Vec<f64> = mask
            .iter()
            .enumerate()
            .map(|(index, &in_roi)| {
                if in_roi {
                    self.narrow.at(&prefix, index)
                } else {
                    self.wide.at(&prefix, index)
                }
            })
            .collect();
        StatsHelper::clamp_non_negative(&mut smoothed);
        smoothed
    }

    pub fn denoise(&self, spectrum: &Spectrum) -> Spectrum {
        let cleaned = self.clean(spectrum.counts(), spectrum.kev_per_channel());
        Spectrum::derived(cleaned, spectrum)
    }

    /// Background must share the sample's channel layout and calibration.
    fn check_compatible(sample: &Spectrum, background: &Spectrum) -> XrfResult<()> {
        if sample.len() != background.len() {
            return Err(XrfError::LengthMismatch {
                context: format!(
                    "background `{}` for sample `{}`",
                    background.header().source_name,
                    sample.header().source_name
                ),
                expected: sample.len(),
                actual: background.len(),
            });
        }
        if !background.is_calibrated_at(sample.kev_per_channel()) {
            return Err(XrfError::Format {
                source_name: background.header().source_name.clone(),
                reason: format!(
                    "calibrated at {} keV/channel but sample `{}` uses {}",
                    background.kev_per_channel(),
                    sample.header().source_name,
                    sample.kev_per_channel()
                ),
            });
        }
        Ok(())
    }

    /// Channel-wise `max(sample - scale * background, 0)`.
    pub fn subtract_background(
        &self,
        sample: &Spectrum,
        background: &Spectrum,
        scale: f64,
    ) -> XrfResult<Spectrum> {
        Self::check_compatible(sample, background)?;
        if !(scale.is_finite() && scale >= 0.0) {
            return Err(XrfError::InvalidConfig(format!(
                "background scale must be non-negative, got {}",
                scale
            )));
        }
        let net = sample
            .counts()
            .iter()
            .zip(background.counts())
            .map(|(&s, &b)| StatsHelper::sanitize(s - scale * b))
            .collect();
        Ok(Spectrum::derived(net, sample))
    }

    /// Cleans the sample and, when present, subtracts the cleaned background.
    pub fn prepare(
        &self,
        sample: &Spectrum,
        background: Option<&Spectrum>,
        scale: f64,
    ) -> XrfResult<Spectrum> {
        if let Some(background) = background {
            Self::check_compatible(sample, background)?;
        }

        let cleaned = self.denoise(sample);
        let net = match background {
            Some(background) => {
                let cleaned_background = self.denoise(background);
                self.subtract_background(&cleaned, &cleaned_background, scale)?
            }
            None => cleaned,
        };

        self.logger.record(&format!(
            "{} net RMS {:.4} (background {})",
            net.header().source_name,
            StatsHelper::rms(net.counts()),
            if background.is_some() { "subtracted" } else { "none" }
        ));
        Ok(net)
    }
}

impl ProcessingStage for Preprocessor {
    type Input = PreprocessInput;
    type Output = Spectrum;

    fn name(&self) -> &'static str {
        self.logger.component()
    }

    fn execute(&self, input: PreprocessInput) -> XrfResult<Spectrum> {
        self.prepare(&input.sample, input.background.as_ref(), self.background_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::SpectrumHeader;
    use crate::prelude::CHANNEL_COUNT;

    fn flat(level: f64) -> Spectrum {
        Spectrum::new(vec![level; CHANNEL_COUNT], SpectrumHeader::named("flat")).unwrap()
    }

    #[test]
    fn roi_mask_covers_fe_ka_window() {
        let stage = Preprocessor::new(&AnalysisConfig::default());
        let mask = stage.roi_mask(CHANNEL_COUNT, 0.0135);
        // Fe Ka 6.404 keV -> channels 466..=481
        assert!(mask[466] && mask[474] && mask[481]);
        assert!(!mask[1000]);
    }

    #[test]
    fn output_keeps_length_and_is_non_negative() {
        let stage = Preprocessor::new(&AnalysisConfig::default());
        let counts: Vec<f64> = (0..CHANNEL_COUNT)
            .map(|i| if i % 3 == 0 { 40.0 } else { 0.0 })
            .collect();
        let spectrum = Spectrum::new(counts, SpectrumHeader::default()).unwrap();
        let cleaned = stage.denoise(&spectrum);
        assert_eq!(cleaned.len(), CHANNEL_COUNT);
        assert!(cleaned.counts().iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn background_is_scaled_and_clamped() {
        let stage = Preprocessor::new(&AnalysisConfig::default());
        let net = stage
            .subtract_background(&flat(10.0), &flat(50.0), 0.1)
            .unwrap();
        assert!(net.counts().iter().all(|&v| (v - 5.0).abs() < 1e-12));
        let clamped = stage
            .subtract_background(&flat(10.0), &flat(500.0), 0.1)
            .unwrap();
        assert!(clamped.counts().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn zero_scale_matches_no_background_path() {
        let stage = Preprocessor::new(&AnalysisConfig::default());
        let counts: Vec<f64> = (0..CHANNEL_COUNT).map(|i| (i % 17) as f64).collect();
        let sample = Spectrum::new(counts, SpectrumHeader::default()).unwrap();
        let without = stage.prepare(&sample, None, 0.1).unwrap();
        let with_zero = stage.prepare(&sample, Some(&flat(1e4)), 0.0).unwrap();
        assert_eq!(without.counts(), with_zero.counts());
    }

    #[test]
    fn stage_uses_configured_background_scale() {
        let config = AnalysisConfig {
            background_scale: 0.5,
            ..Default::default()
        };
        let stage = Preprocessor::new(&config);
        let input = PreprocessInput {
            sample: flat(100.0),
            background: Some(flat(100.0)),
        };
        let net = stage.execute(input).unwrap();
        let expected = stage.prepare(&flat(100.0), Some(&flat(100.0)), 0.5).unwrap();
        assert_eq!(stage.name(), "preprocess");
        assert_eq!(net.counts(), expected.counts());
        assert!(net.counts().iter().all(|&v| v <= 50.0 + 1e-9));
    }

    #[test]
    fn mismatched_background_is_rejected() {
        let stage = Preprocessor::new(&AnalysisConfig::default());
        let short = Spectrum::from_counts(vec![1.0; 1500], 0.0135, SpectrumHeader::named("short"))
            .unwrap();
        let err = stage.prepare(&flat(1.0), Some(&short), 0.1).unwrap_err();
        assert!(matches!(
            err,
            XrfError::LengthMismatch {
                expected: CHANNEL_COUNT,
                actual: 1500,
                ..
            }
        ));
    }

    #[test]
    fn background_with_other_calibration_is_rejected() {
        let stage = Preprocessor::new(&AnalysisConfig::default());
        let background = Spectrum::with_calibration(
            vec![1.0; CHANNEL_COUNT],
            0.02,
            SpectrumHeader::named("coarse-bg"),
        )
        .unwrap();
        let err = stage.prepare(&flat(1.0), Some(&background), 0.1).unwrap_err();
        assert!(matches!(err, XrfError::Format { ref source_name, .. } if source_name == "coarse-bg"));
        let err = stage
            .subtract_background(&flat(1.0), &background, 0.1)
            .unwrap_err();
        assert!(matches!(err, XrfError::Format { .. }));
    }
}
