use serde::{Deserialize, Serialize};

/// Channel count of the instrument's native spectrum format.
pub const CHANNEL_COUNT: usize = 2048;

/// Channel count of the legacy format, zero-padded to [`CHANNEL_COUNT`] on load.
pub const LEGACY_CHANNEL_COUNT: usize = 1024;

/// Linear energy calibration of the reference instrument.
pub const KEV_PER_CHANNEL: f64 = 0.0135;

/// Minimum number of channels a line window must cover to be fitted.
pub const MIN_FIT_CHANNELS: usize = 3;

/// Tunables shared by every stage of the quantification pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub kev_per_channel: f64,
    pub background_scale: f64,
    pub fit_window_kev: f64,
    pub max_sigma_kev: f64,
    pub fit_max_iterations: usize,
    pub wavelet_threshold: f64,
    pub smoothing_width: usize,
    pub roi_width: usize,
    pub roi_half_width_kev: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            kev_per_channel: KEV_PER_CHANNEL,
            background_scale: 0.1,
            fit_window_kev: 0.10,
            max_sigma_kev: 0.15,
            fit_max_iterations: 200,
            wavelet_threshold: 5.0,
            smoothing_width: 10,
            roi_width: 3,
            roi_half_width_kev: 0.1,
            max_iterations: 50,
            tolerance: 1e-6,
        }
    }
}

impl AnalysisConfig {
    /// Rejects values that would make a stage meaningless.
    pub fn validate(&self) -> XrfResult<()> {
        if !(self.kev_per_channel.is_finite() && self.kev_per_channel > 0.0) {
            return Err(XrfError::InvalidConfig(format!(
                "kev_per_channel must be positive, got {}",
                self.kev_per_channel
            )));
        }
        if !(self.background_scale.is_finite() && self.background_scale >= 0.0) {
            return Err(XrfError::InvalidConfig(format!(
                "background_scale must be non-negative, got {}",
                self.background_scale
            )));
        }
        if !(self.fit_window_kev.is_finite() && self.fit_window_kev > 0.0) {
            return Err(XrfError::InvalidConfig(format!(
                "fit_window_kev must be positive, got {}",
                self.fit_window_kev
            )));
        }
        if !(self.max_sigma_kev.is_finite() && self.max_sigma_kev > 0.0) {
            return Err(XrfError::InvalidConfig(format!(
                "max_sigma_kev must be positive, got {}",
                self.max_sigma_kev
            )));
        }
        if self.fit_max_iterations == 0 || self.max_iterations == 0 {
            return Err(XrfError::InvalidConfig(
                "iteration limits must be at least 1".into(),
            ));
        }
        if self.smoothing_width == 0 || self.roi_width == 0 {
            return Err(XrfError::InvalidConfig(
                "smoothing kernels must be at least one channel wide".into(),
            ));
        }
        if !(self.wavelet_threshold.is_finite() && self.wavelet_threshold >= 0.0) {
            return Err(XrfError::InvalidConfig(format!(
                "wavelet_threshold must be non-negative, got {}",
                self.wavelet_threshold
            )));
        }
        if !(self.roi_half_width_kev.is_finite() && self.roi_half_width_kev >= 0.0) {
            return Err(XrfError::InvalidConfig(format!(
                "roi_half_width_kev must be non-negative, got {}",
                self.roi_half_width_kev
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(XrfError::InvalidConfig(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Common error type for the quantification core.
///
/// Only `Format` and `LengthMismatch` abort an analysis. `InsufficientData`
/// is raised by the peak fitter for a single line and absorbed by the
/// aggregator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum XrfError {
    #[error("format error in {source_name}: {reason}")]
    Format { source_name: String, reason: String },
    #[error("length mismatch in {context}: expected {expected}, got {actual}")]
    LengthMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },
    #[error("insufficient data around {energy_kev:.3} keV: {channels} channel(s) in fit window")]
    InsufficientData { energy_kev: f64, channels: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type XrfResult<T> = Result<T, XrfError>;

/// A pure stage of the quantification pipeline.
///
/// Stages hold only immutable configuration, so one instance can serve any
/// number of concurrent analyses.
pub trait ProcessingStage {
    type Input;
    type Output;

    fn name(&self) -> &'static str;
    fn execute(&self, input: Self::Input) -> XrfResult<Self::Output>;
}
