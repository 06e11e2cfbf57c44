use crate::interface::Spectrum;
use crate::math::{MatrixHelper, StatsHelper};
use crate::prelude::{AnalysisConfig, XrfError, XrfResult, MIN_FIT_CHANNELS};
use crate::telemetry::log::LogManager;
use ndarray::{Array1, Array2};
use serde::Serialize;
use std::f64::consts::PI;

const INITIAL_DAMPING: f64 = 1e-3;
const MAX_DAMPING: f64 = 1e12;
const FTOL: f64 = 1.49012e-8;
const XTOL: f64 = 1.49012e-8;

/// Area under a Gaussian profile; non-finite results collapse to zero.
pub fn peak_intensity(amplitude: f64, sigma: f64) -> f64 {
    let area = amplitude * sigma * (2.0 * PI).sqrt();
    if area.is_finite() {
        area
    } else {
        0.0
    }
}

/// Parameters of one fitted emission line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FittedPeak {
    pub amplitude: f64,
    pub center_kev: f64,
    pub sigma_kev: f64,
    /// Sum of the fractional standard errors of amplitude and sigma.
    pub uncertainty: f64,
}

impl FittedPeak {
    pub const ZERO: FittedPeak = FittedPeak {
        amplitude: 0.0,
        center_kev: 0.0,
        sigma_kev: 0.0,
        uncertainty: 0.0,
    };

    /// Zero-amplitude stand-in reported when a fit cannot be trusted.
    pub fn sentinel(line_energy_kev: f64, window_kev: f64) -> Self {
        Self {
            amplitude: 0.0,
            center_kev: line_energy_kev,
            sigma_kev: window_kev / 5.0,
            uncertainty: 0.0,
        }
    }

    pub fn intensity(&self) -> f64 {
        peak_intensity(self.amplitude, self.sigma_kev)
    }
}

/// Why a fit was replaced by the zero-amplitude sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradeReason {
    NonConvergence,
    TooBroad { sigma_kev: f64 },
    NegativeAmplitude { amplitude: f64 },
    CenterDrift { center_kev: f64 },
}

/// Outcome of fitting a single line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeakFit {
    Fitted(FittedPeak),
    /// The fit converged on an amplitude of exactly zero.
    Absent,
    Degraded {
        reason: DegradeReason,
        sentinel: FittedPeak,
    },
}

impl PeakFit {
    pub fn peak(&self) -> FittedPeak {
        match self {
            PeakFit::Fitted(peak) => *peak,
            PeakFit::Absent => FittedPeak::ZERO,
            PeakFit::Degraded { sentinel, .. } => *sentinel,
        }
    }

    pub fn intensity(&self) -> f64 {
        match self {
            PeakFit::Fitted(peak) => StatsHelper::sanitize(peak.intensity()),
            _ => 0.0,
        }
    }

    pub fn uncertainty(&self) -> f64 {
        StatsHelper::sanitize(self.peak().uncertainty)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PeakFit::Degraded { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Gaussian {
    amplitude: f64,
    center: f64,
    sigma: f64,
}

impl Gaussian {
    fn from_params(params: &Array1<f64>) -> Self {
        Self {
            amplitude: params[0],
            center: params[1],
            sigma: params[2],
        }
    }

    fn value(&self, x: f64) -> f64 {
        let offset = x - self.center;
        self.amplitude * (-offset * offset / (2.0 * self.sigma * self.sigma)).exp()
    }

    /// Partial derivatives with respect to (amplitude, center, sigma).
    fn gradient(&self, x: f64) -> [f64; 3] {
        let offset = x - self.center;
        let s2 = self.sigma * self.sigma;
        let shape = (-offset * offset / (2.0 * s2)).exp();
        let scaled = self.amplitude * shape;
        [
            shape,
            scaled * offset / s2,
            scaled * offset * offset / (s2 * self.sigma),
        ]
    }
}

enum Convergence {
    Converged { params: Array1<f64>, cost: f64 },
    Failed,
}

/// Levenberg-Marquardt least squares for a single Gaussian profile.
struct GaussianLeastSquares<'a> {
    x: &'a [f64],
    y: &'a [f64],
    max_iterations: usize,
}

impl<'a> GaussianLeastSquares<'a> {
    fn cost(&self, params: &Array1<f64>) -> f64 {
        let model = Gaussian::from_params(params);
        self.x
            .iter()
            .zip(self.y)
            .map(|(&x, &y)| {
                let r = y - model.value(x);
                r * r
            })
            .sum()
    }

    /// Normal matrix `JᵀJ` and gradient `Jᵀr` at `params`.
    fn normal_equations(&self, params: &Array1<f64>) -> (Array2<f64>, Array1<f64>) {
        let model = Gaussian::from_params(params);
        let mut jtj = Array2::zeros((3, 3));
        let mut jtr = Array1::zeros(3);
        for (&x, &y) in self.x.iter().zip(self.y) {
            let g = model.gradient(x);
            let r = y - model.value(x);
            for row in 0..3 {
                jtr[row] += g[row] * r;
                for col in 0..3 {
                    jtj[[row, col]] += g[row] * g[col];
                }
            }
        }
        (jtj, jtr)
    }

    fn minimize(&self, seed: Array1<f64>) -> Convergence {
        let mut params = seed;
        let mut cost = self.cost(&params);
        if !cost.is_finite() {
            return Convergence::Failed;
        }
        let mut damping = INITIAL_DAMPING;

        for _ in 0..self.max_iterations {
            if cost == 0.0 {
                return Convergence::Converged { params, cost };
            }
            let (jtj, jtr) = self.normal_equations(&params);
            if jtr.iter().all(|g| *g == 0.0) {
                return Convergence::Converged { params, cost };
            }

            let mut solved_once = false;
            loop {
                if damping > MAX_DAMPING {
                    // no step reduces the cost: stationary if any step was solvable
                    return if solved_once {
                        Convergence::Converged { params, cost }
                    } else {
                        Convergence::Failed
                    };
                }
                let mut damped = jtj.clone();
                for d in 0..3 {
                    let diagonal = jtj[[d, d]];
                    damped[[d, d]] += damping * if diagonal > 0.0 { diagonal } else { 1.0 };
                }
                let Some(step) = MatrixHelper::solve(damped.view(), jtr.view()) else {
                    damping *= 10.0;
                    continue;
                };
                solved_once = true;

                let trial = &params + &step;
                let trial_cost = self.cost(&trial);
                if trial_cost.is_finite() && trial_cost < cost {
                    let reduction = cost - trial_cost;
                    let step_norm = step.iter().map(|v| v * v).sum::<f64>().sqrt();
                    let param_norm = trial.iter().map(|v| v * v).sum::<f64>().sqrt();
                    params = trial;
                    cost = trial_cost;
                    damping = (damping / 10.0).max(f64::EPSILON);
                    if reduction <= FTOL * (cost + reduction) || step_norm <= XTOL * (param_norm + XTOL) {
                        return Convergence::Converged { params, cost };
                    }
                    break;
                }
                damping *= 10.0;
            }
        }
        Convergence::Failed
    }

    /// Fractional standard errors of amplitude and sigma, summed.
    ///
    /// Returns zero when the covariance cannot be estimated: exactly as many
    /// points as parameters, or a singular normal matrix.
    fn relative_uncertainty(&self, params: &Array1<f64>, cost: f64) -> f64 {
        let dof = self.x.len().saturating_sub(3);
        if dof == 0 {
            return 0.0;
        }
        let (jtj, _) = self.normal_equations(params);
        let Some(inverse) = MatrixHelper::invert(jtj.view()) else {
            return 0.0;
        };
        let variance = cost / dof as f64;
        let se_amplitude = (inverse[[0, 0]] * variance).abs().sqrt();
        let se_sigma = (inverse[[2, 2]] * variance).abs().sqrt();
        let combined = (se_amplitude / params[0]).abs() + (se_sigma / params[2]).abs();
        StatsHelper::sanitize(combined)
    }
}

/// Gaussian fitter for individual characteristic lines.
pub struct PeakFitter {
    window_kev: f64,
    max_sigma_kev: f64,
    max_iterations: usize,
    logger: LogManager,
}

impl PeakFitter {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            window_kev: config.fit_window_kev,
            max_sigma_kev: config.max_sigma_kev,
            max_iterations: config.fit_max_iterations,
            logger: LogManager::new("peak"),
        }
    }

    /// Fits the line at `line_energy_kev` using the configured window.
    pub fn fit_line(&self, spectrum: &Spectrum, line_energy_kev: f64) -> XrfResult<PeakFit> {
        self.fit_peak(spectrum, line_energy_kev, self.window_kev)
    }

    /// Fits a Gaussian within `±window_kev` of the expected line energy.
    ///
    /// Fails only with `InsufficientData`; every other failure is reported as
    /// [`PeakFit::Degraded`].
    pub fn fit_peak(
        &self,
        spectrum: &Spectrum,
        line_energy_kev: f64,
        window_kev: f64,
    ) -> XrfResult<PeakFit> {
        let center_channel = spectrum.channel_of(line_energy_kev);
        let half_window = spectrum.channel_of(window_kev);
        let start = center_channel.saturating_sub(half_window);
        let end = center_channel.saturating_add(half_window).min(spectrum.len());
        let channels = end.saturating_sub(start);
        if channels < MIN_FIT_CHANNELS {
            return Err(XrfError::InsufficientData {
                energy_kev: line_energy_kev,
                channels,
            });
        }

        let x: Vec<f64> = (start..end).map(|c| spectrum.energy(c)).collect();
        let y = &spectrum.counts()[start..end];
        let sentinel = FittedPeak::sentinel(line_energy_kev, window_kev);
        let seed = Array1::from(vec![StatsHelper::max(y), line_energy_kev, window_kev / 5.0]);

        let solver = GaussianLeastSquares {
            x: &x,
            y,
            max_iterations: self.max_iterations,
        };
        let (params, cost) = match solver.minimize(seed) {
            Convergence::Converged { params, cost } => (params, cost),
            Convergence::Failed => {
                return Ok(self.degrade(line_energy_kev, DegradeReason::NonConvergence, sentinel));
            }
        };

        if let Some(rejected) = self.gate(line_energy_kev, window_kev, &params) {
            return Ok(rejected);
        }

        let peak = FittedPeak {
            amplitude: params[0],
            center_kev: params[1],
            sigma_kev: params[2].abs(),
            uncertainty: solver.relative_uncertainty(&params, cost),
        };
        self.logger.detail(&format!(
            "{:.3} keV: amplitude {:.3} center {:.4} sigma {:.4} uncertainty {:.4}",
            line_energy_kev, peak.amplitude, peak.center_kev, peak.sigma_kev, peak.uncertainty
        ));
        Ok(PeakFit::Fitted(peak))
    }

    /// Quality gates applied to converged parameters, in order. Returns the
    /// replacement outcome, or `None` when the fit is accepted.
    fn gate(&self, line_energy_kev: f64, window_kev: f64, params: &Array1<f64>) -> Option<PeakFit> {
        let sentinel = FittedPeak::sentinel(line_energy_kev, window_kev);
        let amplitude = params[0];
        let center_kev = params[1];
        let sigma_kev = params[2].abs();
        let reason = if !(amplitude.is_finite() && center_kev.is_finite() && sigma_kev.is_finite()) {
            DegradeReason::NonConvergence
        } else if sigma_kev > self.max_sigma_kev {
            DegradeReason::TooBroad { sigma_kev }
        } else if amplitude == 0.0 {
            return Some(PeakFit::Absent);
        } else if amplitude < 0.0 {
            DegradeReason::NegativeAmplitude { amplitude }
        } else if (center_kev - line_energy_kev).abs() > window_kev / 2.0 {
            DegradeReason::CenterDrift { center_kev }
        } else {
            return None;
        };
        Some(self.degrade(line_energy_kev, reason, sentinel))
    }

    fn degrade(&self, line_energy_kev: f64, reason: DegradeReason, sentinel: FittedPeak) -> PeakFit {
        self.logger.detail(&format!(
            "{:.3} keV fit replaced by zero sentinel: {:?}",
            line_energy_kev, reason
        ));
        PeakFit::Degraded { reason, sentinel }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::SpectrumHeader;
    use crate::prelude::{CHANNEL_COUNT, KEV_PER_CHANNEL};
    use ndarray::array;

    fn synthetic(peaks: &[(f64, f64, f64)]) -> Spectrum {
        let counts = (0..CHANNEL_COUNT)
            .map(|c| {
                let energy = c as f64 * KEV_PER_CHANNEL;
                peaks
                    .iter()
                    .map(|&(amplitude, center, sigma)| {
                        Gaussian { amplitude, center, sigma }.value(energy)
                    })
                    .sum()
            })
            .collect();
        Spectrum::new(counts, SpectrumHeader::named("synthetic")).unwrap()
    }

    fn fitter() -> PeakFitter {
        PeakFitter::new(&AnalysisConfig::default())
    }

    #[test]
    fn recovers_clean_gaussian() {
        let spectrum = synthetic(&[(1000.0, 6.404, 0.05)]);
        let fit = fitter().fit_line(&spectrum, 6.404).unwrap();
        let PeakFit::Fitted(peak) = fit else {
            panic!("expected a fitted peak, got {fit:?}");
        };
        assert!((peak.amplitude - 1000.0).abs() < 1e-3);
        assert!((peak.center_kev - 6.404).abs() < 1e-6);
        assert!((peak.sigma_kev - 0.05).abs() < 1e-6);
        assert!((fit.intensity() - 125.331).abs() < 1e-2);
        assert!(peak.uncertainty >= 0.0 && peak.uncertainty < 1e-3);
    }

    #[test]
    fn empty_window_is_absent() {
        let spectrum = synthetic(&[]);
        let fit = fitter().fit_line(&spectrum, 3.314).unwrap();
        assert_eq!(fit, PeakFit::Absent);
        assert_eq!(fit.peak(), FittedPeak::ZERO);
        assert_eq!(fit.intensity(), 0.0);
    }

    #[test]
    fn narrow_window_is_insufficient_data() {
        let spectrum = synthetic(&[(1000.0, 6.404, 0.05)]);
        // 0.02 keV covers one channel either side of the line
        let err = fitter().fit_peak(&spectrum, 6.404, 0.02).unwrap_err();
        assert!(matches!(err, XrfError::InsufficientData { channels: 2, .. }));
    }

    #[test]
    fn neighbouring_peak_is_not_captured() {
        // Fe Ka sits inside the Mn Kb window
        let spectrum = synthetic(&[(1000.0, 6.404, 0.05)]);
        let fit = fitter().fit_line(&spectrum, 6.490).unwrap();
        assert!(fit.is_degraded());
        assert_eq!(fit.peak(), FittedPeak::sentinel(6.490, 0.10));
        assert_eq!(fit.intensity(), 0.0);
    }

    #[test]
    fn broad_hump_is_gated() {
        let spectrum = synthetic(&[(50.0, 2.0, 0.6)]);
        let fit = fitter().fit_line(&spectrum, 2.014).unwrap();
        assert!(fit.is_degraded());
        assert_eq!(fit.peak(), FittedPeak::sentinel(2.014, 0.10));
        assert_eq!(fit.intensity(), 0.0);
    }

    #[test]
    fn gates_report_each_reason() {
        let fitter = fitter();
        let reason = |params: Array1<f64>| match fitter.gate(6.404, 0.10, &params) {
            Some(PeakFit::Degraded { reason, sentinel }) => {
                assert_eq!(sentinel, FittedPeak::sentinel(6.404, 0.10));
                Some(reason)
            }
            other => panic!("expected a degraded fit, got {other:?}"),
        };

        assert_eq!(
            reason(array![f64::NAN, 6.404, 0.05]),
            Some(DegradeReason::NonConvergence)
        );
        assert_eq!(
            reason(array![100.0, 6.404, -0.4]),
            Some(DegradeReason::TooBroad { sigma_kev: 0.4 })
        );
        assert_eq!(
            reason(array![-25.0, 6.404, 0.05]),
            Some(DegradeReason::NegativeAmplitude { amplitude: -25.0 })
        );
        assert_eq!(
            reason(array![100.0, 6.48, 0.05]),
            Some(DegradeReason::CenterDrift { center_kev: 6.48 })
        );
    }

    #[test]
    fn gates_accept_in_window_fit_and_flag_zero_amplitude() {
        let fitter = fitter();
        assert_eq!(fitter.gate(6.404, 0.10, &array![100.0, 6.42, -0.05]), None);
        assert_eq!(
            fitter.gate(6.404, 0.10, &array![0.0, 6.404, 0.05]),
            Some(PeakFit::Absent)
        );
    }

    #[test]
    fn iteration_limit_degrades_to_non_convergence() {
        let config = AnalysisConfig {
            fit_max_iterations: 1,
            ..Default::default()
        };
        let spectrum = synthetic(&[(1000.0, 6.404, 0.05)]);
        let fit = PeakFitter::new(&config).fit_line(&spectrum, 6.404).unwrap();
        assert_eq!(
            fit,
            PeakFit::Degraded {
                reason: DegradeReason::NonConvergence,
                sentinel: FittedPeak::sentinel(6.404, 0.10),
            }
        );
        assert_eq!(fit.intensity(), 0.0);
    }

    #[test]
    fn uncertainty_is_zero_without_residual_degrees_of_freedom() {
        let x = [6.39, 6.40, 6.41];
        let y = [80.0, 100.0, 80.0];
        let solver = GaussianLeastSquares {
            x: &x,
            y: &y,
            max_iterations: 10,
        };
        assert_eq!(solver.relative_uncertainty(&array![100.0, 6.40, 0.015], 4.0), 0.0);
    }

    #[test]
    fn uncertainty_is_zero_for_singular_normal_matrix() {
        let x = [6.38, 6.39, 6.40, 6.41, 6.42];
        let y = [1.0; 5];
        let solver = GaussianLeastSquares {
            x: &x,
            y: &y,
            max_iterations: 10,
        };
        // zero amplitude leaves the center and sigma columns of J empty
        assert_eq!(solver.relative_uncertainty(&array![0.0, 6.40, 0.02], 5.0), 0.0);
    }

    #[test]
    fn three_channel_window_reports_no_uncertainty() {
        let spectrum = synthetic(&[(100.0, 27.6395, 0.02)]);
        let line = spectrum.energy(CHANNEL_COUNT - 1) + 0.005;
        // the window is clipped at the last channel: 2045..2048
        let fit = fitter().fit_peak(&spectrum, line, 0.03).unwrap();
        assert_eq!(fit.uncertainty(), 0.0);
    }

    #[test]
    fn out_of_range_energy_is_insufficient_data() {
        let spectrum = synthetic(&[(1000.0, 6.404, 0.05)]);
        let err = fitter().fit_peak(&spectrum, 1e30, 0.1).unwrap_err();
        assert_eq!(
            err,
            XrfError::InsufficientData {
                energy_kev: 1e30,
                channels: 0,
            }
        );
    }

    #[test]
    fn intensity_of_non_finite_inputs_is_zero() {
        assert_eq!(peak_intensity(f64::INFINITY, 0.1), 0.0);
        assert_eq!(peak_intensity(f64::NAN, 0.1), 0.0);
        assert!((peak_intensity(1000.0, 0.05) - 125.331).abs() < 1e-3);
    }
}
