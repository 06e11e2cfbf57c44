use crate::coefficients::CoefficientTensors;
use crate::elements::{Element, ElementMap};
use crate::math::StatsHelper;
use crate::prelude::{AnalysisConfig, ProcessingStage, XrfError, XrfResult};
use crate::telemetry::log::LogManager;
use serde::Serialize;
use std::sync::Arc;

/// Result of a Claisse-Quintin solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverReport {
    /// Mass fractions in coefficient-table order, summing to one.
    pub concentrations: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl SolverReport {
    pub fn to_map(&self) -> ElementMap {
        Element::ALL
            .iter()
            .zip(self.concentrations.iter())
            .map(|(&element, &value)| (element, value))
            .collect()
    }
}

/// Iterative matrix-effect correction over shared coefficient tables.
pub struct ConcentrationSolver {
    tensors: Arc<CoefficientTensors>,
    max_iterations: usize,
    tolerance: f64,
    logger: LogManager,
}

impl ConcentrationSolver {
    pub fn new(tensors: Arc<CoefficientTensors>, config: &AnalysisConfig) -> Self {
        Self {
            tensors,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            logger: LogManager::new("solver"),
        }
    }

    pub fn with_limits(mut self, max_iterations: usize, tolerance: f64) -> Self {
        self.max_iterations = max_iterations;
        self.tolerance = tolerance;
        self
    }

    fn check_len(&self, actual: usize, context: &str) -> XrfResult<()> {
        if actual != self.tensors.len() {
            return Err(XrfError::LengthMismatch {
                context: context.to_string(),
                expected: self.tensors.len(),
                actual,
            });
        }
        Ok(())
    }

    /// Multiplicative matrix-effect correction for analyte `i`.
    fn correction(&self, i: usize, current: &[f64], total: f64) -> f64 {
        let tables = &*self.tensors;
        let n = current.len();
        let mut correction = 1.0;
        for j in (0..n).filter(|&j| j != i) {
            let cj = current[j];
            correction += cj * (tables.primary(i, j) + tables.secondary(i, j) * total);
            for k in (0..n).filter(|&k| k != i && k != j) {
                correction += cj * current[k] * tables.ternary(i, j, k);
            }
        }
        correction
    }

    /// One fixed-point update. Returns `None` when every raw estimate is zero.
    fn iterate(&self, intensities: &[f64], current: &[f64]) -> Option<Vec<f64>> {
        let total: f64 = current.iter().sum();
        let raw: Vec<f64> = intensities
            .iter()
            .enumerate()
            .map(|(i, &intensity)| {
                if intensity == 0.0 {
                    0.0
                } else {
                    StatsHelper::sanitize(intensity * self.correction(i, current, total))
                }
            })
            .collect();
        let sum: f64 = raw.iter().sum();
        if !(sum.is_finite() && sum > 0.0) {
            return None;
        }
        Some(raw.into_iter().map(|value| value / sum).collect())
    }

    fn sanitized(intensities: &[f64]) -> Vec<f64> {
        intensities.iter().map(|&v| StatsHelper::sanitize(v)).collect()
    }

    /// Applies a single iteration to `current`, e.g. to check that a
    /// converged vector is a fixed point.
    pub fn step(&self, intensities: &[f64], current: &[f64]) -> XrfResult<Vec<f64>> {
        self.check_len(intensities.len(), "solver intensities")?;
        self.check_len(current.len(), "solver concentrations")?;
        let intensities = Self::sanitized(intensities);
        Ok(self
            .iterate(&intensities, current)
            .unwrap_or_else(|| current.to_vec()))
    }

    /// Runs the bounded fixed-point iteration from equal concentrations.
    pub fn solve(&self, intensities: &[f64]) -> XrfResult<SolverReport> {
        self.check_len(intensities.len(), "solver intensities")?;
        if self.max_iterations == 0 {
            return Err(XrfError::InvalidConfig(
                "solver needs at least one iteration".into(),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(XrfError::InvalidConfig(format!(
                "solver tolerance must be positive, got {}",
                self.tolerance
            )));
        }

        let intensities = Self::sanitized(intensities);
        let n = intensities.len();
        let mut concentrations = vec![1.0 / n as f64; n];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;
            let Some(next) = self.iterate(&intensities, &concentrations) else {
                self.logger.degraded(
                    "all raw estimates are zero; keeping the previous concentrations",
                );
                break;
            };
            let change = next
                .iter()
                .zip(concentrations.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            concentrations = next;
            self.logger
                .detail(&format!("iteration {} max change {:.3e}", iterations, change));
            if change < self.tolerance {
                converged = true;
                break;
            }
        }

        if converged {
            self.logger
                .record(&format!("converged after {} iterations", iterations));
        } else {
            self.logger.degraded(&format!(
                "no convergence after {} iterations; returning last iterate",
                iterations
            ));
        }
        Ok(SolverReport {
            concentrations,
            iterations,
            converged,
        })
    }

    /// Solves from an element-keyed map; missing elements count as zero.
    pub fn solve_map(&self, intensities: &ElementMap) -> XrfResult<SolverReport> {
        let ordered: Vec<f64> = Element::ALL
            .iter()
            .map(|element| intensities.get(element).copied().unwrap_or(0.0))
            .collect();
        self.solve(&ordered)
    }
}

impl ProcessingStage for ConcentrationSolver {
    type Input = Vec<f64>;
    type Output = SolverReport;

    fn name(&self) -> &'static str {
        self.logger.component()
    }

    fn execute(&self, input: Vec<f64>) -> XrfResult<SolverReport> {
        self.solve(&input)
    }
}
