//! Entry points chaining the four stages:
//! `raw spectrum -> preprocess -> peak fits -> intensities -> concentrations`.

use crate::coefficients::CoefficientTensors;
use crate::elements::{ElementMap, ELEMENT_COUNT};
use crate::interface::{AnalysisReport, Spectrum};
use crate::prelude::{AnalysisConfig, ProcessingStage, XrfError, XrfResult};
use crate::processing::{
    ConcentrationSolver, IntensityAggregator, IntensityVector, Preprocessor, SolverReport,
};
use std::sync::Arc;

/// Immutable quantification pipeline; share it freely across threads.
pub struct XrfPipeline {
    config: AnalysisConfig,
    tensors: Arc<CoefficientTensors>,
    preprocessor: Preprocessor,
    aggregator: IntensityAggregator,
    solver: ConcentrationSolver,
}

impl XrfPipeline {
    /// Pipeline over the process-wide reference coefficient tables.
    pub fn new(config: AnalysisConfig) -> XrfResult<Self> {
        Self::with_tensors(config, CoefficientTensors::shared())
    }

    /// Pipeline over custom tables, which must cover every quantified element.
    pub fn with_tensors(config: AnalysisConfig, tensors: Arc<CoefficientTensors>) -> XrfResult<Self> {
        config.validate()?;
        if tensors.len() != ELEMENT_COUNT {
            return Err(XrfError::LengthMismatch {
                context: "coefficient tensors".into(),
                expected: ELEMENT_COUNT,
                actual: tensors.len(),
            });
        }
        Ok(Self {
            preprocessor: Preprocessor::new(&config),
            aggregator: IntensityAggregator::new(&config),
            solver: ConcentrationSolver::new(tensors.clone(), &config),
            tensors,
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Preprocesses the sample (subtracting `background_scale` times the
    /// background when given) and aggregates per-element intensities.
    ///
    /// The sample must carry the configured energy calibration.
    pub fn analyze_intensities(
        &self,
        sample: &Spectrum,
        background: Option<&Spectrum>,
        background_scale: f64,
    ) -> XrfResult<IntensityVector> {
        if !sample.is_calibrated_at(self.config.kev_per_channel) {
            return Err(XrfError::Format {
                source_name: sample.header().source_name.clone(),
                reason: format!(
                    "calibrated at {} keV/channel but the pipeline is configured for {}",
                    sample.kev_per_channel(),
                    self.config.kev_per_channel
                ),
            });
        }
        let net = self.preprocessor.prepare(sample, background, background_scale)?;
        self.aggregator.execute(net)
    }

    /// Claisse-Quintin solve with explicit iteration limits.
    pub fn solve_concentrations(
        &self,
        intensities: &ElementMap,
        max_iterations: usize,
        tolerance: f64,
    ) -> XrfResult<SolverReport> {
        ConcentrationSolver::new(self.tensors.clone(), &self.config)
            .with_limits(max_iterations, tolerance)
            .solve_map(intensities)
    }

    /// Full pipeline using the configured background scale and solver limits.
    pub fn analyze_sample(
        &self,
        sample: &Spectrum,
        background: Option<&Spectrum>,
    ) -> XrfResult<AnalysisReport> {
        let intensities =
            self.analyze_intensities(sample, background, self.config.background_scale)?;
        let solved = self.solver.execute(intensities.to_vec())?;
        Ok(AnalysisReport::new(
            sample.header().clone(),
            &intensities,
            &solved,
        ))
    }
}
