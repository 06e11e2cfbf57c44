use crate::elements::{Element, ElementMap};
use crate::interface::Spectrum;
use crate::math::StatsHelper;
use crate::prelude::{AnalysisConfig, ProcessingStage, XrfError, XrfResult};
use crate::processing::peak::{PeakFit, PeakFitter};
use crate::telemetry::log::LogManager;

/// What happened to one registry line during aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Fit(PeakFit),
    /// The fit window held too few channels; the line contributes zero.
    Skipped(XrfError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineFit {
    pub element: Element,
    pub line: &'static str,
    pub energy_kev: f64,
    pub outcome: LineOutcome,
}

impl LineFit {
    pub fn intensity(&self) -> f64 {
        match &self.outcome {
            LineOutcome::Fit(fit) => fit.intensity(),
            LineOutcome::Skipped(_) => 0.0,
        }
    }

    pub fn uncertainty(&self) -> f64 {
        match &self.outcome {
            LineOutcome::Fit(fit) => fit.uncertainty(),
            LineOutcome::Skipped(_) => 0.0,
        }
    }
}

/// Element-level intensities with their uncertainty proxies.
///
/// Every value is finite and non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityVector {
    pub intensities: ElementMap,
    pub uncertainties: ElementMap,
    pub lines: Vec<LineFit>,
}

impl IntensityVector {
    pub fn intensity(&self, element: Element) -> f64 {
        self.intensities.get(&element).copied().unwrap_or(0.0)
    }

    pub fn uncertainty(&self, element: Element) -> f64 {
        self.uncertainties.get(&element).copied().unwrap_or(0.0)
    }

    /// Intensities in coefficient-table order.
    pub fn to_vec(&self) -> Vec<f64> {
        Element::ALL.iter().map(|&e| self.intensity(e)).collect()
    }

    pub fn degraded_fits(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| matches!(&line.outcome, LineOutcome::Fit(fit) if fit.is_degraded()))
            .count()
    }

    pub fn skipped_lines(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| matches!(line.outcome, LineOutcome::Skipped(_)))
            .count()
    }
}

/// Fits every registry line and sums the results per element.
pub struct IntensityAggregator {
    fitter: PeakFitter,
    logger: LogManager,
}

impl IntensityAggregator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            fitter: PeakFitter::new(config),
            logger: LogManager::new("aggregate"),
        }
    }

    pub fn aggregate(&self, spectrum: &Spectrum) -> IntensityVector {
        let mut intensities = ElementMap::new();
        let mut uncertainties = ElementMap::new();
        let mut lines = Vec::new();

        for element in Element::ALL {
            let mut element_intensity = 0.0;
            let mut element_uncertainty = 0.0;

            for line in element.lines() {
                let outcome = match self.fitter.fit_line(spectrum, line.energy_kev) {
                    Ok(fit) => {
                        if fit.is_degraded() {
                            self.logger.degraded(&format!(
                                "{} {} fit degraded to zero: {:?}",
                                element, line.name, fit
                            ));
                        }
                        LineOutcome::Fit(fit)
                    }
                    Err(err) => {
                        self.logger
                            .degraded(&format!("{} {} skipped: {}", element, line.name, err));
                        LineOutcome::Skipped(err)
                    }
                };
                let fit = LineFit {
                    element,
                    line: line.name,
                    energy_kev: line.energy_kev,
                    outcome,
                };
                element_intensity += fit.intensity();
                element_uncertainty += fit.uncertainty();
                lines.push(fit);
            }

            if element_intensity <= 0.0 {
                element_intensity = 0.0;
            }
            intensities.insert(element, StatsHelper::sanitize(element_intensity));
            uncertainties.insert(element, StatsHelper::sanitize(element_uncertainty));
        }

        let vector = IntensityVector {
            intensities,
            uncertainties,
            lines,
        };
        self.logger.record(&format!(
            "{}: {} lines, {} degraded, {} skipped",
            spectrum.header().source_name,
            vector.lines.len(),
            vector.degraded_fits(),
            vector.skipped_lines()
        ));
        vector
    }
}

impl ProcessingStage for IntensityAggregator {
    type Input = Spectrum;
    type Output = IntensityVector;

    fn name(&self) -> &'static str {
        self.logger.component()
    }

    fn execute(&self, input: Spectrum) -> XrfResult<IntensityVector> {
        Ok(self.aggregate(&input))
    }
}
