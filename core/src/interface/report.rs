use crate::elements::{Element, ElementMap};
use crate::interface::spectrum::SpectrumHeader;
use crate::processing::aggregate::{IntensityVector, LineFit, LineOutcome};
use crate::processing::peak::{DegradeReason, FittedPeak, PeakFit};
use crate::processing::solver::SolverReport;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LineStatus {
    Fitted,
    Absent,
    Degraded { reason: DegradeReason },
    Skipped { reason: String },
}

/// Serializable view of a single line fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineFitRecord {
    pub element: Element,
    pub line: String,
    pub energy_kev: f64,
    #[serde(flatten)]
    pub status: LineStatus,
    pub amplitude: f64,
    pub center_kev: f64,
    pub sigma_kev: f64,
    pub uncertainty: f64,
    pub intensity: f64,
}

impl From<&LineFit> for LineFitRecord {
    fn from(fit: &LineFit) -> Self {
        let (status, peak) = match &fit.outcome {
            LineOutcome::Fit(outcome) => {
                let status = match outcome {
                    PeakFit::Fitted(_) => LineStatus::Fitted,
                    PeakFit::Absent => LineStatus::Absent,
                    PeakFit::Degraded { reason, .. } => LineStatus::Degraded { reason: *reason },
                };
                (status, Some(outcome.peak()))
            }
            LineOutcome::Skipped(err) => (
                LineStatus::Skipped {
                    reason: err.to_string(),
                },
                None,
            ),
        };
        let peak = peak.unwrap_or(FittedPeak::ZERO);
        Self {
            element: fit.element,
            line: fit.line.to_string(),
            energy_kev: fit.energy_kev,
            status,
            amplitude: peak.amplitude,
            center_kev: peak.center_kev,
            sigma_kev: peak.sigma_kev,
            uncertainty: fit.uncertainty(),
            intensity: fit.intensity(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SolverDiagnostics {
    pub iterations: usize,
    pub converged: bool,
}

/// Terminal artifact of a full analysis, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub header: SpectrumHeader,
    pub intensities: ElementMap,
    pub uncertainties: ElementMap,
    pub concentrations: ElementMap,
    pub solver: SolverDiagnostics,
    pub lines: Vec<LineFitRecord>,
}

impl AnalysisReport {
    pub fn new(header: SpectrumHeader, intensities: &IntensityVector, solved: &SolverReport) -> Self {
        Self {
            header,
            intensities: intensities.intensities.clone(),
            uncertainties: intensities.uncertainties.clone(),
            concentrations: solved.to_map(),
            solver: SolverDiagnostics {
                iterations: solved.iterations,
                converged: solved.converged,
            },
            lines: intensities.lines.iter().map(LineFitRecord::from).collect(),
        }
    }

    pub fn concentration(&self, element: Element) -> f64 {
        self.concentrations.get(&element).copied().unwrap_or(0.0)
    }

    pub fn intensity(&self, element: Element) -> f64 {
        self.intensities.get(&element).copied().unwrap_or(0.0)
    }

    pub fn uncertainty(&self, element: Element) -> f64 {
        self.uncertainties.get(&element).copied().unwrap_or(0.0)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::uniform_map;
    use crate::prelude::XrfError;

    #[test]
    fn report_serializes_with_symbol_keys() {
        let vector = IntensityVector {
            intensities: uniform_map(0.0),
            uncertainties: uniform_map(0.0),
            lines: vec![
                LineFit {
                    element: Element::Fe,
                    line: "Ka",
                    energy_kev: 6.404,
                    outcome: LineOutcome::Fit(PeakFit::Fitted(FittedPeak {
                        amplitude: 1000.0,
                        center_kev: 6.404,
                        sigma_kev: 0.05,
                        uncertainty: 0.01,
                    })),
                },
                LineFit {
                    element: Element::O,
                    line: "Ka",
                    energy_kev: 0.525,
                    outcome: LineOutcome::Skipped(XrfError::InsufficientData {
                        energy_kev: 0.525,
                        channels: 2,
                    }),
                },
            ],
        };
        let solved = SolverReport {
            concentrations: vec![1.0 / 13.0; 13],
            iterations: 3,
            converged: true,
        };
        let report = AnalysisReport::new(SpectrumHeader::named("unit"), &vector, &solved);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"Fe\""));
        assert!(json.contains("\"status\": \"fitted\""));
        assert!(json.contains("\"status\": \"skipped\""));
        assert!((report.lines[0].intensity - 125.331).abs() < 1e-3);
        assert_eq!(report.lines[1].intensity, 0.0);
    }
}
