//! Concentration ratios against a reference element, as reported alongside
//! abundance maps.

use crate::elements::Element;
use crate::interface::AnalysisReport;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementRatio {
    Ratio { value: f64, error: f64 },
    /// The element's concentration is zero.
    Insignificant,
}

impl fmt::Display for ElementRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementRatio::Ratio { value, error } => write!(f, "{value:.5} ± {error:.5}"),
            ElementRatio::Insignificant => f.write_str("Insignificant"),
        }
    }
}

fn round5(value: f64) -> f64 {
    (value * 1e5).round() / 1e5
}

/// Ratios of every other element's concentration to `reference`.
///
/// The error adds the two relative uncertainty proxies. Elements with a
/// non-zero concentration but no measured intensity (or no reference
/// intensity) are left out.
pub fn element_ratios(report: &AnalysisReport, reference: Element) -> BTreeMap<Element, ElementRatio> {
    let reference_concentration = report.concentration(reference);
    let reference_intensity = report.intensity(reference);
    let reference_uncertainty = report.uncertainty(reference);

    Element::ALL
        .iter()
        .copied()
        .filter(|&element| element != reference)
        .filter_map(|element| {
            let concentration = report.concentration(element);
            if concentration == 0.0 {
                return Some((element, ElementRatio::Insignificant));
            }
            if report.intensity(element) == 0.0
                || reference_intensity == 0.0
                || reference_concentration <= 0.0
            {
                return None;
            }
            let value = round5(concentration / reference_concentration);
            let error = round5(value * (report.uncertainty(element) + reference_uncertainty));
            Some((element, ElementRatio::Ratio { value, error }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::uniform_map;
    use crate::interface::{SolverDiagnostics, SpectrumHeader};

    fn report() -> AnalysisReport {
        let mut intensities = uniform_map(1.0);
        let mut concentrations = uniform_map(0.1);
        let mut uncertainties = uniform_map(0.01);
        concentrations.insert(Element::Si, 0.4);
        concentrations.insert(Element::O, 0.0);
        intensities.insert(Element::O, 0.0);
        intensities.insert(Element::Na, 0.0);
        uncertainties.insert(Element::Si, 0.02);
        AnalysisReport {
            header: SpectrumHeader::named("ratios"),
            intensities,
            uncertainties,
            concentrations,
            solver: SolverDiagnostics {
                iterations: 1,
                converged: true,
            },
            lines: Vec::new(),
        }
    }

    #[test]
    fn ratios_against_silicon() {
        let ratios = element_ratios(&report(), Element::Si);
        assert!(!ratios.contains_key(&Element::Si));
        assert_eq!(ratios[&Element::O], ElementRatio::Insignificant);
        assert!(!ratios.contains_key(&Element::Na));
        assert_eq!(
            ratios[&Element::Fe],
            ElementRatio::Ratio {
                value: 0.25,
                error: 0.0075
            }
        );
        assert_eq!(ratios[&Element::Fe].to_string(), "0.25000 ± 0.00750");
    }
}
