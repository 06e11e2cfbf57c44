//! Quantification core for X-ray fluorescence spectra.
//!
//! A raw count spectrum flows through four pure stages: wavelet/moving-average
//! preprocessing, per-line Gaussian fitting, per-element intensity aggregation
//! and the Claisse-Quintin matrix-effect solver. The only long-lived state is
//! the immutable coefficient tables, shared read-only between analyses.

pub mod coefficients;
pub mod elements;
pub mod interface;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod ratios;
pub mod telemetry;

pub use coefficients::CoefficientTensors;
pub use elements::{Element, ElementMap};
pub use interface::{AnalysisReport, Spectrum, SpectrumHeader};
pub use pipeline::XrfPipeline;
pub use prelude::{AnalysisConfig, ProcessingStage, XrfError, XrfResult};
