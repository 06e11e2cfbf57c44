pub mod report;
pub mod spectrum;

pub use report::{AnalysisReport, LineFitRecord, LineStatus, SolverDiagnostics};
pub use spectrum::{Footprint, GeoPoint, Spectrum, SpectrumHeader, SpectrumPayload};
