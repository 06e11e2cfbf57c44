pub mod aggregate;
pub mod peak;
pub mod preprocess;
pub mod solver;

pub use aggregate::{IntensityAggregator, IntensityVector, LineFit, LineOutcome};
pub use peak::{peak_intensity, DegradeReason, FittedPeak, PeakFit, PeakFitter};
pub use preprocess::{PreprocessInput, Preprocessor};
pub use solver::{ConcentrationSolver, SolverReport};
