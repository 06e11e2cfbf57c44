pub mod kernel;
pub mod matrix;
pub mod stats;
pub mod wavelet;

pub use kernel::MovingAverage;
pub use matrix::MatrixHelper;
pub use stats::StatsHelper;
pub use wavelet::HaarWavelet;
