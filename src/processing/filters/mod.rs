pub mod bank;
pub mod biquad;
pub mod pool;

pub use bank::{BandSelection, FilterBank, StageConfig};
pub use biquad::{BiquadCoeffs, BiquadFilter, BiquadSpec, FilterType};
pub use pool::FilterPool;
