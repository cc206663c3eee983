pub mod dsp;
pub mod estimator;
pub mod tracker;

pub use dsp::*;
pub use estimator::*;
pub use tracker::*;
