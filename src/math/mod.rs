//! Numerical building blocks: least squares, a derivative-free simplex and
//! summary statistics.

pub mod ols;
pub mod simplex;
pub mod stats;

pub use ols::*;
pub use simplex::*;
pub use stats::*;
