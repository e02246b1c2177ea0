//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - derive starting values per family (`start`)
//! - Levenberg–Marquardt nonlinear least squares (`fitter`)
//! - information-criterion comparison across families (`selection`)
//! - Moving Block Bootstrap forecast bands (`bootstrap`)

pub mod bootstrap;
pub mod fitter;
pub mod selection;
pub mod start;

pub use bootstrap::*;
pub use fitter::*;
pub use selection::*;
pub use start::*;
