//! Reporting utilities: formatted terminal output for comparison tables,
//! parameter estimates, peaks and forecasts.

pub mod format;

pub use format::*;
