//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums (`Outcome`, `ModelSpec`) and `FitConfig`
//! - daily observation series (`Series`)
//! - fit outputs (`FittedModel`, `PredictionFrame`, `CurveSummary`)

pub mod types;

pub use types::*;
