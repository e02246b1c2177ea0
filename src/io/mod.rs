//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - prediction CSV export (`export`)
//! - whole-run JSON export (`json`)

pub mod export;
pub mod ingest;
pub mod json;

pub use export::*;
pub use ingest::*;
pub use json::*;
