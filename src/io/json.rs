//! JSON export of a whole run.
//!
//! The document mirrors `RunOutput`: per-series fits, comparison tables,
//! prediction frames, curve summaries and recorded failures. Non-finite numbers
//! (an undefined AICc, for instance) are written as `null`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::app::pipeline::RunOutput;
use crate::error::AppError;

/// Write a run JSON file.
pub fn write_run_json(path: &Path, run: &RunOutput) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create run JSON '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_run(&mut out, run)?;
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush run JSON: {e}")))
}

/// Write a run as pretty-printed JSON to any writer.
pub fn write_run<W: Write>(out: &mut W, run: &RunOutput) -> Result<(), AppError> {
    serde_json::to_writer_pretty(out, run)
        .map_err(|e| AppError::new(2, format!("Failed to write run JSON: {e}")))
}
