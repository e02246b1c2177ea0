//! Export prediction frames to CSV.
//!
//! One row per (outcome, model, day), meant to be easy to consume in
//! spreadsheets or downstream plotting scripts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::app::pipeline::RunOutput;
use crate::error::AppError;

/// Write every prediction frame of a run to a CSV file.
pub fn write_predictions_csv(path: &Path, run: &RunOutput) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_predictions(&mut out, run)?;
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

/// Write prediction rows to any writer.
///
/// `observed` is filled inside the fitted range, `lower`/`upper` beyond it.
pub fn write_predictions<W: Write>(out: &mut W, run: &RunOutput) -> Result<(), AppError> {
    writeln!(out, "outcome,model,x,date,observed,fitted,lower,upper,level")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for analysis in &run.analyses {
        let outcome = serde_label(&analysis.outcome);
        for frame in &analysis.predictions {
            let fit = analysis.fits.iter().find(|f| f.kind == frame.model);
            let model = serde_label(&frame.model);
            for row in &frame.rows {
                let observed = fit
                    .filter(|f| row.x <= f.n())
                    .map(|f| f.fitted[row.x - 1] + f.residuals[row.x - 1]);
                writeln!(
                    out,
                    "{},{},{},{},{},{:.4},{},{},{}",
                    outcome,
                    model,
                    row.x,
                    row.date,
                    fmt_opt(observed),
                    row.fitted,
                    fmt_opt(row.lower),
                    fmt_opt(row.upper),
                    frame.level,
                )
                .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
            }
        }
    }

    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.4}")).unwrap_or_default()
}

/// Serialized enum name, matching the JSON export.
fn serde_label<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}
