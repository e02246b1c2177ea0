//! CSV ingest and normalization.
//!
//! Turns a daily surveillance CSV (Italian civil-protection layout or its
//! English equivalent) into one cumulative `Series` per requested outcome.
//!
//! Design goals:
//! - **Strict schema**: the date column and every requested outcome column must exist
//! - **Strict days**: rows must be consecutive days in increasing order
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::debug;

use crate::domain::{Observation, Outcome, Series};
use crate::error::AppError;

const DATE_COLUMNS: [&str; 2] = ["data", "date"];

/// Summary stats about the rows that were read.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_days: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

/// Ingest output: one series per requested outcome, plus stats.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub series: Vec<Series>,
    pub stats: DatasetStats,
}

/// Load the requested outcome series from a CSV file.
pub fn load_series(path: &Path, outcomes: &[Outcome]) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let data = read_series(file, outcomes)?;
    debug!(
        path = %path.display(),
        days = data.stats.n_days,
        first = %data.stats.first_date,
        last = %data.stats.last_date,
        "CSV ingested"
    );
    Ok(data)
}

/// Parse the requested outcome series from any CSV reader.
pub fn read_series<R: Read>(input: R, outcomes: &[Outcome]) -> Result<IngestedData, AppError> {
    if outcomes.is_empty() {
        return Err(AppError::new(2, "No outcomes requested."));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let date_idx = find_column(&header_map, &DATE_COLUMNS).ok_or_else(|| {
        AppError::new(2, "Missing required date column: `data` (or `date`)")
    })?;
    let columns: Vec<(Outcome, usize)> = outcomes
        .iter()
        .map(|&outcome| {
            find_column(&header_map, outcome.column_aliases())
                .map(|idx| (outcome, idx))
                .ok_or_else(|| {
                    AppError::new(
                        2,
                        format!(
                            "Missing column for {}: expected one of `{}`",
                            outcome.display_name(),
                            outcome.column_aliases().join("`, `")
                        ),
                    )
                })
        })
        .collect::<Result<_, _>>()?;

    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header, CSV lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("CSV parse error on line {line}: {e}")))?;

        let date = get_required(&record, date_idx, line, "date").and_then(|s| parse_date(s, line))?;
        if let Some(prev) = dates.last() {
            let step = (date - *prev).num_days();
            if step != 1 {
                return Err(AppError::new(
                    2,
                    format!("Line {line}: date {date} does not follow {prev} by one day (step {step})."),
                ));
            }
        }
        dates.push(date);

        for (slot, (outcome, col)) in values.iter_mut().zip(&columns) {
            let raw = get_required(&record, *col, line, outcome.display_name())?;
            slot.push(parse_count(raw, line, *outcome)?);
        }
    }

    let (Some(&first_date), Some(&last_date)) = (dates.first(), dates.last()) else {
        return Err(AppError::new(3, "CSV contains no data rows."));
    };

    let series = columns
        .iter()
        .zip(values)
        .map(|((outcome, _), ys)| Series {
            outcome: *outcome,
            observations: dates
                .iter()
                .zip(ys)
                .map(|(&date, value)| Observation { date, value })
                .collect(),
        })
        .collect();

    Ok(IngestedData {
        series,
        stats: DatasetStats {
            n_days: dates.len(),
            first_date,
            last_date,
        },
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|a| header_map.get(*a).copied())
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, line: usize, name: &str) -> Result<&'a str, AppError> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::new(2, format!("Line {line}: missing value for {name}.")))
}

/// ISO date, ignoring any time suffix such as `T18:00:00`.
fn parse_date(s: &str, line: usize) -> Result<NaiveDate, AppError> {
    let day = s.split(['T', ' ']).next().unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| AppError::new(2, format!("Line {line}: invalid date '{s}', expected YYYY-MM-DD.")))
}

fn parse_count(s: &str, line: usize, outcome: Outcome) -> Result<f64, AppError> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(AppError::new(
            2,
            format!("Line {line}: invalid {} count '{s}'.", outcome.display_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITALIAN: &str = "\u{feff}data,stato,totale_casi,deceduti,dimessi_guariti\n\
        2020-02-24T18:00:00,ITA,229,7,1\n\
        2020-02-25T18:00:00,ITA,322,10,1\n\
        2020-02-26T18:00:00,ITA,400,12,3\n";

    #[test]
    fn reads_italian_layout() {
        let data = read_series(ITALIAN.as_bytes(), &Outcome::ALL).unwrap();
        assert_eq!(data.stats.n_days, 3);
        assert_eq!(data.stats.first_date, NaiveDate::from_ymd_opt(2020, 2, 24).unwrap());
        assert_eq!(data.series.len(), 3);
        assert_eq!(data.series[0].outcome, Outcome::TotalCases);
        assert_eq!(data.series[0].y(), vec![229.0, 322.0, 400.0]);
        assert_eq!(data.series[1].y(), vec![7.0, 10.0, 12.0]);
    }

    #[test]
    fn reads_english_layout_and_subset_of_outcomes() {
        let csv = "date,deaths\n2020-03-01,1\n2020-03-02,4\n";
        let data = read_series(csv.as_bytes(), &[Outcome::Deaths]).unwrap();
        assert_eq!(data.series.len(), 1);
        assert_eq!(data.series[0].y(), vec![1.0, 4.0]);
    }

    #[test]
    fn rejects_missing_outcome_column() {
        let csv = "date,deaths\n2020-03-01,1\n";
        let err = read_series(csv.as_bytes(), &[Outcome::Recovered]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("dimessi_guariti"));
    }

    #[test]
    fn rejects_gaps_and_out_of_order_days() {
        let gap = "date,deaths\n2020-03-01,1\n2020-03-03,4\n";
        assert!(read_series(gap.as_bytes(), &[Outcome::Deaths]).is_err());

        let reversed = "date,deaths\n2020-03-02,1\n2020-03-01,4\n";
        assert!(read_series(reversed.as_bytes(), &[Outcome::Deaths]).is_err());

        let duplicate = "date,deaths\n2020-03-01,1\n2020-03-01,4\n";
        assert!(read_series(duplicate.as_bytes(), &[Outcome::Deaths]).is_err());
    }

    #[test]
    fn rejects_negative_and_empty_counts() {
        let negative = "date,deaths\n2020-03-01,-1\n";
        assert!(read_series(negative.as_bytes(), &[Outcome::Deaths]).is_err());
        let empty = "date,deaths\n2020-03-01,\n";
        assert!(read_series(empty.as_bytes(), &[Outcome::Deaths]).is_err());
    }

    #[test]
    fn header_only_is_insufficient_data() {
        let err = read_series("date,deaths\n".as_bytes(), &[Outcome::Deaths]).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
