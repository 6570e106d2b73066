//! Writing analysis results to disk
//!
//! Four artifacts are produced per run: the full parsed structure as JSON,
//! the normalized group table, the state baselines and the electorate
//! share table as CSV.

use crate::baseline::StateBaseline;
use crate::parser::ParsedStateData;
use crate::{ReportAnalysis, ReportConfig, ReportError};
use log::info;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default directory for run outputs
pub const DEFAULT_OUTPUT_DIR: &str = "bottom_up_outputs";

/// Paths of the files written by [`write_outputs`]
#[derive(Debug, Clone)]
pub struct OutputFiles {
    pub parsed_json: PathBuf,
    pub groups_csv: PathBuf,
    pub baselines_csv: PathBuf,
    pub demographics_csv: PathBuf,
}

impl OutputFiles {
    /// File locations inside `dir` for a report of the configured year
    pub fn in_dir(dir: &Path, config: &ReportConfig) -> Self {
        Self {
            parsed_json: dir.join("state_data_full_parsed.json"),
            groups_csv: dir.join("state_groups_full_parsed.csv"),
            baselines_csv: dir.join(format!("state_baselines_{}.csv", config.year)),
            demographics_csv: dir.join(format!("state_demographics_{}.csv", config.year)),
        }
    }
}

/// Parsed states keyed by name, in block order
struct ParsedByState<'a>(&'a [ParsedStateData]);

impl Serialize for ParsedByState<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for state in self.0 {
            map.serialize_entry(state.state, state)?;
        }
        map.end()
    }
}

/// Write the parsed structure as pretty JSON
pub fn write_parsed_json<W: Write>(parsed: &[ParsedStateData], writer: W) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(writer, &ParsedByState(parsed))?;
    Ok(())
}

/// Write serializable rows as CSV with a header line
pub fn write_csv<W: Write, T: Serialize>(rows: &[T], writer: W) -> Result<(), ReportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Machine-readable summary of one run
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub page_count: usize,
    pub states_found: usize,
    pub group_rows: usize,
    pub output_dir: &'a Path,
    pub baselines: &'a [StateBaseline],
}

impl<'a> RunSummary<'a> {
    pub fn new(analysis: &'a ReportAnalysis, output_dir: &'a Path) -> Self {
        Self {
            page_count: analysis.page_count,
            states_found: analysis.blocks.len(),
            group_rows: analysis.rows.len(),
            output_dir,
            baselines: &analysis.baselines,
        }
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// `{"error": "..."}` for any displayable error
pub fn error_json<E: std::fmt::Display>(error: &E) -> String {
    serde_json::json!({ "error": error.to_string() }).to_string()
}

fn create(path: &Path) -> Result<BufWriter<File>, ReportError> {
    Ok(BufWriter::new(File::create(path)?))
}

/// Write all four artifacts into `dir`, creating it if needed
pub fn write_outputs(
    analysis: &ReportAnalysis,
    dir: &Path,
    config: &ReportConfig,
) -> Result<OutputFiles, ReportError> {
    fs::create_dir_all(dir)?;
    let files = OutputFiles::in_dir(dir, config);

    let mut json = create(&files.parsed_json)?;
    write_parsed_json(&analysis.parsed, &mut json)?;
    json.flush()?;

    write_csv(&analysis.rows, create(&files.groups_csv)?)?;
    write_csv(&analysis.baselines, create(&files.baselines_csv)?)?;
    write_csv(&analysis.demographic_shares(), create(&files.demographics_csv)?)?;

    info!("Saved outputs to {}", dir.display());
    Ok(files)
}
