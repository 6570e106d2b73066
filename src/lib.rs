//! Per-state demographic extraction from multi-state survey reports
//!
//! This crate provides:
//! - Page text extraction from report PDFs
//! - Segmentation of the page stream into per-state blocks
//! - Classification of group lines (age, race, education, gender, misc)
//! - Normalization of group shares and sample-weighted state baselines
//! - CSV/JSON output of the parsed structure and derived tables

pub mod baseline;
pub mod extractor;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod segmenter;
pub mod states;

pub use baseline::{compute_state_baselines, StateBaseline};
pub use extractor::{extract_page_texts, extract_page_texts_mem};
pub use normalize::{demographic_shares, flatten, normalize, DemographicShare, FlatRow, GroupRow};
pub use output::{write_outputs, OutputFiles};
pub use parser::{
    classify_line, parse_blocks, parse_state_block, GroupEntry, GroupMap, GroupType, NumericValues,
    ParsedStateData,
};
pub use segmenter::{derive_blocks, find_state_starts, segment_pages, HeaderPattern, StateBlock};
pub use states::STATES;

use log::info;
use std::ops::RangeInclusive;
use std::path::Path;

/// Configuration shared by every pipeline stage
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Election year in the section header ("2024 Presidential – Ohio")
    pub year: u32,
    /// Report title in the section header
    pub report_title: String,
    /// Number of leading non-empty lines searched for the sample size
    pub sample_scan_lines: usize,
    /// Group total sums inside this range are left as-is
    pub rescale_tolerance: RangeInclusive<f64>,
    /// Parse state blocks on the rayon thread pool
    pub parallel: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            year: 2024,
            report_title: "Presidential".to_string(),
            sample_scan_lines: 80,
            rescale_tolerance: 95.0..=105.0,
            parallel: true,
        }
    }
}

/// Everything derived from one report
#[derive(Debug)]
pub struct ReportAnalysis {
    /// Number of pages in the document
    pub page_count: usize,
    /// Per-state page ranges, ordered by first page
    pub blocks: Vec<StateBlock>,
    /// Parsed data per state, in block order
    pub parsed: Vec<ParsedStateData>,
    /// Retained, normalized group rows
    pub rows: Vec<FlatRow>,
    /// One baseline per state with retained rows
    pub baselines: Vec<StateBaseline>,
}

impl ReportAnalysis {
    /// Electorate share projection of the normalized rows
    pub fn demographic_shares(&self) -> Vec<DemographicShare> {
        demographic_shares(&self.rows)
    }
}

/// Run segmentation, parsing, normalization and aggregation over page text
pub fn analyze_pages(pages: &[String], config: &ReportConfig) -> ReportAnalysis {
    let blocks = segment_pages(pages, config);
    info!("Found {} state sections in {} pages", blocks.len(), pages.len());

    let parsed = parse_blocks(pages, &blocks, config);
    let rows = normalize(&flatten(&parsed), config);
    let baselines = compute_state_baselines(&rows);
    info!("Computed {} state baselines", baselines.len());

    ReportAnalysis {
        page_count: pages.len(),
        blocks,
        parsed,
        rows,
        baselines,
    }
}

/// Process a report PDF file
///
/// The document is released once its page text has been extracted.
pub fn process_report<P: AsRef<Path>>(
    path: P,
    config: &ReportConfig,
) -> Result<ReportAnalysis, ReportError> {
    let pages = extract_page_texts(path)?;
    Ok(analyze_pages(&pages, config))
}

/// Process a report PDF from a memory buffer
pub fn process_report_mem(
    buffer: &[u8],
    config: &ReportConfig,
) -> Result<ReportAnalysis, ReportError> {
    let pages = extract_page_texts_mem(buffer)?;
    Ok(analyze_pages(&pages, config))
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("PDF has no pages")]
    NoPages,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<lopdf::Error> for ReportError {
    fn from(e: lopdf::Error) -> Self {
        ReportError::Parse(e.to_string())
    }
}
