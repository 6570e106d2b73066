//! State segmentation
//!
//! Finds the first page of each state's section and splits the page stream
//! into contiguous per-state blocks. Detection runs in three passes:
//! - a report header naming the state ("2024 Presidential – Ohio")
//! - the state name on a line of its own (only on pages without a header)
//! - the first page mentioning the state anywhere

use crate::states::STATES;
use crate::ReportConfig;
use log::{debug, warn};
use regex::{Regex, RegexBuilder};
use std::ops::Range;

/// Compiled section header pattern for one report
#[derive(Debug, Clone)]
pub struct HeaderPattern {
    regex: Regex,
}

impl HeaderPattern {
    /// Build the header pattern `<year> <title> – <name>` from the config
    pub fn new(config: &ReportConfig) -> Self {
        let pattern = format!(
            r"{}\s+{}\s*[-–]\s*([A-Za-z ]+)",
            regex::escape(&config.year.to_string()),
            regex::escape(config.report_title.trim()),
        );
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .expect("header pattern is built from escaped literals");
        Self { regex }
    }

    /// Region name captured from the first header on the page, if any
    pub fn captured_name<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
    }
}

/// A contiguous range of pages attributed to one state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBlock {
    pub state: &'static str,
    /// Pages of the block, half-open. Empty when the next state starts on
    /// the same page.
    pub pages: Range<usize>,
}

impl StateBlock {
    pub fn start_page(&self) -> usize {
        self.pages.start
    }

    /// Last page of the block (inclusive), `None` for an empty block
    pub fn end_page(&self) -> Option<usize> {
        if self.pages.is_empty() {
            None
        } else {
            Some(self.pages.end - 1)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Record `page` as the first page of `state` unless one is already known
fn record(starts: &mut Vec<(&'static str, usize)>, state: &'static str, page: usize) {
    if !starts.iter().any(|(s, _)| *s == state) {
        debug!("{} starts on page {}", state, page);
        starts.push((state, page));
    }
}

/// Whether `upper` (an uppercased page) has `state_upper` on a line by itself
fn has_standalone_line(upper: &str, state_upper: &str) -> bool {
    upper.contains(&format!("\n{}\n", state_upper))
}

/// Find the first page of every state present in the document.
///
/// The result is ordered by page index; states sharing a page keep the
/// order in which they were detected. States that cannot be found are
/// left out.
pub fn find_state_starts(
    pages: &[String],
    header: &HeaderPattern,
) -> Vec<(&'static str, usize)> {
    let mut starts: Vec<(&'static str, usize)> = Vec::new();
    let uppercased: Vec<String> = pages.iter().map(|p| p.to_uppercase()).collect();

    for (i, text) in pages.iter().enumerate() {
        if text.is_empty() {
            continue;
        }
        let upper = &uppercased[i];

        if let Some(found) = header.captured_name(text) {
            let found = found.to_uppercase();
            for state in STATES {
                if found.contains(&state.to_uppercase()) {
                    record(&mut starts, state, i);
                }
            }
        } else {
            for state in STATES {
                if has_standalone_line(upper, &state.to_uppercase()) {
                    record(&mut starts, state, i);
                }
            }
        }
    }

    for state in STATES {
        if starts.iter().any(|(s, _)| *s == state) {
            continue;
        }
        let needle = state.to_uppercase();
        match uppercased.iter().position(|upper| upper.contains(&needle)) {
            Some(page) => record(&mut starts, state, page),
            None => warn!("{} not found in document", state),
        }
    }

    // stable sort keeps detection order for shared pages
    starts.sort_by_key(|&(_, page)| page);
    starts
}

/// Turn ordered start pages into contiguous blocks covering the rest of the
/// document.
pub fn derive_blocks(starts: &[(&'static str, usize)], page_count: usize) -> Vec<StateBlock> {
    starts
        .iter()
        .enumerate()
        .map(|(i, &(state, start))| {
            let end = starts
                .get(i + 1)
                .map(|&(_, next)| next)
                .unwrap_or(page_count);
            StateBlock {
                state,
                pages: start..end.max(start),
            }
        })
        .collect()
}

/// Concatenated text of a block's pages
pub fn block_text(pages: &[String], block: &StateBlock) -> String {
    let end = block.pages.end.min(pages.len());
    let start = block.pages.start.min(end);
    pages[start..end].join("\n")
}

/// Segment a document into per-state blocks
pub fn segment_pages(pages: &[String], config: &ReportConfig) -> Vec<StateBlock> {
    let header = HeaderPattern::new(config);
    let starts = find_state_starts(pages, &header);
    derive_blocks(&starts, pages.len())
}
