//! Parsing of one state's block text into classified demographic groups
//!
//! Every line carrying at least one percentage is kept as a group entry.
//! Lines are classified by an ordered rule table (age, race, education,
//! gender, misc) and their percentages are mapped onto the
//! total/dem/gop/other layout by count.

use crate::segmenter::{block_text, StateBlock};
use crate::ReportConfig;
use log::debug;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::ops::Index;

static PCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+\.\d+%|-?\d+%").unwrap());

static SAMPLE_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"Sample Size[:\s]+([\d,]+)")
        .case_insensitive(true)
        .build()
        .unwrap()
});

static AGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"18[\s\-–]29|30[\s\-–]44|45[\s\-–]64|65\+|65 \+").unwrap());

const RACE_KEYWORDS: &[&str] = &[
    "white",
    "black",
    "hispanic",
    "latino",
    "asian",
    "native",
    "multiracial",
];

const EDUCATION_KEYWORDS: &[&str] = &[
    "college",
    "no college",
    "some college",
    "high school",
    "hs",
    "postgraduate",
    "college grad",
];

const GENDER_KEYWORDS: &[&str] = &["men", "women", "non-binary", "nonbinary"];

/// Demographic category of a group line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum GroupType {
    Age,
    Race,
    Education,
    Gender,
    Misc,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Age => "Age",
            GroupType::Race => "Race",
            GroupType::Education => "Education",
            GroupType::Gender => "Gender",
            GroupType::Misc => "Misc",
        }
    }
}

fn contains_any(line: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| line.contains(k))
}

fn is_age(line: &str) -> bool {
    AGE_RE.is_match(line)
}

fn is_race(line: &str) -> bool {
    contains_any(line, RACE_KEYWORDS)
}

fn is_education(line: &str) -> bool {
    contains_any(line, EDUCATION_KEYWORDS)
}

fn is_gender(line: &str) -> bool {
    contains_any(line, GENDER_KEYWORDS)
}

/// Classification rules, checked in order against the lowercased line.
/// Lines matching none of them are `Misc`.
const CLASSIFICATION_RULES: &[(GroupType, fn(&str) -> bool)] = &[
    (GroupType::Age, is_age),
    (GroupType::Race, is_race),
    (GroupType::Education, is_education),
    (GroupType::Gender, is_gender),
];

/// Classify a group line by the first matching rule
pub fn classify_line(line: &str) -> GroupType {
    let lower = line.to_lowercase();
    CLASSIFICATION_RULES
        .iter()
        .find(|(_, matches)| matches(&lower))
        .map(|(group, _)| *group)
        .unwrap_or(GroupType::Misc)
}

/// Percentages found on a group line
#[derive(Debug, Clone, PartialEq)]
pub enum NumericValues {
    /// Values mapped onto the report's column layout
    Canonical {
        total_pct: Option<f64>,
        dem_pct: Option<f64>,
        gop_pct: Option<f64>,
        other_pct: Option<f64>,
    },
    /// Values that fit no known layout, by position on the line
    Overflow(Vec<(usize, f64)>),
}

impl NumericValues {
    /// Map the percentages of a line onto total/dem/gop/other by count
    pub fn from_values(values: &[f64]) -> Self {
        match *values {
            [total, dem, gop, other, ..] => NumericValues::Canonical {
                total_pct: Some(total),
                dem_pct: Some(dem),
                gop_pct: Some(gop),
                other_pct: Some(other),
            },
            [dem, gop, other] => NumericValues::Canonical {
                total_pct: None,
                dem_pct: Some(dem),
                gop_pct: Some(gop),
                other_pct: Some(other),
            },
            [dem, gop] => NumericValues::Canonical {
                total_pct: None,
                dem_pct: Some(dem),
                gop_pct: Some(gop),
                other_pct: None,
            },
            _ => NumericValues::overflow(values),
        }
    }

    fn overflow(values: &[f64]) -> Self {
        NumericValues::Overflow(values.iter().copied().enumerate().collect())
    }

    pub fn total_pct(&self) -> Option<f64> {
        match self {
            NumericValues::Canonical { total_pct, .. } => *total_pct,
            NumericValues::Overflow(_) => None,
        }
    }

    pub fn dem_pct(&self) -> Option<f64> {
        match self {
            NumericValues::Canonical { dem_pct, .. } => *dem_pct,
            NumericValues::Overflow(_) => None,
        }
    }

    pub fn gop_pct(&self) -> Option<f64> {
        match self {
            NumericValues::Canonical { gop_pct, .. } => *gop_pct,
            NumericValues::Overflow(_) => None,
        }
    }

    pub fn other_pct(&self) -> Option<f64> {
        match self {
            NumericValues::Canonical { other_pct, .. } => *other_pct,
            NumericValues::Overflow(_) => None,
        }
    }
}

impl Serialize for NumericValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let overflow: &[(usize, f64)] = match self {
            NumericValues::Overflow(cols) => cols,
            NumericValues::Canonical { .. } => &[],
        };
        let mut map = serializer.serialize_map(Some(4 + overflow.len()))?;
        map.serialize_entry("total_pct", &self.total_pct())?;
        map.serialize_entry("dem_pct", &self.dem_pct())?;
        map.serialize_entry("gop_pct", &self.gop_pct())?;
        map.serialize_entry("other_pct", &self.other_pct())?;
        for (idx, value) in overflow {
            map.serialize_entry(&format!("col{}", idx), value)?;
        }
        map.end()
    }
}

/// One percentage-bearing line of a state block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupEntry {
    pub label: Option<String>,
    #[serde(rename = "line")]
    pub source_line: String,
    pub values: NumericValues,
}

type GroupSlot = (GroupType, Vec<GroupEntry>);

/// Group entries keyed by group type, in the order each type first appears
/// in the block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupMap(Vec<GroupSlot>);

impl GroupMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to its group, opening the group if it is new
    pub fn push(&mut self, group: GroupType, entry: GroupEntry) {
        match self.0.iter_mut().find(|(g, _)| *g == group) {
            Some((_, entries)) => entries.push(entry),
            None => self.0.push((group, vec![entry])),
        }
    }

    pub fn get(&self, group: &GroupType) -> Option<&Vec<GroupEntry>> {
        self.0.iter().find(|(g, _)| g == group).map(|(_, entries)| entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GroupType, &Vec<GroupEntry>)> {
        self.into_iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Vec<GroupEntry>> {
        self.0.iter().map(|(_, entries)| entries)
    }
}

impl Index<&GroupType> for GroupMap {
    type Output = Vec<GroupEntry>;

    fn index(&self, group: &GroupType) -> &Self::Output {
        match self.get(group) {
            Some(entries) => entries,
            None => panic!("no {} entries", group.as_str()),
        }
    }
}

fn group_pair(slot: &GroupSlot) -> (GroupType, &Vec<GroupEntry>) {
    (slot.0, &slot.1)
}

impl<'a> IntoIterator for &'a GroupMap {
    type Item = (GroupType, &'a Vec<GroupEntry>);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, GroupSlot>,
        fn(&'a GroupSlot) -> (GroupType, &'a Vec<GroupEntry>),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().map(group_pair as fn(&'a GroupSlot) -> _)
    }
}

impl Serialize for GroupMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (group, entries) in &self.0 {
            map.serialize_entry(group, entries)?;
        }
        map.end()
    }
}

/// Everything parsed from one state's section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedStateData {
    #[serde(skip)]
    pub state: &'static str,
    pub sample_size: Option<u64>,
    /// First non-empty line of the block
    pub raw_header: String,
    pub groups: GroupMap,
}

impl ParsedStateData {
    /// Total number of group entries across all group types
    pub fn entry_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// Collapse runs of whitespace into single spaces
fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Find "Sample Size: N" among the first `scan_lines` lines.
///
/// Only the first match counts; a value that does not parse gives `None`.
pub fn find_sample_size(lines: &[&str], scan_lines: usize) -> Option<u64> {
    lines
        .iter()
        .take(scan_lines)
        .find_map(|line| SAMPLE_RE.captures(line))
        .and_then(|caps| caps[1].replace(',', "").parse().ok())
}

/// Label of a group line: the text before its first percentage
pub fn extract_label(line: &str) -> Option<String> {
    let first = PCT_RE.find(line)?;
    let label = line[..first.start()].trim();
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}

/// Parse one group line, or `None` if it carries no percentage
pub fn parse_group_line(line: &str) -> Option<(GroupType, GroupEntry)> {
    let line = collapse_whitespace(line);
    let tokens: Vec<&str> = PCT_RE.find_iter(&line).map(|m| m.as_str()).collect();
    if tokens.is_empty() {
        return None;
    }

    let values: Vec<f64> = tokens
        .iter()
        .filter_map(|t| t.trim_end_matches('%').parse().ok())
        .collect();
    let values = if values.len() == tokens.len() {
        NumericValues::from_values(&values)
    } else {
        NumericValues::overflow(&values)
    };

    let entry = GroupEntry {
        label: extract_label(&line),
        values,
        source_line: line,
    };
    Some((classify_line(&entry.source_line), entry))
}

/// Parse the concatenated text of one state's block
pub fn parse_state_block(state: &'static str, text: &str, config: &ReportConfig) -> ParsedStateData {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut groups = GroupMap::new();
    for (group, entry) in lines
        .iter()
        .filter(|l| l.contains('%'))
        .filter_map(|l| parse_group_line(l))
    {
        groups.push(group, entry);
    }

    let parsed = ParsedStateData {
        state,
        sample_size: find_sample_size(&lines, config.sample_scan_lines),
        raw_header: lines.first().map(|l| l.to_string()).unwrap_or_default(),
        groups,
    };
    debug!(
        "{}: sample size {:?}, {} group lines",
        state,
        parsed.sample_size,
        parsed.entry_count()
    );
    parsed
}

/// Parse every block, keeping block order
pub fn parse_blocks(
    pages: &[String],
    blocks: &[StateBlock],
    config: &ReportConfig,
) -> Vec<ParsedStateData> {
    let parse = |block: &StateBlock| {
        let text = block_text(pages, block);
        parse_state_block(block.state, &text, config)
    };

    if config.parallel {
        blocks.par_iter().map(parse).collect()
    } else {
        blocks.iter().map(parse).collect()
    }
}
