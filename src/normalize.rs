//! Flattening and normalization of parsed group records
//!
//! Parsed states are flattened into one row per group entry. Rows that
//! cannot be weighted (no sample size, total or dem share) are dropped, and
//! each state's group totals are rescaled to 100 when they drift outside
//! the configured tolerance.

use crate::parser::{GroupType, ParsedStateData};
use crate::ReportConfig;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;

/// A group entry joined with its state, before filtering
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub state: &'static str,
    pub state_sample: Option<u64>,
    pub group_type: GroupType,
    pub label: Option<String>,
    pub total_pct: Option<f64>,
    pub dem_pct: Option<f64>,
    pub gop_pct: Option<f64>,
    pub other_pct: Option<f64>,
    pub source_line: String,
}

/// A retained, normalized group row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRow {
    pub state: &'static str,
    pub state_sample: u64,
    pub group_type: GroupType,
    pub label: Option<String>,
    pub total_pct: f64,
    pub dem_pct: f64,
    pub gop_pct: Option<f64>,
    pub other_pct: Option<f64>,
    pub source_line: String,
    /// Share of the state's electorate, `total_pct / 100`
    pub grp_share_of_state: f64,
    /// `dem_pct / 100`
    pub dem_rate: f64,
}

/// Electorate share projection of a [`FlatRow`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemographicShare {
    pub state: &'static str,
    pub group_type: GroupType,
    pub label: Option<String>,
    pub electorate_share: f64,
    pub dem_rate: f64,
    pub gop_pct: Option<f64>,
}

impl From<&FlatRow> for DemographicShare {
    fn from(row: &FlatRow) -> Self {
        Self {
            state: row.state,
            group_type: row.group_type,
            label: row.label.clone(),
            electorate_share: row.grp_share_of_state,
            dem_rate: row.dem_rate,
            gop_pct: row.gop_pct,
        }
    }
}

/// One row per group entry, in state order
pub fn flatten(parsed: &[ParsedStateData]) -> Vec<GroupRow> {
    let mut rows = Vec::new();
    for state in parsed {
        // a zero sample carries no weight
        let sample = state.sample_size.filter(|&n| n > 0);
        for (group_type, entries) in &state.groups {
            for entry in entries {
                rows.push(GroupRow {
                    state: state.state,
                    state_sample: sample,
                    group_type,
                    label: entry.label.clone(),
                    total_pct: entry.values.total_pct(),
                    dem_pct: entry.values.dem_pct(),
                    gop_pct: entry.values.gop_pct(),
                    other_pct: entry.values.other_pct(),
                    source_line: entry.source_line.clone(),
                });
            }
        }
    }
    rows
}

/// A positive sum outside the tolerance band gets rescaled to 100
fn needs_rescale(sum: f64, config: &ReportConfig) -> bool {
    sum > 0.0 && !config.rescale_tolerance.contains(&sum)
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Drop unweighted rows, rescale drifting states and derive shares
pub fn normalize(rows: &[GroupRow], config: &ReportConfig) -> Vec<FlatRow> {
    let mut retained: Vec<FlatRow> = rows
        .iter()
        .filter_map(|row| {
            let state_sample = row.state_sample?;
            let total_pct = finite(row.total_pct)?;
            let dem_pct = finite(row.dem_pct)?;
            Some(FlatRow {
                state: row.state,
                state_sample,
                group_type: row.group_type,
                label: row.label.clone(),
                total_pct,
                dem_pct,
                gop_pct: row.gop_pct,
                other_pct: row.other_pct,
                source_line: row.source_line.clone(),
                grp_share_of_state: 0.0,
                dem_rate: 0.0,
            })
        })
        .collect();
    info!(
        "Retained {} of {} group rows",
        retained.len(),
        rows.len()
    );

    let mut sums: HashMap<&'static str, f64> = HashMap::new();
    for row in &retained {
        *sums.entry(row.state).or_insert(0.0) += row.total_pct;
    }

    sums.retain(|state, sum| {
        let rescale = needs_rescale(*sum, config);
        if rescale {
            debug!("{}: rescaling group totals from {:.2} to 100", state, sum);
        }
        rescale
    });

    for row in &mut retained {
        if let Some(&sum) = sums.get(row.state) {
            row.total_pct = row.total_pct / sum * 100.0;
        }
        row.grp_share_of_state = row.total_pct / 100.0;
        row.dem_rate = row.dem_pct / 100.0;
    }

    retained
}

/// Project normalized rows onto electorate shares
pub fn demographic_shares(rows: &[FlatRow]) -> Vec<DemographicShare> {
    rows.iter().map(DemographicShare::from).collect()
}
