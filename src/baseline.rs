//! Sample-weighted baseline partisan share per state

use crate::normalize::FlatRow;
use serde::Serialize;
use std::collections::BTreeMap;

/// Baseline estimate for one state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateBaseline {
    pub state: &'static str,
    pub sample_size: u64,
    /// Democratic share of the weighted electorate, in percent
    pub baseline_dem_share: Option<f64>,
    /// `2 * dem_share - 100`
    pub baseline_margin: Option<f64>,
}

/// Weighted baseline for the rows of a single state.
///
/// Returns `None` for an empty slice. When the weighted total is not
/// positive the share and margin are both `None`.
pub fn state_baseline(state: &'static str, rows: &[&FlatRow]) -> Option<StateBaseline> {
    let sample = rows.first()?.state_sample as f64;

    let (dem_votes, total_votes) = rows.iter().fold((0.0, 0.0), |(dem, total), row| {
        (
            dem + row.grp_share_of_state * row.dem_rate * sample,
            total + row.grp_share_of_state * sample,
        )
    });

    let (baseline_dem_share, baseline_margin) = if total_votes > 0.0 {
        let share = dem_votes / total_votes * 100.0;
        (Some(share), Some(2.0 * share - 100.0))
    } else {
        (None, None)
    };

    Some(StateBaseline {
        state,
        sample_size: rows[0].state_sample,
        baseline_dem_share,
        baseline_margin,
    })
}

/// One baseline per state with retained rows, ordered by state name
pub fn compute_state_baselines(rows: &[FlatRow]) -> Vec<StateBaseline> {
    let mut by_state: BTreeMap<&'static str, Vec<&FlatRow>> = BTreeMap::new();
    for row in rows {
        by_state.entry(row.state).or_default().push(row);
    }

    by_state
        .into_iter()
        .filter_map(|(state, rows)| state_baseline(state, &rows))
        .collect()
}
