//! Per-weekday stage-options table.
//!
//! The table merges two sources: a fixed lookup of recurring stages and
//! their eligible weekdays, and time-boxed event stages fetched from the
//! assistant server by the hourly refresh.

use chrono::{DateTime, Local};
use std::collections::BTreeMap;

use crate::documents::STAGE_GROUPS;

/// A selectable stage: machine value plus display label.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOption {
    pub value: String,
    pub label: String,
}

/// A time-boxed event stage reported by the remote metadata feed.
#[derive(Debug, Clone)]
pub struct StageActivity {
    pub value: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

/// Recurring stages: code, label, eligible weekdays (1 = Monday .. 7 = Sunday).
const DAILY_STAGES: &[(&str, &str, &[u32])] = &[
    ("-", "Current/Last", &[1, 2, 3, 4, 5, 6, 7]),
    ("1-7", "1-7", &[1, 2, 3, 4, 5, 6, 7]),
    ("R8-11", "R8-11", &[1, 2, 3, 4, 5, 6, 7]),
    ("12-17-HARD", "12-17-HARD", &[1, 2, 3, 4, 5, 6, 7]),
    ("CE-6", "LMD-6/5", &[2, 4, 6, 7]),
    ("AP-5", "Red Cert-5", &[1, 4, 6, 7]),
    ("CA-5", "Skill-5", &[2, 3, 5, 7]),
    ("LS-6", "EXP-6/5", &[1, 2, 3, 4, 5, 6, 7]),
    ("SK-5", "Carbon-5", &[1, 3, 5, 6]),
    ("PR-A-1", "Defender/Medic Chip", &[1, 4, 5, 7]),
    ("PR-A-2", "Defender/Medic Chip Pack", &[1, 4, 5, 7]),
    ("PR-B-1", "Caster/Sniper Chip", &[1, 2, 5, 6]),
    ("PR-B-2", "Caster/Sniper Chip Pack", &[1, 2, 5, 6]),
    ("PR-C-1", "Vanguard/Supporter Chip", &[3, 4, 6, 7]),
    ("PR-C-2", "Vanguard/Supporter Chip Pack", &[3, 4, 6, 7]),
    ("PR-D-1", "Guard/Specialist Chip", &[2, 3, 6, 7]),
    ("PR-D-2", "Guard/Specialist Chip Pack", &[2, 3, 6, 7]),
];

/// Stage options per plan group ("ALL" plus each weekday).
#[derive(Debug, Default)]
pub struct StageTable {
    options: BTreeMap<String, Vec<StageOption>>,
}

impl StageTable {
    pub fn new() -> Self {
        let mut options = BTreeMap::new();
        for group in STAGE_GROUPS {
            options.insert(group.to_string(), Vec::new());
        }
        Self { options }
    }

    /// Rebuild every group from the fixed daily table plus the currently
    /// active event stages. Inactive activities are filtered out against
    /// `now`; the "ALL" group gets every recurring stage.
    pub fn rebuild(&mut self, activities: &[StageActivity], now: DateTime<Local>) {
        let active: Vec<StageOption> = activities
            .iter()
            .filter(|activity| activity.start < now && now < activity.end)
            .map(|activity| StageOption {
                value: activity.value.clone(),
                label: activity.value.clone(),
            })
            .collect();

        for (index, group) in STAGE_GROUPS.iter().enumerate() {
            // index 0 is "ALL"; weekday groups are 1 = Monday .. 7 = Sunday
            let day = index as u32;
            let mut options: Vec<StageOption> = DAILY_STAGES
                .iter()
                .filter(|(_, _, days)| day == 0 || days.contains(&day))
                .map(|(value, label, _)| StageOption {
                    value: value.to_string(),
                    label: label.to_string(),
                })
                .collect();
            options.extend(active.iter().cloned());
            self.options.insert(group.to_string(), options);
        }
    }

    /// Options for one plan group; empty for unknown groups.
    pub fn options(&self, group: &str) -> &[StageOption] {
        self.options.get(group).map(Vec::as_slice).unwrap_or(&[])
    }
}
