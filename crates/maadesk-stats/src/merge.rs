//! Merging per-run statistics files into one historical report.
//!
//! Run timestamps are reconstructed from the enclosing date directory
//! plus the file's own time-stamp name; times before 04:00 belong to the
//! previous operational day, so they are shifted forward one calendar day
//! to land in the right bucket.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;

/// Canonical success marker written by the execution engine.
pub const SUCCESS_RESULT: &str = "Success!";

const ERROR_KEY_FORMAT: &str = "%m-%d %H:%M:%S";

/// Outcome of one run in the merged index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Done,
    Error,
}

/// One run in the merged report's index.
#[derive(Debug, Clone, Serialize)]
pub struct RunIndexEntry {
    pub time: NaiveDateTime,
    pub outcome: RunOutcome,
    pub source: PathBuf,
}

/// Combined statistics over many runs.
#[derive(Debug, Default, Serialize)]
pub struct MergedReport {
    /// Rarity label → summed confirmed recruitment count.
    pub recruit_statistics: BTreeMap<String, u64>,
    /// Stage code → item name → summed dropped amount.
    pub drop_statistics: BTreeMap<String, BTreeMap<String, u64>>,
    /// Every merged run, ascending by timestamp.
    pub index: Vec<RunIndexEntry>,
    /// Formatted timestamp → result string, for every non-success run.
    pub error_info: BTreeMap<String, String>,
}

/// Fold a list of per-run statistics files into one report. Files that
/// cannot be read or whose path does not encode a timestamp are logged
/// and skipped.
pub fn merge_statistics(paths: &[PathBuf]) -> MergedReport {
    let mut report = MergedReport::default();

    for path in paths {
        let document: serde_json::Value = match std::fs::read_to_string(path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
        {
            Some(document) => document,
            None => {
                tracing::warn!("unreadable statistics file: {}", path.display());
                continue;
            }
        };

        if let Some(recruits) = document["recruit_statistics"].as_object() {
            for (rarity, count) in recruits {
                *report.recruit_statistics.entry(rarity.clone()).or_insert(0) +=
                    count.as_u64().unwrap_or(0);
            }
        }

        if let Some(stages) = document["drop_statistics"].as_object() {
            for (stage, drops) in stages {
                let stage_tally = report.drop_statistics.entry(stage.clone()).or_default();
                for (item, count) in drops.as_object().into_iter().flatten() {
                    *stage_tally.entry(item.clone()).or_insert(0) +=
                        count.as_u64().unwrap_or(0);
                }
            }
        }

        let result = document["maa_result"]
            .as_str()
            .or_else(|| document["general_result"].as_str());
        let Some(result) = result else {
            continue;
        };
        let Some(time) = run_timestamp(path) else {
            tracing::warn!("statistics file outside a dated layout: {}", path.display());
            continue;
        };

        let outcome = if result == SUCCESS_RESULT {
            RunOutcome::Done
        } else {
            report
                .error_info
                .insert(time.format(ERROR_KEY_FORMAT).to_string(), result.to_string());
            RunOutcome::Error
        };
        report.index.push(RunIndexEntry {
            time,
            outcome,
            source: path.clone(),
        });
    }

    report.index.sort_by_key(|entry| entry.time);
    report
}

/// Reconstruct the run timestamp from `<YYYY-MM-DD>/<entity>/<HH-MM-SS>.json`,
/// shifting runs before 04:00 forward one day (server-day convention).
pub fn run_timestamp(path: &Path) -> Option<NaiveDateTime> {
    let stem = path.file_stem()?.to_string_lossy();
    let date_dir = path.parent()?.parent()?.file_name()?.to_string_lossy();
    let time = NaiveDateTime::parse_from_str(
        &format!("{date_dir} {stem}"),
        "%Y-%m-%d %H-%M-%S",
    )
    .ok()?;
    let four = NaiveTime::from_hms_opt(4, 0, 0)?;
    if time.time() < four {
        Some(time + TimeDelta::days(1))
    } else {
        Some(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("maadesk-merge-{tag}"));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    fn write_stats(dir: &Path, date: &str, time: &str, value: serde_json::Value) -> PathBuf {
        let path = dir.join(date).join("Queue_1").join(format!("{time}.json"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_drop_tallies_sum_across_runs() {
        let dir = scratch("drops");
        let a = write_stats(
            &dir,
            "2026-08-06",
            "20-00-00",
            json!({"maa_result": "Success!", "drop_statistics": {"CE-6": {"龙门币": 10}}}),
        );
        let b = write_stats(
            &dir,
            "2026-08-07",
            "09-30-00",
            json!({"maa_result": "Success!", "drop_statistics": {"CE-6": {"龙门币": 20}}}),
        );

        let report = merge_statistics(&[a, b]);
        assert_eq!(report.drop_statistics["CE-6"]["龙门币"], 30);
        assert!(report.error_info.is_empty());
        assert_eq!(report.index.len(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_recruit_tallies_sum() {
        let dir = scratch("recruits");
        let a = write_stats(
            &dir,
            "2026-08-06",
            "20-00-00",
            json!({"maa_result": "Success!", "recruit_statistics": {"5★": 1, "4★": 2}}),
        );
        let b = write_stats(
            &dir,
            "2026-08-07",
            "09-00-00",
            json!({"maa_result": "Success!", "recruit_statistics": {"5★": 2}}),
        );

        let report = merge_statistics(&[a, b]);
        assert_eq!(report.recruit_statistics["5★"], 3);
        assert_eq!(report.recruit_statistics["4★"], 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_non_success_result_lands_in_error_info() {
        let dir = scratch("errors");
        let a = write_stats(
            &dir,
            "2026-08-07",
            "08-00-05",
            json!({"maa_result": "Timeout waiting for emulator"}),
        );

        let report = merge_statistics(&[a]);
        assert_eq!(report.index.len(), 1);
        assert_eq!(report.index[0].outcome, RunOutcome::Error);
        assert_eq!(
            report.error_info.get("08-07 08:00:05").map(String::as_str),
            Some("Timeout waiting for emulator")
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_index_sorted_ascending_with_day_boundary() {
        let dir = scratch("boundary");
        // 02:30 is before the 04:00 rollover: it belongs to the next
        // calendar day for bucketing purposes
        let late = write_stats(
            &dir,
            "2026-08-06",
            "02-30-00",
            json!({"maa_result": "Success!"}),
        );
        let early = write_stats(
            &dir,
            "2026-08-06",
            "21-00-00",
            json!({"maa_result": "Success!"}),
        );

        let report = merge_statistics(&[late.clone(), early]);
        assert_eq!(report.index.len(), 2);
        assert_eq!(
            report.index[1].source, late,
            "pre-04:00 run sorts after the previous evening"
        );
        assert_eq!(
            report.index[1].time.date(),
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_general_results_merge_too() {
        let dir = scratch("general");
        let a = write_stats(
            &dir,
            "2026-08-07",
            "10-00-00",
            json!({"general_result": "Success!"}),
        );
        let report = merge_statistics(&[a]);
        assert_eq!(report.index.len(), 1);
        assert_eq!(report.index[0].outcome, RunOutcome::Done);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = scratch("skip");
        std::fs::create_dir_all(&dir).unwrap();
        let bogus = dir.join("missing.json");
        let report = merge_statistics(&[bogus]);
        assert!(report.index.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
