//! History scan: bucket per-run statistics files by calendar period.
//!
//! The history tree is `history/<YYYY-MM-DD>/<member-or-queue>/*.json`.
//! Buckets come back newest first; directories that are not dates are
//! logged and skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

/// How runs are grouped into report buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Daily,
    Weekly,
    Monthly,
}

fn bucket_label(mode: MergeMode, date: NaiveDate) -> String {
    match mode {
        MergeMode::Daily => date.format("%Y-%m-%d").to_string(),
        MergeMode::Weekly => {
            let week = date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        MergeMode::Monthly => date.format("%Y-%m").to_string(),
    }
}

/// Scan `history_dir` for per-run statistics files between `start` and
/// `end` inclusive, bucketed by period then by entity, newest bucket
/// first.
pub fn search_history(
    history_dir: &Path,
    mode: MergeMode,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<(String, BTreeMap<String, Vec<PathBuf>>)> {
    let mut buckets: BTreeMap<String, BTreeMap<String, Vec<PathBuf>>> = BTreeMap::new();

    let Ok(entries) = std::fs::read_dir(history_dir) else {
        return Vec::new();
    };
    for date_dir in entries.filter_map(|e| e.ok().map(|e| e.path())) {
        if !date_dir.is_dir() {
            continue;
        }
        let name = date_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Ok(date) = NaiveDate::parse_from_str(&name, "%Y-%m-%d") else {
            tracing::warn!("non-date directory in history: {}", date_dir.display());
            continue;
        };
        if date < start || date > end {
            continue;
        }

        let bucket = buckets.entry(bucket_label(mode, date)).or_default();
        let Ok(entities) = std::fs::read_dir(&date_dir) else {
            continue;
        };
        for entity_dir in entities.filter_map(|e| e.ok().map(|e| e.path())) {
            if !entity_dir.is_dir() {
                continue;
            }
            let entity = entity_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let files = bucket.entry(entity).or_default();
            if let Ok(runs) = std::fs::read_dir(&entity_dir) {
                for file in runs.filter_map(|e| e.ok().map(|e| e.path())) {
                    if file.extension().is_some_and(|ext| ext == "json") {
                        files.push(file);
                    }
                }
            }
        }
    }

    // labels are zero-padded, so string order is chronological
    buckets.into_iter().rev().collect()
}
