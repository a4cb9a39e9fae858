//! Per-run log parsing: recruitment tally and stage drop tally.
//!
//! The assistant engine writes free-text logs; this module extracts
//! structured statistics from a completed run and persists them next to
//! the raw log.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use maadesk_core::error::{MaadeskError, Result};

/// Recognition marker: a recruitment panel was read.
const RECRUIT_RESULT_MARKER: &str = "公招识别结果:";
/// Confirmation marker: the pending recruitment was actually executed.
const RECRUIT_CONFIRMED_MARKER: &str = "已确认招募";
const FIGHT_START_MARKER: &str = "开始任务: Fight";
const FIGHT_COMPLETE_MARKER: &str = "完成任务: Fight";

/// Metadata labels that appear inside a drop block but are not drops.
const DROP_DENYLIST: [&str; 5] = ["当前次数", "理智", "最快截图耗时", "专精等级", "剩余时间"];

fn star_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*★ Tags").unwrap())
}

fn drop_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z0-9\-]+) 掉落统计:").unwrap())
}

fn drop_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\S+?)\s*:\s*([\d,]+)(?:\s*\(\+[\d,]+\))?").unwrap())
}

/// Structured statistics of one run, persisted as the sibling JSON of the
/// raw log file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Rarity label ("5★") → confirmed recruitment count.
    pub recruit_statistics: BTreeMap<String, u64>,
    /// Stage code → item name → dropped amount.
    pub drop_statistics: BTreeMap<String, BTreeMap<String, u64>>,
    /// Terminal result string reported by the engine.
    pub maa_result: String,
}

/// Parse result plus the six-star flag used for push notifications.
#[derive(Debug, Clone)]
pub struct ParsedRun {
    pub stats: RunStats,
    pub six_star: bool,
}

/// Parse a completed run's log lines into structured statistics.
pub fn parse_run_log(lines: &[String], result: &str) -> ParsedRun {
    let mut stats = RunStats {
        maa_result: result.to_string(),
        ..RunStats::default()
    };
    let six_star = tally_recruits(lines, &mut stats.recruit_statistics);
    tally_drops(lines, &mut stats.drop_statistics);
    ParsedRun { stats, six_star }
}

/// Recruitment pass. A recognition marker opens a pending detection whose
/// rarity comes from the following "Tags" line; a confirmation marker
/// consumes exactly one pending detection. The most recently detected
/// rarity wins when recognitions pile up without confirmations.
fn tally_recruits(lines: &[String], tally: &mut BTreeMap<String, u64>) -> bool {
    let mut six_star = false;
    let mut confirmed = false;
    let mut pending_rarity: Option<String> = None;

    let mut i = 0;
    while i < lines.len() {
        if lines[i].contains(RECRUIT_RESULT_MARKER) {
            pending_rarity = None;
            i += 1;
            while i < lines.len() && !lines[i].contains("Tags") {
                i += 1;
            }
            if i < lines.len() {
                if let Some(caps) = star_regex().captures(&lines[i]) {
                    let rarity = format!("{}★", &caps[1]);
                    if rarity == "6★" {
                        six_star = true;
                    }
                    pending_rarity = Some(rarity);
                }
            }
        }

        if i < lines.len() && lines[i].contains(RECRUIT_CONFIRMED_MARKER) {
            confirmed = true;
        }

        if confirmed {
            if let Some(rarity) = pending_rarity.take() {
                *tally.entry(rarity).or_insert(0) += 1;
                confirmed = false;
            }
        }

        i += 1;
    }
    six_star
}

/// Drop pass. Paired start/complete markers delimit a task window; an
/// unfinished window (no completion, or superseded by a new start) is
/// discarded. Within a window only the last drop block counts; windows
/// accumulate additively per stage per item.
fn tally_drops(lines: &[String], tally: &mut BTreeMap<String, BTreeMap<String, u64>>) {
    let mut windows: Vec<(usize, usize)> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if !line.contains(FIGHT_START_MARKER) {
            continue;
        }
        for (j, later) in lines.iter().enumerate().skip(i + 1) {
            if later.contains(FIGHT_COMPLETE_MARKER) {
                windows.push((i, j));
                break;
            }
            if later.contains(FIGHT_START_MARKER) {
                break;
            }
        }
    }

    for (start, end) in windows {
        let mut current_stage: Option<String> = None;
        let mut last_block: BTreeMap<String, u64> = BTreeMap::new();

        for line in &lines[start..=end] {
            if let Some(caps) = drop_header_regex().captures(line) {
                // a fresh block supersedes any earlier one in this window
                current_stage = Some(caps[1].to_string());
                last_block.clear();
                continue;
            }
            if current_stage.is_none() || line.starts_with('[') {
                continue;
            }
            if let Some(caps) = drop_item_regex().captures(line) {
                let item = caps[1].to_string();
                if DROP_DENYLIST.contains(&item.as_str()) {
                    continue;
                }
                if let Ok(total) = caps[2].replace(',', "").parse::<u64>() {
                    last_block.insert(item, total);
                }
            }
        }

        if let Some(stage) = current_stage {
            if !last_block.is_empty() {
                let stage_tally = tally.entry(stage).or_default();
                for (item, count) in last_block {
                    *stage_tally.entry(item).or_insert(0) += count;
                }
            }
        }
    }
}

/// Write the raw lines verbatim to `<path>.log` and the structured stats
/// as the sibling `.json`. Returns the parsed run for the caller's
/// notification decisions.
pub fn save_run_log(log_path: &Path, lines: &[String], result: &str) -> Result<ParsedRun> {
    let parsed = parse_run_log(lines, result);
    write_log_pair(log_path, lines, &parsed.stats)?;
    tracing::info!("run log processed: {}", log_path.display());
    Ok(parsed)
}

/// General members have no parseable statistics; persist the raw lines
/// plus a result-only JSON document.
pub fn save_general_log(log_path: &Path, lines: &[String], result: &str) -> Result<()> {
    let document = serde_json::json!({ "general_result": result });
    write_raw(log_path, lines)?;
    write_json(&log_path.with_extension("json"), &document)?;
    tracing::info!("run log processed: {}", log_path.display());
    Ok(())
}

fn write_log_pair(log_path: &Path, lines: &[String], stats: &RunStats) -> Result<()> {
    write_raw(log_path, lines)?;
    let value = serde_json::to_value(stats).map_err(|e| MaadeskError::Config(e.to_string()))?;
    write_json(&log_path.with_extension("json"), &value)
}

fn write_raw(log_path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    std::fs::write(log_path, text)?;
    Ok(())
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| MaadeskError::Config(e.to_string()))?;
    std::fs::write(path, text)?;
    Ok(())
}
