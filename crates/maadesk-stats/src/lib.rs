//! # MaaDesk Stats
//!
//! Log-derived run statistics: parse one run's raw log into structured
//! tallies, persist them next to the log, and fold many runs into a
//! period-bucketed historical report.

pub mod history;
pub mod merge;
pub mod parse;

pub use history::{MergeMode, search_history};
pub use merge::{
    MergedReport, RunIndexEntry, RunOutcome, SUCCESS_RESULT, merge_statistics, run_timestamp,
};
pub use parse::{ParsedRun, RunStats, parse_run_log, save_general_log, save_run_log};
