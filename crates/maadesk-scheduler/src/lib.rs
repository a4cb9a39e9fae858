//! # MaaDesk Scheduler
//!
//! The timer core: everything that happens on a clock edge.
//!
//! ## Architecture
//! ```text
//! run_timer (tokio interval, 1s)
//!   ├── DispatchEngine.tick     queue time slots → TaskLauncher
//!   ├── SilenceGuard.check      target window present → boss key
//!   └── PowerGuard.check        armed action + idle → confirm → power
//!
//! run_hourly (tokio interval, 1h)
//!   └── HourlyRefresh.run_once  stage feed → StageTable; update check
//!
//! notify                        ServerChan / webhook / SMTP sinks
//! ```

pub mod engine;
pub mod notify;
pub mod power;
pub mod refresh;
pub mod silence;

pub use engine::{DispatchEngine, run_hourly, run_timer};
pub use notify::{FanoutNotifier, Notifier, NotifyTarget, dispatch, targets_from_config};
pub use power::PowerGuard;
pub use refresh::{HourlyRefresh, RemoteStageFetcher, parse_stage_feed};
pub use silence::{SilenceGuard, parse_key_combo};
