//! Process-scoped application context.
//!
//! One `AppContext` is constructed at startup and shared via `Arc` into
//! every component. All cross-component mutable state lives here behind
//! async mutexes; registry mutation is serialized through the single
//! registry lock. Data-changed notifications go out on a broadcast
//! channel — one event per committed batch.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeDelta};
use tokio::sync::{Mutex, broadcast};

use crate::documents::GlobalConfig;
use crate::error::Result;
use crate::platform::PowerAction;
use crate::registry::{Registry, UserRunUpdate};
use crate::stage::StageTable;

/// Data-changed notifications consumers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// The stage-options table was rebuilt.
    StageRefreshed,
    /// A batch of user/sub run data was committed.
    SubInfoChanged,
    /// The armed power action changed.
    PowerSignChanged,
}

/// Shared state for the whole process.
pub struct AppContext {
    base_dir: PathBuf,
    pub global: Mutex<GlobalConfig>,
    pub registry: Mutex<Registry>,
    /// Names of queues (or standalone members) currently executing.
    pub running: Mutex<HashSet<String>>,
    /// Binary paths whose windows the silence evaluator should suppress.
    /// Maintained by the execution collaborator while members run.
    pub silence_targets: Mutex<Vec<String>>,
    pub stages: Mutex<StageTable>,
    power_sign: Mutex<PowerAction>,
    /// Temporarily bypass the silence evaluator (e.g. while the user is
    /// interacting with the target window).
    pub ignore_silence: AtomicBool,
    events: broadcast::Sender<AppEvent>,
}

impl AppContext {
    /// Create the context rooted at `base_dir`: ensure the data layout
    /// exists and load (then self-heal) the global config document.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let base_dir = base_dir.into();
        for sub in ["config", "data", "debug", "history"] {
            std::fs::create_dir_all(base_dir.join(sub))?;
        }

        let global = GlobalConfig::load_from(base_dir.join("config/config.json"));
        global.save();

        let (events, _) = broadcast::channel(64);
        Ok(Arc::new(Self {
            registry: Mutex::new(Registry::new(&base_dir)),
            base_dir,
            global: Mutex::new(global),
            running: Mutex::new(HashSet::new()),
            silence_targets: Mutex::new(Vec::new()),
            stages: Mutex::new(StageTable::new()),
            power_sign: Mutex::new(PowerAction::NoAction),
            ignore_silence: AtomicBool::new(false),
            events,
        }))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn history_dir(&self) -> PathBuf {
        self.base_dir.join("history")
    }

    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("data/data.db")
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: AppEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub async fn power_sign(&self) -> PowerAction {
        *self.power_sign.lock().await
    }

    /// Arm (or clear) the deferred power action and notify subscribers.
    pub async fn set_power_sign(&self, action: PowerAction) {
        *self.power_sign.lock().await = action;
        self.emit(AppEvent::PowerSignChanged);
    }

    pub fn set_ignore_silence(&self, ignore: bool) {
        self.ignore_silence.store(ignore, Ordering::Relaxed);
    }

    pub fn ignores_silence(&self) -> bool {
        self.ignore_silence.load(Ordering::Relaxed)
    }

    /// Atomically claim a queue for execution. Returns false when it is
    /// already running — the caller must not launch it again.
    pub async fn try_claim_running(&self, name: &str) -> bool {
        self.running.lock().await.insert(name.to_string())
    }

    pub async fn release_running(&self, name: &str) {
        self.running.lock().await.remove(name);
    }

    pub async fn is_idle(&self) -> bool {
        self.running.lock().await.is_empty()
    }

    /// Commit a post-run batch for a scripted member's users, then emit
    /// exactly one `SubInfoChanged`.
    pub async fn commit_maa_user_info(
        &self,
        member_name: &str,
        updates: &HashMap<String, UserRunUpdate>,
    ) {
        self.registry
            .lock()
            .await
            .change_maa_user_info(member_name, updates);
        self.emit(AppEvent::SubInfoChanged);
    }

    /// Commit a post-run batch for an external-script member's subs, then
    /// emit exactly one `SubInfoChanged`.
    pub async fn commit_general_sub_info(
        &self,
        member_name: &str,
        updates: &HashMap<String, UserRunUpdate>,
    ) {
        self.registry
            .lock()
            .await
            .change_general_sub_info(member_name, updates);
        self.emit(AppEvent::SubInfoChanged);
    }
}

/// Default data directory when none is configured (~/.maadesk).
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".maadesk")
}

/// The operational "server day": rolls over at 04:00 local, so timestamps
/// before 04:00 belong to the previous calendar day.
pub fn server_date(now: DateTime<Local>) -> NaiveDate {
    let four = NaiveTime::from_hms_opt(4, 0, 0).unwrap_or(NaiveTime::MIN);
    if now.time() < four {
        (now - TimeDelta::days(1)).date_naive()
    } else {
        now.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("maadesk-context-{tag}"));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    #[tokio::test]
    async fn test_new_creates_layout_and_global_config() {
        let base = scratch("layout");
        let ctx = AppContext::new(&base).unwrap();
        for sub in ["config", "data", "debug", "history"] {
            assert!(base.join(sub).is_dir());
        }
        assert!(base.join("config/config.json").is_file());
        assert!(ctx.is_idle().await);
        std::fs::remove_dir_all(&base).ok();
    }

    #[tokio::test]
    async fn test_running_set_claims_once() {
        let base = scratch("claim");
        let ctx = AppContext::new(&base).unwrap();
        assert!(ctx.try_claim_running("Queue_1").await);
        assert!(!ctx.try_claim_running("Queue_1").await);
        ctx.release_running("Queue_1").await;
        assert!(ctx.try_claim_running("Queue_1").await);
        std::fs::remove_dir_all(&base).ok();
    }

    #[tokio::test]
    async fn test_power_sign_emits_event() {
        let base = scratch("power");
        let ctx = AppContext::new(&base).unwrap();
        let mut events = ctx.subscribe();
        ctx.set_power_sign(PowerAction::Shutdown).await;
        assert_eq!(ctx.power_sign().await, PowerAction::Shutdown);
        assert_eq!(events.try_recv().unwrap(), AppEvent::PowerSignChanged);
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn test_server_date_rolls_over_at_four() {
        let before = Local.with_ymd_and_hms(2026, 8, 7, 3, 59, 59).unwrap();
        let after = Local.with_ymd_and_hms(2026, 8, 7, 4, 0, 0).unwrap();
        assert_eq!(
            server_date(before),
            NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()
        );
        assert_eq!(
            server_date(after),
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
        );
    }
}
