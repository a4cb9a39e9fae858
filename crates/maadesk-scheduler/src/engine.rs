//! Dispatch engine — the 1 Hz tick that launches queues on time.
//!
//! A queue triggers when the current wall-clock minute matches one of its
//! enabled time slots. Duplicate launches are suppressed two ways: the
//! stored last-launch timestamp (stamped by the execution collaborator,
//! not by the tick) must be in a different minute, and the queue must not
//! already be in the shared running set. The running-set claim is atomic,
//! so two ticks can never both launch the same queue in the same minute.

use std::sync::Arc;

use chrono::{DateTime, Local};
use maadesk_core::documents::QueueConfig;
use maadesk_core::platform::TaskLauncher;
use maadesk_core::AppContext;
use serde_json::Value;

use crate::power::PowerGuard;
use crate::refresh::HourlyRefresh;
use crate::silence::SilenceGuard;

pub struct DispatchEngine {
    ctx: Arc<AppContext>,
    launcher: Arc<dyn TaskLauncher>,
}

impl DispatchEngine {
    pub fn new(ctx: Arc<AppContext>, launcher: Arc<dyn TaskLauncher>) -> Self {
        Self { ctx, launcher }
    }

    /// One scheduling pass at `now`. Returns the queues launched.
    pub async fn tick(&self, now: DateTime<Local>) -> Vec<String> {
        let minute = now.format("%Y-%m-%d %H:%M").to_string();
        let slot = now.format("%H:%M").to_string();

        let candidates: Vec<(String, Value)> = {
            let registry = self.ctx.registry.lock().await;
            registry
                .queues
                .iter()
                .filter(|queue| queue.config.get_bool(QueueConfig::ENABLED))
                .filter(|queue| queue.config.enabled_slots().contains(&slot))
                .filter(|queue| {
                    // the last-launch stamp's minute must differ; the
                    // collaborator stamps it, so a slow start cannot
                    // re-trigger within the same minute
                    let last = queue.config.get_str(QueueConfig::LAST_PROXY_TIME);
                    last.get(..16) != Some(minute.as_str())
                })
                .map(|queue| {
                    (
                        queue.name.clone(),
                        Value::Object(queue.config.to_map()),
                    )
                })
                .collect()
        };

        let mut launched = Vec::new();
        for (name, snapshot) in candidates {
            if !self.ctx.try_claim_running(&name).await {
                continue;
            }
            tracing::info!("scheduled launch: {name}");
            match self.launcher.launch(&name, snapshot).await {
                Ok(()) => launched.push(name),
                Err(e) => {
                    tracing::warn!("launch failed for {name}: {e}");
                    self.ctx.release_running(&name).await;
                }
            }
        }
        launched
    }
}

/// The main timer loop: queue dispatch, silence evaluation, and the power
/// evaluator, all at 1 Hz. Every failure path inside a tick is logged and
/// swallowed — this loop must stay alive for the life of the process.
pub async fn run_timer(
    engine: Arc<DispatchEngine>,
    silence: Arc<SilenceGuard>,
    power: Arc<PowerGuard>,
) {
    tracing::info!("timer core started (1s tick)");
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
    loop {
        interval.tick().await;
        engine.tick(Local::now()).await;
        silence.check().await;
        power.check().await;
    }
}

/// The slow loop: stage-metadata refresh and update check, hourly.
pub async fn run_hourly(refresh: Arc<HourlyRefresh>) {
    tracing::info!("hourly refresh started");
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
    loop {
        interval.tick().await;
        refresh.run_once().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use maadesk_core::error::Result;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct RecordingLauncher {
        launches: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TaskLauncher for RecordingLauncher {
        async fn launch(&self, queue_name: &str, _snapshot: Value) -> Result<()> {
            self.launches.lock().unwrap().push(queue_name.to_string());
            Ok(())
        }
    }

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("maadesk-engine-{tag}"));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    async fn engine_with_queue(tag: &str) -> (Arc<AppContext>, DispatchEngine, Arc<RecordingLauncher>) {
        let base = scratch(tag);
        let ctx = AppContext::new(&base).unwrap();
        let queue_file = base.join("config/QueueConfig/Queue_1.json");
        std::fs::create_dir_all(queue_file.parent().unwrap()).unwrap();
        std::fs::write(
            &queue_file,
            serde_json::json!({
                "QueueSet": {"Enabled": true},
                "Time": {"TimeEnabled_0": true, "TimeSet_0": "08:00"},
            })
            .to_string(),
        )
        .unwrap();
        ctx.registry.lock().await.search_queue();

        let launcher = Arc::new(RecordingLauncher {
            launches: Mutex::new(Vec::new()),
        });
        let engine = DispatchEngine::new(ctx.clone(), launcher.clone());
        (ctx, engine, launcher)
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 7, h, m, s).unwrap()
    }

    #[tokio::test]
    async fn test_triggers_exactly_once_per_slot_minute() {
        let (ctx, engine, launcher) = engine_with_queue("once").await;

        // first tick inside the slot minute fires
        let launched = engine.tick(at(8, 0, 0)).await;
        assert_eq!(launched, vec!["Queue_1"]);

        // still running: a later tick in the same minute is suppressed
        assert!(engine.tick(at(8, 0, 30)).await.is_empty());

        // collaborator finishes fast and stamps the launch time: the
        // last-launch minute now suppresses the rest of the minute
        ctx.registry
            .lock()
            .await
            .save_history("Queue_1", "2026-08-07 08:00:05", "done");
        ctx.release_running("Queue_1").await;
        assert!(engine.tick(at(8, 0, 45)).await.is_empty());

        // a minute with no enabled slot does not fire
        assert!(engine.tick(at(8, 1, 0)).await.is_empty());

        assert_eq!(launcher.launches.lock().unwrap().len(), 1);
        std::fs::remove_dir_all(ctx.base_dir()).ok();
    }

    #[tokio::test]
    async fn test_disabled_queue_never_fires() {
        let (ctx, engine, _launcher) = engine_with_queue("disabled").await;
        ctx.registry
            .lock()
            .await
            .queue_mut("Queue_1")
            .unwrap()
            .config
            .set(QueueConfig::ENABLED, false);
        assert!(engine.tick(at(8, 0, 0)).await.is_empty());
        std::fs::remove_dir_all(ctx.base_dir()).ok();
    }

    #[tokio::test]
    async fn test_next_day_same_slot_fires_again() {
        let (ctx, engine, launcher) = engine_with_queue("next-day").await;
        ctx.registry
            .lock()
            .await
            .save_history("Queue_1", "2026-08-06 08:00:02", "done");

        let launched = engine.tick(at(8, 0, 0)).await;
        assert_eq!(launched, vec!["Queue_1"]);
        assert_eq!(launcher.launches.lock().unwrap().len(), 1);
        std::fs::remove_dir_all(ctx.base_dir()).ok();
    }

    #[tokio::test]
    async fn test_launch_failure_releases_claim() {
        struct FailingLauncher;

        #[async_trait]
        impl TaskLauncher for FailingLauncher {
            async fn launch(&self, _queue_name: &str, _snapshot: Value) -> Result<()> {
                Err(maadesk_core::MaadeskError::Platform("engine offline".into()))
            }
        }

        let base = scratch("fail");
        let ctx = AppContext::new(&base).unwrap();
        let queue_file = base.join("config/QueueConfig/Queue_1.json");
        std::fs::create_dir_all(queue_file.parent().unwrap()).unwrap();
        std::fs::write(
            &queue_file,
            serde_json::json!({
                "QueueSet": {"Enabled": true},
                "Time": {"TimeEnabled_0": true, "TimeSet_0": "08:00"},
            })
            .to_string(),
        )
        .unwrap();
        ctx.registry.lock().await.search_queue();

        let engine = DispatchEngine::new(ctx.clone(), Arc::new(FailingLauncher));
        assert!(engine.tick(at(8, 0, 0)).await.is_empty());
        // the failed claim was released, the queue is not stuck "running"
        assert!(ctx.is_idle().await);
        std::fs::remove_dir_all(&base).ok();
    }
}
