//! Deferred power-action evaluator.
//!
//! A queue can arm a power action (sleep, hibernate, shutdown, self-exit)
//! for "after everything finishes". The evaluator waits for the running
//! set to empty, asks for confirmation, and clears the armed sign on both
//! the approve and cancel paths so the prompt never repeats every tick.

use std::sync::Arc;

use maadesk_core::platform::{PlatformOps, PowerAction, PowerConfirmer};
use maadesk_core::AppContext;

pub struct PowerGuard {
    ctx: Arc<AppContext>,
    platform: Arc<dyn PlatformOps>,
    confirmer: Arc<dyn PowerConfirmer>,
}

impl PowerGuard {
    pub fn new(
        ctx: Arc<AppContext>,
        platform: Arc<dyn PlatformOps>,
        confirmer: Arc<dyn PowerConfirmer>,
    ) -> Self {
        Self {
            ctx,
            platform,
            confirmer,
        }
    }

    pub async fn check(&self) {
        let sign = self.ctx.power_sign().await;
        if sign == PowerAction::NoAction {
            return;
        }
        if !self.ctx.is_idle().await {
            return;
        }

        if self.confirmer.confirm(sign).await {
            tracing::info!("executing power action: {}", sign.as_str());
            if let Err(e) = self.platform.power(sign) {
                tracing::warn!("power action failed: {e}");
            }
        } else {
            tracing::info!("power action cancelled: {}", sign.as_str());
        }
        self.ctx.set_power_sign(PowerAction::NoAction).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use maadesk_core::error::Result;
    use maadesk_core::platform::WindowInfo;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FakePlatform {
        invoked: Mutex<Vec<PowerAction>>,
    }

    impl PlatformOps for FakePlatform {
        fn window_list(&self) -> Result<Vec<WindowInfo>> {
            Ok(Vec::new())
        }

        fn send_keys(&self, _keys: &[String]) -> Result<()> {
            Ok(())
        }

        fn power(&self, action: PowerAction) -> Result<()> {
            self.invoked.lock().unwrap().push(action);
            Ok(())
        }

        fn remove_autostart(&self) -> Result<()> {
            Ok(())
        }
    }

    struct FixedConfirmer(bool);

    #[async_trait]
    impl PowerConfirmer for FixedConfirmer {
        async fn confirm(&self, _action: PowerAction) -> bool {
            self.0
        }
    }

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("maadesk-power-{tag}"));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    fn guard(
        ctx: Arc<AppContext>,
        approve: bool,
    ) -> (PowerGuard, Arc<FakePlatform>) {
        let platform = Arc::new(FakePlatform {
            invoked: Mutex::new(Vec::new()),
        });
        (
            PowerGuard::new(ctx, platform.clone(), Arc::new(FixedConfirmer(approve))),
            platform,
        )
    }

    #[tokio::test]
    async fn test_waits_for_running_set_to_empty() {
        let ctx = AppContext::new(scratch("waits")).unwrap();
        ctx.set_power_sign(PowerAction::Shutdown).await;
        ctx.try_claim_running("Queue_1").await;

        let (guard, platform) = guard(ctx.clone(), true);
        guard.check().await;
        // a task is still running: nothing executed, sign stays armed
        assert!(platform.invoked.lock().unwrap().is_empty());
        assert_eq!(ctx.power_sign().await, PowerAction::Shutdown);

        ctx.release_running("Queue_1").await;
        guard.check().await;
        assert_eq!(*platform.invoked.lock().unwrap(), vec![PowerAction::Shutdown]);
        assert_eq!(ctx.power_sign().await, PowerAction::NoAction);
        std::fs::remove_dir_all(ctx.base_dir()).ok();
    }

    #[tokio::test]
    async fn test_cancel_clears_sign_without_executing() {
        let ctx = AppContext::new(scratch("cancel")).unwrap();
        ctx.set_power_sign(PowerAction::Sleep).await;

        let (guard, platform) = guard(ctx.clone(), false);
        guard.check().await;
        assert!(platform.invoked.lock().unwrap().is_empty());
        // the sign is cleared so the prompt does not repeat every tick
        assert_eq!(ctx.power_sign().await, PowerAction::NoAction);
        std::fs::remove_dir_all(ctx.base_dir()).ok();
    }

    #[tokio::test]
    async fn test_no_action_is_inert() {
        let ctx = AppContext::new(scratch("inert")).unwrap();
        let (guard, platform) = guard(ctx.clone(), true);
        guard.check().await;
        assert!(platform.invoked.lock().unwrap().is_empty());
        std::fs::remove_dir_all(ctx.base_dir()).ok();
    }
}
