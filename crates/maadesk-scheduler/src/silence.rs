//! Silence-mode evaluator.
//!
//! While automation runs in the background, the target application's
//! window is suppressed by synthesizing the configured "boss key". Runs
//! on the 1 Hz tick; every platform failure is logged and swallowed.

use std::sync::Arc;

use maadesk_core::documents::GlobalConfig;
use maadesk_core::platform::PlatformOps;
use maadesk_core::AppContext;

/// The emulator spawns a transient window with this title for toast
/// notifications; it must not trip the boss key.
pub const NOTIFY_WINDOW_TITLE: &str = "新通知";

pub struct SilenceGuard {
    ctx: Arc<AppContext>,
    platform: Arc<dyn PlatformOps>,
}

impl SilenceGuard {
    pub fn new(ctx: Arc<AppContext>, platform: Arc<dyn PlatformOps>) -> Self {
        Self { ctx, platform }
    }

    pub async fn check(&self) {
        if self.ctx.ignores_silence() {
            return;
        }
        let (enabled, boss_key) = {
            let global = self.ctx.global.lock().await;
            (
                global.get_bool(GlobalConfig::IF_SILENCE),
                global.get_str(GlobalConfig::BOSS_KEY),
            )
        };
        if !enabled || boss_key.is_empty() {
            return;
        }

        let targets = self.ctx.silence_targets.lock().await.clone();
        if targets.is_empty() {
            return;
        }

        let windows = match self.platform.window_list() {
            Ok(windows) => windows,
            Err(e) => {
                tracing::warn!("window enumeration failed: {e}");
                return;
            }
        };

        let hit = windows.iter().any(|window| {
            window.title != NOTIFY_WINDOW_TITLE
                && targets.iter().any(|target| window.path.contains(target))
        });
        if hit {
            if let Err(e) = self.platform.send_keys(&parse_key_combo(&boss_key)) {
                tracing::error!("key synthesis failed: {e}");
            }
        }
    }
}

/// Split a `+`-joined combo into trimmed, lowercased key names.
pub fn parse_key_combo(combo: &str) -> Vec<String> {
    combo
        .split('+')
        .map(|key| key.trim().to_lowercase())
        .filter(|key| !key.is_empty())
        .collect()
}
