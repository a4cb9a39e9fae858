//! Collaborator seams.
//!
//! The real automation engine, the OS window/power layer, the remote
//! metadata feed, and the update checker all live outside this core. Each
//! is injected behind one of these traits; the `Null*` implementations
//! log and succeed so the core runs headless.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{MaadeskError, Result};
use crate::stage::StageActivity;

/// Deferred power action armed after a queue finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    NoAction,
    KillSelf,
    Sleep,
    Hibernate,
    Shutdown,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::NoAction => "NoAction",
            PowerAction::KillSelf => "KillSelf",
            PowerAction::Sleep => "Sleep",
            PowerAction::Hibernate => "Hibernate",
            PowerAction::Shutdown => "Shutdown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "KillSelf" => PowerAction::KillSelf,
            "Sleep" => PowerAction::Sleep,
            "Hibernate" => PowerAction::Hibernate,
            "Shutdown" => PowerAction::Shutdown,
            _ => PowerAction::NoAction,
        }
    }
}

/// One top-level window reported by the platform.
#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub title: String,
    pub path: String,
}

/// OS-level capabilities the dispatcher needs.
pub trait PlatformOps: Send + Sync {
    /// Currently present application windows (title, backing binary path).
    fn window_list(&self) -> Result<Vec<WindowInfo>>;
    /// Synthesize one press of the given key combination.
    fn send_keys(&self, keys: &[String]) -> Result<()>;
    /// Invoke a power action.
    fn power(&self, action: PowerAction) -> Result<()>;
    /// Remove the legacy autostart registration, if present.
    fn remove_autostart(&self) -> Result<()>;
}

/// Logging no-op platform for headless and test runs.
pub struct NullPlatform;

impl PlatformOps for NullPlatform {
    fn window_list(&self) -> Result<Vec<WindowInfo>> {
        Ok(Vec::new())
    }

    fn send_keys(&self, keys: &[String]) -> Result<()> {
        tracing::debug!("key synthesis skipped (no platform): {}", keys.join("+"));
        Ok(())
    }

    fn power(&self, action: PowerAction) -> Result<()> {
        tracing::info!("power action skipped (no platform): {}", action.as_str());
        Ok(())
    }

    fn remove_autostart(&self) -> Result<()> {
        Ok(())
    }
}

/// The external task-execution engine. `launch` must return quickly; the
/// engine reports back through the registry's post-run commit operations,
/// stamps the queue's last-launch timestamp via `save_history`, releases
/// the running claim, and maintains the context's silence-target list
/// while members run.
#[async_trait]
pub trait TaskLauncher: Send + Sync {
    async fn launch(&self, queue_name: &str, snapshot: Value) -> Result<()>;
}

/// Asks the user to approve an armed power action.
#[async_trait]
pub trait PowerConfirmer: Send + Sync {
    async fn confirm(&self, action: PowerAction) -> bool;
}

/// Unattended confirmation: always approves.
pub struct AutoConfirm;

#[async_trait]
impl PowerConfirmer for AutoConfirm {
    async fn confirm(&self, action: PowerAction) -> bool {
        tracing::info!("auto-confirming power action: {}", action.as_str());
        true
    }
}

/// Remote stage-activity metadata feed.
#[async_trait]
pub trait StageFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Vec<StageActivity>>;
}

/// Software update probe. `Ok(Some(version))` means an update exists.
#[async_trait]
pub trait UpdateChecker: Send + Sync {
    async fn check(&self) -> Result<Option<String>>;
}

/// Fetcher that always fails; stands in when networking is disabled.
pub struct OfflineFetcher;

#[async_trait]
impl StageFetcher for OfflineFetcher {
    async fn fetch(&self) -> Result<Vec<StageActivity>> {
        Err(MaadeskError::Network("networking disabled".into()))
    }
}

#[async_trait]
impl UpdateChecker for OfflineFetcher {
    async fn check(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_action_round_trip() {
        for action in [
            PowerAction::NoAction,
            PowerAction::KillSelf,
            PowerAction::Sleep,
            PowerAction::Hibernate,
            PowerAction::Shutdown,
        ] {
            assert_eq!(PowerAction::parse(action.as_str()), action);
        }
        assert_eq!(PowerAction::parse("whatever"), PowerAction::NoAction);
    }
}
