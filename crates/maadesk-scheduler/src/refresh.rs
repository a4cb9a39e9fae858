//! Hourly refresh: stage-activity metadata and the update check.
//!
//! A failed fetch means "no update this cycle": the stage table is still
//! rebuilt from the fixed daily lookup so per-weekday options stay valid,
//! and the loop carries on.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone};
use maadesk_core::documents::GlobalConfig;
use maadesk_core::error::{MaadeskError, Result};
use maadesk_core::platform::{StageFetcher, UpdateChecker};
use maadesk_core::stage::StageActivity;
use maadesk_core::{AppContext, AppEvent};

pub struct HourlyRefresh {
    ctx: Arc<AppContext>,
    fetcher: Arc<dyn StageFetcher>,
    updater: Arc<dyn UpdateChecker>,
}

impl HourlyRefresh {
    pub fn new(
        ctx: Arc<AppContext>,
        fetcher: Arc<dyn StageFetcher>,
        updater: Arc<dyn UpdateChecker>,
    ) -> Self {
        Self {
            ctx,
            fetcher,
            updater,
        }
    }

    pub async fn run_once(&self) {
        let activities = match self.fetcher.fetch().await {
            Ok(activities) => activities,
            Err(e) => {
                tracing::warn!("stage metadata fetch failed: {e}");
                Vec::new()
            }
        };
        {
            let mut stages = self.ctx.stages.lock().await;
            stages.rebuild(&activities, Local::now());
        }
        self.ctx.emit(AppEvent::StageRefreshed);

        let auto_update = self
            .ctx
            .global
            .lock()
            .await
            .get_bool(GlobalConfig::IF_AUTO_UPDATE);
        if auto_update {
            match self.updater.check().await {
                Ok(Some(version)) => tracing::info!("update available: {version}"),
                Ok(None) => tracing::debug!("software is up to date"),
                Err(e) => tracing::warn!("update check failed, no update this cycle: {e}"),
            }
        }
    }
}

/// Default endpoint for time-boxed event-stage metadata.
pub const STAGE_ACTIVITY_URL: &str =
    "https://api.maa.plus/MaaAssistantArknights/api/gui/StageActivity.json";

const ACTIVITY_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Fetches the stage-activity feed over HTTP.
pub struct RemoteStageFetcher {
    client: reqwest::Client,
    url: String,
}

impl RemoteStageFetcher {
    pub fn new() -> Self {
        Self::with_url(STAGE_ACTIVITY_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl Default for RemoteStageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StageFetcher for RemoteStageFetcher {
    async fn fetch(&self) -> Result<Vec<StageActivity>> {
        let response = self
            .client
            .get(&self.url)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| MaadeskError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(MaadeskError::Network(format!(
                "stage feed returned {}",
                response.status()
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MaadeskError::Network(e.to_string()))?;
        Ok(parse_stage_feed(&body))
    }
}

/// Extract the side-story stage entries from the feed body. Entries with
/// malformed timestamps are dropped.
pub fn parse_stage_feed(body: &serde_json::Value) -> Vec<StageActivity> {
    let Some(entries) = body["Official"]["sideStoryStage"].as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let value = entry["Value"].as_str()?;
            let start = parse_activity_time(entry["Activity"]["UtcStartTime"].as_str()?)?;
            let end = parse_activity_time(entry["Activity"]["UtcExpireTime"].as_str()?)?;
            Some(StageActivity {
                value: value.to_string(),
                start,
                end,
            })
        })
        .collect()
}

fn parse_activity_time(text: &str) -> Option<chrono::DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(text, ACTIVITY_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}
