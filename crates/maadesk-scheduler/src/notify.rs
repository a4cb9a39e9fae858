//! Notification dispatch — pushes run results to configured sinks.
//!
//! Supported sinks: ServerChan push, corporate webhook bot, SMTP mail.
//! Targets are built from the global config; per-sink failures are logged
//! and never propagated into the tick loop.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use maadesk_core::documents::GlobalConfig;
use maadesk_core::error::{MaadeskError, Result};

/// A message sink the dispatcher can deliver to.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// One configured notification target.
#[derive(Debug, Clone)]
pub enum NotifyTarget {
    ServerChan {
        key: String,
        channel: String,
        tag: String,
    },
    CorpWebhook {
        url: String,
    },
    Mail {
        smtp_server: String,
        auth_code: String,
        from: String,
        to: String,
    },
}

/// Build the active targets from the global notify settings.
pub fn targets_from_config(global: &GlobalConfig) -> Vec<NotifyTarget> {
    let mut targets = Vec::new();

    if global.get_bool(GlobalConfig::IF_SERVER_CHAN) {
        let key = global.get_str(GlobalConfig::SERVER_CHAN_KEY);
        if !key.is_empty() {
            targets.push(NotifyTarget::ServerChan {
                key,
                channel: global.get_str(GlobalConfig::SERVER_CHAN_CHANNEL),
                tag: global.get_str(GlobalConfig::SERVER_CHAN_TAG),
            });
        }
    }

    if global.get_bool(GlobalConfig::IF_CORP_WEBHOOK) {
        let url = global.get_str(GlobalConfig::CORP_WEBHOOK_URL);
        if !url.is_empty() {
            targets.push(NotifyTarget::CorpWebhook { url });
        }
    }

    if global.get_bool(GlobalConfig::IF_SEND_MAIL) {
        let smtp_server = global.get_str(GlobalConfig::SMTP_SERVER);
        let from = global.get_str(GlobalConfig::FROM_ADDRESS);
        let to = global.get_str(GlobalConfig::TO_ADDRESS);
        if !smtp_server.is_empty() && !from.is_empty() && !to.is_empty() {
            targets.push(NotifyTarget::Mail {
                smtp_server,
                auth_code: global.get_str(GlobalConfig::AUTH_CODE),
                from,
                to,
            });
        }
    }

    targets
}

/// Deliver one message to one target.
pub async fn dispatch(target: &NotifyTarget, subject: &str, body: &str) -> Result<()> {
    match target {
        NotifyTarget::ServerChan { key, channel, tag } => {
            send_server_chan(key, channel, tag, subject, body).await
        }
        NotifyTarget::CorpWebhook { url } => send_corp_webhook(url, subject, body).await,
        NotifyTarget::Mail {
            smtp_server,
            auth_code,
            from,
            to,
        } => send_mail(smtp_server, auth_code, from, to, subject, body).await,
    }
}

async fn send_server_chan(
    key: &str,
    channel: &str,
    tag: &str,
    subject: &str,
    body: &str,
) -> Result<()> {
    let url = format!("https://sctapi.ftqq.com/{key}.send");
    let mut payload = serde_json::json!({
        "title": subject,
        "desp": body,
    });
    if !channel.is_empty() {
        payload["channel"] = serde_json::Value::from(channel);
    }
    if !tag.is_empty() {
        payload["tags"] = serde_json::Value::from(tag);
    }

    let response = reqwest::Client::new()
        .post(&url)
        .json(&payload)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| MaadeskError::Network(format!("ServerChan send failed: {e}")))?;
    if response.status().is_success() {
        tracing::info!("ServerChan notification sent: {subject}");
        Ok(())
    } else {
        Err(MaadeskError::Network(format!(
            "ServerChan returned {}",
            response.status()
        )))
    }
}

async fn send_corp_webhook(url: &str, subject: &str, body: &str) -> Result<()> {
    let response = reqwest::Client::new()
        .post(url)
        .json(&serde_json::json!({
            "msgtype": "text",
            "text": {"content": format!("{subject}\n{body}")},
        }))
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| MaadeskError::Network(format!("webhook send failed: {e}")))?;
    if response.status().is_success() {
        tracing::info!("webhook notification sent: {subject}");
        Ok(())
    } else {
        Err(MaadeskError::Network(format!(
            "webhook returned {}",
            response.status()
        )))
    }
}

async fn send_mail(
    smtp_server: &str,
    auth_code: &str,
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<()> {
    let message = Message::builder()
        .from(
            from.parse()
                .map_err(|e| MaadeskError::Network(format!("bad from address: {e}")))?,
        )
        .to(to
            .parse()
            .map_err(|e| MaadeskError::Network(format!("bad to address: {e}")))?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| MaadeskError::Network(format!("mail build failed: {e}")))?;

    let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_server)
        .map_err(|e| MaadeskError::Network(format!("smtp relay failed: {e}")))?
        .credentials(Credentials::new(from.to_string(), auth_code.to_string()))
        .build();
    transport
        .send(message)
        .await
        .map_err(|e| MaadeskError::Network(format!("mail send failed: {e}")))?;
    tracing::info!("mail notification sent: {subject}");
    Ok(())
}

/// Fans a message out to every configured target; individual failures are
/// logged and do not stop the rest.
pub struct FanoutNotifier {
    targets: Vec<NotifyTarget>,
}

impl FanoutNotifier {
    pub fn new(targets: Vec<NotifyTarget>) -> Self {
        Self { targets }
    }

    pub fn from_config(global: &GlobalConfig) -> Self {
        Self::new(targets_from_config(global))
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        for target in &self.targets {
            if let Err(e) = dispatch(target, subject, body).await {
                tracing::warn!("notification delivery failed: {e}");
            }
        }
        Ok(())
    }
}
