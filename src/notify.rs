use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::types::{Alert, Urgency};

/// Maximum content length accepted by chat-style webhook transports.
const WEBHOOK_CONTENT_LIMIT: usize = 2_000;

/// One outbound notification channel.
///
/// `low_noise` marks chat-style channels that can absorb info/warning
/// traffic without causing alert fatigue; email-style channels report false
/// and only ever receive urgent/important alerts.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    fn low_noise(&self) -> bool;
    async fn send_alert(&self, alert: &Alert) -> bool;
    async fn send_message(&self, text: &str, urgency: Urgency) -> bool;
}

/// Chat webhook channel posting JSON content via HTTP.
pub struct WebhookChannel {
    name: String,
    url: String,
    http: reqwest::Client,
    low_noise: bool,
}

impl WebhookChannel {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("failed to build webhook client: {e}")))?;
        Ok(Self {
            name: name.into(),
            url: url.into(),
            http,
            low_noise: true,
        })
    }

    /// Delivery failures are logged and reported as false, never raised.
    async fn post(&self, content: &str) -> bool {
        let content: String = content.chars().take(WEBHOOK_CONTENT_LIMIT).collect();
        let result = self
            .http
            .post(&self.url)
            .json(&json!({ "content": content }))
            .send()
            .await;

        let reason = match result {
            Ok(response) if response.status().is_success() => return true,
            Ok(response) => format!("rejected with status {}", response.status()),
            Err(e) => e.to_string(),
        };
        error!(
            "{}",
            Error::Notification {
                channel: self.name.clone(),
                reason,
            }
        );
        false
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn low_noise(&self) -> bool {
        self.low_noise
    }

    async fn send_alert(&self, alert: &Alert) -> bool {
        self.post(&alert.message).await
    }

    async fn send_message(&self, text: &str, _urgency: Urgency) -> bool {
        self.post(text).await
    }
}

/// Sent/failed counters for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryCounter {
    pub sent: u64,
    pub failed: u64,
}

/// Router delivery statistics.
#[derive(Debug, Clone, Default)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
    pub by_channel: HashMap<String, DeliveryCounter>,
    pub by_urgency: HashMap<&'static str, DeliveryCounter>,
}

/// Fans alerts out to the configured channels by urgency.
///
/// Urgent and important alerts broadcast to every channel; info and warning
/// traffic goes only to low-noise channels. Channel failures are logged and
/// counted, never raised. With zero channels configured the router degrades
/// to log-only delivery.
pub struct NotificationRouter {
    channels: Vec<Arc<dyn NotificationChannel>>,
    stats: Mutex<DeliveryStats>,
}

impl NotificationRouter {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        let names: Vec<&str> = channels.iter().map(|c| c.name()).collect();
        if names.is_empty() {
            warn!("no notification channels configured; alerts will be logged only");
        } else {
            info!("notification router initialized with channels: {names:?}");
        }
        Self {
            channels,
            stats: Mutex::new(DeliveryStats::default()),
        }
    }

    fn targets(&self, urgency: Urgency) -> Vec<&Arc<dyn NotificationChannel>> {
        match urgency {
            Urgency::Urgent | Urgency::Important => self.channels.iter().collect(),
            Urgency::Info | Urgency::Warning => {
                self.channels.iter().filter(|c| c.low_noise()).collect()
            }
        }
    }

    /// Deliver an alert. Overall success means at least one targeted channel
    /// accepted it; log-only counts as delivered.
    pub async fn send_alert(&self, alert: &Alert) -> bool {
        let targets = self.targets(alert.urgency);
        if targets.is_empty() {
            info!(
                "[alert:{}] {}: {}",
                alert.urgency, alert.player.name, alert.kind.as_str()
            );
            return true;
        }

        let mut successes = 0usize;
        let total = targets.len();
        for channel in targets {
            let ok = channel.send_alert(alert).await;
            self.record(channel.name(), alert.urgency, ok);
            if ok {
                successes += 1;
                debug!("alert delivered via {}", channel.name());
            } else {
                warn!("alert delivery failed via {}", channel.name());
            }
        }

        let delivered = successes > 0;
        {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            if delivered {
                stats.delivered += 1;
            } else {
                stats.failed += 1;
            }
        }
        if !delivered {
            error!("alert failed to deliver via all {total} channels");
        } else if successes < total {
            warn!("alert delivered via {successes}/{total} channels");
        }
        delivered
    }

    /// Deliver a plain text message, routed by urgency like an alert.
    pub async fn send_message(&self, text: &str, urgency: Urgency) -> bool {
        let targets = self.targets(urgency);
        if targets.is_empty() {
            info!("[message:{urgency}] {text}");
            return true;
        }

        let mut successes = 0usize;
        for channel in targets {
            let ok = channel.send_message(text, urgency).await;
            self.record(channel.name(), urgency, ok);
            if ok {
                successes += 1;
            } else {
                warn!("message delivery failed via {}", channel.name());
            }
        }
        successes > 0
    }

    pub fn stats(&self) -> DeliveryStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, channel: &str, urgency: Urgency, ok: bool) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let by_channel = stats.by_channel.entry(channel.to_string()).or_default();
        if ok {
            by_channel.sent += 1;
        } else {
            by_channel.failed += 1;
        }
        let by_urgency = stats.by_urgency.entry(urgency.as_str()).or_default();
        if ok {
            by_urgency.sent += 1;
        } else {
            by_urgency.failed += 1;
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::Utc;

    use super::testing::RecordingChannel;
    use super::*;
    use crate::types::{DiscrepancyKind, MatchRef, MatchStatus, PlayerPosition, RosterEntry, Team};

    fn alert(urgency: Urgency) -> Alert {
        Alert {
            player: RosterEntry {
                id: "saka".into(),
                name: "Saka".into(),
                team: Team::new("Arsenal", "ARS"),
                position: PlayerPosition::Forward,
                expected_starting: true,
                average_points: 12.0,
                games_played: Some(20),
                draft_percentage: None,
                opponent: None,
            },
            match_ref: MatchRef {
                id: "55".into(),
                home: Team::new("Arsenal", "ARS"),
                away: Team::new("Chelsea", "CHE"),
                kickoff: Utc::now(),
                status: MatchStatus::NotStarted,
            },
            kind: DiscrepancyKind::BenchedUnexpectedly,
            urgency,
            message: "test alert".into(),
            context: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn urgent_broadcasts_and_tolerates_one_failure() {
        let good = RecordingChannel::new("chat", true, true);
        let bad = RecordingChannel::new("mail", false, false);
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![good.clone(), bad.clone()];
        let router = NotificationRouter::new(channels);

        let delivered = router.send_alert(&alert(Urgency::Urgent)).await;
        assert!(delivered);
        assert_eq!(good.alert_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(bad.alert_attempts.load(Ordering::SeqCst), 1);

        let stats = router.stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.by_channel["chat"].sent, 1);
        assert_eq!(stats.by_channel["mail"].failed, 1);
        assert_eq!(stats.by_urgency["urgent"].sent, 1);
    }

    #[tokio::test]
    async fn info_skips_non_low_noise_channels() {
        let mail = RecordingChannel::new("mail", false, true);
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![mail.clone()];
        let router = NotificationRouter::new(channels);

        router.send_alert(&alert(Urgency::Info)).await;
        assert_eq!(mail.alert_attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn info_reaches_low_noise_channels() {
        let chat = RecordingChannel::new("chat", true, true);
        let mail = RecordingChannel::new("mail", false, true);
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![chat.clone(), mail.clone()];
        let router = NotificationRouter::new(channels);

        router.send_alert(&alert(Urgency::Info)).await;
        assert_eq!(chat.alert_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(mail.alert_attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_channels_failing_is_overall_failure() {
        let a = RecordingChannel::new("a", true, false);
        let b = RecordingChannel::new("b", true, false);
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![a, b];
        let router = NotificationRouter::new(channels);

        let delivered = router.send_alert(&alert(Urgency::Urgent)).await;
        assert!(!delivered);
        assert_eq!(router.stats().failed, 1);
    }

    #[tokio::test]
    async fn zero_channels_degrades_to_log_only() {
        let router = NotificationRouter::new(Vec::new());
        assert!(router.send_alert(&alert(Urgency::Urgent)).await);
        assert!(router.send_message("hello", Urgency::Info).await);
    }

    #[tokio::test]
    async fn warning_message_routed_to_low_noise_only() {
        let chat = RecordingChannel::new("chat", true, true);
        let mail = RecordingChannel::new("mail", false, true);
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![chat.clone(), mail.clone()];
        let router = NotificationRouter::new(channels);

        router.send_message("lineup missing", Urgency::Warning).await;
        assert_eq!(chat.message_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(mail.message_attempts.load(Ordering::SeqCst), 0);
    }
}
