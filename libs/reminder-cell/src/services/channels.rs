use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::models::{BrowserPermission, DeliveryChannel, FeedEntry, FeedStyle, NotificationConfig};
use crate::services::integrations::IntegrationConfigStore;

/// A delivery mechanism for notifications. `send` reports success and
/// never fails the caller.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> DeliveryChannel;

    async fn send(&self, notification: &NotificationConfig) -> bool;
}

const DEFAULT_FEED_CAPACITY: usize = 100;

/// In-app list of browser-channel deliveries, newest first, with a
/// broadcast for live listeners.
pub struct NotificationFeed {
    entries: RwLock<VecDeque<FeedEntry>>,
    capacity: usize,
    sender: broadcast::Sender<FeedEntry>,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            sender,
        }
    }

    pub async fn push(&self, entry: FeedEntry) {
        let mut entries = self.entries.write().await;
        entries.push_front(entry.clone());
        entries.truncate(self.capacity);

        // No listeners is fine.
        let _ = self.sender.send(entry);
    }

    pub async fn recent(&self) -> Vec<FeedEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEntry> {
        self.sender.subscribe()
    }
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Shows notifications in the feed: as a desktop notification when the
/// user granted permission, as a toast otherwise.
pub struct BrowserChannel {
    feed: Arc<NotificationFeed>,
    permission: RwLock<BrowserPermission>,
}

impl BrowserChannel {
    pub fn new(feed: Arc<NotificationFeed>) -> Self {
        Self {
            feed,
            permission: RwLock::new(BrowserPermission::Default),
        }
    }

    pub async fn permission(&self) -> BrowserPermission {
        *self.permission.read().await
    }

    pub async fn set_permission(&self, permission: BrowserPermission) {
        info!("Browser notification permission set to {:?}", permission);
        *self.permission.write().await = permission;
    }

    pub fn feed(&self) -> &Arc<NotificationFeed> {
        &self.feed
    }
}

#[async_trait]
impl NotificationChannel for BrowserChannel {
    fn kind(&self) -> DeliveryChannel {
        DeliveryChannel::Browser
    }

    async fn send(&self, notification: &NotificationConfig) -> bool {
        let style = match self.permission().await {
            BrowserPermission::Granted => FeedStyle::Desktop,
            _ => FeedStyle::Toast,
        };

        self.feed
            .push(FeedEntry {
                notification_id: notification.id.clone(),
                title: notification.title.clone(),
                message: notification.message.clone(),
                priority: notification.priority,
                style,
                delivered_at: Utc::now(),
            })
            .await;

        debug!("Notification {} shown as {:?}", notification.id, style);
        true
    }
}

/// Stand-in for an external email, SMS or WhatsApp provider: waits for the
/// configured latency, logs the message and succeeds when the integration
/// is enabled.
pub struct SimulatedChannel {
    kind: DeliveryChannel,
    integrations: Arc<IntegrationConfigStore>,
    delay: Duration,
}

impl SimulatedChannel {
    pub fn new(kind: DeliveryChannel, integrations: Arc<IntegrationConfigStore>, delay: Duration) -> Self {
        Self {
            kind,
            integrations,
            delay,
        }
    }
}

#[async_trait]
impl NotificationChannel for SimulatedChannel {
    fn kind(&self) -> DeliveryChannel {
        self.kind
    }

    async fn send(&self, notification: &NotificationConfig) -> bool {
        let enabled = match self.integrations.is_enabled(self.kind).await {
            Ok(enabled) => enabled,
            Err(e) => {
                warn!("Could not read {} integration config: {}", self.kind, e);
                false
            }
        };

        if !enabled {
            warn!("{} integration disabled, notification {} not sent", self.kind, notification.id);
            return false;
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        info!(
            "[{}] {}: {} (patient: {})",
            self.kind,
            notification.title,
            notification.message,
            notification.patient_id.as_deref().unwrap_or("-")
        );
        true
    }
}
