use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use shared_database::LocalStore;
use shared_models::AppError;

use crate::models::{DeliveryChannel, IntegrationConfig, IntegrationConfigUpdate};

pub const INTEGRATION_CONFIG_KEY: &str = "integration_config";

/// Per-channel enablement of the email, SMS and WhatsApp integrations.
pub struct IntegrationConfigStore {
    local: Arc<LocalStore>,
    cached: RwLock<Option<IntegrationConfig>>,
}

impl IntegrationConfigStore {
    pub fn new(local: Arc<LocalStore>) -> Self {
        Self {
            local,
            cached: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Result<IntegrationConfig, AppError> {
        if let Some(config) = self.cached.read().await.as_ref() {
            return Ok(config.clone());
        }

        let mut cached = self.cached.write().await;
        let config = self
            .local
            .load_document::<IntegrationConfig>(INTEGRATION_CONFIG_KEY)?
            .unwrap_or_default();
        *cached = Some(config.clone());
        Ok(config)
    }

    pub async fn update(&self, update: IntegrationConfigUpdate) -> Result<IntegrationConfig, AppError> {
        let mut config = self.get().await?;

        if let Some(email) = update.email {
            config.email = email;
        }
        if let Some(sms) = update.sms {
            config.sms = sms;
        }
        if let Some(whatsapp) = update.whatsapp {
            config.whatsapp = whatsapp;
        }

        let mut cached = self.cached.write().await;
        self.local.save_document(INTEGRATION_CONFIG_KEY, &config)?;
        *cached = Some(config.clone());

        info!(
            "Integrations updated: email={} sms={} whatsapp={}",
            config.email.enabled, config.sms.enabled, config.whatsapp.enabled
        );
        Ok(config)
    }

    pub async fn is_enabled(&self, channel: DeliveryChannel) -> Result<bool, AppError> {
        Ok(self.get().await?.is_enabled(channel))
    }
}
