use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use shared_database::LocalStore;
use shared_models::AppError;

use crate::models::{ReminderSettings, ReminderSettingsUpdate};

pub const REMINDER_SETTINGS_KEY: &str = "reminder_settings";

/// Reminder configuration, hydrated from the local store on first access.
pub struct ReminderSettingsStore {
    local: Arc<LocalStore>,
    cached: RwLock<Option<ReminderSettings>>,
}

impl ReminderSettingsStore {
    pub fn new(local: Arc<LocalStore>) -> Self {
        Self {
            local,
            cached: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Result<ReminderSettings, AppError> {
        if let Some(settings) = self.cached.read().await.as_ref() {
            return Ok(settings.clone());
        }

        let mut cached = self.cached.write().await;
        if let Some(settings) = cached.as_ref() {
            return Ok(settings.clone());
        }

        let settings = match self.local.load_document::<ReminderSettings>(REMINDER_SETTINGS_KEY)? {
            Some(stored) => stored,
            None => {
                debug!("No stored reminder settings, using defaults");
                ReminderSettings::default()
            }
        };

        *cached = Some(settings.clone());
        Ok(settings)
    }

    pub async fn update(&self, update: ReminderSettingsUpdate) -> Result<ReminderSettings, AppError> {
        let mut settings = self.get().await?;

        if let Some(section) = update.appointment_reminder {
            settings.appointment_reminder = section;
        }
        if let Some(section) = update.payment_reminder {
            settings.payment_reminder = section;
        }
        if let Some(section) = update.birthday_reminder {
            settings.birthday_reminder = section;
        }

        settings.validate()?;
        self.persist(settings).await
    }

    pub async fn reset(&self) -> Result<ReminderSettings, AppError> {
        info!("Reminder settings reset to defaults");
        self.persist(ReminderSettings::default()).await
    }

    async fn persist(&self, settings: ReminderSettings) -> Result<ReminderSettings, AppError> {
        let mut cached = self.cached.write().await;
        self.local.save_document(REMINDER_SETTINGS_KEY, &settings)?;
        *cached = Some(settings.clone());
        Ok(settings)
    }
}
