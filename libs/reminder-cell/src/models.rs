use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared_models::{lenient, AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Appointment,
    Payment,
    Birthday,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryChannel {
    #[default]
    Browser,
    Email,
    Sms,
    Whatsapp,
}

impl fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryChannel::Browser => write!(f, "browser"),
            DeliveryChannel::Email => write!(f, "email"),
            DeliveryChannel::Sms => write!(f, "sms"),
            DeliveryChannel::Whatsapp => write!(f, "whatsapp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// Outcome of the single delivery attempt a notification gets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub channel: DeliveryChannel,
    pub success: bool,
    pub attempted_at: DateTime<Utc>,
}

/// A scheduled reminder. `sent` only ever goes from false to true and
/// `scheduled_for` never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(deserialize_with = "lenient::datetime")]
    pub scheduled_for: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::option_string_id")]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub sent: bool,
    #[serde(default)]
    pub method: DeliveryChannel,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "Utc::now", deserialize_with = "lenient::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryRecord>,
}

impl NotificationConfig {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.sent && self.scheduled_for <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(deserialize_with = "lenient::datetime")]
    pub scheduled_for: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::option_string_id")]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub method: DeliveryChannel,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentReminderSettings {
    pub enabled: bool,
    /// Minutes before the appointment.
    pub time_before: u32,
    pub methods: Vec<DeliveryChannel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReminderSettings {
    pub enabled: bool,
    /// Days after the due date.
    pub days_after: u32,
    pub methods: Vec<DeliveryChannel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthdayReminderSettings {
    pub enabled: bool,
    /// Days before the birthday.
    pub days_before: u32,
    pub methods: Vec<DeliveryChannel>,
}

/// Upper bounds accepted for the reminder offsets.
pub const MAX_TIME_BEFORE_MINUTES: u32 = 43_200;
pub const MAX_OFFSET_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettings {
    pub appointment_reminder: AppointmentReminderSettings,
    pub payment_reminder: PaymentReminderSettings,
    pub birthday_reminder: BirthdayReminderSettings,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            appointment_reminder: AppointmentReminderSettings {
                enabled: true,
                time_before: 30,
                methods: vec![DeliveryChannel::Browser, DeliveryChannel::Email],
            },
            payment_reminder: PaymentReminderSettings {
                enabled: true,
                days_after: 3,
                methods: vec![DeliveryChannel::Email, DeliveryChannel::Sms],
            },
            birthday_reminder: BirthdayReminderSettings {
                enabled: true,
                days_before: 1,
                methods: vec![DeliveryChannel::Email, DeliveryChannel::Whatsapp],
            },
        }
    }
}

impl ReminderSettings {
    pub fn validate(&self) -> Result<(), AppError> {
        check_offset("appointmentReminder.timeBefore", self.appointment_reminder.time_before, MAX_TIME_BEFORE_MINUTES)?;
        check_offset("paymentReminder.daysAfter", self.payment_reminder.days_after, MAX_OFFSET_DAYS)?;
        check_offset("birthdayReminder.daysBefore", self.birthday_reminder.days_before, MAX_OFFSET_DAYS)
    }
}

fn check_offset(field: &str, value: u32, max: u32) -> Result<(), AppError> {
    if value > max {
        return Err(AppError::ValidationError(format!(
            "{} must be at most {}, got {}",
            field, max, value
        )));
    }
    Ok(())
}

/// Sections present here replace the stored section as a whole; absent
/// sections are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_reminder: Option<AppointmentReminderSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_reminder: Option<PaymentReminderSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday_reminder: Option<BirthdayReminderSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelIntegration {
    pub enabled: bool,
    /// Sender address, phone number or account, depending on the channel.
    #[serde(default)]
    pub sender: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    #[serde(default)]
    pub email: ChannelIntegration,
    #[serde(default)]
    pub sms: ChannelIntegration,
    #[serde(default)]
    pub whatsapp: ChannelIntegration,
}

impl IntegrationConfig {
    /// The browser channel has no integration and is always enabled.
    pub fn is_enabled(&self, channel: DeliveryChannel) -> bool {
        match channel {
            DeliveryChannel::Browser => true,
            DeliveryChannel::Email => self.email.enabled,
            DeliveryChannel::Sms => self.sms.enabled,
            DeliveryChannel::Whatsapp => self.whatsapp.enabled,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<ChannelIntegration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms: Option<ChannelIntegration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<ChannelIntegration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserPermission {
    Granted,
    Denied,
    #[default]
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStyle {
    Desktop,
    Toast,
}

/// What the UI shows for a browser-channel delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub notification_id: String,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub style: FeedStyle,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub permission: BrowserPermission,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickResponse {
    pub delivered: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_wire_shape() {
        let notification: NotificationConfig = serde_json::from_value(json!({
            "id": "n1",
            "type": "appointment",
            "title": "Lembrete",
            "message": "Consulta amanhã",
            "scheduledFor": "2024-06-01T13:30:00.000Z",
            "patientId": 3,
            "sent": false,
            "method": "whatsapp",
            "priority": "high",
            "createdAt": "2024-06-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(notification.notification_type, NotificationType::Appointment);
        assert_eq!(notification.patient_id.as_deref(), Some("3"));
        assert_eq!(notification.method, DeliveryChannel::Whatsapp);

        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "appointment");
        assert!(value.get("delivery").is_none());
    }

    #[test]
    fn test_default_settings_baseline() {
        let value = serde_json::to_value(ReminderSettings::default()).unwrap();

        assert_eq!(
            value["appointmentReminder"],
            json!({ "enabled": true, "timeBefore": 30, "methods": ["browser", "email"] })
        );
        assert_eq!(value["paymentReminder"]["daysAfter"], 3);
        assert_eq!(value["birthdayReminder"]["methods"], json!(["email", "whatsapp"]));
    }

    #[test]
    fn test_offsets_out_of_range_are_rejected() {
        let mut settings = ReminderSettings::default();
        assert!(settings.validate().is_ok());

        settings.payment_reminder.days_after = MAX_OFFSET_DAYS + 1;
        assert!(matches!(settings.validate(), Err(AppError::ValidationError(_))));

        settings.payment_reminder.days_after = MAX_OFFSET_DAYS;
        settings.appointment_reminder.time_before = u32::MAX;
        assert!(matches!(settings.validate(), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_browser_is_always_enabled() {
        let config = IntegrationConfig::default();

        assert!(config.is_enabled(DeliveryChannel::Browser));
        assert!(!config.is_enabled(DeliveryChannel::Email));
    }
}
