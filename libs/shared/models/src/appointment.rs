use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::lenient;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Modality {
    #[default]
    #[serde(rename = "presencial", alias = "in_person")]
    InPerson,
    #[serde(rename = "online", alias = "remote")]
    Online,
}

/// `agendado → confirmado → realizado`, or `→ cancelado` from either of the
/// first two. `realizado` and `cancelado` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[default]
    #[serde(rename = "agendado")]
    Scheduled,
    #[serde(rename = "confirmado")]
    Confirmed,
    #[serde(rename = "realizado")]
    Completed,
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    pub fn can_transition_to(&self, target: &AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        match (self, target) {
            (current, next) if current == next => true,
            (Scheduled, Confirmed) => true,
            (Confirmed, Completed) => true,
            (Scheduled, Cancelled) | (Confirmed, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "agendado"),
            AppointmentStatus::Confirmed => write!(f, "confirmado"),
            AppointmentStatus::Completed => write!(f, "realizado"),
            AppointmentStatus::Cancelled => write!(f, "cancelado"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(deserialize_with = "lenient::string_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string_id")]
    pub patient_id: String,
    #[serde(deserialize_with = "lenient::datetime")]
    pub date: DateTime<Utc>,
    /// Minutes.
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub modality: Modality,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    /// Set once a reminder has been planned for this appointment.
    #[serde(default)]
    pub reminder_sent: bool,
    #[serde(default = "Utc::now", deserialize_with = "lenient::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::option_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Appointment {
    const COLLECTION: &'static str = "appointments";
    const SINGULAR: &'static str = "appointment";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Appointment {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.date + Duration::minutes(self.duration as i64)
    }
}

pub(crate) fn default_duration() -> u32 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    #[serde(deserialize_with = "lenient::string_id")]
    pub patient_id: String,
    #[serde(deserialize_with = "lenient::datetime")]
    pub date: DateTime<Utc>,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub modality: Modality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewAppointment {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.duration == 0 {
            return Err(AppError::ValidationError("appointment duration must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::option_datetime")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<Modality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_sent: Option<bool>,
}
