use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::appointment::{default_duration, Modality};
use crate::error::AppError;
use crate::lenient;
use crate::record::Record;

pub const MOOD_SCALE: RangeInclusive<u8> = 1..=10;

/// A clinical session (stored in the `sessions` collection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalSession {
    #[serde(deserialize_with = "lenient::string_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string_id")]
    pub patient_id: String,
    #[serde(deserialize_with = "lenient::datetime")]
    pub date: DateTime<Utc>,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub modality: Modality,
    #[serde(default)]
    pub notes: String,
    pub mood: u8,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub techniques: Vec<String>,
    #[serde(default = "Utc::now", deserialize_with = "lenient::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::option_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for ClinicalSession {
    const COLLECTION: &'static str = "sessions";
    const SINGULAR: &'static str = "session";

    fn id(&self) -> &str {
        &self.id
    }
}

fn check_mood(mood: u8) -> Result<(), AppError> {
    if MOOD_SCALE.contains(&mood) {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!(
            "mood must be between {} and {}, got {}",
            MOOD_SCALE.start(),
            MOOD_SCALE.end(),
            mood
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    #[serde(deserialize_with = "lenient::string_id")]
    pub patient_id: String,
    #[serde(deserialize_with = "lenient::datetime")]
    pub date: DateTime<Utc>,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub modality: Modality,
    #[serde(default)]
    pub notes: String,
    pub mood: u8,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub techniques: Vec<String>,
}

impl NewSession {
    pub fn validate(&self) -> Result<(), AppError> {
        check_mood(self.mood)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::option_datetime")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<Modality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub techniques: Option<Vec<String>>,
}

impl SessionPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        self.mood.map_or(Ok(()), check_mood)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mood_outside_scale_is_rejected() {
        let session: NewSession = serde_json::from_value(json!({
            "patientId": "1",
            "date": "2024-05-02T10:00:00Z",
            "mood": 11
        }))
        .unwrap();

        assert!(session.validate().is_err());
        assert!(SessionPatch { mood: Some(0), ..Default::default() }.validate().is_err());
        assert!(SessionPatch::default().validate().is_ok());
    }
}
