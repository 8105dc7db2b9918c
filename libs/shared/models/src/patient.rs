use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::lenient;
use crate::record::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(deserialize_with = "lenient::string_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::option_date")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default = "Utc::now", deserialize_with = "lenient::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::option_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Patient {
    const COLLECTION: &'static str = "patients";
    const SINGULAR: &'static str = "patient";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Patient {
    /// Next occurrence of the birthday on or after `today`. A 29 February
    /// birthday falls on 28 February in common years.
    pub fn next_birthday(&self, today: NaiveDate) -> Option<NaiveDate> {
        let birth = self.birth_date?;
        let this_year = birthday_in(birth, today.year())?;

        if this_year >= today {
            Some(this_year)
        } else {
            birthday_in(birth, today.year() + 1)
        }
    }
}

fn birthday_in(birth: NaiveDate, year: i32) -> Option<NaiveDate> {
    birth
        .with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, birth.month(), 28))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(deserialize_with = "lenient::string_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient::option_datetime")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(deserialize_with = "lenient::string_id")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient::option_datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::option_date")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewPatient {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError("patient name is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::option_date")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Document>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
}

impl PatientPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        match &self.name {
            Some(name) if name.trim().is_empty() => Err(AppError::ValidationError(
                "patient name cannot be blank".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient_born(date: NaiveDate) -> Patient {
        Patient {
            id: "1".to_string(),
            name: "Ana".to_string(),
            age: None,
            email: None,
            phone: None,
            birth_date: Some(date),
            notes: None,
            documents: vec![],
            comments: vec![],
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_next_birthday_rolls_over_to_next_year() {
        let patient = patient_born(NaiveDate::from_ymd_opt(1990, 3, 15).unwrap());
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        assert_eq!(patient.next_birthday(today), NaiveDate::from_ymd_opt(2025, 3, 15));
    }

    #[test]
    fn test_leap_day_birthday_in_common_year() {
        let patient = patient_born(NaiveDate::from_ymd_opt(1992, 2, 29).unwrap());
        let today = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();

        assert_eq!(patient.next_birthday(today), NaiveDate::from_ymd_opt(2025, 2, 28));
    }

    #[test]
    fn test_blank_name_is_rejected() {
        assert!(NewPatient::named("  ").validate().is_err());
        assert!(NewPatient::named("Ana").validate().is_ok());
    }
}
