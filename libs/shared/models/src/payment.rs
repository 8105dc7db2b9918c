use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::lenient;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "pix")]
    Pix,
    #[serde(rename = "dinheiro", alias = "cash")]
    Cash,
    #[serde(rename = "cartao", alias = "cartão", alias = "card")]
    Card,
    #[serde(rename = "transferencia", alias = "transferência", alias = "transfer")]
    Transfer,
}

/// `pendente → pago`; `atrasado` is derived from the clock, never set by a
/// caller transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "pago")]
    Paid,
    #[serde(rename = "atrasado")]
    Overdue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(deserialize_with = "lenient::string_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string_id")]
    pub patient_id: String,
    #[serde(default, deserialize_with = "lenient::option_string_id")]
    pub session_id: Option<String>,
    pub amount: f64,
    /// Due date.
    #[serde(deserialize_with = "lenient::datetime")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "Utc::now", deserialize_with = "lenient::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::option_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Payment {
    const COLLECTION: &'static str = "payments";
    const SINGULAR: &'static str = "payment";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Payment {
    pub fn effective_status(&self, now: DateTime<Utc>) -> PaymentStatus {
        match self.status {
            PaymentStatus::Pending if self.date < now => PaymentStatus::Overdue,
            status => status,
        }
    }

    pub fn with_effective_status(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now);
        self
    }
}

fn check_amount(amount: f64) -> Result<(), AppError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!("payment amount must be positive, got {}", amount)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    #[serde(deserialize_with = "lenient::string_id")]
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::option_string_id")]
    pub session_id: Option<String>,
    pub amount: f64,
    #[serde(deserialize_with = "lenient::datetime")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.status == Some(PaymentStatus::Overdue) {
            return Err(AppError::ValidationError(
                "overdue status is derived from the due date".to_string(),
            ));
        }
        check_amount(self.amount)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::option_datetime")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::option_string_id")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl PaymentPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.status == Some(PaymentStatus::Overdue) {
            return Err(AppError::ValidationError(
                "overdue status is derived from the due date".to_string(),
            ));
        }
        self.amount.map_or(Ok(()), check_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn payment(status: &str, due_in_days: i64) -> Payment {
        serde_json::from_value(json!({
            "id": "p1",
            "patientId": 3,
            "amount": 150.0,
            "date": (Utc::now() + Duration::days(due_in_days)).to_rfc3339(),
            "method": "cartão",
            "status": status
        }))
        .unwrap()
    }

    #[test]
    fn test_pending_past_due_reads_as_overdue() {
        let now = Utc::now();

        assert_eq!(payment("pendente", -2).effective_status(now), PaymentStatus::Overdue);
        assert_eq!(payment("pendente", 2).effective_status(now), PaymentStatus::Pending);
        assert_eq!(payment("pago", -2).effective_status(now), PaymentStatus::Paid);
    }

    #[test]
    fn test_overdue_cannot_be_set_explicitly() {
        let patch = PaymentPatch {
            status: Some(PaymentStatus::Overdue),
            ..Default::default()
        };

        assert!(patch.validate().is_err());
        assert!(PaymentPatch { amount: Some(-1.0), ..Default::default() }.validate().is_err());
    }

    #[test]
    fn test_method_aliases_normalize() {
        let p = payment("pago", 0);
        assert_eq!(p.method, PaymentMethod::Card);
        assert_eq!(p.patient_id, "3");
    }
}
