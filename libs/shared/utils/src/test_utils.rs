use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub api_base_url: String,
    pub admin_email: String,
    pub data_dir: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            // Nothing listens here; probes against it fail fast.
            api_base_url: "http://127.0.0.1:9".to_string(),
            admin_email: "admin@clinica.com".to_string(),
            data_dir: std::env::temp_dir()
                .join(format!("clinic-test-{}", Uuid::new_v4()))
                .to_string_lossy()
                .into_owned(),
        }
    }
}

impl TestConfig {
    pub fn with_api(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            api_base_url: self.api_base_url.clone(),
            health_path: "/health".to_string(),
            probe_timeout_ms: 500,
            probe_recheck_secs: 0,
            remote_timeout_ms: 2000,
            data_dir: self.data_dir.clone(),
            admin_email: self.admin_email.clone(),
            reminder_poll_secs: 1,
            channel_delay_ms: 0,
            port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", "clinician")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Test User".to_string(),
            email: email.to_string(),
            password: "s3cret-pass".to_string(),
            role: role.to_string(),
        }
    }

    pub fn clinician(email: &str) -> Self {
        Self::new(email, "clinician")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }
}

/// Canned bodies in the shape the remote clinic API returns.
pub struct MockApiResponses;

impl MockApiResponses {
    pub fn patient_response(id: &str, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "age": 34,
            "email": format!("{}@example.com", name.to_lowercase()),
            "phone": "(11) 99999-0000",
            "birthDate": "1990-03-15",
            "notes": null,
            "documents": [],
            "comments": [],
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": null
        })
    }

    pub fn session_response(id: &str, patient_id: &str) -> Value {
        json!({
            "id": id,
            "patientId": patient_id,
            "date": "2024-05-02T10:00:00.000Z",
            "duration": 50,
            "modality": "presencial",
            "notes": "Sessão inicial",
            "mood": 6,
            "objectives": ["rapport"],
            "techniques": ["escuta ativa"],
            "createdAt": "2024-05-02T11:00:00.000Z"
        })
    }

    pub fn appointment_response(id: &str, patient_id: &str, at: DateTime<Utc>) -> Value {
        json!({
            "id": id,
            "patientId": patient_id,
            "date": at.to_rfc3339(),
            "duration": 50,
            "modality": "online",
            "status": "agendado",
            "notes": null,
            "reminderSent": false,
            "createdAt": "2024-01-01T00:00:00.000Z"
        })
    }

    pub fn payment_response(id: &str, patient_id: &str, due_in_days: i64) -> Value {
        json!({
            "id": id,
            "patientId": patient_id,
            "sessionId": null,
            "amount": 200.0,
            "date": (Utc::now() + Duration::days(due_in_days)).to_rfc3339(),
            "method": "pix",
            "status": "pendente",
            "createdAt": "2024-01-01T00:00:00.000Z"
        })
    }

    pub fn envelope(singular: &str, message: &str, record: Value) -> Value {
        let mut body = serde_json::Map::new();
        body.insert("message".to_string(), json!(message));
        body.insert(singular.to_string(), record);
        Value::Object(body)
    }

    pub fn login_response(user: &TestUser, token: &str) -> Value {
        json!({
            "message": "Login realizado com sucesso",
            "token": token,
            "user": {
                "id": user.id,
                "name": user.name,
                "email": user.email,
                "role": user.role
            }
        })
    }

    pub fn error_response(message: &str) -> Value {
        json!({ "error": message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::{Envelope, Patient};

    #[test]
    fn test_config_creation() {
        let config = TestConfig::with_api("http://localhost:4000/api").to_app_config();

        assert_eq!(config.health_url(), "http://localhost:4000/api/health");
        assert!(config.probe_recheck().is_none());
        assert!(config.is_admin("admin@clinica.com"));
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::admin("root@clinica.com");
        let model = user.to_user();

        assert_eq!(model.email, user.email);
        assert_eq!(model.role.as_deref(), Some("admin"));
    }

    #[test]
    fn test_canned_patient_parses_as_model() {
        let body = MockApiResponses::envelope(
            "patient",
            "ok",
            MockApiResponses::patient_response("10", "Ana"),
        );
        let envelope = Envelope::<Patient>::from_value(body).unwrap();

        assert_eq!(envelope.record.id, "10");
        assert_eq!(envelope.record.age, Some(34));
    }
}
