use serde::{Deserialize, Serialize};

use shared_models::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Optional `?patientId=` filter on the collection routes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFilter {
    pub patient_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoDataResponse {
    pub permitted: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUserResponse {
    pub user: Option<User>,
}
