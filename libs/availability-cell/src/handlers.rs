use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::models::{BackendStatus, BackendStatusQuery};
use crate::services::AvailabilityProbe;

pub async fn get_backend_status(
    State(probe): State<Arc<AvailabilityProbe>>,
    Query(query): Query<BackendStatusQuery>,
) -> Json<BackendStatus> {
    if query.refresh {
        probe.check().await;
    }

    Json(probe.backend_status().await)
}
