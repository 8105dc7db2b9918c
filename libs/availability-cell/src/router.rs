use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers::get_backend_status;
use crate::services::AvailabilityProbe;

pub fn availability_routes(probe: Arc<AvailabilityProbe>) -> Router {
    Router::new()
        .route("/", get(get_backend_status))
        .with_state(probe)
}
