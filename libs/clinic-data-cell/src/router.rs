use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::services::ClinicDataService;

pub fn clinic_data_routes(service: Arc<ClinicDataService>) -> Router {
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/{id}", get(get_patient).put(update_patient).delete(delete_patient))
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/{id}", get(get_session).put(update_session).delete(delete_session))
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/{id}",
            get(get_appointment).put(update_appointment).delete(delete_appointment),
        )
        .route("/payments", get(list_payments).post(create_payment))
        .route("/payments/{id}", get(get_payment).put(update_payment).delete(delete_payment))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/verify", get(verify))
        .route("/auth/me", get(current_user))
        .route("/auth/logout", post(logout))
        .route("/demo/initialize", post(initialize_demo_data))
        .route("/demo/clear", post(clear_demo_data))
        .with_state(service)
}
