use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use shared_models::{
    AppError, Appointment, AppointmentPatch, AuthSession, ClinicalSession, Envelope, LoginRequest,
    NewAppointment, NewPatient, NewPayment, NewSession, Patient, PatientPatch, Payment,
    PaymentPatch, RegisterRequest, SessionPatch,
};

use crate::models::{CurrentUserResponse, DemoDataResponse, MessageResponse, PatientFilter};
use crate::services::ClinicDataService;

type Service = State<Arc<ClinicDataService>>;

// Patients

pub async fn list_patients(State(service): Service) -> Result<Json<Vec<Patient>>, AppError> {
    Ok(Json(service.get_patients().await?))
}

pub async fn get_patient(State(service): Service, Path(id): Path<String>) -> Result<Json<Patient>, AppError> {
    Ok(Json(service.get_patient(&id).await?))
}

pub async fn create_patient(
    State(service): Service,
    Json(input): Json<NewPatient>,
) -> Result<Json<Envelope<Patient>>, AppError> {
    Ok(Json(service.create_patient(input).await?))
}

pub async fn update_patient(
    State(service): Service,
    Path(id): Path<String>,
    Json(patch): Json<PatientPatch>,
) -> Result<Json<Envelope<Patient>>, AppError> {
    Ok(Json(service.update_patient(&id, patch).await?))
}

pub async fn delete_patient(State(service): Service, Path(id): Path<String>) -> Result<Json<MessageResponse>, AppError> {
    service.delete_patient(&id).await?;
    Ok(Json(MessageResponse::new("patient deleted")))
}

// Sessions

pub async fn list_sessions(
    State(service): Service,
    Query(filter): Query<PatientFilter>,
) -> Result<Json<Vec<ClinicalSession>>, AppError> {
    let sessions = match filter.patient_id {
        Some(patient_id) => service.get_patient_sessions(&patient_id).await?,
        None => service.get_sessions().await?,
    };
    Ok(Json(sessions))
}

pub async fn get_session(State(service): Service, Path(id): Path<String>) -> Result<Json<ClinicalSession>, AppError> {
    Ok(Json(service.get_session(&id).await?))
}

pub async fn create_session(
    State(service): Service,
    Json(input): Json<NewSession>,
) -> Result<Json<Envelope<ClinicalSession>>, AppError> {
    Ok(Json(service.create_session(input).await?))
}

pub async fn update_session(
    State(service): Service,
    Path(id): Path<String>,
    Json(patch): Json<SessionPatch>,
) -> Result<Json<Envelope<ClinicalSession>>, AppError> {
    Ok(Json(service.update_session(&id, patch).await?))
}

pub async fn delete_session(State(service): Service, Path(id): Path<String>) -> Result<Json<MessageResponse>, AppError> {
    service.delete_session(&id).await?;
    Ok(Json(MessageResponse::new("session deleted")))
}

// Appointments

pub async fn list_appointments(
    State(service): Service,
    Query(filter): Query<PatientFilter>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let appointments = match filter.patient_id {
        Some(patient_id) => service.get_patient_appointments(&patient_id).await?,
        None => service.get_appointments().await?,
    };
    Ok(Json(appointments))
}

pub async fn get_appointment(State(service): Service, Path(id): Path<String>) -> Result<Json<Appointment>, AppError> {
    Ok(Json(service.get_appointment(&id).await?))
}

pub async fn create_appointment(
    State(service): Service,
    Json(input): Json<NewAppointment>,
) -> Result<Json<Envelope<Appointment>>, AppError> {
    Ok(Json(service.create_appointment(input).await?))
}

pub async fn update_appointment(
    State(service): Service,
    Path(id): Path<String>,
    Json(patch): Json<AppointmentPatch>,
) -> Result<Json<Envelope<Appointment>>, AppError> {
    Ok(Json(service.update_appointment(&id, patch).await?))
}

pub async fn delete_appointment(State(service): Service, Path(id): Path<String>) -> Result<Json<MessageResponse>, AppError> {
    service.delete_appointment(&id).await?;
    Ok(Json(MessageResponse::new("appointment deleted")))
}

// Payments

pub async fn list_payments(
    State(service): Service,
    Query(filter): Query<PatientFilter>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = match filter.patient_id {
        Some(patient_id) => service.get_patient_payments(&patient_id).await?,
        None => service.get_payments().await?,
    };
    Ok(Json(payments))
}

pub async fn get_payment(State(service): Service, Path(id): Path<String>) -> Result<Json<Payment>, AppError> {
    Ok(Json(service.get_payment(&id).await?))
}

pub async fn create_payment(
    State(service): Service,
    Json(input): Json<NewPayment>,
) -> Result<Json<Envelope<Payment>>, AppError> {
    Ok(Json(service.create_payment(input).await?))
}

pub async fn update_payment(
    State(service): Service,
    Path(id): Path<String>,
    Json(patch): Json<PaymentPatch>,
) -> Result<Json<Envelope<Payment>>, AppError> {
    Ok(Json(service.update_payment(&id, patch).await?))
}

pub async fn delete_payment(State(service): Service, Path(id): Path<String>) -> Result<Json<MessageResponse>, AppError> {
    service.delete_payment(&id).await?;
    Ok(Json(MessageResponse::new("payment deleted")))
}

// Auth

pub async fn login(State(service): Service, Json(request): Json<LoginRequest>) -> Result<Json<AuthSession>, AppError> {
    Ok(Json(service.auth().login(request).await?))
}

pub async fn register(
    State(service): Service,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthSession>, AppError> {
    Ok(Json(service.auth().register(request).await?))
}

pub async fn verify(State(service): Service) -> Result<Json<CurrentUserResponse>, AppError> {
    let user = service.auth().verify().await?;
    Ok(Json(CurrentUserResponse { user }))
}

pub async fn current_user(State(service): Service) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        user: service.auth().current_user().await,
    })
}

pub async fn logout(State(service): Service) -> Result<Json<MessageResponse>, AppError> {
    service.auth().logout().await?;
    Ok(Json(MessageResponse::new("signed out")))
}

// Demo data

pub async fn initialize_demo_data(State(service): Service) -> Result<Json<DemoDataResponse>, AppError> {
    let permitted = service.initialize_demo_data().await?;
    let message = if permitted {
        "demo data loaded"
    } else {
        "only the administrator can load demo data"
    };

    Ok(Json(DemoDataResponse {
        permitted,
        message: message.to_string(),
    }))
}

pub async fn clear_demo_data(State(service): Service) -> Result<Json<MessageResponse>, AppError> {
    service.clear_demo_data().await?;
    Ok(Json(MessageResponse::new("local data cleared")))
}
