use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use availability_cell::AvailabilityProbe;
use shared_config::AppConfig;
use shared_database::{LocalStore, RemoteApiClient, RemoteError};
use shared_models::{
    AppError, Appointment, AppointmentPatch, ClinicalSession, Envelope, NewAppointment,
    NewPatient, NewPayment, NewSession, Patient, PatientPatch, Payment, PaymentPatch, Record,
    SessionPatch,
};

use crate::services::auth::AuthService;

/// CRUD over patients, sessions, appointments and payments that hides
/// whether the data came from the remote API or the local store.
///
/// Each call asks the probe first. When the backend is reachable the
/// remote call is tried and any failure falls back to the local store for
/// that call only; when it is not, the network is never touched.
pub struct ClinicDataService {
    config: Arc<AppConfig>,
    remote: Arc<RemoteApiClient>,
    probe: Arc<AvailabilityProbe>,
    local: Arc<LocalStore>,
    auth: Arc<AuthService>,
}

impl ClinicDataService {
    pub fn new(
        config: Arc<AppConfig>,
        remote: Arc<RemoteApiClient>,
        probe: Arc<AvailabilityProbe>,
        local: Arc<LocalStore>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(
            Arc::clone(&remote),
            Arc::clone(&probe),
            Arc::clone(&local),
        ));

        Self {
            config,
            remote,
            probe,
            local,
            auth,
        }
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    pub fn local_store(&self) -> &Arc<LocalStore> {
        &self.local
    }

    pub fn probe(&self) -> &Arc<AvailabilityProbe> {
        &self.probe
    }

    pub(crate) fn config(&self) -> &AppConfig {
        &self.config
    }

    async fn fall_back(&self, operation: &str, collection: &str, err: anyhow::Error) {
        warn!(
            "Remote {} on {} failed, falling back to local store: {}",
            operation, collection, err
        );
        if RemoteError::is_availability_failure(&err) {
            self.probe.report_failure().await;
        }
    }

    async fn fetch_all<T: Record>(&self) -> Result<Vec<T>, AppError> {
        if self.probe.check().await {
            match self.remote.list::<T>().await {
                Ok(records) => return Ok(records),
                Err(e) => self.fall_back("list", T::COLLECTION, e).await,
            }
        }

        Ok(self.local.read::<T>()?)
    }

    async fn fetch_one<T: Record>(&self, id: &str) -> Result<T, AppError> {
        if self.probe.check().await {
            match self.remote.get::<T>(id).await {
                Ok(record) => return Ok(record),
                Err(e) => self.fall_back("get", T::COLLECTION, e).await,
            }
        }

        self.local
            .find::<T>(id)?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", T::SINGULAR, id)))
    }

    async fn insert<T, I>(&self, input: &I) -> Result<Envelope<T>, AppError>
    where
        T: Record,
        I: Serialize + Sync,
    {
        if self.probe.check().await {
            match self.remote.create::<T, I>(input).await {
                Ok(envelope) => return Ok(envelope),
                Err(e) => self.fall_back("create", T::COLLECTION, e).await,
            }
        }

        Ok(self.local.create::<T, I>(input)?)
    }

    async fn modify<T, P>(&self, id: &str, patch: &P) -> Result<Envelope<T>, AppError>
    where
        T: Record,
        P: Serialize + Sync,
    {
        if self.probe.check().await {
            match self.remote.update::<T, P>(id, patch).await {
                Ok(envelope) => return Ok(envelope),
                Err(e) => self.fall_back("update", T::COLLECTION, e).await,
            }
        }

        Ok(self.local.update::<T, P>(id, patch)?)
    }

    async fn remove<T: Record>(&self, id: &str) -> Result<(), AppError> {
        if self.probe.check().await {
            match self.remote.delete::<T>(id).await {
                Ok(()) => return Ok(()),
                Err(e) => self.fall_back("delete", T::COLLECTION, e).await,
            }
        }

        self.local.delete::<T>(id)?;
        Ok(())
    }

    async fn require_patient(&self, patient_id: &str) -> Result<(), AppError> {
        self.fetch_one::<Patient>(patient_id).await.map(|_| ())
    }

    // Patients

    pub async fn get_patients(&self) -> Result<Vec<Patient>, AppError> {
        self.fetch_all().await
    }

    pub async fn get_patient(&self, id: &str) -> Result<Patient, AppError> {
        self.fetch_one(id).await
    }

    #[instrument(skip(self, input))]
    pub async fn create_patient(&self, input: NewPatient) -> Result<Envelope<Patient>, AppError> {
        input.validate()?;
        self.insert(&input).await
    }

    pub async fn update_patient(&self, id: &str, patch: PatientPatch) -> Result<Envelope<Patient>, AppError> {
        patch.validate()?;
        self.modify(id, &patch).await
    }

    /// Locally, also removes every session, appointment and payment that
    /// references the patient. Each collection is written separately.
    #[instrument(skip(self))]
    pub async fn delete_patient(&self, id: &str) -> Result<(), AppError> {
        if self.probe.check().await {
            match self.remote.delete::<Patient>(id).await {
                Ok(()) => return Ok(()),
                Err(e) => self.fall_back("delete", Patient::COLLECTION, e).await,
            }
        }

        self.local.delete::<Patient>(id)?;
        let sessions = self.local.retain::<ClinicalSession, _>(|s| s.patient_id != id)?;
        let appointments = self.local.retain::<Appointment, _>(|a| a.patient_id != id)?;
        let payments = self.local.retain::<Payment, _>(|p| p.patient_id != id)?;

        info!(
            "Deleted patient {} with {} sessions, {} appointments, {} payments",
            id, sessions, appointments, payments
        );
        Ok(())
    }

    // Sessions

    pub async fn get_sessions(&self) -> Result<Vec<ClinicalSession>, AppError> {
        self.fetch_all().await
    }

    pub async fn get_session(&self, id: &str) -> Result<ClinicalSession, AppError> {
        self.fetch_one(id).await
    }

    pub async fn get_patient_sessions(&self, patient_id: &str) -> Result<Vec<ClinicalSession>, AppError> {
        let mut sessions = self.get_sessions().await?;
        sessions.retain(|s| s.patient_id == patient_id);
        Ok(sessions)
    }

    pub async fn create_session(&self, input: NewSession) -> Result<Envelope<ClinicalSession>, AppError> {
        input.validate()?;
        self.require_patient(&input.patient_id).await?;
        self.insert(&input).await
    }

    pub async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<Envelope<ClinicalSession>, AppError> {
        patch.validate()?;
        self.modify(id, &patch).await
    }

    pub async fn delete_session(&self, id: &str) -> Result<(), AppError> {
        self.remove::<ClinicalSession>(id).await
    }

    // Appointments

    pub async fn get_appointments(&self) -> Result<Vec<Appointment>, AppError> {
        self.fetch_all().await
    }

    pub async fn get_appointment(&self, id: &str) -> Result<Appointment, AppError> {
        self.fetch_one(id).await
    }

    pub async fn get_patient_appointments(&self, patient_id: &str) -> Result<Vec<Appointment>, AppError> {
        let mut appointments = self.get_appointments().await?;
        appointments.retain(|a| a.patient_id == patient_id);
        Ok(appointments)
    }

    pub async fn create_appointment(&self, input: NewAppointment) -> Result<Envelope<Appointment>, AppError> {
        input.validate()?;
        self.require_patient(&input.patient_id).await?;
        self.insert(&input).await
    }

    /// Status changes must follow the appointment state machine.
    pub async fn update_appointment(&self, id: &str, patch: AppointmentPatch) -> Result<Envelope<Appointment>, AppError> {
        if let Some(next) = patch.status {
            let current = self.get_appointment(id).await?;
            if !current.status.can_transition_to(&next) {
                return Err(AppError::ValidationError(format!(
                    "appointment {} cannot move from {} to {}",
                    id, current.status, next
                )));
            }
        }
        if patch.duration == Some(0) {
            return Err(AppError::ValidationError("appointment duration must be positive".to_string()));
        }

        self.modify(id, &patch).await
    }

    pub async fn delete_appointment(&self, id: &str) -> Result<(), AppError> {
        self.remove::<Appointment>(id).await
    }

    // Payments

    /// Pending payments past their due date are reported as overdue.
    pub async fn get_payments(&self) -> Result<Vec<Payment>, AppError> {
        let now = Utc::now();
        let payments: Vec<Payment> = self.fetch_all().await?;
        Ok(payments.into_iter().map(|p| p.with_effective_status(now)).collect())
    }

    pub async fn get_payment(&self, id: &str) -> Result<Payment, AppError> {
        let payment: Payment = self.fetch_one(id).await?;
        Ok(payment.with_effective_status(Utc::now()))
    }

    pub async fn get_patient_payments(&self, patient_id: &str) -> Result<Vec<Payment>, AppError> {
        let mut payments = self.get_payments().await?;
        payments.retain(|p| p.patient_id == patient_id);
        Ok(payments)
    }

    pub async fn create_payment(&self, input: NewPayment) -> Result<Envelope<Payment>, AppError> {
        input.validate()?;
        self.require_patient(&input.patient_id).await?;

        let mut envelope: Envelope<Payment> = self.insert(&input).await?;
        envelope.record = envelope.record.with_effective_status(Utc::now());
        Ok(envelope)
    }

    pub async fn update_payment(&self, id: &str, patch: PaymentPatch) -> Result<Envelope<Payment>, AppError> {
        patch.validate()?;

        let mut envelope: Envelope<Payment> = self.modify(id, &patch).await?;
        envelope.record = envelope.record.with_effective_status(Utc::now());
        Ok(envelope)
    }

    pub async fn delete_payment(&self, id: &str) -> Result<(), AppError> {
        debug!("Deleting payment {}", id);
        self.remove::<Payment>(id).await
    }
}
