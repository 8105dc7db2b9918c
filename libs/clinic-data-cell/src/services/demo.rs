use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{info, warn};

use shared_models::{
    AppError, Appointment, AppointmentStatus, ClinicalSession, Comment, Modality, Patient, Payment,
    PaymentMethod, PaymentStatus,
};

use crate::services::facade::ClinicDataService;

/// Fixed seed content. Dates are placed relative to `now` so the seed
/// always contains past sessions, upcoming appointments and one overdue
/// payment.
#[derive(Debug, Clone)]
pub struct DemoDataset {
    pub patients: Vec<Patient>,
    pub sessions: Vec<ClinicalSession>,
    pub appointments: Vec<Appointment>,
    pub payments: Vec<Payment>,
}

impl DemoDataset {
    pub fn build(now: DateTime<Utc>) -> Self {
        let days = Duration::days;

        let patient = |id: &str, name: &str, age: u32, email: &str, phone: &str, birth: (i32, u32, u32), notes: &str| Patient {
            id: id.to_string(),
            name: name.to_string(),
            age: Some(age),
            email: Some(email.to_string()),
            phone: Some(phone.to_string()),
            birth_date: NaiveDate::from_ymd_opt(birth.0, birth.1, birth.2),
            notes: Some(notes.to_string()),
            documents: Vec::new(),
            comments: Vec::new(),
            created_at: now - days(90),
            updated_at: None,
        };

        let mut patients = vec![
            patient("1", "Ana Souza", 34, "ana.souza@email.com", "(11) 98765-4321", (1990, 3, 12), "Ansiedade generalizada, em acompanhamento semanal."),
            patient("2", "Bruno Lima", 27, "bruno.lima@email.com", "(11) 91234-5678", (1997, 8, 25), "Episódios depressivos leves."),
            patient("3", "Carla Mendes", 45, "carla.mendes@email.com", "(21) 99876-1234", (1979, 11, 2), "Luto recente, sessões quinzenais."),
        ];
        patients[0].comments.push(Comment {
            id: "c1".to_string(),
            text: "Boa adesão às técnicas de respiração.".to_string(),
            author: Some("Admin".to_string()),
            created_at: Some(now - days(7)),
        });

        let session = |id: &str, patient_id: &str, days_ago: i64, mood: u8, notes: &str, objectives: &[&str], techniques: &[&str]| ClinicalSession {
            id: id.to_string(),
            patient_id: patient_id.to_string(),
            date: now - days(days_ago),
            duration: 50,
            modality: if patient_id == "2" { Modality::Online } else { Modality::InPerson },
            notes: notes.to_string(),
            mood,
            objectives: objectives.iter().map(|s| s.to_string()).collect(),
            techniques: techniques.iter().map(|s| s.to_string()).collect(),
            created_at: now - days(days_ago),
            updated_at: None,
        };

        let sessions = vec![
            session("1", "1", 14, 5, "Relato de crises antes de reuniões.", &["Reduzir ansiedade"], &["Respiração diafragmática"]),
            session("2", "1", 7, 7, "Melhora perceptível no sono.", &["Higiene do sono"], &["TCC", "Registro de pensamentos"]),
            session("3", "2", 10, 4, "Desânimo persistente no trabalho.", &["Ativação comportamental"], &["TCC"]),
            session("4", "3", 5, 6, "Elaboração do luto em andamento.", &["Elaborar a perda"], &["Escuta ativa"]),
        ];

        let appointment = |id: &str, patient_id: &str, at: DateTime<Utc>, modality: Modality, status: AppointmentStatus| Appointment {
            id: id.to_string(),
            patient_id: patient_id.to_string(),
            date: at,
            duration: 50,
            modality,
            status,
            notes: None,
            reminder_sent: false,
            created_at: now - days(3),
            updated_at: None,
        };

        let appointments = vec![
            appointment("1", "1", now + days(1), Modality::InPerson, AppointmentStatus::Confirmed),
            appointment("2", "2", now + days(2), Modality::Online, AppointmentStatus::Scheduled),
            appointment("3", "3", now + days(9), Modality::InPerson, AppointmentStatus::Scheduled),
            appointment("4", "1", now - days(7), Modality::InPerson, AppointmentStatus::Completed),
        ];

        let payment = |id: &str, patient_id: &str, session_id: Option<&str>, amount: f64, due: DateTime<Utc>, method: PaymentMethod, status: PaymentStatus| Payment {
            id: id.to_string(),
            patient_id: patient_id.to_string(),
            session_id: session_id.map(str::to_string),
            amount,
            date: due,
            method,
            status,
            notes: None,
            created_at: now - days(14),
            updated_at: None,
        };

        let payments = vec![
            payment("1", "1", Some("1"), 200.0, now - days(14), PaymentMethod::Pix, PaymentStatus::Paid),
            payment("2", "1", Some("2"), 200.0, now - days(7), PaymentMethod::Card, PaymentStatus::Paid),
            payment("3", "2", Some("3"), 180.0, now - days(5), PaymentMethod::Transfer, PaymentStatus::Pending),
            payment("4", "3", Some("4"), 220.0, now + days(5), PaymentMethod::Cash, PaymentStatus::Pending),
        ];

        Self {
            patients,
            sessions,
            appointments,
            payments,
        }
    }
}

impl ClinicDataService {
    /// Replaces the four local collections with the seed set. Returns
    /// `false` without touching anything unless the signed-in user is the
    /// administrator.
    pub async fn initialize_demo_data(&self) -> Result<bool, AppError> {
        let Some(user) = self.auth().current_user().await else {
            warn!("Demo data requested without a signed-in user");
            return Ok(false);
        };

        if !self.config().is_admin(&user.email) {
            warn!("Demo data requested by non-admin {}", user.email);
            return Ok(false);
        }

        let dataset = DemoDataset::build(Utc::now());
        let local = self.local_store();
        local.replace_all(&dataset.patients)?;
        local.replace_all(&dataset.sessions)?;
        local.replace_all(&dataset.appointments)?;
        local.replace_all(&dataset.payments)?;

        info!(
            "Demo data loaded: {} patients, {} sessions, {} appointments, {} payments",
            dataset.patients.len(),
            dataset.sessions.len(),
            dataset.appointments.len(),
            dataset.payments.len()
        );
        Ok(true)
    }

    pub async fn clear_demo_data(&self) -> Result<(), AppError> {
        let local = self.local_store();
        local.replace_all::<Patient>(&[])?;
        local.replace_all::<ClinicalSession>(&[])?;
        local.replace_all::<Appointment>(&[])?;
        local.replace_all::<Payment>(&[])?;

        info!("Local clinic data cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_dataset_references_existing_patients() {
        let dataset = DemoDataset::build(Utc::now());
        let patient_ids: HashSet<&str> = dataset.patients.iter().map(|p| p.id.as_str()).collect();

        assert!(dataset.sessions.iter().all(|s| patient_ids.contains(s.patient_id.as_str())));
        assert!(dataset.appointments.iter().all(|a| patient_ids.contains(a.patient_id.as_str())));
        assert!(dataset.payments.iter().all(|p| patient_ids.contains(p.patient_id.as_str())));
    }

    #[test]
    fn test_dataset_contains_an_overdue_payment() {
        let now = Utc::now();
        let dataset = DemoDataset::build(now);

        let overdue = dataset
            .payments
            .iter()
            .filter(|p| p.effective_status(now) == PaymentStatus::Overdue)
            .count();
        assert_eq!(overdue, 1);
    }

    #[test]
    fn test_dataset_moods_on_scale() {
        let dataset = DemoDataset::build(Utc::now());
        assert!(dataset.sessions.iter().all(|s| shared_models::MOOD_SCALE.contains(&s.mood)));
    }
}
