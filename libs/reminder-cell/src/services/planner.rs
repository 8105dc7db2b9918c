use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument};

use clinic_data_cell::ClinicDataService;
use shared_models::{AppError, Appointment, AppointmentPatch, PaymentStatus};

use crate::models::{NotificationConfig, NotificationType};
use crate::services::scheduler::{offset_out_of_range, NotificationScheduler};

/// Turns clinic records into scheduled reminders.
pub struct ReminderPlanner {
    data: Arc<ClinicDataService>,
    scheduler: Arc<NotificationScheduler>,
}

impl ReminderPlanner {
    pub fn new(data: Arc<ClinicDataService>, scheduler: Arc<NotificationScheduler>) -> Self {
        Self { data, scheduler }
    }

    /// Schedules the reminder for one appointment and flags it with
    /// `reminderSent`. Appointments already flagged, cancelled, completed
    /// or whose reminder time has passed are skipped.
    #[instrument(skip(self))]
    pub async fn plan_for_appointment(&self, id: &str, now: DateTime<Utc>) -> Result<Option<NotificationConfig>, AppError> {
        let appointment = self.data.get_appointment(id).await?;
        self.plan(&appointment, now).await
    }

    pub async fn plan_upcoming_appointments(&self, now: DateTime<Utc>) -> Result<Vec<NotificationConfig>, AppError> {
        let appointments = self.data.get_appointments().await?;
        let mut planned = Vec::new();

        for appointment in appointments.iter().filter(|a| a.date > now) {
            if let Some(notification) = self.plan(appointment, now).await? {
                planned.push(notification);
            }
        }

        info!("Planned {} appointment reminders", planned.len());
        Ok(planned)
    }

    async fn plan(&self, appointment: &Appointment, now: DateTime<Utc>) -> Result<Option<NotificationConfig>, AppError> {
        if appointment.reminder_sent || appointment.status.is_terminal() {
            return Ok(None);
        }

        let settings = self.scheduler.settings().get().await?.appointment_reminder;
        if !settings.enabled {
            return Ok(None);
        }

        let remind_at = appointment
            .date
            .checked_sub_signed(Duration::minutes(i64::from(settings.time_before)))
            .ok_or_else(|| offset_out_of_range("appointmentReminder.timeBefore"))?;
        if remind_at < now {
            debug!("Reminder time for appointment {} already passed", appointment.id);
            return Ok(None);
        }

        let patient_name = self.patient_name(&appointment.patient_id).await?;

        let notification = self
            .scheduler
            .create_appointment_reminder(appointment, &patient_name)
            .await?;

        if notification.is_some() {
            let patch = AppointmentPatch {
                reminder_sent: Some(true),
                ..Default::default()
            };
            self.data.update_appointment(&appointment.id, patch).await?;
        }

        Ok(notification)
    }

    /// Schedules the overdue reminder for one payment, `daysAfter` days past
    /// its due date. Paid payments and payments that already have one are
    /// skipped.
    #[instrument(skip(self))]
    pub async fn plan_for_payment(&self, id: &str) -> Result<Option<NotificationConfig>, AppError> {
        let payment = self.data.get_payment(id).await?;
        if payment.status == PaymentStatus::Paid {
            return Ok(None);
        }

        let settings = self.scheduler.settings().get().await?.payment_reminder;
        if !settings.enabled {
            return Ok(None);
        }

        let remind_at = payment
            .date
            .checked_add_signed(Duration::days(i64::from(settings.days_after)))
            .ok_or_else(|| offset_out_of_range("paymentReminder.daysAfter"))?;

        let already_planned = self.scheduler.list().await.iter().any(|n| {
            n.notification_type == NotificationType::Payment
                && n.patient_id.as_deref() == Some(payment.patient_id.as_str())
                && n.scheduled_for == remind_at
        });
        if already_planned {
            debug!("Payment {} already has a reminder", payment.id);
            return Ok(None);
        }

        let patient_name = self.patient_name(&payment.patient_id).await?;
        self.scheduler.create_payment_reminder(&payment, &patient_name).await
    }

    async fn patient_name(&self, patient_id: &str) -> Result<String, AppError> {
        match self.data.get_patient(patient_id).await {
            Ok(patient) => Ok(patient.name),
            Err(AppError::NotFound(_)) => Ok("paciente".to_string()),
            Err(e) => Err(e),
        }
    }

    /// One birthday reminder per patient whose birthday is within the
    /// configured number of days, at most once per birthday.
    pub async fn plan_birthdays(&self, now: DateTime<Utc>) -> Result<Vec<NotificationConfig>, AppError> {
        let settings = self.scheduler.settings().get().await?.birthday_reminder;
        if !settings.enabled {
            return Ok(Vec::new());
        }

        let today = now.date_naive();
        let horizon = i64::from(settings.days_before);
        // Any reminder for the current birthday was created inside this window.
        let window_start = now
            .checked_sub_signed(Duration::days(horizon + 1))
            .ok_or_else(|| offset_out_of_range("birthdayReminder.daysBefore"))?;

        let existing = self.scheduler.list().await;
        let mut planned = Vec::new();

        for patient in self.data.get_patients().await? {
            let Some(birthday) = patient.next_birthday(today) else {
                continue;
            };
            if (birthday - today).num_days() > horizon {
                continue;
            }

            let already_planned = existing.iter().any(|n| {
                n.notification_type == NotificationType::Birthday
                    && n.patient_id.as_deref() == Some(patient.id.as_str())
                    && n.scheduled_for >= window_start
            });
            if already_planned {
                continue;
            }

            if let Some(notification) = self.scheduler.create_birthday_reminder(&patient, birthday).await? {
                planned.push(notification);
            }
        }

        info!("Planned {} birthday reminders", planned.len());
        Ok(planned)
    }
}
