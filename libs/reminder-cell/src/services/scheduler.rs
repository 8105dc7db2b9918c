use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use futures::future::join_all;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use shared_database::LocalStore;
use shared_models::{AppError, Appointment, Patient, Payment};

use crate::models::{
    DeliveryChannel, DeliveryRecord, NewNotification, NotificationConfig, NotificationType, Priority,
};
use crate::services::channels::NotificationChannel;
use crate::services::settings::ReminderSettingsStore;

pub const NOTIFICATIONS_KEY: &str = "notifications";

struct Worker {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Owns the scheduled notifications and the poll loop that delivers them.
///
/// Each notification is delivered at most once: a poll tick marks every due
/// notification as sent, together with the outcome of its single delivery
/// attempt, whether or not the channel succeeded.
///
/// User-facing mutations write the new list to the store before swapping it
/// in, so a failed write leaves the in-memory list unchanged.
pub struct NotificationScheduler {
    local: Arc<LocalStore>,
    settings: Arc<ReminderSettingsStore>,
    channels: HashMap<DeliveryChannel, Arc<dyn NotificationChannel>>,
    notifications: Mutex<Vec<NotificationConfig>>,
    tick_guard: Mutex<()>,
    poll_interval: Duration,
    worker: Mutex<Option<Worker>>,
}

impl NotificationScheduler {
    pub fn new(
        local: Arc<LocalStore>,
        settings: Arc<ReminderSettingsStore>,
        poll_interval: Duration,
    ) -> Result<Self, AppError> {
        let notifications = local
            .load_document::<Vec<NotificationConfig>>(NOTIFICATIONS_KEY)?
            .unwrap_or_default();
        debug!("Loaded {} stored notifications", notifications.len());

        Ok(Self {
            local,
            settings,
            channels: HashMap::new(),
            notifications: Mutex::new(notifications),
            tick_guard: Mutex::new(()),
            poll_interval,
            worker: Mutex::new(None),
        })
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.insert(channel.kind(), channel);
        self
    }

    pub fn settings(&self) -> &Arc<ReminderSettingsStore> {
        &self.settings
    }

    /// Starts the poll loop. A second call while running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            debug!("Reminder scheduler already running");
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);
        let period = self.poll_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scheduler.tick(Utc::now()).await;
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("Reminder poll loop received shutdown");
                        break;
                    }
                }
            }
        });

        info!("Reminder scheduler started, polling every {:?}", period);
        *worker = Some(Worker { handle, shutdown });
    }

    /// Stops the poll loop and waits for an in-flight tick to finish.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };

        let _ = worker.shutdown.send(true);
        if let Err(e) = worker.handle.await {
            error!("Reminder poll loop ended abnormally: {}", e);
        }
        info!("Reminder scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// One poll: delivers every unsent notification due at `now` and
    /// returns how many were attempted. Never fails; ticks never overlap.
    #[instrument(skip(self))]
    pub async fn tick(&self, now: DateTime<Utc>) -> usize {
        let _tick = self.tick_guard.lock().await;

        let due: Vec<NotificationConfig> = {
            let notifications = self.notifications.lock().await;
            notifications.iter().filter(|n| n.is_due(now)).cloned().collect()
        };

        if due.is_empty() {
            return 0;
        }

        debug!("Dispatching {} due notifications", due.len());
        let outcomes = join_all(due.iter().map(|n| self.dispatch(n))).await;

        let mut notifications = self.notifications.lock().await;
        for (notification, outcome) in due.iter().zip(outcomes) {
            // Deleted while its delivery was in flight.
            let Some(entry) = notifications.iter_mut().find(|n| n.id == notification.id) else {
                continue;
            };
            if entry.sent {
                continue;
            }
            entry.sent = true;
            entry.delivery = Some(outcome);
        }

        if let Err(e) = self.persist(&notifications) {
            error!("Failed to persist notification delivery state: {}", e);
        }

        due.len()
    }

    async fn dispatch(&self, notification: &NotificationConfig) -> DeliveryRecord {
        let success = match self.channels.get(&notification.method) {
            Some(channel) => channel.send(notification).await,
            None => {
                warn!("No {} channel registered for notification {}", notification.method, notification.id);
                false
            }
        };

        if !success {
            warn!(
                "Delivery of notification {} via {} failed, it will not be retried",
                notification.id, notification.method
            );
        }

        DeliveryRecord {
            channel: notification.method,
            success,
            attempted_at: Utc::now(),
        }
    }

    fn persist(&self, notifications: &[NotificationConfig]) -> Result<(), AppError> {
        self.local.save_document(NOTIFICATIONS_KEY, &notifications)?;
        Ok(())
    }

    pub async fn schedule(&self, input: NewNotification) -> Result<NotificationConfig, AppError> {
        if input.title.trim().is_empty() {
            return Err(AppError::ValidationError("notification title is required".to_string()));
        }

        let notification = NotificationConfig {
            id: Uuid::new_v4().to_string(),
            notification_type: input.notification_type,
            title: input.title,
            message: input.message,
            scheduled_for: input.scheduled_for,
            patient_id: input.patient_id,
            sent: false,
            method: input.method,
            priority: input.priority.unwrap_or_default(),
            created_at: Utc::now(),
            delivery: None,
        };

        let mut notifications = self.notifications.lock().await;
        let mut next = notifications.clone();
        next.push(notification.clone());
        self.persist(&next)?;
        *notifications = next;

        debug!(
            "Scheduled {:?} notification {} for {}",
            notification.notification_type, notification.id, notification.scheduled_for
        );
        Ok(notification)
    }

    /// `None` when appointment reminders are disabled.
    pub async fn create_appointment_reminder(
        &self,
        appointment: &Appointment,
        patient_name: &str,
    ) -> Result<Option<NotificationConfig>, AppError> {
        let settings = self.settings.get().await?.appointment_reminder;
        if !settings.enabled {
            return Ok(None);
        }

        let scheduled_for = appointment
            .date
            .checked_sub_signed(ChronoDuration::minutes(i64::from(settings.time_before)))
            .ok_or_else(|| offset_out_of_range("appointmentReminder.timeBefore"))?;
        self.schedule(NewNotification {
            notification_type: NotificationType::Appointment,
            title: "Lembrete de consulta".to_string(),
            message: format!(
                "Consulta com {} em {}",
                patient_name,
                appointment.date.format("%d/%m/%Y às %H:%M")
            ),
            scheduled_for,
            patient_id: Some(appointment.patient_id.clone()),
            method: preferred(&settings.methods),
            priority: Some(Priority::High),
        })
        .await
        .map(Some)
    }

    /// `None` when payment reminders are disabled.
    pub async fn create_payment_reminder(
        &self,
        payment: &Payment,
        patient_name: &str,
    ) -> Result<Option<NotificationConfig>, AppError> {
        let settings = self.settings.get().await?.payment_reminder;
        if !settings.enabled {
            return Ok(None);
        }

        let scheduled_for = payment
            .date
            .checked_add_signed(ChronoDuration::days(i64::from(settings.days_after)))
            .ok_or_else(|| offset_out_of_range("paymentReminder.daysAfter"))?;
        self.schedule(NewNotification {
            notification_type: NotificationType::Payment,
            title: "Lembrete de pagamento".to_string(),
            message: format!(
                "Pagamento de R$ {:.2} de {} venceu em {}",
                payment.amount,
                patient_name,
                payment.date.format("%d/%m/%Y")
            ),
            scheduled_for,
            patient_id: Some(payment.patient_id.clone()),
            method: preferred(&settings.methods),
            priority: Some(Priority::Medium),
        })
        .await
        .map(Some)
    }

    /// Due immediately. `None` when birthday reminders are disabled.
    pub async fn create_birthday_reminder(
        &self,
        patient: &Patient,
        birthday: NaiveDate,
    ) -> Result<Option<NotificationConfig>, AppError> {
        let settings = self.settings.get().await?.birthday_reminder;
        if !settings.enabled {
            return Ok(None);
        }

        self.schedule(NewNotification {
            notification_type: NotificationType::Birthday,
            title: "Aniversário de paciente".to_string(),
            message: format!("{} faz aniversário em {}", patient.name, birthday.format("%d/%m")),
            scheduled_for: Utc::now(),
            patient_id: Some(patient.id.clone()),
            method: preferred(&settings.methods),
            priority: Some(Priority::Low),
        })
        .await
        .map(Some)
    }

    pub async fn list(&self) -> Vec<NotificationConfig> {
        self.notifications.lock().await.clone()
    }

    pub async fn pending(&self) -> Vec<NotificationConfig> {
        self.notifications
            .lock()
            .await
            .iter()
            .filter(|n| !n.sent)
            .cloned()
            .collect()
    }

    /// Marks a notification as seen, which also takes it out of the poll.
    pub async fn mark_as_read(&self, id: &str) -> Result<bool, AppError> {
        let mut notifications = self.notifications.lock().await;
        let Some(position) = notifications.iter().position(|n| n.id == id) else {
            return Ok(false);
        };

        if !notifications[position].sent {
            let mut next = notifications.clone();
            next[position].sent = true;
            self.persist(&next)?;
            *notifications = next;
        }
        Ok(true)
    }

    pub async fn delete_notification(&self, id: &str) -> Result<bool, AppError> {
        let mut notifications = self.notifications.lock().await;
        let next: Vec<NotificationConfig> = notifications.iter().filter(|n| n.id != id).cloned().collect();

        if next.len() == notifications.len() {
            return Ok(false);
        }
        self.persist(&next)?;
        *notifications = next;
        Ok(true)
    }

    pub async fn clear_all_notifications(&self) -> Result<(), AppError> {
        let mut notifications = self.notifications.lock().await;
        self.persist(&[])?;
        notifications.clear();
        info!("All notifications cleared");
        Ok(())
    }
}

pub(crate) fn offset_out_of_range(field: &str) -> AppError {
    AppError::ValidationError(format!("{} puts the reminder outside the supported date range", field))
}

fn preferred(methods: &[DeliveryChannel]) -> DeliveryChannel {
    methods.first().copied().unwrap_or(DeliveryChannel::Browser)
}
