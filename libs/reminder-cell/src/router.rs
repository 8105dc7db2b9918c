use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::*;
use crate::services::{BrowserChannel, IntegrationConfigStore, NotificationScheduler, ReminderPlanner, ReminderSettingsStore};

/// Everything the reminder routes need.
pub struct ReminderState {
    pub scheduler: Arc<NotificationScheduler>,
    pub settings: Arc<ReminderSettingsStore>,
    pub integrations: Arc<IntegrationConfigStore>,
    pub planner: Arc<ReminderPlanner>,
    pub browser: Arc<BrowserChannel>,
}

pub fn reminder_routes(state: Arc<ReminderState>) -> Router {
    Router::new()
        .route("/notifications", get(list_notifications).post(schedule_notification).delete(clear_notifications))
        .route("/notifications/pending", get(pending_notifications))
        .route("/notifications/feed", get(notification_feed))
        .route("/notifications/permission", get(get_permission).put(set_permission))
        .route("/notifications/{id}", delete(delete_notification))
        .route("/notifications/{id}/read", post(mark_notification_read))
        .route("/reminder-settings", get(get_settings).put(update_settings))
        .route("/reminder-settings/reset", post(reset_settings))
        .route("/integrations", get(get_integrations).put(update_integrations))
        .route("/reminders/appointments/{id}", post(plan_appointment))
        .route("/reminders/payments/{id}", post(plan_payment))
        .route("/reminders/upcoming", post(plan_upcoming))
        .route("/reminders/birthdays", post(plan_birthdays))
        .route("/reminders/tick", post(run_tick))
        .with_state(state)
}
