use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use shared_models::AppError;

use crate::models::{
    FeedEntry, IntegrationConfig, IntegrationConfigUpdate, NewNotification, NotificationConfig,
    PermissionRequest, ReminderSettings, ReminderSettingsUpdate, TickResponse,
};
use crate::router::ReminderState;

type Reminders = State<Arc<ReminderState>>;

pub async fn list_notifications(State(state): Reminders) -> Json<Vec<NotificationConfig>> {
    Json(state.scheduler.list().await)
}

pub async fn pending_notifications(State(state): Reminders) -> Json<Vec<NotificationConfig>> {
    Json(state.scheduler.pending().await)
}

pub async fn schedule_notification(
    State(state): Reminders,
    Json(input): Json<NewNotification>,
) -> Result<Json<NotificationConfig>, AppError> {
    Ok(Json(state.scheduler.schedule(input).await?))
}

pub async fn mark_notification_read(State(state): Reminders, Path(id): Path<String>) -> Result<Json<Value>, AppError> {
    if !state.scheduler.mark_as_read(&id).await? {
        return Err(AppError::NotFound(format!("notification {} not found", id)));
    }
    Ok(Json(json!({ "message": "notification marked as read" })))
}

pub async fn delete_notification(State(state): Reminders, Path(id): Path<String>) -> Result<Json<Value>, AppError> {
    let removed = state.scheduler.delete_notification(&id).await?;
    Ok(Json(json!({ "message": "notification deleted", "removed": removed })))
}

pub async fn clear_notifications(State(state): Reminders) -> Result<Json<Value>, AppError> {
    state.scheduler.clear_all_notifications().await?;
    Ok(Json(json!({ "message": "all notifications cleared" })))
}

pub async fn notification_feed(State(state): Reminders) -> Json<Vec<FeedEntry>> {
    Json(state.browser.feed().recent().await)
}

pub async fn get_permission(State(state): Reminders) -> Json<Value> {
    Json(json!({ "permission": state.browser.permission().await }))
}

pub async fn set_permission(State(state): Reminders, Json(request): Json<PermissionRequest>) -> Json<Value> {
    state.browser.set_permission(request.permission).await;
    Json(json!({ "permission": request.permission }))
}

pub async fn get_settings(State(state): Reminders) -> Result<Json<ReminderSettings>, AppError> {
    Ok(Json(state.settings.get().await?))
}

pub async fn update_settings(
    State(state): Reminders,
    Json(update): Json<ReminderSettingsUpdate>,
) -> Result<Json<ReminderSettings>, AppError> {
    Ok(Json(state.settings.update(update).await?))
}

pub async fn reset_settings(State(state): Reminders) -> Result<Json<ReminderSettings>, AppError> {
    Ok(Json(state.settings.reset().await?))
}

pub async fn get_integrations(State(state): Reminders) -> Result<Json<IntegrationConfig>, AppError> {
    Ok(Json(state.integrations.get().await?))
}

pub async fn update_integrations(
    State(state): Reminders,
    Json(update): Json<IntegrationConfigUpdate>,
) -> Result<Json<IntegrationConfig>, AppError> {
    Ok(Json(state.integrations.update(update).await?))
}

pub async fn plan_appointment(State(state): Reminders, Path(id): Path<String>) -> Result<Json<Value>, AppError> {
    let notification = state.planner.plan_for_appointment(&id, Utc::now()).await?;
    Ok(Json(json!({ "planned": notification.is_some(), "notification": notification })))
}

pub async fn plan_payment(State(state): Reminders, Path(id): Path<String>) -> Result<Json<Value>, AppError> {
    let notification = state.planner.plan_for_payment(&id).await?;
    Ok(Json(json!({ "planned": notification.is_some(), "notification": notification })))
}

pub async fn plan_upcoming(State(state): Reminders) -> Result<Json<Vec<NotificationConfig>>, AppError> {
    Ok(Json(state.planner.plan_upcoming_appointments(Utc::now()).await?))
}

pub async fn plan_birthdays(State(state): Reminders) -> Result<Json<Vec<NotificationConfig>>, AppError> {
    Ok(Json(state.planner.plan_birthdays(Utc::now()).await?))
}

pub async fn run_tick(State(state): Reminders) -> Json<TickResponse> {
    Json(TickResponse {
        delivered: state.scheduler.tick(Utc::now()).await,
    })
}
