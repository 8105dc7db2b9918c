use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use availability_cell::AvailabilityProbe;
use clinic_data_cell::ClinicDataService;
use reminder_cell::{
    reminder_routes, BrowserChannel, IntegrationConfigStore, NotificationFeed, NotificationScheduler,
    ReminderPlanner, ReminderSettingsStore, ReminderState,
};
use shared_database::{LocalStore, RemoteApiClient};
use shared_utils::test_utils::TestConfig;

fn app() -> axum::Router {
    let config = TestConfig::default().to_app_config();
    let local = Arc::new(LocalStore::in_memory());
    let remote = Arc::new(RemoteApiClient::new(&config).unwrap());
    let probe = Arc::new(AvailabilityProbe::new(&config).unwrap());
    let data = Arc::new(ClinicDataService::new(Arc::new(config), remote, probe, local.clone()));

    let settings = Arc::new(ReminderSettingsStore::new(local.clone()));
    let integrations = Arc::new(IntegrationConfigStore::new(local.clone()));
    let browser = Arc::new(BrowserChannel::new(Arc::new(NotificationFeed::new())));
    let scheduler = Arc::new(
        NotificationScheduler::new(local, settings.clone(), Duration::from_secs(1))
            .unwrap()
            .with_channel(browser.clone()),
    );
    let planner = Arc::new(ReminderPlanner::new(data, scheduler.clone()));

    reminder_routes(Arc::new(ReminderState {
        scheduler,
        settings,
        integrations,
        planner,
        browser,
    }))
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn test_partial_settings_update_over_http() {
    let app = app();
    let (_, before) = send(&app, "GET", "/reminder-settings", None).await;

    let (status, after) = send(
        &app,
        "PUT",
        "/reminder-settings",
        Some(json!({
            "birthdayReminder": { "enabled": false, "daysBefore": 2, "methods": ["sms"] }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["birthdayReminder"]["enabled"], false);
    assert_eq!(after["appointmentReminder"], before["appointmentReminder"]);
    assert_eq!(after["paymentReminder"], before["paymentReminder"]);
}

#[tokio::test]
async fn test_scheduled_notification_delivered_by_tick() {
    let app = app();

    let (status, created) = send(
        &app,
        "POST",
        "/notifications",
        Some(json!({
            "type": "custom",
            "title": "Supervisão",
            "message": "Reunião de supervisão clínica",
            "scheduledFor": "2020-01-01T12:00:00Z",
            "method": "browser"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["sent"], false);

    let (_, tick) = send(&app, "POST", "/reminders/tick", None).await;
    assert_eq!(tick["delivered"], 1);

    let (_, feed) = send(&app, "GET", "/notifications/feed", None).await;
    assert_eq!(feed[0]["style"], "toast");
    assert_eq!(feed[0]["title"], "Supervisão");

    let (_, pending) = send(&app, "GET", "/notifications/pending", None).await;
    assert_eq!(pending, json!([]));
}

#[tokio::test]
async fn test_unknown_notification_read_is_404() {
    let app = app();

    let (status, body) = send(&app, "POST", "/notifications/nope/read", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_oversized_offset_is_a_bad_request() {
    let app = app();

    let (status, _) = send(
        &app,
        "PUT",
        "/reminder-settings",
        Some(json!({
            "paymentReminder": { "enabled": true, "daysAfter": 4294967295u32, "methods": ["email"] }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, settings) = send(&app, "GET", "/reminder-settings", None).await;
    assert_eq!(settings["paymentReminder"]["daysAfter"], 3);
}

#[tokio::test]
async fn test_payment_reminder_for_unknown_payment_is_404() {
    let app = app();

    let (status, body) = send(&app, "POST", "/reminders/payments/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}
