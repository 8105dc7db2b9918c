use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tracing::info;

use availability_cell::{availability_routes, AvailabilityProbe};
use clinic_data_cell::{clinic_data_routes, ClinicDataService};
use reminder_cell::{
    reminder_routes, BrowserChannel, DeliveryChannel, IntegrationConfigStore, NotificationFeed,
    NotificationScheduler, ReminderPlanner, ReminderSettingsStore, ReminderState, SimulatedChannel,
};
use shared_config::AppConfig;
use shared_database::{FileStore, LocalStore, RemoteApiClient};

/// Explicitly constructed services shared by the routes.
pub struct ClinicServices {
    pub probe: Arc<AvailabilityProbe>,
    pub data: Arc<ClinicDataService>,
    pub scheduler: Arc<NotificationScheduler>,
    pub reminders: Arc<ReminderState>,
}

impl ClinicServices {
    pub async fn build(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let store = FileStore::open(&config.data_dir)?;
        info!("Local data stored under {}", store.root().display());
        let local = Arc::new(LocalStore::new(Arc::new(store)));

        let probe = Arc::new(AvailabilityProbe::new(&config)?);
        let remote = Arc::new(RemoteApiClient::new(&config)?);
        let data = Arc::new(ClinicDataService::new(config.clone(), remote, probe.clone(), local.clone()));
        data.auth().restore().await?;

        let settings = Arc::new(ReminderSettingsStore::new(local.clone()));
        let integrations = Arc::new(IntegrationConfigStore::new(local.clone()));
        let browser = Arc::new(BrowserChannel::new(Arc::new(NotificationFeed::new())));

        let mut scheduler = NotificationScheduler::new(local, settings.clone(), config.reminder_poll_interval())?
            .with_channel(browser.clone());
        for kind in [DeliveryChannel::Email, DeliveryChannel::Sms, DeliveryChannel::Whatsapp] {
            scheduler = scheduler.with_channel(Arc::new(SimulatedChannel::new(
                kind,
                integrations.clone(),
                config.channel_delay(),
            )));
        }
        let scheduler = Arc::new(scheduler);

        let planner = Arc::new(ReminderPlanner::new(data.clone(), scheduler.clone()));
        let reminders = Arc::new(ReminderState {
            scheduler: scheduler.clone(),
            settings,
            integrations,
            planner,
            browser,
        });

        Ok(Self {
            probe,
            data,
            scheduler,
            reminders,
        })
    }
}

pub fn create_router(services: &ClinicServices) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/backend-status", availability_routes(services.probe.clone()))
        .merge(clinic_data_routes(services.data.clone()))
        .merge(reminder_routes(services.reminders.clone()))
}
