use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use availability_cell::AvailabilityProbe;
use clinic_data_cell::{AuthService, ClinicDataService, CURRENT_USER_KEY};
use shared_config::AppConfig;
use shared_database::{LocalStore, RemoteApiClient};
use shared_models::{
    AppError, Appointment, AuthSession, ClinicalSession, LoginRequest, NewPatient, Patient, Payment,
    RegisterRequest,
};
use shared_utils::test_utils::{MockApiResponses, TestConfig, TestUser};

fn service_for(config: AppConfig) -> ClinicDataService {
    let local = Arc::new(LocalStore::in_memory());
    let remote = Arc::new(RemoteApiClient::new(&config).unwrap());
    let probe = Arc::new(AvailabilityProbe::new(&config).unwrap());
    ClinicDataService::new(Arc::new(config), remote, probe, local)
}

fn offline() -> ClinicDataService {
    service_for(TestConfig::default().to_app_config())
}

fn registration(user: &TestUser) -> RegisterRequest {
    RegisterRequest {
        name: user.name.clone(),
        email: user.email.clone(),
        password: user.password.clone(),
    }
}

fn login(user: &TestUser, password: &str) -> LoginRequest {
    LoginRequest {
        email: user.email.clone(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_offline_register_then_login() {
    let service = offline();
    let user = TestUser::clinician("helena@clinica.com");

    let registered = service.auth().register(registration(&user)).await.unwrap();
    assert_eq!(registered.user.email, user.email);
    assert!(registered.token.is_none());

    service.auth().logout().await.unwrap();
    assert!(service.auth().current_user().await.is_none());

    let session = service.auth().login(login(&user, &user.password)).await.unwrap();
    assert_eq!(session.user.id, registered.user.id);
}

#[tokio::test]
async fn test_offline_login_rejects_wrong_password() {
    let service = offline();
    let user = TestUser::clinician("helena@clinica.com");
    service.auth().register(registration(&user)).await.unwrap();

    let result = service.auth().login(login(&user, "not-the-password")).await;

    assert_matches!(result, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let service = offline();
    let user = TestUser::clinician("helena@clinica.com");
    service.auth().register(registration(&user)).await.unwrap();

    let mut again = registration(&user);
    again.email = "HELENA@clinica.com".to_string();

    assert_matches!(service.auth().register(again).await, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn test_session_survives_restart() {
    let config = TestConfig::default().to_app_config();
    let local = Arc::new(LocalStore::in_memory());
    let remote = Arc::new(RemoteApiClient::new(&config).unwrap());
    let probe = Arc::new(AvailabilityProbe::new(&config).unwrap());

    let first = AuthService::new(remote.clone(), probe.clone(), local.clone());
    let user = TestUser::clinician("helena@clinica.com");
    first.register(registration(&user)).await.unwrap();

    let stored: Option<AuthSession> = local.load_document(CURRENT_USER_KEY).unwrap();
    assert_eq!(stored.unwrap().user.email, user.email);

    let second = AuthService::new(remote, probe, local);
    let restored = second.restore().await.unwrap();
    assert_eq!(restored.map(|u| u.email), Some(user.email));
}

#[tokio::test]
async fn test_remote_login_attaches_bearer_token() {
    let server = MockServer::start().await;
    let user = TestUser::clinician("helena@clinica.com");

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": user.email, "password": user.password })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::login_response(&user, "tok-123")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/patients"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(TestConfig::with_api(server.uri()).to_app_config());

    let session = service.auth().login(login(&user, &user.password)).await.unwrap();
    assert_eq!(session.token.as_deref(), Some("tok-123"));

    let patients = service.get_patients().await.unwrap();
    assert!(patients.is_empty());
}

#[tokio::test]
async fn test_remote_credential_rejection_does_not_fall_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(MockApiResponses::error_response("Credenciais inválidas")))
        .mount(&server)
        .await;

    let service = service_for(TestConfig::with_api(server.uri()).to_app_config());
    let user = TestUser::clinician("helena@clinica.com");

    let result = service.auth().login(login(&user, &user.password)).await;

    assert_matches!(result, Err(AppError::Auth(_)));
    assert!(service.auth().current_user().await.is_none());
}

#[tokio::test]
async fn test_demo_data_denied_for_non_admin() {
    let service = offline();
    service.auth().register(registration(&TestUser::clinician("helena@clinica.com"))).await.unwrap();
    service.create_patient(NewPatient::named("Ana")).await.unwrap();

    let permitted = service.initialize_demo_data().await.unwrap();

    assert!(!permitted);
    let patients = service.get_patients().await.unwrap();
    assert_eq!(patients.len(), 1);
    assert_eq!(patients[0].name, "Ana");
}

#[tokio::test]
async fn test_demo_data_denied_without_user() {
    let service = offline();
    assert!(!service.initialize_demo_data().await.unwrap());
    assert!(service.get_patients().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_demo_data_is_not_admin_gated() {
    let service = offline();
    service.auth().register(registration(&TestUser::clinician("helena@clinica.com"))).await.unwrap();
    service.create_patient(NewPatient::named("Ana")).await.unwrap();

    service.clear_demo_data().await.unwrap();

    assert!(service.get_patients().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_demo_data_loaded_for_admin_then_cleared() {
    let service = offline();
    service.create_patient(NewPatient::named("Ana")).await.unwrap();
    service.auth().register(registration(&TestUser::admin("Admin@Clinica.com"))).await.unwrap();

    assert!(service.initialize_demo_data().await.unwrap());

    let local = service.local_store();
    assert_eq!(local.read::<Patient>().unwrap().len(), 3);
    assert_eq!(local.read::<ClinicalSession>().unwrap().len(), 4);
    assert_eq!(local.read::<Appointment>().unwrap().len(), 4);
    assert_eq!(local.read::<Payment>().unwrap().len(), 4);
    assert!(local.read::<Patient>().unwrap().iter().all(|p| p.name != "Ana"));

    service.clear_demo_data().await.unwrap();

    assert!(local.read::<Patient>().unwrap().is_empty());
    assert!(local.read::<ClinicalSession>().unwrap().is_empty());
    assert!(local.read::<Appointment>().unwrap().is_empty());
    assert!(local.read::<Payment>().unwrap().is_empty());
}

#[tokio::test]
async fn test_created_records_do_not_collide_with_seed_ids() {
    let service = offline();
    service.auth().register(registration(&TestUser::admin("admin@clinica.com"))).await.unwrap();
    service.initialize_demo_data().await.unwrap();

    let created = service.create_patient(NewPatient::named("Nova")).await.unwrap().record;

    assert!(!["1", "2", "3"].contains(&created.id.as_str()));
    assert_eq!(service.get_patients().await.unwrap().len(), 4);
}
