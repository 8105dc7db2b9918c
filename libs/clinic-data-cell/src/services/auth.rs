use std::sync::{Arc, LazyLock};

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use regex::Regex;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use availability_cell::AvailabilityProbe;
use shared_database::{LocalStore, RemoteApiClient, RemoteError};
use shared_models::{
    AppError, AuthResponse, AuthSession, LoginRequest, NewUserAccount, RegisterRequest, User,
    UserAccount,
};

/// Local key holding the signed-in user.
pub const CURRENT_USER_KEY: &str = "current_user";

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

static EMAIL_REGEX: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(EMAIL_PATTERN));
const MIN_PASSWORD_LEN: usize = 6;

pub struct AuthService {
    remote: Arc<RemoteApiClient>,
    probe: Arc<AvailabilityProbe>,
    local: Arc<LocalStore>,
    session: RwLock<Option<AuthSession>>,
}

impl AuthService {
    pub fn new(remote: Arc<RemoteApiClient>, probe: Arc<AvailabilityProbe>, local: Arc<LocalStore>) -> Self {
        Self {
            remote,
            probe,
            local,
            session: RwLock::new(None),
        }
    }

    /// Picks up the session persisted by a previous run, token included.
    pub async fn restore(&self) -> Result<Option<User>, AppError> {
        let stored: Option<AuthSession> = self.local.load_document(CURRENT_USER_KEY)?;

        if let Some(session) = &stored {
            info!("Restored session for {}", session.user.email);
            self.remote.set_token(session.token.clone());
        }

        let user = stored.as_ref().map(|s| s.user.clone());
        *self.session.write().await = stored;
        Ok(user)
    }

    pub async fn current_session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.session.read().await.as_ref().map(|s| s.user.clone())
    }

    async fn sign_in(&self, user: User, token: Option<String>) -> Result<AuthSession, AppError> {
        let session = AuthSession {
            user,
            token,
            signed_in_at: Utc::now(),
        };

        self.local.save_document(CURRENT_USER_KEY, &session)?;
        self.remote.set_token(session.token.clone());
        *self.session.write().await = Some(session.clone());

        info!("Signed in as {}", session.user.email);
        Ok(session)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, AppError> {
        if self.probe.check().await {
            match self.remote.login(&request).await {
                Ok(AuthResponse { user, token, .. }) => return self.sign_in(user, token).await,
                Err(e) if RemoteError::is_unauthorized(&e) => {
                    return Err(AppError::Auth("Invalid email or password".to_string()));
                }
                Err(e) => self.fall_back("login", e).await,
            }
        }

        let account = self
            .find_account(&request.email)?
            .ok_or_else(|| AppError::Auth("Invalid email or password".to_string()))?;

        if !verify_password(&request.password, &account.password_hash)? {
            return Err(AppError::Auth("Invalid email or password".to_string()));
        }

        self.sign_in(account.user, None).await
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, AppError> {
        validate_registration(&request)?;

        if self.probe.check().await {
            match self.remote.register(&request).await {
                Ok(AuthResponse { user, token, .. }) => return self.sign_in(user, token).await,
                Err(e) if RemoteError::is_unauthorized(&e) => {
                    return Err(AppError::Auth(e.to_string()));
                }
                Err(e) => {
                    if let Some(body) = RemoteError::client_rejection(&e) {
                        return Err(AppError::ValidationError(body.to_string()));
                    }
                    self.fall_back("register", e).await;
                }
            }
        }

        if self.find_account(&request.email)?.is_some() {
            return Err(AppError::ValidationError(format!(
                "An account for {} already exists",
                request.email
            )));
        }

        let account = NewUserAccount {
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            role: None,
            password_hash: hash_password(&request.password)?,
        };
        let created = self.local.create::<UserAccount, _>(&account)?.into_record();

        self.sign_in(created.user, None).await
    }

    /// Revalidates the session token remotely. A rejected token signs the
    /// user out; an unreachable backend keeps the local session.
    pub async fn verify(&self) -> Result<Option<User>, AppError> {
        let Some(session) = self.current_session().await else {
            return Ok(None);
        };

        if session.token.is_none() || !self.probe.check().await {
            return Ok(Some(session.user));
        }

        match self.remote.verify().await {
            Ok(user) => {
                let refreshed = AuthSession { user: user.clone(), ..session };
                self.local.save_document(CURRENT_USER_KEY, &refreshed)?;
                *self.session.write().await = Some(refreshed);
                Ok(Some(user))
            }
            Err(e) if RemoteError::is_unauthorized(&e) => {
                warn!("Session token rejected, signing out");
                self.logout().await?;
                Ok(None)
            }
            Err(e) => {
                self.fall_back("verify", e).await;
                Ok(Some(session.user))
            }
        }
    }

    pub async fn logout(&self) -> Result<(), AppError> {
        self.remote.set_token(None);
        *self.session.write().await = None;
        self.local.remove_document(CURRENT_USER_KEY)?;
        debug!("Signed out");
        Ok(())
    }

    fn find_account(&self, email: &str) -> Result<Option<UserAccount>, AppError> {
        let email = email.trim();
        Ok(self
            .local
            .read::<UserAccount>()?
            .into_iter()
            .find(|account| account.user.email.eq_ignore_ascii_case(email)))
    }

    async fn fall_back(&self, operation: &str, err: anyhow::Error) {
        warn!("Remote {} failed, using local accounts: {}", operation, err);
        if RemoteError::is_availability_failure(&err) {
            self.probe.report_failure().await;
        }
    }
}

fn validate_registration(request: &RegisterRequest) -> Result<(), AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::ValidationError("Name is required".to_string()));
    }

    let email = EMAIL_REGEX.as_ref().map_err(|e| AppError::Internal(e.to_string()))?;
    if !email.is_match(request.email.trim()) {
        return Err(AppError::ValidationError(format!("Invalid email address: {}", request.email)));
    }

    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::ValidationError(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }

    Ok(())
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;
    Ok(password_hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::StorageFailure(format!("Stored password hash is invalid: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}
