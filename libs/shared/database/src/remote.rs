use std::sync::RwLock;

use anyhow::{anyhow, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, Response,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::{AuthResponse, Envelope, LoginRequest, Record, RegisterRequest, User};

use crate::error::RemoteError;

/// JSON client for the remote clinic API. Lists come back as bare arrays,
/// single-record writes as `{message, <singular>}` envelopes.
pub struct RemoteApiClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

#[derive(Deserialize)]
struct VerifyResponse {
    user: User,
}

impl RemoteApiClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.remote_timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Bearer token attached to every later request; `None` on logout.
    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|slot| slot.clone())
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.token() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => error!("Stored token is not a valid header value, sending unauthenticated"),
            }
        }

        headers
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.get_headers());

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                code @ (401 | 403) => RemoteError::Unauthorized { status: code, body: error_text }.into(),
                404 => RemoteError::NotFound(error_text).into(),
                code => RemoteError::Status { status: code, body: error_text }.into(),
            });
        }

        Ok(response)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    fn record_path<T: Record>(id: &str) -> String {
        format!("/{}/{}", T::COLLECTION, urlencoding::encode(id))
    }

    pub async fn list<T: Record>(&self) -> Result<Vec<T>> {
        self.request(Method::GET, &format!("/{}", T::COLLECTION), None).await
    }

    pub async fn get<T: Record>(&self, id: &str) -> Result<T> {
        let value: Value = self.request(Method::GET, &Self::record_path::<T>(id), None).await?;
        Ok(Envelope::<T>::from_value(value)?.into_record())
    }

    pub async fn create<T, I>(&self, input: &I) -> Result<Envelope<T>>
    where
        T: Record,
        I: Serialize,
    {
        let body = serde_json::to_value(input)?;
        let value: Value = self
            .request(Method::POST, &format!("/{}", T::COLLECTION), Some(body))
            .await?;
        Ok(Envelope::from_value(value)?)
    }

    pub async fn update<T, P>(&self, id: &str, patch: &P) -> Result<Envelope<T>>
    where
        T: Record,
        P: Serialize,
    {
        let body = serde_json::to_value(patch)?;
        let value: Value = self
            .request(Method::PUT, &Self::record_path::<T>(id), Some(body))
            .await?;
        Ok(Envelope::from_value(value)?)
    }

    /// The response body, if any, is ignored.
    pub async fn delete<T: Record>(&self, id: &str) -> Result<()> {
        self.send(Method::DELETE, &Self::record_path::<T>(id), None).await?;
        Ok(())
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        let body = serde_json::to_value(request)?;
        self.request(Method::POST, "/auth/login", Some(body)).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        let body = serde_json::to_value(request)?;
        self.request(Method::POST, "/auth/register", Some(body)).await
    }

    pub async fn verify(&self) -> Result<User> {
        if self.token().is_none() {
            return Err(anyhow!("No session token to verify"));
        }
        let response: VerifyResponse = self.request(Method::GET, "/auth/verify", None).await?;
        Ok(response.user)
    }
}
