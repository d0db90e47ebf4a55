// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tracker API contract and its HTTP implementation.

use async_trait::async_trait;
use axum_extra::extract::cookie::Cookie;
use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::client::ClientError;
use crate::error::ErrorResponse;
use crate::models::{ActivityEntry, Collectible, EntryStatus, PublicUser, QuestionRecord, TrackerSnapshot};
use crate::routes::auth::{LoginResponse, RefreshResponse, RegisterResponse};
use crate::routes::tracker::{CollectibleResponse, EntryResponse};
use crate::services::identity::REFRESH_COOKIE;
use crate::time_utils::DateKey;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of a save-entry write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub date: DateKey,
    #[serde(default)]
    pub status: EntryStatus,
    #[serde(default)]
    pub questions: Vec<QuestionRecord>,
}

impl EntryDraft {
    pub fn new(date: DateKey, status: EntryStatus) -> Self {
        Self {
            date,
            status,
            questions: Vec::new(),
        }
    }

    /// The entry the server will store for this draft.
    pub fn to_entry(&self, user_id: &str) -> ActivityEntry {
        ActivityEntry::new(user_id, self.date, self.status, self.questions.clone())
    }
}

/// Operations the projection cache needs from the server.
#[async_trait]
pub trait TrackerApi: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<TrackerSnapshot, ClientError>;
    async fn save_entry(&self, draft: &EntryDraft) -> Result<ActivityEntry, ClientError>;
    async fn delete_entry(&self, date: DateKey) -> Result<(), ClientError>;
    async fn award_collectible(
        &self,
        collectible_id: u32,
        name: Option<&str>,
        image: Option<&str>,
    ) -> Result<Collectible, ClientError>;
}

#[derive(Debug, Clone)]
struct Credentials {
    access_token: String,
    refresh_token: String,
}

/// Bearer-token client. A rejected access token triggers one shared
/// refresh; concurrent callers wait for it and replay with the new token.
pub struct HttpTrackerClient {
    http: reqwest::Client,
    base_url: String,
    credentials: RwLock<Option<Credentials>>,
    /// Held for the duration of a refresh
    refresh_lock: Mutex<()>,
}

impl HttpTrackerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn set_credentials(&self, access_token: String, refresh_token: String) {
        *self.credentials.write().await = Some(Credentials {
            access_token,
            refresh_token,
        });
    }

    pub async fn is_signed_in(&self) -> bool {
        self.credentials.read().await.is_some()
    }

    pub async fn sign_out(&self) {
        *self.credentials.write().await = None;
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<PublicUser, ClientError> {
        let response = self
            .http
            .post(self.url("/auth/register"))
            .json(&json!({ "name": name, "email": email, "password": password }))
            .send()
            .await?;
        let body: RegisterResponse = decode(response).await?;
        self.set_credentials(body.token, body.refresh_token).await;
        Ok(body.user)
    }

    /// The login body carries only the access token; the refresh token
    /// comes back as a cookie.
    pub async fn login(&self, email: &str, password: &str) -> Result<PublicUser, ClientError> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let refresh_token = refresh_cookie(response.headers());
        let body: LoginResponse = decode(response).await?;
        let refresh_token = refresh_token
            .ok_or_else(|| ClientError::Decode("login response has no refresh cookie".into()))?;
        self.set_credentials(body.token, refresh_token).await;
        Ok(body.user)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let token = self
            .credentials
            .read()
            .await
            .as_ref()
            .map(|c| c.access_token.clone())
            .ok_or(ClientError::SessionExpired)?;

        let response = self
            .authorized(method.clone(), path, body.as_ref(), &token)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return decode(response).await;
        }

        tracing::debug!(path, "Access token rejected, refreshing");
        let fresh = self.refreshed_token(&token).await?;
        let response = self.authorized(method, path, body.as_ref(), &fresh).await?;
        decode(response).await
    }

    async fn authorized(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let mut request = self.http.request(method, self.url(path)).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Token to replay with after `stale` was rejected. Runs at most one
    /// refresh at a time; callers queued behind a finished refresh reuse
    /// its result.
    async fn refreshed_token(&self, stale: &str) -> Result<String, ClientError> {
        let _flight = self.refresh_lock.lock().await;

        let Some(current) = self.credentials.read().await.clone() else {
            return Err(ClientError::SessionExpired);
        };
        if current.access_token != stale {
            return Ok(current.access_token);
        }

        match self.post_refresh(&current.refresh_token).await {
            Ok(token) => {
                if let Some(credentials) = self.credentials.write().await.as_mut() {
                    credentials.access_token = token.clone();
                }
                tracing::debug!("Access token refreshed");
                Ok(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, signing out");
                self.sign_out().await;
                Err(ClientError::SessionExpired)
            }
        }
    }

    async fn post_refresh(&self, refresh_token: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.url("/auth/refresh"))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;
        let body: RefreshResponse = decode(response).await?;
        Ok(body.token)
    }
}

#[async_trait]
impl TrackerApi for HttpTrackerClient {
    async fn fetch_snapshot(&self) -> Result<TrackerSnapshot, ClientError> {
        self.send(Method::GET, "/tracker", None).await
    }

    async fn save_entry(&self, draft: &EntryDraft) -> Result<ActivityEntry, ClientError> {
        let body = serde_json::to_value(draft).map_err(|e| ClientError::Decode(e.to_string()))?;
        let response: EntryResponse = self
            .send(Method::POST, "/tracker/entry", Some(body))
            .await?;
        Ok(response.entry)
    }

    async fn delete_entry(&self, date: DateKey) -> Result<(), ClientError> {
        let _: Value = self
            .send(Method::DELETE, &format!("/tracker/entry?date={date}"), None)
            .await?;
        Ok(())
    }

    async fn award_collectible(
        &self,
        collectible_id: u32,
        name: Option<&str>,
        image: Option<&str>,
    ) -> Result<Collectible, ClientError> {
        let body = json!({ "collectibleId": collectible_id, "name": name, "image": image });
        let response: CollectibleResponse = self
            .send(Method::POST, "/tracker/collectible", Some(body))
            .await?;
        Ok(response.collectible)
    }
}

fn refresh_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse(v).ok())
        .find(|c| c.name() == REFRESH_COOKIE)
        .map(|c| c.value().to_string())
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(e) => (e.error, e.message),
        Err(_) => ("unknown".to_string(), body),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}
