//! Outbound delivery seam to the chat service's REST API.
//!
//! One concrete notifier is selected at startup and injected everywhere a
//! notification leaves the bridge. Delivery is fire-and-forget: failures
//! are logged and never surface to the event pipeline that triggered them.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::bridge_error::BridgeError;
use crate::notification_cards::NotificationPayload;
use crate::tenant_model::Tenant;
use crate::token_cache::{truncate_for_error, TokenCache, DEFAULT_TOKEN_SCOPES};

const NOTIFICATION_TIMEOUT_MS: u64 = 10_000;
const ROOM_INFO_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Deserialize)]
/// Room metadata returned by `GET room/{id}`.
pub struct RoomInfo {
    pub name: String,
    pub owner: RoomOwner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomOwner {
    pub id: Value,
    pub name: String,
}

impl RoomOwner {
    /// Owner id as a string regardless of the wire type.
    pub fn id_string(&self) -> String {
        match &self.id {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
/// Trait contract for outbound chat-service delivery.
pub trait Notifier: Send + Sync {
    /// Posts a notification to the given room. Errors are logged, not
    /// returned.
    async fn send_notification(
        &self,
        tenant: &Tenant,
        room_id: &str,
        payload: &NotificationPayload,
    );

    /// Posts an arbitrary JSON body to a path under the tenant's API base.
    /// Errors are logged, not returned.
    async fn post(&self, tenant: &Tenant, path: &str, body: &Value);

    /// Fetches room display metadata.
    async fn room_info(&self, tenant: &Tenant) -> Result<RoomInfo, BridgeError>;
}

#[derive(Clone)]
/// Production notifier speaking the chat service's REST API.
pub struct RoomNotifier {
    http: reqwest::Client,
    tokens: TokenCache,
}

impl RoomNotifier {
    pub fn new(tokens: TokenCache) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(NOTIFICATION_TIMEOUT_MS))
            .build()
            .context("failed to create chat api client")?;
        Ok(Self { http, tokens })
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.tokens
    }

    fn api_url(tenant: &Tenant, path: &str) -> String {
        format!(
            "{}/{}",
            tenant.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn bearer_token(&self, tenant: &Tenant) -> Option<String> {
        match self.tokens.get_token(tenant, DEFAULT_TOKEN_SCOPES).await {
            Ok(token) => Some(token),
            Err(BridgeError::OauthClientInvalid { tenant_id }) => {
                tracing::warn!(
                    tenant_id = tenant_id.as_str(),
                    "chat service rejected tenant credentials, dropping notification"
                );
                None
            }
            Err(error) => {
                tracing::warn!(
                    tenant_id = tenant.id.as_str(),
                    error = %error,
                    "token acquisition failed, dropping notification"
                );
                None
            }
        }
    }

    async fn post_logged(&self, tenant: &Tenant, path: &str, body: &Value) {
        let Some(token) = self.bearer_token(tenant).await else {
            return;
        };
        let url = Self::api_url(tenant, path);
        match self.http.post(&url).bearer_auth(token).json(body).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                let status = response.status();
                let body_text = response.text().await.unwrap_or_default();
                tracing::warn!(
                    url = url.as_str(),
                    status = status.as_u16(),
                    body = truncate_for_error(&body_text, 800).as_str(),
                    "chat api request failed"
                );
            }
            Err(error) => {
                tracing::warn!(url = url.as_str(), error = %error, "chat api request failed");
            }
        }
    }
}

#[async_trait]
impl Notifier for RoomNotifier {
    async fn send_notification(
        &self,
        tenant: &Tenant,
        room_id: &str,
        payload: &NotificationPayload,
    ) {
        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(error = %error, "failed to serialize notification payload");
                return;
            }
        };
        self.post_logged(tenant, &format!("room/{room_id}/notification"), &body)
            .await;
    }

    async fn post(&self, tenant: &Tenant, path: &str, body: &Value) {
        self.post_logged(tenant, path, body).await;
    }

    async fn room_info(&self, tenant: &Tenant) -> Result<RoomInfo, BridgeError> {
        let token = self
            .tokens
            .get_token(tenant, DEFAULT_TOKEN_SCOPES)
            .await?;
        let url = Self::api_url(tenant, &format!("room/{}", tenant.room_id));
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .timeout(Duration::from_millis(ROOM_INFO_TIMEOUT_MS))
            .send()
            .await?;
        let info = response.error_for_status()?.json::<RoomInfo>().await?;
        Ok(info)
    }
}
