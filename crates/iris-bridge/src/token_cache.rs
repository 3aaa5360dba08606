//! OAuth client-credentials token cache keyed by tenant and scope set.
//!
//! Tokens are cached for the server-declared lifetime minus a safety margin
//! so an outbound call never rides a token that expires mid-flight. Writers
//! follow last-write-wins; two concurrent misses may both fetch, which the
//! token endpoint treats as idempotent.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use iris_core::{current_unix_timestamp_ms, is_expired_unix_ms};

use crate::bridge_error::BridgeError;
use crate::tenant_model::Tenant;

/// Scopes requested when a caller does not name any.
pub const DEFAULT_TOKEN_SCOPES: &[&str] = &["send_notification", "view_room"];

/// Seconds subtracted from the declared token lifetime before caching.
const TOKEN_TTL_SAFETY_MARGIN_SECONDS: u64 = 20;
const TOKEN_FETCH_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Deserialize)]
struct TokenGrantResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_unix_ms: u64,
}

#[derive(Clone)]
pub struct TokenCache {
    http: reqwest::Client,
    entries: Arc<Mutex<BTreeMap<String, CachedToken>>>,
}

impl TokenCache {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(TOKEN_FETCH_TIMEOUT_MS))
            .build()
            .context("failed to create token endpoint client")?;
        Ok(Self {
            http,
            entries: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }

    /// Returns a bearer token for the tenant, fetching through the
    /// client-credentials grant on cache miss or expiry.
    pub async fn get_token(&self, tenant: &Tenant, scopes: &[&str]) -> Result<String, BridgeError> {
        let key = cache_key(&tenant.id, scopes);
        let now_unix_ms = current_unix_timestamp_ms();

        if let Ok(entries) = self.entries.lock() {
            if let Some(entry) = entries.get(&key) {
                if !is_expired_unix_ms(Some(entry.expires_unix_ms), now_unix_ms) {
                    return Ok(entry.token.clone());
                }
            }
        }

        let grant = self.fetch_token(tenant, scopes).await?;
        // Clamp so a lifetime below the margin re-fetches on the next call
        // instead of wrapping.
        let ttl_seconds = grant
            .expires_in
            .saturating_sub(TOKEN_TTL_SAFETY_MARGIN_SECONDS);
        let entry = CachedToken {
            token: grant.access_token.clone(),
            expires_unix_ms: now_unix_ms.saturating_add(ttl_seconds.saturating_mul(1_000)),
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, entry);
        }
        Ok(grant.access_token)
    }

    async fn fetch_token(
        &self,
        tenant: &Tenant,
        scopes: &[&str],
    ) -> Result<TokenGrantResponse, BridgeError> {
        let scope = canonicalize_scopes(scopes).join(" ");
        let response = self
            .http
            .post(&tenant.token_url)
            .basic_auth(&tenant.id, Some(&tenant.secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<TokenGrantResponse>().await?);
        }
        if status.as_u16() == 401 {
            return Err(BridgeError::OauthClientInvalid {
                tenant_id: tenant.id.clone(),
            });
        }
        let body = response.text().await.unwrap_or_default();
        Err(BridgeError::TokenEndpoint {
            status: status.as_u16(),
            body: truncate_for_error(&body, 320),
        })
    }

    /// Drops every cached token for the tenant, used on uninstall.
    pub fn purge_tenant(&self, tenant_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            let prefix = format!("{tenant_id}\u{1f}");
            entries.retain(|key, _| !key.starts_with(&prefix));
        }
    }
}

fn cache_key(tenant_id: &str, scopes: &[&str]) -> String {
    format!(
        "{tenant_id}\u{1f}{}",
        canonicalize_scopes(scopes).join(",")
    )
}

fn canonicalize_scopes<'a>(scopes: &[&'a str]) -> Vec<&'a str> {
    let mut canonical: Vec<&str> = scopes.to_vec();
    canonical.sort_unstable();
    canonical.dedup();
    canonical
}

pub(crate) fn truncate_for_error(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let truncated: String = body.chars().take(max_chars).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_canonicalizes_scope_order() {
        assert_eq!(
            cache_key("t1", &["view_room", "send_notification"]),
            cache_key("t1", &["send_notification", "view_room"])
        );
        assert_ne!(
            cache_key("t1", &["send_notification"]),
            cache_key("t2", &["send_notification"])
        );
    }

    #[test]
    fn ttl_margin_clamps_to_zero() {
        let below_margin: u64 = 5;
        assert_eq!(
            below_margin.saturating_sub(TOKEN_TTL_SAFETY_MARGIN_SECONDS),
            0
        );
    }

    #[test]
    fn truncate_for_error_bounds_long_bodies() {
        assert_eq!(truncate_for_error("short", 320), "short");
        let long = "x".repeat(400);
        let truncated = truncate_for_error(&long, 320);
        assert_eq!(truncated.chars().count(), 321);
    }
}
