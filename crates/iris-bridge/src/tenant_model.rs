//! Tenant identity and connection records.
//!
//! One tenant exists per room installation. The record carries the OAuth
//! client credentials issued by the chat service at install time together
//! with the service URLs discovered from its capabilities document.

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use iris_core::current_unix_timestamp;

use crate::bridge_error::BridgeError;

/// Signed-request tokens issued by [`Tenant::sign_token`] stay valid this long.
const SIGNED_TOKEN_LIFETIME_SECONDS: u64 = 3_600;

#[derive(Debug, Clone, Deserialize)]
/// Capabilities document served by the chat service, fetched at install time.
pub struct CapabilitiesDocument {
    pub links: CapabilitiesLinks,
    pub capabilities: CapabilitiesBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapabilitiesLinks {
    #[serde(rename = "self")]
    pub self_url: String,
    #[serde(default)]
    pub homepage: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesBody {
    pub oauth2_provider: OauthProviderCapability,
    pub api_provider: ApiProviderCapability,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OauthProviderCapability {
    pub token_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiProviderCapability {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Connection record for one chat-room installation.
pub struct Tenant {
    /// Opaque OAuth client id issued by the chat service.
    pub id: String,
    pub secret: String,
    pub room_id: String,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub room_owner_id: Option<String>,
    #[serde(default)]
    pub room_owner_name: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    pub token_url: String,
    pub capabilities_url: String,
    pub api_base_url: String,
    #[serde(default)]
    pub installed_from: Option<String>,
    /// Host user who granted organizational access, once configured.
    #[serde(default)]
    pub auth_user_id: Option<String>,
    #[serde(default)]
    pub organization_ids: Vec<String>,
    #[serde(default)]
    pub project_ids: Vec<String>,
}

impl Tenant {
    /// Builds a tenant from an install callback payload and the fetched
    /// capabilities document.
    pub fn from_install(
        id: &str,
        secret: &str,
        room_id: &str,
        capabilities: &CapabilitiesDocument,
    ) -> Self {
        let token_url = capabilities.capabilities.oauth2_provider.token_url.clone();
        let installed_from = base_url(&token_url);
        Self {
            id: id.to_string(),
            secret: secret.to_string(),
            room_id: room_id.to_string(),
            room_name: None,
            room_owner_id: None,
            room_owner_name: None,
            homepage: capabilities.links.homepage.clone(),
            token_url,
            capabilities_url: capabilities.links.self_url.clone(),
            api_base_url: capabilities.capabilities.api_provider.url.clone(),
            installed_from,
            auth_user_id: None,
            organization_ids: Vec::new(),
            project_ids: Vec::new(),
        }
    }

    /// Serializes the tenant into an opaque store record.
    pub fn to_record(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Reconstructs a tenant from a store record.
    pub fn from_record(record: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(record.clone())
    }

    /// Issues an HS256 signed-request token for follow-up links back into
    /// the configuration surface.
    pub fn sign_token(
        &self,
        user_id: Option<&str>,
        extra_claims: Option<Map<String, Value>>,
    ) -> Result<String, BridgeError> {
        let now = current_unix_timestamp();
        let mut claims = extra_claims.unwrap_or_default();
        claims.insert("iss".to_string(), Value::String(self.id.clone()));
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert(
            "exp".to_string(),
            Value::from(now + SIGNED_TOKEN_LIFETIME_SECONDS),
        );
        if let Some(user_id) = user_id {
            claims.insert("sub".to_string(), Value::String(user_id.to_string()));
        }
        let token = encode(
            &Header::default(),
            &Value::Object(claims),
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }
}

/// Reduces a URL to its `scheme://host` origin, `None` when malformed.
fn base_url(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split('/').next()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{host}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_strips_path_and_rejects_malformed() {
        assert_eq!(
            base_url("https://chat.example.com/v2/oauth/token"),
            Some("https://chat.example.com".to_string())
        );
        assert_eq!(base_url("not a url"), None);
        assert_eq!(base_url("https:///missing-host"), None);
    }
}
