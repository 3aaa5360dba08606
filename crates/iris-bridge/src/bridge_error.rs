//! Error taxonomy for tenant resolution and outbound delivery.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// No verifiable tenant identity could be established for a request.
    #[error("bad tenant: {0}")]
    BadTenant(String),
    /// The token endpoint rejected this tenant's client credentials.
    #[error("oauth client credentials rejected for tenant {tenant_id}")]
    OauthClientInvalid { tenant_id: String },
    /// The token endpoint answered with an unexpected status.
    #[error("token endpoint returned status {status}: {body}")]
    TokenEndpoint { status: u16, body: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token encoding error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl BridgeError {
    pub fn bad_tenant(message: impl Into<String>) -> Self {
        Self::BadTenant(message.into())
    }
}
