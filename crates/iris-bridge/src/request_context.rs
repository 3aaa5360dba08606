//! Per-request tenant and sender resolution.
//!
//! The two-pass token decode is a deliberate trust boundary: the first,
//! unverified pass only identifies which tenant's secret to verify with and
//! is never trusted for authorization. Only claims from the verified second
//! pass reach the context.

use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use iris_host::{Event, HostDirectory};

use crate::bridge_error::BridgeError;
use crate::bridge_store::BridgeStore;
use crate::notification_cards::NotificationPayload;
use crate::notifier::Notifier;
use crate::tenant_model::Tenant;
use crate::token_cache::{TokenCache, DEFAULT_TOKEN_SCOPES};

/// Authorization header scheme carrying a signed request token.
const TOKEN_HEADER_SCHEME: &str = "JWT ";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Chat-service identity of the user acting on a request.
pub struct ChatUser {
    pub id: String,
    pub name: Option<String>,
    pub mention_name: Option<String>,
}

impl ChatUser {
    fn from_value(value: &Value) -> Option<Self> {
        let id = match value.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return None,
        };
        Some(Self {
            id,
            name: value
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
            mention_name: value
                .get("mention_name")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Framework-agnostic view of an inbound request, enough to resolve a
/// tenant from it.
#[derive(Debug, Clone, Copy, Default)]
pub struct InboundAuth<'a> {
    /// `signed_request` query parameter, when present.
    pub signed_request: Option<&'a str>,
    /// Raw `Authorization` header value, when present.
    pub authorization: Option<&'a str>,
    /// Parsed JSON body, when the request carried one.
    pub body: Option<&'a Value>,
}

/// Resolved tenant plus acting user for one inbound request.
pub struct RequestContext {
    pub tenant: Tenant,
    /// Acting user; `None` for tenant-only contexts.
    pub sender: Option<ChatUser>,
    /// Supplemental context map from the verified token claims.
    pub context: Map<String, Value>,
    /// Raw signed token, kept for constructing follow-up links.
    pub signed_request: Option<String>,
    notifier: Arc<dyn Notifier>,
    tokens: TokenCache,
    memoized_token: OnceCell<String>,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("tenant", &self.tenant)
            .field("sender", &self.sender)
            .field("context", &self.context)
            .field("signed_request", &self.signed_request)
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    /// Resolves the authenticated tenant and sender for a request.
    pub fn resolve(
        store: &BridgeStore,
        notifier: Arc<dyn Notifier>,
        tokens: TokenCache,
        request: InboundAuth<'_>,
    ) -> Result<Self, BridgeError> {
        let (tenant, claims) = resolve_tenant(store, request)?;

        let sender_value = request.body.and_then(sender_from_body);
        let sender = match sender_value {
            Some(value) => Some(
                ChatUser::from_value(value)
                    .ok_or_else(|| BridgeError::bad_tenant("malformed sender in request body"))?,
            ),
            None => match claims.get("sub") {
                Some(Value::String(subject)) => Some(ChatUser {
                    id: subject.clone(),
                    name: None,
                    mention_name: None,
                }),
                _ => return Err(BridgeError::bad_tenant("cannot identify sender in tenant")),
            },
        };

        let context = match claims.get("context") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };

        Ok(Self {
            tenant,
            sender,
            context,
            signed_request: request.signed_request.map(str::to_string),
            notifier,
            tokens,
            memoized_token: OnceCell::new(),
        })
    }

    /// Creates a context bound to a tenant without an acting user, used by
    /// the outbound event pipeline.
    pub fn for_tenant(tenant: Tenant, notifier: Arc<dyn Notifier>, tokens: TokenCache) -> Self {
        Self {
            tenant,
            sender: None,
            context: Map::new(),
            signed_request: None,
            notifier,
            tokens,
            memoized_token: OnceCell::new(),
        }
    }

    /// Room targeted by this context: the context-supplied override when
    /// present, else the tenant's default room.
    pub fn room_id(&self) -> String {
        match self.context.get("room_id") {
            Some(Value::String(room_id)) => room_id.clone(),
            Some(Value::Number(room_id)) => room_id.to_string(),
            _ => self.tenant.room_id.clone(),
        }
    }

    /// Bearer token for the tenant, computed at most once per context.
    pub async fn tenant_token(&self) -> Result<&str, BridgeError> {
        self.memoized_token
            .get_or_try_init(|| self.tokens.get_token(&self.tenant, DEFAULT_TOKEN_SCOPES))
            .await
            .map(String::as_str)
    }

    /// Posts an arbitrary payload under the tenant's API base.
    /// Fire-and-forget: failures are logged by the notifier.
    pub async fn post(&self, path: &str, body: &Value) {
        self.notifier.post(&self.tenant, path, body).await;
    }

    /// Sends a notification to this context's room. Fire-and-forget.
    pub async fn send_notification(&self, payload: &NotificationPayload) {
        self.notifier
            .send_notification(&self.tenant, &self.room_id(), payload)
            .await;
    }

    /// Resolves an event, requiring its project to be associated with this
    /// tenant.
    pub fn event_for_tenant(&self, host: &dyn HostDirectory, event_id: &str) -> Option<Event> {
        let event = host.event(event_id)?;
        self.tenant
            .project_ids
            .iter()
            .any(|id| *id == event.project_id)
            .then_some(event)
    }

    /// Resolves the event referenced by link-webhook URL captures, cross
    /// checking group membership and org/project slugs.
    pub fn event_from_url_params(
        &self,
        host: &dyn HostDirectory,
        group_id: &str,
        event_id: Option<&str>,
        slug_vars: Option<(&str, &str)>,
    ) -> Option<Event> {
        let event = match event_id {
            Some(event_id) => {
                let event = host.event(event_id)?;
                if event.group_id != group_id {
                    return None;
                }
                event
            }
            None => {
                let group = host.group(group_id)?;
                host.latest_event_for_group(&group.id)?
            }
        };
        let event = self.event_for_tenant(host, &event.id)?;

        if let Some((org_slug, project_slug)) = slug_vars {
            let project = host.project(&event.project_id)?;
            let organization = host.organization(&project.organization_id)?;
            if organization.slug != org_slug || project.slug != project_slug {
                return None;
            }
        }

        Some(event)
    }
}

/// Locates the tenant for a request and returns it with the verified token
/// claims (empty for body-identified callbacks).
fn resolve_tenant(
    store: &BridgeStore,
    request: InboundAuth<'_>,
) -> Result<(Tenant, Map<String, Value>), BridgeError> {
    // Already-authenticated callbacks identify the tenant in the body.
    if let Some(tenant_id) = request
        .body
        .and_then(|body| body.get("oauth_client_id"))
        .and_then(Value::as_str)
    {
        if let Some(tenant) = store.tenant(tenant_id) {
            return Ok((tenant, Map::new()));
        }
    }

    let token = match request.signed_request {
        Some(token) => token,
        None => request
            .authorization
            .and_then(|header| header.strip_prefix(TOKEN_HEADER_SCHEME))
            .ok_or_else(|| BridgeError::bad_tenant("could not find signed request token"))?,
    };

    // Pass 1: unverified read, only to learn which secret to verify with.
    let issuer = decode_issuer_untrusted(token)?;
    let tenant = store
        .tenant(&issuer)
        .ok_or_else(|| BridgeError::bad_tenant("could not find tenant"))?;

    // Pass 2: full verification against that tenant's secret. A failure
    // here never falls back to the unverified claims.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    let verified = decode::<Value>(
        token,
        &DecodingKey::from_secret(tenant.secret.as_bytes()),
        &validation,
    )
    .map_err(|_| BridgeError::bad_tenant("signed request verification failed"))?;

    let claims = match verified.claims {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Ok((tenant, claims))
}

fn decode_issuer_untrusted(token: &str) -> Result<String, BridgeError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    let untrusted = decode::<Value>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|_| BridgeError::bad_tenant("malformed signed request token"))?;
    untrusted
        .claims
        .get("iss")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BridgeError::bad_tenant("signed request token missing issuer"))
}

fn sender_from_body(body: &Value) -> Option<&Value> {
    let item = body.get("item")?;
    if let Some(sender) = item.get("sender") {
        return Some(sender);
    }
    item.get("message").and_then(|message| message.get("from"))
}
