//! HTTP surface of the notification bridge.
//!
//! All inbound chat-service traffic lands here: install callbacks, the
//! link-message webhook, the configuration endpoints, and the glance
//! queries that feed the room sidebar.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as AnyhowContext, Result};
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use regex::Regex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use iris_bridge::{
    make_event_notification, make_generic_notification, recent_events_glance_content, BridgeError,
    BridgeStore, CapabilitiesDocument, InboundAuth, MentionLog, NotificationColor, Notifier,
    NotifyPipeline,
    RequestContext, RoomNotifier, Tenant, TenantLifecycle, TokenCache,
};
use iris_host::HostDirectory;

use crate::configure_flow::{
    handle_configure_grant, handle_configure_projects, handle_configure_state,
};
use crate::descriptor::build_descriptor;
use crate::server_config::ServerConfig;

pub const DESCRIPTOR_ENDPOINT: &str = "/addon/descriptor";
pub const INSTALLABLE_ENDPOINT: &str = "/addon/installable";
pub const INSTALLABLE_ID_ENDPOINT: &str = "/addon/installable/{oauth_id}";
pub const LINK_MESSAGE_ENDPOINT: &str = "/webhook/link-message";
pub const CONFIGURE_ENDPOINT: &str = "/configure";
pub const CONFIGURE_GRANT_ENDPOINT: &str = "/configure/grant";
pub const CONFIGURE_PROJECTS_ENDPOINT: &str = "/configure/projects";
pub const SIGN_OUT_ENDPOINT: &str = "/sign-out";
pub const RECENT_EVENTS_GLANCE_ENDPOINT: &str = "/glance/recent-events";
pub const RECENT_EVENTS_ENDPOINT: &str = "/recent-events";

const CAPABILITIES_FETCH_TIMEOUT_MS: u64 = 10_000;

pub struct BridgeServerState {
    pub config: ServerConfig,
    pub store: BridgeStore,
    pub host: Arc<dyn HostDirectory>,
    pub lifecycle: TenantLifecycle,
    pub pipeline: NotifyPipeline,
    pub tokens: TokenCache,
    notifier: Arc<RoomNotifier>,
    http: reqwest::Client,
    link_pattern: Regex,
}

impl BridgeServerState {
    pub fn new(config: ServerConfig, host: Arc<dyn HostDirectory>) -> Result<Self> {
        let store = BridgeStore::new();
        let tokens = TokenCache::new()?;
        let notifier = Arc::new(RoomNotifier::new(tokens.clone())?);
        let lifecycle = TenantLifecycle::new(store.clone(), tokens.clone());
        let mentions = MentionLog::new(store.clone(), host.clone());
        let pipeline = NotifyPipeline::new(
            store.clone(),
            host.clone(),
            mentions,
            notifier.clone(),
            tokens.clone(),
        );
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(CAPABILITIES_FETCH_TIMEOUT_MS))
            .build()
            .context("failed to create capabilities fetch client")?;
        let link_pattern = Regex::new(&crate::descriptor::link_message_pattern(
            &config.host_base_url,
        ))
        .context("failed to compile link message pattern")?;
        Ok(Self {
            config,
            store,
            host,
            lifecycle,
            pipeline,
            tokens,
            notifier,
            http,
            link_pattern,
        })
    }

    pub fn mentions(&self) -> &MentionLog {
        self.pipeline.mentions()
    }

    /// Resolves the request context from query parameter, header, and body.
    pub fn resolve_context(
        &self,
        query: &BTreeMap<String, String>,
        headers: &HeaderMap,
        body: Option<&Value>,
    ) -> Result<RequestContext, BridgeError> {
        let authorization = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        RequestContext::resolve(
            &self.store,
            self.notifier.clone(),
            self.tokens.clone(),
            InboundAuth {
                signed_request: query.get("signed_request").map(String::as_str),
                authorization,
                body,
            },
        )
    }
}

pub fn build_bridge_router(state: Arc<BridgeServerState>) -> Router {
    Router::new()
        .route(DESCRIPTOR_ENDPOINT, get(handle_descriptor))
        .route(INSTALLABLE_ENDPOINT, post(handle_install))
        .route(INSTALLABLE_ID_ENDPOINT, delete(handle_uninstall))
        .route(LINK_MESSAGE_ENDPOINT, post(handle_link_message))
        .route(CONFIGURE_ENDPOINT, get(handle_configure_state))
        .route(CONFIGURE_GRANT_ENDPOINT, post(handle_configure_grant))
        .route(CONFIGURE_PROJECTS_ENDPOINT, post(handle_configure_projects))
        .route(SIGN_OUT_ENDPOINT, post(handle_sign_out))
        .route(
            RECENT_EVENTS_GLANCE_ENDPOINT,
            get(handle_recent_events_glance).route_layer(middleware::from_fn(apply_cors_headers)),
        )
        .route(RECENT_EVENTS_ENDPOINT, get(handle_recent_events))
        .layer(middleware::from_fn(apply_frame_headers))
        .with_state(state)
}

/// Runs the bridge server until interrupted.
pub async fn run_bridge_server(config: ServerConfig, host: Arc<dyn HostDirectory>) -> Result<()> {
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid bind address '{}'", config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind bridge server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound bridge server address")?;
    tracing::info!(addr = %local_addr, "bridge server listening");

    let state = Arc::new(BridgeServerState::new(config, host)?);
    let app = build_bridge_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("bridge server exited unexpectedly")
}

/// Everything the room iframe and glance queries need is same-origin from
/// the chat client's point of view, so frames are explicitly allowed.
async fn apply_frame_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("x-frame-options", "allow".parse().expect("static header"));
    response
}

async fn apply_cors_headers(request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(axum::http::header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("*")
        .to_string();
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(value) = origin.parse() {
        headers.insert("access-control-allow-origin", value);
    }
    headers.insert(
        "access-control-request-method",
        "GET, HEAD, OPTIONS".parse().expect("static header"),
    );
    headers.insert(
        "access-control-allow-headers",
        "X-Requested-With".parse().expect("static header"),
    );
    headers.insert(
        "access-control-allow-credentials",
        "true".parse().expect("static header"),
    );
    headers.insert(
        "access-control-max-age",
        "1728000".parse().expect("static header"),
    );
    response
}

/// Maps a resolution failure to the HTTP boundary.
pub fn bridge_error_response(error: BridgeError) -> Response {
    match error {
        BridgeError::BadTenant(message) => (StatusCode::BAD_REQUEST, message).into_response(),
        other => {
            tracing::warn!(error = %other, "unexpected bridge error at http boundary");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn handle_descriptor(State(state): State<Arc<BridgeServerState>>) -> Json<Value> {
    Json(build_descriptor(
        &state.config.base_url,
        &state.config.host_base_url,
    ))
}

async fn handle_install(
    State(state): State<Arc<BridgeServerState>>,
    Json(body): Json<Value>,
) -> Response {
    let Some(room_id) = string_or_number(body.get("roomId")) else {
        return (
            StatusCode::BAD_REQUEST,
            "This add-on can only be installed in individual rooms.",
        )
            .into_response();
    };
    let (Some(oauth_id), Some(oauth_secret), Some(capabilities_url)) = (
        body.get("oauthId").and_then(Value::as_str),
        body.get("oauthSecret").and_then(Value::as_str),
        body.get("capabilitiesUrl").and_then(Value::as_str),
    ) else {
        return (StatusCode::BAD_REQUEST, "Missing installation fields.").into_response();
    };

    let capabilities = match fetch_capabilities(&state, capabilities_url).await {
        Ok(capabilities) => capabilities,
        Err(error) => {
            tracing::warn!(
                capabilities_url,
                error = %error,
                "failed to fetch capabilities document"
            );
            return (
                StatusCode::BAD_REQUEST,
                "Could not fetch capabilities document.",
            )
                .into_response();
        }
    };
    if capabilities.links.self_url != capabilities_url {
        return (StatusCode::BAD_REQUEST, "Mismatch on capabilities URL").into_response();
    }

    // Replace any stale installation under the same id.
    state.lifecycle.delete(oauth_id);

    let mut tenant = Tenant::from_install(oauth_id, oauth_secret, &room_id, &capabilities);
    if let Ok(room) = state.notifier.room_info(&tenant).await {
        tenant.room_name = Some(room.name.clone());
        tenant.room_owner_id = Some(room.owner.id_string());
        tenant.room_owner_name = Some(room.owner.name.clone());
    }
    state.store.upsert_tenant(tenant);

    StatusCode::CREATED.into_response()
}

async fn handle_uninstall(
    State(state): State<Arc<BridgeServerState>>,
    Path(oauth_id): Path<String>,
) -> StatusCode {
    // Deleting an unknown tenant is success: the install is gone either way.
    state.lifecycle.delete(&oauth_id);
    StatusCode::CREATED
}

async fn handle_link_message(
    State(state): State<Arc<BridgeServerState>>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let context = match state.resolve_context(&query, &headers, Some(&body)) {
        Ok(context) => context,
        Err(error) => return bridge_error_response(error),
    };

    let text = body
        .pointer("/item/message/message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if let Some(captures) = state.link_pattern.captures(text) {
        let group_id = &captures["group"];
        let event_id = captures.name("event").map(|capture| capture.as_str());
        let resolved = context.event_from_url_params(
            state.host.as_ref(),
            group_id,
            event_id,
            Some((&captures["org"], &captures["proj"])),
        );
        if let Some(event) = resolved {
            if let (Some(group), Some(project)) = (
                state.host.group(&event.group_id),
                state.host.project(&event.project_id),
            ) {
                let payload =
                    make_event_notification(&group, &event, &project, false, event_id.is_some());
                context.send_notification(&payload).await;
                state.mentions().mention(
                    &event.project_id,
                    &group.id,
                    &context.tenant.id,
                    event_id.map(|_| event.id.as_str()),
                );
                state.pipeline.push_recent_events_glance(&context).await;
            }
        }
    }

    StatusCode::NO_CONTENT.into_response()
}

async fn handle_sign_out(
    State(state): State<Arc<BridgeServerState>>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let context = match state.resolve_context(&query, &headers, None) {
        Ok(context) => context,
        Err(error) => return bridge_error_response(error),
    };

    state.lifecycle.clear(&context.tenant.id);
    let payload = make_generic_notification(
        "The Iris integration was disassociated from this room.",
        Some(NotificationColor::Red),
        false,
    );
    context.send_notification(&payload).await;
    state.pipeline.push_recent_events_glance(&context).await;

    StatusCode::NO_CONTENT.into_response()
}

async fn handle_recent_events_glance(
    State(state): State<Arc<BridgeServerState>>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let context = match state.resolve_context(&query, &headers, None) {
        Ok(context) => context,
        Err(error) => return bridge_error_response(error),
    };
    let count = state.mentions().count(&context.tenant.id);
    Json(recent_events_glance_content(count)).into_response()
}

async fn handle_recent_events(
    State(state): State<Arc<BridgeServerState>>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let context = match state.resolve_context(&query, &headers, None) {
        Ok(context) => context,
        Err(error) => return bridge_error_response(error),
    };
    let events: Vec<Value> = state
        .mentions()
        .recent(&context.tenant.id)
        .into_iter()
        .map(|mention| {
            json!({
                "project_id": mention.record.project_id,
                "group_id": mention.record.group_id,
                "last_mentioned_unix_ms": mention.record.last_mentioned_unix_ms,
                "event": mention.event,
            })
        })
        .collect();
    Json(json!({ "events": events })).into_response()
}

async fn fetch_capabilities(
    state: &BridgeServerState,
    capabilities_url: &str,
) -> Result<CapabilitiesDocument, reqwest::Error> {
    state
        .http
        .get(capabilities_url)
        .send()
        .await?
        .error_for_status()?
        .json::<CapabilitiesDocument>()
        .await
}

fn string_or_number(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}
