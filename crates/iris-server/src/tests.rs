//! End-to-end tests driving the bridge server over a real listener, with
//! the chat service mocked out by httpmock.

use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use iris_bridge::Tenant;
use iris_host::{Event, Group, InMemoryHostDirectory, Organization, Project, Severity};

use super::{build_bridge_router, BridgeServerState, ServerConfig};

const MONITOR_BASE_URL: &str = "https://monitor.example.com";

async fn spawn_server(host: Arc<InMemoryHostDirectory>) -> (String, Arc<BridgeServerState>) {
    let config = ServerConfig::new("127.0.0.1:0", "https://bridge.example.com", MONITOR_BASE_URL);
    let state = Arc::new(BridgeServerState::new(config, host).expect("server state"));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let local_addr = listener.local_addr().expect("local addr");
    let app = build_bridge_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{local_addr}"), state)
}

fn mock_chat_service(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200)
            .json_body(json!({"access_token": "tok-1", "expires_in": 3600}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/room/42");
        then.status(200)
            .json_body(json!({"name": "Ops", "owner": {"id": 7, "name": "Dana"}}));
    });
}

fn capabilities_body(server: &MockServer) -> Value {
    json!({
        "links": {
            "self": server.url("/capabilities"),
            "homepage": server.base_url(),
        },
        "capabilities": {
            "oauth2Provider": {
                "tokenUrl": server.url("/oauth/token"),
            },
            "apiProvider": {
                "url": server.base_url(),
            },
        },
    })
}

fn chat_tenant(server: &MockServer, id: &str) -> Tenant {
    Tenant {
        id: id.to_string(),
        secret: format!("secret-{id}"),
        room_id: "42".to_string(),
        room_name: Some("Ops".to_string()),
        room_owner_id: None,
        room_owner_name: None,
        homepage: Some(server.base_url()),
        token_url: server.url("/oauth/token"),
        capabilities_url: server.url("/capabilities"),
        api_base_url: server.base_url(),
        installed_from: Some(server.base_url()),
        auth_user_id: None,
        organization_ids: Vec::new(),
        project_ids: Vec::new(),
    }
}

fn seed_monitor(host: &InMemoryHostDirectory) {
    host.insert_organization(Organization {
        id: "o1".to_string(),
        slug: "acme".to_string(),
        name: "Acme".to_string(),
    });
    host.insert_project(Project {
        id: "p1".to_string(),
        organization_id: "o1".to_string(),
        slug: "web".to_string(),
        name: "Acme Web".to_string(),
        url: format!("{MONITOR_BASE_URL}/acme/web/"),
    });
    host.insert_group(Group {
        id: "g1".to_string(),
        project_id: "p1".to_string(),
        level: Severity::Error,
        title: "NullPointerException".to_string(),
        url: format!("{MONITOR_BASE_URL}/acme/web/group/g1/"),
        times_seen: 3,
        first_seen: "2026-08-01".to_string(),
        first_release: None,
    });
    host.insert_event(Event {
        id: "e1".to_string(),
        group_id: "g1".to_string(),
        project_id: "p1".to_string(),
        message: "NullPointerException in checkout".to_string(),
        culprit: "app.views.checkout".to_string(),
        tags: vec![("level".to_string(), "error".to_string())],
    });
}

#[tokio::test]
async fn integration_descriptor_advertises_webhook_and_glance() {
    let host = Arc::new(InMemoryHostDirectory::new());
    let (base, _state) = spawn_server(host).await;

    let descriptor: Value = reqwest::get(format!("{base}/addon/descriptor"))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");

    assert_eq!(
        descriptor["capabilities"]["installable"]["callbackUrl"],
        "https://bridge.example.com/addon/installable"
    );
    assert_eq!(
        descriptor["capabilities"]["webhook"][0]["event"],
        "room_message"
    );
    assert_eq!(
        descriptor["capabilities"]["glance"][0]["queryUrl"],
        "https://bridge.example.com/glance/recent-events"
    );
}

#[tokio::test]
async fn integration_install_with_valid_capabilities_creates_tenant() {
    let chat = MockServer::start();
    mock_chat_service(&chat);
    let capabilities = capabilities_body(&chat);
    chat.mock(|when, then| {
        when.method(GET).path("/capabilities");
        then.status(200).json_body(capabilities);
    });

    let host = Arc::new(InMemoryHostDirectory::new());
    let (base, state) = spawn_server(host).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/addon/installable"))
        .json(&json!({
            "oauthId": "t1",
            "oauthSecret": "s1",
            "capabilitiesUrl": chat.url("/capabilities"),
            "roomId": 42,
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 201);

    let tenant = state.store.tenant("t1").expect("tenant installed");
    assert_eq!(tenant.room_id, "42");
    assert_eq!(tenant.token_url, chat.url("/oauth/token"));
    assert_eq!(tenant.api_base_url, chat.base_url());
    // Room metadata was fetched best-effort during install.
    assert_eq!(tenant.room_name.as_deref(), Some("Ops"));
    assert_eq!(tenant.room_owner_name.as_deref(), Some("Dana"));
}

#[tokio::test]
async fn integration_install_without_room_id_is_rejected() {
    let host = Arc::new(InMemoryHostDirectory::new());
    let (base, state) = spawn_server(host).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/addon/installable"))
        .json(&json!({
            "oauthId": "t1",
            "oauthSecret": "s1",
            "capabilitiesUrl": "https://chat.example.com/capabilities",
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);
    assert!(state.store.tenant("t1").is_none());
}

#[tokio::test]
async fn integration_install_with_mismatched_capabilities_url_is_rejected() {
    let chat = MockServer::start();
    let mut capabilities = capabilities_body(&chat);
    capabilities["links"]["self"] = json!("https://elsewhere.example.com/capabilities");
    chat.mock(|when, then| {
        when.method(GET).path("/capabilities");
        then.status(200).json_body(capabilities);
    });

    let host = Arc::new(InMemoryHostDirectory::new());
    let (base, state) = spawn_server(host).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/addon/installable"))
        .json(&json!({
            "oauthId": "t1",
            "oauthSecret": "s1",
            "capabilitiesUrl": chat.url("/capabilities"),
            "roomId": "42",
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);
    assert!(state.store.tenant("t1").is_none());
}

#[tokio::test]
async fn integration_uninstall_missing_tenant_reports_success() {
    let host = Arc::new(InMemoryHostDirectory::new());
    let (base, _state) = spawn_server(host).await;

    let response = reqwest::Client::new()
        .delete(format!("{base}/addon/installable/never-installed"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn integration_glance_requires_signed_request() {
    let chat = MockServer::start();
    let host = Arc::new(InMemoryHostDirectory::new());
    let (base, state) = spawn_server(host).await;
    let tenant = chat_tenant(&chat, "t1");
    state.store.upsert_tenant(tenant.clone());

    let unauthorized = reqwest::get(format!("{base}/glance/recent-events"))
        .await
        .expect("request");
    assert_eq!(unauthorized.status(), 400);

    let token = tenant.sign_token(Some("u1"), None).expect("token");
    let response = reqwest::get(format!(
        "{base}/glance/recent-events?signed_request={token}"
    ))
    .await
    .expect("request");
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("x-frame-options")
            .and_then(|value| value.to_str().ok()),
        Some("allow")
    );
    assert!(response.headers().contains_key("access-control-allow-origin"));
    let glance: Value = response.json().await.expect("json");
    assert_eq!(glance["label"]["value"], "<b>0</b> Recent Events");
}

#[tokio::test]
async fn integration_link_message_webhook_renders_card_and_records_mention() {
    let chat = MockServer::start();
    mock_chat_service(&chat);
    let notification_mock = chat.mock(|when, then| {
        when.method(POST).path("/room/42/notification");
        then.status(204);
    });
    let glance_mock = chat.mock(|when, then| {
        when.method(POST).path("/addon/ui/room/42");
        then.status(204);
    });

    let host = Arc::new(InMemoryHostDirectory::new());
    seed_monitor(&host);
    let (base, state) = spawn_server(host).await;
    let mut tenant = chat_tenant(&chat, "t1");
    tenant.project_ids = vec!["p1".to_string()];
    state.store.upsert_tenant(tenant.clone());

    let token = tenant.sign_token(Some("u1"), None).expect("token");
    let response = reqwest::Client::new()
        .post(format!(
            "{base}/webhook/link-message?signed_request={token}"
        ))
        .json(&json!({
            "item": {
                "message": {
                    "from": { "id": "u1", "name": "Dana" },
                    "message": format!(
                        "have a look at {MONITOR_BASE_URL}/acme/web/group/g1/events/e1/ please"
                    ),
                },
            },
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 204);

    notification_mock.assert_calls(1);
    glance_mock.assert_calls(1);
    let recent = state.mentions().recent("t1");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].record.group_id, "g1");
    assert_eq!(recent[0].record.event_id.as_deref(), Some("e1"));
}

#[tokio::test]
async fn integration_link_message_without_event_link_is_a_no_op() {
    let chat = MockServer::start();
    mock_chat_service(&chat);
    let notification_mock = chat.mock(|when, then| {
        when.method(POST).path("/room/42/notification");
        then.status(204);
    });

    let host = Arc::new(InMemoryHostDirectory::new());
    seed_monitor(&host);
    let (base, state) = spawn_server(host).await;
    let tenant = chat_tenant(&chat, "t1");
    state.store.upsert_tenant(tenant.clone());

    let token = tenant.sign_token(Some("u1"), None).expect("token");
    let response = reqwest::Client::new()
        .post(format!(
            "{base}/webhook/link-message?signed_request={token}"
        ))
        .json(&json!({
            "item": {
                "message": {
                    "from": { "id": "u1" },
                    "message": "no links here",
                },
            },
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 204);
    notification_mock.assert_calls(0);
    assert_eq!(state.mentions().count("t1"), 0);
}

#[tokio::test]
async fn integration_configure_grant_then_project_selection_flow() {
    let chat = MockServer::start();
    mock_chat_service(&chat);
    let notification_mock = chat.mock(|when, then| {
        when.method(POST).path("/room/42/notification");
        then.status(204);
    });
    chat.mock(|when, then| {
        when.method(POST).path("/addon/ui/room/42");
        then.status(204);
    });

    let host = Arc::new(InMemoryHostDirectory::new());
    seed_monitor(&host);
    host.insert_user(
        iris_host::HostUser {
            id: "u1".to_string(),
            name: "Dana".to_string(),
            email: "dana@example.com".to_string(),
        },
        &["o1".to_string()],
    );
    let (base, state) = spawn_server(host).await;
    let tenant = chat_tenant(&chat, "t1");
    state.store.upsert_tenant(tenant.clone());
    let token = tenant.sign_token(Some("u1"), None).expect("token");
    let client = reqwest::Client::new();

    // Phase 1: the configuration state asks for a grant.
    let configure: Value = client
        .get(format!("{base}/configure?signed_request={token}"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(configure["phase"], "grant");

    let response = client
        .post(format!("{base}/configure/grant?signed_request={token}"))
        .json(&json!({ "user_id": "u1", "organization_ids": ["o1"] }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 200);
    let granted = state.store.tenant("t1").expect("tenant");
    assert_eq!(granted.auth_user_id.as_deref(), Some("u1"));
    assert_eq!(granted.organization_ids, vec!["o1".to_string()]);
    notification_mock.assert_calls(1);

    // Phase 2: project selection enables the subscription.
    let configure: Value = client
        .get(format!("{base}/configure?signed_request={token}"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(configure["phase"], "projects");
    assert_eq!(configure["projects"][0]["id"], "p1");
    assert_eq!(configure["projects"][0]["selected"], false);

    let selection: Value = client
        .post(format!(
            "{base}/configure/projects?signed_request={token}"
        ))
        .json(&json!({ "project_ids": ["p1"] }))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(selection["new_project_ids"][0], "p1");
    assert!(state.lifecycle.plugin_enabled("p1"));
    assert_eq!(
        state.store.tenant("t1").expect("tenant").project_ids,
        vec!["p1".to_string()]
    );
    notification_mock.assert_calls(2);

    // Deselecting everything disables the subscription again.
    let selection: Value = client
        .post(format!(
            "{base}/configure/projects?signed_request={token}"
        ))
        .json(&json!({ "project_ids": [] }))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(selection["removed_project_ids"][0], "p1");
    assert!(!state.lifecycle.plugin_enabled("p1"));
    notification_mock.assert_calls(3);
}

#[tokio::test]
async fn integration_configure_rejects_project_outside_granted_orgs() {
    let chat = MockServer::start();
    let host = Arc::new(InMemoryHostDirectory::new());
    seed_monitor(&host);
    let (base, state) = spawn_server(host).await;
    let mut tenant = chat_tenant(&chat, "t1");
    tenant.auth_user_id = Some("u1".to_string());
    tenant.organization_ids = vec!["o1".to_string()];
    state.store.upsert_tenant(tenant.clone());
    let token = tenant.sign_token(Some("u1"), None).expect("token");

    let response = reqwest::Client::new()
        .post(format!(
            "{base}/configure/projects?signed_request={token}"
        ))
        .json(&json!({ "project_ids": ["p1", "p-foreign"] }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 422);
    // No partial save.
    assert!(state
        .store
        .tenant("t1")
        .expect("tenant")
        .project_ids
        .is_empty());
}

#[tokio::test]
async fn integration_configure_grant_requires_accessible_organizations() {
    let chat = MockServer::start();
    let host = Arc::new(InMemoryHostDirectory::new());
    seed_monitor(&host);
    host.insert_user(
        iris_host::HostUser {
            id: "u1".to_string(),
            name: "Dana".to_string(),
            email: "dana@example.com".to_string(),
        },
        &[],
    );
    let (base, state) = spawn_server(host).await;
    let tenant = chat_tenant(&chat, "t1");
    state.store.upsert_tenant(tenant.clone());
    let token = tenant.sign_token(Some("u1"), None).expect("token");

    let response = reqwest::Client::new()
        .post(format!("{base}/configure/grant?signed_request={token}"))
        .json(&json!({ "user_id": "u1", "organization_ids": ["o1"] }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 422);
    assert!(state.store.tenant("t1").expect("tenant").auth_user_id.is_none());
}

#[tokio::test]
async fn integration_sign_out_clears_grant_and_notifies() {
    let chat = MockServer::start();
    mock_chat_service(&chat);
    let notification_mock = chat.mock(|when, then| {
        when.method(POST).path("/room/42/notification");
        then.status(204);
    });
    chat.mock(|when, then| {
        when.method(POST).path("/addon/ui/room/42");
        then.status(204);
    });

    let host = Arc::new(InMemoryHostDirectory::new());
    let (base, state) = spawn_server(host).await;
    let mut tenant = chat_tenant(&chat, "t1");
    tenant.auth_user_id = Some("u1".to_string());
    tenant.organization_ids = vec!["o1".to_string()];
    tenant.project_ids = vec!["p1".to_string()];
    state.store.upsert_tenant(tenant.clone());
    let token = tenant.sign_token(Some("u1"), None).expect("token");

    let response = reqwest::Client::new()
        .post(format!("{base}/sign-out?signed_request={token}"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 204);

    let cleared = state.store.tenant("t1").expect("tenant survives sign-out");
    assert!(cleared.auth_user_id.is_none());
    assert!(cleared.organization_ids.is_empty());
    assert!(cleared.project_ids.is_empty());
    notification_mock.assert_calls(1);
}
