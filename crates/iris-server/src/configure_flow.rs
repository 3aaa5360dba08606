//! Two-phase room configuration: grant organizational access first, then
//! select the projects whose events should be forwarded to the room.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use iris_bridge::{
    make_generic_notification, make_subscription_update_notification, NotificationColor,
    RequestContext,
};
use iris_host::Project;

use crate::bridge_server::{bridge_error_response, BridgeServerState};

fn validation_error(message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": message })),
    )
        .into_response()
}

/// Projects selectable by the tenant: every project of every granted
/// organization, sorted by display label.
fn selectable_projects(state: &BridgeServerState, organization_ids: &[String]) -> Vec<Project> {
    let mut projects: Vec<Project> = organization_ids
        .iter()
        .flat_map(|organization_id| state.host.projects_for_organization(organization_id))
        .collect();
    projects.sort_by_key(|project| project.name.to_lowercase());
    projects
}

pub async fn handle_configure_state(
    State(state): State<Arc<BridgeServerState>>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let context = match state.resolve_context(&query, &headers, None) {
        Ok(context) => context,
        Err(error) => return bridge_error_response(error),
    };
    let tenant = &context.tenant;

    let phase = if tenant.auth_user_id.is_none() {
        "grant"
    } else {
        "projects"
    };
    let organizations: Vec<Value> = tenant
        .organization_ids
        .iter()
        .filter_map(|organization_id| state.host.organization(organization_id))
        .map(|organization| json!({ "id": organization.id, "name": organization.name }))
        .collect();
    let projects: Vec<Value> = selectable_projects(&state, &tenant.organization_ids)
        .into_iter()
        .map(|project| {
            json!({
                "id": project.id,
                "name": project.name,
                "organization_id": project.organization_id,
                "selected": tenant.project_ids.contains(&project.id),
            })
        })
        .collect();

    Json(json!({
        "phase": phase,
        "tenant": {
            "id": tenant.id,
            "room_id": tenant.room_id,
            "room_name": tenant.room_name,
        },
        "organizations": organizations,
        "projects": projects,
    }))
    .into_response()
}

pub async fn handle_configure_grant(
    State(state): State<Arc<BridgeServerState>>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let context = match state.resolve_context(&query, &headers, Some(&body)) {
        Ok(context) => context,
        Err(error) => return bridge_error_response(error),
    };

    let Some(user_id) = body.get("user_id").and_then(Value::as_str) else {
        return validation_error("A user id is required to grant access.");
    };
    if state.host.user(user_id).is_none() {
        return validation_error("Unknown user.");
    }
    let requested: Vec<String> = body
        .get("organization_ids")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if requested.is_empty() {
        return validation_error("You need to select at least one organization to give access to.");
    }
    let accessible = state.host.organizations_for_user(user_id);
    for organization_id in &requested {
        if !accessible
            .iter()
            .any(|organization| organization.id == *organization_id)
        {
            return validation_error("Selected organization is not accessible to this user.");
        }
    }

    let mut granted = requested;
    granted.sort();
    granted.dedup();
    let tenant_id = context.tenant.id.clone();
    state.store.transaction(|bridge| {
        if let Some(tenant) = bridge.tenant_mut(&tenant_id) {
            tenant.auth_user_id = Some(user_id.to_string());
            tenant.organization_ids = granted.clone();
        }
    });

    notify_tenant_added(&state, &context).await;

    Json(json!({ "ok": true, "organization_ids": granted })).into_response()
}

pub async fn handle_configure_projects(
    State(state): State<Arc<BridgeServerState>>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let context = match state.resolve_context(&query, &headers, Some(&body)) {
        Ok(context) => context,
        Err(error) => return bridge_error_response(error),
    };
    let tenant = &context.tenant;
    if tenant.auth_user_id.is_none() {
        return validation_error("Organizational access has not been granted yet.");
    }

    let Some(values) = body.get("project_ids").and_then(Value::as_array) else {
        return validation_error("A list of project ids is required.");
    };
    let selected: Vec<String> = values
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if selected.len() != values.len() {
        return validation_error("Project ids must be strings.");
    }

    let selectable = selectable_projects(&state, &tenant.organization_ids);
    for project_id in &selected {
        if !selectable.iter().any(|project| project.id == *project_id) {
            // No partial save: reject the whole selection.
            return validation_error("Selected project is not part of a granted organization.");
        }
    }

    let mut new_projects: Vec<Project> = Vec::new();
    let mut removed_projects: Vec<Project> = Vec::new();
    for project in selectable {
        if selected.contains(&project.id) {
            if state.lifecycle.enable(&project.id, &tenant.id) {
                new_projects.push(project);
            }
        } else if state.lifecycle.disable(&project.id, &tenant.id) {
            removed_projects.push(project);
        }
    }

    if !new_projects.is_empty() || !removed_projects.is_empty() {
        let payload = make_subscription_update_notification(&new_projects, &removed_projects);
        context.send_notification(&payload).await;
        if !removed_projects.is_empty() {
            let removed_ids: Vec<String> = removed_projects
                .iter()
                .map(|project| project.id.clone())
                .collect();
            state.mentions().clear_projects(&tenant.id, &removed_ids);
        }
        state.pipeline.push_recent_events_glance(&context).await;
    }

    Json(json!({
        "ok": true,
        "new_project_ids": new_projects.iter().map(|project| project.id.clone()).collect::<Vec<_>>(),
        "removed_project_ids": removed_projects.iter().map(|project| project.id.clone()).collect::<Vec<_>>(),
    }))
    .into_response()
}

async fn notify_tenant_added(state: &BridgeServerState, context: &RequestContext) {
    let payload = make_generic_notification(
        "The Iris integration was associated with this room.",
        Some(NotificationColor::Green),
        false,
    );
    context.send_notification(&payload).await;
    state.pipeline.push_recent_events_glance(context).await;
}
