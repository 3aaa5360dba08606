//! Install/uninstall lifecycle for tenants and their project associations.
//!
//! The host plugin keeps a per-project "active tenants" option list plus an
//! enabled flag; both live in the explicit plugin option store. Ordering
//! invariant on delete: every project association is disabled before the
//! tenant record itself disappears, so per-project configuration never
//! dangles a reference to a removed tenant.

use serde_json::Value;

use crate::bridge_store::{BridgeState, BridgeStore};
use crate::tenant_model::Tenant;
use crate::token_cache::TokenCache;

/// Plugin key under which Iris stores its per-project options.
pub const PLUGIN_KEY: &str = "iris";

const ACTIVE_TENANTS_OPTION: &str = "tenants";
const ENABLED_OPTION: &str = "enabled";

#[derive(Clone)]
pub struct TenantLifecycle {
    store: BridgeStore,
    tokens: TokenCache,
}

impl TenantLifecycle {
    pub fn new(store: BridgeStore, tokens: TokenCache) -> Self {
        Self { store, tokens }
    }

    pub fn store(&self) -> &BridgeStore {
        &self.store
    }

    /// Associates the project with the tenant and marks the plugin enabled
    /// for that project. Idempotent; returns whether a change occurred.
    pub fn enable(&self, project_id: &str, tenant_id: &str) -> bool {
        self.store
            .transaction(|state| enable_in_state(state, project_id, tenant_id))
    }

    /// Removes the association. When the last active tenant for a project
    /// goes away, the plugin itself flips to disabled for that project.
    /// Idempotent; returns whether a change occurred.
    pub fn disable(&self, project_id: &str, tenant_id: &str) -> bool {
        self.store
            .transaction(|state| disable_in_state(state, project_id, tenant_id))
    }

    /// Deletes the tenant: disables every associated project, purges its
    /// mention records, then removes the record, all in one transaction.
    /// A missing tenant is treated as success.
    pub fn delete(&self, tenant_id: &str) -> Option<Tenant> {
        let removed = self.store.transaction(|state| {
            let project_ids = state.tenant(tenant_id)?.project_ids.clone();
            for project_id in &project_ids {
                disable_in_state(state, project_id, tenant_id);
            }
            state
                .mentions_mut()
                .retain(|record| record.tenant_id != tenant_id);
            state.remove_tenant(tenant_id)
        });
        self.tokens.purge_tenant(tenant_id);
        removed
    }

    /// Soft reset on sign-out: drops the auth user, granted organizations,
    /// mention records, and project associations, keeping the install.
    pub fn clear(&self, tenant_id: &str) {
        self.store.transaction(|state| {
            let Some(tenant) = state.tenant(tenant_id) else {
                return;
            };
            for project_id in tenant.project_ids.clone() {
                disable_in_state(state, &project_id, tenant_id);
            }
            state
                .mentions_mut()
                .retain(|record| record.tenant_id != tenant_id);
            if let Some(tenant) = state.tenant_mut(tenant_id) {
                tenant.auth_user_id = None;
                tenant.organization_ids.clear();
            }
        });
    }

    /// Whether the plugin is currently enabled for the project.
    pub fn plugin_enabled(&self, project_id: &str) -> bool {
        self.store.transaction(|state| {
            state
                .plugin_option(PLUGIN_KEY, project_id, ENABLED_OPTION)
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
    }

    /// Active tenant ids recorded for the project, sorted.
    pub fn active_tenants(&self, project_id: &str) -> Vec<String> {
        self.store
            .transaction(|state| active_tenants_in_state(state, project_id))
    }
}

fn active_tenants_in_state(state: &BridgeState, project_id: &str) -> Vec<String> {
    state
        .plugin_option(PLUGIN_KEY, project_id, ACTIVE_TENANTS_OPTION)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn enable_in_state(state: &mut BridgeState, project_id: &str, tenant_id: &str) -> bool {
    state.set_plugin_option(PLUGIN_KEY, project_id, ENABLED_OPTION, Value::Bool(true));

    let mut active = active_tenants_in_state(state, project_id);
    let mut changed = false;
    if !active.iter().any(|id| id == tenant_id) {
        if let Some(tenant) = state.tenant_mut(tenant_id) {
            if !tenant.project_ids.iter().any(|id| id == project_id) {
                tenant.project_ids.push(project_id.to_string());
            }
            active.push(tenant_id.to_string());
            changed = true;
        }
    }
    active.sort_unstable();
    state.set_plugin_option(
        PLUGIN_KEY,
        project_id,
        ACTIVE_TENANTS_OPTION,
        Value::from(active),
    );
    changed
}

fn disable_in_state(state: &mut BridgeState, project_id: &str, tenant_id: &str) -> bool {
    let mut active = active_tenants_in_state(state, project_id);
    let mut changed = false;
    if let Some(position) = active.iter().position(|id| id == tenant_id) {
        active.remove(position);
        if let Some(tenant) = state.tenant_mut(tenant_id) {
            tenant.project_ids.retain(|id| id != project_id);
        }
        changed = true;
    }
    let last_tenant_gone = active.is_empty();
    active.sort_unstable();
    state.set_plugin_option(
        PLUGIN_KEY,
        project_id,
        ACTIVE_TENANTS_OPTION,
        Value::from(active),
    );
    if last_tenant_gone {
        state.set_plugin_option(PLUGIN_KEY, project_id, ENABLED_OPTION, Value::Bool(false));
    }
    changed
}
