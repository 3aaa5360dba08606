//! In-process record store backing tenants, mentions, and plugin options.
//!
//! The host database is an external collaborator; Iris only needs an opaque
//! record store with atomic logical operations. All state lives behind one
//! lock, so every [`BridgeStore::transaction`] observes and applies a
//! consistent snapshot. "Delete tenant and all its associations" therefore
//! never partially applies.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::mention_log::MentionRecord;
use crate::tenant_model::Tenant;

#[derive(Debug, Default)]
/// Mutable store contents, visible only inside a transaction.
pub struct BridgeState {
    tenants: BTreeMap<String, Tenant>,
    mentions: Vec<MentionRecord>,
    /// Key-value configuration scoped by (plugin, project).
    plugin_options: BTreeMap<String, Value>,
}

impl BridgeState {
    pub fn tenant(&self, tenant_id: &str) -> Option<&Tenant> {
        self.tenants.get(tenant_id)
    }

    pub fn tenant_mut(&mut self, tenant_id: &str) -> Option<&mut Tenant> {
        self.tenants.get_mut(tenant_id)
    }

    pub fn upsert_tenant(&mut self, tenant: Tenant) {
        self.tenants.insert(tenant.id.clone(), tenant);
    }

    pub fn remove_tenant(&mut self, tenant_id: &str) -> Option<Tenant> {
        self.tenants.remove(tenant_id)
    }

    pub fn tenants_for_project(&self, project_id: &str) -> Vec<Tenant> {
        self.tenants
            .values()
            .filter(|tenant| tenant.project_ids.iter().any(|id| id == project_id))
            .cloned()
            .collect()
    }

    pub fn mentions(&self) -> &[MentionRecord] {
        &self.mentions
    }

    pub fn mentions_mut(&mut self) -> &mut Vec<MentionRecord> {
        &mut self.mentions
    }

    pub fn plugin_option(&self, plugin: &str, project_id: &str, key: &str) -> Option<&Value> {
        self.plugin_options
            .get(&plugin_option_key(plugin, project_id, key))
    }

    pub fn set_plugin_option(&mut self, plugin: &str, project_id: &str, key: &str, value: Value) {
        self.plugin_options
            .insert(plugin_option_key(plugin, project_id, key), value);
    }
}

fn plugin_option_key(plugin: &str, project_id: &str, key: &str) -> String {
    format!("{plugin}\u{1f}{project_id}\u{1f}{key}")
}

#[derive(Clone, Default)]
/// Shared handle to the bridge record store.
pub struct BridgeStore {
    state: Arc<Mutex<BridgeState>>,
}

impl BridgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the store under its single lock. One call is one
    /// atomic logical operation.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut BridgeState) -> R) -> R {
        let mut state = self.state.lock().expect("bridge store lock poisoned");
        f(&mut state)
    }

    pub fn tenant(&self, tenant_id: &str) -> Option<Tenant> {
        self.transaction(|state| state.tenant(tenant_id).cloned())
    }

    pub fn upsert_tenant(&self, tenant: Tenant) {
        self.transaction(|state| state.upsert_tenant(tenant))
    }

    pub fn tenants_for_project(&self, project_id: &str) -> Vec<Tenant> {
        self.transaction(|state| state.tenants_for_project(project_id))
    }
}
