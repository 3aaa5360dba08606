//! Lookup seam into the host platform's record store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::host_models::{Event, Group, HostUser, Organization, Project};

/// Read-only directory of host records consumed by the bridge.
pub trait HostDirectory: Send + Sync {
    fn project(&self, project_id: &str) -> Option<Project>;
    fn group(&self, group_id: &str) -> Option<Group>;
    fn event(&self, event_id: &str) -> Option<Event>;
    /// Most recent event recorded for a group, if any.
    fn latest_event_for_group(&self, group_id: &str) -> Option<Event>;
    fn user(&self, user_id: &str) -> Option<HostUser>;
    fn organization(&self, organization_id: &str) -> Option<Organization>;
    fn organizations_for_user(&self, user_id: &str) -> Vec<Organization>;
    fn projects_for_organization(&self, organization_id: &str) -> Vec<Project>;
}

#[derive(Default)]
struct InMemoryHostState {
    projects: BTreeMap<String, Project>,
    groups: BTreeMap<String, Group>,
    events: BTreeMap<String, Event>,
    /// Insertion-ordered event ids per group; last entry is the latest.
    group_events: BTreeMap<String, Vec<String>>,
    users: BTreeMap<String, HostUser>,
    organizations: BTreeMap<String, Organization>,
    user_organizations: BTreeMap<String, Vec<String>>,
}

#[derive(Default)]
/// In-memory `HostDirectory` used by local deployments and tests.
pub struct InMemoryHostDirectory {
    state: Mutex<InMemoryHostState>,
}

impl InMemoryHostDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_organization(&self, organization: Organization) {
        let mut state = self.state.lock().expect("host directory lock poisoned");
        state
            .organizations
            .insert(organization.id.clone(), organization);
    }

    pub fn insert_project(&self, project: Project) {
        let mut state = self.state.lock().expect("host directory lock poisoned");
        state.projects.insert(project.id.clone(), project);
    }

    pub fn insert_group(&self, group: Group) {
        let mut state = self.state.lock().expect("host directory lock poisoned");
        state.groups.insert(group.id.clone(), group);
    }

    pub fn insert_event(&self, event: Event) {
        let mut state = self.state.lock().expect("host directory lock poisoned");
        state
            .group_events
            .entry(event.group_id.clone())
            .or_default()
            .push(event.id.clone());
        state.events.insert(event.id.clone(), event);
    }

    pub fn insert_user(&self, user: HostUser, organization_ids: &[String]) {
        let mut state = self.state.lock().expect("host directory lock poisoned");
        state
            .user_organizations
            .insert(user.id.clone(), organization_ids.to_vec());
        state.users.insert(user.id.clone(), user);
    }
}

impl HostDirectory for InMemoryHostDirectory {
    fn project(&self, project_id: &str) -> Option<Project> {
        let state = self.state.lock().expect("host directory lock poisoned");
        state.projects.get(project_id).cloned()
    }

    fn group(&self, group_id: &str) -> Option<Group> {
        let state = self.state.lock().expect("host directory lock poisoned");
        state.groups.get(group_id).cloned()
    }

    fn event(&self, event_id: &str) -> Option<Event> {
        let state = self.state.lock().expect("host directory lock poisoned");
        state.events.get(event_id).cloned()
    }

    fn latest_event_for_group(&self, group_id: &str) -> Option<Event> {
        let state = self.state.lock().expect("host directory lock poisoned");
        let event_id = state.group_events.get(group_id)?.last()?;
        state.events.get(event_id).cloned()
    }

    fn user(&self, user_id: &str) -> Option<HostUser> {
        let state = self.state.lock().expect("host directory lock poisoned");
        state.users.get(user_id).cloned()
    }

    fn organization(&self, organization_id: &str) -> Option<Organization> {
        let state = self.state.lock().expect("host directory lock poisoned");
        state.organizations.get(organization_id).cloned()
    }

    fn organizations_for_user(&self, user_id: &str) -> Vec<Organization> {
        let state = self.state.lock().expect("host directory lock poisoned");
        let Some(organization_ids) = state.user_organizations.get(user_id) else {
            return Vec::new();
        };
        organization_ids
            .iter()
            .filter_map(|id| state.organizations.get(id).cloned())
            .collect()
    }

    fn projects_for_organization(&self, organization_id: &str) -> Vec<Project> {
        let state = self.state.lock().expect("host directory lock poisoned");
        state
            .projects
            .values()
            .filter(|project| project.organization_id == organization_id)
            .cloned()
            .collect()
    }
}
