//! Host directory fixture loading.
//!
//! Deployments without a live host feed can seed the in-memory directory
//! from a JSON file describing organizations, projects, groups, events,
//! and users with their organization memberships.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use iris_host::{Event, Group, HostUser, InMemoryHostDirectory, Organization, Project};

#[derive(Debug, Default, Deserialize)]
pub struct HostFixtures {
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub users: Vec<UserFixture>,
}

#[derive(Debug, Deserialize)]
pub struct UserFixture {
    #[serde(flatten)]
    pub user: HostUser,
    #[serde(default)]
    pub organization_ids: Vec<String>,
}

pub fn load_host_fixtures(path: &Path) -> Result<InMemoryHostDirectory> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read host fixtures at {}", path.display()))?;
    let fixtures: HostFixtures = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse host fixtures at {}", path.display()))?;

    let directory = InMemoryHostDirectory::new();
    for organization in fixtures.organizations {
        directory.insert_organization(organization);
    }
    for project in fixtures.projects {
        directory.insert_project(project);
    }
    for group in fixtures.groups {
        directory.insert_group(group);
    }
    for event in fixtures.events {
        directory.insert_event(event);
    }
    for fixture in fixtures.users {
        directory.insert_user(fixture.user, &fixture.organization_ids);
    }
    Ok(directory)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use iris_host::HostDirectory;

    use super::*;

    #[test]
    fn fixtures_round_trip_through_the_directory() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{
                "organizations": [{{"id": "o1", "slug": "acme", "name": "Acme"}}],
                "projects": [{{
                    "id": "p1", "organization_id": "o1", "slug": "web",
                    "name": "Acme Web", "url": "https://monitor.example.com/acme/web/"
                }}],
                "users": [{{
                    "id": "u1", "name": "Dana", "email": "dana@example.com",
                    "organization_ids": ["o1"]
                }}]
            }}"#
        )
        .expect("write fixtures");

        let directory = load_host_fixtures(file.path()).expect("load");
        assert_eq!(directory.project("p1").expect("project").slug, "web");
        let organizations = directory.organizations_for_user("u1");
        assert_eq!(organizations.len(), 1);
        assert_eq!(organizations[0].id, "o1");
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{}}").expect("write fixtures");
        let directory = load_host_fixtures(file.path()).expect("load");
        assert!(directory.project("p1").is_none());
    }
}
