//! Read-only view of the host monitoring platform for Iris.
//!
//! Defines the project/group/event/user records the bridge consumes plus the
//! `HostDirectory` lookup seam with an in-memory implementation.

pub mod host_directory;
pub mod host_models;

pub use host_directory::{HostDirectory, InMemoryHostDirectory};
pub use host_models::{Event, Group, HostUser, Organization, Project, Severity};

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(id: &str, group_id: &str) -> Event {
        Event {
            id: id.to_string(),
            group_id: group_id.to_string(),
            project_id: "p1".to_string(),
            message: "NullPointerException".to_string(),
            culprit: "app.views.checkout".to_string(),
            tags: vec![("level".to_string(), "error".to_string())],
        }
    }

    #[test]
    fn latest_event_tracks_insertion_order() {
        let directory = InMemoryHostDirectory::new();
        directory.insert_event(sample_event("e1", "g1"));
        directory.insert_event(sample_event("e2", "g1"));
        let latest = directory.latest_event_for_group("g1").expect("latest");
        assert_eq!(latest.id, "e2");
        assert!(directory.latest_event_for_group("g2").is_none());
    }

    #[test]
    fn organizations_resolve_through_user_membership() {
        let directory = InMemoryHostDirectory::new();
        directory.insert_organization(Organization {
            id: "o1".to_string(),
            slug: "acme".to_string(),
            name: "Acme".to_string(),
        });
        directory.insert_user(
            HostUser {
                id: "u1".to_string(),
                name: "Dana".to_string(),
                email: "dana@example.com".to_string(),
            },
            &["o1".to_string(), "o-missing".to_string()],
        );
        let organizations = directory.organizations_for_user("u1");
        assert_eq!(organizations.len(), 1);
        assert_eq!(organizations[0].slug, "acme");
    }

    #[test]
    fn severity_labels_match_host_format() {
        assert_eq!(Severity::Alert.as_label(), "ALERT");
        assert_eq!(Severity::Debug.as_title(), "Debug");
    }
}
