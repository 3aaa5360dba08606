//! Read-only data model of the host monitoring platform.
//!
//! Iris consumes these records to render notifications and resolve webhook
//! links; it never mutates host data.

use serde::{Deserialize, Serialize};

/// Severity level assigned to a group by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Alert,
    Error,
    Warning,
    Info,
    Debug,
}

impl Severity {
    /// Upper-case display label as the host platform reports it.
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Alert => "ALERT",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }

    /// Title-case variant used in card headlines ("Error", "Warning", ...).
    pub fn as_title(self) -> &'static str {
        match self {
            Self::Alert => "Alert",
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Info => "Info",
            Self::Debug => "Debug",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Host organization the installing user belongs to.
pub struct Organization {
    pub id: String,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Host project whose events can notify a room.
pub struct Project {
    pub id: String,
    pub organization_id: String,
    pub slug: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Host user who installed or configured the integration.
pub struct HostUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Aggregated error group tracked by the host platform.
pub struct Group {
    pub id: String,
    pub project_id: String,
    pub level: Severity,
    pub title: String,
    pub url: String,
    pub times_seen: u64,
    /// Date of first occurrence, `YYYY-MM-DD`.
    pub first_seen: String,
    #[serde(default)]
    pub first_release: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One concrete occurrence within a group.
pub struct Event {
    pub id: String,
    pub group_id: String,
    pub project_id: String,
    pub message: String,
    pub culprit: String,
    /// Tag key/value pairs in host order.
    pub tags: Vec<(String, String)>,
}

impl Event {
    /// Primary error string shown in notifications. Falls back to the
    /// culprit when the event carries no message.
    pub fn error(&self) -> &str {
        if self.message.is_empty() {
            &self.culprit
        } else {
            &self.message
        }
    }
}
