//! Pure rendering of monitoring events into chat notification payloads.
//!
//! Nothing here performs I/O. Every user-controlled string interpolated
//! into HTML is escaped; only markup authored by this module is emitted
//! raw.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use iris_core::escape_html;
use iris_host::{Event, Group, Project};

pub const ICON_URL: &str = "https://iris-bridge.dev/static/iris-icon.png";
pub const ICON_2X_URL: &str = "https://iris-bridge.dev/static/iris-icon@2x.png";
pub const ICON_SMALL_URL: &str = "https://iris-bridge.dev/static/favicon.ico";

/// Host tag keys carrying this prefix have it stripped before display.
pub const RESERVED_TAG_PREFIX: &str = "host:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationColor {
    Red,
    Yellow,
    Green,
    Purple,
}

impl NotificationColor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Purple => "purple",
        }
    }
}

/// Maps a host severity label to a room notification color. Unknown
/// severities fall back to purple.
pub fn severity_color(level_label: &str) -> NotificationColor {
    match level_label {
        "ALERT" | "ERROR" => NotificationColor::Red,
        "WARNING" => NotificationColor::Yellow,
        "INFO" => NotificationColor::Green,
        _ => NotificationColor::Purple,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Ephemeral wire payload for `room/{id}/notification`.
pub struct NotificationPayload {
    pub message: String,
    pub format: String,
    pub notify: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<NotificationColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<Value>,
}

/// Renders the full event notification: legacy HTML line plus structured
/// card with tag attributes and activity markup.
pub fn make_event_notification(
    group: &Group,
    event: &Event,
    project: &Project,
    new: bool,
    event_target: bool,
) -> NotificationPayload {
    let level = group.level.as_label();
    let link = if event_target {
        format!("{}/events/{}/", group.url.trim_end_matches('/'), event.id)
    } else {
        group.url.clone()
    };
    let color = severity_color(level);

    let title = format!(
        "{}{} Event",
        if new { "New " } else { "" },
        group.level.as_title()
    );

    // Legacy flat message for clients without card support.
    let message = format!(
        "[{level}]<strong>{project_name}</strong> {message} [<a href=\"{link}\">view</a>]",
        level = escape_html(level),
        project_name = escape_html(&project.name),
        message = escape_html(event.error()),
        link = escape_html(&link),
    );

    let attributes: Vec<Value> = event
        .tags
        .iter()
        .map(|(key, value)| tag_attribute(key, value))
        .collect();

    let description = format!(
        "{} in the event stream. Event has been seen {} time{}. First seen {}{}.",
        group.level.as_title(),
        group.times_seen,
        if group.times_seen == 1 { "" } else { "s" },
        group.first_seen,
        group
            .first_release
            .as_deref()
            .map(|release| format!(" ({release})"))
            .unwrap_or_default(),
    );

    let activity_html = format!(
        concat!(
            "<p><a href=\"{link}\">",
            "<img src=\"{icon_sm}\" style=\"width: 16px; height: 16px\">",
            "<strong>{title}</strong></a>",
            "<p><a href=\"{link}\"><em>{err}</em></a>",
            "<p><strong>Project:</strong> ",
            "<a href=\"{project_link}\">{project}</a>&nbsp;",
            "<strong>Culprit:</strong> {culprit}",
        ),
        link = escape_html(&link),
        icon_sm = ICON_SMALL_URL,
        title = escape_html(&title),
        err = escape_html(event.error()),
        project = escape_html(&project.name),
        project_link = escape_html(&project.url),
        culprit = escape_html(&event.culprit),
    );

    let card = json!({
        "style": "application",
        "url": link,
        "id": format!("iris/{}", event.id),
        "title": event.error(),
        "description": description,
        "images": {},
        "icon": {
            "url": ICON_URL,
            "url@2x": ICON_2X_URL,
        },
        "metadata": {
            "event": event.id,
            "iris_message_type": "event",
        },
        "attributes": attributes,
        "activity": {
            "html": activity_html,
        },
    });

    NotificationPayload {
        message,
        format: "html".to_string(),
        notify: true,
        color: Some(color),
        card: Some(card),
    }
}

/// Builds one card attribute from a host tag, stripping the reserved
/// namespace prefix and decorating well-known tags.
fn tag_attribute(key: &str, value: &str) -> Value {
    let label = key.strip_prefix(RESERVED_TAG_PREFIX).unwrap_or(key);
    let mut attribute = json!({
        "label": label,
        "value": { "label": value },
    });
    let style = if label == "level" {
        match value.to_ascii_lowercase().as_str() {
            "critical" | "fatal" | "error" => Some("lozenge-error"),
            "warning" => Some("lozenge-current"),
            "debug" => Some("lozenge-moved"),
            _ => None,
        }
    } else if label == "release" {
        Some("lozenge-success")
    } else {
        None
    };
    if let Some(style) = style {
        attribute["value"]["style"] = Value::String(style.to_string());
    }
    attribute
}

/// Short non-alerting status line for subscription changes in a room.
pub fn make_subscription_update_notification(
    new: &[Project],
    removed: &[Project],
) -> NotificationPayload {
    let mut bits = vec!["The project subscriptions for this room were updated.".to_string()];

    let bold = |project: &Project| format!("<strong>{}</strong>", escape_html(&project.name));

    if !new.is_empty() {
        let names: Vec<String> = new.iter().map(bold).collect();
        if names.len() == 1 {
            bits.push(format!("New project: {}.", names[0]));
        } else {
            bits.push(format!("New projects: {}.", names.join(", ")));
        }
    }
    if !removed.is_empty() {
        let names: Vec<String> = removed.iter().map(bold).collect();
        if names.len() == 1 {
            bits.push(format!("Removed project: {}", names[0]));
        } else {
            bits.push(format!("Removed projects: {}", names.join(", ")));
        }
    }

    NotificationPayload {
        message: bits.join(" ").trim().to_string(),
        format: "html".to_string(),
        notify: false,
        color: Some(NotificationColor::Green),
        card: None,
    }
}

/// Wraps arbitrary text, escaped, with a caller-chosen color and alert flag.
pub fn make_generic_notification(
    text: &str,
    color: Option<NotificationColor>,
    notify: bool,
) -> NotificationPayload {
    NotificationPayload {
        message: escape_html(text),
        format: "html".to_string(),
        notify,
        color,
        card: None,
    }
}
