//! Add-on descriptor document served to the chat service.

use serde_json::{json, Value};

use iris_bridge::{ICON_2X_URL, ICON_URL, RECENT_EVENTS_GLANCE_KEY};

pub const ADDON_KEY: &str = "dev.iris-bridge.chat-addon";
pub const ADDON_NAME: &str = "Iris";

/// Link pattern the chat service matches room messages against before
/// invoking the link-message webhook.
pub fn link_message_pattern(host_base_url: &str) -> String {
    format!(
        "{}/(?P<org>[^/]+)/(?P<proj>[^/]+)/group/(?P<group>[^/]+)(/events/(?P<event>[^/]+)|/?)",
        regex::escape(host_base_url)
    )
}

/// Builds the capability descriptor advertised at `/addon/descriptor`.
pub fn build_descriptor(base_url: &str, host_base_url: &str) -> Value {
    json!({
        "key": ADDON_KEY,
        "name": ADDON_NAME,
        "description": "Error-tracking notifications for chat rooms.",
        "links": {
            "self": format!("{base_url}/addon/descriptor"),
        },
        "icon": {
            "url": ICON_URL,
        },
        "capabilities": {
            "installable": {
                "allowRoom": true,
                "allowGlobal": false,
                "callbackUrl": format!("{base_url}/addon/installable"),
            },
            "chatApiConsumer": {
                "scopes": ["send_notification", "view_room"],
            },
            "configurable": {
                "url": format!("{base_url}/configure"),
            },
            "webhook": [
                {
                    "event": "room_message",
                    "url": format!("{base_url}/webhook/link-message"),
                    "pattern": link_message_pattern(host_base_url),
                    "authentication": "jwt",
                },
            ],
            "webPanel": [
                {
                    "key": "iris.sidebar.recent-events",
                    "name": { "value": "Recent Events" },
                    "location": "chat.sidebar.right",
                    "url": format!("{base_url}/recent-events"),
                },
            ],
            "action": [
                {
                    "key": "message.iris.event-details",
                    "name": { "value": "Show details" },
                    "target": RECENT_EVENTS_GLANCE_KEY,
                    "location": "chat.message.action",
                    "conditions": [
                        {
                            "condition": "card_matches",
                            "params": {
                                "metadata": [
                                    { "attr": "iris_message_type", "eq": "event" },
                                ],
                            },
                        },
                    ],
                },
            ],
            "glance": [
                {
                    "name": { "value": ADDON_NAME },
                    "queryUrl": format!("{base_url}/glance/recent-events"),
                    "key": RECENT_EVENTS_GLANCE_KEY,
                    "target": "iris.sidebar.recent-events",
                    "icon": {
                        "url": ICON_URL,
                        "url@2x": ICON_2X_URL,
                    },
                    "conditions": [],
                },
            ],
        },
        "vendor": {
            "url": "https://iris-bridge.dev/",
            "name": ADDON_NAME,
        },
    })
}
