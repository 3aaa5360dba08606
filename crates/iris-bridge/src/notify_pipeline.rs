//! Fan-out from host events to every tenant subscribed to the project.
//!
//! Runs inside the host's event-processing path, so delivery failures are
//! logged by the notifier and never propagate back.

use std::sync::Arc;

use serde_json::{json, Value};

use iris_host::{Event, Group, HostDirectory};

use crate::bridge_store::BridgeStore;
use crate::mention_log::MentionLog;
use crate::notification_cards::make_event_notification;
use crate::notifier::Notifier;
use crate::request_context::RequestContext;
use crate::token_cache::TokenCache;

/// Glance key registered in the descriptor document.
pub const RECENT_EVENTS_GLANCE_KEY: &str = "iris-recent-events-glance";

/// Sidebar glance content summarizing recent mentions.
pub fn recent_events_glance_content(count: usize) -> Value {
    json!({
        "label": {
            "type": "html",
            "value": format!(
                "<b>{count}</b> Recent Event{}",
                if count == 1 { "" } else { "s" }
            ),
        },
    })
}

#[derive(Clone)]
pub struct NotifyPipeline {
    store: BridgeStore,
    host: Arc<dyn HostDirectory>,
    mentions: MentionLog,
    notifier: Arc<dyn Notifier>,
    tokens: TokenCache,
}

impl NotifyPipeline {
    pub fn new(
        store: BridgeStore,
        host: Arc<dyn HostDirectory>,
        mentions: MentionLog,
        notifier: Arc<dyn Notifier>,
        tokens: TokenCache,
    ) -> Self {
        Self {
            store,
            host,
            mentions,
            notifier,
            tokens,
        }
    }

    pub fn mentions(&self) -> &MentionLog {
        &self.mentions
    }

    /// Notifies every tenant subscribed to the event's project, records the
    /// mention, and refreshes the sidebar glance.
    pub async fn notify_event(&self, group: &Group, event: &Event) {
        let Some(project) = self.host.project(&event.project_id) else {
            tracing::warn!(
                project_id = event.project_id.as_str(),
                "skipping notification for unknown project"
            );
            return;
        };
        for tenant in self.store.tenants_for_project(&event.project_id) {
            let tenant_id = tenant.id.clone();
            let context =
                RequestContext::for_tenant(tenant, self.notifier.clone(), self.tokens.clone());
            let payload = make_event_notification(group, event, &project, true, false);
            context.send_notification(&payload).await;
            self.mentions
                .mention(&event.project_id, &group.id, &tenant_id, Some(&event.id));
            self.push_recent_events_glance(&context).await;
        }
    }

    /// Pushes the recent-events glance for the context's room.
    pub async fn push_recent_events_glance(&self, context: &RequestContext) {
        let count = self.mentions.count(&context.tenant.id);
        let body = json!({
            "glance": [{
                "content": recent_events_glance_content(count),
                "key": RECENT_EVENTS_GLANCE_KEY,
            }],
        });
        context
            .post(&format!("addon/ui/room/{}", context.room_id()), &body)
            .await;
    }
}
