//! Bounded recent-activity log of events mentioned in a room.
//!
//! Each record ties a (project, group, tenant) triple to the moment the
//! group was last surfaced in chat. The log is capped per tenant and only
//! records inside the retention window count as "recent".

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use iris_core::current_unix_timestamp_ms;
use iris_host::{Event, HostDirectory};

use crate::bridge_store::BridgeStore;

/// Live records kept per tenant; older ones are purged on insert.
pub const MAX_RECENT_MENTIONS: usize = 15;
/// Records older than this are excluded from recent queries.
pub const MENTION_RETENTION_HOURS: u64 = 12;

const MENTION_RETENTION_MS: u64 = MENTION_RETENTION_HOURS * 60 * 60 * 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionRecord {
    pub project_id: String,
    pub group_id: String,
    pub tenant_id: String,
    /// Specific event the mention targeted; `None` means "latest in group".
    pub event_id: Option<String>,
    pub last_mentioned_unix_ms: u64,
}

#[derive(Debug, Clone)]
/// Mention record with its bound event resolved for display.
pub struct ResolvedMention {
    pub record: MentionRecord,
    pub event: Option<Event>,
}

#[derive(Clone)]
pub struct MentionLog {
    store: BridgeStore,
    host: Arc<dyn HostDirectory>,
}

impl MentionLog {
    pub fn new(store: BridgeStore, host: Arc<dyn HostDirectory>) -> Self {
        Self { store, host }
    }

    /// Records that `group` was mentioned in the tenant's room.
    ///
    /// Upserts by (project, group, tenant). The per-tenant cap is enforced
    /// only when a new record is created; refreshing an existing record
    /// never purges.
    pub fn mention(&self, project_id: &str, group_id: &str, tenant_id: &str, event_id: Option<&str>) {
        self.mention_at(
            project_id,
            group_id,
            tenant_id,
            event_id,
            current_unix_timestamp_ms(),
        );
    }

    pub fn mention_at(
        &self,
        project_id: &str,
        group_id: &str,
        tenant_id: &str,
        event_id: Option<&str>,
        now_unix_ms: u64,
    ) {
        self.store.transaction(|state| {
            let mentions = state.mentions_mut();
            if let Some(existing) = mentions.iter_mut().find(|record| {
                record.project_id == project_id
                    && record.group_id == group_id
                    && record.tenant_id == tenant_id
            }) {
                existing.last_mentioned_unix_ms = now_unix_ms;
                if let Some(event_id) = event_id {
                    existing.event_id = Some(event_id.to_string());
                }
                return;
            }

            mentions.push(MentionRecord {
                project_id: project_id.to_string(),
                group_id: group_id.to_string(),
                tenant_id: tenant_id.to_string(),
                event_id: event_id.map(str::to_string),
                last_mentioned_unix_ms: now_unix_ms,
            });

            // Keep only the newest records for this tenant.
            let mut tenant_indices: Vec<usize> = mentions
                .iter()
                .enumerate()
                .filter(|(_, record)| record.tenant_id == tenant_id)
                .map(|(index, _)| index)
                .collect();
            tenant_indices
                .sort_by_key(|index| std::cmp::Reverse(mentions[*index].last_mentioned_unix_ms));
            let mut excess: Vec<usize> = tenant_indices.split_off(
                MAX_RECENT_MENTIONS.min(tenant_indices.len()),
            );
            excess.sort_unstable_by(|a, b| b.cmp(a));
            for index in excess {
                mentions.remove(index);
            }
        });
    }

    /// Recent mentions for the tenant, newest first, capped, with events
    /// resolved through the host directory.
    pub fn recent(&self, tenant_id: &str) -> Vec<ResolvedMention> {
        self.recent_at(tenant_id, current_unix_timestamp_ms())
    }

    pub fn recent_at(&self, tenant_id: &str, now_unix_ms: u64) -> Vec<ResolvedMention> {
        let mut records = self.live_records(tenant_id, now_unix_ms);
        records.sort_by_key(|record| std::cmp::Reverse(record.last_mentioned_unix_ms));
        records.truncate(MAX_RECENT_MENTIONS);
        records
            .into_iter()
            .map(|record| {
                let event = match &record.event_id {
                    Some(event_id) => self.host.event(event_id),
                    None => self.host.latest_event_for_group(&record.group_id),
                };
                ResolvedMention { record, event }
            })
            .collect()
    }

    /// Count of recent mentions, used for the glance badge.
    pub fn count(&self, tenant_id: &str) -> usize {
        self.count_at(tenant_id, current_unix_timestamp_ms())
    }

    pub fn count_at(&self, tenant_id: &str, now_unix_ms: u64) -> usize {
        self.live_records(tenant_id, now_unix_ms)
            .len()
            .min(MAX_RECENT_MENTIONS)
    }

    /// Drops mention records belonging to the given projects, used when a
    /// project is unsubscribed from the room.
    pub fn clear_projects(&self, tenant_id: &str, project_ids: &[String]) {
        self.store.transaction(|state| {
            state.mentions_mut().retain(|record| {
                record.tenant_id != tenant_id || !project_ids.contains(&record.project_id)
            });
        });
    }

    fn live_records(&self, tenant_id: &str, now_unix_ms: u64) -> Vec<MentionRecord> {
        let cutoff = now_unix_ms.saturating_sub(MENTION_RETENTION_MS);
        self.store.transaction(|state| {
            state
                .mentions()
                .iter()
                .filter(|record| {
                    record.tenant_id == tenant_id && record.last_mentioned_unix_ms > cutoff
                })
                .cloned()
                .collect()
        })
    }
}
