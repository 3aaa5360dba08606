//! Tenant lifecycle, token, and notification core of the Iris bridge.
//!
//! Authenticates multi-tenant room installs, maintains per-tenant OAuth
//! bearer tokens, renders monitoring events into chat notification
//! payloads, and posts them to the chat service's REST API.

pub mod bridge_error;
pub mod bridge_store;
pub mod mention_log;
pub mod notification_cards;
pub mod notifier;
pub mod notify_pipeline;
pub mod request_context;
pub mod tenant_lifecycle;
pub mod tenant_model;
pub mod token_cache;

pub use bridge_error::*;
pub use bridge_store::*;
pub use mention_log::*;
pub use notification_cards::*;
pub use notifier::*;
pub use notify_pipeline::*;
pub use request_context::*;
pub use tenant_lifecycle::*;
pub use tenant_model::*;
pub use token_cache::*;
