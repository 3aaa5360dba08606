//! HTTP surface for the Iris notification bridge: descriptor document,
//! install callbacks, link-message webhook, configuration endpoints, and
//! the sidebar recent-events queries.

pub mod bridge_server;
pub mod configure_flow;
pub mod descriptor;
pub mod server_config;

pub use bridge_server::*;
pub use configure_flow::*;
pub use descriptor::*;
pub use server_config::*;

#[cfg(test)]
mod tests;
