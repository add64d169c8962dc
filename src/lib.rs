//! # gqlws
//!
//! Server side of the `graphql-ws` subscription protocol over WebSocket.
//!
//! ## Features
//!
//! - **Protocol handling**: `connection_init`, `start`, `stop` and
//!   `connection_terminate` frames from clients
//! - **Fan-out**: publishing an event re-executes every live subscription of
//!   that name against the event payload
//! - **Filters and hooks**: per-subscription delivery filters and lifecycle
//!   callbacks supplied by the host
//! - **Transport agnostic**: anything implementing [`connection::Connection`]
//!   can receive frames
//!
//! ## Modules
//!
//! - [`protocol`]: frame types and their JSON encoding
//! - [`connection`]: outbound connection handles
//! - [`graphql`]: query parser and resolver-based executor
//! - [`subscriptions`]: the subscriptions manager
//! - [`config`]: TOML configuration with environment overrides
//! - [`logging`]: `tracing` setup and named log channels
//!
//! ## Quick Start
//!
//! ```rust
//! use gqlws::connection::ChannelConnection;
//! use gqlws::graphql::Schema;
//! use gqlws::subscriptions::SubscriptionsManager;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let schema = Schema::builder()
//!     .passthrough_subscription("onMessage")
//!     .build();
//! let mut manager = SubscriptionsManager::new(Arc::new(schema));
//!
//! let (conn, mut outbox) = ChannelConnection::channel("client-1");
//! manager.handle_text(&conn, r#"{"type":"connection_init"}"#).unwrap();
//! manager
//!     .handle_text(
//!         &conn,
//!         r#"{"type":"start","id":"1","payload":{"query":"subscription { onMessage { body } }"}}"#,
//!     )
//!     .unwrap();
//!
//! manager.publish("onMessage", &json!({"body": "hello"}));
//!
//! let mut frames = Vec::new();
//! while let Ok(frame) = outbox.try_recv() {
//!     frames.push(frame);
//! }
//! assert_eq!(frames.len(), 3); // ack, initial data, published data
//! ```

pub mod config;
pub mod connection;
pub mod graphql;
pub mod logging;
pub mod protocol;
pub mod subscriptions;

pub use config::Config;
pub use connection::{ChannelConnection, Connection, SharedConnection};
pub use protocol::{ClientMessage, ServerMessage};
pub use subscriptions::{SubscriptionError, SubscriptionsManager};
