//! GraphQL Subscriptions Manager
//!
//! Protocol state machine for GraphQL-over-WebSocket subscriptions.
//!
//! ## Architecture
//!
//! - **ConnectionRegistry**: connection key → (operation id → record)
//! - **SubscriptionIndex**: subscription name → records in insertion order
//! - **ExecutorAdapter**: runs operations against the engine with the debug flag
//! - **Listeners**: optional connect / operation / complete / disconnect hooks
//! - **Filters**: optional per-subscription-name delivery predicates
//! - **SubscriptionsManager**: frame dispatch and the protocol handlers
//!
//! Every live record is present in both registries. All mutations go through
//! `&mut SubscriptionsManager`, so a host sharing one manager across tasks
//! serializes them behind a single lock.
//!
//! ## Example
//!
//! ```rust
//! use gqlws::connection::ChannelConnection;
//! use gqlws::graphql::Schema;
//! use gqlws::protocol::ClientMessage;
//! use gqlws::subscriptions::SubscriptionsManager;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let schema = Schema::builder().passthrough_subscription("onMessage").build();
//! let mut manager = SubscriptionsManager::new(Arc::new(schema));
//!
//! let (conn, mut rx) = ChannelConnection::channel("client-1");
//! manager
//!     .handle_text(&conn, r#"{"type":"start","id":"1","payload":{"query":"subscription{onMessage{body}}"}}"#)
//!     .unwrap();
//! manager.handle(&conn, ClientMessage::publish("onMessage", json!({"body": "hi"})));
//!
//! let _initial = rx.try_recv().unwrap();
//! let delivered = rx.try_recv().unwrap();
//! assert_eq!(delivered, r#"{"type":"data","id":"1","payload":{"data":{"onMessage":{"body":"hi"}}}}"#);
//! ```

mod adapter;
mod error;
mod hooks;
mod manager;
mod record;
mod registry;

pub use adapter::ExecutorAdapter;
pub use error::{SubscriptionError, SubscriptionResult};
pub use hooks::{
    CompleteHook, ConnectHook, Filter, Filters, ListenerEvent, Listeners, OperationHook,
};
pub use manager::{PublishReport, SubscriptionsManager};
pub use record::{Operation, RecordHandle, SubscriptionRecord};
pub use registry::{ConnectionRegistry, SubscriptionIndex};
