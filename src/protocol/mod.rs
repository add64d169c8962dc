//! GraphQL-over-WebSocket Wire Protocol
//!
//! Frame types exchanged between clients and the subscriptions manager,
//! following the `graphql-ws` subprotocol (connection init/ack, start/stop,
//! data/error/complete).
//!
//! ## Frames
//!
//! | Direction | type | Fields |
//! |---|---|---|
//! | in | `connection_init` | payload? |
//! | out | `connection_ack` | payload (empty) |
//! | out | `connection_error` | payload (message) |
//! | in | `start` | id, payload.query, payload.variables? |
//! | out | `data` | id, payload (execution result) |
//! | out | `error` | id, payload (message) |
//! | out | `complete` | id |
//! | in | `stop` | id |
//! | in | `connection_terminate` | |
//! | in (host publish) | `data` | subscription, payload |

mod messages;

pub use messages::{ClientMessage, OperationId, ServerMessage, StartPayload};

/// WebSocket subprotocol name negotiated by clients
pub const PROTOCOL: &str = "graphql-ws";

pub const GQL_CONNECTION_INIT: &str = "connection_init";
pub const GQL_CONNECTION_ACK: &str = "connection_ack";
pub const GQL_CONNECTION_ERROR: &str = "connection_error";
pub const GQL_CONNECTION_TERMINATE: &str = "connection_terminate";
pub const GQL_START: &str = "start";
pub const GQL_DATA: &str = "data";
pub const GQL_ERROR: &str = "error";
pub const GQL_COMPLETE: &str = "complete";
pub const GQL_STOP: &str = "stop";
