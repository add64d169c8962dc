//! Protocol Message Types
//!
//! Defines the inbound and outbound frames of the subscriptions protocol.
//! Both enums are internally tagged on `type`, so the serde representation is
//! exactly the wire shape.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

/// Client-supplied operation id, unique per connection only
pub type OperationId = String;

/// Payload of a `start` frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartPayload {
    /// Query text; absence is reported to the client as an error
    #[serde(default)]
    pub query: Option<String>,
    /// Variables for the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    /// Operation name, carried along but not used for selection
    #[serde(
        default,
        rename = "operationName",
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_name: Option<String>,
}

impl StartPayload {
    /// Create a payload for a query without variables
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            variables: None,
            operation_name: None,
        }
    }

    /// Attach variables
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// The payload as a JSON object, used as the root value of the first execution
    pub fn to_value(&self) -> Value {
        json!({
            "query": self.query,
            "variables": self.variables,
        })
    }
}

/// Frames received from clients (and from the host for publishes)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Connection handshake
    ConnectionInit {
        #[serde(default)]
        payload: Option<Value>,
    },
    /// Start an operation
    Start {
        id: OperationId,
        /// Absent or `null` reads as an empty payload
        #[serde(default, deserialize_with = "null_as_default")]
        payload: StartPayload,
    },
    /// Publish an event to every live subscription named `subscription`
    Data {
        subscription: String,
        #[serde(default)]
        payload: Value,
    },
    /// Stop a running subscription
    Stop { id: OperationId },
    /// Client is going away
    ConnectionTerminate,
    /// Any other `type`; ignored by the manager
    #[serde(other)]
    Unknown,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ClientMessage {
    /// Build a host-side publish frame
    pub fn publish(subscription: impl Into<String>, payload: Value) -> Self {
        Self::Data {
            subscription: subscription.into(),
            payload,
        }
    }
}

/// Frames sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted
    ConnectionAck { payload: Map<String, Value> },
    /// Handshake rejected
    ConnectionError { payload: String },
    /// Execution result for an operation
    Data { id: OperationId, payload: Value },
    /// Operation failed
    Error { id: OperationId, payload: String },
    /// Operation finished
    Complete { id: OperationId },
}

impl ServerMessage {
    pub fn ack() -> Self {
        Self::ConnectionAck {
            payload: Map::new(),
        }
    }

    /// The operation id this frame is tagged with, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Data { id, .. } | Self::Error { id, .. } | Self::Complete { id } => Some(id),
            Self::ConnectionAck { .. } | Self::ConnectionError { .. } => None,
        }
    }

    /// Serialize to wire text
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
