//! Subscription Records
//!
//! What the manager remembers about a started operation.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::connection::{ConnectionKey, SharedConnection};
use crate::graphql::OperationKind;
use crate::protocol::{OperationId, StartPayload};

/// Stable position of a record in the subscription index.
///
/// Handles are allocated monotonically and never reused, so removing one
/// record leaves the handles held by every other record valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RecordHandle(pub(crate) u64);

impl RecordHandle {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A started operation, as handed to lifecycle hooks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    /// Client-supplied id
    pub id: OperationId,
    /// Name of the first selected field (the routing key for subscriptions)
    pub name: String,
    pub kind: OperationKind,
    /// Original query text
    pub query: String,
    /// Original start payload
    pub payload: StartPayload,
    /// Key of the owning connection
    pub connection: ConnectionKey,
}

impl Operation {
    pub fn variables(&self) -> Option<&Value> {
        self.payload.variables.as_ref()
    }
}

/// A live subscription, stored in both registries
pub struct SubscriptionRecord {
    pub operation: Operation,
    /// Where published results are sent
    pub connection: SharedConnection,
    /// Removal handle in the subscription index
    pub handle: RecordHandle,
}

impl SubscriptionRecord {
    pub fn id(&self) -> &str {
        &self.operation.id
    }

    pub fn name(&self) -> &str {
        &self.operation.name
    }

    pub fn query(&self) -> &str {
        &self.operation.query
    }

    pub fn variables(&self) -> Option<&Value> {
        self.operation.variables()
    }

    pub fn connection_key(&self) -> &str {
        &self.operation.connection
    }
}

impl fmt::Debug for SubscriptionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRecord")
            .field("id", &self.operation.id)
            .field("name", &self.operation.name)
            .field("connection", &self.operation.connection)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
