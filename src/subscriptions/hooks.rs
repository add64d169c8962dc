//! Lifecycle Hooks and Filters
//!
//! Both are optional host callbacks handed to the manager at construction.
//! A missing hook is a no-op; a missing filter accepts every event.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::record::{Operation, SubscriptionRecord};
use crate::graphql::Context;

/// Called on `connection_init` with the init payload.
///
/// A returned map is merged into the manager's execution context.
pub type ConnectHook = Arc<dyn Fn(&Value) -> anyhow::Result<Option<Context>> + Send + Sync>;

/// Called with a live record, the root value and the context
pub type OperationHook =
    Arc<dyn Fn(&SubscriptionRecord, &Value, &Context) -> anyhow::Result<()> + Send + Sync>;

/// Called after a query or mutation completed
pub type CompleteHook =
    Arc<dyn Fn(&Operation, &Value, &Context) -> anyhow::Result<()> + Send + Sync>;

/// Decides whether a published payload reaches a subscriber:
/// `(payload, variables, context) -> deliver?`
pub type Filter =
    Arc<dyn Fn(&Value, Option<&Value>, &Context) -> anyhow::Result<bool> + Send + Sync>;

/// Lifecycle events a hook can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerEvent {
    Connect,
    Operation,
    OperationComplete,
    Disconnect,
}

impl ListenerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "on_connect",
            Self::Operation => "on_operation",
            Self::OperationComplete => "on_operation_complete",
            Self::Disconnect => "on_disconnect",
        }
    }
}

impl fmt::Display for ListenerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four optional lifecycle hooks
#[derive(Clone, Default)]
pub struct Listeners {
    on_connect: Option<ConnectHook>,
    on_operation: Option<OperationHook>,
    on_operation_complete: Option<CompleteHook>,
    on_disconnect: Option<OperationHook>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Option<Context>> + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(hook));
        self
    }

    pub fn on_operation<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SubscriptionRecord, &Value, &Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_operation = Some(Arc::new(hook));
        self
    }

    pub fn on_operation_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Operation, &Value, &Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_operation_complete = Some(Arc::new(hook));
        self
    }

    /// Fired on `stop` and for every record dropped with its connection
    pub fn on_disconnect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SubscriptionRecord, &Value, &Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_disconnect = Some(Arc::new(hook));
        self
    }

    /// Whether a hook is registered for `event`
    pub fn is_registered(&self, event: ListenerEvent) -> bool {
        match event {
            ListenerEvent::Connect => self.on_connect.is_some(),
            ListenerEvent::Operation => self.on_operation.is_some(),
            ListenerEvent::OperationComplete => self.on_operation_complete.is_some(),
            ListenerEvent::Disconnect => self.on_disconnect.is_some(),
        }
    }

    pub(crate) fn call_connect(&self, payload: &Value) -> anyhow::Result<Option<Context>> {
        match &self.on_connect {
            Some(hook) => hook(payload),
            None => Ok(None),
        }
    }

    pub(crate) fn call_operation(
        &self,
        record: &SubscriptionRecord,
        root: &Value,
        context: &Context,
    ) -> anyhow::Result<()> {
        match &self.on_operation {
            Some(hook) => hook(record, root, context),
            None => Ok(()),
        }
    }

    pub(crate) fn call_operation_complete(
        &self,
        operation: &Operation,
        root: &Value,
        context: &Context,
    ) -> anyhow::Result<()> {
        match &self.on_operation_complete {
            Some(hook) => hook(operation, root, context),
            None => Ok(()),
        }
    }

    pub(crate) fn call_disconnect(
        &self,
        record: &SubscriptionRecord,
        root: &Value,
        context: &Context,
    ) -> anyhow::Result<()> {
        match &self.on_disconnect {
            Some(hook) => hook(record, root, context),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_operation", &self.on_operation.is_some())
            .field("on_operation_complete", &self.on_operation_complete.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .finish()
    }
}

/// Filters keyed by subscription name
#[derive(Clone, Default)]
pub struct Filters {
    by_name: HashMap<String, Filter>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the filter for `name`, replacing any previous one
    pub fn insert<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, Option<&Value>, &Context) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.by_name.insert(name.into(), Arc::new(filter));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Run the filter for `name`; no filter means accept
    pub fn accepts(
        &self,
        name: &str,
        payload: &Value,
        variables: Option<&Value>,
        context: &Context,
    ) -> anyhow::Result<bool> {
        match self.by_name.get(name) {
            Some(filter) => filter(payload, variables, context),
            None => Ok(true),
        }
    }
}

impl fmt::Debug for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.by_name.keys().collect();
        names.sort();
        f.debug_struct("Filters").field("names", &names).finish()
    }
}
