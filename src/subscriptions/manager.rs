//! Subscriptions Manager
//!
//! Dispatches inbound frames to the protocol handlers and keeps the
//! subscription index and the per-connection storage in step.
//!
//! # Frame handling
//!
//! ```text
//! connection_init → reset storage → on_connect → connection_ack | connection_error
//! start           → parse → execute → data → (subscription: register → on_operation)
//!                                             (query/mutation: complete → on_operation_complete)
//!                   any failure → error + complete
//! data (publish)  → per record: filter → execute → data | error
//! stop            → unregister → on_disconnect
//! ```

use serde_json::{Map, Value};
use std::sync::Arc;

use super::adapter::ExecutorAdapter;
use super::error::{SubscriptionError, SubscriptionResult};
use super::hooks::{Filters, Listeners};
use super::record::{Operation, SubscriptionRecord};
use super::registry::{ConnectionRegistry, SubscriptionIndex};
use crate::config::GraphqlConfig;
use crate::connection::{Connection, SharedConnection};
use crate::graphql::{self, Context, ExecutionError, Executor, OperationKind};
use crate::protocol::{ClientMessage, OperationId, ServerMessage, StartPayload};

/// Outcome of one publish, counted per matched record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Records listening on the published name
    pub matched: usize,
    /// Records that were sent a `data` frame
    pub delivered: usize,
    /// Records skipped by their filter
    pub filtered: usize,
    /// Records that were sent an `error` frame
    pub failed: usize,
}

/// Protocol state machine for one schema
pub struct SubscriptionsManager {
    executor: ExecutorAdapter,
    filters: Filters,
    listeners: Listeners,
    /// Handed to hooks
    root_value: Value,
    /// Merged with `on_connect` results; lives as long as the manager
    context: Context,
    subscriptions: SubscriptionIndex,
    conn_storage: ConnectionRegistry,
}

impl SubscriptionsManager {
    /// Create a manager executing against `engine`
    pub fn new(engine: Arc<dyn Executor>) -> Self {
        Self {
            executor: ExecutorAdapter::new(engine, false),
            filters: Filters::new(),
            listeners: Listeners::new(),
            root_value: Value::Object(Map::new()),
            context: Map::new(),
            subscriptions: SubscriptionIndex::new(),
            conn_storage: ConnectionRegistry::new(),
        }
    }

    /// Create a manager with settings from the `[graphql]` config section
    pub fn from_config(engine: Arc<dyn Executor>, config: &GraphqlConfig) -> Self {
        Self::new(engine).with_debug(config.debug)
    }

    /// Include debug details in rendered errors
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.executor.set_debug(debug);
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// Register the delivery filter for one subscription name
    pub fn with_filter<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&Value, Option<&Value>, &Context) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.filters.insert(name, filter);
        self
    }

    pub fn with_listeners(mut self, listeners: Listeners) -> Self {
        self.listeners = listeners;
        self
    }

    pub fn with_root_value(mut self, root_value: Value) -> Self {
        self.root_value = root_value;
        self
    }

    /// Initial execution context
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Dispatch one decoded frame
    pub fn handle(&mut self, conn: &SharedConnection, message: ClientMessage) {
        match message {
            ClientMessage::ConnectionInit { payload } => {
                self.handle_connection_init(conn, payload);
            }
            ClientMessage::Start { id, payload } => {
                self.handle_start(conn, id, payload);
            }
            ClientMessage::Data {
                subscription,
                payload,
            } => {
                self.handle_data(&subscription, &payload);
            }
            ClientMessage::Stop { id } => {
                self.handle_stop(conn, &id);
            }
            ClientMessage::ConnectionTerminate => {
                self.drop_connection(conn.key());
            }
            ClientMessage::Unknown => {
                tracing::warn!(connection = %conn.key(), "Ignoring frame of unknown type");
            }
        }
    }

    /// Decode a text frame and dispatch it.
    ///
    /// Undecodable text is reported to the caller and otherwise ignored.
    pub fn handle_text(&mut self, conn: &SharedConnection, text: &str) -> SubscriptionResult<()> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => {
                self.handle(conn, message);
                Ok(())
            }
            Err(e) => {
                tracing::debug!(
                    connection = %conn.key(),
                    error = %e,
                    text = %text,
                    "Invalid client message"
                );
                Err(SubscriptionError::Decode(e))
            }
        }
    }

    /// Handle `connection_init`.
    ///
    /// Always answers with exactly one frame. Re-initialising a known
    /// connection discards its live subscriptions.
    pub fn handle_connection_init(&mut self, conn: &SharedConnection, payload: Option<Value>) {
        let key = conn.key();

        let stale = self.conn_storage.reset(key);
        if !stale.is_empty() {
            tracing::debug!(
                connection = %key,
                subscriptions = stale.len(),
                "Connection re-initialised, discarding subscriptions"
            );
            self.release(stale);
        }

        let payload = payload.unwrap_or_else(|| Value::Object(Map::new()));
        let response = match self.listeners.call_connect(&payload) {
            Ok(Some(context)) => {
                self.context.extend(context);
                ServerMessage::ack()
            }
            Ok(None) => ServerMessage::ack(),
            Err(e) => {
                tracing::warn!(connection = %key, error = %e, "Connection rejected");
                ServerMessage::ConnectionError {
                    payload: e.to_string(),
                }
            }
        };

        if matches!(response, ServerMessage::ConnectionAck { .. }) {
            tracing::info!(connection = %key, "Connection initialised");
        }
        send_frame(conn.as_ref(), &response);
    }

    /// Handle `start`.
    ///
    /// On failure the client receives `error` then `complete`, and nothing is
    /// left registered.
    pub fn handle_start(&mut self, conn: &SharedConnection, id: OperationId, payload: StartPayload) {
        if let Err(e) = self.start_operation(conn, &id, payload) {
            tracing::debug!(
                connection = %conn.key(),
                id = %id,
                error = %e,
                "Operation failed"
            );
            send_frame(
                conn.as_ref(),
                &ServerMessage::Error {
                    id: id.clone(),
                    payload: e.to_string(),
                },
            );
            send_frame(conn.as_ref(), &ServerMessage::Complete { id });
        }
    }

    fn start_operation(
        &mut self,
        conn: &SharedConnection,
        id: &str,
        payload: StartPayload,
    ) -> SubscriptionResult<()> {
        let query = payload
            .query
            .clone()
            .ok_or(SubscriptionError::MissingQuery)?;

        let document = graphql::parse(&query)?;
        let kind = document
            .operation_kind()
            .ok_or(ExecutionError::NoOperation)?;
        let name = document.first_field_name().unwrap_or_default().to_string();

        let result = self.executor.execute(
            &query,
            &payload.to_value(),
            &self.context,
            payload.variables.as_ref(),
        )?;

        send_frame(
            conn.as_ref(),
            &ServerMessage::Data {
                id: id.to_string(),
                payload: result,
            },
        );

        let operation = Operation {
            id: id.to_string(),
            name,
            kind,
            query,
            payload,
            connection: conn.key().to_string(),
        };

        match kind {
            OperationKind::Subscription => self.subscribe(conn, operation),
            OperationKind::Query | OperationKind::Mutation => {
                send_frame(
                    conn.as_ref(),
                    &ServerMessage::Complete {
                        id: operation.id.clone(),
                    },
                );
                self.listeners
                    .call_operation_complete(&operation, &self.root_value, &self.context)
                    .map_err(SubscriptionError::Hook)
            }
        }
    }

    /// Store a subscription in both registries and fire `on_operation`
    fn subscribe(&mut self, conn: &SharedConnection, operation: Operation) -> SubscriptionResult<()> {
        let record = Arc::new(SubscriptionRecord {
            operation,
            connection: Arc::clone(conn),
            handle: self.subscriptions.next_handle(),
        });

        if let Some(replaced) = self.conn_storage.insert(Arc::clone(&record)) {
            tracing::debug!(
                connection = %record.connection_key(),
                id = %record.id(),
                "Operation id reused, replacing subscription"
            );
            self.release(vec![replaced]);
        }
        self.subscriptions.insert(Arc::clone(&record));

        if let Err(e) = self
            .listeners
            .call_operation(&record, &self.root_value, &self.context)
        {
            self.conn_storage
                .remove(record.connection_key(), record.id());
            self.subscriptions.remove(record.name(), record.handle);
            return Err(SubscriptionError::Hook(e));
        }

        tracing::info!(
            connection = %record.connection_key(),
            id = %record.id(),
            subscription = %record.name(),
            handle = %record.handle,
            "Subscription registered"
        );
        Ok(())
    }

    /// Publish `payload` to every live subscription named `subscription`.
    ///
    /// Each record is handled on its own: a failing filter or execution sends
    /// an `error` frame to that record's connection and the loop moves on.
    pub fn handle_data(&self, subscription: &str, payload: &Value) -> PublishReport {
        let records = self.subscriptions.get(subscription);
        let mut report = PublishReport {
            matched: records.len(),
            ..PublishReport::default()
        };

        for record in &records {
            match self.deliver(record, payload) {
                Ok(true) => report.delivered += 1,
                Ok(false) => report.filtered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        connection = %record.connection_key(),
                        id = %record.id(),
                        subscription = %subscription,
                        error = %e,
                        "Delivery failed"
                    );
                    send_frame(
                        &*record.connection,
                        &ServerMessage::Error {
                            id: record.id().to_string(),
                            payload: e.to_string(),
                        },
                    );
                }
            }
        }

        if report.matched > 0 {
            tracing::trace!(
                subscription = %subscription,
                delivered = report.delivered,
                filtered = report.filtered,
                failed = report.failed,
                "Published event"
            );
        }

        report
    }

    /// Alias of [`handle_data`](Self::handle_data) for host-side event sources
    pub fn publish(&self, subscription: &str, payload: &Value) -> PublishReport {
        self.handle_data(subscription, payload)
    }

    /// Returns `Ok(false)` when the filter rejected the payload
    fn deliver(&self, record: &SubscriptionRecord, payload: &Value) -> SubscriptionResult<bool> {
        let variables = record.variables();

        let accepted = self
            .filters
            .accepts(record.name(), payload, variables, &self.context)
            .map_err(SubscriptionError::Filter)?;
        if !accepted {
            return Ok(false);
        }

        let result = self
            .executor
            .execute(record.query(), payload, &self.context, variables)?;

        send_frame(
            &*record.connection,
            &ServerMessage::Data {
                id: record.id().to_string(),
                payload: result,
            },
        );
        Ok(true)
    }

    /// Handle `stop`. Unknown ids are ignored.
    pub fn handle_stop(&mut self, conn: &SharedConnection, id: &str) {
        match self.conn_storage.remove(conn.key(), id) {
            Some(record) => {
                tracing::info!(
                    connection = %conn.key(),
                    id = %id,
                    subscription = %record.name(),
                    "Subscription stopped"
                );
                self.release(vec![record]);
            }
            None => {
                tracing::debug!(connection = %conn.key(), id = %id, "Stop for unknown operation");
            }
        }
    }

    /// Forget a connection: every one of its subscriptions is removed from
    /// both registries and `on_disconnect` fires for each. Sends nothing.
    ///
    /// Returns the number of subscriptions removed.
    pub fn drop_connection(&mut self, key: &str) -> usize {
        let Some(records) = self.conn_storage.take(key) else {
            return 0;
        };

        let removed = self.release(records);
        tracing::info!(connection = %key, subscriptions = removed, "Connection dropped");
        removed
    }

    /// Remove records (already gone from connection storage) from the index
    /// and fire `on_disconnect` for each, oldest first
    fn release(&mut self, mut records: Vec<Arc<SubscriptionRecord>>) -> usize {
        records.sort_by_key(|r| r.handle);

        for record in &records {
            self.subscriptions.remove(record.name(), record.handle);

            if let Err(e) = self
                .listeners
                .call_disconnect(record, &self.root_value, &self.context)
            {
                tracing::warn!(
                    connection = %record.connection_key(),
                    id = %record.id(),
                    error = %e,
                    "on_disconnect hook failed"
                );
            }
        }

        records.len()
    }

    /// Live subscriptions by name
    pub fn subscriptions(&self) -> &SubscriptionIndex {
        &self.subscriptions
    }

    /// Live subscriptions by connection
    pub fn conn_storage(&self) -> &ConnectionRegistry {
        &self.conn_storage
    }

    /// Current execution context
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn root_value(&self) -> &Value {
        &self.root_value
    }

    pub fn executor(&self) -> &ExecutorAdapter {
        &self.executor
    }

    pub fn subscription_count(&self, name: &str) -> usize {
        self.subscriptions.count(name)
    }

    pub fn connection_count(&self) -> usize {
        self.conn_storage.len()
    }
}

/// Encode and send one frame
fn send_frame(conn: &dyn Connection, frame: &ServerMessage) {
    match frame.encode() {
        Ok(text) => conn.send(text),
        Err(e) => {
            tracing::error!(connection = %conn.key(), error = %e, "Failed to serialize frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ChannelConnection;
    use crate::graphql::{ExecutionResult, FieldError, Schema};
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn schema() -> Schema {
        Schema::builder()
            .query("hello", |_, _, _| Ok(json!("world")))
            .query("whoami", |_, _, ctx| {
                Ok(ctx.get("user").cloned().unwrap_or(Value::Null))
            })
            .query("broken", |_, _, _| Err(FieldError::internal("disk on fire")))
            .mutation("send", |_, args, _| {
                Ok(json!({ "body": args.get("body").cloned().unwrap_or(Value::Null) }))
            })
            .passthrough_subscription("onMessage")
            .passthrough_subscription("onJoin")
            .build()
    }

    fn manager() -> SubscriptionsManager {
        SubscriptionsManager::new(Arc::new(schema()))
    }

    fn frames(rx: &mut UnboundedReceiver<String>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(text) = rx.try_recv() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }

    fn start(manager: &mut SubscriptionsManager, conn: &SharedConnection, id: &str, query: &str) {
        manager.handle(
            conn,
            ClientMessage::Start {
                id: id.to_string(),
                payload: StartPayload::new(query),
            },
        );
    }

    fn data(id: &str, payload: Value) -> ServerMessage {
        ServerMessage::Data {
            id: id.to_string(),
            payload,
        }
    }

    fn complete(id: &str) -> ServerMessage {
        ServerMessage::Complete { id: id.to_string() }
    }

    /// Records every hook invocation as "<event>:<id or payload>"
    fn recording_listeners(log: &Arc<Mutex<Vec<String>>>) -> Listeners {
        let on_op = Arc::clone(log);
        let on_complete = Arc::clone(log);
        let on_disconnect = Arc::clone(log);
        Listeners::new()
            .on_operation(move |record, _root, _ctx| {
                on_op.lock().push(format!("operation:{}", record.id()));
                Ok(())
            })
            .on_operation_complete(move |operation, _root, _ctx| {
                on_complete
                    .lock()
                    .push(format!("complete:{}:{}", operation.id, operation.name));
                Ok(())
            })
            .on_disconnect(move |record, _root, _ctx| {
                on_disconnect.lock().push(format!("disconnect:{}", record.id()));
                Ok(())
            })
    }

    #[test]
    fn test_connection_init_acks() {
        let mut m = manager();
        let (conn, mut rx) = ChannelConnection::channel("a");

        m.handle(&conn, ClientMessage::ConnectionInit { payload: None });

        assert_eq!(frames(&mut rx), vec![ServerMessage::ack()]);
        assert!(m.conn_storage().contains("a"));
        assert_eq!(m.connection_count(), 1);
    }

    #[test]
    fn test_connection_init_merges_context() {
        let mut initial = Map::new();
        initial.insert("tenant".into(), json!("acme"));
        initial.insert("user".into(), json!("nobody"));

        let mut m = manager()
            .with_context(initial)
            .with_listeners(Listeners::new().on_connect(|payload| {
                let mut ctx = Map::new();
                ctx.insert("user".into(), payload["user"].clone());
                Ok(Some(ctx))
            }));
        let (conn, mut rx) = ChannelConnection::channel("a");

        m.handle(
            &conn,
            ClientMessage::ConnectionInit {
                payload: Some(json!({"user": "ada"})),
            },
        );
        assert_eq!(frames(&mut rx), vec![ServerMessage::ack()]);
        assert_eq!(m.context().get("user"), Some(&json!("ada")));
        assert_eq!(m.context().get("tenant"), Some(&json!("acme")));

        start(&mut m, &conn, "1", "{ whoami }");
        assert_eq!(
            frames(&mut rx),
            vec![data("1", json!({"data": {"whoami": "ada"}})), complete("1")]
        );
    }

    #[test]
    fn test_connection_init_hook_failure() {
        let mut m = manager().with_listeners(
            Listeners::new().on_connect(|_| anyhow::bail!("Invalid token")),
        );
        let (conn, mut rx) = ChannelConnection::channel("a");

        m.handle(&conn, ClientMessage::ConnectionInit { payload: None });

        assert_eq!(
            frames(&mut rx),
            vec![ServerMessage::ConnectionError {
                payload: "Invalid token".into()
            }]
        );
    }

    #[test]
    fn test_connection_reinit_discards_subscriptions() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut m = manager().with_listeners(recording_listeners(&log));
        let (conn, mut rx) = ChannelConnection::channel("a");

        m.handle(&conn, ClientMessage::ConnectionInit { payload: None });
        start(&mut m, &conn, "1", "subscription { onMessage { body } }");
        assert_eq!(m.subscription_count("onMessage"), 1);

        m.handle(&conn, ClientMessage::ConnectionInit { payload: None });
        assert_eq!(m.subscription_count("onMessage"), 0);
        assert!(m.conn_storage().entry("a").unwrap().is_empty());
        assert_eq!(*log.lock(), vec!["operation:1", "disconnect:1"]);

        let sent = frames(&mut rx);
        assert_eq!(sent.last(), Some(&ServerMessage::ack()));
    }

    #[test]
    fn test_query_sends_data_then_complete() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut m = manager().with_listeners(recording_listeners(&log));
        let (conn, mut rx) = ChannelConnection::channel("a");

        start(&mut m, &conn, "q1", "{ hello }");

        assert_eq!(
            frames(&mut rx),
            vec![data("q1", json!({"data": {"hello": "world"}})), complete("q1")]
        );
        assert!(m.subscriptions().is_empty());
        assert_eq!(*log.lock(), vec!["complete:q1:hello"]);
    }

    #[test]
    fn test_mutation_with_variables() {
        let mut m = manager();
        let (conn, mut rx) = ChannelConnection::channel("a");

        m.handle_start(
            &conn,
            "m1".into(),
            StartPayload::new("mutation ($b: String!) { send(body: $b) { body } }")
                .with_variables(json!({"b": "hey"})),
        );

        assert_eq!(
            frames(&mut rx),
            vec![
                data("m1", json!({"data": {"send": {"body": "hey"}}})),
                complete("m1")
            ]
        );
    }

    #[test]
    fn test_operation_complete_hook_failure() {
        let mut m = manager().with_listeners(
            Listeners::new().on_operation_complete(|_, _, _| anyhow::bail!("audit log down")),
        );
        let (conn, mut rx) = ChannelConnection::channel("a");

        start(&mut m, &conn, "1", "{ hello }");

        assert_eq!(
            frames(&mut rx),
            vec![
                data("1", json!({"data": {"hello": "world"}})),
                complete("1"),
                ServerMessage::Error {
                    id: "1".into(),
                    payload: "audit log down".into()
                },
                complete("1")
            ]
        );
    }

    #[test]
    fn test_missing_query_reports_error() {
        let mut m = manager();
        let (conn, mut rx) = ChannelConnection::channel("a");

        m.handle_start(&conn, "1".into(), StartPayload::default());

        assert_eq!(
            frames(&mut rx),
            vec![
                ServerMessage::Error {
                    id: "1".into(),
                    payload: "Missing query parameter from payload".into()
                },
                complete("1")
            ]
        );
    }

    #[test]
    fn test_null_start_payload_reports_missing_query() {
        let mut m = manager();
        let (conn, mut rx) = ChannelConnection::channel("a");

        m.handle_text(&conn, r#"{"type":"start","id":"1","payload":null}"#)
            .unwrap();

        assert_eq!(
            frames(&mut rx),
            vec![
                ServerMessage::Error {
                    id: "1".into(),
                    payload: "Missing query parameter from payload".into()
                },
                complete("1")
            ]
        );
    }

    #[test]
    fn test_deeply_nested_query_is_rejected() {
        let mut m = manager();
        let (conn, mut rx) = ChannelConnection::channel("a");
        let query = format!(
            "{{ hello {} x {} }}",
            "{ a ".repeat(5000),
            "}".repeat(5000)
        );

        start(&mut m, &conn, "1", &query);

        let sent = frames(&mut rx);
        assert_eq!(sent.len(), 2);
        match &sent[0] {
            ServerMessage::Error { id, payload } => {
                assert_eq!(id, "1");
                assert!(payload.contains("Query is nested too deeply"));
            }
            other => panic!("Expected Error, got {:?}", other),
        }
        assert_eq!(sent[1], complete("1"));
        assert!(m.subscriptions().is_empty());
    }

    #[test]
    fn test_parse_error_reports_error() {
        let mut m = manager();
        let (conn, mut rx) = ChannelConnection::channel("a");

        start(&mut m, &conn, "1", "subscription { onMessage {");

        let sent = frames(&mut rx);
        assert_eq!(sent.len(), 2);
        match &sent[0] {
            ServerMessage::Error { id, payload } => {
                assert_eq!(id, "1");
                assert!(payload.starts_with("Syntax Error"));
            }
            other => panic!("Expected Error, got {:?}", other),
        }
        assert_eq!(sent[1], complete("1"));
        assert!(m.subscriptions().is_empty());
    }

    #[test]
    fn test_failed_subscription_start_registers_nothing() {
        let mut m = manager();
        let (conn, mut rx) = ChannelConnection::channel("a");

        start(&mut m, &conn, "1", "subscription { onNothing { body } }");

        assert_eq!(
            frames(&mut rx),
            vec![
                ServerMessage::Error {
                    id: "1".into(),
                    payload: "Cannot query field \"onNothing\" on type \"Subscription\".".into()
                },
                complete("1")
            ]
        );
        assert_eq!(m.subscription_count("onNothing"), 0);
        assert!(m.conn_storage().get("a", "1").is_none());
    }

    #[test]
    fn test_subscription_start_registers_record() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut m = manager().with_listeners(recording_listeners(&log));
        let (conn, mut rx) = ChannelConnection::channel("a");

        start(&mut m, &conn, "1", "subscription { onMessage { body } }");

        assert_eq!(
            frames(&mut rx),
            vec![data("1", json!({"data": {"onMessage": {"body": null}}}))]
        );
        assert_eq!(m.subscription_count("onMessage"), 1);

        let record = m.conn_storage().get("a", "1").unwrap();
        assert_eq!(record.name(), "onMessage");
        assert!(m.subscriptions().contains("onMessage", record.handle));
        assert_eq!(*log.lock(), vec!["operation:1"]);
    }

    #[test]
    fn test_operation_hook_failure_rolls_back() {
        let mut m = manager().with_listeners(
            Listeners::new().on_operation(|_, _, _| anyhow::bail!("quota exceeded")),
        );
        let (conn, mut rx) = ChannelConnection::channel("a");

        start(&mut m, &conn, "1", "subscription { onMessage { body } }");

        let sent = frames(&mut rx);
        assert_eq!(sent.len(), 3);
        assert!(matches!(sent[0], ServerMessage::Data { .. }));
        assert_eq!(
            sent[1],
            ServerMessage::Error {
                id: "1".into(),
                payload: "quota exceeded".into()
            }
        );
        assert_eq!(sent[2], complete("1"));
        assert_eq!(m.subscription_count("onMessage"), 0);
        assert!(m.conn_storage().get("a", "1").is_none());
    }

    #[test]
    fn test_subscribe_publish_stop_scenario() {
        let mut m = manager();
        let (conn, mut rx) = ChannelConnection::channel("a");

        m.handle_text(
            &conn,
            r#"{"type":"start","id":"1","payload":{"query":"subscription{onMessage{body}}"}}"#,
        )
        .unwrap();
        let sent = frames(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id(), Some("1"));
        assert_eq!(m.subscriptions().get("onMessage").len(), 1);

        let report = m.handle_data("onMessage", &json!({"body": "hi"}));
        assert_eq!(report.delivered, 1);
        assert_eq!(
            frames(&mut rx),
            vec![data("1", json!({"data": {"onMessage": {"body": "hi"}}}))]
        );

        m.handle_text(&conn, r#"{"type":"stop","id":"1"}"#).unwrap();
        assert!(m.subscriptions().get("onMessage").is_empty());
        assert!(m.conn_storage().get("a", "1").is_none());

        let report = m.handle_data("onMessage", &json!({"body": "again"}));
        assert_eq!(report, PublishReport::default());
        assert!(frames(&mut rx).is_empty());
    }

    #[test]
    fn test_repeated_stop_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut m = manager().with_listeners(recording_listeners(&log));
        let (conn, mut rx) = ChannelConnection::channel("a");

        start(&mut m, &conn, "1", "subscription { onMessage { body } }");
        frames(&mut rx);

        m.handle(&conn, ClientMessage::Stop { id: "1".into() });
        m.handle(&conn, ClientMessage::Stop { id: "1".into() });

        assert!(frames(&mut rx).is_empty());
        assert_eq!(*log.lock(), vec!["operation:1", "disconnect:1"]);
    }

    #[test]
    fn test_stop_on_unknown_connection_is_noop() {
        let mut m = manager();
        let (conn, mut rx) = ChannelConnection::channel("stranger");

        m.handle(&conn, ClientMessage::Stop { id: "9".into() });

        assert!(frames(&mut rx).is_empty());
        assert_eq!(m.connection_count(), 0);
    }

    #[test]
    fn test_publish_reaches_only_matching_name() {
        let mut m = manager();
        let (a, mut rx_a) = ChannelConnection::channel("a");
        let (b, mut rx_b) = ChannelConnection::channel("b");

        start(&mut m, &a, "1", "subscription { onMessage { body } }");
        start(&mut m, &b, "1", "subscription { onJoin { user } }");
        frames(&mut rx_a);
        frames(&mut rx_b);

        m.handle(&a, ClientMessage::publish("onJoin", json!({"user": "ada"})));

        assert!(frames(&mut rx_a).is_empty());
        assert_eq!(
            frames(&mut rx_b),
            vec![data("1", json!({"data": {"onJoin": {"user": "ada"}}}))]
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let m = manager();
        assert_eq!(
            m.publish("onMessage", &json!({"body": "void"})),
            PublishReport::default()
        );
    }

    #[test]
    fn test_filter_selects_subscribers() {
        let mut m = manager().with_filter("onMessage", |payload, variables, _ctx| {
            Ok(variables
                .and_then(|v| v.get("room"))
                .map(|room| room == &payload["room"])
                .unwrap_or(true))
        });
        let (a, mut rx_a) = ChannelConnection::channel("a");
        let (b, mut rx_b) = ChannelConnection::channel("b");
        let query = "subscription ($room: String) { onMessage { body } }";

        m.handle_start(
            &a,
            "1".into(),
            StartPayload::new(query).with_variables(json!({"room": "red"})),
        );
        m.handle_start(
            &b,
            "1".into(),
            StartPayload::new(query).with_variables(json!({"room": "blue"})),
        );
        frames(&mut rx_a);
        frames(&mut rx_b);

        let report = m.publish("onMessage", &json!({"room": "red", "body": "hi"}));

        assert_eq!(
            report,
            PublishReport {
                matched: 2,
                delivered: 1,
                filtered: 1,
                failed: 0
            }
        );
        assert_eq!(
            frames(&mut rx_a),
            vec![data("1", json!({"data": {"onMessage": {"body": "hi"}}}))]
        );
        assert!(frames(&mut rx_b).is_empty());
    }

    #[test]
    fn test_filter_failure_is_isolated() {
        let mut m = manager().with_filter("onMessage", |_payload, variables, _ctx| {
            if variables.and_then(|v| v.get("strict")).is_some() {
                anyhow::bail!("filter exploded");
            }
            Ok(true)
        });
        let (a, mut rx_a) = ChannelConnection::channel("a");
        let (b, mut rx_b) = ChannelConnection::channel("b");
        let (c, mut rx_c) = ChannelConnection::channel("c");
        let query = "subscription { onMessage { body } }";

        start(&mut m, &a, "1", query);
        m.handle_start(
            &b,
            "2".into(),
            StartPayload::new(query).with_variables(json!({"strict": true})),
        );
        start(&mut m, &c, "3", query);
        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            frames(rx);
        }

        let report = m.publish("onMessage", &json!({"body": "hi"}));
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);

        let expected = json!({"data": {"onMessage": {"body": "hi"}}});
        assert_eq!(frames(&mut rx_a), vec![data("1", expected.clone())]);
        assert_eq!(
            frames(&mut rx_b),
            vec![ServerMessage::Error {
                id: "2".into(),
                payload: "filter exploded".into()
            }]
        );
        assert_eq!(frames(&mut rx_c), vec![data("3", expected)]);

        // still subscribed
        assert_eq!(m.subscription_count("onMessage"), 3);
    }

    /// Delegates to the schema but refuses publishes marked `explode` for
    /// subscribers that asked to be fragile
    struct FragileExecutor(Schema);

    impl Executor for FragileExecutor {
        fn execute(
            &self,
            query: &str,
            root: &Value,
            context: &Context,
            variables: Option<&Value>,
        ) -> Result<ExecutionResult, ExecutionError> {
            let fragile = variables.and_then(|v| v.get("fragile")).is_some();
            if fragile && root.get("explode").is_some() {
                return Err(ExecutionError::Engine("engine crashed".into()));
            }
            self.0.execute(query, root, context, variables)
        }
    }

    #[test]
    fn test_execution_failure_is_isolated() {
        let mut m = SubscriptionsManager::new(Arc::new(FragileExecutor(schema())));
        let (a, mut rx_a) = ChannelConnection::channel("a");
        let (b, mut rx_b) = ChannelConnection::channel("b");
        let query = "subscription { onMessage { body } }";

        m.handle_start(
            &a,
            "1".into(),
            StartPayload::new(query).with_variables(json!({"fragile": true})),
        );
        start(&mut m, &b, "1", query);
        frames(&mut rx_a);
        frames(&mut rx_b);

        let report = m.publish("onMessage", &json!({"body": "x", "explode": true}));

        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(
            frames(&mut rx_a),
            vec![ServerMessage::Error {
                id: "1".into(),
                payload: "engine crashed".into()
            }]
        );
        assert_eq!(
            frames(&mut rx_b),
            vec![data("1", json!({"data": {"onMessage": {"body": "x"}}}))]
        );
    }

    #[test]
    fn test_same_id_on_two_connections() {
        let mut m = manager();
        let (a, mut rx_a) = ChannelConnection::channel("a");
        let (b, mut rx_b) = ChannelConnection::channel("b");
        let query = "subscription { onMessage { body } }";

        start(&mut m, &a, "1", query);
        start(&mut m, &b, "1", query);
        assert_eq!(m.subscription_count("onMessage"), 2);

        m.handle_stop(&a, "1");
        assert_eq!(m.subscription_count("onMessage"), 1);
        assert!(m.conn_storage().get("b", "1").is_some());
        frames(&mut rx_a);
        frames(&mut rx_b);

        m.publish("onMessage", &json!({"body": "only b"}));
        assert!(frames(&mut rx_a).is_empty());
        assert_eq!(frames(&mut rx_b).len(), 1);
    }

    #[test]
    fn test_reused_id_replaces_subscription() {
        let mut m = manager();
        let (conn, mut rx) = ChannelConnection::channel("a");

        start(&mut m, &conn, "1", "subscription { onMessage { body } }");
        start(&mut m, &conn, "1", "subscription { onJoin { user } }");
        frames(&mut rx);

        assert_eq!(m.subscription_count("onMessage"), 0);
        assert_eq!(m.subscription_count("onJoin"), 1);
        assert_eq!(m.conn_storage().entry("a").unwrap().len(), 1);

        m.publish("onMessage", &json!({"body": "ghost"}));
        assert!(frames(&mut rx).is_empty());
    }

    #[test]
    fn test_drop_connection_removes_everything() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut m = manager().with_listeners(recording_listeners(&log));
        let (a, mut rx_a) = ChannelConnection::channel("a");
        let (b, mut rx_b) = ChannelConnection::channel("b");

        start(&mut m, &a, "1", "subscription { onMessage { body } }");
        start(&mut m, &a, "2", "subscription { onJoin { user } }");
        start(&mut m, &b, "1", "subscription { onMessage { body } }");
        frames(&mut rx_a);
        frames(&mut rx_b);
        log.lock().clear();

        assert_eq!(m.drop_connection("a"), 2);
        assert_eq!(*log.lock(), vec!["disconnect:1", "disconnect:2"]);
        assert!(!m.conn_storage().contains("a"));
        assert_eq!(m.subscription_count("onMessage"), 1);
        assert_eq!(m.subscription_count("onJoin"), 0);
        assert!(frames(&mut rx_a).is_empty());

        m.publish("onMessage", &json!({"body": "still here"}));
        assert!(frames(&mut rx_a).is_empty());
        assert_eq!(frames(&mut rx_b).len(), 1);

        assert_eq!(m.drop_connection("a"), 0);
    }

    #[test]
    fn test_connection_terminate_drops_connection() {
        let mut m = manager();
        let (conn, mut rx) = ChannelConnection::channel("a");

        m.handle(&conn, ClientMessage::ConnectionInit { payload: None });
        start(&mut m, &conn, "1", "subscription { onMessage { body } }");
        frames(&mut rx);

        m.handle_text(&conn, r#"{"type":"connection_terminate"}"#).unwrap();

        assert!(frames(&mut rx).is_empty());
        assert_eq!(m.connection_count(), 0);
        assert!(m.subscriptions().is_empty());
    }

    #[test]
    fn test_unknown_and_invalid_frames_are_ignored() {
        let mut m = manager();
        let (conn, mut rx) = ChannelConnection::channel("a");

        m.handle_text(&conn, r#"{"type":"ka"}"#).unwrap();
        let err = m.handle_text(&conn, "not json").unwrap_err();
        assert!(matches!(err, SubscriptionError::Decode(_)));

        assert!(frames(&mut rx).is_empty());
        assert_eq!(m.connection_count(), 0);
    }

    #[test]
    fn test_debug_flag_reaches_results() {
        let config = GraphqlConfig { debug: true };
        let mut m = SubscriptionsManager::from_config(Arc::new(schema()), &config);
        let (conn, mut rx) = ChannelConnection::channel("a");

        start(&mut m, &conn, "1", "{ broken }");

        let sent = frames(&mut rx);
        match &sent[0] {
            ServerMessage::Data { payload, .. } => {
                assert_eq!(
                    payload["errors"][0]["extensions"]["debugMessage"],
                    json!("disk on fire")
                );
            }
            other => panic!("Expected Data, got {:?}", other),
        }
        assert_eq!(sent[1], complete("1"));
        assert!(m.executor().debug());
    }

    #[test]
    fn test_hooks_receive_root_value() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut m = manager()
            .with_root_value(json!({"app": "chat"}))
            .with_listeners(Listeners::new().on_operation(move |_, root, _| {
                sink.lock().push(root.clone());
                Ok(())
            }));
        let (conn, _rx) = ChannelConnection::channel("a");

        start(&mut m, &conn, "1", "subscription { onMessage { body } }");

        assert_eq!(*seen.lock(), vec![json!({"app": "chat"})]);
        assert_eq!(m.root_value(), &json!({"app": "chat"}));
    }
}
