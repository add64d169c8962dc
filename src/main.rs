//! gqlws replay
//!
//! Feeds a scripted graphql-ws session through a [`SubscriptionsManager`]
//! running a small chat schema, and prints every frame the server sends.
//!
//! Script format, one JSON object per line:
//!
//! ```text
//! {"connection": "alice", "message": {"type": "connection_init"}}
//! {"connection": "alice", "message": {"type": "start", "id": "1", "payload": {"query": "subscription { onMessage { body } }"}}}
//! {"message": {"type": "data", "subscription": "onMessage", "payload": {"body": "hi"}}}
//! ```
//!
//! Lines without a connection run on the `host` connection. Blank lines and
//! lines starting with `//` are skipped.

use anyhow::Context as _;
use clap::Parser;
use gqlws::config::{Config, GraphqlConfig};
use gqlws::connection::{ChannelConnection, SharedConnection};
use gqlws::graphql::{FieldError, Schema};
use gqlws::logging::{self, Level, LoggerRegistry, StreamHandler};
use gqlws::subscriptions::{Listeners, SubscriptionsManager};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Connection used by lines that name none
const HOST_CONNECTION: &str = "host";

/// Log channel receiving every outbound frame
const FRAMES_CHANNEL: &str = "frames";

#[derive(Parser)]
#[command(name = "gqlws")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Replay a graphql-ws session script against a demo chat schema")]
struct Cli {
    /// Session script (JSON lines)
    script: PathBuf,

    /// Config file (defaults to the standard search path)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Include internal error details in results
    #[arg(long)]
    debug: bool,

    /// Append outbound frames to this file
    #[arg(long)]
    transcript: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ScriptLine {
    #[serde(default)]
    connection: Option<String>,
    message: Value,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if cli.debug {
        config.graphql.debug = true;
    }

    logging::init_tracing(&config.logging)?;
    tracing::info!("gqlws replay v{}", env!("CARGO_PKG_VERSION"));

    let loggers = LoggerRegistry::new();
    if let Some(path) = &cli.transcript {
        let handler = StreamHandler::file(path, Level::Debug)
            .with_context(|| format!("Failed to open transcript {:?}", path))?;
        loggers.push_handler(Arc::new(handler), FRAMES_CHANNEL);
        tracing::info!("Writing transcript to {:?}", path);
    }

    let script = tokio::fs::read_to_string(&cli.script)
        .await
        .with_context(|| format!("Failed to read script {:?}", cli.script))?;

    let mut manager = demo_manager(&config.graphql);
    let mut session = Session::default();

    for (number, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        let entry: ScriptLine = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(line = number + 1, error = %e, "Skipping malformed script line");
                continue;
            }
        };

        let name = entry
            .connection
            .unwrap_or_else(|| HOST_CONNECTION.to_string());
        let conn = session.connection(&name);

        if let Err(e) = manager.handle_text(&conn, &entry.message.to_string()) {
            tracing::warn!(line = number + 1, error = %e, "Frame rejected");
        }
        session.flush(&loggers);
    }

    // Script over: every socket closes
    for name in session.names() {
        manager.drop_connection(&name);
    }
    session.flush(&loggers);

    tracing::info!("Replay finished");
    Ok(())
}

/// Chat schema: messages and joins are pushed as-is to subscribers
fn demo_schema() -> Schema {
    Schema::builder()
        .query("hello", |_, args, _| {
            let name = args.get("name").and_then(Value::as_str).unwrap_or("world");
            Ok(json!(format!("Hello, {}!", name)))
        })
        .query("viewer", |_, _, ctx| {
            Ok(ctx.get("user").cloned().unwrap_or(Value::Null))
        })
        .mutation("sendMessage", |_, args, _| {
            let body = args
                .get("body")
                .and_then(Value::as_str)
                .ok_or_else(|| FieldError::new("Argument \"body\" must be a string"))?;
            Ok(json!({
                "room": args.get("room").cloned().unwrap_or(Value::Null),
                "body": body,
            }))
        })
        .passthrough_subscription("onMessage")
        .passthrough_subscription("onJoin")
        .build()
}

fn demo_manager(config: &GraphqlConfig) -> SubscriptionsManager {
    let listeners = Listeners::new()
        .on_connect(|payload| match payload {
            Value::Object(map) if !map.is_empty() => Ok(Some(map.clone())),
            _ => Ok(None),
        })
        .on_operation(|record, _, _| {
            tracing::debug!(
                connection = %record.connection_key(),
                subscription = %record.name(),
                "Client subscribed"
            );
            Ok(())
        })
        .on_disconnect(|record, _, _| {
            tracing::debug!(
                connection = %record.connection_key(),
                subscription = %record.name(),
                "Client unsubscribed"
            );
            Ok(())
        });

    SubscriptionsManager::from_config(Arc::new(demo_schema()), config)
        .with_filter("onMessage", room_filter)
        .with_listeners(listeners)
}

/// Deliver only messages for the subscriber's `$room`, if it gave one
fn room_filter(payload: &Value, variables: Option<&Value>, _ctx: &Map<String, Value>) -> anyhow::Result<bool> {
    match variables.and_then(|v| v.get("room")) {
        Some(room) if !room.is_null() => Ok(payload.get("room") == Some(room)),
        _ => Ok(true),
    }
}

/// Connections opened by the script, in order of first use
#[derive(Default)]
struct Session {
    connections: Vec<(String, SharedConnection, UnboundedReceiver<String>)>,
}

impl Session {
    fn connection(&mut self, name: &str) -> SharedConnection {
        if let Some((_, conn, _)) = self.connections.iter().find(|(n, _, _)| n == name) {
            return Arc::clone(conn);
        }

        let (conn, rx) = ChannelConnection::channel(name);
        self.connections
            .push((name.to_string(), Arc::clone(&conn), rx));
        conn
    }

    fn names(&self) -> Vec<String> {
        self.connections.iter().map(|(n, _, _)| n.clone()).collect()
    }

    /// Print and log everything sent so far
    fn flush(&mut self, loggers: &LoggerRegistry) {
        for frame in self.drain() {
            println!("{} {}", frame.0, frame.1);

            let mut context = Map::new();
            context.insert("connection".into(), Value::String(frame.0));
            loggers.debug(&frame.1, context, FRAMES_CHANNEL);
        }
    }

    fn drain(&mut self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (name, _, rx) in &mut self.connections {
            while let Ok(text) = rx.try_recv() {
                out.push((name.clone(), text));
            }
        }
        out
    }
}
