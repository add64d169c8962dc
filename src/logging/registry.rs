//! Named log channels
//!
//! Each channel owns a stack of [`LogHandler`]s. A record walks the stack
//! from the most recently pushed handler down until one stops it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::handler::LogHandler;

/// Channel used when none is named
pub const DEFAULT_CHANNEL: &str = "log";

/// Record severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Level {
    Debug = 100,
    Info = 200,
    Notice = 250,
    Warning = 300,
    Error = 400,
    Critical = 500,
    Alert = 550,
    Emergency = 600,
}

impl Level {
    pub const ALL: [Level; 8] = [
        Level::Debug,
        Level::Info,
        Level::Notice,
        Level::Warning,
        Level::Error,
        Level::Critical,
        Level::Alert,
        Level::Emergency,
    ];

    /// Numeric severity
    pub fn value(&self) -> u16 {
        *self as u16
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Notice => "NOTICE",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
            Level::Alert => "ALERT",
            Level::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown log level: {}", s))
    }
}

/// One log entry
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub channel: String,
    pub level: Level,
    pub message: String,
    pub context: Map<String, Value>,
    pub datetime: DateTime<Utc>,
}

impl LogRecord {
    pub fn new(
        channel: impl Into<String>,
        level: Level,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) -> Self {
        Self {
            channel: channel.into(),
            level,
            message: message.into(),
            context,
            datetime: Utc::now(),
        }
    }
}

/// A channel with its handler stack
pub struct Logger {
    channel: String,
    handlers: RwLock<Vec<Arc<dyn LogHandler>>>,
}

impl Logger {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Put `handler` on top of the stack
    pub fn push_handler(&self, handler: Arc<dyn LogHandler>) {
        self.handlers.write().insert(0, handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Log a record. Without handlers the record goes to `tracing`.
    pub fn log(&self, level: Level, message: &str, context: Map<String, Value>) {
        let record = LogRecord::new(self.channel.as_str(), level, message, context);

        let handlers = self.handlers.read();
        if handlers.is_empty() {
            forward_to_tracing(&record);
            return;
        }

        for handler in handlers.iter() {
            if handler.is_handling(&record) && handler.handle(&record) {
                break;
            }
        }
    }

    pub fn debug(&self, message: &str, context: Map<String, Value>) {
        self.log(Level::Debug, message, context);
    }

    pub fn info(&self, message: &str, context: Map<String, Value>) {
        self.log(Level::Info, message, context);
    }

    pub fn notice(&self, message: &str, context: Map<String, Value>) {
        self.log(Level::Notice, message, context);
    }

    pub fn warning(&self, message: &str, context: Map<String, Value>) {
        self.log(Level::Warning, message, context);
    }

    pub fn error(&self, message: &str, context: Map<String, Value>) {
        self.log(Level::Error, message, context);
    }

    pub fn critical(&self, message: &str, context: Map<String, Value>) {
        self.log(Level::Critical, message, context);
    }

    pub fn alert(&self, message: &str, context: Map<String, Value>) {
        self.log(Level::Alert, message, context);
    }

    pub fn emergency(&self, message: &str, context: Map<String, Value>) {
        self.log(Level::Emergency, message, context);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("channel", &self.channel)
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// Emit a record as a `tracing` event on the closest level
pub(crate) fn forward_to_tracing(record: &LogRecord) {
    let context = Value::Object(record.context.clone());
    let channel = record.channel.as_str();
    let message = record.message.as_str();

    match record.level {
        Level::Debug => tracing::debug!(channel, %context, "{}", message),
        Level::Info | Level::Notice => tracing::info!(channel, %context, "{}", message),
        Level::Warning => tracing::warn!(channel, %context, "{}", message),
        Level::Error | Level::Critical | Level::Alert | Level::Emergency => {
            tracing::error!(channel, level = %record.level, %context, "{}", message)
        }
    }
}

/// Channel name → logger, created on first use
#[derive(Debug, Default)]
pub struct LoggerRegistry {
    loggers: RwLock<HashMap<String, Arc<Logger>>>,
}

impl LoggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The logger for `channel`, created if missing
    pub fn logger(&self, channel: &str) -> Arc<Logger> {
        if let Some(logger) = self.loggers.read().get(channel) {
            return Arc::clone(logger);
        }

        let mut loggers = self.loggers.write();
        Arc::clone(
            loggers
                .entry(channel.to_string())
                .or_insert_with(|| Arc::new(Logger::new(channel))),
        )
    }

    /// Push a handler onto `channel`'s stack
    pub fn push_handler(&self, handler: Arc<dyn LogHandler>, channel: &str) -> Arc<Logger> {
        let logger = self.logger(channel);
        logger.push_handler(handler);
        logger
    }

    pub fn log(&self, level: Level, message: &str, context: Map<String, Value>, channel: &str) {
        self.logger(channel).log(level, message, context);
    }

    pub fn debug(&self, message: &str, context: Map<String, Value>, channel: &str) {
        self.log(Level::Debug, message, context, channel);
    }

    pub fn info(&self, message: &str, context: Map<String, Value>, channel: &str) {
        self.log(Level::Info, message, context, channel);
    }

    pub fn notice(&self, message: &str, context: Map<String, Value>, channel: &str) {
        self.log(Level::Notice, message, context, channel);
    }

    pub fn warning(&self, message: &str, context: Map<String, Value>, channel: &str) {
        self.log(Level::Warning, message, context, channel);
    }

    pub fn error(&self, message: &str, context: Map<String, Value>, channel: &str) {
        self.log(Level::Error, message, context, channel);
    }

    pub fn critical(&self, message: &str, context: Map<String, Value>, channel: &str) {
        self.log(Level::Critical, message, context, channel);
    }

    pub fn alert(&self, message: &str, context: Map<String, Value>, channel: &str) {
        self.log(Level::Alert, message, context, channel);
    }

    pub fn emergency(&self, message: &str, context: Map<String, Value>, channel: &str) {
        self.log(Level::Emergency, message, context, channel);
    }

    /// Channels created so far
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<_> = self.loggers.read().keys().cloned().collect();
        names.sort();
        names
    }
}
