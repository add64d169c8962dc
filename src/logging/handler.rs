//! Log handlers

use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use super::registry::{forward_to_tracing, Level, LogRecord};

/// Receives records from a [`Logger`](super::Logger)
pub trait LogHandler: Send + Sync {
    /// Whether this handler wants `record` at all
    fn is_handling(&self, record: &LogRecord) -> bool;

    /// Process `record`. Returning `true` stops propagation to the
    /// handlers below this one.
    fn handle(&self, record: &LogRecord) -> bool;
}

/// Writes one formatted line per record to any `Write` sink
pub struct StreamHandler {
    writer: Mutex<Box<dyn Write + Send>>,
    level: Level,
    bubble: bool,
}

impl StreamHandler {
    pub fn new<W>(writer: W, level: Level, bubble: bool) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            writer: Mutex::new(Box::new(writer)),
            level,
            bubble,
        }
    }

    pub fn stderr(level: Level) -> Self {
        Self::new(io::stderr(), level, true)
    }

    /// Append to `path`, creating missing parent directories
    pub fn file(path: impl AsRef<Path>, level: Level) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file, level, true))
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn bubble(&self) -> bool {
        self.bubble
    }

    /// `[datetime] channel.LEVEL: message context`
    pub fn format(record: &LogRecord) -> String {
        let context = if record.context.is_empty() {
            "[]".to_string()
        } else {
            serde_json::Value::Object(record.context.clone()).to_string()
        };

        format!(
            "[{}] {}.{}: {} {}\n",
            record.datetime.to_rfc3339(),
            record.channel,
            record.level,
            record.message,
            context
        )
    }
}

impl LogHandler for StreamHandler {
    fn is_handling(&self, record: &LogRecord) -> bool {
        record.level >= self.level
    }

    fn handle(&self, record: &LogRecord) -> bool {
        if !self.is_handling(record) {
            return false;
        }

        let line = Self::format(record);
        let mut writer = self.writer.lock();
        if let Err(e) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
            tracing::warn!(channel = %record.channel, error = %e, "Failed to write log record");
        }

        !self.bubble
    }
}

/// Forwards records into `tracing`
#[derive(Debug, Clone)]
pub struct TracingHandler {
    level: Level,
    bubble: bool,
}

impl TracingHandler {
    pub fn new(level: Level) -> Self {
        Self { level, bubble: true }
    }

    pub fn with_bubble(mut self, bubble: bool) -> Self {
        self.bubble = bubble;
        self
    }
}

impl Default for TracingHandler {
    fn default() -> Self {
        Self::new(Level::Debug)
    }
}

impl LogHandler for TracingHandler {
    fn is_handling(&self, record: &LogRecord) -> bool {
        record.level >= self.level
    }

    fn handle(&self, record: &LogRecord) -> bool {
        if !self.is_handling(record) {
            return false;
        }
        forward_to_tracing(record);
        !self.bubble
    }
}
