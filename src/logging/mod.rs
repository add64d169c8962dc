//! Logging
//!
//! Two layers:
//!
//! - [`init_tracing`] installs the process-wide `tracing` subscriber from
//!   [`LoggingConfig`]. The crate itself logs only through `tracing`.
//! - [`LoggerRegistry`] gives hosts named log channels with their own handler
//!   stacks, for output that must go somewhere specific (a transcript file,
//!   stderr) regardless of the subscriber.

mod handler;
mod registry;

pub use handler::{LogHandler, StreamHandler, TracingHandler};
pub use registry::{Level, LogRecord, Logger, LoggerRegistry, DEFAULT_CHANNEL};

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Logging setup errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level. Fails if a subscriber is
/// already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gqlws={}", config.level)));

    // stdout belongs to the replay output
    let console = if config.is_json() {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    Ok(())
}
