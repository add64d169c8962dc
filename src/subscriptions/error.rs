//! Subscription error types
//!
//! Every variant is local to one frame or one subscriber: the manager turns it
//! into an `error` / `connection_error` frame and carries on.

use thiserror::Error;

use crate::graphql::{ExecutionError, ParseError};

/// Errors raised while handling a frame
#[derive(Error, Debug)]
pub enum SubscriptionError {
    /// `start` payload carried no query
    #[error("Missing query parameter from payload")]
    MissingQuery,

    /// Inbound text was not a valid frame
    #[error("Invalid message format: {0}")]
    Decode(#[from] serde_json::Error),

    /// Query text could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Engine refused to run the operation
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// A lifecycle hook failed
    #[error("{0}")]
    Hook(anyhow::Error),

    /// A subscription filter failed
    #[error("{0}")]
    Filter(anyhow::Error),
}

/// Result type for subscription operations
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;
