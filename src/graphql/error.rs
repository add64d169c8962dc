//! GraphQL error types
//!
//! Document-level failures ([`ParseError`], [`ExecutionError`]) abort an
//! operation. Resolver failures ([`FieldError`]) do not: they are rendered into
//! the result's `errors` list as [`GraphQLError`]s.

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Message shown in place of non-client-safe errors outside debug mode
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Malformed query text
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Syntax Error: {message} (offset {offset})")]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the query where parsing stopped
    pub offset: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Errors that prevent an operation from executing at all
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// Query text could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Document holds no operation
    #[error("Document does not contain an operation")]
    NoOperation,

    /// Root field missing from the schema
    #[error("Cannot query field \"{field}\" on type \"{type_name}\".")]
    UnknownField { type_name: String, field: String },

    /// Variable referenced but never declared
    #[error("Variable \"${0}\" is not defined.")]
    UnknownVariable(String),

    /// Required variable missing from the request
    #[error("Variable \"${name}\" of required type \"{var_type}\" was not provided.")]
    MissingVariable { name: String, var_type: String },

    /// Variables were not a JSON object
    #[error("Variables must be provided as an object")]
    InvalidVariables,

    /// Failure reported by a custom executor
    #[error("{0}")]
    Engine(String),
}

/// Failure returned by a resolver
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct FieldError {
    pub message: String,
    /// Whether the message may be shown to clients outside debug mode
    pub client_safe: bool,
}

impl FieldError {
    /// An error meant for the client
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            client_safe: true,
        }
    }

    /// An internal error, masked unless debug mode is on
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            client_safe: false,
        }
    }
}

/// Entry of a result's `errors` list
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQLError {
    pub message: String,
    pub path: Vec<String>,
    pub client_safe: bool,
}

impl GraphQLError {
    pub fn from_field(error: FieldError, path: Vec<String>) -> Self {
        Self {
            message: error.message,
            path,
            client_safe: error.client_safe,
        }
    }

    /// Render as JSON. Debug mode attaches the raw message of masked errors.
    pub fn to_json(&self, debug: bool) -> Value {
        let mut obj = Map::new();
        let message = if self.client_safe {
            self.message.as_str()
        } else {
            INTERNAL_ERROR_MESSAGE
        };
        obj.insert("message".to_string(), json!(message));

        if !self.path.is_empty() {
            obj.insert("path".to_string(), json!(self.path));
        }

        if debug && !self.client_safe {
            obj.insert(
                "extensions".to_string(),
                json!({ "debugMessage": self.message }),
            );
        }

        Value::Object(obj)
    }
}
