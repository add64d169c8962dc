//! GraphQL Query Engine
//!
//! A compact engine the subscriptions manager executes operations against:
//!
//! - **AST**: operation documents, fields and input values
//! - **Parser**: parse query text into a [`Document`]
//! - **Executor**: the [`Executor`] trait and the resolver-based [`Schema`]
//!
//! # Supported Syntax
//!
//! ```text
//! query Name($id: ID!, $limit: Int = 10) { user(id: $id) { name posts(limit: $limit) { title } } }
//! mutation { sendMessage(body: "hi") { id } }
//! subscription { onMessage(room: "general") { body } }
//! { hello }
//! ```
//!
//! Fragments and directives are rejected at parse time.
//!
//! # Example
//!
//! ```rust
//! use gqlws::graphql::{Executor, Schema};
//! use serde_json::{json, Map, Value};
//!
//! let schema = Schema::builder()
//!     .query("hello", |_root: &Value, _args: &Map<String, Value>, _ctx: &Map<String, Value>| {
//!         Ok(json!("world"))
//!     })
//!     .build();
//!
//! let result = schema
//!     .execute("{ hello }", &Value::Null, &Map::new(), None)
//!     .unwrap();
//! assert_eq!(result.to_json(false), json!({"data": {"hello": "world"}}));
//! ```

mod ast;
mod error;
mod executor;
mod parser;

pub use ast::{Document, Field, InputValue, OperationDefinition, OperationKind, TypeRef, VariableDefinition};
pub use error::{ExecutionError, FieldError, GraphQLError, ParseError};
pub use executor::{Context, ExecutionResult, Executor, Resolver, Schema, SchemaBuilder};
pub use parser::parse;
