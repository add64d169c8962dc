//! GraphQL Executor
//!
//! Executes operations against a [`Schema`] of root-field resolvers:
//! 1. Parse the query text
//! 2. Coerce request variables against the operation's definitions
//! 3. Validate that every root field exists
//! 4. Resolve each root field with `(root, args, context)`
//! 5. Project the resolved JSON through the field's sub-selection
//!
//! # Execution Pipeline
//!
//! ```text
//! Query → Parse → Variables → Validate → Resolve → Project → Result
//! ```

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::graphql::ast::*;
use crate::graphql::error::{ExecutionError, FieldError, GraphQLError};
use crate::graphql::parser::parse;

/// Ambient key-value bag passed to every resolver
pub type Context = Map<String, Value>;

/// Root field resolver: `(root, args, context) -> value`
pub type Resolver =
    Arc<dyn Fn(&Value, &Map<String, Value>, &Context) -> Result<Value, FieldError> + Send + Sync>;

/// Something that can run a GraphQL operation
pub trait Executor: Send + Sync {
    /// Execute `query` with `root` as the root value.
    ///
    /// Returns `Err` only when the operation cannot run at all. Resolver
    /// failures are reported inside the [`ExecutionResult`].
    fn execute(
        &self,
        query: &str,
        root: &Value,
        context: &Context,
        variables: Option<&Value>,
    ) -> Result<ExecutionResult, ExecutionError>;
}

/// Outcome of an execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    pub data: Option<Value>,
    pub errors: Vec<GraphQLError>,
}

impl ExecutionResult {
    /// A successful result
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Render as the standard `{"data": ..., "errors": [...]}` response
    pub fn to_json(&self, debug: bool) -> Value {
        let mut obj = Map::new();
        if let Some(data) = &self.data {
            obj.insert("data".to_string(), data.clone());
        }
        if !self.errors.is_empty() {
            let errors = self.errors.iter().map(|e| e.to_json(debug)).collect();
            obj.insert("errors".to_string(), Value::Array(errors));
        }
        Value::Object(obj)
    }
}

/// Root resolvers per operation kind
#[derive(Clone, Default)]
pub struct Schema {
    query: HashMap<String, Resolver>,
    mutation: HashMap<String, Resolver>,
    subscription: HashMap<String, Resolver>,
}

impl Schema {
    /// Start building a schema
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    fn root_fields(&self, kind: OperationKind) -> &HashMap<String, Resolver> {
        match kind {
            OperationKind::Query => &self.query,
            OperationKind::Mutation => &self.mutation,
            OperationKind::Subscription => &self.subscription,
        }
    }

    /// Whether `field` is a root field of `kind`
    pub fn has_field(&self, kind: OperationKind, field: &str) -> bool {
        self.root_fields(kind).contains_key(field)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |fields: &HashMap<String, Resolver>| {
            let mut keys: Vec<_> = fields.keys().cloned().collect();
            keys.sort();
            keys
        };
        f.debug_struct("Schema")
            .field("query", &names(&self.query))
            .field("mutation", &names(&self.mutation))
            .field("subscription", &names(&self.subscription))
            .finish()
    }
}

/// Builder for [`Schema`]
#[derive(Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Add a `Query` root field
    pub fn query<F>(mut self, name: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&Value, &Map<String, Value>, &Context) -> Result<Value, FieldError>
            + Send
            + Sync
            + 'static,
    {
        self.schema.query.insert(name.into(), Arc::new(resolver));
        self
    }

    /// Add a `Mutation` root field
    pub fn mutation<F>(mut self, name: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&Value, &Map<String, Value>, &Context) -> Result<Value, FieldError>
            + Send
            + Sync
            + 'static,
    {
        self.schema.mutation.insert(name.into(), Arc::new(resolver));
        self
    }

    /// Add a `Subscription` root field
    pub fn subscription<F>(mut self, name: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&Value, &Map<String, Value>, &Context) -> Result<Value, FieldError>
            + Send
            + Sync
            + 'static,
    {
        self.schema
            .subscription
            .insert(name.into(), Arc::new(resolver));
        self
    }

    /// Add a `Subscription` root field resolving to the published payload itself
    pub fn passthrough_subscription(self, name: impl Into<String>) -> Self {
        self.subscription(name, |root, _args, _ctx| Ok(root.clone()))
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl Executor for Schema {
    fn execute(
        &self,
        query: &str,
        root: &Value,
        context: &Context,
        variables: Option<&Value>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let document = parse(query)?;
        let operation = document.operation().ok_or(ExecutionError::NoOperation)?;
        let variables = coerce_variables(operation, variables)?;
        let fields = self.root_fields(operation.kind);

        // Validate before resolving anything
        let mut planned = Vec::with_capacity(operation.selection_set.len());
        for field in &operation.selection_set {
            let resolver = fields
                .get(&field.name)
                .ok_or_else(|| ExecutionError::UnknownField {
                    type_name: operation.kind.root_type_name().to_string(),
                    field: field.name.clone(),
                })?;
            let args = resolve_arguments(&field.arguments, &variables)?;
            planned.push((field, resolver, args));
        }

        let mut data = Map::new();
        let mut errors = Vec::new();

        for (field, resolver, args) in planned {
            let key = field.response_key().to_string();
            let value = match resolver(root, &args, context) {
                Ok(value) => project(value, &field.selection_set),
                Err(e) => {
                    errors.push(GraphQLError::from_field(e, vec![key.clone()]));
                    Value::Null
                }
            };
            data.insert(key, value);
        }

        Ok(ExecutionResult {
            data: Some(Value::Object(data)),
            errors,
        })
    }
}

/// Build the variable scope: provided values, then defaults, then null for
/// nullable definitions. Undeclared names stay absent.
fn coerce_variables(
    operation: &OperationDefinition,
    provided: Option<&Value>,
) -> Result<Map<String, Value>, ExecutionError> {
    let provided = match provided {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(ExecutionError::InvalidVariables),
    };

    let empty = Map::new();
    let mut scope = Map::new();

    for definition in &operation.variables {
        let value = match provided.get(&definition.name) {
            Some(value) => value.clone(),
            None => match &definition.default_value {
                Some(default) => to_json(default, &empty)?,
                None if definition.var_type.is_non_null() => {
                    return Err(ExecutionError::MissingVariable {
                        name: definition.name.clone(),
                        var_type: definition.var_type.to_string(),
                    })
                }
                None => Value::Null,
            },
        };
        scope.insert(definition.name.clone(), value);
    }

    Ok(scope)
}

fn resolve_arguments(
    arguments: &[(String, InputValue)],
    variables: &Map<String, Value>,
) -> Result<Map<String, Value>, ExecutionError> {
    arguments
        .iter()
        .map(|(name, value)| -> Result<(String, Value), ExecutionError> {
            Ok((name.clone(), to_json(value, variables)?))
        })
        .collect()
}

fn to_json(value: &InputValue, variables: &Map<String, Value>) -> Result<Value, ExecutionError> {
    Ok(match value {
        InputValue::Variable(name) => variables
            .get(name)
            .cloned()
            .ok_or_else(|| ExecutionError::UnknownVariable(name.clone()))?,
        InputValue::Int(i) => Value::from(*i),
        InputValue::Float(f) => Value::from(*f),
        InputValue::String(s) => Value::String(s.clone()),
        InputValue::Boolean(b) => Value::Bool(*b),
        InputValue::Null => Value::Null,
        InputValue::Enum(e) => Value::String(e.clone()),
        InputValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| to_json(item, variables))
                .collect::<Result<_, _>>()?,
        ),
        InputValue::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| -> Result<(String, Value), ExecutionError> {
                    Ok((k.clone(), to_json(v, variables)?))
                })
                .collect::<Result<_, _>>()?,
        ),
    })
}

/// Shape a resolved value by its selection set
fn project(value: Value, selection: &[Field]) -> Value {
    if selection.is_empty() {
        return value;
    }

    match value {
        Value::Object(obj) => {
            let mut out = Map::new();
            for field in selection {
                // aliases may select the same field twice
                let child = obj.get(&field.name).cloned().unwrap_or(Value::Null);
                out.insert(
                    field.response_key().to_string(),
                    project(child, &field.selection_set),
                );
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| project(item, selection))
                .collect(),
        ),
        other => other,
    }
}
