//! GraphQL Abstract Syntax Tree
//!
//! Only executable operation definitions are modelled.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed GraphQL document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Operation definitions in source order
    pub definitions: Vec<OperationDefinition>,
}

impl Document {
    /// The first operation definition
    pub fn operation(&self) -> Option<&OperationDefinition> {
        self.definitions.first()
    }

    /// Kind of the first operation definition
    pub fn operation_kind(&self) -> Option<OperationKind> {
        self.operation().map(|op| op.kind)
    }

    /// Name of the first field of the first selection set.
    ///
    /// For subscriptions this is the event name the operation listens on.
    pub fn first_field_name(&self) -> Option<&str> {
        self.operation()
            .and_then(|op| op.selection_set.first())
            .map(|field| field.name.as_str())
    }
}

/// Operation type of a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// Parse the operation keyword
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "query" => Some(Self::Query),
            "mutation" => Some(Self::Mutation),
            "subscription" => Some(Self::Subscription),
            _ => None,
        }
    }

    /// Name of the root object type for this kind
    pub fn root_type_name(&self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Mutation => "Mutation",
            Self::Subscription => "Subscription",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Mutation => write!(f, "mutation"),
            Self::Subscription => write!(f, "subscription"),
        }
    }
}

/// A single operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDefinition {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: Vec<VariableDefinition>,
    pub selection_set: Vec<Field>,
}

/// `$name: Type = default`
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub var_type: TypeRef,
    pub default_value: Option<InputValue>,
}

/// Type reference in a variable definition
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{}", name),
            Self::List(inner) => write!(f, "[{}]", inner),
            Self::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

/// A field selection
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<(String, InputValue)>,
    pub selection_set: Vec<Field>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            alias: None,
            name: name.into(),
            arguments: Vec::new(),
            selection_set: Vec::new(),
        }
    }

    /// Key under which this field appears in the response (alias or name)
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Literal or variable reference in argument position
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<InputValue>),
    Object(Vec<(String, InputValue)>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(kind: OperationKind, fields: &[&str]) -> Document {
        Document {
            definitions: vec![OperationDefinition {
                kind,
                name: None,
                variables: Vec::new(),
                selection_set: fields.iter().map(|f| Field::new(*f)).collect(),
            }],
        }
    }

    #[test]
    fn test_first_field_name() {
        let doc = document(OperationKind::Subscription, &["onMessage", "onJoin"]);
        assert_eq!(doc.operation_kind(), Some(OperationKind::Subscription));
        assert_eq!(doc.first_field_name(), Some("onMessage"));
    }

    #[test]
    fn test_empty_document() {
        let doc = Document {
            definitions: Vec::new(),
        };
        assert!(doc.operation_kind().is_none());
        assert!(doc.first_field_name().is_none());
    }

    #[test]
    fn test_response_key_prefers_alias() {
        let mut field = Field::new("user");
        assert_eq!(field.response_key(), "user");
        field.alias = Some("me".to_string());
        assert_eq!(field.response_key(), "me");
    }

    #[test]
    fn test_type_ref_display() {
        let t = TypeRef::NonNull(Box::new(TypeRef::List(Box::new(TypeRef::Named("ID".into())))));
        assert_eq!(t.to_string(), "[ID]!");
        assert!(t.is_non_null());
    }

    #[test]
    fn test_operation_kind_keywords() {
        assert_eq!(OperationKind::from_keyword("mutation"), Some(OperationKind::Mutation));
        assert_eq!(OperationKind::from_keyword("Query"), None);
        assert_eq!(OperationKind::Subscription.root_type_name(), "Subscription");
        assert_eq!(OperationKind::Query.to_string(), "query");
    }
}
