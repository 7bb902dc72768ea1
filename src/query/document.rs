//! Validated, immutable GraphQL documents.

use super::Selection;
use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// The three GraphQL operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Read-only operation.
    #[default]
    Query,
    /// Operation that modifies data.
    Mutation,
    /// Long-lived operation delivering pushed updates.
    Subscription,
}

impl OperationKind {
    /// Keyword used in the document text.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed argument value.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// Declared GraphQL type reference, e.g. `[String!]`.
    pub type_ref: String,
    /// JSON value sent in `variables`.
    pub value: Value,
}

/// One operation and its explicit field selection.
///
/// Documents are produced by [`QueryBuilder`](super::QueryBuilder) and never change after
/// that; [`with_argument_value`](QueryDocument::with_argument_value) derives a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDocument {
    pub(crate) kind: OperationKind,
    pub(crate) name: String,
    pub(crate) arguments: BTreeMap<String, Argument>,
    pub(crate) selection: Selection,
    pub(crate) return_type: String,
    pub(crate) declared: BTreeMap<String, String>,
}

impl QueryDocument {
    /// Operation kind.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Operation name, which is also the key of its value in the response `data`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Supplied arguments.
    pub fn arguments(&self) -> &BTreeMap<String, Argument> {
        &self.arguments
    }

    /// A supplied argument.
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.get(name)
    }

    /// Requested fields. Empty only for scalar-returning operations.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Declared return type reference.
    pub fn return_type(&self) -> &str {
        &self.return_type
    }

    /// Whether the document needs a persistent connection (subscriptions).
    pub fn is_persistent(&self) -> bool {
        self.kind == OperationKind::Subscription
    }

    /// Derive a document with one argument set to `value`.
    ///
    /// The argument must be declared by the operation; it need not have been supplied
    /// originally. The selection is shared unchanged.
    pub fn with_argument_value(
        &self,
        name: &str,
        value: Value,
    ) -> Result<QueryDocument, SchemaError> {
        let type_ref = self
            .declared
            .get(name)
            .ok_or_else(|| SchemaError::UnknownArgument {
                operation: self.name.clone(),
                argument: name.to_string(),
            })?;
        let mut derived = self.clone();
        derived.arguments.insert(
            name.to_string(),
            Argument {
                type_ref: type_ref.clone(),
                value,
            },
        );
        Ok(derived)
    }

    /// The `variables` object sent alongside the document text.
    pub fn variables(&self) -> Value {
        let map: Map<String, Value> = self
            .arguments
            .iter()
            .map(|(name, arg)| (name.clone(), arg.value.clone()))
            .collect();
        Value::Object(map)
    }

    /// Render the document text.
    ///
    /// ```text
    /// query GetBody($bodyId: String!) {
    ///     GetBody(bodyId: $bodyId) {id, name}
    /// }
    /// ```
    pub fn render(&self) -> String {
        let mut out = format!("{} {}", self.kind, self.name);
        if !self.arguments.is_empty() {
            let params: Vec<String> = self
                .arguments
                .iter()
                .map(|(name, arg)| format!("${}: {}", name, arg.type_ref))
                .collect();
            out.push_str(&format!("({})", params.join(", ")));
        }
        out.push_str(" {\n    ");
        out.push_str(&self.name);
        if !self.arguments.is_empty() {
            let args: Vec<String> = self
                .arguments
                .keys()
                .map(|name| format!("{}: ${}", name, name))
                .collect();
            out.push_str(&format!("({})", args.join(", ")));
            if !self.selection.is_empty() {
                out.push(' ');
            }
        }
        if !self.selection.is_empty() {
            out.push_str(&self.selection.to_string());
        }
        out.push_str("\n}");
        out
    }
}

impl fmt::Display for QueryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
