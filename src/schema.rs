//! Schema description the query builder validates against.
//!
//! A [`Schema`] is a catalog of object types (field name → GraphQL type reference),
//! leaf types (scalars and enums), and root operations per [`OperationKind`]. It can be
//! built programmatically, deserialized from JSON, or converted from the result of a
//! GraphQL introspection query.
//!
//! # Examples
//!
//! ```
//! use webstack_client::{ObjectType, OperationDef, OperationKind, Schema};
//!
//! let schema = Schema::new()
//!     .with_type("Body", ObjectType::new().field("id", "String!").field("name", "String"))
//!     .with_operation(
//!         OperationKind::Query,
//!         "GetBody",
//!         OperationDef::new("Body").argument("bodyId", "String!"),
//!     );
//!
//! assert!(schema.operation(OperationKind::Query, "GetBody").is_some());
//! assert!(schema.is_leaf("String"));
//! ```

use crate::error::SchemaError;
use crate::query::OperationKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Scalars every controller schema understands.
pub const BUILTIN_SCALARS: &[&str] = &[
    "Int", "Float", "String", "Boolean", "ID", "Data", "Any", "Void", "DateTime",
];

/// Introspection document understood by [`Schema::from_introspection`].
pub const INTROSPECTION_QUERY: &str = r#"query IntrospectionQuery {
    __schema {
        queryType { name }
        mutationType { name }
        subscriptionType { name }
        types {
            kind
            name
            fields(includeDeprecated: true) {
                name
                args { name type { ...TypeRef } }
                type { ...TypeRef }
            }
        }
    }
}

fragment TypeRef on __Type {
    kind
    name
    ofType {
        kind
        name
        ofType {
            kind
            name
            ofType {
                kind
                name
                ofType { kind name }
            }
        }
    }
}"#;

/// Strip list and non-null wrappers from a type reference: `[Body!]!` → `Body`.
pub fn base_type_name(type_ref: &str) -> &str {
    type_ref.trim_matches(|c: char| c == '[' || c == ']' || c == '!' || c.is_whitespace())
}

/// Whether a type reference is non-null at the outermost level.
pub fn is_non_null(type_ref: &str) -> bool {
    type_ref.trim_end().ends_with('!')
}

/// Whether a type reference is a list at the outermost level.
pub fn is_list(type_ref: &str) -> bool {
    type_ref.trim().starts_with('[')
}

/// An object (or interface) type: field name → type reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectType {
    /// Fields and their GraphQL type references.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl ObjectType {
    /// Empty object type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field.
    pub fn field(mut self, name: impl Into<String>, type_ref: impl Into<String>) -> Self {
        self.fields.insert(name.into(), type_ref.into());
        self
    }
}

/// A root operation: its arguments and return type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDef {
    /// Argument name → type reference. `!` marks a required argument.
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
    /// Return type reference, e.g. `[Body!]!` or `Boolean`.
    pub return_type: String,
}

impl OperationDef {
    /// Operation returning `return_type`, without arguments.
    pub fn new(return_type: impl Into<String>) -> Self {
        Self {
            arguments: BTreeMap::new(),
            return_type: return_type.into(),
        }
    }

    /// Declare an argument.
    pub fn argument(mut self, name: impl Into<String>, type_ref: impl Into<String>) -> Self {
        self.arguments.insert(name.into(), type_ref.into());
        self
    }
}

/// Catalog of types and root operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Custom scalars and enums, in addition to [`BUILTIN_SCALARS`].
    #[serde(default)]
    pub scalars: BTreeSet<String>,
    /// Object types by name.
    #[serde(default)]
    pub types: BTreeMap<String, ObjectType>,
    /// Root query fields.
    #[serde(default)]
    pub queries: BTreeMap<String, OperationDef>,
    /// Root mutation fields.
    #[serde(default)]
    pub mutations: BTreeMap<String, OperationDef>,
    /// Root subscription fields.
    #[serde(default)]
    pub subscriptions: BTreeMap<String, OperationDef>,
}

impl Schema {
    /// Empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a schema from its JSON form.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Register a custom scalar or enum.
    pub fn with_scalar(mut self, name: impl Into<String>) -> Self {
        self.scalars.insert(name.into());
        self
    }

    /// Register an object type.
    pub fn with_type(mut self, name: impl Into<String>, object: ObjectType) -> Self {
        self.types.insert(name.into(), object);
        self
    }

    /// Register a root operation.
    pub fn with_operation(
        mut self,
        kind: OperationKind,
        name: impl Into<String>,
        def: OperationDef,
    ) -> Self {
        self.operations_mut(kind).insert(name.into(), def);
        self
    }

    /// Root operations of one kind.
    pub fn operations(&self, kind: OperationKind) -> &BTreeMap<String, OperationDef> {
        match kind {
            OperationKind::Query => &self.queries,
            OperationKind::Mutation => &self.mutations,
            OperationKind::Subscription => &self.subscriptions,
        }
    }

    fn operations_mut(&mut self, kind: OperationKind) -> &mut BTreeMap<String, OperationDef> {
        match kind {
            OperationKind::Query => &mut self.queries,
            OperationKind::Mutation => &mut self.mutations,
            OperationKind::Subscription => &mut self.subscriptions,
        }
    }

    /// Look up a root operation.
    pub fn operation(&self, kind: OperationKind, name: &str) -> Option<&OperationDef> {
        self.operations(kind).get(name)
    }

    /// Look up an object type.
    pub fn object_type(&self, name: &str) -> Option<&ObjectType> {
        self.types.get(name)
    }

    /// Whether `name` is a scalar or enum (cannot carry a selection).
    pub fn is_leaf(&self, name: &str) -> bool {
        BUILTIN_SCALARS.contains(&name) || self.scalars.contains(name)
    }

    /// Classify a type name, failing for types the schema does not define.
    pub(crate) fn resolve(&self, name: &str) -> Result<TypeKind<'_>, SchemaError> {
        if self.is_leaf(name) {
            Ok(TypeKind::Leaf)
        } else if let Some(object) = self.types.get(name) {
            Ok(TypeKind::Object(object))
        } else {
            Err(SchemaError::UnknownType(name.to_string()))
        }
    }

    /// Convert a GraphQL introspection result into a schema.
    ///
    /// Accepts the full response (`{"data": {"__schema": ...}}`), the `data` object, or the
    /// `__schema` object itself. Scalars and enums become leaf types, objects and interfaces
    /// become [`ObjectType`]s, and the fields of the root types become operations.
    /// Introspection types (`__*`) are skipped.
    pub fn from_introspection(value: &Value) -> crate::Result<Self> {
        let root = value
            .get("data")
            .unwrap_or(value)
            .get("__schema")
            .or_else(|| value.get("types").map(|_| value))
            .ok_or_else(|| crate::WebstackError::Decode("introspection result has no __schema".into()))?;

        let types = root
            .get("types")
            .and_then(Value::as_array)
            .ok_or_else(|| crate::WebstackError::Decode("introspection result has no types".into()))?;

        let root_name = |key: &str| {
            root.get(key)
                .and_then(|t| t.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let roots = [
            (OperationKind::Query, root_name("queryType")),
            (OperationKind::Mutation, root_name("mutationType")),
            (OperationKind::Subscription, root_name("subscriptionType")),
        ];

        let mut schema = Schema::new();
        for ty in types {
            let Some(name) = ty.get("name").and_then(Value::as_str) else {
                continue;
            };
            if name.starts_with("__") {
                continue;
            }
            match ty.get("kind").and_then(Value::as_str) {
                Some("SCALAR") | Some("ENUM") => {
                    if !BUILTIN_SCALARS.contains(&name) {
                        schema.scalars.insert(name.to_string());
                    }
                }
                Some("OBJECT") | Some("INTERFACE") => {
                    let fields = ty.get("fields").and_then(Value::as_array);
                    let root_kind = roots
                        .iter()
                        .find(|(_, root)| root.as_deref() == Some(name))
                        .map(|(kind, _)| *kind);

                    let mut object = ObjectType::new();
                    for field in fields.into_iter().flatten() {
                        let (Some(field_name), Some(type_ref)) = (
                            field.get("name").and_then(Value::as_str),
                            field.get("type").and_then(render_type_ref),
                        ) else {
                            continue;
                        };
                        if let Some(kind) = root_kind {
                            let mut def = OperationDef::new(type_ref.clone());
                            for arg in field.get("args").and_then(Value::as_array).into_iter().flatten() {
                                if let (Some(arg_name), Some(arg_type)) = (
                                    arg.get("name").and_then(Value::as_str),
                                    arg.get("type").and_then(render_type_ref),
                                ) {
                                    def.arguments.insert(arg_name.to_string(), arg_type);
                                }
                            }
                            schema.operations_mut(kind).insert(field_name.to_string(), def);
                        }
                        object.fields.insert(field_name.to_string(), type_ref);
                    }
                    if root_kind.is_none() {
                        schema.types.insert(name.to_string(), object);
                    }
                }
                // input objects and unions never carry a plain field selection
                _ => {}
            }
        }
        Ok(schema)
    }
}

/// How a named type behaves in a selection.
pub(crate) enum TypeKind<'a> {
    Leaf,
    Object(&'a ObjectType),
}

/// Render an introspection `__Type` reference (`NON_NULL`/`LIST` wrappers) as text.
fn render_type_ref(ty: &Value) -> Option<String> {
    match ty.get("kind").and_then(Value::as_str)? {
        "NON_NULL" => Some(format!("{}!", render_type_ref(ty.get("ofType")?)?)),
        "LIST" => Some(format!("[{}]", render_type_ref(ty.get("ofType")?)?)),
        _ => ty.get("name").and_then(Value::as_str).map(str::to_string),
    }
}
