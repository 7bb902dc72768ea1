//! Schema-validated document construction.

use super::{Argument, OperationKind, QueryDocument, Selection};
use crate::error::SchemaError;
use crate::schema::{base_type_name, is_non_null, Schema, TypeKind};
use serde_json::Value;
use std::collections::BTreeMap;

/// Builds a [`QueryDocument`] for one root operation.
///
/// All validation happens in [`build`](QueryBuilder::build), before anything touches the
/// network:
///
/// - the operation must exist for the requested kind;
/// - every argument must be declared, and every `!` argument supplied (non-null);
/// - every selected field must exist on its parent type;
/// - leaf fields take no subfields, object fields need at least one;
/// - object-returning operations need a selection, scalar-returning ones take none.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use webstack_client::{ObjectType, OperationDef, OperationKind, QueryBuilder, Schema, Selection};
///
/// let schema = Schema::new()
///     .with_type("Body", ObjectType::new().field("id", "String!").field("name", "String"))
///     .with_operation(
///         OperationKind::Query,
///         "GetBody",
///         OperationDef::new("Body").argument("bodyId", "String!"),
///     );
///
/// let document = QueryBuilder::new(&schema, OperationKind::Query, "GetBody")
///     .argument("bodyId", json!("robot"))
///     .select(Selection::new().field("id").field("name"))
///     .build()
///     .unwrap();
///
/// assert_eq!(
///     document.render(),
///     "query GetBody($bodyId: String!) {\n    GetBody(bodyId: $bodyId) {id, name}\n}"
/// );
/// assert_eq!(document.variables(), json!({"bodyId": "robot"}));
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder<'s> {
    schema: &'s Schema,
    kind: OperationKind,
    name: String,
    arguments: Vec<(String, Value)>,
    selection: Option<Selection>,
}

impl<'s> QueryBuilder<'s> {
    /// Start a document for operation `name` of the given kind.
    pub fn new(schema: &'s Schema, kind: OperationKind, name: impl Into<String>) -> Self {
        Self {
            schema,
            kind,
            name: name.into(),
            arguments: Vec::new(),
            selection: None,
        }
    }

    /// Supply an argument value. A later value for the same name wins.
    pub fn argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.push((name.into(), value));
        self
    }

    /// Set the field selection.
    pub fn select(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Shorthand for `select(Selection::from_paths(paths))`.
    pub fn select_paths<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.select(Selection::from_paths(paths))
    }

    /// Validate and produce the document.
    pub fn build(self) -> Result<QueryDocument, SchemaError> {
        let def = self
            .schema
            .operation(self.kind, &self.name)
            .ok_or_else(|| SchemaError::UnknownOperation {
                kind: self.kind.to_string(),
                name: self.name.clone(),
            })?;

        let mut arguments = BTreeMap::new();
        for (name, value) in self.arguments {
            let type_ref = def
                .arguments
                .get(&name)
                .ok_or_else(|| SchemaError::UnknownArgument {
                    operation: self.name.clone(),
                    argument: name.clone(),
                })?;
            arguments.insert(
                name,
                Argument {
                    type_ref: type_ref.clone(),
                    value,
                },
            );
        }

        for (name, type_ref) in &def.arguments {
            let supplied = arguments.get(name).is_some_and(|arg| !arg.value.is_null());
            if is_non_null(type_ref) && !supplied {
                return Err(SchemaError::MissingArgument {
                    operation: self.name.clone(),
                    argument: name.clone(),
                });
            }
        }

        let selection = self.selection.unwrap_or_default();
        let return_type = base_type_name(&def.return_type);
        match self.schema.resolve(return_type)? {
            TypeKind::Leaf if !selection.is_empty() => {
                return Err(SchemaError::SubfieldsOnScalar {
                    path: self.name.clone(),
                    type_name: return_type.to_string(),
                });
            }
            TypeKind::Leaf => {}
            TypeKind::Object(_) if selection.is_empty() => {
                return Err(SchemaError::EmptySelection {
                    path: self.name.clone(),
                    type_name: return_type.to_string(),
                });
            }
            TypeKind::Object(_) => validate_selection(self.schema, return_type, &selection, "")?,
        }

        Ok(QueryDocument {
            kind: self.kind,
            name: self.name,
            arguments,
            selection,
            return_type: def.return_type.clone(),
            declared: def.arguments.clone(),
        })
    }
}

fn validate_selection(
    schema: &Schema,
    type_name: &str,
    selection: &Selection,
    prefix: &str,
) -> Result<(), SchemaError> {
    let TypeKind::Object(object) = schema.resolve(type_name)? else {
        return Ok(());
    };

    for field in selection.iter() {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", prefix, field.name)
        };
        let nested = field.nested.as_ref();

        // every object answers __typename
        if field.name == "__typename" {
            if nested.is_some_and(|n| !n.is_empty()) {
                return Err(SchemaError::SubfieldsOnScalar {
                    path,
                    type_name: "String".to_string(),
                });
            }
            continue;
        }

        let field_type = object
            .fields
            .get(&field.name)
            .ok_or_else(|| SchemaError::UnknownField {
                type_name: type_name.to_string(),
                path: path.clone(),
            })?;
        let field_base = base_type_name(field_type);

        match schema.resolve(field_base)? {
            TypeKind::Leaf => {
                if nested.is_some_and(|n| !n.is_empty()) {
                    return Err(SchemaError::SubfieldsOnScalar {
                        path,
                        type_name: field_base.to_string(),
                    });
                }
            }
            TypeKind::Object(_) => match nested {
                Some(nested) if !nested.is_empty() => {
                    validate_selection(schema, field_base, nested, &path)?
                }
                _ => {
                    return Err(SchemaError::EmptySelection {
                        path,
                        type_name: field_base.to_string(),
                    })
                }
            },
        }
    }
    Ok(())
}
