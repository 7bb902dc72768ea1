//! Typed GraphQL document construction.
//!
//! - [`Selection`] - explicit, ordered field selections
//! - [`QueryBuilder`] - validates an operation, its arguments and selection against a
//!   [`Schema`](crate::Schema)
//! - [`QueryDocument`] - the immutable result, rendered as GraphQL text plus `variables`

mod builder;
mod document;
mod selection;

pub use builder::QueryBuilder;
pub use document::{Argument, OperationKind, QueryDocument};
pub use selection::{FieldSelection, Selection};
