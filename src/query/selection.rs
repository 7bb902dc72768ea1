//! Explicit field selections.

use std::fmt;

/// One selected field, optionally with nested subfields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    /// Field name.
    pub name: String,
    /// Subfields, for object-typed fields.
    pub nested: Option<Selection>,
}

/// An ordered, duplicate-free set of selected fields.
///
/// Nothing is ever selected implicitly: the set is exactly what the caller asked for.
///
/// # Examples
///
/// ```
/// use webstack_client::Selection;
///
/// let selection = Selection::from_paths(["id", "meta.totalCount", "meta.offset", "id"]);
/// assert_eq!(selection.to_string(), "{id, meta {totalCount, offset}}");
///
/// let same = Selection::new()
///     .field("id")
///     .nested("meta", Selection::new().field("totalCount").field("offset"));
/// assert_eq!(selection, same);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    fields: Vec<FieldSelection>,
}

impl Selection {
    /// Empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a leaf field. Selecting an already present field is a no-op.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.insert(name.into(), None);
        self
    }

    /// Select an object field with the given subfields. Repeated selections of the
    /// same field are merged.
    pub fn nested(mut self, name: impl Into<String>, selection: Selection) -> Self {
        self.insert(name.into(), Some(selection));
        self
    }

    /// Build a selection from dotted paths such as `"meta.totalCount"`.
    ///
    /// Empty segments are ignored.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selection = Selection::new();
        for path in paths {
            let segments: Vec<&str> = path
                .as_ref()
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            selection.insert_path(&segments);
        }
        selection
    }

    fn insert_path(&mut self, segments: &[&str]) {
        match segments {
            [] => {}
            [leaf] => self.insert(leaf.to_string(), None),
            [head, rest @ ..] => {
                let mut child = Selection::new();
                child.insert_path(rest);
                self.insert(head.to_string(), Some(child));
            }
        }
    }

    fn insert(&mut self, name: String, nested: Option<Selection>) {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => match (existing.nested.as_mut(), nested) {
                (Some(current), Some(more)) => {
                    for field in more.fields {
                        current.insert(field.name, field.nested);
                    }
                }
                (None, Some(more)) => existing.nested = Some(more),
                (_, None) => {}
            },
            None => self.fields.push(FieldSelection { name, nested }),
        }
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Top-level fields in selection order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldSelection> {
        self.fields.iter()
    }

    /// Look up a top-level field.
    pub fn get(&self, name: &str) -> Option<&FieldSelection> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&field.name)?;
            if let Some(nested) = field.nested.as_ref().filter(|n| !n.is_empty()) {
                write!(f, " {}", nested)?;
            }
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_preserves_order() {
        let selection = Selection::new().field("b").field("a").field("c");
        assert_eq!(selection.to_string(), "{b, a, c}");
    }

    #[test]
    fn test_selection_dedupes() {
        let selection = Selection::new().field("id").field("id");
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_nested_merge() {
        let selection = Selection::new()
            .nested("meta", Selection::new().field("a"))
            .field("meta")
            .nested("meta", Selection::new().field("b").field("a"));
        assert_eq!(selection.to_string(), "{meta {a, b}}");
    }

    #[test]
    fn test_from_paths_deep() {
        let selection = Selection::from_paths(["a.b.c", "a.b.d", "a.e", "", "f."]);
        assert_eq!(selection.to_string(), "{a {b {c, d}, e}, f}");
    }
}
