use crate::collection::{validate_field_path, Document};
use crate::common::{Value, DOC_ID, FIELD_SEPARATOR};
use crate::errors::{malformed, CatalogResult};
use indexmap::IndexMap;

/// Selects the fields of a document returned by a query.
///
/// A projection lists field paths, each either included or excluded.
///
/// * **Inclusion mode** (at least one field included): the result holds the
///   identifier field plus the included fields, in the order they appear in
///   the source document. The identifier is dropped only when excluded
///   explicitly.
/// * **Exclusion mode** (only exclusions): the result is the document minus
///   the excluded fields.
///
/// The key `_id` always names the identifier of the documents being
/// projected: the catalog's key field for stored documents, `_id` itself for
/// documents produced by a group stage. Apart from the identifier, inclusions
/// and exclusions cannot be mixed.
///
/// Paths that cross an array apply to every document element of the array.
///
/// # Examples
///
/// ```rust,ignore
/// let projection = Projection::new()
///     .exclude("_id")
///     .include("name")
///     .include("price");
///
/// let projection = Projection::from_document(&doc!{ _id: 0, name: 1, price: 1 })?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    entries: IndexMap<String, bool>,
}

impl Projection {
    /// Creates an empty projection, which keeps documents unchanged.
    pub fn new() -> Projection {
        Projection {
            entries: IndexMap::new(),
        }
    }

    /// Adds a field path to include.
    pub fn include(mut self, field: &str) -> Projection {
        self.entries.insert(field.to_string(), true);
        self
    }

    /// Adds a field path to exclude.
    pub fn exclude(mut self, field: &str) -> Projection {
        self.entries.insert(field.to_string(), false);
        self
    }

    /// Builds a projection from `{field: 1 | 0 | true | false}`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedStage` for any other value, or when an inclusion
    /// projection excludes more than `_id` and one candidate identifier.
    pub fn from_document(document: &Document) -> CatalogResult<Projection> {
        let mut projection = Projection::new();
        for (field, value) in document.iter() {
            let included = parse_flag(field, value)?;
            projection.entries.insert(field.clone(), included);
        }
        projection.validate()?;
        Ok(projection)
    }

    /// Checks field paths and the mixing rule.
    ///
    /// The identifier of the projected documents is not known yet, so an
    /// inclusion projection may exclude `_id` and at most one other field,
    /// which [Projection::validate_for] later checks against the identifier.
    pub fn validate(&self) -> CatalogResult<()> {
        for field in self.entries.keys() {
            validate_field_path(field)?;
        }

        if self.is_inclusion() {
            check_excluded_identifier(self.excluded_besides_id())?;
        }
        Ok(())
    }

    /// Checks the projection against the identifier field of the documents
    /// it is applied to. Inside an inclusion projection only `_id` and
    /// `id_field` may be excluded.
    pub fn validate_for(&self, id_field: &str) -> CatalogResult<()> {
        self.validate()?;
        if self.is_inclusion() {
            check_excluded_against(self.excluded_besides_id(), id_field, "an inclusion projection")?;
        }
        Ok(())
    }

    // excluded fields other than the `_id` alias
    pub(crate) fn excluded_besides_id(&self) -> impl Iterator<Item = &String> {
        self.entries
            .iter()
            .filter(|(field, included)| !**included && field.as_str() != DOC_ID)
            .map(|(field, _)| field)
    }

    /// Checks whether any field is included.
    pub fn is_inclusion(&self) -> bool {
        self.entries.values().any(|included| *included)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Field paths with their inclusion flag, in the order they were added.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &bool)> {
        self.entries.iter()
    }

    /// Projects a document.
    ///
    /// # Arguments
    ///
    /// * `document` - the source document, left untouched
    /// * `id_field` - the identifier field of the document
    pub fn apply(&self, document: &Document, id_field: &str) -> Document {
        if self.entries.is_empty() {
            return document.clone();
        }

        if self.is_inclusion() {
            self.include_fields(document, id_field)
        } else {
            self.exclude_fields(document, id_field)
        }
    }

    /// Projects in inclusion mode, even when no field is included. Only the
    /// identifier survives in that case, unless it is excluded too.
    pub(crate) fn include_fields(&self, document: &Document, id_field: &str) -> Document {
        let mut tree = PathTree::new();
        let mut keep_id = true;
        for (field, included) in self.entries.iter() {
            let field = resolve_id(field, id_field);
            if *included {
                add_path(&mut tree, field);
            } else if field == id_field {
                keep_id = false;
            }
        }
        if keep_id {
            add_path(&mut tree, id_field);
        }
        include_tree(document, &tree)
    }

    fn exclude_fields(&self, document: &Document, id_field: &str) -> Document {
        let mut tree = PathTree::new();
        for (field, _) in self.entries.iter() {
            if field == DOC_ID {
                add_path(&mut tree, DOC_ID);
            }
            add_path(&mut tree, resolve_id(field, id_field));
        }
        exclude_tree(document, &tree)
    }
}

/// Creates a projection that includes the given fields.
pub fn include_only(fields: &[&str]) -> Projection {
    fields
        .iter()
        .fold(Projection::new(), |projection, field| projection.include(field))
}

pub(crate) fn parse_flag(field: &str, value: &Value) -> CatalogResult<bool> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        other => match other.as_number() {
            Some(number) if number == 1.0 => Ok(true),
            Some(number) if number == 0.0 => Ok(false),
            _ => Err(malformed(&format!(
                "Projection value for '{}' must be 1, 0, true or false, found {}",
                field,
                other.to_debug_string(0)
            ))),
        },
    }
}

// at most one excluded field can be the identifier
pub(crate) fn check_excluded_identifier<'a>(mut excluded: impl Iterator<Item = &'a String>) -> CatalogResult<()> {
    if let (Some(first), Some(second)) = (excluded.next(), excluded.next()) {
        return Err(malformed(&format!(
            "Cannot exclude fields '{}' and '{}' alongside included fields",
            first, second
        )));
    }
    Ok(())
}

pub(crate) fn check_excluded_against<'a>(
    mut excluded: impl Iterator<Item = &'a String>,
    id_field: &str,
    context: &str,
) -> CatalogResult<()> {
    match excluded.find(|field| field.as_str() != id_field) {
        Some(field) => Err(malformed(&format!(
            "Cannot exclude field '{}' in {}",
            field, context
        ))),
        None => Ok(()),
    }
}

fn resolve_id<'a>(field: &'a str, id_field: &'a str) -> &'a str {
    if field == DOC_ID {
        id_field
    } else {
        field
    }
}

enum PathNode {
    Whole,
    Nested(PathTree),
}

type PathTree = IndexMap<String, PathNode>;

fn add_path(tree: &mut PathTree, path: &str) {
    let mut segments = path.split(FIELD_SEPARATOR).peekable();
    let mut current = tree;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), PathNode::Whole);
            return;
        }

        current = match current
            .entry(segment.to_string())
            .or_insert_with(|| PathNode::Nested(PathTree::new()))
        {
            // a parent already selected as a whole covers the sub path
            PathNode::Whole => return,
            PathNode::Nested(sub) => sub,
        };
    }
}

fn include_tree(document: &Document, tree: &PathTree) -> Document {
    let mut result = Document::new();
    for (key, value) in document.iter() {
        match tree.get(key) {
            Some(PathNode::Whole) => result.insert_raw(key.clone(), value.clone()),
            Some(PathNode::Nested(sub)) => {
                if let Some(projected) = include_value(value, sub) {
                    result.insert_raw(key.clone(), projected);
                }
            }
            None => {}
        }
    }
    result
}

fn include_value(value: &Value, tree: &PathTree) -> Option<Value> {
    match value {
        Value::Document(doc) => Some(Value::Document(include_tree(doc, tree))),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| include_value(item, tree))
                .collect(),
        )),
        _ => None,
    }
}

fn exclude_tree(document: &Document, tree: &PathTree) -> Document {
    let mut result = Document::new();
    for (key, value) in document.iter() {
        match tree.get(key) {
            Some(PathNode::Whole) => {}
            Some(PathNode::Nested(sub)) => result.insert_raw(key.clone(), exclude_value(value, sub)),
            None => result.insert_raw(key.clone(), value.clone()),
        }
    }
    result
}

fn exclude_value(value: &Value, tree: &PathTree) -> Value {
    match value {
        Value::Document(doc) => Value::Document(exclude_tree(doc, tree)),
        Value::Array(items) => Value::Array(items.iter().map(|item| exclude_value(item, tree)).collect()),
        other => other.clone(),
    }
}
