use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::common::{Value, FIELD_SEPARATOR};
use crate::errors::{CatalogError, CatalogResult, ErrorKind};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};

type FieldVec = SmallVec<[String; 8]>;

/// Represents a schema-less document.
///
/// A document is an insertion-ordered mapping from field name to [Value].
/// The order in which fields were first written is the order they are
/// iterated, printed and projected in.
///
/// Nested values are addressed by field paths joined with the field
/// separator (`.`). For example, with `{"specifications": {"brand": "Acme"}}`,
/// `document.get("specifications.brand")` returns `"Acme"`.
///
/// A path segment that meets an array behaves in one of two ways:
///
/// * a numeric segment indexes into the array (`reviews.0.rating`),
/// * any other segment is applied to every element and the results are
///   flattened into a new array (`reviews.rating` yields every rating, in
///   array order, duplicates kept).
#[derive(Clone, Default)]
pub struct Document {
    data: IndexMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: IndexMap::new(),
        }
    }

    /// Checks if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of top level entries in the document.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Associates the specified [Value] with the specified key in this document.
    ///
    /// The key may be an embedded field path such as `"specifications.brand"`;
    /// missing intermediate documents are created and non-document
    /// intermediate values are replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the key, or any segment of an embedded key, is empty.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let mut doc = Document::new();
    /// doc.put("name", "Wireless Mouse")?;
    /// doc.put("specifications.brand", "Acme")?;
    /// assert_eq!(doc.get("specifications.brand"), Value::from("Acme"));
    /// ```
    pub fn put<'a, T: Into<Value>>(&mut self, key: impl Into<Cow<'a, str>>, value: T) -> CatalogResult<()> {
        let key = key.into();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(CatalogError::new(
                "Document does not support empty key",
                ErrorKind::InvalidFieldName,
            ));
        }

        let value = value.into();
        if key.contains(FIELD_SEPARATOR) {
            let splits: Vec<&str> = key.split(FIELD_SEPARATOR).collect();
            self.deep_put(&splits, value)
        } else {
            self.data.insert(key.into_owned(), value);
            Ok(())
        }
    }

    /// Associates the value with the key taken literally, without splitting
    /// it into an embedded path. Used by the `doc!` macro so that query
    /// documents can carry dotted field paths as plain keys.
    pub fn put_key<'a, T: Into<Value>>(&mut self, key: impl Into<Cow<'a, str>>, value: T) -> CatalogResult<()> {
        let key = key.into();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(CatalogError::new(
                "Document does not support empty key",
                ErrorKind::InvalidFieldName,
            ));
        }
        self.data.insert(key.into_owned(), value.into());
        Ok(())
    }

    pub(crate) fn insert_raw(&mut self, key: String, value: Value) {
        self.data.insert(key, value);
    }

    /// Returns the [Value] for the key, or [Value::Null] if the document holds
    /// no value at that path.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let doc = doc!{ reviews: [{ rating: 5 }, { rating: 3 }] };
    /// assert_eq!(doc.get("reviews.rating"), Value::from(vec![5, 3]));
    /// assert_eq!(doc.get("reviews.1.rating"), Value::from(3));
    /// assert_eq!(doc.get("missing"), Value::Null);
    /// ```
    pub fn get(&self, key: &str) -> Value {
        self.lookup(key).unwrap_or(Value::Null)
    }

    /// Resolves a field path, distinguishing a missing field (`None`) from a
    /// field explicitly holding `null`.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.data.get(key) {
            return Some(value.clone());
        }

        // Only check for embedded key if not found at top level
        if !key.contains(FIELD_SEPARATOR) {
            return None;
        }

        let splits: Vec<&str> = key.split(FIELD_SEPARATOR).collect();
        if splits.iter().any(|s| s.is_empty()) {
            log::warn!("Ignoring field path with an empty segment: {}", key);
            return None;
        }
        recursive_get(self.data.get(splits[0]), &splits[1..])
    }

    /// Borrows the value of a top level key.
    pub(crate) fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns a mutable reference to the value at the field path.
    ///
    /// Unlike [Document::get], arrays are only traversed by numeric index.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        if self.data.contains_key(key) || !key.contains(FIELD_SEPARATOR) {
            return self.data.get_mut(key);
        }

        let mut splits = key.split(FIELD_SEPARATOR);
        let first = splits.next()?;
        let mut current = self.data.get_mut(first)?;
        for segment in splits {
            current = match current {
                Value::Document(doc) => doc.data.get_mut(segment)?,
                Value::Array(arr) => {
                    let index = segment.parse::<usize>().ok()?;
                    arr.get_mut(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Checks if a top level key exists in the document.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Checks if a top level or embedded field exists in the document.
    pub fn contains_field(&self, field: &str) -> bool {
        self.lookup(field).is_some()
    }

    /// Removes the key and its value from the document.
    ///
    /// Embedded keys remove the field from the nested document. Removing an
    /// absent key succeeds. Remaining fields keep their relative order.
    pub fn remove(&mut self, key: &str) -> CatalogResult<()> {
        if self.data.contains_key(key) || !key.contains(FIELD_SEPARATOR) {
            self.data.shift_remove(key);
            return Ok(());
        }

        let (parent, last) = match key.rsplit_once(FIELD_SEPARATOR) {
            Some(split) => split,
            None => return Ok(()),
        };
        if last.is_empty() {
            log::error!("Document does not support empty key");
            return Err(CatalogError::new(
                "Document does not support empty key",
                ErrorKind::InvalidFieldName,
            ));
        }

        if let Some(Value::Document(nested)) = self.get_mut(parent) {
            nested.data.shift_remove(last);
        }
        Ok(())
    }

    /// Merges a document in this document.
    ///
    /// Nested documents present on both sides are merged recursively,
    /// everything else is overwritten by the value from `other`.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.data.iter() {
            match (self.data.get_mut(key), value) {
                (Some(Value::Document(existing)), Value::Document(incoming)) => {
                    existing.merge(incoming);
                }
                _ => {
                    self.data.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Retrieves all leaf field paths of this document, embedded documents
    /// flattened with the field separator.
    pub fn fields(&self) -> FieldVec {
        self.get_fields_internal("")
    }

    /// Top level keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Iterates over the top level entries in document order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.data.iter()
    }

    pub(crate) fn to_pretty_json(&self, indent: usize) -> String {
        if self.data.is_empty() {
            return "{}".to_string();
        }

        let estimated_size = self.data.len() * 30 + indent * 2;
        let mut json_string = String::with_capacity(estimated_size);

        json_string.push_str("{\n");
        let indent_str = " ".repeat(indent + 2);
        for (key, value) in self.data.iter() {
            json_string.push_str(&format!(
                "{}\"{}\": {},\n",
                indent_str,
                key,
                value.to_pretty_json(indent + 2)
            ));
        }

        json_string.pop();
        json_string.pop();
        json_string.push_str(&format!("\n{}}}", " ".repeat(indent)));
        json_string
    }

    pub(crate) fn to_debug_string(&self, indent: usize) -> String {
        if self.data.is_empty() {
            return "{}".to_string();
        }

        let mut debug_string = String::new();
        debug_string.push_str("{\n");
        let indent_str = " ".repeat(indent + 2);
        for (key, value) in self.data.iter() {
            debug_string.push_str(&format!(
                "{}\"{}\": {},\n",
                indent_str,
                key,
                value.to_debug_string(indent + 2)
            ));
        }

        debug_string.pop();
        debug_string.pop();
        debug_string.push_str(&format!("\n{}}}", " ".repeat(indent)));
        debug_string
    }

    fn get_fields_internal(&self, prefix: &str) -> FieldVec {
        let mut fields = FieldVec::new();

        for (key, value) in self.data.iter() {
            let field = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}{}{}", prefix, FIELD_SEPARATOR, key)
            };

            match value {
                Value::Document(doc) if !doc.is_empty() => {
                    fields.append(&mut doc.get_fields_internal(&field));
                }
                _ => fields.push(field),
            }
        }
        fields
    }

    fn deep_put(&mut self, splits: &[&str], value: Value) -> CatalogResult<()> {
        let key = match splits.first() {
            Some(key) if !key.is_empty() => *key,
            _ => {
                log::error!("Document does not support empty key");
                return Err(CatalogError::new(
                    "Document does not support empty key",
                    ErrorKind::InvalidFieldName,
                ));
            }
        };

        if splits.len() == 1 {
            self.data.insert(key.to_string(), value);
            return Ok(());
        }

        let remaining = &splits[1..];
        match self.data.get_mut(key) {
            Some(Value::Document(nested)) => nested.deep_put(remaining, value),
            Some(Value::Array(arr)) if remaining[0].parse::<usize>().is_ok() => {
                let index = remaining[0].parse::<usize>().unwrap_or_default();
                match arr.get_mut(index) {
                    Some(Value::Document(nested)) if remaining.len() > 1 => {
                        nested.deep_put(&remaining[1..], value)
                    }
                    Some(slot) if remaining.len() == 1 => {
                        *slot = value;
                        Ok(())
                    }
                    _ => {
                        log::error!("Cannot resolve array element {} of field {}", index, key);
                        Err(CatalogError::new(
                            &format!("Cannot resolve array element {} of field {}", index, key),
                            ErrorKind::InvalidFieldName,
                        ))
                    }
                }
            }
            _ => {
                // if current level value is absent or a scalar, create a new document
                let mut nested = Document::new();
                nested.deep_put(remaining, value)?;
                self.data.insert(key.to_string(), Value::Document(nested));
                Ok(())
            }
        }
    }
}

fn recursive_get(value: Option<&Value>, splits: &[&str]) -> Option<Value> {
    let value = value?;
    if splits.is_empty() {
        return Some(value.clone());
    }

    match value {
        Value::Document(doc) => recursive_get(doc.data.get(splits[0]), &splits[1..]),
        Value::Array(arr) => match splits[0].parse::<usize>() {
            Ok(index) => recursive_get(arr.get(index), &splits[1..]),
            Err(_) => Some(decompose(arr, splits)),
        },
        _ => None,
    }
}

fn decompose(arr: &[Value], splits: &[&str]) -> Value {
    let mut items: Vec<Value> = Vec::with_capacity(arr.len());
    for item in arr {
        match recursive_get(Some(item), splits) {
            Some(Value::Array(nested)) => items.extend(nested),
            Some(value) => items.push(value),
            None => {}
        }
    }
    Value::Array(items)
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.data.len() == other.data.len() && self.data.iter().eq(other.data.iter())
    }
}

impl Eq for Document {}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Document {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data.iter().cmp(other.data.iter())
    }
}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.len().hash(state);
        for (key, value) in self.data.iter() {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_debug_string(0))
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_pretty_json(0))
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().filter(|(k, _)| !k.is_empty()).collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.data.len()))?;
        for (key, value) in self.data.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Document(doc) => Ok(doc),
            other => Err(serde::de::Error::custom(format!(
                "expected a document, found {}",
                other.type_name()
            ))),
        }
    }
}

/// Checks that a field path is non-empty and has no empty segments.
pub(crate) fn validate_field_path(field: &str) -> CatalogResult<()> {
    if field.is_empty() || field.split(FIELD_SEPARATOR).any(|segment| segment.is_empty()) {
        log::error!("Invalid field path '{}'", field);
        return Err(CatalogError::new(
            &format!("Invalid field path '{}'", field),
            ErrorKind::InvalidFieldName,
        ));
    }
    Ok(())
}

pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a Document with JSON-like syntax.
///
/// Keys are stored literally: `"specifications.brand": 1` produces a single
/// key containing a dot, which is what filter, projection and stage
/// definitions expect.
///
/// # Examples
///
/// ```rust
/// use catalogdb::doc;
///
/// let empty = doc!{};
///
/// let product = doc!{
///     product_id: "ELEC001",
///     price: 45000,
///     reviews: [{ user_id: "U001", rating: 5 }],
///     tags: ["wireless", "bluetooth"]
/// };
///
/// let stage = doc!{ "$match": { "price": { "$lt": 50000 } } };
/// ```
#[macro_export]
macro_rules! doc {
    // match an empty document (with braces for backward compat)
    ({}) => {
        $crate::collection::Document::new()
    };

    // match an empty document
    () => {
        $crate::collection::Document::new()
    };

    // match a document with key value pairs (old syntax with outer braces)
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    // match a document with key value pairs
    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::collection::Document::new();
            $(
                doc.put_key($crate::collection::normalize(stringify!($key)), $crate::doc_value!($value))
                .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

/// Helper macro to convert values for the doc! macro.
/// Handles nested documents, arrays, and expressions.
#[macro_export]
macro_rules! doc_value {
    // match a nested document
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        {
            $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
        }
    };

    // match an array of values
    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    // match an expression (variable, function call, arithmetic in parens, literals, etc.)
    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
