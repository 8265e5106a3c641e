use crate::collection::{validate_field_path, Document};
use crate::common::{Value, FIELD_SEPARATOR};
use crate::errors::{malformed, CatalogError, CatalogResult, ErrorKind};
use std::fmt::Display;

/// A single field-level modification.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOperation {
    /// Appends a value to the array at the field path, creating the array
    /// when the field is missing.
    Push(String, Value),
    /// Replaces the value at the field path.
    Set(String, Value),
    /// Adds a number to the numeric value at the field path, treating a
    /// missing field as zero.
    Inc(String, Value),
}

impl UpdateOperation {
    /// The field path this operation modifies.
    pub fn field(&self) -> &str {
        match self {
            UpdateOperation::Push(field, _)
            | UpdateOperation::Set(field, _)
            | UpdateOperation::Inc(field, _) => field,
        }
    }

    fn operator(&self) -> &'static str {
        match self {
            UpdateOperation::Push(_, _) => "$push",
            UpdateOperation::Set(_, _) => "$set",
            UpdateOperation::Inc(_, _) => "$inc",
        }
    }
}

/// An ordered list of field updates applied together to one document.
///
/// Updates never modify a document in place: [Update::apply] works on a copy
/// and either returns the fully updated copy or an error, so a failing
/// operation leaves no partial change behind.
///
/// # Examples
///
/// ```rust,ignore
/// use catalogdb::collection::{push, Update};
///
/// let update = push("reviews", review_doc).set("stock", 119);
/// let update = Update::from_document(&doc!{ "$inc": { stock: (-1) } })?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    operations: Vec<UpdateOperation>,
}

/// Creates an update appending `value` to the array at `field`.
pub fn push<T: Into<Value>>(field: &str, value: T) -> Update {
    Update::new().push(field, value)
}

/// Creates an update replacing the value at `field`.
pub fn set<T: Into<Value>>(field: &str, value: T) -> Update {
    Update::new().set(field, value)
}

/// Creates an update incrementing the number at `field`.
pub fn inc<T: Into<Value>>(field: &str, amount: T) -> Update {
    Update::new().inc(field, amount)
}

impl Update {
    pub fn new() -> Update {
        Update {
            operations: Vec::new(),
        }
    }

    pub fn push<T: Into<Value>>(mut self, field: &str, value: T) -> Update {
        self.operations
            .push(UpdateOperation::Push(field.to_string(), value.into()));
        self
    }

    pub fn set<T: Into<Value>>(mut self, field: &str, value: T) -> Update {
        self.operations
            .push(UpdateOperation::Set(field.to_string(), value.into()));
        self
    }

    pub fn inc<T: Into<Value>>(mut self, field: &str, amount: T) -> Update {
        self.operations
            .push(UpdateOperation::Inc(field.to_string(), amount.into()));
        self
    }

    pub fn operations(&self) -> &[UpdateOperation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Builds an update from `{"$push": {..}, "$set": {..}, "$inc": {..}}`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedStage` for unknown operators, plain (non operator)
    /// keys, operands that are not documents, or an update without any
    /// field.
    pub fn from_document(document: &Document) -> CatalogResult<Update> {
        let mut update = Update::new();
        for (operator, operand) in document.iter() {
            let fields = match operand {
                Value::Document(fields) => fields,
                other => {
                    return Err(malformed(&format!(
                        "{} expects a document, found {}",
                        operator,
                        other.type_name()
                    )))
                }
            };

            for (field, value) in fields.iter() {
                update = match operator.as_str() {
                    "$push" => update.push(field, value.clone()),
                    "$set" => update.set(field, value.clone()),
                    "$inc" => update.inc(field, value.clone()),
                    other => {
                        return Err(malformed(&format!("Unknown update operator {}", other)))
                    }
                };
            }
        }
        update.validate()?;
        Ok(update)
    }

    /// Checks that the update has at least one operation, that every field
    /// path is usable and that every increment is numeric.
    pub fn validate(&self) -> CatalogResult<()> {
        if self.operations.is_empty() {
            return Err(malformed("Update has no operations"));
        }

        for operation in self.operations.iter() {
            validate_field_path(operation.field())?;
            if let UpdateOperation::Inc(field, amount) = operation {
                if !amount.is_number() {
                    return Err(malformed(&format!(
                        "$inc on '{}' expects a number, found {}",
                        field,
                        amount.type_name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Fails if any operation writes the key field or a path below it.
    pub fn check_key_field(&self, key_field: &str) -> CatalogResult<()> {
        let nested_prefix = format!("{}{}", key_field, FIELD_SEPARATOR);
        for operation in self.operations.iter() {
            let field = operation.field();
            if field == key_field || field.starts_with(&nested_prefix) {
                log::error!("Update cannot modify the key field {}", key_field);
                return Err(CatalogError::new(
                    &format!("Update cannot modify the key field {}", key_field),
                    ErrorKind::InvalidOperation,
                ));
            }
        }
        Ok(())
    }

    /// Applies every operation, in order, to a copy of the document.
    pub fn apply(&self, document: &Document) -> CatalogResult<Document> {
        let mut updated = document.clone();
        for operation in self.operations.iter() {
            apply_operation(&mut updated, operation)?;
        }
        Ok(updated)
    }
}

impl Display for Update {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let operations: Vec<String> = self
            .operations
            .iter()
            .map(|operation| format!("{} {}", operation.operator(), operation.field()))
            .collect();
        write!(f, "[{}]", operations.join(", "))
    }
}

/// Returns a copy of the document with `element` appended to the array at
/// `field_path`.
///
/// A missing array is created holding only `element`; existing elements keep
/// their order.
///
/// # Errors
///
/// Returns `InvalidOperation` when the field holds a value that is not an
/// array, or when the path crosses a value that is not a document.
pub fn append_to_array(document: &Document, field_path: &str, element: Value) -> CatalogResult<Document> {
    validate_field_path(field_path)?;
    let mut updated = document.clone();
    push_value(&mut updated, field_path, element)?;
    Ok(updated)
}

fn apply_operation(document: &mut Document, operation: &UpdateOperation) -> CatalogResult<()> {
    match operation {
        UpdateOperation::Push(field, value) => push_value(document, field, value.clone()),
        UpdateOperation::Set(field, value) => {
            check_parents(document, field)?;
            document.put(field.as_str(), value.clone())
        }
        UpdateOperation::Inc(field, amount) => increment(document, field, amount),
    }
}

fn push_value(document: &mut Document, field: &str, element: Value) -> CatalogResult<()> {
    check_parents(document, field)?;
    match document.get_mut(field) {
        Some(Value::Array(items)) => {
            items.push(element);
            Ok(())
        }
        Some(other) => {
            log::error!("Cannot push to field {} holding {}", field, other.type_name());
            Err(CatalogError::new(
                &format!("Cannot push to field {} holding {}", field, other.type_name()),
                ErrorKind::InvalidOperation,
            ))
        }
        None => document.put(field, Value::Array(vec![element])),
    }
}

fn increment(document: &mut Document, field: &str, amount: &Value) -> CatalogResult<()> {
    check_parents(document, field)?;
    match document.get_mut(field) {
        Some(current) => {
            let sum = match (&*current, amount) {
                (Value::I64(a), Value::I64(b)) => match a.checked_add(*b) {
                    Some(sum) => Value::I64(sum),
                    None => Value::F64(*a as f64 + *b as f64),
                },
                (value, amount) => match (value.as_number(), amount.as_number()) {
                    (Some(a), Some(b)) => Value::F64(a + b),
                    _ => {
                        log::error!("Cannot increment field {} holding {}", field, value.type_name());
                        return Err(CatalogError::new(
                            &format!("Cannot increment field {} holding {}", field, value.type_name()),
                            ErrorKind::InvalidOperation,
                        ));
                    }
                },
            };
            *current = sum;
            Ok(())
        }
        None => document.put(field, amount.clone()),
    }
}

// Every existing intermediate value on the path must be a document, or an
// array addressed by a numeric segment. Missing intermediates are created by
// the write itself.
fn check_parents(document: &Document, field: &str) -> CatalogResult<()> {
    let segments: Vec<&str> = field.split(FIELD_SEPARATOR).collect();
    if segments.len() < 2 {
        return Ok(());
    }

    let mut current = match document.get_value(segments[0]) {
        Some(value) => value,
        None => return Ok(()),
    };

    for segment in &segments[1..segments.len() - 1] {
        let next = match current {
            Value::Document(doc) => doc.get_value(segment),
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(index) => items.get(index),
                Err(_) => return Err(unreachable_path(field)),
            },
            _ => return Err(unreachable_path(field)),
        };
        current = match next {
            Some(value) => value,
            None => return Ok(()),
        };
    }

    match current {
        Value::Document(_) => Ok(()),
        Value::Array(_) if segments[segments.len() - 1].parse::<usize>().is_ok() => Ok(()),
        _ => Err(unreachable_path(field)),
    }
}

fn unreachable_path(field: &str) -> CatalogError {
    log::error!("Field path {} crosses a value that is not a document", field);
    CatalogError::new(
        &format!("Field path {} crosses a value that is not a document", field),
        ErrorKind::InvalidOperation,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn product() -> Document {
        doc!{
            product_id: "ELEC001",
            price: 45000,
            stock: 120,
            specifications: { brand: "Acme" },
            reviews: [
                { user_id: "U001", rating: 5 },
                { user_id: "U002", rating: 3 }
            ]
        }
    }

    #[test]
    fn test_append_to_existing_array() {
        let original = product();
        let updated = append_to_array(&original, "reviews", Value::from(doc!{ user_id: "U999", rating: 4 })).unwrap();

        let reviews = updated.get("reviews");
        let reviews = reviews.as_array().unwrap();
        assert_eq!(reviews.len(), 3);
        assert_eq!(&reviews[..2], original.get("reviews").as_array().unwrap().as_slice());
        assert_eq!(reviews[2], Value::from(doc!{ user_id: "U999", rating: 4 }));
        // source untouched
        assert_eq!(original.get("reviews").as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_append_creates_missing_array() {
        let updated = append_to_array(&doc!{ product_id: "BOOK001" }, "reviews", Value::from(1)).unwrap();
        assert_eq!(updated.get("reviews"), Value::from(vec![1]));

        let updated = append_to_array(&doc!{ product_id: "BOOK001" }, "meta.tags", Value::from("new")).unwrap();
        assert_eq!(updated.get("meta"), Value::from(doc!{ tags: ["new"] }));
    }

    #[test]
    fn test_append_to_non_array_fails() {
        let err = append_to_array(&product(), "price", Value::from(1)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

        let err = append_to_array(&product(), "price.history", Value::from(1)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

        let err = append_to_array(&product(), "reviews.tags", Value::from(1)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_append_to_array_element_field() {
        let updated = append_to_array(&product(), "reviews.0.votes", Value::from("U003")).unwrap();
        assert_eq!(updated.get("reviews.0.votes"), Value::from(vec!["U003"]));
    }

    #[test]
    fn test_set() {
        let updated = set("stock", 119).set("specifications.color", "black").apply(&product()).unwrap();
        assert_eq!(updated.get("stock"), Value::from(119));
        assert_eq!(updated.get("specifications.color"), Value::from("black"));
        assert_eq!(updated.get("specifications.brand"), Value::from("Acme"));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let err = set("price.amount", 1).apply(&product()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_inc() {
        let updated = inc("stock", -20).inc("price", 0.5).inc("sold", 3).apply(&product()).unwrap();
        assert_eq!(updated.get("stock"), Value::I64(100));
        assert_eq!(updated.get("price"), Value::F64(45000.5));
        assert_eq!(updated.get("sold"), Value::I64(3));
    }

    #[test]
    fn test_inc_non_numeric_field_fails() {
        let err = inc("product_id", 1).apply(&product()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_failed_operation_leaves_no_partial_change() {
        let original = product();
        let result = set("stock", 0).push("price", 1).apply(&original);
        assert!(result.is_err());
        assert_eq!(original.get("stock"), Value::from(120));
    }

    #[test]
    fn test_check_key_field() {
        assert!(set("stock", 1).check_key_field("product_id").is_ok());
        let err = set("product_id", "X").check_key_field("product_id").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        assert!(push("product_id.history", 1).check_key_field("product_id").is_err());
        assert!(set("product_id_old", 1).check_key_field("product_id").is_ok());
    }

    #[test]
    fn test_from_document() {
        let update = Update::from_document(&doc!{
            "$push": { reviews: { user_id: "U999", rating: 4 } },
            "$set": { stock: 119 },
            "$inc": { sold: 1 }
        })
        .unwrap();

        assert_eq!(
            update,
            push("reviews", doc!{ user_id: "U999", rating: 4 })
                .set("stock", 119)
                .inc("sold", 1)
        );
        assert_eq!(update.to_string(), "[$push reviews, $set stock, $inc sold]");
    }

    #[test]
    fn test_from_document_malformed() {
        let err = Update::from_document(&doc!{ "$pull": { reviews: 1 } }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MalformedStage);
        assert!(Update::from_document(&doc!{ stock: 1 }).is_err());
        assert!(Update::from_document(&doc!{ "$set": 1 }).is_err());
        assert!(Update::from_document(&doc!{ "$inc": { stock: "one" } }).is_err());
        assert!(Update::from_document(&doc!{}).is_err());
        assert!(Update::from_document(&doc!{ "$set": { "a..b": 1 } }).is_err());
    }
}
