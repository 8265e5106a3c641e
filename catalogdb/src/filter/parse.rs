use crate::collection::{validate_field_path, Document};
use crate::common::Value;
use crate::errors::{malformed, CatalogResult};

use super::{Comparison, Filter};

impl Filter {
    /// Builds a filter from its document form.
    ///
    /// Accepted shapes:
    ///
    /// * `{field: value}` - equality
    /// * `{field: {"$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte": operand}}`
    /// * `{field: {"$in": [values]}}`
    /// * `{field: {"$not": {operator: operand}}}`
    /// * `{"$and": [filters]}`, `{"$or": [filters]}`, `{"$not": filter}`
    ///
    /// Several entries in one document combine with AND, in document order.
    /// Several operators on one field combine the same way. An empty
    /// document matches everything.
    ///
    /// # Errors
    ///
    /// Returns [MalformedStage](crate::errors::ErrorKind::MalformedStage) for
    /// unknown operators, wrong operand shapes, or field documents that mix
    /// operators with plain keys.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let filter = Filter::from_document(&doc!{
    ///     category: "Electronics",
    ///     price: { "$lt": 50000 }
    /// })?;
    /// ```
    pub fn from_document(document: &Document) -> CatalogResult<Filter> {
        let mut filters = Vec::with_capacity(document.size());
        for (key, value) in document.iter() {
            if key.starts_with('$') {
                filters.push(parse_logical(key, value)?);
            } else {
                validate_field_path(key)?;
                filters.push(parse_field(key, value)?);
            }
        }

        Ok(match filters.len() {
            0 => Filter::All,
            1 => filters.remove(0),
            _ => Filter::And(filters),
        })
    }
}

fn parse_logical(operator: &str, operand: &Value) -> CatalogResult<Filter> {
    match operator {
        "$and" => Ok(Filter::And(parse_filter_list(operator, operand)?)),
        "$or" => Ok(Filter::Or(parse_filter_list(operator, operand)?)),
        "$not" => match operand {
            Value::Document(inner) => Ok(Filter::Not(Box::new(Filter::from_document(inner)?))),
            other => Err(malformed(&format!(
                "$not expects a document, found {}",
                other.type_name()
            ))),
        },
        other => Err(malformed(&format!("Unknown query operator {}", other))),
    }
}

fn parse_filter_list(operator: &str, operand: &Value) -> CatalogResult<Vec<Filter>> {
    let items = match operand {
        Value::Array(items) if !items.is_empty() => items,
        _ => {
            return Err(malformed(&format!(
                "{} expects a non-empty array of documents",
                operator
            )))
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::Document(doc) => Filter::from_document(doc),
            other => Err(malformed(&format!(
                "{} expects documents, found {}",
                operator,
                other.type_name()
            ))),
        })
        .collect()
}

fn parse_field(field: &str, value: &Value) -> CatalogResult<Filter> {
    let operators = match value {
        Value::Document(doc) if is_operator_document(doc)? => doc,
        other => return Ok(Filter::Eq(field.to_string(), other.clone())),
    };

    let mut filters = Vec::with_capacity(operators.size());
    for (operator, operand) in operators.iter() {
        filters.push(parse_operator(field, operator, operand)?);
    }

    Ok(match filters.len() {
        1 => filters.remove(0),
        _ => Filter::And(filters),
    })
}

// a field document is either all operators or a literal document
fn is_operator_document(doc: &Document) -> CatalogResult<bool> {
    let operator_count = doc.keys().filter(|key| key.starts_with('$')).count();
    if operator_count == 0 {
        return Ok(false);
    }
    if operator_count != doc.size() {
        return Err(malformed(
            "Field condition mixes query operators with plain fields",
        ));
    }
    Ok(true)
}

fn parse_operator(field: &str, operator: &str, operand: &Value) -> CatalogResult<Filter> {
    let field = field.to_string();
    match operator {
        "$eq" => Ok(Filter::Eq(field, operand.clone())),
        "$ne" => Ok(Filter::Ne(field, operand.clone())),
        "$gt" => Ok(Filter::Range(field, Comparison::Greater, operand.clone())),
        "$gte" => Ok(Filter::Range(field, Comparison::GreaterEqual, operand.clone())),
        "$lt" => Ok(Filter::Range(field, Comparison::Lesser, operand.clone())),
        "$lte" => Ok(Filter::Range(field, Comparison::LesserEqual, operand.clone())),
        "$in" => match operand {
            Value::Array(values) => Ok(Filter::In(field, values.clone())),
            other => Err(malformed(&format!(
                "$in expects an array, found {}",
                other.type_name()
            ))),
        },
        "$not" => match operand {
            Value::Document(doc) if is_operator_document(doc)? => {
                Ok(Filter::Not(Box::new(parse_field(&field, operand)?)))
            }
            _ => Err(malformed("$not on a field expects an operator document")),
        },
        other => Err(malformed(&format!("Unknown query operator {}", other))),
    }
}
