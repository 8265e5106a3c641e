use crate::collection::{validate_field_path, Document};
use crate::common::Value;
use crate::errors::CatalogResult;
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt::Display;

/// Comparison operators of a range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lesser,
    LesserEqual,
    Greater,
    GreaterEqual,
}

impl Comparison {
    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Comparison::Lesser => ordering == Ordering::Less,
            Comparison::LesserEqual => ordering != Ordering::Greater,
            Comparison::Greater => ordering == Ordering::Greater,
            Comparison::GreaterEqual => ordering != Ordering::Less,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Lesser => "<",
            Comparison::LesserEqual => "<=",
            Comparison::Greater => ">",
            Comparison::GreaterEqual => ">=",
        }
    }
}

/// A predicate over a single document.
///
/// Filters are plain values: they are built per call, cloned freely and
/// evaluated with [Filter::matches]. Leaf filters address a field path;
/// combinators nest other filters.
///
/// Evaluation never fails. A comparison between incompatible types, such as
/// a range comparison against a string, simply does not match.
///
/// # Examples
///
/// ```rust,ignore
/// use catalogdb::filter::field;
///
/// let filter = field("category").eq("Electronics").and(field("price").lt(50000));
/// assert!(filter.matches(&product));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    /// The field equals the value. An array field matches when any element
    /// equals a non-array value.
    Eq(String, Value),
    /// Negation of [Filter::Eq].
    Ne(String, Value),
    /// Numeric range comparison of the field against the value.
    Range(String, Comparison, Value),
    /// The field equals any of the values.
    In(String, Vec<Value>),
    /// Every filter matches. Evaluation stops at the first mismatch.
    And(Vec<Filter>),
    /// At least one filter matches. Evaluation stops at the first match.
    Or(Vec<Filter>),
    /// The filter does not match.
    Not(Box<Filter>),
}

impl Filter {
    /// Evaluates this filter against a document.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => equals(&document.get(field), value),
            Filter::Ne(field, value) => !equals(&document.get(field), value),
            Filter::Range(field, comparison, value) => {
                compare(&document.get(field), *comparison, value)
            }
            Filter::In(field, values) => {
                let field_value = document.get(field);
                values.iter().any(|value| equals(&field_value, value))
            }
            Filter::And(filters) => filters.iter().all(|filter| filter.matches(document)),
            Filter::Or(filters) => filters.iter().any(|filter| filter.matches(document)),
            Filter::Not(filter) => !filter.matches(document),
        }
    }

    /// Checks that every field path in the filter tree is usable.
    pub fn validate(&self) -> CatalogResult<()> {
        match self {
            Filter::All => Ok(()),
            Filter::Eq(field, _)
            | Filter::Ne(field, _)
            | Filter::Range(field, _, _)
            | Filter::In(field, _) => validate_field_path(field),
            Filter::And(filters) | Filter::Or(filters) => {
                filters.iter().try_for_each(|filter| filter.validate())
            }
            Filter::Not(filter) => filter.validate(),
        }
    }

    /// Combines this filter with another using logical AND.
    ///
    /// Chained conjunctions are flattened into a single [Filter::And], keeping
    /// the order in which they were written.
    pub fn and(self, filter: Filter) -> Filter {
        match self {
            Filter::And(mut filters) => {
                filters.push(filter);
                Filter::And(filters)
            }
            other => Filter::And(vec![other, filter]),
        }
    }

    /// Combines this filter with another using logical OR.
    pub fn or(self, filter: Filter) -> Filter {
        match self {
            Filter::Or(mut filters) => {
                filters.push(filter);
                Filter::Or(filters)
            }
            other => Filter::Or(vec![other, filter]),
        }
    }

    /// Negates this filter.
    pub fn not(self) -> Filter {
        Filter::Not(Box::new(self))
    }

    /// Checks whether this is the match-everything filter.
    pub fn is_all(&self) -> bool {
        matches!(self, Filter::All)
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::All => write!(f, "All"),
            Filter::Eq(field, value) => write!(f, "({} == {})", field, value.to_debug_string(0)),
            Filter::Ne(field, value) => write!(f, "({} != {})", field, value.to_debug_string(0)),
            Filter::Range(field, comparison, value) => write!(
                f,
                "({} {} {})",
                field,
                comparison.symbol(),
                value.to_debug_string(0)
            ),
            Filter::In(field, values) => write!(
                f,
                "({} in [{}])",
                field,
                values.iter().map(|value| value.to_debug_string(0)).join(", ")
            ),
            Filter::And(filters) => write!(f, "({})", filters.iter().join(" && ")),
            Filter::Or(filters) => write!(f, "({})", filters.iter().join(" || ")),
            Filter::Not(filter) => write!(f, "!{}", filter),
        }
    }
}

/// Creates a filter that matches all documents.
pub fn all() -> Filter {
    Filter::All
}

/// Combines multiple filters using logical AND.
pub fn and(filters: Vec<Filter>) -> Filter {
    Filter::And(filters)
}

/// Combines multiple filters using logical OR.
pub fn or(filters: Vec<Filter>) -> Filter {
    Filter::Or(filters)
}

/// Negates a filter.
pub fn not(filter: Filter) -> Filter {
    Filter::Not(Box::new(filter))
}

fn equals(field_value: &Value, operand: &Value) -> bool {
    if field_value == operand {
        return true;
    }
    match (field_value, operand) {
        (Value::Array(_), Value::Array(_)) => false,
        (Value::Array(elements), _) => elements.iter().any(|element| element == operand),
        _ => false,
    }
}

fn compare(field_value: &Value, comparison: Comparison, operand: &Value) -> bool {
    let operand = match operand.as_number() {
        Some(number) => number,
        None => return false,
    };

    let accepts = |value: &Value| {
        value
            .as_number()
            .and_then(|number| number.partial_cmp(&operand))
            .map(|ordering| comparison.accepts(ordering))
            .unwrap_or(false)
    };

    match field_value {
        Value::Array(elements) => elements.iter().any(accepts),
        other => accepts(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::errors::ErrorKind;
    use crate::filter::field;

    fn product() -> Document {
        doc!{
            product_id: "ELEC001",
            category: "Electronics",
            price: 45000,
            rating: 4.5,
            tags: ["wireless", "bluetooth"],
            reviews: [{ rating: 5 }, { rating: 3 }],
            specifications: { brand: "Acme" }
        }
    }

    #[test]
    fn test_all_matches_everything() {
        assert!(all().matches(&product()));
        assert!(all().matches(&Document::new()));
        assert!(Filter::default().is_all());
    }

    #[test]
    fn test_eq_is_type_sensitive() {
        let doc = product();
        assert!(field("price").eq(45000).matches(&doc));
        assert!(field("price").eq(45000.0).matches(&doc));
        assert!(!field("price").eq("45000").matches(&doc));
        assert!(!field("category").eq("electronics").matches(&doc));
    }

    #[test]
    fn test_eq_on_embedded_field() {
        assert!(field("specifications.brand").eq("Acme").matches(&product()));
    }

    #[test]
    fn test_eq_on_array_matches_any_element() {
        let doc = product();
        assert!(field("tags").eq("wireless").matches(&doc));
        assert!(!field("tags").eq("wired").matches(&doc));
        assert!(field("tags").eq(vec!["wireless", "bluetooth"]).matches(&doc));
        assert!(!field("tags").eq(vec!["wireless"]).matches(&doc));
        assert!(field("reviews.rating").eq(3).matches(&doc));
    }

    #[test]
    fn test_eq_null_matches_missing_field() {
        assert!(field("discount").eq(Value::Null).matches(&product()));
        assert!(!field("price").eq(Value::Null).matches(&product()));
    }

    #[test]
    fn test_ne() {
        let doc = product();
        assert!(field("category").ne("Books").matches(&doc));
        assert!(!field("category").ne("Electronics").matches(&doc));
        assert!(field("price").ne("45000").matches(&doc));
    }

    #[test]
    fn test_range_comparisons() {
        let doc = product();
        assert!(field("price").lt(50000).matches(&doc));
        assert!(!field("price").lt(45000).matches(&doc));
        assert!(field("price").lte(45000).matches(&doc));
        assert!(field("price").gt(44999.5).matches(&doc));
        assert!(field("price").gte(45000).matches(&doc));
        assert!(!field("price").gt(45000).matches(&doc));
        assert!(field("rating").gte(4).matches(&doc));
    }

    #[test]
    fn test_range_with_non_numeric_sides_is_false() {
        let doc = product();
        assert!(!field("category").lt(50000).matches(&doc));
        assert!(!field("category").gt(0).matches(&doc));
        assert!(!field("price").lt("50000").matches(&doc));
        assert!(!field("missing").lt(50000).matches(&doc));
        assert!(!field("missing").gte(Value::Null).matches(&doc));
        assert!(!field("avg").gte(4.0).matches(&doc!{ avg: (Value::Null) }));
    }

    #[test]
    fn test_range_on_array_matches_any_numeric_element() {
        let doc = product();
        assert!(field("reviews.rating").lt(4).matches(&doc));
        assert!(!field("reviews.rating").gt(5).matches(&doc));
        assert!(!field("tags").gt(0).matches(&doc));
    }

    #[test]
    fn test_in() {
        let doc = product();
        assert!(field("category").in_array(vec!["Books", "Electronics"]).matches(&doc));
        assert!(!field("category").in_array(vec!["Books"]).matches(&doc));
        assert!(field("tags").in_array(vec!["bluetooth"]).matches(&doc));
        assert!(!field("category").in_array(Vec::<Value>::new()).matches(&doc));
    }

    #[test]
    fn test_and_or_not() {
        let doc = product();
        let electronics = field("category").eq("Electronics");
        let cheap = field("price").lt(50000);
        let expensive = field("price").gt(50000);

        assert!(electronics.clone().and(cheap.clone()).matches(&doc));
        assert!(!electronics.clone().and(expensive.clone()).matches(&doc));
        assert!(expensive.clone().or(electronics.clone()).matches(&doc));
        assert!(!expensive.clone().or(field("category").eq("Books")).matches(&doc));
        assert!(expensive.clone().not().matches(&doc));
        assert!(!not(cheap).matches(&doc));
        assert!(and(vec![]).matches(&doc));
        assert!(!or(vec![]).matches(&doc));
    }

    #[test]
    fn test_and_chain_is_flattened() {
        let filter = field("a").eq(1).and(field("b").eq(2)).and(field("c").eq(3));
        match filter {
            Filter::And(filters) => assert_eq!(filters.len(), 3),
            other => panic!("expected and filter, got {}", other),
        }
    }

    #[test]
    fn test_validate() {
        assert!(field("specifications.brand").eq(1).validate().is_ok());
        let err = field("").eq(1).validate().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidFieldName);
        assert!(field("a").eq(1).and(field("b..c").lt(2)).validate().is_err());
        assert!(not(field(".a").eq(1)).validate().is_err());
    }

    #[test]
    fn test_display() {
        let filter = field("category").eq("Electronics").and(field("price").lt(50000));
        assert_eq!(
            filter.to_string(),
            "((category == string(\"Electronics\")) && (price < i64(50000)))"
        );
        assert_eq!(field("a").eq(1).not().to_string(), "!(a == i64(1))");
    }
}
