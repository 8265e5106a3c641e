use crate::common::Value;

use super::{Comparison, Filter};

/// Creates a fluent filter builder for the specified field path.
///
/// # Arguments
///
/// * `field_name` - The field path to filter on, such as `"price"` or
///   `"specifications.brand"`
///
/// # Returns
///
/// A `FluentFilter` builder for constructing field-specific filters
pub fn field(field_name: &str) -> FluentFilter {
    FluentFilter {
        field_name: field_name.to_string(),
    }
}

/// A fluent builder for constructing filters on a specific field.
///
/// Each method consumes the builder and returns a [Filter] that can be passed
/// to the catalog's query methods or combined with other filters.
pub struct FluentFilter {
    field_name: String,
}

impl FluentFilter {
    /// Creates a filter that matches documents where the field equals the specified value.
    ///
    /// Numbers compare numerically regardless of integer or float
    /// representation. A number never equals a string.
    #[inline]
    pub fn eq<T: Into<Value>>(self, value: T) -> Filter {
        Filter::Eq(self.field_name, value.into())
    }

    /// Creates a filter that matches documents where the field does not equal the value.
    #[inline]
    pub fn ne<T: Into<Value>>(self, value: T) -> Filter {
        Filter::Ne(self.field_name, value.into())
    }

    /// Creates a filter that matches documents where the field is greater than the value.
    ///
    /// Both sides must be numbers for the filter to match.
    #[inline]
    pub fn gt<T: Into<Value>>(self, value: T) -> Filter {
        Filter::Range(self.field_name, Comparison::Greater, value.into())
    }

    /// Creates a filter that matches documents where the field is greater than or equal to the value.
    #[inline]
    pub fn gte<T: Into<Value>>(self, value: T) -> Filter {
        Filter::Range(self.field_name, Comparison::GreaterEqual, value.into())
    }

    /// Creates a filter that matches documents where the field is less than the value.
    #[inline]
    pub fn lt<T: Into<Value>>(self, value: T) -> Filter {
        Filter::Range(self.field_name, Comparison::Lesser, value.into())
    }

    /// Creates a filter that matches documents where the field is less than or equal to the value.
    #[inline]
    pub fn lte<T: Into<Value>>(self, value: T) -> Filter {
        Filter::Range(self.field_name, Comparison::LesserEqual, value.into())
    }

    /// Creates a filter that matches documents where the field equals any of the values.
    ///
    /// # Arguments
    ///
    /// * `values` - The candidate values
    #[inline]
    pub fn in_array<T: Into<Value>>(self, values: Vec<T>) -> Filter {
        Filter::In(
            self.field_name,
            values.into_iter().map(|value| value.into()).collect(),
        )
    }
}
