use crate::collection::Document;
use crate::errors::{CatalogError, CatalogResult, ErrorKind};
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Specifies the direction for sorting documents.
///
/// Used by [FindOptions](crate::collection::FindOptions) and by the sort stage
/// of an aggregation pipeline.
///
/// ```text
/// let options = order_by("price", SortOrder::Descending);
/// let products = catalog.find_with_options(all(), &options)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Sort from smallest to largest value
    Ascending,
    /// Sort from largest to smallest value
    Descending,
}

impl SortOrder {
    /// Parses the `1` / `-1` direction used in sort definitions.
    pub fn from_direction(direction: i64) -> CatalogResult<SortOrder> {
        match direction {
            1 => Ok(SortOrder::Ascending),
            -1 => Ok(SortOrder::Descending),
            other => {
                log::error!("Sort direction must be 1 or -1, found {}", other);
                Err(CatalogError::new(
                    &format!("Sort direction must be 1 or -1, found {}", other),
                    ErrorKind::MalformedStage,
                ))
            }
        }
    }

    /// The `1` / `-1` form of this direction.
    pub fn direction(&self) -> i64 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// An ordered list of field paths with their sort directions.
///
/// The first field is the primary key of the sort, later fields only break
/// ties left by earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortableFields {
    sorting_order: SmallVec<[(String, SortOrder); 4]>,
}

impl SortableFields {
    pub fn new() -> SortableFields {
        SortableFields {
            sorting_order: SmallVec::new(),
        }
    }

    /// Creates sort fields from field names, all sorted ascending.
    pub fn with_names(field_names: Vec<String>) -> CatalogResult<SortableFields> {
        if field_names.is_empty() {
            log::error!("Field names cannot be empty");
            return Err(CatalogError::new(
                "Field names cannot be empty",
                ErrorKind::MalformedStage,
            ));
        }

        let mut fields = SortableFields::new();
        for name in field_names {
            fields = fields.add_sorted_field(name, SortOrder::Ascending);
        }
        Ok(fields)
    }

    #[inline]
    pub fn add_field(self, field_name: impl Into<String>) -> SortableFields {
        self.add_sorted_field(field_name, SortOrder::Ascending)
    }

    #[inline]
    pub fn add_sorted_field(mut self, field_name: impl Into<String>, sort_order: SortOrder) -> SortableFields {
        self.sorting_order.push((field_name.into(), sort_order));
        self
    }

    pub fn field_names(&self) -> Vec<String> {
        self.sorting_order.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn sorting_order(&self) -> &[(String, SortOrder)] {
        &self.sorting_order
    }

    pub fn is_empty(&self) -> bool {
        self.sorting_order.is_empty()
    }

    /// Checks that every field path is usable.
    pub fn validate(&self) -> CatalogResult<()> {
        if self.sorting_order.is_empty() {
            log::error!("Sort requires at least one field");
            return Err(CatalogError::new(
                "Sort requires at least one field",
                ErrorKind::MalformedStage,
            ));
        }
        for (field, _) in self.sorting_order.iter() {
            if field.is_empty() || field.split('.').any(|segment| segment.is_empty()) {
                log::error!("Invalid sort field '{}'", field);
                return Err(CatalogError::new(
                    &format!("Invalid sort field '{}'", field),
                    ErrorKind::MalformedStage,
                ));
            }
        }
        Ok(())
    }

    /// Compares two documents field by field. Missing fields compare as null.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, order) in self.sorting_order.iter() {
            let a_value = a.get(field);
            let b_value = b.get(field);

            let cmp = a_value.cmp(&b_value);
            if cmp != Ordering::Equal {
                return match order {
                    SortOrder::Ascending => cmp,
                    SortOrder::Descending => cmp.reverse(),
                };
            }
        }
        Ordering::Equal
    }

    /// Sorts documents in place. The sort is stable: documents that compare
    /// equal keep their input order.
    pub fn sort(&self, documents: &mut [Document]) {
        documents.sort_by(|a, b| self.compare(a, b));
    }
}
