use crate::collection::{Document, Projection};
use crate::common::{SortOrder, SortableFields};
use crate::errors::CatalogResult;

/// Options for controlling find operations on the catalog.
///
/// `FindOptions` carries an optional sort, skip, limit and projection. They
/// are applied to the matched documents in that order: sort, skip, limit,
/// then projection.
///
/// # Examples
///
/// ```rust,ignore
/// use catalogdb::collection::{FindOptions, Projection};
/// use catalogdb::common::SortOrder;
///
/// let options = FindOptions::new()
///     .sort_by("price", SortOrder::Descending)
///     .skip(10)
///     .limit(20)
///     .project(Projection::new().include("name"));
///
/// // convenience functions
/// let options = order_by("name", SortOrder::Ascending);
/// let options = skip_by(5);
/// let options = limit_to(100);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub(crate) sort_by: Option<SortableFields>,
    pub(crate) skip: Option<u64>,
    pub(crate) limit: Option<u64>,
    pub(crate) projection: Option<Projection>,
}

/// Creates `FindOptions` with sorting by a field.
///
/// # Arguments
///
/// * `field_name` - The field to sort by
/// * `sort_order` - The sort order (Ascending or Descending)
pub fn order_by(field_name: &str, sort_order: SortOrder) -> FindOptions {
    FindOptions::new().sort_by(field_name, sort_order)
}

/// Creates `FindOptions` that skips a number of results.
pub fn skip_by(skip: u64) -> FindOptions {
    FindOptions::new().skip(skip)
}

/// Creates `FindOptions` that limits the number of results.
///
/// Combined with skip for pagination: skip(10).limit(20) returns results 11-30.
pub fn limit_to(limit: u64) -> FindOptions {
    FindOptions::new().limit(limit)
}

/// Creates `FindOptions` that projects every result.
pub fn project(projection: Projection) -> FindOptions {
    FindOptions::new().project(projection)
}

impl FindOptions {
    /// Creates a new `FindOptions` with default settings.
    pub fn new() -> FindOptions {
        FindOptions {
            sort_by: None,
            skip: None,
            limit: None,
            projection: None,
        }
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: u64) -> FindOptions {
        self.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: u64) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    /// Adds a sort field. Later fields break ties left by earlier ones.
    pub fn sort_by(mut self, field_name: &str, sort_order: SortOrder) -> FindOptions {
        let fields = self.sort_by.unwrap_or_default();
        self.sort_by = Some(fields.add_sorted_field(field_name, sort_order));
        self
    }

    /// Sets the projection applied to every result.
    pub fn project(mut self, projection: Projection) -> FindOptions {
        self.projection = Some(projection);
        self
    }

    pub(crate) fn validate(&self, id_field: &str) -> CatalogResult<()> {
        if let Some(sort_by) = &self.sort_by {
            sort_by.validate()?;
        }
        if let Some(projection) = &self.projection {
            projection.validate_for(id_field)?;
        }
        Ok(())
    }

    /// Sorts, pages and projects matched documents.
    pub(crate) fn process(&self, mut documents: Vec<Document>, id_field: &str) -> Vec<Document> {
        if let Some(sort_by) = &self.sort_by {
            sort_by.sort(&mut documents);
        }

        let skip = self.skip.map(|skip| skip as usize).unwrap_or(0);
        let limit = self.limit.map(|limit| limit as usize).unwrap_or(usize::MAX);
        let page = documents.into_iter().skip(skip).take(limit);

        match &self.projection {
            Some(projection) => page.map(|doc| projection.apply(&doc, id_field)).collect(),
            None => page.collect(),
        }
    }
}
