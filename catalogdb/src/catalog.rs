use crate::aggregate::Pipeline;
use crate::catalog_builder::CatalogBuilder;
use crate::catalog_config::CatalogConfig;
use crate::collection::{push, Document, FindOptions, Projection, Review, Update};
use crate::common::{Clock, Value, REVIEWS_FIELD};
use crate::errors::{CatalogError, CatalogResult, ErrorKind};
use crate::filter::Filter;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// An in-memory collection of product documents keyed by a unique field.
///
/// `Catalog` is a cheap handle: clones share the same documents through an
/// `Arc`. Reads take a shared lock and return copies, so a caller never holds
/// a reference into the store. Writes (`load`, `insert`, `update_one`) take
/// the exclusive lock and are serialized.
///
/// Documents keep their insertion order, which is the order every query
/// observes unless a sort is requested.
///
/// # Examples
///
/// ```rust,ignore
/// use catalogdb::{doc, Catalog};
/// use catalogdb::filter::field;
///
/// let catalog = Catalog::builder().open()?;
/// catalog.load(vec![
///     doc!{ product_id: "ELEC001", category: "Electronics", price: 45000 },
///     doc!{ product_id: "ELEC002", category: "Electronics", price: 60000 },
/// ])?;
///
/// let cheap = catalog.find(&field("category").eq("Electronics").and(field("price").lt(50000)))?;
/// assert_eq!(cheap.len(), 1);
/// ```
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

impl Catalog {
    /// Creates a builder for configuring and opening a catalog.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    pub(crate) fn new(config: CatalogConfig) -> Self {
        Catalog {
            inner: Arc::new(CatalogInner::new(config)),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.inner.config
    }

    /// The field that uniquely identifies each document.
    pub fn key_field(&self) -> &str {
        &self.inner.key_field
    }

    /// Inserts a batch of documents.
    ///
    /// The batch is validated as a whole before anything is stored: either
    /// every document is inserted or none is.
    ///
    /// # Errors
    ///
    /// * `MissingKeyField` - a document has no key field, or its key is `null`
    /// * `UniqueConstraintViolation` - a key repeats within the batch or
    ///   matches a stored document
    pub fn load(&self, documents: Vec<Document>) -> CatalogResult<()> {
        self.inner.load(documents)
    }

    /// Inserts a single document. See [Catalog::load].
    pub fn insert(&self, document: Document) -> CatalogResult<()> {
        self.inner.load(vec![document])
    }

    /// Returns copies of every document in insertion order.
    pub fn all(&self) -> Vec<Document> {
        self.inner.documents.read().values().cloned().collect()
    }

    /// Returns copies of the documents matching `filter`, in insertion order.
    pub fn find(&self, filter: &Filter) -> CatalogResult<Vec<Document>> {
        self.inner.find(filter, &FindOptions::default())
    }

    /// Finds matching documents, then sorts, skips, limits and projects them.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let options = project(include_only(&["name", "price", "stock"]).exclude("_id"))
    ///     .sort_by("price", SortOrder::Ascending);
    /// let electronics = catalog.find_with_options(&field("category").eq("Electronics"), &options)?;
    /// ```
    pub fn find_with_options(&self, filter: &Filter, options: &FindOptions) -> CatalogResult<Vec<Document>> {
        self.inner.find(filter, options)
    }

    /// Returns the first matching document, or `None`.
    pub fn find_one(&self, filter: &Filter) -> CatalogResult<Option<Document>> {
        filter.validate()?;
        Ok(self.inner.first_match(filter).map(|(_, document)| document))
    }

    /// Returns the projection of the first matching document, or `None`.
    pub fn find_one_with_projection(
        &self,
        filter: &Filter,
        projection: &Projection,
    ) -> CatalogResult<Option<Document>> {
        projection.validate_for(&self.inner.key_field)?;
        let document = self.find_one(filter)?;
        Ok(document.map(|document| projection.apply(&document, &self.inner.key_field)))
    }

    /// Applies `update` to the first document in insertion order that matches
    /// `filter`.
    ///
    /// # Returns
    ///
    /// The updated document, or `None` when nothing matches. In that case
    /// the store is left untouched.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidOperation` when the update targets the key field,
    /// pushes onto a non-array, or crosses a scalar on its path. A failed
    /// update leaves the document unchanged.
    pub fn update_one(&self, filter: &Filter, update: &Update) -> CatalogResult<Option<Document>> {
        self.inner.update_one(filter, update)
    }

    /// Appends a review to the `reviews` array of the first matching
    /// document, dated by `clock` unless the review carries its own date.
    pub fn append_review(
        &self,
        filter: &Filter,
        review: &Review,
        clock: &dyn Clock,
    ) -> CatalogResult<Option<Document>> {
        let update = push(REVIEWS_FIELD, review.to_document(clock));
        self.inner.update_one(filter, &update)
    }

    /// Counts the documents matching `filter`, or every document when no
    /// filter is given.
    pub fn count_documents(&self, filter: Option<&Filter>) -> CatalogResult<usize> {
        let documents = self.inner.documents.read();
        match filter {
            None => Ok(documents.len()),
            Some(filter) => {
                filter.validate()?;
                Ok(documents.values().filter(|doc| filter.matches(doc)).count())
            }
        }
    }

    /// Runs an aggregation pipeline over a snapshot of all documents.
    pub fn aggregate(&self, pipeline: &Pipeline) -> CatalogResult<Vec<Document>> {
        let snapshot = self.all();
        log::debug!(
            "Running pipeline {} over {} documents of {}",
            pipeline,
            snapshot.len(),
            self.inner.name
        );
        pipeline.run(snapshot, &self.inner.key_field)
    }

    pub fn size(&self) -> usize {
        self.inner.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.documents.read().is_empty()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("name", &self.inner.name)
            .field("key_field", &self.inner.key_field)
            .field("size", &self.size())
            .finish()
    }
}

struct CatalogInner {
    config: CatalogConfig,
    key_field: String,
    name: String,
    documents: RwLock<IndexMap<Value, Document>>,
}

impl CatalogInner {
    fn new(config: CatalogConfig) -> Self {
        CatalogInner {
            key_field: config.key_field(),
            name: config.name(),
            config,
            documents: RwLock::new(IndexMap::new()),
        }
    }

    fn key_of(&self, document: &Document) -> CatalogResult<Value> {
        match document.get_value(&self.key_field) {
            Some(key) if !key.is_null() => Ok(key.clone()),
            _ => {
                log::error!("Document is missing key field {}", self.key_field);
                Err(CatalogError::new(
                    &format!("Document is missing key field {}", self.key_field),
                    ErrorKind::MissingKeyField,
                ))
            }
        }
    }

    fn load(&self, documents: Vec<Document>) -> CatalogResult<()> {
        let mut store = self.documents.write();

        let mut batch_keys = HashSet::with_capacity(documents.len());
        let mut keyed = Vec::with_capacity(documents.len());
        for document in documents {
            let key = self.key_of(&document)?;
            if store.contains_key(&key) || !batch_keys.insert(key.clone()) {
                log::error!("Duplicate {} {} in {}", self.key_field, key, self.name);
                return Err(CatalogError::new(
                    &format!("Duplicate {} {}", self.key_field, key),
                    ErrorKind::UniqueConstraintViolation,
                ));
            }
            keyed.push((key, document));
        }

        let count = keyed.len();
        store.extend(keyed);
        log::debug!("Loaded {} documents into {}, {} in total", count, self.name, store.len());
        Ok(())
    }

    fn find(&self, filter: &Filter, options: &FindOptions) -> CatalogResult<Vec<Document>> {
        filter.validate()?;
        options.validate(&self.key_field)?;

        let matches: Vec<Document> = self
            .documents
            .read()
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect();
        Ok(options.process(matches, &self.key_field))
    }

    fn first_match(&self, filter: &Filter) -> Option<(Value, Document)> {
        self.documents
            .read()
            .iter()
            .find(|(_, doc)| filter.matches(doc))
            .map(|(key, doc)| (key.clone(), doc.clone()))
    }

    fn update_one(&self, filter: &Filter, update: &Update) -> CatalogResult<Option<Document>> {
        filter.validate()?;
        update.validate()?;
        update.check_key_field(&self.key_field)?;

        let mut store = self.documents.write();
        let target = store.values_mut().find(|doc| filter.matches(doc));
        match target {
            None => {
                log::debug!("No document in {} matches {}", self.name, filter);
                Ok(None)
            }
            Some(document) => {
                let updated = update.apply(document)?;
                *document = updated.clone();
                log::debug!(
                    "Applied {} to {} {}",
                    update,
                    self.key_field,
                    updated.get(&self.key_field)
                );
                Ok(Some(updated))
            }
        }
    }
}
