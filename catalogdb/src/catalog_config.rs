//! Configuration management for a catalog.

use crate::common::{DEFAULT_COLLECTION_NAME, DEFAULT_KEY_FIELD, FIELD_SEPARATOR};
use crate::errors::{CatalogError, CatalogResult, ErrorKind};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Public interface for catalog configuration.
///
/// A configuration is mutable until the catalog built from it is opened;
/// after that every setter fails with `InvalidOperation`.
///
/// # Examples
///
/// ```rust,ignore
/// use catalogdb::Catalog;
///
/// let catalog = Catalog::builder()
///     .key_field("sku")
///     .name("inventory")
///     .open()?;
/// assert_eq!(catalog.config().key_field(), "sku");
/// ```
#[derive(Clone)]
pub struct CatalogConfig {
    inner: Arc<CatalogConfigInner>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogConfig {
    /// Creates a configuration keyed by `product_id`, named `products`.
    pub fn new() -> Self {
        CatalogConfig {
            inner: Arc::new(CatalogConfigInner::new()),
        }
    }

    /// Returns the field that uniquely identifies each document.
    pub fn key_field(&self) -> String {
        self.inner.key_field.read().clone()
    }

    /// Sets the key field.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the catalog is already open, or if the
    /// field is empty or a nested path.
    pub fn set_key_field(&self, key_field: &str) -> CatalogResult<()> {
        self.inner.set_key_field(key_field)
    }

    /// Returns the collection name used in log output.
    pub fn name(&self) -> String {
        self.inner.name.read().clone()
    }

    /// Sets the collection name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the catalog is already open or the name
    /// is empty.
    pub fn set_name(&self, name: &str) -> CatalogResult<()> {
        self.inner.set_name(name)
    }

    pub(crate) fn is_configured(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }

    /// Freezes the configuration.
    pub(crate) fn initialize(&self) {
        self.inner.configured.store(true, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("key_field", &self.key_field())
            .field("name", &self.name())
            .field("configured", &self.is_configured())
            .finish()
    }
}

struct CatalogConfigInner {
    configured: AtomicBool,
    key_field: RwLock<String>,
    name: RwLock<String>,
}

impl CatalogConfigInner {
    fn new() -> Self {
        CatalogConfigInner {
            configured: AtomicBool::from(false),
            key_field: RwLock::new(DEFAULT_KEY_FIELD.to_string()),
            name: RwLock::new(DEFAULT_COLLECTION_NAME.to_string()),
        }
    }

    fn ensure_not_configured(&self, setting: &str) -> CatalogResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after the catalog is opened", setting);
            return Err(CatalogError::new(
                &format!("{} cannot be changed after the catalog is opened", setting),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn set_key_field(&self, key_field: &str) -> CatalogResult<()> {
        self.ensure_not_configured("Key field")?;
        if key_field.is_empty() {
            log::error!("Key field cannot be empty");
            return Err(CatalogError::new(
                "Key field cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }
        if key_field.contains(FIELD_SEPARATOR) {
            log::error!("Key field {} must be a top level field", key_field);
            return Err(CatalogError::new(
                &format!("Key field {} must be a top level field", key_field),
                ErrorKind::InvalidOperation,
            ));
        }
        *self.key_field.write() = key_field.to_string();
        Ok(())
    }

    fn set_name(&self, name: &str) -> CatalogResult<()> {
        self.ensure_not_configured("Catalog name")?;
        if name.trim().is_empty() {
            log::error!("Catalog name cannot be empty");
            return Err(CatalogError::new(
                "Catalog name cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }
        *self.name.write() = name.to_string();
        Ok(())
    }
}
