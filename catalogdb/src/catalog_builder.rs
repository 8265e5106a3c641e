use crate::catalog::Catalog;
use crate::catalog_config::CatalogConfig;
use crate::errors::{CatalogError, CatalogResult};

/// Builder for creating and configuring a [Catalog].
///
/// Errors raised by a setter are captured and returned from [CatalogBuilder::open],
/// so the fluent chain never has to be interrupted.
///
/// # Examples
///
/// ```rust,ignore
/// use catalogdb::Catalog;
///
/// // defaults: keyed by product_id
/// let catalog = Catalog::builder().open()?;
///
/// let catalog = Catalog::builder()
///     .key_field("sku")
///     .name("inventory")
///     .open()?;
/// ```
#[derive(Default)]
pub struct CatalogBuilder {
    error: Option<CatalogError>,
    config: CatalogConfig,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        CatalogBuilder {
            error: None,
            config: CatalogConfig::new(),
        }
    }

    /// Sets the field that uniquely identifies each document.
    ///
    /// # Arguments
    ///
    /// * `key_field` - a non-empty top-level field name
    pub fn key_field(mut self, key_field: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_key_field(key_field) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Sets the collection name shown in log output.
    pub fn name(mut self, name: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_name(name) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Opens an empty catalog with the configured settings.
    ///
    /// # Returns
    ///
    /// The first error captured by a setter, or the new catalog.
    pub fn open(self) -> CatalogResult<Catalog> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.config.initialize();
        log::debug!(
            "Opened catalog {} keyed by {}",
            self.config.name(),
            self.config.key_field()
        );
        Ok(Catalog::new(self.config))
    }
}
