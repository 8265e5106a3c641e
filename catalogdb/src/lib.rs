//! # catalogdb - in-process document query engine
//!
//! catalogdb keeps a collection of schema-less product documents in memory
//! and answers the queries a product catalog needs: filtered lookups with
//! projections, aggregation pipelines and field-level updates.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use catalogdb::{doc, Catalog};
//! use catalogdb::collection::{include_only, project};
//! use catalogdb::filter::field;
//!
//! let catalog = Catalog::builder()
//!     .key_field("product_id")
//!     .open()?;
//!
//! catalog.load(vec![
//!     doc!{ product_id: "ELEC001", name: "Wireless Earbuds", category: "Electronics", price: 45000, stock: 120 },
//!     doc!{ product_id: "ELEC002", name: "Smart Watch", category: "Electronics", price: 60000, stock: 45 },
//! ])?;
//!
//! assert_eq!(catalog.count_documents(None)?, 2);
//!
//! let filter = field("category").eq("Electronics").and(field("price").lt(50000));
//! let options = project(include_only(&["name", "price", "stock"]).exclude("_id"));
//! for product in catalog.find_with_options(&filter, &options)? {
//!     println!("{}", product);
//! }
//! ```
//!
//! ## Design
//!
//! A [Catalog] is a handle around shared state (`Arc` + `RwLock`). Clones see
//! the same documents, readers get copies, and writers are serialized. Queries
//! are plain values: a [Filter](filter::Filter) is a predicate tree, a
//! [Pipeline](aggregate::Pipeline) a validated list of stages and an
//! [Update](collection::Update) a list of field operations. Each can be built
//! in code or from a document such as `{"$match": {"price": {"$lt": 50000}}}`.
//!
//! ## Module Organization
//!
//! - [`aggregate`] - Aggregation pipelines, stages and expressions
//! - [`collection`] - Documents, projections, find options and updates
//! - [`common`] - Values, sort orders, clocks and constants
//! - [`errors`] - Error types and result definitions
//! - [`filter`] - Query filters

pub mod aggregate;
pub mod catalog;
pub mod catalog_builder;
pub mod catalog_config;
pub mod collection;
pub mod common;
pub mod errors;
pub mod filter;

pub use catalog::Catalog;
pub use catalog_builder::CatalogBuilder;
pub use catalog_config::CatalogConfig;
