//! Documents and the per-document operations of the catalog.
//!
//! # Documents
//!
//! A [Document] is an insertion-ordered map from field name to [Value](crate::common::Value).
//! Nested fields are addressed with dotted paths (`specifications.brand`),
//! and a path that meets an array applies to every element
//! (`reviews.rating`).
//!
//! ```rust,ignore
//! use catalogdb::doc;
//!
//! let product = doc!{
//!     product_id: "ELEC001",
//!     name: "Wireless Mouse",
//!     price: 45000,
//!     reviews: [{ user_id: "U001", rating: 5 }]
//! };
//! ```
//!
//! # Projections
//!
//! A [Projection] reduces a document to selected fields, see
//! [FindOptions] for combining it with sort, skip and limit.
//!
//! # Updates
//!
//! An [Update] lists field-level modifications (`$push`, `$set`, `$inc`)
//! applied to a copy of a document. [Review] builds the embedded review
//! documents appended to a product.

mod document;
mod find_options;
mod projection;
mod review;
mod update;

pub use document::*;
pub use find_options::*;
pub use projection::*;
pub use review::*;
pub use update::*;
