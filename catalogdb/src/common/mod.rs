//! Common types shared by every part of the catalog.
//!
//! - [`Value`] - the tagged union stored in documents
//! - [`SortOrder`] / [`SortableFields`] - sort specifications and the stable
//!   document sort used by queries and the sort stage
//! - [`Clock`] - the injected source of the current date
//! - constants for reserved field names

mod clock;
mod constants;
mod sort_order;
mod value;

pub use clock::*;
pub use constants::*;
pub use sort_order::*;
pub use value::*;
