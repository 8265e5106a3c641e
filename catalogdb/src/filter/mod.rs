//! Query filters for selecting documents from the catalog.
//!
//! A [Filter] is a tree of tagged variants: leaf comparisons on a field path
//! and the logical combinators AND, OR and NOT. Filters are evaluated one
//! document at a time with [Filter::matches] and never fail during
//! evaluation.
//!
//! # Creating Filters
//!
//! - `field("price").lt(50000)` - comparison operators
//! - `field("category").eq("Electronics")` - equality checks
//! - `all()` - match all documents
//! - `field("a").eq(1).and(field("b").gt(2))` - logical AND
//! - `Filter::from_document(&doc!{ price: { "$lt": 50000 } })` - document form
//!
//! # Supported Operators
//!
//! - **Equality**: `eq`, `ne`, `in`
//! - **Comparison**: `gt`, `gte`, `lt`, `lte` (numbers only)
//! - **Logical**: `and`, `or`, `not`
//! - **Special**: `all`

mod filter;
mod fluent;
mod parse;

pub use filter::*;
pub use fluent::*;
