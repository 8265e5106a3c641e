//! Aggregation pipelines.
//!
//! A [Pipeline] is a sequence of [Stage]s run over a snapshot of the
//! catalog. Stages can be built in code or parsed from stage documents:
//!
//! ```rust,ignore
//! use catalogdb::aggregate::Pipeline;
//! use catalogdb::doc;
//!
//! let top_rated = Pipeline::from_documents(&[
//!     doc!{ "$project": {
//!         product_id: 1, name: 1, category: 1,
//!         avg_rating: { "$avg": "$reviews.rating" },
//!         review_count: { "$size": { "$ifNull": ["$reviews", []] } }
//!     } },
//!     doc!{ "$match": { avg_rating: { "$gte": 4.0 }, review_count: { "$gt": 0 } } },
//! ])?;
//! ```
//!
//! Supported stages are `$project`, `$match`, `$group`, `$sort`, `$skip` and
//! `$limit`. Computed values are described by [Expression] and group
//! aggregates by [Accumulator].

mod expression;
mod pipeline;
mod stage;

pub use expression::Expression;
pub use pipeline::*;
pub use stage::*;
