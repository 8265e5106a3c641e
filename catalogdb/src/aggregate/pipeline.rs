use crate::aggregate::Stage;
use crate::collection::Document;
use crate::common::DOC_ID;
use crate::errors::{CatalogError, CatalogResult, ErrorKind};
use itertools::Itertools;

/// An ordered, validated list of aggregation stages.
///
/// Each stage consumes the full output of the previous one. Until a group
/// stage runs, `_id` in projections refers to the store's key field; after
/// it, `_id` is the group key.
///
/// # Examples
///
/// ```rust,ignore
/// let pipeline = Pipeline::from_documents(&[
///     doc!{ "$group": { _id: "$category", avg_price: { "$avg": "$price" }, product_count: { "$sum": 1 } } },
///     doc!{ "$project": { _id: 0, category: "$_id", avg_price: { "$round": ["$avg_price", 2] }, product_count: 1 } },
///     doc!{ "$sort": { avg_price: (-1) } },
/// ])?;
/// let summary = catalog.aggregate(&pipeline)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Creates a pipeline, validating every stage up front.
    ///
    /// # Errors
    ///
    /// Returns `MalformedStage` naming the first invalid stage.
    pub fn new(stages: Vec<Stage>) -> CatalogResult<Pipeline> {
        for (index, stage) in stages.iter().enumerate() {
            if let Err(err) = stage.validate() {
                log::error!("Invalid pipeline stage {} ({}): {}", index, stage.name(), err);
                return Err(CatalogError::new_with_cause(
                    &format!("Invalid pipeline stage {}", index),
                    ErrorKind::MalformedStage,
                    err,
                ));
            }
        }
        Ok(Pipeline { stages })
    }

    /// Parses a pipeline from stage documents.
    pub fn from_documents(documents: &[Document]) -> CatalogResult<Pipeline> {
        let mut stages = Vec::with_capacity(documents.len());
        for (index, document) in documents.iter().enumerate() {
            match Stage::from_document(document) {
                Ok(stage) => stages.push(stage),
                Err(err) => {
                    return Err(CatalogError::new_with_cause(
                        &format!("Invalid pipeline stage {}", index),
                        ErrorKind::MalformedStage,
                        err,
                    ))
                }
            }
        }
        Ok(Pipeline { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub(crate) fn run(&self, documents: Vec<Document>, id_field: &str) -> CatalogResult<Vec<Document>> {
        let mut id_field = id_field;
        let mut documents = documents;

        for (index, stage) in self.stages.iter().enumerate() {
            let before = documents.len();
            documents = match stage {
                Stage::Project(spec) => {
                    if let Err(err) = spec.validate_for(id_field) {
                        return Err(CatalogError::new_with_cause(
                            &format!("Invalid pipeline stage {}", index),
                            ErrorKind::MalformedStage,
                            err,
                        ));
                    }
                    documents
                        .iter()
                        .map(|document| spec.apply(document, id_field))
                        .collect::<CatalogResult<Vec<_>>>()?
                }
                Stage::Match(filter) => documents
                    .into_iter()
                    .filter(|document| filter.matches(document))
                    .collect(),
                Stage::Group(spec) => {
                    id_field = DOC_ID;
                    spec.apply(documents)
                }
                Stage::Sort(fields) => {
                    fields.sort(&mut documents);
                    documents
                }
                Stage::Skip(count) => documents.into_iter().skip(*count as usize).collect(),
                Stage::Limit(count) => documents.into_iter().take(*count as usize).collect(),
            };
            log::debug!("Stage {} turned {} documents into {}", stage, before, documents.len());
        }
        Ok(documents)
    }
}

impl std::fmt::Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.stages.iter().map(|stage| stage.name()).join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Accumulator, Expression, GroupSpec, ProjectSpec};
    use crate::common::{SortOrder, SortableFields, Value};
    use crate::doc;
    use crate::filter::field;

    fn products() -> Vec<Document> {
        vec![
            doc!{ product_id: "E1", category: "Electronics", price: 45000, reviews: [{ rating: 5 }, { rating: 3 }, { rating: 4 }] },
            doc!{ product_id: "E2", category: "Electronics", price: 60000, reviews: [{ rating: 3 }] },
            doc!{ product_id: "B1", category: "Books", price: 500 },
            doc!{ product_id: "B2", category: "Books", price: 701, reviews: [] },
        ]
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let pipeline = Pipeline::new(vec![]).unwrap();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.run(products(), "product_id").unwrap(), products());
    }

    #[test]
    fn test_rating_pipeline() {
        let pipeline = Pipeline::from_documents(&[
            doc!{ "$project": {
                product_id: 1,
                avg_rating: { "$avg": "$reviews.rating" },
                review_count: { "$size": { "$ifNull": ["$reviews", []] } }
            } },
            doc!{ "$match": { avg_rating: { "$gte": 4.0 }, review_count: { "$gt": 0 } } },
            doc!{ "$project": { _id: 0, product_id: 1, avg_rating: { "$round": ["$avg_rating", 2] }, review_count: 1 } },
        ])
        .unwrap();

        let result = pipeline.run(products(), "product_id").unwrap();
        assert_eq!(result, vec![doc!{ product_id: "E1", review_count: 3, avg_rating: 4.0 }]);
    }

    #[test]
    fn test_group_pipeline_switches_identifier() {
        let pipeline = Pipeline::new(vec![
            Stage::Group(
                GroupSpec::new(Expression::field("category"))
                    .accumulate("avg_price", Accumulator::Avg(Expression::field("price")))
                    .accumulate("product_count", Accumulator::count()),
            ),
            Stage::Project(
                ProjectSpec::new()
                    .exclude("_id")
                    .compute("category", Expression::field("_id"))
                    .compute("avg_price", Expression::round(Expression::field("avg_price"), 2))
                    .include("product_count"),
            ),
            Stage::Sort(SortableFields::new().add_sorted_field("avg_price", SortOrder::Descending)),
        ])
        .unwrap();

        let result = pipeline.run(products(), "product_id").unwrap();
        assert_eq!(
            result,
            vec![
                doc!{ product_count: 2, category: "Electronics", avg_price: 52500.0 },
                doc!{ product_count: 2, category: "Books", avg_price: 600.5 },
            ]
        );
    }

    #[test]
    fn test_match_sort_skip_limit() {
        let pipeline = Pipeline::new(vec![
            Stage::Match(field("price").gt(100)),
            Stage::Sort(SortableFields::new().add_sorted_field("price", SortOrder::Ascending)),
            Stage::Skip(1),
            Stage::Limit(2),
        ])
        .unwrap();

        let result = pipeline.run(products(), "product_id").unwrap();
        let ids: Vec<Value> = result.iter().map(|doc| doc.get("product_id")).collect();
        assert_eq!(ids, vec![Value::from("B2"), Value::from("E1")]);
    }

    #[test]
    fn test_invalid_stage_is_reported_with_position() {
        let err = Pipeline::new(vec![Stage::Skip(1), Stage::Limit(0)]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MalformedStage);
        assert_eq!(err.message(), "Invalid pipeline stage 1");
        assert!(err.cause().is_some());

        let err = Pipeline::from_documents(&[doc!{ "$limit": 1 }, doc!{ "$out": "x" }]).unwrap_err();
        assert_eq!(err.message(), "Invalid pipeline stage 1");
    }

    #[test]
    fn test_pipeline_does_not_touch_input_order_without_sort() {
        let pipeline = Pipeline::new(vec![Stage::Match(field("category").eq("Books"))]).unwrap();
        let result = pipeline.run(products(), "product_id").unwrap();
        assert_eq!(result, vec![products()[2].clone(), products()[3].clone()]);
    }

    #[test]
    fn test_display() {
        let pipeline = Pipeline::new(vec![Stage::Skip(1), Stage::Limit(2)]).unwrap();
        assert_eq!(pipeline.to_string(), "[$skip, $limit]");
    }

    #[test]
    fn test_project_excludes_identifier_by_name() {
        let pipeline = Pipeline::from_documents(&[
            doc!{ "$project": { product_id: 0, category: 1, price: 1 } },
            doc!{ "$limit": 1 },
        ])
        .unwrap();
        let result = pipeline.run(products(), "product_id").unwrap();
        assert_eq!(result, vec![doc!{ category: "Electronics", price: 45000 }]);

        let computed = Pipeline::from_documents(&[doc!{ "$project": {
            product_id: 0,
            review_count: { "$size": { "$ifNull": ["$reviews", []] } }
        } }])
        .unwrap();
        let result = computed.run(products(), "product_id").unwrap();
        assert_eq!(result[0], doc!{ review_count: 3 });
    }

    #[test]
    fn test_project_exclusion_of_other_field_fails_when_run() {
        let pipeline = Pipeline::from_documents(&[
            doc!{ "$limit": 2 },
            doc!{ "$project": { price: 0, category: 1 } },
        ])
        .unwrap();
        let err = pipeline.run(products(), "product_id").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MalformedStage);
        assert_eq!(err.message(), "Invalid pipeline stage 1");

        // after a group, the key field is no longer the identifier
        let grouped = Pipeline::from_documents(&[
            doc!{ "$group": { _id: "$category", total: { "$sum": "$price" } } },
            doc!{ "$project": { product_id: 0, total: 1 } },
        ])
        .unwrap();
        assert!(grouped.run(products(), "product_id").is_err());
    }
}
