use crate::aggregate::expression::{average, NumberTotal};
use crate::aggregate::Expression;
use crate::collection::{
    check_excluded_against, check_excluded_identifier, parse_flag, validate_field_path, Document, Projection,
};
use crate::common::{SortOrder, SortableFields, Value, DOC_ID, FIELD_REFERENCE_PREFIX, FIELD_SEPARATOR};
use crate::errors::{malformed, CatalogResult};
use crate::filter::Filter;
use indexmap::IndexMap;
use std::fmt::Display;

/// One step of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Reshapes each document: includes, excludes and computed fields.
    Project(ProjectSpec),
    /// Keeps the documents that match a filter.
    Match(Filter),
    /// Collapses documents sharing a key into one document per key.
    Group(GroupSpec),
    /// Stable sort by one or more fields.
    Sort(SortableFields),
    /// Drops the first n documents.
    Skip(u64),
    /// Keeps at most n documents.
    Limit(u64),
}

impl Stage {
    /// The stage name as written in stage documents.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Project(_) => "$project",
            Stage::Match(_) => "$match",
            Stage::Group(_) => "$group",
            Stage::Sort(_) => "$sort",
            Stage::Skip(_) => "$skip",
            Stage::Limit(_) => "$limit",
        }
    }

    pub fn validate(&self) -> CatalogResult<()> {
        match self {
            Stage::Project(spec) => spec.validate(),
            Stage::Match(filter) => filter.validate(),
            Stage::Group(spec) => spec.validate(),
            Stage::Sort(fields) => fields.validate(),
            Stage::Skip(_) => Ok(()),
            Stage::Limit(0) => Err(malformed("$limit must be positive")),
            Stage::Limit(_) => Ok(()),
        }
    }

    /// Builds a stage from a single-key stage document such as
    /// `{"$match": {"price": {"$lt": 50000}}}`.
    pub fn from_document(document: &Document) -> CatalogResult<Stage> {
        if document.size() != 1 {
            return Err(malformed(&format!(
                "A stage document must hold exactly one stage, found {} keys",
                document.size()
            )));
        }

        let (name, spec) = match document.iter().next() {
            Some(entry) => entry,
            None => return Err(malformed("Empty stage document")),
        };

        let stage = match name.as_str() {
            "$project" => Stage::Project(ProjectSpec::from_document(stage_document(name, spec)?)?),
            "$match" => Stage::Match(Filter::from_document(stage_document(name, spec)?)?),
            "$group" => Stage::Group(GroupSpec::from_document(stage_document(name, spec)?)?),
            "$sort" => Stage::Sort(parse_sort(stage_document(name, spec)?)?),
            "$skip" => Stage::Skip(parse_count(name, spec)?),
            "$limit" => Stage::Limit(parse_count(name, spec)?),
            other => return Err(malformed(&format!("Unknown pipeline stage {}", other))),
        };
        stage.validate()?;
        Ok(stage)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Match(filter) => write!(f, "$match {}", filter),
            Stage::Skip(count) | Stage::Limit(count) => write!(f, "{} {}", self.name(), count),
            _ => write!(f, "{}", self.name()),
        }
    }
}

fn stage_document<'a>(name: &str, spec: &'a Value) -> CatalogResult<&'a Document> {
    match spec {
        Value::Document(doc) => Ok(doc),
        other => Err(malformed(&format!(
            "{} expects a document, found {}",
            name,
            other.type_name()
        ))),
    }
}

fn parse_count(name: &str, spec: &Value) -> CatalogResult<u64> {
    let count = match spec {
        Value::I64(count) if *count >= 0 => Some(*count as u64),
        Value::F64(count) if *count >= 0.0 && count.fract() == 0.0 => Some(*count as u64),
        _ => None,
    };
    count.ok_or_else(|| {
        malformed(&format!(
            "{} expects a non-negative integer, found {}",
            name,
            spec.to_debug_string(0)
        ))
    })
}

fn parse_sort(spec: &Document) -> CatalogResult<SortableFields> {
    let mut fields = SortableFields::new();
    for (field, direction) in spec.iter() {
        let direction = match direction {
            Value::I64(direction) => *direction,
            Value::F64(direction) if direction.fract() == 0.0 => *direction as i64,
            other => {
                return Err(malformed(&format!(
                    "Sort direction must be 1 or -1, found {}",
                    other.to_debug_string(0)
                )))
            }
        };
        fields = fields.add_sorted_field(field.as_str(), SortOrder::from_direction(direction)?);
    }
    Ok(fields)
}

/// Definition of a project stage.
///
/// Plain inclusions and exclusions follow [Projection]. Computed fields are
/// evaluated against the incoming document and appended after the included
/// fields, in the order they were declared. Any computed field puts the stage
/// in inclusion mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectSpec {
    projection: Projection,
    computed: IndexMap<String, Expression>,
}

impl ProjectSpec {
    pub fn new() -> ProjectSpec {
        ProjectSpec::default()
    }

    pub fn include(mut self, field: &str) -> ProjectSpec {
        self.projection = self.projection.include(field);
        self
    }

    pub fn exclude(mut self, field: &str) -> ProjectSpec {
        self.projection = self.projection.exclude(field);
        self
    }

    /// Adds a computed field.
    pub fn compute(mut self, field: &str, expression: Expression) -> ProjectSpec {
        self.computed.insert(field.to_string(), expression);
        self
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn computed(&self) -> impl Iterator<Item = (&String, &Expression)> {
        self.computed.iter()
    }

    /// Builds the projection from `{field: 1 | 0 | true | false | expression}`.
    pub fn from_document(document: &Document) -> CatalogResult<ProjectSpec> {
        if document.is_empty() {
            return Err(malformed("$project requires at least one field"));
        }

        let mut spec = ProjectSpec::new();
        for (field, value) in document.iter() {
            spec = match value {
                Value::String(text) if text.starts_with(FIELD_REFERENCE_PREFIX) => {
                    spec.compute(field, Expression::from_value(value)?)
                }
                Value::Document(doc) if doc.keys().any(|key| key.starts_with('$')) => {
                    spec.compute(field, Expression::from_value(value)?)
                }
                other if parse_flag(field, other)? => spec.include(field),
                _ => spec.exclude(field),
            };
        }
        spec.validate()?;
        Ok(spec)
    }

    /// Checks the projection, the computed field names and their
    /// expressions. Next to computed fields, only `_id` and one other field
    /// (the identifier, checked when the stage runs) may be excluded.
    pub fn validate(&self) -> CatalogResult<()> {
        self.projection.validate()?;

        if !self.computed.is_empty() {
            check_excluded_identifier(self.projection.excluded_besides_id())?;
        }

        for (field, expression) in self.computed.iter() {
            validate_field_path(field)?;
            if field.starts_with(FIELD_REFERENCE_PREFIX) {
                return Err(malformed(&format!("Invalid computed field name '{}'", field)));
            }
            expression.validate()?;
        }
        Ok(())
    }

    /// Checks the exclusions against the identifier field of the documents
    /// entering the stage.
    pub fn validate_for(&self, id_field: &str) -> CatalogResult<()> {
        self.projection.validate_for(id_field)?;
        if !self.computed.is_empty() {
            check_excluded_against(
                self.projection.excluded_besides_id(),
                id_field,
                "a projection with computed fields",
            )?;
        }
        Ok(())
    }

    pub(crate) fn apply(&self, document: &Document, id_field: &str) -> CatalogResult<Document> {
        if self.computed.is_empty() {
            return Ok(self.projection.apply(document, id_field));
        }

        let mut result = self.projection.include_fields(document, id_field);
        for (field, expression) in self.computed.iter() {
            result.put(field.as_str(), expression.evaluate(document))?;
        }
        Ok(result)
    }
}

/// A per-group aggregate function.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Mean of the numeric values; `null` when there are none.
    Avg(Expression),
    /// Total of the numeric values. `Sum(Literal(1))` counts documents.
    Sum(Expression),
    /// Smallest non-null value.
    Min(Expression),
    /// Largest non-null value.
    Max(Expression),
}

impl Accumulator {
    /// Counts the documents of each group.
    pub fn count() -> Accumulator {
        Accumulator::Sum(Expression::literal(1))
    }

    fn expression(&self) -> &Expression {
        match self {
            Accumulator::Avg(expression)
            | Accumulator::Sum(expression)
            | Accumulator::Min(expression)
            | Accumulator::Max(expression) => expression,
        }
    }

    fn start(&self) -> AccumulatorState {
        match self {
            Accumulator::Avg(_) => AccumulatorState::Avg(Vec::new()),
            Accumulator::Sum(_) => AccumulatorState::Sum(NumberTotal::default()),
            Accumulator::Min(_) => AccumulatorState::Min(None),
            Accumulator::Max(_) => AccumulatorState::Max(None),
        }
    }

    fn from_value(field: &str, value: &Value) -> CatalogResult<Accumulator> {
        let doc = match value {
            Value::Document(doc) if doc.size() == 1 => doc,
            _ => {
                return Err(malformed(&format!(
                    "Accumulator '{}' must be a document with exactly one operator",
                    field
                )))
            }
        };

        let (operator, operand) = match doc.iter().next() {
            Some(entry) => entry,
            None => return Err(malformed("Empty accumulator document")),
        };
        let expression = Expression::from_value(operand)?;
        match operator.as_str() {
            "$avg" => Ok(Accumulator::Avg(expression)),
            "$sum" => Ok(Accumulator::Sum(expression)),
            "$min" => Ok(Accumulator::Min(expression)),
            "$max" => Ok(Accumulator::Max(expression)),
            other => Err(malformed(&format!("Unknown accumulator {}", other))),
        }
    }
}

enum AccumulatorState {
    Avg(Vec<f64>),
    Sum(NumberTotal),
    Min(Option<Value>),
    Max(Option<Value>),
}

impl AccumulatorState {
    fn add(&mut self, value: Value) {
        match self {
            AccumulatorState::Avg(numbers) => {
                if let Some(number) = value.as_number() {
                    numbers.push(number);
                }
            }
            AccumulatorState::Sum(total) => total.add(&value),
            AccumulatorState::Min(current) => {
                if !value.is_null() && current.as_ref().map_or(true, |min| value < *min) {
                    *current = Some(value);
                }
            }
            AccumulatorState::Max(current) => {
                if !value.is_null() && current.as_ref().map_or(true, |max| value > *max) {
                    *current = Some(value);
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            AccumulatorState::Avg(numbers) => average(numbers.into_iter()),
            AccumulatorState::Sum(total) => total.into_value(),
            AccumulatorState::Min(value) | AccumulatorState::Max(value) => value.unwrap_or(Value::Null),
        }
    }
}

/// Definition of a group stage.
///
/// Documents are partitioned by the value of the key expression; a missing
/// key groups under `null`. Each output document holds the key as `_id`
/// followed by the accumulated fields in declaration order. Groups are
/// emitted in the order their keys were first seen.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    key: Expression,
    accumulators: IndexMap<String, Accumulator>,
}

impl GroupSpec {
    /// Creates a group stage keyed by an expression, usually a field
    /// reference such as `Expression::field("category")`.
    pub fn new(key: Expression) -> GroupSpec {
        GroupSpec {
            key,
            accumulators: IndexMap::new(),
        }
    }

    pub fn accumulate(mut self, field: &str, accumulator: Accumulator) -> GroupSpec {
        self.accumulators.insert(field.to_string(), accumulator);
        self
    }

    pub fn key(&self) -> &Expression {
        &self.key
    }

    pub fn accumulators(&self) -> impl Iterator<Item = (&String, &Accumulator)> {
        self.accumulators.iter()
    }

    /// Builds the grouping from `{_id: key, field: {"$avg" | "$sum" | "$min" | "$max": expression}}`.
    pub fn from_document(document: &Document) -> CatalogResult<GroupSpec> {
        let key = match document.get_value(DOC_ID) {
            Some(key) => Expression::from_value(key)?,
            None => return Err(malformed("$group requires an _id")),
        };

        let mut spec = GroupSpec::new(key);
        for (field, value) in document.iter() {
            if field == DOC_ID {
                continue;
            }
            spec = spec.accumulate(field, Accumulator::from_value(field, value)?);
        }
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> CatalogResult<()> {
        self.key.validate()?;
        for (field, accumulator) in self.accumulators.iter() {
            if field.is_empty()
                || field == DOC_ID
                || field.contains(FIELD_SEPARATOR)
                || field.starts_with(FIELD_REFERENCE_PREFIX)
            {
                return Err(malformed(&format!("Invalid group output field '{}'", field)));
            }
            accumulator.expression().validate()?;
        }
        Ok(())
    }

    pub(crate) fn apply(&self, documents: Vec<Document>) -> Vec<Document> {
        let mut groups: IndexMap<Value, Vec<AccumulatorState>> = IndexMap::new();
        for document in documents.iter() {
            let key = self.key.evaluate(document);
            let states = groups
                .entry(key)
                .or_insert_with(|| self.accumulators.values().map(|acc| acc.start()).collect());

            for (state, accumulator) in states.iter_mut().zip(self.accumulators.values()) {
                state.add(accumulator.expression().evaluate(document));
            }
        }

        groups
            .into_iter()
            .map(|(key, states)| {
                let mut output = Document::new();
                output.insert_raw(DOC_ID.to_string(), key);
                for (field, state) in self.accumulators.keys().zip(states) {
                    output.insert_raw(field.clone(), state.finish());
                }
                output
            })
            .collect()
    }
}
