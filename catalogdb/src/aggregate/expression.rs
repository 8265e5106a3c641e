use crate::collection::{validate_field_path, Document};
use crate::common::{Value, FIELD_REFERENCE_PREFIX, MAX_ROUND_DIGITS, MIN_ROUND_DIGITS};
use crate::errors::{malformed, CatalogResult};
use indexmap::IndexMap;

/// A computed value, evaluated against one document at a time.
///
/// Expressions never fail during evaluation: a field that is missing
/// evaluates to `null`, and an operator given an operand of the wrong type
/// yields `null` (or, for `sum`, zero).
///
/// # Examples
///
/// ```rust,ignore
/// // {$avg: "$reviews.rating"}
/// let avg_rating = Expression::avg(Expression::field("reviews.rating"));
///
/// // {$size: {$ifNull: ["$reviews", []]}}
/// let review_count = Expression::size(Expression::if_null(
///     Expression::field("reviews"),
///     Expression::literal(Value::Array(vec![])),
/// ));
///
/// // {$round: ["$avg_rating", 2]}
/// let rounded = Expression::round(Expression::field("avg_rating"), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A constant.
    Literal(Value),
    /// The value at a field path (`"$reviews.rating"`).
    Field(String),
    /// An array whose elements are computed.
    Array(Vec<Expression>),
    /// A document whose field values are computed.
    Object(IndexMap<String, Expression>),
    /// Mean of the numbers the operand yields.
    Avg(Box<Expression>),
    /// Total of the numbers the operand yields.
    Sum(Box<Expression>),
    /// Smallest non-null value the operand yields.
    Min(Box<Expression>),
    /// Largest non-null value the operand yields.
    Max(Box<Expression>),
    /// Number of elements of an array.
    Size(Box<Expression>),
    /// The first operand, or the second when the first is null or missing.
    IfNull(Box<Expression>, Box<Expression>),
    /// Rounds a number to the given decimal places, half away from zero.
    Round(Box<Expression>, i64),
}

impl Expression {
    pub fn literal<T: Into<Value>>(value: T) -> Expression {
        Expression::Literal(value.into())
    }

    pub fn field(path: &str) -> Expression {
        Expression::Field(path.to_string())
    }

    pub fn avg(operand: Expression) -> Expression {
        Expression::Avg(Box::new(operand))
    }

    pub fn sum(operand: Expression) -> Expression {
        Expression::Sum(Box::new(operand))
    }

    pub fn min(operand: Expression) -> Expression {
        Expression::Min(Box::new(operand))
    }

    pub fn max(operand: Expression) -> Expression {
        Expression::Max(Box::new(operand))
    }

    pub fn size(operand: Expression) -> Expression {
        Expression::Size(Box::new(operand))
    }

    pub fn if_null(operand: Expression, replacement: Expression) -> Expression {
        Expression::IfNull(Box::new(operand), Box::new(replacement))
    }

    pub fn round(operand: Expression, digits: i64) -> Expression {
        Expression::Round(Box::new(operand), digits)
    }

    /// Evaluates the expression against a document.
    pub fn evaluate(&self, document: &Document) -> Value {
        match self {
            Expression::Literal(value) => value.clone(),
            Expression::Field(path) => document.get(path),
            Expression::Array(items) => {
                Value::Array(items.iter().map(|item| item.evaluate(document)).collect())
            }
            Expression::Object(fields) => {
                let mut result = Document::new();
                for (name, expression) in fields.iter() {
                    result.insert_raw(name.clone(), expression.evaluate(document));
                }
                Value::Document(result)
            }
            Expression::Avg(operand) => {
                let operand = operand.evaluate(document);
                average(numbers(&operand))
            }
            Expression::Sum(operand) => {
                let operand = operand.evaluate(document);
                let mut total = NumberTotal::default();
                for value in elements(&operand) {
                    total.add(value);
                }
                total.into_value()
            }
            Expression::Min(operand) => {
                let operand = operand.evaluate(document);
                elements(&operand)
                    .filter(|value| !value.is_null())
                    .min()
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            Expression::Max(operand) => {
                let operand = operand.evaluate(document);
                elements(&operand)
                    .filter(|value| !value.is_null())
                    .max()
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            Expression::Size(operand) => match operand.evaluate(document) {
                Value::Array(items) => Value::I64(items.len() as i64),
                _ => Value::Null,
            },
            Expression::IfNull(operand, replacement) => match operand.evaluate(document) {
                Value::Null => replacement.evaluate(document),
                value => value,
            },
            Expression::Round(operand, digits) => round_value(operand.evaluate(document), *digits),
        }
    }

    /// Checks field paths and operands throughout the expression tree.
    pub fn validate(&self) -> CatalogResult<()> {
        match self {
            Expression::Literal(_) => Ok(()),
            Expression::Field(path) => validate_field_path(path),
            Expression::Array(items) => items.iter().try_for_each(|item| item.validate()),
            Expression::Object(fields) => {
                for (name, expression) in fields.iter() {
                    if name.is_empty() || name.starts_with(FIELD_REFERENCE_PREFIX) {
                        return Err(malformed(&format!("Invalid computed field name '{}'", name)));
                    }
                    expression.validate()?;
                }
                Ok(())
            }
            Expression::Avg(operand)
            | Expression::Sum(operand)
            | Expression::Min(operand)
            | Expression::Max(operand)
            | Expression::Size(operand) => operand.validate(),
            Expression::IfNull(operand, replacement) => {
                operand.validate()?;
                replacement.validate()
            }
            Expression::Round(operand, digits) => {
                if !(MIN_ROUND_DIGITS..=MAX_ROUND_DIGITS).contains(digits) {
                    return Err(malformed(&format!(
                        "$round digits must be between {} and {}, found {}",
                        MIN_ROUND_DIGITS, MAX_ROUND_DIGITS, digits
                    )));
                }
                operand.validate()
            }
        }
    }

    /// Builds an expression from its document form.
    ///
    /// * `"$path"` - field reference
    /// * other strings, numbers, booleans, null - literals
    /// * arrays - arrays of expressions
    /// * `{"$avg" | "$sum" | "$min" | "$max": operand}` - an array operand
    ///   is a list of expressions, anything else a single expression
    /// * `{"$size": operand}`, `{"$ifNull": [operand, replacement]}`,
    ///   `{"$round": [operand, digits]}`, `{"$literal": value}`
    /// * documents without operators - documents of expressions
    pub fn from_value(value: &Value) -> CatalogResult<Expression> {
        let expression = parse(value)?;
        expression.validate()?;
        Ok(expression)
    }
}

fn parse(value: &Value) -> CatalogResult<Expression> {
    match value {
        Value::String(text) => match text.strip_prefix(FIELD_REFERENCE_PREFIX) {
            Some(path) if path.starts_with(FIELD_REFERENCE_PREFIX) => {
                Err(malformed(&format!("Variables are not supported: {}", text)))
            }
            Some(path) => Ok(Expression::Field(path.to_string())),
            None => Ok(Expression::Literal(value.clone())),
        },
        Value::Array(items) => Ok(Expression::Array(
            items.iter().map(parse).collect::<CatalogResult<Vec<_>>>()?,
        )),
        Value::Document(doc) => parse_document(doc),
        _ => Ok(Expression::Literal(value.clone())),
    }
}

fn parse_document(doc: &Document) -> CatalogResult<Expression> {
    let operator_count = doc.keys().filter(|key| key.starts_with('$')).count();
    if operator_count == 0 {
        let mut fields = IndexMap::with_capacity(doc.size());
        for (name, value) in doc.iter() {
            fields.insert(name.clone(), parse(value)?);
        }
        return Ok(Expression::Object(fields));
    }

    if doc.size() != 1 {
        return Err(malformed(
            "An expression document must hold exactly one operator",
        ));
    }

    // size checked above
    let (operator, operand) = match doc.iter().next() {
        Some(entry) => entry,
        None => return Err(malformed("Empty expression document")),
    };
    parse_operator(operator, operand)
}

fn parse_operator(operator: &str, operand: &Value) -> CatalogResult<Expression> {
    match operator {
        "$literal" => Ok(Expression::Literal(operand.clone())),
        "$avg" => Ok(Expression::avg(parse(operand)?)),
        "$sum" => Ok(Expression::sum(parse(operand)?)),
        "$min" => Ok(Expression::min(parse(operand)?)),
        "$max" => Ok(Expression::max(parse(operand)?)),
        "$size" => {
            let args = arguments(operator, operand, 1, 1)?;
            Ok(Expression::size(parse(args[0])?))
        }
        "$ifNull" => {
            let args = arguments(operator, operand, 2, 2)?;
            Ok(Expression::if_null(parse(args[0])?, parse(args[1])?))
        }
        "$round" => {
            let args = arguments(operator, operand, 1, 2)?;
            let digits = match args.get(1) {
                None => 0,
                Some(Value::I64(digits)) => *digits,
                Some(Value::F64(digits)) if digits.fract() == 0.0 => *digits as i64,
                Some(other) => {
                    return Err(malformed(&format!(
                        "$round digits must be an integer, found {}",
                        other.to_debug_string(0)
                    )))
                }
            };
            Ok(Expression::round(parse(args[0])?, digits))
        }
        other => Err(malformed(&format!("Unknown expression operator {}", other))),
    }
}

// `$op: [a, b]` takes a list, `$op: a` is a single argument
fn arguments<'a>(operator: &str, operand: &'a Value, min: usize, max: usize) -> CatalogResult<Vec<&'a Value>> {
    let args: Vec<&Value> = match operand {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(malformed(&format!(
            "{} expects {} arguments, found {}",
            operator,
            expected,
            args.len()
        )));
    }
    Ok(args)
}

// an array operand contributes its elements, anything else itself
fn elements(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        single => Box::new(std::iter::once(single)),
    }
}

fn numbers(value: &Value) -> impl Iterator<Item = f64> + '_ {
    elements(value).filter_map(|value| value.as_number())
}

pub(crate) fn average(numbers: impl Iterator<Item = f64>) -> Value {
    let (sum, count) = numbers.fold((0.0, 0usize), |(sum, count), number| (sum + number, count + 1));
    if count == 0 {
        Value::Null
    } else {
        Value::F64(sum / count as f64)
    }
}

/// Running total that stays integral until a float or an overflow shows up.
#[derive(Debug, Clone, Copy)]
pub(crate) enum NumberTotal {
    Int(i64),
    Float(f64),
}

impl Default for NumberTotal {
    fn default() -> Self {
        NumberTotal::Int(0)
    }
}

impl NumberTotal {
    /// Adds a numeric value; anything else is ignored.
    pub(crate) fn add(&mut self, value: &Value) {
        *self = match (*self, value) {
            (NumberTotal::Int(total), Value::I64(number)) => match total.checked_add(*number) {
                Some(sum) => NumberTotal::Int(sum),
                None => NumberTotal::Float(total as f64 + *number as f64),
            },
            (NumberTotal::Int(total), Value::F64(number)) => NumberTotal::Float(total as f64 + number),
            (NumberTotal::Float(total), other) => match other.as_number() {
                Some(number) => NumberTotal::Float(total + number),
                None => NumberTotal::Float(total),
            },
            (current, _) => current,
        };
    }

    pub(crate) fn into_value(self) -> Value {
        match self {
            NumberTotal::Int(total) => Value::I64(total),
            NumberTotal::Float(total) => Value::F64(total),
        }
    }
}

fn round_value(value: Value, digits: i64) -> Value {
    match value {
        Value::I64(number) if digits >= 0 => Value::I64(number),
        Value::I64(number) => {
            let factor = 10f64.powi(-digits as i32);
            Value::I64(((number as f64 / factor).round() * factor) as i64)
        }
        Value::F64(number) if number.is_finite() && digits < 0 => {
            let factor = 10f64.powi(-digits as i32);
            Value::F64((number / factor).round() * factor)
        }
        Value::F64(number) if number.is_finite() => {
            let factor = 10f64.powi(digits as i32);
            let scaled = number * factor;
            if scaled.is_finite() {
                Value::F64(scaled.round() / factor)
            } else {
                Value::F64(number)
            }
        }
        Value::F64(number) => Value::F64(number),
        _ => Value::Null,
    }
}
