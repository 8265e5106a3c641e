use backtrace::Backtrace;
use serde::{de, ser};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for catalog operations.
///
/// Lookups that find nothing are not errors: they surface as `None` or as an
/// empty result. Comparisons between incompatible types are not errors either,
/// they evaluate to `false`. What remains here are structurally invalid
/// requests and store constraint violations.
///
/// # Examples
///
/// ```rust,ignore
/// use catalogdb::errors::{CatalogError, ErrorKind, CatalogResult};
///
/// fn example() -> CatalogResult<()> {
///     Err(CatalogError::new("Unknown stage $bucket", ErrorKind::MalformedStage))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Structure Errors - raised while building filters, projections, updates and pipelines
    /// A stage, filter, projection or update definition is invalid
    MalformedStage,

    // Operation Errors
    /// The operation is not valid for the target document or field
    InvalidOperation,
    /// Invalid field name or field path
    InvalidFieldName,
    /// The requested resource was not found
    NotFound,

    // Store Constraint Errors
    /// A document does not carry the declared key field
    MissingKeyField,
    /// A key value is already present in the store
    UniqueConstraintViolation,

    // Data Encoding Errors
    /// Error encoding or decoding data
    EncodingError,

    // Generic/Internal Errors - used as fallback
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MalformedStage => write!(f, "Malformed stage"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InvalidFieldName => write!(f, "Invalid field name"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::MissingKeyField => write!(f, "Missing key field"),
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom catalog error type.
///
/// `CatalogError` carries the error message, its kind and an optional cause.
/// A backtrace is captured when the error is created.
///
/// # Examples
///
/// ```rust,ignore
/// use catalogdb::errors::{CatalogError, ErrorKind};
///
/// let err = CatalogError::new("Unknown operator $regex", ErrorKind::MalformedStage);
///
/// let cause = CatalogError::new("Unknown operator $regex", ErrorKind::MalformedStage);
/// let err = CatalogError::new_with_cause("Invalid $match stage", ErrorKind::MalformedStage, cause);
/// ```
#[derive(Clone)]
pub struct CatalogError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<CatalogError>>,
    backtrace: Arc<Backtrace>,
}

impl CatalogError {
    /// Creates a new `CatalogError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        CatalogError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `CatalogError` wrapping a cause error.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: CatalogError) -> Self {
        CatalogError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&CatalogError> {
        self.cause.as_deref()
    }
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Logs and builds a [ErrorKind::MalformedStage] error. Used by the parsers
/// of filter, projection, update and stage definitions.
pub(crate) fn malformed(message: &str) -> CatalogError {
    log::error!("{}", message);
    CatalogError::new(message, ErrorKind::MalformedStage)
}

/// A result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

impl de::Error for CatalogError {
    fn custom<T: Display>(msg: T) -> Self {
        CatalogError::new(&msg.to_string(), ErrorKind::EncodingError)
    }
}

impl ser::Error for CatalogError {
    fn custom<T: Display>(msg: T) -> Self {
        CatalogError::new(&msg.to_string(), ErrorKind::EncodingError)
    }
}

impl From<String> for CatalogError {
    fn from(msg: String) -> Self {
        CatalogError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for CatalogError {
    fn from(msg: &str) -> Self {
        CatalogError::new(msg, ErrorKind::InternalError)
    }
}
