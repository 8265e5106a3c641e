// field path constants
pub const FIELD_SEPARATOR: &str = ".";
pub const FIELD_REFERENCE_PREFIX: &str = "$";

// doc constants
pub const DOC_ID: &str = "_id";
pub const DEFAULT_KEY_FIELD: &str = "product_id";
pub const DEFAULT_COLLECTION_NAME: &str = "products";

// review constants
pub const REVIEWS_FIELD: &str = "reviews";
pub const REVIEW_USER_ID: &str = "user_id";
pub const REVIEW_USERNAME: &str = "username";
pub const REVIEW_RATING: &str = "rating";
pub const REVIEW_COMMENT: &str = "comment";
pub const REVIEW_DATE: &str = "date";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// rounding bounds accepted by the round expression
pub const MIN_ROUND_DIGITS: i64 = -20;
pub const MAX_ROUND_DIGITS: i64 = 100;
