use crate::collection::Document;
use crate::common::{
    Clock, Value, REVIEW_COMMENT, REVIEW_DATE, REVIEW_RATING, REVIEW_USERNAME, REVIEW_USER_ID,
};
use crate::errors::{CatalogError, CatalogResult, ErrorKind};
use chrono::NaiveDate;

/// A customer review embedded in a product's `reviews` array.
///
/// Reviews have no lifecycle of their own; they are only ever appended to a
/// product. The date is left empty until the review is turned into a
/// document, where it defaults to the clock's current date.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    user_id: String,
    username: Option<String>,
    rating: Value,
    comment: String,
    date: Option<NaiveDate>,
}

impl Review {
    /// Creates a review.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `rating` is not a number.
    pub fn new<T: Into<Value>>(user_id: &str, rating: T, comment: &str) -> CatalogResult<Review> {
        let rating = rating.into();
        if !rating.is_number() {
            log::error!("Review rating must be a number, found {}", rating.type_name());
            return Err(CatalogError::new(
                &format!("Review rating must be a number, found {}", rating.type_name()),
                ErrorKind::InvalidOperation,
            ));
        }

        Ok(Review {
            user_id: user_id.to_string(),
            username: None,
            rating,
            comment: comment.to_string(),
            date: None,
        })
    }

    pub fn with_username(mut self, username: &str) -> Review {
        self.username = Some(username.to_string());
        self
    }

    /// Pins the review date instead of taking it from the clock.
    pub fn with_date(mut self, date: NaiveDate) -> Review {
        self.date = Some(date);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn rating(&self) -> &Value {
        &self.rating
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Renders the review as an embedded document:
    /// `{user_id, username?, rating, comment, date: "YYYY-MM-DD"}`.
    pub fn to_document(&self, clock: &dyn Clock) -> Document {
        let date = self.date.unwrap_or_else(|| clock.today());

        let mut document = Document::new();
        document.insert_raw(REVIEW_USER_ID.to_string(), Value::from(&self.user_id));
        if let Some(username) = &self.username {
            document.insert_raw(REVIEW_USERNAME.to_string(), Value::from(username));
        }
        document.insert_raw(REVIEW_RATING.to_string(), self.rating.clone());
        document.insert_raw(REVIEW_COMMENT.to_string(), Value::from(&self.comment));
        document.insert_raw(REVIEW_DATE.to_string(), Value::from(date));
        document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FixedClock;
    use crate::doc;

    fn clock() -> FixedClock {
        FixedClock::from_ymd(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_to_document_uses_clock_date() {
        let review = Review::new("U999", 4, "Good value").unwrap().with_username("NewUser");
        assert_eq!(
            review.to_document(&clock()),
            doc!{
                user_id: "U999",
                username: "NewUser",
                rating: 4,
                comment: "Good value",
                date: "2024-03-15"
            }
        );
    }

    #[test]
    fn test_to_document_without_username() {
        let review = Review::new("U999", 4.5, "Good value").unwrap();
        let document = review.to_document(&clock());
        assert!(!document.contains_key("username"));
        assert_eq!(document.get("rating"), Value::F64(4.5));
    }

    #[test]
    fn test_pinned_date_wins_over_clock() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        let review = Review::new("U1", 5, "Great").unwrap().with_date(date);
        assert_eq!(review.to_document(&clock()).get("date"), Value::from("2023-12-01"));
        assert_eq!(review.date(), Some(date));
    }

    #[test]
    fn test_rating_must_be_numeric() {
        let err = Review::new("U1", "five", "Great").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        assert!(Review::new("U1", Value::Null, "Great").is_err());
    }

    #[test]
    fn test_accessors() {
        let review = Review::new("U1", 3, "Okay").unwrap();
        assert_eq!(review.user_id(), "U1");
        assert_eq!(review.username(), None);
        assert_eq!(review.rating(), &Value::I64(3));
        assert_eq!(review.comment(), "Okay");
        assert_eq!(review.date(), None);
    }
}
