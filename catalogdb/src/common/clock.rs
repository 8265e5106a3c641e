use chrono::{Local, NaiveDate};

/// Supplies the current calendar date.
///
/// Mutations that stamp a date (such as appending a review) take a clock at
/// call time instead of reading the system time themselves.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Reads the local date from the system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always returns the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl FixedClock {
    /// Creates a clock fixed at the given calendar date, or `None` if the date
    /// does not exist.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<FixedClock> {
        NaiveDate::from_ymd_opt(year, month, day).map(FixedClock)
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
