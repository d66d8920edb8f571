use chrono::NaiveDate;

/// Source of "today" for date-driven transitions and proration. Injectable so
/// tests can pin the calendar.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}
