use chrono::NaiveDateTime;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Half-open interval `[start, end)` on the dataset's time column, in UTC.
/// `start >= end` is allowed and matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        t >= self.start && t < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: i64,
    pub limit: i64,
}

/// A value bound to a positional placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Timestamp(NaiveDateTime),
    BigInt(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Paired count and page queries sharing one filter predicate
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub count: SqlResult,
    pub page: SqlResult,
    pub range: Option<TimeRange>,
    pub window: PageWindow,
}
