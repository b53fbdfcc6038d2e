use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use super::error::QueryError;
use super::types::{PageWindow, TimeRange, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Query string exactly as received; every field is validated by `DatasetParams::parse`
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawDatasetQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// Validated request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetParams {
    pub page: i64,
    pub page_size: i64,
    pub range: Option<TimeRange>,
}

impl DatasetParams {
    pub fn parse(raw: &RawDatasetQuery) -> Result<Self, QueryError> {
        let page = match present(&raw.page) {
            Some(v) => parse_int("page", v)?,
            None => DEFAULT_PAGE,
        };
        if page < 1 {
            return Err(QueryError::invalid("page", "must be greater than or equal to 1"));
        }

        let page_size = match present(&raw.page_size) {
            Some(v) => parse_int("page_size", v)?,
            None => DEFAULT_PAGE_SIZE,
        };
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(QueryError::invalid(
                "page_size",
                format!("must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }

        let start = present(&raw.start_time)
            .map(|v| parse_timestamp("start_time", v))
            .transpose()?;
        let end = present(&raw.end_time)
            .map(|v| parse_timestamp("end_time", v))
            .transpose()?;

        let range = match (start, end) {
            (Some(start), Some(end)) => Some(TimeRange { start, end }),
            (None, None) => None,
            _ => return Err(QueryError::IncompleteTimeRange),
        };

        let params = Self { page, page_size, range };
        params.window()?;
        Ok(params)
    }

    /// `offset = (page - 1) * page_size`, `limit = page_size`
    pub fn window(&self) -> Result<PageWindow, QueryError> {
        let offset = (self.page - 1)
            .checked_mul(self.page_size)
            .ok_or(QueryError::OffsetOverflow)?;
        Ok(PageWindow { offset, limit: self.page_size })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_int(field: &'static str, value: &str) -> Result<i64, QueryError> {
    value
        .parse::<i64>()
        .map_err(|_| QueryError::invalid(field, format!("expected an integer, got {:?}", value)))
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

/// Parse an ISO-8601 datetime, bare date, or Unix seconds into naive UTC
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<NaiveDateTime, QueryError> {
    let invalid = || QueryError::invalid(field, format!("expected an ISO-8601 datetime, got {:?}", value));

    if !value.is_empty() && value.trim_start_matches('-').bytes().all(|b| b.is_ascii_digit()) {
        let secs = value.parse::<i64>().map_err(|_| invalid())?;
        return DateTime::from_timestamp(secs, 0)
            .map(|dt| dt.naive_utc())
            .ok_or_else(invalid);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }

    // An unescaped '+' in a query string arrives as a space
    let restored = restore_plus_offset(value).or_else(|| zulu_as_offset(value));
    let candidate = restored.as_deref().unwrap_or(value);
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(candidate, format) {
            return Ok(dt.naive_utc());
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(invalid)
}

fn restore_plus_offset(value: &str) -> Option<String> {
    let idx = value.rfind(' ')?;
    if idx <= 10 {
        return None;
    }
    let tail = &value[idx + 1..];
    if tail.len() == 5 && tail.as_bytes()[2] == b':' {
        Some(format!("{}+{}", &value[..idx], tail))
    } else {
        None
    }
}

fn zulu_as_offset(value: &str) -> Option<String> {
    value
        .strip_suffix('Z')
        .or_else(|| value.strip_suffix('z'))
        .map(|rest| format!("{}+00:00", rest))
}
