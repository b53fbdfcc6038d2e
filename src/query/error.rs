use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("Provide both start_time and end_time")]
    IncompleteTimeRange,

    #[error("page and page_size address rows beyond the supported offset")]
    OffsetOverflow,
}

impl QueryError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        QueryError::InvalidParameter { field, reason: reason.into() }
    }

    /// Name of the query parameter the error refers to
    pub fn field(&self) -> &'static str {
        match self {
            QueryError::InvalidParameter { field, .. } => field,
            QueryError::IncompleteTimeRange => "start_time",
            QueryError::OffsetOverflow => "page",
        }
    }
}
