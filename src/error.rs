use std::time::Duration;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid fetch request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Fetch cancelled after {pages_completed} pages ({rows_collected} rows collected)")]
    Cancelled {
        pages_completed: u64,
        rows_collected: u64,
    },

    #[error("Config Error: {0}")]
    Config(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Failure of a single page submission, as reported by a `QueryEndpoint`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered but reported a failure (bad query, server fault).
    #[error("Endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },

    /// The body could not be decoded as JSON at all.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Valid JSON that does not have the SPARQL results shape.
    #[error("Invalid results shape: {0}")]
    InvalidShape(String),
}

/// Terminal failure of a whole run. Carries where it stopped and what was
/// already collected, so the caller can report it precisely.
#[derive(Debug, Error)]
#[error(
    "Page {page_index} (offset {offset}) failed after {attempts} attempt(s); \
     {pages_completed} pages / {rows_collected} rows collected before failure: {cause}"
)]
pub struct FetchError {
    pub page_index: u64,
    pub offset: u64,
    pub attempts: u32,
    pub pages_completed: u64,
    pub rows_collected: u64,
    #[source]
    pub cause: PageError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_reports_position() {
        let err = FetchError {
            page_index: 1,
            offset: 10,
            attempts: 3,
            pages_completed: 1,
            rows_collected: 10,
            cause: PageError::Timeout(Duration::from_secs(30)),
        };
        let msg = err.to_string();
        assert!(msg.contains("offset 10"));
        assert!(msg.contains("10 rows"));
        assert!(msg.contains("3 attempt"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn fetch_error_converts_into_crate_error() {
        let err: Error = FetchError {
            page_index: 0,
            offset: 0,
            attempts: 1,
            pages_completed: 0,
            rows_collected: 0,
            cause: PageError::InvalidShape("missing head".into()),
        }
        .into();
        assert!(matches!(err, Error::Fetch(ref f) if f.page_index == 0));
    }
}
