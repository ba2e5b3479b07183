use thiserror::Error;

/// Transport-level failure of a network fetch.
///
/// An HTTP error status is not a `FetchError`: the server answered, and the
/// response is handed back to the caller like any other.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_builder() {
            FetchError::InvalidRequest(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
