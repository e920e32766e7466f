use crate::core::retry::RetryCategory;
use crate::http::HttpRequest;
use crate::storage::StorageError;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to decode response body: {0}")]
    DecodingError(String),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Maximum retries reached for {url} (category: {category:?})")]
    MaxRetriesReached { category: RetryCategory, url: Url },
}

/// Errors travel together with the request that produced them so the
/// crawler can retry the request or route it to error storage.
pub type ScraperResult<T> = Result<T, (ScraperError, Box<HttpRequest>)>;
