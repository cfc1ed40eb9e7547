//! Remote collection API access

use async_trait::async_trait;
use futures_util::Stream;
use reqwest::header::HeaderMap;
use std::pin::Pin;

pub mod github;
pub mod github_config;
pub mod http;
pub mod pagination;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Connection refused, timeout or any other failure before a status line arrived
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status other than a rate-limit rejection
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Status code returned by the remote
        status: u16,
        /// Requested URL
        url: String,
    },

    /// 403 that is not a recoverable rate-limit rejection
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Rate limit still exhausted after the allowed number of waits
    #[error("rate limit exceeded for {url} after {attempts} attempts")]
    RateLimitExceeded {
        /// Requested URL
        url: String,
        /// Attempts made for this page
        attempts: u32,
    },

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    ParseError(String),

    /// Pagination guard tripped
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Neither the organization nor the user endpoint could be used for an owner
    #[error("cannot resolve owner '{owner}': organization endpoint: {org_error}; user endpoint: {user_error}")]
    AuthResolution {
        /// Requested owner
        owner: String,
        /// Rejection from the organization endpoint
        org_error: String,
        /// Rejection from the user endpoint
        user_error: String,
    },

    /// HTTP client could not be built
    #[error("client configuration error: {0}")]
    Configuration(String),
}

impl FetcherError {
    /// Whether the error happened on the wire rather than in the remote's answer
    pub fn is_transport(&self) -> bool {
        matches!(self, FetcherError::Transport(_))
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Lazy, non-restartable sequence of records produced by pagination
pub type RecordStream<'a, T> = Pin<Box<dyn Stream<Item = FetcherResult<T>> + Send + 'a>>;

/// Raw answer to a single page request
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers (rate limit, Link)
    pub headers: HeaderMap,
    /// Undecoded body
    pub body: String,
}

impl PageResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues one GET per page
///
/// The production implementation is [`http::HttpTransport`]; anything that
/// can answer a GET (a recorded fixture, a scripted fake) can stand in.
#[async_trait]
pub trait PageTransport: Send + Sync {
    /// Fetch a single page
    ///
    /// # Errors
    /// Only failures before a response arrived are errors; every HTTP status
    /// is returned as a [`PageResponse`].
    async fn get_page(
        &self,
        url: &str,
        query: &[(String, String)],
        headers: &HeaderMap,
    ) -> FetcherResult<PageResponse>;
}
