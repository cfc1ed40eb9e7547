//! HTTP transport for the remote collection API
//!
//! Provides the reqwest-backed [`PageTransport`] plus the header helpers the
//! paginator needs:
//! - Link header parsing (`rel="next"` cursor)
//! - Request header construction (credential, media type)

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::fetcher::{FetcherError, FetcherResult, PageResponse, PageTransport};

/// Media type requested from the GitHub REST API
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Reqwest-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Arc<Client>,
}

impl HttpTransport {
    /// Wrap an existing client (Arc for cheap sharing)
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    /// Build a client with the given user agent
    pub fn with_user_agent(user_agent: &str) -> FetcherResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetcherError::Configuration(e.to_string()))?;
        Ok(Self::new(Arc::new(client)))
    }

    /// Shared client handle
    pub fn client(&self) -> Arc<Client> {
        self.client.clone()
    }
}

#[async_trait]
impl PageTransport for HttpTransport {
    async fn get_page(
        &self,
        url: &str,
        query: &[(String, String)],
        headers: &HeaderMap,
    ) -> FetcherResult<PageResponse> {
        debug!("Making GET request to: {} with {} params", url, query.len());

        let response = self
            .client
            .get(url)
            .query(query)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| FetcherError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| FetcherError::Transport(format!("Failed to read body: {e}")))?;

        Ok(PageResponse {
            status,
            headers,
            body,
        })
    }
}

/// Build request headers for the GitHub API
///
/// The credential is opaque and only sent when present.
pub fn request_headers(token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        match HeaderValue::from_str(&format!("token {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(e) => warn!("Ignoring token with invalid characters: {}", e),
        }
    }

    headers
}

/// Extract the `rel="next"` target from a Link header
///
/// Handles the RFC 8288 shape GitHub emits:
/// `<https://api.github.com/...&page=2>; rel="next", <...>; rel="last"`
pub fn parse_next_link(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(LINK)?.to_str().ok()?;
    find_link(raw, "next")
}

fn find_link(raw: &str, wanted: &str) -> Option<String> {
    raw.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;

        let matches = segments.any(|param| {
            let Some((key, value)) = param.split_once('=') else {
                return false;
            };
            key.trim().eq_ignore_ascii_case("rel")
                && value
                    .trim()
                    .trim_matches('"')
                    .split_whitespace()
                    .any(|rel| rel.eq_ignore_ascii_case(wanted))
        });

        matches.then(|| target.to_string())
    })
}
