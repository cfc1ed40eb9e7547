//! Link-based pagination over a paged collection API
//!
//! Walks a collection one page at a time, following the `rel="next"` link of
//! each response until none is returned. Every request is gated by the
//! [`RateLimiter`]; a 403 that signals an exhausted quota is retried after the
//! window resets.
//!
//! Includes safety mechanisms:
//! - Maximum page count to prevent infinite loops
//! - Bounded number of rate-limit waits per page
//! - Stop at the first error (yielded once, after all earlier items)

use futures_util::{stream, StreamExt};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::fetcher::http::parse_next_link;
use crate::fetcher::{FetcherError, FetcherResult, PageTransport, RecordStream};
use crate::harvester::config::{MAX_PAGES, MAX_RATE_LIMIT_RETRIES};
use crate::harvester::rate_limit::{exhausted_until, RateLimiter};

/// One decoded page
#[derive(Debug)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

/// Pagination cursor carried between pages of one session
struct Cursor {
    /// Next page to request; `None` once the collection is exhausted or failed
    url: Option<String>,
    /// Query parameters, sent with the first request only (next links carry their own)
    query: Vec<(String, String)>,
    headers: HeaderMap,
    page: usize,
}

/// Paginator for link-paged collections
#[derive(Clone)]
pub struct Paginator {
    transport: Arc<dyn PageTransport>,
    rate_limiter: Arc<RateLimiter>,
}

impl Paginator {
    /// Create a paginator
    ///
    /// # Arguments
    /// * `transport` - Issues the page requests
    /// * `rate_limiter` - Shared limiter consulted before every request
    pub fn new(transport: Arc<dyn PageTransport>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            transport,
            rate_limiter,
        }
    }

    /// Rate limiter used by this paginator
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Lazily walk the collection starting at `start_url`
    ///
    /// Items are yielded in the order the remote returns them, page after
    /// page. Nothing is requested until the stream is polled. The stream
    /// ends after the last page, or after yielding a single `Err` for the
    /// first failure; items received before the failure are still yielded.
    pub fn paginate<T>(
        &self,
        start_url: &str,
        query: Vec<(String, String)>,
        headers: HeaderMap,
    ) -> RecordStream<'static, T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let paginator = self.clone();
        let cursor = Cursor {
            url: Some(start_url.to_string()),
            query,
            headers,
            page: 0,
        };

        let stream = stream::unfold(cursor, move |mut cursor| {
            let paginator = paginator.clone();

            async move {
                let url = cursor.url.take()?;

                if cursor.page >= MAX_PAGES {
                    let error = FetcherError::InvalidResponse(format!(
                        "Max pages ({MAX_PAGES}) exceeded - possible pagination loop. Last URL: {url}"
                    ));
                    return Some((stream::iter(vec![Err(error)]), cursor));
                }

                let query = std::mem::take(&mut cursor.query);
                debug!("Getting page {} from: {}", cursor.page + 1, url);

                match paginator
                    .fetch_page::<T>(&url, &query, &cursor.headers)
                    .await
                {
                    Ok(page) => {
                        debug!(
                            "Received {} items in page {}",
                            page.items.len(),
                            cursor.page + 1
                        );
                        cursor.url = page.next;
                        cursor.page += 1;

                        let items: Vec<FetcherResult<T>> = page.items.into_iter().map(Ok).collect();
                        Some((stream::iter(items), cursor))
                    }
                    Err(e) => {
                        debug!("Pagination halted at page {}: {}", cursor.page + 1, e);
                        Some((stream::iter(vec![Err(e)]), cursor))
                    }
                }
            }
        })
        .flatten();

        Box::pin(stream)
    }

    /// Fetch and decode one page, waiting out exhausted rate-limit windows
    async fn fetch_page<T>(
        &self,
        url: &str,
        query: &[(String, String)],
        headers: &HeaderMap,
    ) -> FetcherResult<Page<T>>
    where
        T: DeserializeOwned,
    {
        for attempt in 0..=MAX_RATE_LIMIT_RETRIES {
            self.rate_limiter.check_and_wait().await;

            let response = self.transport.get_page(url, query, headers).await?;
            self.rate_limiter.update(&response.headers);

            if response.status == 403 {
                let Some(reset_at) = exhausted_until(&response.headers) else {
                    return Err(FetcherError::Forbidden(format!(
                        "{url} refused the request and gave no rate-limit reset"
                    )));
                };

                warn!(
                    "Rate limit exhausted on attempt {}/{} for {} (reset at {})",
                    attempt + 1,
                    MAX_RATE_LIMIT_RETRIES + 1,
                    url,
                    reset_at
                );
                self.rate_limiter.mark_exhausted(reset_at);
                continue;
            }

            if !response.is_success() {
                return Err(FetcherError::HttpStatus {
                    status: response.status,
                    url: url.to_string(),
                });
            }

            let items: Vec<T> = serde_json::from_str(&response.body).map_err(|e| {
                FetcherError::ParseError(format!("Failed to decode page from {url}: {e}"))
            })?;

            return Ok(Page {
                items,
                next: parse_next_link(&response.headers),
            });
        }

        Err(FetcherError::RateLimitExceeded {
            url: url.to_string(),
            attempts: MAX_RATE_LIMIT_RETRIES + 1,
        })
    }
}
