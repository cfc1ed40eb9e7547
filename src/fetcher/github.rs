//! GitHub repository source
//!
//! Lists the repositories of one owner. The owner is first tried as an
//! organization; when the organization listing rejects the first page, the
//! user listing is tried exactly once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dates::time_diff_days;
use crate::fetcher::github_config::GithubApiConfig;
use crate::fetcher::http::{request_headers, HttpTransport};
use crate::fetcher::pagination::Paginator;
use crate::fetcher::{FetcherError, FetcherResult, PageTransport};
use crate::harvester::config::RESET_GRACE;
use crate::harvester::{RateLimiter, ResourceFilter, Source, SourceBatch};
use crate::resume::BackendState;
use crate::ResourceRecord;

/// Outcome of walking one listing endpoint
enum PageCollection {
    /// Every page was read
    Complete(Vec<ResourceRecord>),
    /// Stopped early after some progress, or on a failure unrelated to the endpoint choice
    Partial(Vec<ResourceRecord>, FetcherError),
    /// The endpoint refused the very first page
    Rejected(FetcherError),
}

/// Repositories of a GitHub organization or user
pub struct GithubRepositories {
    config: GithubApiConfig,
    owner: String,
    token: Option<String>,
    max_count: usize,
    paginator: Paginator,
}

impl GithubRepositories {
    /// Create a source talking to the real API
    ///
    /// # Arguments
    /// * `config` - API roots and page size
    /// * `owner` - Organization or user login
    /// * `token` - Optional credential, passed through untouched
    /// * `max_count` - Repositories kept after shaping (0 keeps all)
    pub fn new(
        config: GithubApiConfig,
        owner: &str,
        token: Option<String>,
        max_count: usize,
    ) -> FetcherResult<Self> {
        let transport = HttpTransport::with_user_agent(&config.user_agent)?;
        Self::with_transport(config, owner, token, max_count, Arc::new(transport))
    }

    /// Create a source on top of any page transport
    pub fn with_transport(
        config: GithubApiConfig,
        owner: &str,
        token: Option<String>,
        max_count: usize,
        transport: Arc<dyn PageTransport>,
    ) -> FetcherResult<Self> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(FetcherError::Configuration("owner cannot be empty".to_string()));
        }

        let paginator = Paginator::new(transport, Arc::new(RateLimiter::with_grace(RESET_GRACE)));
        Ok(Self {
            config,
            owner: owner.to_string(),
            token: token.filter(|t| !t.is_empty()),
            max_count,
            paginator,
        })
    }

    /// Owner login
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// API configuration in use
    pub fn config(&self) -> &GithubApiConfig {
        &self.config
    }

    /// Repositories kept after shaping
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Web URL identifying this owner
    pub fn origin(&self) -> String {
        format!("{}/{}", self.config.web_url, self.owner)
    }

    /// Walk one listing endpoint to the end
    async fn collect(&self, url: &str) -> PageCollection {
        let mut stream = self.paginator.paginate::<ResourceRecord>(
            url,
            self.config.listing_query(),
            request_headers(self.token.as_deref()),
        );

        let mut items = Vec::new();
        while let Some(result) = stream.next().await {
            match result {
                Ok(record) => items.push(record),
                Err(e) if items.is_empty() && rejects_endpoint(&e) => {
                    return PageCollection::Rejected(e);
                }
                Err(e) => return PageCollection::Partial(items, e),
            }
        }

        PageCollection::Complete(items)
    }

    /// Organization listing, then user listing when the first is refused
    async fn resolve_and_collect(&self) -> FetcherResult<PageCollection> {
        let org_url = self.config.org_repos_url(&self.owner);
        let org_error = match self.collect(&org_url).await {
            PageCollection::Rejected(e) => e,
            other => return Ok(other),
        };

        match &org_error {
            FetcherError::HttpStatus { status: 404, .. } => {
                info!("{} is not an organization, trying user repositories", self.owner);
            }
            other => {
                warn!(
                    "Organization listing refused for {} ({}), trying user repositories",
                    self.owner, other
                );
            }
        }

        let user_url = self.config.user_repos_url(&self.owner);
        match self.collect(&user_url).await {
            PageCollection::Rejected(user_error) => Err(FetcherError::AuthResolution {
                owner: self.owner.clone(),
                org_error: org_error.to_string(),
                user_error: user_error.to_string(),
            }),
            other => Ok(other),
        }
    }
}

/// Whether a first-page failure says "wrong endpoint" rather than "try later"
fn rejects_endpoint(error: &FetcherError) -> bool {
    !matches!(
        error,
        FetcherError::Transport(_) | FetcherError::RateLimitExceeded { .. }
    )
}

#[async_trait]
impl Source for GithubRepositories {
    type Item = ResourceRecord;

    fn name(&self) -> &str {
        "github"
    }

    fn id(&self) -> String {
        self.owner.clone()
    }

    fn unique_id_field(&self) -> &str {
        "name"
    }

    fn updated_at(&self, item: &ResourceRecord) -> Option<DateTime<Utc>> {
        Some(item.updated_at)
    }

    async fn fetch(&self, since: Option<&BackendState>) -> FetcherResult<SourceBatch<ResourceRecord>> {
        info!("Getting repositories from {}", self.origin());

        let mut batch = match self.resolve_and_collect().await? {
            PageCollection::Complete(items) => SourceBatch::complete(items),
            PageCollection::Partial(items, e) => {
                warn!(
                    "Listing for {} interrupted after {} repositories: {}",
                    self.owner,
                    items.len(),
                    e
                );
                SourceBatch::partial(items)
            }
            PageCollection::Rejected(e) => return Err(e),
        };

        batch.items.retain(|record| match record.validate() {
            Ok(()) => true,
            Err(reason) => {
                warn!("Skipping repository record: {}", reason);
                false
            }
        });

        if let Some(last_sync) = since.and_then(BackendState::last_sync) {
            let total = batch.items.len();
            batch.items.retain(|record| record.updated_at > last_sync);
            debug!(
                "{} of {} repositories updated since {} ({:?} days ago)",
                batch.items.len(),
                total,
                last_sync.to_rfc3339(),
                time_diff_days(Some(last_sync), Some(Utc::now()))
            );
        }

        info!(
            repositories = batch.items.len(),
            complete = batch.complete,
            "Repositories fetched for {}",
            self.owner
        );
        Ok(batch)
    }

    fn shape(&self, items: Vec<ResourceRecord>) -> Vec<ResourceRecord> {
        ResourceFilter::shape(items, self.max_count)
    }
}
