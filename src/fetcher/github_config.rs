//! GitHub API configuration
//!
//! Endpoint roots and page size are injected at startup instead of living in
//! module-level globals, so tests and alternate deployments (GitHub
//! Enterprise, local fixtures) can point the harvester elsewhere.

use once_cell::sync::Lazy;

/// Configuration for the GitHub REST API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubApiConfig {
    /// API root (e.g., <https://api.github.com>)
    pub api_url: String,

    /// Web root used to build clone/browse URLs (e.g., <https://github.com>)
    pub web_url: String,

    /// Page size requested from listing endpoints (GitHub caps it at 100)
    pub per_page: u32,

    /// User agent sent with every request (GitHub rejects requests without one)
    pub user_agent: String,
}

/// Public github.com configuration
pub static GITHUB_CONFIG: Lazy<GithubApiConfig> = Lazy::new(GithubApiConfig::default);

impl Default for GithubApiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            web_url: "https://github.com".to_string(),
            per_page: 100,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl GithubApiConfig {
    /// Replace the API root, trimming any trailing slash
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Organization repository listing for `owner`
    pub fn org_repos_url(&self, owner: &str) -> String {
        format!("{}/orgs/{}/repos", self.api_url, owner)
    }

    /// User repository listing for `owner`
    pub fn user_repos_url(&self, owner: &str) -> String {
        format!("{}/users/{}/repos", self.api_url, owner)
    }

    /// Browse URL for `owner/name`
    pub fn repo_web_url(&self, owner: &str, name: &str) -> String {
        format!("{}/{}/{}", self.web_url, owner, name)
    }

    /// Query payload for repository listings
    ///
    /// `sort` is ignored by the org listing; ordering is fixed up client-side.
    pub fn listing_query(&self) -> Vec<(String, String)> {
        vec![
            ("per_page".to_string(), self.per_page.to_string()),
            ("fork".to_string(), "false".to_string()),
            ("sort".to_string(), "updated".to_string()),
            ("direction".to_string(), "desc".to_string()),
        ]
    }
}
