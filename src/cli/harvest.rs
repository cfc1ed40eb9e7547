//! Harvest command

use clap::Parser;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::fetcher::github::GithubRepositories;
use crate::fetcher::github_config::{GithubApiConfig, GITHUB_CONFIG};
use crate::harvester::config::{DEFAULT_MAX_COUNT, DEFAULT_STORAGE_DIR_NAME};
use crate::harvester::{Backend, BackendMode, BackendOptions, Source};
use crate::index::{repository_filter, BulkSink, OriginInfo};
use crate::output::{
    project_descriptor, project_file_name, write_name_listing, write_project_file,
};

use super::CliError;

/// Harvest the repositories of a GitHub organization or user
#[derive(Parser, Debug, Clone)]
#[command(name = "repo-harvester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// GitHub owner (organization or user)
    #[arg(short = 'o', long)]
    pub owner: String,

    /// GitHub API token
    #[arg(short = 't', long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Number of repositories to keep (0 keeps all)
    #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_COUNT)]
    pub nrepos: usize,

    /// Write a project descriptor file instead of listing names
    #[arg(short = 'm', long)]
    pub mordred: bool,

    /// Ignore the last committed state and fetch everything
    #[arg(long)]
    pub no_incremental: bool,

    /// Rebuild the results from the local cache without network access
    #[arg(long)]
    pub cache: bool,

    /// Enable debug logging
    #[arg(short = 'g', long)]
    pub debug: bool,

    /// Root of the cache and state directories (default: ~/.repo-harvester)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Directory receiving the project descriptor file
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// GitHub API root (e.g., a GitHub Enterprise endpoint)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Index URL receiving a bulk write of the results
    #[arg(long)]
    pub elastic_url: Option<String>,
}

impl Cli {
    /// Backend options selected by the flags
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            use_cache: self.cache,
            incremental: !self.no_incremental,
        }
    }

    /// API configuration selected by the flags
    pub fn api_config(&self) -> GithubApiConfig {
        match &self.api_url {
            Some(url) => GITHUB_CONFIG.clone().with_api_url(url.as_str()),
            None => GITHUB_CONFIG.clone(),
        }
    }

    /// Storage root selected by the flags
    pub fn storage_root(&self) -> Result<PathBuf, CliError> {
        if let Some(dir) = &self.storage_dir {
            return Ok(dir.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_STORAGE_DIR_NAME))
            .ok_or_else(|| {
                CliError::ConfigurationError(
                    "cannot determine the home directory, pass --storage-dir".to_string(),
                )
            })
    }

    /// Run the harvest
    pub async fn execute(&self) -> Result<(), CliError> {
        let config = self.api_config();
        let source = GithubRepositories::new(
            config.clone(),
            &self.owner,
            self.token.clone(),
            self.nrepos,
        )?;
        let origin = OriginInfo::new(source.origin());
        let id_field = source.unique_id_field().to_string();

        let mut backend = Backend::new(source, &self.storage_root()?, self.backend_options())?;
        let outcome = backend.fetch().await?;

        if !outcome.complete {
            warn!(
                "Results for {} are incomplete ({} repositories)",
                self.owner,
                outcome.items.len()
            );
        }
        info!(
            mode = %outcome.mode,
            committed = outcome.committed,
            "Harvested {} repositories",
            outcome.items.len()
        );

        if let Some(url) = &self.elastic_url {
            let client = Client::builder()
                .user_agent(config.user_agent.as_str())
                .build()
                .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
            let sink = BulkSink::new(Arc::new(client), url);
            let filter = repository_filter(Some(&origin), backend.source().name(), true);
            info!(filter = %filter.to_json(), "Submitting results to {}", url);

            if let Err(e) = sink.submit(&outcome.items, &id_field).await {
                warn!("Bulk write to {} failed: {}", url, e);
            }
        }

        // A resuming fetch only holds the changes; listings cover everything
        let listed = match outcome.mode {
            BackendMode::Resuming => backend.snapshot()?,
            BackendMode::Fresh | BackendMode::CacheReplay => outcome.items,
        };

        if self.mordred {
            let path = self.output_dir.join(project_file_name(&self.owner));
            let descriptor = project_descriptor(&self.owner, &config, &listed);
            write_project_file(&path, &descriptor)?;
        } else {
            let stdout = std::io::stdout();
            write_name_listing(&mut stdout.lock(), &listed)?;
        }

        Ok(())
    }
}
