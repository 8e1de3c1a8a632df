//! CLI command handlers.

pub mod config;
pub mod refresh;
pub mod serve;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use meli_config::{LoadedConfig, MeliConfig};
use meli_oauth::token_store::create_memory_token_store;
use meli_oauth::{
    AuthFailurePolicy, AuthenticatedDispatcher, ClientCredentials, CredentialPair, TokenRefresher,
};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit user config directory.
    pub config_dir: Option<PathBuf>,
    /// Directory holding the project-local config.
    pub project_dir: Option<PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load and merge configuration, logging any warnings.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = meli_config::load_config_with_options(
            self.project_dir.as_deref(),
            self.config_dir.as_deref(),
            |key| std::env::var(key).ok(),
        )
        .context("Failed to load configuration")?;

        for warning in &loaded.warnings {
            tracing::warn!("{}", warning);
        }
        for path in loaded.loaded_from() {
            tracing::debug!(path = %path.display(), "Loaded config file");
        }
        if !loaded.env_overrides.is_empty() {
            tracing::debug!(vars = ?loaded.env_overrides, "Applied environment overrides");
        }

        Ok(loaded)
    }
}

/// Wire the token store, refresher and dispatcher from configuration.
pub fn build_dispatcher(config: &MeliConfig) -> Result<AuthenticatedDispatcher> {
    let upstream = config.upstream();
    let oauth = config.oauth();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(upstream.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let store = create_memory_token_store(CredentialPair::new(
        oauth.access_token.clone(),
        oauth.refresh_token.clone(),
    ));
    let refresher = TokenRefresher::new(
        client.clone(),
        oauth.token_url.clone(),
        ClientCredentials::new(oauth.client_id.clone(), oauth.client_secret.clone()),
        store,
    );

    let policy = if upstream.retry_on_invalid_token_400 {
        AuthFailurePolicy::InvalidTokenHeuristic
    } else {
        AuthFailurePolicy::StatusOnly
    };

    let dispatcher = AuthenticatedDispatcher::new(client, upstream.search_url, Arc::new(refresher))
        .context("Invalid upstream configuration")?;
    Ok(dispatcher.with_policy(policy))
}
