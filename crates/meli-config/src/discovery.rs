//! Config file discovery, layered merging and environment overrides.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/meli/config.toml` (user config)
//! 2. `./meli.toml` (project-local)
//! 3. Environment variables
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ConfigError, MeliConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "meli.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for platform directory resolution.
const APP_NAME: &str = "meli";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "MELI_CONFIG_DIR";

pub const ENV_PORT: &str = "PORT";
pub const ENV_BIND: &str = "MELI_BIND";
pub const ENV_SEARCH_URL: &str = "MELI_SEARCH_URL";
pub const ENV_TOKEN_URL: &str = "MELI_TOKEN_URL";
pub const ENV_CLIENT_ID: &str = "MELI_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "MELI_CLIENT_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "MELI_ACCESS_TOKEN";
pub const ENV_REFRESH_TOKEN: &str = "MELI_REFRESH_TOKEN";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: MeliConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Environment variables that overrode file values.
    pub env_overrides: Vec<String>,
    /// Warnings generated during loading (e.g., plaintext secrets).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration from all layers.
///
/// `config_dir` overrides both `MELI_CONFIG_DIR` and the platform default.
/// `env` looks up environment overrides; pass `|k| std::env::var(k).ok()`
/// for the process environment.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<LoadedConfig> {
    let mut config = MeliConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config - explicit override, then env var, then platform default
    let user_config = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Project-local config
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    if config
        .oauth
        .as_ref()
        .is_some_and(|oauth| oauth.has_plaintext_secret())
    {
        warnings.push(format!(
            "[oauth] contains plaintext secrets. Consider setting {}, {} and {} in the environment instead.",
            ENV_CLIENT_SECRET, ENV_ACCESS_TOKEN, ENV_REFRESH_TOKEN
        ));
    }

    // 3. Environment
    let env_overrides = apply_env_overrides(&mut config, env)?;

    Ok(LoadedConfig {
        config,
        sources,
        env_overrides,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<MeliConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    MeliConfig::from_toml(&contents)
}

/// Apply environment overrides, returning the names of variables that were
/// set. Empty values are ignored.
pub fn apply_env_overrides(
    config: &mut MeliConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Vec<String>> {
    let lookup = |key: &str| env(key).filter(|v| !v.is_empty());
    let mut applied = Vec::new();

    if let Some(port) = lookup(ENV_PORT) {
        let port = port.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
            field: ENV_PORT.to_string(),
            value: port.clone(),
        })?;
        config.server.get_or_insert_with(Default::default).port = port;
        applied.push(ENV_PORT.to_string());
    }

    if let Some(bind) = lookup(ENV_BIND) {
        config.server.get_or_insert_with(Default::default).bind = bind;
        applied.push(ENV_BIND.to_string());
    }

    if let Some(url) = lookup(ENV_SEARCH_URL) {
        config.upstream.get_or_insert_with(Default::default).search_url = url;
        applied.push(ENV_SEARCH_URL.to_string());
    }

    let oauth_vars = [
        ENV_TOKEN_URL,
        ENV_CLIENT_ID,
        ENV_CLIENT_SECRET,
        ENV_ACCESS_TOKEN,
        ENV_REFRESH_TOKEN,
    ];
    for var in oauth_vars {
        let Some(value) = lookup(var) else {
            continue;
        };
        let oauth = config.oauth.get_or_insert_with(Default::default);
        let field = match var {
            ENV_TOKEN_URL => &mut oauth.token_url,
            ENV_CLIENT_ID => &mut oauth.client_id,
            ENV_CLIENT_SECRET => &mut oauth.client_secret,
            ENV_ACCESS_TOKEN => &mut oauth.access_token,
            _ => &mut oauth.refresh_token,
        };
        *field = value;
        applied.push(var.to_string());
    }

    Ok(applied)
}

/// Get the user config file path for meli.
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the user config directory for meli.
///
/// Checks `MELI_CONFIG_DIR` env var first, then falls back to the platform
/// default.
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
///
/// A missing file is skipped; a malformed one is skipped with a warning.
fn load_layer(config: &mut MeliConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
