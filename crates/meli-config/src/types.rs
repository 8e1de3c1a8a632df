//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]      # listener and front-end behavior
//! [upstream]    # search API
//! [oauth]       # token endpoint, client credentials, seed tokens
//! ```

use serde::{Deserialize, Serialize};

/// Default listen port, matching the hosting platform convention.
pub const DEFAULT_PORT: u16 = 10000;
/// Default bind address.
pub const DEFAULT_BIND: &str = "0.0.0.0";
/// Query used when a search arrives without one.
pub const DEFAULT_QUERY: &str = "q=celular";
/// Mercado Libre Brazil site search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://api.mercadolibre.com/sites/MLB/search";
/// Mercado Libre token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://api.mercadolibre.com/oauth/token";
/// Default upstream request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const REDACTED: &str = "<redacted>";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. a project-local
/// file that only sets credentials) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeliConfig {
    pub server: Option<ServerConfig>,
    pub upstream: Option<UpstreamConfig>,
    pub oauth: Option<OAuthConfig>,
}

impl MeliConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: MeliConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }

        if other.upstream.is_some() {
            self.upstream = other.upstream;
        }

        if other.oauth.is_some() {
            self.oauth = other.oauth;
        }
    }

    /// Effective server settings.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Effective upstream settings.
    pub fn upstream(&self) -> UpstreamConfig {
        self.upstream.clone().unwrap_or_default()
    }

    /// Effective OAuth settings.
    pub fn oauth(&self) -> OAuthConfig {
        self.oauth.clone().unwrap_or_default()
    }

    /// Check that the credentials needed to refresh tokens are present.
    ///
    /// The access token may be empty: the first search is then rejected
    /// upstream and triggers a refresh.
    pub fn validate_credentials(&self) -> crate::Result<()> {
        let oauth = self.oauth();
        let required = [
            ("client_id", &oauth.client_id, crate::discovery::ENV_CLIENT_ID),
            ("client_secret", &oauth.client_secret, crate::discovery::ENV_CLIENT_SECRET),
            ("refresh_token", &oauth.refresh_token, crate::discovery::ENV_REFRESH_TOKEN),
        ];

        for (field, value, env_var) in required {
            if value.trim().is_empty() {
                return Err(crate::ConfigError::MissingField {
                    field: field.to_string(),
                    section: "oauth".to_string(),
                    env_var: env_var.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Copy of this config with secrets replaced, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(oauth) = copy.oauth.as_mut() {
            for secret in [
                &mut oauth.client_secret,
                &mut oauth.access_token,
                &mut oauth.refresh_token,
            ] {
                if !secret.is_empty() {
                    *secret = REDACTED.to_string();
                }
            }
        }
        copy
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Allow cross-origin requests from any origin.
    pub enable_cors: bool,
    /// Raw query string used when `/api` is called without one.
    pub default_query: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            enable_cors: true,
            default_query: DEFAULT_QUERY.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Upstream Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Search API configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Search endpoint; the caller's query string is appended verbatim.
    pub search_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Also treat `400` responses mentioning an invalid token as expired
    /// credentials.
    pub retry_on_invalid_token_400: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_on_invalid_token_400: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OAuth Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// OAuth configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Token endpoint used for the refresh-token grant.
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Seed access token. May be empty.
    pub access_token: String,
    /// Seed refresh token.
    pub refresh_token: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            access_token: String::new(),
            refresh_token: String::new(),
        }
    }
}

impl OAuthConfig {
    /// Whether any secret is stored in plaintext.
    pub fn has_plaintext_secret(&self) -> bool {
        !self.client_secret.is_empty()
            || !self.access_token.is_empty()
            || !self.refresh_token.is_empty()
    }
}
