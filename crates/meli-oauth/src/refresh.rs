//! Refresh-token grant against the authorization server.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{OAuthError, Result};
use crate::token_store::{ClientCredentials, CredentialPair, SharedTokenStore};

/// Outcome of a refresh attempt.
pub type RefreshOutcome = Result<CredentialPair>;

/// Success payload from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub user_id: Option<u64>,
}

/// Exchanges the stored refresh token for a new access token.
///
/// This is the only writer of the token store. Refreshes are serialized
/// through a single in-flight guard so that concurrent callers rejected
/// with the same access token share one exchange and its outcome.
#[derive(Debug)]
pub struct TokenRefresher {
    client: Client,
    token_url: String,
    credentials: ClientCredentials,
    store: SharedTokenStore,
    /// In-flight guard; holds the error of the last attempt if it failed.
    in_flight: Mutex<Option<OAuthError>>,
    /// Completed exchange attempts, successful or not.
    attempts: AtomicU64,
    refresh_count: AtomicU32,
}

impl TokenRefresher {
    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        credentials: ClientCredentials,
        store: SharedTokenStore,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            credentials,
            store,
            in_flight: Mutex::new(None),
            attempts: AtomicU64::new(0),
            refresh_count: AtomicU32::new(0),
        }
    }

    /// The store this refresher writes to.
    pub fn store(&self) -> &SharedTokenStore {
        &self.store
    }

    /// Number of successful exchanges with the token endpoint.
    pub fn refresh_count(&self) -> u32 {
        self.refresh_count.load(Ordering::SeqCst)
    }

    /// Unconditionally refresh using the stored refresh token.
    pub async fn refresh(&self) -> RefreshOutcome {
        let mut last_failure = self.in_flight.lock().await;
        self.attempt(&mut last_failure).await
    }

    /// Refresh on behalf of a caller whose request was rejected with
    /// `stale_access_token`.
    ///
    /// An attempt that completed while this caller was waiting for the
    /// guard answers for it: its failure is shared, or the pair it stored
    /// is returned, even when the token endpoint handed back the same
    /// access token. Otherwise, if the stored access token has already
    /// moved on, the current pair is returned without another exchange.
    pub async fn refresh_after(&self, stale_access_token: &str) -> RefreshOutcome {
        let ticket = self.attempts.load(Ordering::SeqCst);
        let mut last_failure = self.in_flight.lock().await;

        if self.attempts.load(Ordering::SeqCst) != ticket {
            return match last_failure.as_ref() {
                Some(err) => {
                    tracing::debug!("Sharing failed refresh outcome with waiting request");
                    Err(err.clone())
                }
                None => {
                    tracing::debug!("Token refreshed by a concurrent request");
                    Ok(self.store.get().await)
                }
            };
        }

        let current = self.store.get().await;
        if current.access_token != stale_access_token {
            tracing::debug!("Token already refreshed by a concurrent request");
            return Ok(current);
        }

        self.attempt(&mut last_failure).await
    }

    /// Run one exchange and record its outcome. Requires the in-flight guard.
    async fn attempt(&self, last_failure: &mut Option<OAuthError>) -> RefreshOutcome {
        let outcome = self.exchange().await;
        *last_failure = outcome.as_ref().err().cloned();
        self.attempts.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn exchange(&self) -> RefreshOutcome {
        let current = self.store.get().await;

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", current.refresh_token.as_str()),
        ];

        tracing::info!(token_url = %self.token_url, "Refreshing access token");

        let response = self
            .client
            .post(&self.token_url)
            .header(header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| OAuthError::Transport(format!("Token refresh request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OAuthError::Transport(format!("Failed to read refresh response: {}", e)))?;

        if !status.is_success() {
            tracing::warn!(%status, "Token endpoint rejected refresh");
            return Err(OAuthError::Refresh { status, body });
        }

        let tokens = parse_token_response(status, &body)?;
        let pair = merge_refreshed(&current, &tokens);

        self.store.set(pair.clone()).await;
        self.refresh_count.fetch_add(1, Ordering::SeqCst);

        tracing::info!(
            expires_in = tokens.expires_in,
            rotated = pair.refresh_token != current.refresh_token,
            "Token refreshed successfully"
        );
        Ok(pair)
    }
}

/// Parse a 2xx token endpoint body. A missing or empty `access_token` is
/// treated as a rejected refresh.
fn parse_token_response(status: StatusCode, body: &str) -> Result<TokenResponse> {
    let tokens: TokenResponse =
        serde_json::from_str(body).map_err(|_| OAuthError::Refresh {
            status,
            body: body.to_string(),
        })?;

    if tokens.access_token.is_empty() {
        return Err(OAuthError::Refresh {
            status,
            body: body.to_string(),
        });
    }

    Ok(tokens)
}

/// Build the new pair, keeping the old refresh token unless rotated.
fn merge_refreshed(current: &CredentialPair, tokens: &TokenResponse) -> CredentialPair {
    let refresh_token = match tokens.refresh_token.as_deref() {
        Some(rotated) if !rotated.is_empty() => rotated.to_string(),
        _ => current.refresh_token.clone(),
    };

    CredentialPair {
        access_token: tokens.access_token.clone(),
        refresh_token,
    }
}
