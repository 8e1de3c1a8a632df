//! Auth-aware dispatch of search requests to the upstream API.
//!
//! One `dispatch` call makes at most two upstream requests: the initial one
//! and, after a successful refresh, a single retry with the new token.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::{Client, StatusCode, Url, header};

use crate::error::{OAuthError, Result};
use crate::refresh::TokenRefresher;

/// Rule for deciding that an upstream response means "token rejected".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthFailurePolicy {
    /// Only 401 Unauthorized.
    #[default]
    StatusOnly,
    /// 401, or a 400 whose body mentions both "invalid" and "token".
    InvalidTokenHeuristic,
}

impl AuthFailurePolicy {
    /// Whether a response with this status and body is an auth failure.
    pub fn is_auth_failure(&self, status: StatusCode, body: &[u8]) -> bool {
        if status == StatusCode::UNAUTHORIZED {
            return true;
        }

        match self {
            AuthFailurePolicy::StatusOnly => false,
            AuthFailurePolicy::InvalidTokenHeuristic => {
                status == StatusCode::BAD_REQUEST && {
                    let text = String::from_utf8_lossy(body).to_lowercase();
                    text.contains("invalid") && text.contains("token")
                }
            }
        }
    }
}

/// Verbatim upstream result plus dispatch metadata.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
    /// Number of upstream requests made (1 or 2).
    pub attempts: u8,
    /// Set when the upstream rejected the token and the refresh failed.
    pub refresh_failure: Option<OAuthError>,
}

impl UpstreamResponse {
    /// Body as lossy UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Classify a non-2xx response as an error.
    pub fn as_error(&self, policy: AuthFailurePolicy) -> Option<OAuthError> {
        if self.status.is_success() {
            return None;
        }

        let (status, body) = (self.status, self.text());
        if policy.is_auth_failure(status, &self.body) {
            Some(OAuthError::AuthFailure { status, body })
        } else {
            Some(OAuthError::Upstream { status, body })
        }
    }
}

/// Issues search requests with the current bearer token, refreshing and
/// retrying once on authentication failure.
#[derive(Debug, Clone)]
pub struct AuthenticatedDispatcher {
    client: Client,
    search_url: String,
    refresher: Arc<TokenRefresher>,
    policy: AuthFailurePolicy,
}

impl AuthenticatedDispatcher {
    /// Create a dispatcher for `search_url`, which must be an absolute
    /// http(s) URL.
    pub fn new(
        client: Client,
        search_url: impl Into<String>,
        refresher: Arc<TokenRefresher>,
    ) -> Result<Self> {
        let search_url = search_url.into();
        let parsed = Url::parse(&search_url).map_err(|e| {
            OAuthError::Config(format!("Invalid search URL '{}': {}", search_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(OAuthError::Config(format!(
                "Unsupported search URL scheme '{}'",
                parsed.scheme()
            )));
        }

        Ok(Self {
            client,
            search_url,
            refresher,
            policy: AuthFailurePolicy::default(),
        })
    }

    /// Set the auth failure detection policy.
    pub fn with_policy(mut self, policy: AuthFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> AuthFailurePolicy {
        self.policy
    }

    pub fn refresher(&self) -> &Arc<TokenRefresher> {
        &self.refresher
    }

    /// Perform one logical search call.
    ///
    /// `query` is the raw query string (without the leading `?`) and is
    /// appended verbatim. Transport failures are returned as errors; every
    /// upstream HTTP response, including non-2xx, is returned as-is.
    pub async fn dispatch(&self, query: &str) -> Result<UpstreamResponse> {
        let url = self.build_url(query);

        let token = self.refresher.store().get().await.access_token;
        let first = self.send(&url, &token).await?;

        if !self.policy.is_auth_failure(first.status, &first.body) {
            return Ok(first);
        }

        tracing::info!(status = %first.status, "Upstream rejected access token, refreshing");

        match self.refresher.refresh_after(&token).await {
            Ok(pair) => {
                let mut retried = self.send(&url, &pair.access_token).await?;
                retried.attempts = 2;
                if self.policy.is_auth_failure(retried.status, &retried.body) {
                    tracing::warn!(status = %retried.status, "Upstream rejected refreshed token");
                }
                Ok(retried)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, returning original response");
                Ok(UpstreamResponse {
                    refresh_failure: Some(e),
                    ..first
                })
            }
        }
    }

    fn build_url(&self, query: &str) -> String {
        let query = query.trim_start_matches('?');
        if query.is_empty() {
            self.search_url.clone()
        } else if self.search_url.contains('?') {
            format!("{}&{}", self.search_url, query)
        } else {
            format!("{}?{}", self.search_url, query)
        }
    }

    async fn send(&self, url: &str, token: &str) -> Result<UpstreamResponse> {
        let mut req = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json");

        if !token.is_empty() {
            req = req.bearer_auth(token);
        }

        let response = req
            .send()
            .await
            .map_err(|e| OAuthError::Transport(format!("Search request failed: {}", e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| OAuthError::Transport(format!("Failed to read search response: {}", e)))?;

        tracing::debug!(%status, bytes = body.len(), "Upstream responded");

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
            attempts: 1,
            refresh_failure: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::{ClientCredentials, CredentialPair, create_memory_token_store};

    fn dispatcher(search_url: &str) -> AuthenticatedDispatcher {
        AuthenticatedDispatcher::new(Client::new(), search_url, refresher()).unwrap()
    }

    fn refresher() -> Arc<TokenRefresher> {
        let store = create_memory_token_store(CredentialPair::new("A1", "R1"));
        Arc::new(TokenRefresher::new(
            Client::new(),
            "http://127.0.0.1:1/oauth/token",
            ClientCredentials::new("id", "secret"),
            store,
        ))
    }

    #[test]
    fn test_new_rejects_malformed_search_url() {
        let err = AuthenticatedDispatcher::new(Client::new(), "not a url", refresher()).unwrap_err();
        assert!(matches!(err, OAuthError::Config(_)));
        assert!(err.to_string().contains("not a url"));

        let err = AuthenticatedDispatcher::new(
            Client::new(),
            "ftp://api.example.com/sites/MLB/search",
            refresher(),
        )
        .unwrap_err();
        assert!(matches!(err, OAuthError::Config(_)));
    }

    #[test]
    fn test_policy_status_only() {
        let policy = AuthFailurePolicy::StatusOnly;
        assert!(policy.is_auth_failure(StatusCode::UNAUTHORIZED, b""));
        assert!(!policy.is_auth_failure(StatusCode::BAD_REQUEST, b"invalid token"));
        assert!(!policy.is_auth_failure(StatusCode::INTERNAL_SERVER_ERROR, b""));
        assert!(!policy.is_auth_failure(StatusCode::OK, b""));
    }

    #[test]
    fn test_policy_invalid_token_heuristic() {
        let policy = AuthFailurePolicy::InvalidTokenHeuristic;
        assert!(policy.is_auth_failure(StatusCode::UNAUTHORIZED, b""));
        assert!(policy.is_auth_failure(
            StatusCode::BAD_REQUEST,
            br#"{"message":"Invalid Token","error":"bad_request"}"#
        ));
        assert!(!policy.is_auth_failure(
            StatusCode::BAD_REQUEST,
            br#"{"message":"invalid category"}"#
        ));
        assert!(!policy.is_auth_failure(StatusCode::FORBIDDEN, b"invalid token"));
    }

    #[test]
    fn test_build_url_appends_query_verbatim() {
        let d = dispatcher("https://api.example.com/sites/MLB/search");
        assert_eq!(
            d.build_url("q=celular%20samsung&limit=5"),
            "https://api.example.com/sites/MLB/search?q=celular%20samsung&limit=5"
        );
        assert_eq!(
            d.build_url("?q=tv"),
            "https://api.example.com/sites/MLB/search?q=tv"
        );
        assert_eq!(d.build_url(""), "https://api.example.com/sites/MLB/search");
    }

    #[test]
    fn test_build_url_joins_existing_query() {
        let d = dispatcher("https://api.example.com/search?site=MLB");
        assert_eq!(d.build_url("q=tv"), "https://api.example.com/search?site=MLB&q=tv");
    }

    #[test]
    fn test_as_error_classification() {
        let response = |status| UpstreamResponse {
            status,
            content_type: None,
            body: Bytes::from_static(b"{}"),
            attempts: 1,
            refresh_failure: None,
        };

        assert!(response(StatusCode::OK).as_error(AuthFailurePolicy::StatusOnly).is_none());
        assert!(matches!(
            response(StatusCode::UNAUTHORIZED).as_error(AuthFailurePolicy::StatusOnly),
            Some(OAuthError::AuthFailure { .. })
        ));
        assert!(matches!(
            response(StatusCode::BAD_GATEWAY).as_error(AuthFailurePolicy::StatusOnly),
            Some(OAuthError::Upstream { .. })
        ));
    }
}
