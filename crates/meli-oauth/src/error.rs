//! Error types for the credential manager and search proxy.

use reqwest::StatusCode;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur while refreshing credentials or calling upstream.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OAuthError {
    /// Network-level failure reaching the search API or the token endpoint.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The search API rejected the access token.
    #[error("Upstream rejected credentials ({status}): {body}")]
    AuthFailure { status: StatusCode, body: String },

    /// The token endpoint rejected the refresh attempt.
    #[error("Token refresh failed ({status}): {body}")]
    Refresh { status: StatusCode, body: String },

    /// The search API returned a non-auth error.
    #[error("Upstream error ({status}): {body}")]
    Upstream { status: StatusCode, body: String },

    /// Invalid runtime wiring, such as a malformed search URL.
    #[error("Config error: {0}")]
    Config(String),
}

impl OAuthError {
    /// Status code reported by the remote side, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            OAuthError::AuthFailure { status, .. }
            | OAuthError::Refresh { status, .. }
            | OAuthError::Upstream { status, .. } => Some(*status),
            OAuthError::Transport(_) | OAuthError::Config(_) => None,
        }
    }

    /// Response body reported by the remote side, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            OAuthError::AuthFailure { body, .. }
            | OAuthError::Refresh { body, .. }
            | OAuthError::Upstream { body, .. } => Some(body),
            OAuthError::Transport(_) | OAuthError::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_body_accessors() {
        let err = OAuthError::Refresh {
            status: StatusCode::BAD_REQUEST,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        };
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert!(err.body().unwrap().contains("invalid_grant"));

        let err = OAuthError::Transport("connection refused".to_string());
        assert!(err.status().is_none());
        assert!(err.body().is_none());
    }

    #[test]
    fn test_display_includes_status() {
        let err = OAuthError::Upstream {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "down".to_string(),
        };
        assert_eq!(err.to_string(), "Upstream error (503 Service Unavailable): down");
    }
}
