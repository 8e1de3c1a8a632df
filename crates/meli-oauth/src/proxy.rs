//! HTTP proxy server for authenticated marketplace search.
//!
//! Accepts search requests on `/api` and forwards them upstream through the
//! [`AuthenticatedDispatcher`], passing status, content type and body back
//! unchanged.

use axum::{
    Json, Router as AxumRouter,
    body::Body,
    extract::{RawQuery, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::dispatcher::{AuthFailurePolicy, AuthenticatedDispatcher, UpstreamResponse};
use crate::error::OAuthError;

/// Plain-text banner served on `/`.
pub const BANNER: &str = "Servidor proxy do Mercado Livre funcionando!";

/// Configuration for the proxy server.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub bind_addr: SocketAddr,
    pub enable_cors: bool,
    /// Query used when `/api` is called without one. Empty forwards no query.
    pub default_query: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 10000)),
            enable_cors: true,
            default_query: String::new(),
        }
    }
}

impl ProxyConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn with_default_query(mut self, query: impl Into<String>) -> Self {
        self.default_query = query.into();
        self
    }

    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }
}

/// Shared state for the proxy server.
struct ProxyState {
    dispatcher: AuthenticatedDispatcher,
    default_query: String,
}

/// The search proxy server.
pub struct ProxyServer {
    config: ProxyConfig,
    state: Arc<ProxyState>,
}

impl ProxyServer {
    pub fn new(config: ProxyConfig, dispatcher: AuthenticatedDispatcher) -> Self {
        Self {
            state: Arc::new(ProxyState {
                dispatcher,
                default_query: config.default_query.clone(),
            }),
            config,
        }
    }

    /// Build the axum router.
    pub fn router(&self) -> AxumRouter {
        let mut router = AxumRouter::new()
            .route("/", get(handle_root))
            .route("/api", get(handle_search))
            .route("/health", get(handle_health))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router
    }

    /// Run the proxy server until the process exits.
    pub async fn run(self) -> std::io::Result<()> {
        let (listener, _) = self.bind().await?;
        axum::serve(listener, self.router()).await
    }

    /// Run with graceful shutdown, returning the bound address.
    pub async fn run_with_shutdown(
        self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<SocketAddr> {
        let (listener, local_addr) = self.bind().await?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, self.router())
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(error = %e, "Search proxy server stopped");
            }
        });
        Ok(local_addr)
    }

    async fn bind(&self) -> std::io::Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Starting search proxy server");
        Ok((listener, local_addr))
    }
}

/// Handle GET /
async fn handle_root() -> &'static str {
    BANNER
}

/// Handle GET /api
async fn handle_search(
    State(state): State<Arc<ProxyState>>,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    let query = query
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| state.default_query.clone());

    let upstream = state.dispatcher.dispatch(&query).await?;

    if !upstream.status.is_success() {
        tracing::debug!(
            status = %upstream.status,
            attempts = upstream.attempts,
            "Passing upstream error through"
        );
    }

    Ok(upstream_into_response(upstream, state.dispatcher.policy()))
}

/// Handle GET /health
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "meli-proxy"
    }))
}

/// Convert an upstream result into the client-facing response.
fn upstream_into_response(upstream: UpstreamResponse, policy: AuthFailurePolicy) -> Response {
    if let Some(refresh_error) = &upstream.refresh_failure {
        let body = refresh_failure_body(&upstream, policy, refresh_error);
        return (upstream.status, Json(body)).into_response();
    }

    let content_type = upstream
        .content_type
        .unwrap_or_else(|| "application/json".to_string());

    Response::builder()
        .status(upstream.status)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(upstream.body))
        .unwrap_or_else(|e| {
            ProxyError(OAuthError::Transport(format!("Failed to build response: {}", e)))
                .into_response()
        })
}

/// Envelope returned when the upstream rejected the token and the refresh
/// failed: the original response plus what the token endpoint said.
fn refresh_failure_body(
    upstream: &UpstreamResponse,
    policy: AuthFailurePolicy,
    refresh_error: &OAuthError,
) -> serde_json::Value {
    let rejected = upstream.as_error(policy);

    serde_json::json!({
        "error": "token_refresh_failed",
        "upstream": {
            "status": upstream.status.as_u16(),
            "body": json_or_text(&upstream.text()),
            "message": rejected.map(|e| e.to_string()),
        },
        "refresh": {
            "status": refresh_error.status().map(|s| s.as_u16()),
            "body": refresh_error.body().map(json_or_text),
            "message": refresh_error.to_string(),
        }
    })
}

fn json_or_text(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

/// Error type for proxy responses.
#[derive(Debug)]
pub struct ProxyError(OAuthError);

impl From<OAuthError> for ProxyError {
    fn from(err: OAuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self.0 {
            OAuthError::Transport(_) => (StatusCode::BAD_GATEWAY, "network_error"),
            OAuthError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            other => (
                other.status().unwrap_or(StatusCode::BAD_GATEWAY),
                "upstream_error",
            ),
        };

        tracing::error!(error = %self.0, "Search proxy request failed");

        let body = serde_json::json!({
            "error": {
                "type": error_type,
                "message": self.0.to_string()
            }
        });

        (status, Json(body)).into_response()
    }
}
