//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use meli_oauth::{
    AuthenticatedDispatcher, ClientCredentials, CredentialPair, SharedTokenStore, TokenRefresher,
    token_store::create_memory_token_store,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SEARCH_PATH: &str = "/sites/MLB/search";
pub const TOKEN_PATH: &str = "/oauth/token";
pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";

/// Mock search API and token endpoint wired to a dispatcher.
pub struct Harness {
    pub upstream: MockServer,
    pub auth: MockServer,
    pub store: SharedTokenStore,
    pub refresher: Arc<TokenRefresher>,
    pub dispatcher: AuthenticatedDispatcher,
}

impl Harness {
    /// Start both mock servers with the store seeded from `access`/`refresh`.
    pub async fn start(access: &str, refresh: &str) -> Self {
        let upstream = MockServer::start().await;
        let auth = MockServer::start().await;
        let token_url = format!("{}{}", auth.uri(), TOKEN_PATH);
        Self::with_token_url(upstream, auth, &token_url, access, refresh)
    }

    /// Like `start`, but sharing `client` between refresher and dispatcher.
    pub async fn start_with_client(client: reqwest::Client, access: &str, refresh: &str) -> Self {
        let upstream = MockServer::start().await;
        let auth = MockServer::start().await;
        let token_url = format!("{}{}", auth.uri(), TOKEN_PATH);
        Self::build(client, upstream, auth, &token_url, access, refresh)
    }

    /// Like `start`, but with an explicit token endpoint URL.
    pub fn with_token_url(
        upstream: MockServer,
        auth: MockServer,
        token_url: &str,
        access: &str,
        refresh: &str,
    ) -> Self {
        Self::build(reqwest::Client::new(), upstream, auth, token_url, access, refresh)
    }

    fn build(
        client: reqwest::Client,
        upstream: MockServer,
        auth: MockServer,
        token_url: &str,
        access: &str,
        refresh: &str,
    ) -> Self {
        let store = create_memory_token_store(CredentialPair::new(access, refresh));
        let refresher = Arc::new(TokenRefresher::new(
            client.clone(),
            token_url,
            ClientCredentials::new(CLIENT_ID, CLIENT_SECRET),
            store.clone(),
        ));
        let search_url = format!("{}{}", upstream.uri(), SEARCH_PATH);
        let dispatcher = AuthenticatedDispatcher::new(client, search_url, refresher.clone())
            .expect("mock server URL is a valid search URL");

        Self {
            upstream,
            auth,
            store,
            refresher,
            dispatcher,
        }
    }

    /// Number of requests the search mock received.
    pub async fn upstream_calls(&self) -> usize {
        self.upstream
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }

    /// Number of requests the token mock received.
    pub async fn token_calls(&self) -> usize {
        self.auth
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }
}

/// Mount a token endpoint mock that accepts `refresh_token` and answers with `body`.
pub async fn mount_refresh(
    auth: &MockServer,
    refresh_token: &str,
    response: ResponseTemplate,
    expected_calls: u64,
) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains(format!("client_id={}", CLIENT_ID)))
        .and(body_string_contains(format!("client_secret={}", CLIENT_SECRET)))
        .and(body_string_contains(format!("refresh_token={}", refresh_token)))
        .respond_with(response)
        .expect(expected_calls)
        .mount(auth)
        .await;
}

/// Token endpoint success payload.
pub fn token_body(access: &str, refresh: Option<&str>) -> serde_json::Value {
    let mut body = json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": 21600,
        "scope": "offline_access read",
        "user_id": 314
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    body
}

/// Search API success payload.
pub fn search_body() -> serde_json::Value {
    json!({
        "site_id": "MLB",
        "query": "celular",
        "paging": { "total": 2, "offset": 0, "limit": 50 },
        "results": [
            { "id": "MLB1", "title": "Celular A" },
            { "id": "MLB2", "title": "Celular B" }
        ]
    })
}
