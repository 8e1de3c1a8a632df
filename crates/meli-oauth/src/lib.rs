//! OAuth2 credential lifecycle and auth-aware search proxy.
//!
//! Forwards product searches to the Mercado Libre API with a bearer token,
//! refreshing the token through the refresh-token grant when the upstream
//! rejects it and retrying the search exactly once.
//!
//! # Components
//!
//! - [`token_store`] - Current access/refresh token pair
//! - [`refresh`] - Refresh-token grant, coalesced across concurrent callers
//! - [`dispatcher`] - Upstream search with one refresh-and-retry cycle
//! - [`proxy`] - Axum-based HTTP front end

pub mod dispatcher;
pub mod error;
pub mod proxy;
pub mod refresh;
pub mod token_store;

pub use dispatcher::{AuthFailurePolicy, AuthenticatedDispatcher, UpstreamResponse};
pub use error::{OAuthError, Result};
pub use proxy::{ProxyConfig, ProxyServer};
pub use refresh::{RefreshOutcome, TokenRefresher, TokenResponse};
pub use token_store::{
    ClientCredentials, CredentialPair, InMemoryTokenStore, SharedTokenStore, TokenStore,
};
