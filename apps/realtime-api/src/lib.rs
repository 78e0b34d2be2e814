pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod store;

use std::sync::Arc;

use auth::tokens::TokenVerifier;

/// Shared application state available to the HTTP layer.
pub struct AppState {
    pub verifier: Arc<dyn TokenVerifier>,
}
