pub mod auth;
pub mod client_ip;
pub mod context;
pub mod dirs;
pub mod error;
pub mod handlers;
pub mod password;
pub mod server;
pub mod session;
pub mod store;
pub mod upload;

use std::sync::Arc;

/// Shared application state threaded through axum handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub store: store::Store,
    /// Session transport and lifetime.
    pub session: Arc<session::SessionConfig>,
    /// Upload destination and policy.
    pub uploads: Arc<upload::UploadConfig>,
}

pub use server::{build_router, build_state, open_store, resolve_data_dir, run, ServerConfig};
