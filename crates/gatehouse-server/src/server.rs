use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    auth::require_user,
    context::add_request_context,
    handlers::{health, home, login, logout, profile, upload, upload_profile_pic},
    session::{load_session, SessionConfig},
    store::Store,
    upload::UploadConfig,
    AppState,
};

/// Database file inside the data directory.
pub const DB_FILE: &str = "gatehouse.db";

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    /// Defaults to `<data_dir>/uploads`.
    pub upload_dir: Option<PathBuf>,
    pub session_header: String,
    pub session_cookie: String,
    pub session_lifetime: Duration,
    pub sweep_interval: Duration,
    /// Cap on a whole request body.
    pub max_body_bytes: usize,
    /// Cap on a single uploaded file.
    pub max_file_size: Option<u64>,
    /// Comma-separated media types accepted by the generic upload endpoint.
    pub allowed_content_types: Option<String>,
    pub cors_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            host: std::env::var("GATEHOUSE_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("GATEHOUSE_PORT").unwrap_or(8080),
            data_dir: std::env::var("GATEHOUSE_DATA_DIR").ok().map(PathBuf::from),
            upload_dir: std::env::var("GATEHOUSE_UPLOAD_DIR").ok().map(PathBuf::from),
            session_header: std::env::var("GATEHOUSE_SESSION_HEADER")
                .unwrap_or_else(|_| session.header_name.as_str().to_owned()),
            session_cookie: std::env::var("GATEHOUSE_SESSION_COOKIE")
                .unwrap_or(session.cookie_name),
            session_lifetime: env_parse("GATEHOUSE_SESSION_TTL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(session.lifetime),
            sweep_interval: Duration::from_secs(300),
            max_body_bytes: env_parse("GATEHOUSE_MAX_BODY_BYTES").unwrap_or(10 * 1024 * 1024),
            max_file_size: env_parse("GATEHOUSE_MAX_FILE_BYTES"),
            allowed_content_types: std::env::var("GATEHOUSE_ALLOWED_CONTENT_TYPES").ok(),
            cors_origins: std::env::var("GATEHOUSE_CORS_ORIGINS").ok(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Use `explicit` (created if missing) or fall back to the platform data dir.
pub fn resolve_data_dir(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(d) => {
            std::fs::create_dir_all(d).context("create data dir")?;
            Ok(d.clone())
        }
        None => crate::dirs::data_dir(),
    }
}

pub fn open_store(data_dir: Option<&PathBuf>) -> Result<Store> {
    let data_dir = resolve_data_dir(data_dir)?;
    Store::open(&data_dir.join(DB_FILE)).context("open store")
}

/// Assemble the shared state from a config. Creates the upload directory
/// and checks it is writable.
pub fn build_state(cfg: &ServerConfig) -> Result<AppState> {
    let data_dir = resolve_data_dir(cfg.data_dir.as_ref())?;
    info!(data_dir = %data_dir.display(), "using data directory");

    let store = Store::open(&data_dir.join(DB_FILE)).context("open store")?;

    let upload_dir = cfg
        .upload_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("uploads"));
    std::fs::create_dir_all(&upload_dir).context("create upload dir")?;
    let meta = std::fs::metadata(&upload_dir).context("stat upload dir")?;
    if meta.permissions().readonly() {
        anyhow::bail!("upload dir {} is not writable", upload_dir.display());
    }

    let allowed_content_types = cfg.allowed_content_types.as_deref().map(|list| {
        list.split(',')
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect::<BTreeSet<_>>()
    });

    let session = SessionConfig {
        header_name: HeaderName::from_bytes(cfg.session_header.as_bytes())
            .context("invalid session header name")?,
        cookie_name: cfg.session_cookie.clone(),
        lifetime: cfg.session_lifetime,
    };

    Ok(AppState {
        store,
        session: Arc::new(session),
        uploads: Arc::new(UploadConfig {
            dir: upload_dir,
            max_file_size: cfg.max_file_size,
            allowed_content_types,
        }),
    })
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let state = build_state(&cfg)?;

    state.store.clone().spawn_sweep(cfg.sweep_interval);

    let app = build_router(state, cfg.cors_origins.as_deref(), cfg.max_body_bytes);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, "gatehouse server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")
}

/// Full middleware chain and route table.
///
/// Outermost first: tracing, CORS, request context, session loader, body
/// limit, then the routes. The user gate wraps only matched protected
/// routes; unknown paths fall through to a plain 404.
pub fn build_router(state: AppState, cors_origins: Option<&str>, max_body_bytes: usize) -> Router {
    let cors = build_cors(cors_origins, &state.session.header_name);

    let public = Router::new()
        .route("/", get(home))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/health", get(health));

    let protected = Router::new()
        .route("/user/profile", get(profile))
        .route("/user/upload-profile-pic", post(upload_profile_pic))
        .route("/user/uploads", post(upload))
        .nest_service("/uploads", ServeDir::new(&state.uploads.dir))
        .route_layer(middleware::from_fn(require_user));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn_with_state(state.clone(), load_session))
        .layer(middleware::from_fn(add_request_context))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Browser clients that carry the session in a header need to read it back
/// from cross-origin responses, so it is always exposed.
fn build_cors(origins: Option<&str>, session_header: &HeaderName) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, session_header.clone()])
        .expose_headers([session_header.clone()]);

    let Some(list) = origins else {
        return cors.allow_origin(Any);
    };
    let allowed: Vec<HeaderValue> = list
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path) -> ServerConfig {
        ServerConfig {
            data_dir: Some(dir.join("data")),
            upload_dir: None,
            allowed_content_types: Some("image/PNG, text/plain,,".into()),
            ..Default::default()
        }
    }

    #[test]
    fn build_state_creates_upload_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let state = build_state(&config(tmp.path())).unwrap();

        assert_eq!(state.uploads.dir, tmp.path().join("data").join("uploads"));
        assert!(state.uploads.dir.is_dir());
        assert!(tmp.path().join("data").join(DB_FILE).exists());
    }

    #[test]
    fn allowed_types_are_normalized() {
        let tmp = tempfile::tempdir().unwrap();
        let state = build_state(&config(tmp.path())).unwrap();

        let allowed = state.uploads.allowed_content_types.as_ref().unwrap();
        assert_eq!(
            allowed.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["image/png", "text/plain"]
        );
    }

    #[test]
    fn invalid_session_header_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ServerConfig {
            session_header: "bad header\n".into(),
            ..config(tmp.path())
        };
        assert!(build_state(&cfg).is_err());
    }

    #[test]
    fn router_builds() {
        let tmp = tempfile::tempdir().unwrap();
        let state = build_state(&config(tmp.path())).unwrap();
        let _router = build_router(state, Some("https://example.com"), 1024);
    }
}
