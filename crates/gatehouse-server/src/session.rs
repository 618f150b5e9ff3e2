use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::{store::SessionRecord, AppState};

/// Key holding the logged-in [`crate::store::User`].
pub const USER_KEY: &str = "user";
/// One-shot success message.
pub const FLASH_KEY: &str = "flash";
/// One-shot error message.
pub const ERROR_KEY: &str = "error";

/// Where session tokens travel and how long they live.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub header_name: HeaderName,
    pub cookie_name: String,
    pub lifetime: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            header_name: HeaderName::from_static("x-session"),
            cookie_name: "gatehouse_session".into(),
            lifetime: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Unchanged,
    Modified,
}

#[derive(Debug)]
struct Inner {
    token: String,
    /// Token this session was loaded under, when it has since been renewed.
    superseded: Option<String>,
    data: BTreeMap<String, String>,
    status: Status,
}

/// Request-scoped handle on the caller's session.
///
/// Cloning shares the same state; the loader middleware persists whatever
/// the handlers wrote once the response is produced.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

impl Session {
    pub(crate) fn new(token: String, data: BTreeMap<String, String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                token,
                superseded: None,
                data,
                status: Status::Unchanged,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn token(&self) -> String {
        self.lock().token.clone()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }

    /// Decode the value under `key`. A value that does not decode as `T`
    /// reads as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.lock().data.get(key).cloned()?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "session value has unexpected type");
                None
            }
        }
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: &T) {
        let encoded = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                error!(key, error = %e, "session value is not serializable");
                return;
            }
        };
        let mut inner = self.lock();
        inner.data.insert(key.to_owned(), encoded);
        inner.status = Status::Modified;
    }

    /// Take the value under `key` out of the session. One-shot flash
    /// entries are read this way.
    pub fn remove<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = {
            let mut inner = self.lock();
            let raw = inner.data.remove(key)?;
            inner.status = Status::Modified;
            raw
        };
        serde_json::from_str(&raw).ok()
    }

    /// Move the session to a fresh token, e.g. on privilege change. The
    /// old token stops resolving once the response is written.
    pub fn cycle_id(&self) {
        let mut inner = self.lock();
        let old = std::mem::replace(&mut inner.token, generate_token());
        if inner.superseded.is_none() {
            inner.superseded = Some(old);
        }
        inner.status = Status::Modified;
    }
}

/// Session of the current request. Requests that did not pass through
/// [`load_session`] get a detached, empty session.
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Session>()
            .cloned()
            .unwrap_or_else(|| Session::new(generate_token(), BTreeMap::new())))
    }
}

/// Axum middleware that loads the caller's session, exposes it to the rest
/// of the chain, and persists it after the inner handler has run.
pub async fn load_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let cfg = &state.session;
    let presented = token_from_request(&request, cfg);

    let loaded = match presented.as_deref() {
        Some(token) => match state.store.load_session(token) {
            Ok(record) => record.map(|r| (token.to_owned(), r.data)),
            Err(e) => return internal_error(e),
        },
        None => None,
    };

    let session = match loaded {
        Some((token, data)) => Session::new(token, data),
        None => {
            debug!("starting new session");
            Session::new(generate_token(), BTreeMap::new())
        }
    };
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    let (token, superseded, record) = {
        let inner = session.lock();
        if inner.status == Status::Unchanged {
            return response;
        }
        let record = SessionRecord {
            data: inner.data.clone(),
            expires_at: crate::store::db::now() + cfg.lifetime.as_secs() as i64,
        };
        (inner.token.clone(), inner.superseded.clone(), record)
    };

    let saved = state.store.save_session(&token, &record);
    if saved.is_ok() {
        if let Some(old) = superseded {
            if let Err(e) = state.store.delete_session(&old) {
                warn!(error = %e, "failed to delete superseded session");
            }
        }
    }
    settle(response, saved, cfg, &token)
}

/// The handler's outcome stands even when the session could not be
/// written; the client then keeps its previous token.
fn settle(
    mut response: Response,
    saved: anyhow::Result<()>,
    cfg: &SessionConfig,
    token: &str,
) -> Response {
    match saved {
        Ok(()) => attach_token(&mut response, cfg, token),
        Err(e) => error!(
            error = %e,
            status = %response.status(),
            "failed to persist session"
        ),
    }
    response
}

fn token_from_request(request: &Request, cfg: &SessionConfig) -> Option<String> {
    let from_header = request
        .headers()
        .get(&cfg.header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    from_header.or_else(|| {
        CookieJar::from_headers(request.headers())
            .get(&cfg.cookie_name)
            .map(|c| c.value().to_owned())
            .filter(|v| !v.is_empty())
    })
}

fn attach_token(response: &mut Response, cfg: &SessionConfig, token: &str) {
    let Ok(value) = HeaderValue::from_str(token) else {
        return;
    };
    let cookie = Cookie::build((cfg.cookie_name.clone(), token.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    let headers = response.headers_mut();
    headers.insert(cfg.header_name.clone(), value);
    if let Ok(cookie) = HeaderValue::from_str(&cookie.to_string()) {
        headers.append(header::SET_COOKIE, cookie);
    }
}

/// 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

fn internal_error(e: anyhow::Error) -> Response {
    error!(error = %e, "session store error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "internal server error"})),
    )
        .into_response()
}
