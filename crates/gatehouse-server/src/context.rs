use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::client_ip::{self, UNKNOWN_CLIENT_IP};

/// Resolved client address. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(String);

impl ClientIp {
    pub fn new(ip: impl Into<String>) -> Self {
        let ip = ip.into();
        if ip.is_empty() {
            Self(UNKNOWN_CLIENT_IP.to_owned())
        } else {
            Self(ip)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientIp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-request values attached by the middleware chain.
///
/// Layers never mutate a context in place: each one derives a new value
/// with a `with_*` call and re-inserts it into the request extensions,
/// shadowing the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    client_ip: Option<ClientIp>,
}

impl RequestContext {
    pub fn with_client_ip(self, ip: ClientIp) -> Self {
        Self {
            client_ip: Some(ip),
        }
    }

    pub fn client_ip(&self) -> Option<&ClientIp> {
        self.client_ip.as_ref()
    }
}

/// Axum middleware that resolves the client address and attaches it to a
/// derived [`RequestContext`]. Resolution failures degrade to a fallback
/// value; the request is always forwarded.
pub async fn add_request_context(mut request: Request, next: Next) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    let ip = match client_ip::resolve(&remote, request.headers()) {
        Ok(ip) => ip,
        Err(e) => {
            debug!(error = %e, "client ip resolution failed, falling back");
            client_ip::fallback(&remote)
        }
    };

    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default()
        .with_client_ip(ClientIp::new(ip));
    request.extensions_mut().insert(ctx);

    next.run(request).await
}

/// Client address of the current request, `unknown` when the context
/// middleware did not run.
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.client_ip().cloned())
            .unwrap_or_else(|| ClientIp::new(UNKNOWN_CLIENT_IP)))
    }
}
