use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::info;

use crate::{
    context::ClientIp,
    session::{Session, ERROR_KEY, USER_KEY},
};

/// Where unauthenticated visitors are sent.
pub const ENTRY_POINT: &str = "/";

/// Axum middleware that only lets requests through when the session holds a
/// logged-in user. Everyone else gets an error flash and a 307 back to the
/// entry point; the inner handler never runs for them.
///
/// The redirect is temporary on purpose: the outcome depends on session
/// state and must be re-evaluated on every request.
pub async fn require_user(
    client_ip: ClientIp,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    if !session.exists(USER_KEY) {
        info!(client_ip = %client_ip, path = %request.uri().path(), "audit: auth.denied");
        session.insert(ERROR_KEY, &"Log in first");
        return Redirect::temporary(ENTRY_POINT).into_response();
    }
    next.run(request).await
}
