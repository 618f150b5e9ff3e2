use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    auth::ENTRY_POINT,
    context::ClientIp,
    error::AppError,
    session::{Session, ERROR_KEY, FLASH_KEY, USER_KEY},
    store::User,
    upload::upload_files,
    AppState,
};

/// Landing page after a successful login or profile change.
pub const PROFILE_PATH: &str = "/user/profile";

/// Form field carrying a profile picture.
pub const PROFILE_PICTURE_FIELD: &str = "file";

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

// ── Home ──────────────────────────────────────────────────────────────────────

pub async fn home(client_ip: ClientIp, session: Session) -> Html<String> {
    let user = session.get::<User>(USER_KEY);
    let body = match user {
        Some(u) => format!(
            "<p>Signed in as {}. <a href=\"{PROFILE_PATH}\">Profile</a></p>",
            escape_html(&u.email)
        ),
        None => "<form method=\"post\" action=\"/login\">\
                 <input type=\"email\" name=\"email\">\
                 <input type=\"password\" name=\"password\">\
                 <button type=\"submit\">Log in</button></form>"
            .to_owned(),
    };
    let origin = format!(
        "<small>Your request came from {}</small>",
        escape_html(client_ip.as_str())
    );
    page("Home", &session, &format!("{body}{origin}"))
}

// ── Login / logout ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Credential failures of any kind look the same to the client.
pub async fn login(
    State(state): State<AppState>,
    client_ip: ClientIp,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, AppError> {
    if form.email.trim().is_empty() || form.password.is_empty() {
        session.insert(ERROR_KEY, &"Invalid login!");
        return Ok(Redirect::to(ENTRY_POINT));
    }

    let Some(user) = state.store.find_by_credentials(&form.email, &form.password)? else {
        info!(client_ip = %client_ip, "audit: session.login.failed");
        session.insert(ERROR_KEY, &"Invalid login!");
        return Ok(Redirect::to(ENTRY_POINT));
    };

    // Privilege change: never keep a pre-login token.
    session.cycle_id();
    session.insert(USER_KEY, &user);
    session.insert(FLASH_KEY, &"Successfully logged in!");
    info!(client_ip = %client_ip, user_id = user.id, "audit: session.login");

    Ok(Redirect::to(PROFILE_PATH))
}

pub async fn logout(session: Session) -> Redirect {
    if let Some(user) = session.remove::<User>(USER_KEY) {
        info!(user_id = user.id, "audit: session.logout");
    }
    session.cycle_id();
    session.insert(FLASH_KEY, &"Logged out");
    Redirect::to(ENTRY_POINT)
}

// ── Profile ───────────────────────────────────────────────────────────────────

pub async fn profile(
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>, AppError> {
    let user = session
        .get::<User>(USER_KEY)
        .ok_or(AppError::Unauthenticated)?;
    let user = state.store.get_user(user.id)?.unwrap_or(user);

    let avatar = match &user.avatar {
        Some(name) => format!(
            "<img src=\"/uploads/{0}\" alt=\"profile picture\"><p>{0}</p>",
            escape_html(name)
        ),
        None => "<p>No profile picture yet.</p>".to_owned(),
    };
    let body = format!(
        "<h1>{} {}</h1><p>{}</p>{avatar}\
         <form method=\"post\" action=\"/user/upload-profile-pic\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"{PROFILE_PICTURE_FIELD}\" accept=\"image/*\">\
         <button type=\"submit\">Upload</button></form>",
        escape_html(&user.first_name),
        escape_html(&user.last_name),
        escape_html(&user.email),
    );
    Ok(page("Profile", &session, &body))
}

/// Store one image and make it the caller's avatar, then 303 back to the
/// profile so a refresh does not resubmit the form.
pub async fn upload_profile_pic(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    // The gate already checked this; a handler mounted without it must
    // still not proceed anonymously.
    let user = session
        .get::<User>(USER_KEY)
        .ok_or(AppError::Unauthenticated)?;

    let options = state.uploads.profile_picture_options(PROFILE_PICTURE_FIELD);
    let files = upload_files(multipart, &state.uploads.dir, &options).await?;
    let Some(file) = files.into_iter().next() else {
        return Err(crate::upload::UploadError::NoFile.into());
    };

    let updated = match state.store.update_avatar(user.id, &file.stored_name) {
        Ok(updated) => updated,
        Err(e) => {
            discard(&state, &file.stored_name).await;
            return Err(e.into());
        }
    };
    if !updated {
        discard(&state, &file.stored_name).await;
        return Err(AppError::Unauthenticated);
    }

    info!(user_id = user.id, stored = %file.stored_name, "audit: user.avatar");
    session.insert(
        USER_KEY,
        &User {
            avatar: Some(file.stored_name),
            ..user
        },
    );
    session.insert(FLASH_KEY, &"Updated!");
    Ok(Redirect::to(PROFILE_PATH))
}

// ── Generic uploads ───────────────────────────────────────────────────────────

pub async fn upload(State(state): State<AppState>, multipart: Multipart) -> Result<Response, AppError> {
    let files = upload_files(multipart, &state.uploads.dir, &state.uploads.options()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "files": files }))).into_response())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn discard(state: &AppState, stored_name: &str) {
    let path = state.uploads.dir.join(stored_name);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!(path = %path.display(), error = %e, "failed to remove orphaned upload");
    }
}

/// Wrap `body` in the page shell, consuming pending flash messages.
fn page(title: &str, session: &Session, body: &str) -> Html<String> {
    let mut notices = String::new();
    if let Some(msg) = session.remove::<String>(FLASH_KEY) {
        notices.push_str(&format!("<div class=\"flash\">{}</div>", escape_html(&msg)));
    }
    if let Some(msg) = session.remove::<String>(ERROR_KEY) {
        notices.push_str(&format!("<div class=\"error\">{}</div>", escape_html(&msg)));
    }
    Html(format!(
        "<!doctype html><html><head><title>{title}</title></head>\
         <body>{notices}{body}</body></html>"
    ))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
