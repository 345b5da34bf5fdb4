//! Request routing and handlers.
//!
//! Every `/api/*` handler authenticates the session first, applies the
//! access guard, then delegates to the proxy facade. `/file/{id}` streams
//! content; everything unmatched falls through to the static frontend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use http::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE,
    SET_COOKIE,
};
use http::{HeaderMap, StatusCode, Uri};
use serde::Deserialize;

use drivegate_accounts::AccountPool;
use drivegate_common::{Error, Result};
use drivegate_crypto::TokenSealer;
use drivegate_drive::{Drive, UploadPoll};

use crate::config::Config;
use crate::users::{User, UserDirectory};
use crate::{assets, guard, session};

/// Shared state behind every handler.
pub struct AppState {
    pub drive: Drive,
    pub users: UserDirectory,
    pub sealer: TokenSealer,
    pub static_base: String,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        let sealer = TokenSealer::new(&config.secret);
        let pool = AccountPool::new(
            config.accounts.clone(),
            config.pool_config(),
            &config.secret,
            sealer.clone(),
            http.clone(),
        );
        let users = UserDirectory::new(http.clone(), &config.user_url, &config.secret, sealer.clone());

        Ok(Self {
            drive: Drive::new(pool, sealer.clone(), http.clone()),
            users,
            sealer,
            static_base: config.static_url.clone(),
            http,
        })
    }
}

/// Error wrapper carrying the HTTP status mapping.
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Upstream(_) | Error::AuthRefreshFailed(_) | Error::UnexpectedStatus(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::debug!(%status, error = %self.0, "request failed");
        (status, self.0.to_string()).into_response()
    }
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "access denied").into_response()
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/api/list", get(api_list))
        .route("/api/search", get(api_search))
        .route("/api/file", get(api_file))
        .route("/api/copyFileInit", post(copy_init))
        .route("/api/copyFileExec", post(copy_exec))
        .route("/api/copyFileStat", get(copy_stat))
        .route("/file/{id}", get(file_download))
        .fallback(static_fallback)
        .with_state(state)
}

/// Resolve the session or fail with 401. Every `/api/*` and `/file/*`
/// request goes through here.
async fn require_user(
    state: &AppState,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> std::result::Result<User, AppError> {
    let token = session::session_token(headers, query)
        .ok_or_else(|| Error::Auth("session required".to_string()))?;
    session::authenticate(&state.users, &state.sealer, &token)
        .await
        .map_err(AppError::from)
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    pass: String,
}

/// Whether a submitted name/password pair matches the stored record.
///
/// The directory lookup is hash-addressed, so the record's own name is
/// compared as well as the password.
fn credentials_match(user: &User, name: &str, pass: &str) -> bool {
    user.name == name && user.pass == pass
}

async fn login(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> Response {
    if !form.name.is_empty() {
        if let Ok(user) = state.users.lookup(&form.name).await {
            if credentials_match(&user, &form.name, &form.pass) {
                return match session::issue_session(&state.sealer, &user) {
                    Ok(token) => (
                        [(
                            SET_COOKIE,
                            format!("t={}; Path=/; HttpOnly; SameSite=Lax", token),
                        )],
                        Redirect::temporary("/"),
                    )
                        .into_response(),
                    Err(e) => AppError(e).into_response(),
                };
            }
        }
        tracing::info!(name = %form.name, "login rejected");
    }

    // Failed or blank login: serve the login page again.
    match assets::login_page(&state.http, &state.static_base).await {
        Ok(response) => response,
        Err(e) => AppError(e).into_response(),
    }
}

async fn logout() -> Response {
    (
        [(
            SET_COOKIE,
            "t=; Path=/; HttpOnly; Expires=Thu, 01 Jan 1970 00:00:00 GMT".to_string(),
        )],
        Redirect::temporary("/"),
    )
        .into_response()
}

async fn api_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> std::result::Result<Response, AppError> {
    let user = require_user(&state, &headers, &params).await?;

    let parent = params.get("parent").filter(|p| !p.is_empty());
    if let Some(parent) = parent {
        if !guard::drive_visible(&user, parent, false) {
            return Ok(forbidden());
        }
    }

    let mut list = state
        .drive
        .ls(
            parent.map(String::as_str),
            params.get("orderBy").map(String::as_str),
            params.get("pageToken").map(String::as_str),
        )
        .await?;

    if let Some(drives) = list.drives.take() {
        list.drives = Some(guard::filter_drives(&user, drives, parent.is_none()));
    }

    Ok(Json(list).into_response())
}

async fn api_search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> std::result::Result<Response, AppError> {
    let user = require_user(&state, &headers, &params).await?;

    let query = params.get("q").map(String::as_str).unwrap_or("");
    let scope = guard::search_scope(&user, &state.drive).await?;

    let mut list = state
        .drive
        .search(query, &scope, params.get("pageToken").map(String::as_str))
        .await?;

    // Scope exclusion covers drives; parent filtering covers results that
    // surface through shared folders inside a denied drive.
    if let Some(files) = list.files.take() {
        list.files = Some(
            files
                .into_iter()
                .filter(|f| guard::parents_visible(&user, f))
                .collect(),
        );
    }

    Ok(Json(list).into_response())
}

async fn api_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> std::result::Result<Response, AppError> {
    let user = require_user(&state, &headers, &params).await?;

    let id = params
        .get("id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::InvalidInput("id is required".to_string()))?;
    if !guard::drive_visible(&user, id, false) {
        return Ok(forbidden());
    }

    let file = state.drive.file(id).await?;
    if !guard::parents_visible(&user, &file) {
        return Ok(forbidden());
    }

    Ok(Json(file).into_response())
}

#[derive(Deserialize)]
struct CopyInitForm {
    src: String,
    #[serde(default)]
    dst: String,
}

async fn copy_init(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Form(form): Form<CopyInitForm>,
) -> std::result::Result<Response, AppError> {
    let user = require_user(&state, &headers, &params).await?;

    if form.src.is_empty() || form.dst.is_empty() {
        return Err(Error::InvalidInput("src and dst are required".to_string()).into());
    }
    if !guard::drive_visible(&user, &form.src, false) || !guard::drive_visible(&user, &form.dst, false)
    {
        return Ok(forbidden());
    }

    let init = state.drive.copy_init(&form.src, &form.dst).await?;
    Ok(Json(init).into_response())
}

#[derive(Deserialize)]
struct CopyExecForm {
    src: String,
    token: String,
}

async fn copy_exec(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Form(form): Form<CopyExecForm>,
) -> std::result::Result<Response, AppError> {
    let user = require_user(&state, &headers, &params).await?;

    if form.src.is_empty() || form.token.is_empty() {
        return Err(Error::InvalidInput("src and token are required".to_string()).into());
    }
    if !guard::drive_visible(&user, &form.src, false) {
        return Ok(forbidden());
    }

    let upstream = state.drive.copy_exec(&form.src, &form.token).await?;

    let status = upstream.status();
    let content_type = upstream.headers().get(CONTENT_TYPE).cloned();
    let body = upstream
        .bytes()
        .await
        .map_err(|e| Error::Upstream(format!("upload relay read failed: {}", e)))?;

    let mut builder = Response::builder().status(status);
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from(body))
        .map_err(|e| Error::Upstream(format!("upload relay failed: {}", e)).into())
}

async fn copy_stat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> std::result::Result<Response, AppError> {
    let _user = require_user(&state, &headers, &params).await?;

    let token = params
        .get("token")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::InvalidInput("token is required".to_string()))?;

    // An unexpected poll status is still a well-formed answer for the
    // frontend: it comes back as a JSON error report, not a gateway error.
    match state.drive.copy_stat(token).await {
        Ok(poll) => Ok(Json(poll).into_response()),
        Err(e @ Error::UnexpectedStatus(_)) => Ok(Json(UploadPoll::Error {
            message: e.to_string(),
        })
        .into_response()),
        Err(e) => Err(e.into()),
    }
}

async fn file_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> std::result::Result<Response, AppError> {
    let user = require_user(&state, &headers, &params).await?;

    if !guard::drive_visible(&user, &id, false) {
        return Ok(forbidden());
    }

    let range = headers.get(RANGE).and_then(|v| v.to_str().ok());
    let upstream = state.drive.download(&id, range).await?;

    let mut builder = Response::builder().status(upstream.status());
    for name in [
        CONTENT_TYPE,
        CONTENT_LENGTH,
        CONTENT_RANGE,
        ACCEPT_RANGES,
        CONTENT_DISPOSITION,
    ] {
        if let Some(value) = upstream.headers().get(&name) {
            builder = builder.header(name, value);
        }
    }

    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| Error::Upstream(format!("download relay failed: {}", e)).into())
}

async fn static_fallback(
    State(state): State<Arc<AppState>>,
    uri: Uri,
) -> std::result::Result<Response, AppError> {
    assets::serve(&state.http, &state.static_base, uri.path())
        .await
        .map_err(AppError::from)
}
