//! HTTP API handlers

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use crate::audio::{list_devices, AudioDeviceInfo, AudioLevel, LevelMonitor};
use crate::auth::{CredentialStore, SessionStore, UserSession, ADMIN_USERNAME};
use crate::config::ConfigStore;
use crate::error::{AuthError, ConfigError, Error, ProcessError, Result};
use crate::registry::{SessionRegistry, StatusReport};
use crate::session::{Role, SessionSnapshot};

/// Shared handler state
pub struct AppState {
    pub registry: SessionRegistry,
    pub config: Arc<ConfigStore>,
    pub levels: LevelMonitor,
    pub credentials: Arc<CredentialStore>,
    pub sessions: Arc<SessionStore>,
}

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

/// Machine-readable error payload
#[derive(serde::Serialize)]
pub struct ApiError {
    pub kind: &'static str,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                kind: err.kind(),
                message: err.to_string(),
            }),
        }
    }
}

/// HTTP status carried alongside each error kind.
fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::Process(ProcessError::AlreadyRunning(_) | ProcessError::NotRunning(_)) => {
            StatusCode::CONFLICT
        }
        Error::Auth(AuthError::PasswordTooShort(_)) => StatusCode::BAD_REQUEST,
        Error::Auth(AuthError::PasswordHash(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Auth(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject<T>(err: Error) -> (StatusCode, Json<ApiResponse<T>>) {
    (status_for(&err), Json(ApiResponse::failure(&err)))
}

/// Extract the token from an `Authorization: Bearer ...` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Require a valid session for mutating routes.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<UserSession> {
    let token = bearer_token(headers).ok_or(AuthError::Unauthorized)?;
    state.sessions.validate(token)
}

/// Get aggregate status of all roles (read-only, no auth)
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatusReport>> {
    Json(ApiResponse::ok(state.registry.status()))
}

/// Get the latest input level sample (read-only, no auth)
pub async fn get_levels(State(state): State<Arc<AppState>>) -> Json<ApiResponse<AudioLevel>> {
    Json(ApiResponse::ok(state.levels.snapshot()))
}

/// Get available audio devices (read-only, no auth)
pub async fn get_devices() -> Json<ApiResponse<Vec<AudioDeviceInfo>>> {
    Json(ApiResponse::ok(list_devices()))
}

/// Get one role's configuration (read-only, no auth)
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Path(role): Path<Role>,
) -> Json<ApiResponse<serde_json::Value>> {
    let value = match role {
        Role::Encoder => to_value(&state.config.encoder()),
        Role::Decoder => to_value(&state.config.decoder()),
        Role::Server => to_value(&state.config.server()),
    };
    Json(ApiResponse::ok(value))
}

/// Replace one role's configuration
pub async fn put_config(
    State(state): State<Arc<AppState>>,
    Path(role): Path<Role>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    if let Err(e) = authorize(&state, &headers) {
        return reject(e);
    }
    let result = match role {
        Role::Encoder => parse_body(body).and_then(|cfg| {
            state.config.update_encoder(cfg)?;
            Ok(to_value(&state.config.encoder()))
        }),
        Role::Decoder => parse_body(body).and_then(|cfg| {
            state.config.update_decoder(cfg)?;
            Ok(to_value(&state.config.decoder()))
        }),
        Role::Server => parse_body(body).and_then(|cfg| {
            state.config.update_server(cfg)?;
            Ok(to_value(&state.config.server()))
        }),
    };
    match result {
        Ok(value) => (StatusCode::OK, Json(ApiResponse::ok(value))),
        Err(e) => reject(e),
    }
}

/// Start a role
pub async fn start_role(
    State(state): State<Arc<AppState>>,
    Path(role): Path<Role>,
    headers: HeaderMap,
) -> (StatusCode, Json<ApiResponse<SessionSnapshot>>) {
    if let Err(e) = authorize(&state, &headers) {
        return reject(e);
    }
    match state.registry.start_role(role).await {
        Ok(snap) => (StatusCode::OK, Json(ApiResponse::ok(snap))),
        Err(e) => reject(e),
    }
}

/// Stop a role
pub async fn stop_role(
    State(state): State<Arc<AppState>>,
    Path(role): Path<Role>,
    headers: HeaderMap,
) -> (StatusCode, Json<ApiResponse<SessionSnapshot>>) {
    if let Err(e) = authorize(&state, &headers) {
        return reject(e);
    }
    match state.registry.stop_role(role).await {
        Ok(snap) => (StatusCode::OK, Json(ApiResponse::ok(snap))),
        Err(e) => reject(e),
    }
}

#[derive(serde::Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Log in and receive a bearer token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> (StatusCode, Json<ApiResponse<LoginResponse>>) {
    let verified = req.username == ADMIN_USERNAME
        && matches!(state.credentials.verify(&req.password), Ok(true));
    if !verified {
        tracing::warn!(username = %req.username, "login rejected");
        return reject(AuthError::InvalidCredentials.into());
    }
    let session = state.sessions.create(&req.username);
    (
        StatusCode::OK,
        Json(ApiResponse::ok(LoginResponse {
            token: session.token,
            expires_at: session.expires_at,
        })),
    )
}

/// Invalidate the caller's session token
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<ApiResponse<()>> {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.invalidate(token);
    }
    Json(ApiResponse::ok(()))
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Report whether the caller holds a valid session (no auth required)
pub async fn auth_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<ApiResponse<AuthStatus>> {
    let status = match authorize(&state, &headers) {
        Ok(session) => AuthStatus {
            authenticated: true,
            username: Some(session.username),
        },
        Err(_) => AuthStatus {
            authenticated: false,
            username: None,
        },
    };
    Json(ApiResponse::ok(status))
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Change the admin password
///
/// The new credential is pushed into the server role's passwords so the
/// next server start uses it, and every session is invalidated so
/// clients re-authenticate.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    if let Err(e) = authorize(&state, &headers) {
        return reject(e);
    }
    if let Err(e) = state
        .credentials
        .change(&req.current_password, &req.new_password)
    {
        return reject(e);
    }
    // the credential has changed; no session issued against the old
    // one may survive, even if the config sync below fails
    state.sessions.invalidate_all();
    if let Err(e) = state.config.sync_server_passwords(&req.new_password) {
        tracing::error!("password changed but server config sync failed: {e}");
        return reject(e);
    }
    (StatusCode::OK, Json(ApiResponse::ok(())))
}

fn to_value<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn parse_body<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| ConfigError::Parse(e.to_string()).into())
}
