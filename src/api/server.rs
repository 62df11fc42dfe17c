//! HTTP control API server
//!
//! Read-only routes (status, levels, devices, config reads) are open;
//! everything that mutates state requires a bearer token from /api/login.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{self, AppState};
use crate::error::Result;

/// Build the API router over the shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(handlers::get_status))
        .route("/api/levels", get(handlers::get_levels))
        .route("/api/devices", get(handlers::get_devices))
        .route("/api/config/:role", get(handlers::get_config))
        .route("/api/config/:role", put(handlers::put_config))
        .route("/api/roles/:role/start", post(handlers::start_role))
        .route("/api/roles/:role/stop", post(handlers::stop_role))
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/auth/status", get(handlers::auth_status))
        .route("/api/password", post(handlers::change_password))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "control API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::LevelMonitor;
    use crate::auth::{CredentialStore, SessionStore};
    use crate::config::ConfigStore;
    use crate::registry::SessionRegistry;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let dir = std::env::temp_dir().join(format!("cast-control-test-{}", uuid::Uuid::new_v4()));
        let config = Arc::new(ConfigStore::load(&dir).unwrap());
        let levels = LevelMonitor::new(config.clone());
        let registry = SessionRegistry::new(config.clone(), levels.clone());
        let credentials = Arc::new(CredentialStore::load_or_init(dir.join("password.txt")).unwrap());
        let sessions = SessionStore::new();
        Arc::new(AppState {
            registry,
            config,
            levels,
            credentials,
            sessions,
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login_token(state: &Arc<AppState>) -> String {
        let response = build_router(state.clone())
            .oneshot(
                Request::post("/api/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"username":"admin","password":"admin123"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        json["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn status_is_readable_without_auth() {
        let state = test_state();
        let response = build_router(state)
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["encoder"]["state"], "stopped");
        assert_eq!(json["data"]["levels"]["stale"], true);
    }

    #[tokio::test]
    async fn mutating_route_requires_token() {
        let state = test_state();
        let response = build_router(state)
            .oneshot(
                Request::post("/api/roles/encoder/start")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "unauthorized");
    }

    #[tokio::test]
    async fn bad_credentials_are_rejected() {
        let state = test_state();
        let response = build_router(state)
            .oneshot(
                Request::post("/api/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"username":"admin","password":"nope"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_token_authorizes_stop() {
        let state = test_state();
        let token = login_token(&state).await;
        let response = build_router(state)
            .oneshot(
                Request::post("/api/roles/decoder/stop")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["state"], "stopped");
    }

    #[tokio::test]
    async fn config_read_is_open_but_write_is_not() {
        let state = test_state();
        let router = build_router(state.clone());

        let response = router
            .clone()
            .oneshot(
                Request::get("/api/config/encoder")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["bitrateKbps"], 128);

        let response = router
            .oneshot(
                Request::put("/api/config/encoder")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"device":"hw:1,0"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn config_write_validates_ranges() {
        let state = test_state();
        let token = login_token(&state).await;
        let mut body = serde_json::to_value(state.config.encoder()).unwrap();
        body["bitrateKbps"] = serde_json::json!(9000);

        let response = build_router(state)
            .oneshot(
                Request::put("/api/config/encoder")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["kind"], "invalid_config");
    }

    #[tokio::test]
    async fn password_change_invalidates_sessions_and_syncs_server() {
        let state = test_state();
        let token = login_token(&state).await;
        let router = build_router(state.clone());

        let response = router
            .clone()
            .oneshot(
                Request::post("/api/password")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"currentPassword":"admin123","newPassword":"changed1"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.config.server().source_password, "changed1");

        // old token no longer works
        let response = router
            .oneshot(
                Request::post("/api/roles/decoder/stop")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn failed_server_sync_still_invalidates_sessions() {
        let state = test_state();
        let token = login_token(&state).await;
        let router = build_router(state.clone());

        // make the server-config sync fail by blocking its file path
        std::fs::create_dir(state.config.dir().join("server.toml")).unwrap();

        let response = router
            .clone()
            .oneshot(
                Request::post("/api/password")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"currentPassword":"admin123","newPassword":"changed1"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::OK);

        // the credential really changed, so the old sessions must be gone
        assert!(state.credentials.verify("changed1").unwrap());
        let response = router
            .oneshot(
                Request::post("/api/roles/decoder/stop")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_status_reflects_session() {
        let state = test_state();
        let router = build_router(state.clone());

        let response = router
            .clone()
            .oneshot(
                Request::get("/api/auth/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["data"]["authenticated"], false);

        let token = login_token(&state).await;
        let response = router
            .oneshot(
                Request::get("/api/auth/status")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["data"]["authenticated"], true);
        assert_eq!(json["data"]["username"], "admin");
    }
}
