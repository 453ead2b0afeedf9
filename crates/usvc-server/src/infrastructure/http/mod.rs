//! HTTP API (axum).
//!
//! ```text
//! GET    /health                 public
//! POST   /auth/register          public
//! POST   /auth/login             public
//! GET    /api/users              admin
//! GET    /api/users/:id          self or admin
//! PUT    /api/users/:id          self or admin
//! DELETE /api/users/:id          admin
//! POST   /api/roles              admin
//! POST   /api/users/:id/roles    admin
//! ```
//!
//! Everything under `/api` passes through [`gate::require_bearer`] first.

pub mod errors;
pub mod gate;
pub mod routes;

use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::application::accounts::AccountService;
use routes::AppState;

/// Builds the full router.
pub fn build_router(accounts: Arc<AccountService>) -> Router {
    let tokens = Arc::clone(accounts.tokens());

    let api = Router::new()
        .route("/users", get(routes::list_users))
        .route(
            "/users/:id",
            get(routes::get_user)
                .put(routes::update_user)
                .delete(routes::delete_user),
        )
        .route("/users/:id/roles", post(routes::assign_role))
        .route("/roles", post(routes::create_role))
        .route_layer(axum::middleware::from_fn_with_state(
            tokens,
            gate::require_bearer,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .route("/auth/register", post(routes::register))
        .route("/auth/login", post(routes::login))
        .nest("/api", api)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    id = %Uuid::new_v4(),
                    method = %req.method(),
                    uri = %req.uri(),
                )
            }),
        )
        // Development default: any origin may call the API.
        .layer(CorsLayer::permissive())
        .with_state(AppState { accounts })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStore;
    use axum::http::{header, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use usvc_core::{TokenAuthority, DEFAULT_TOKEN_VALIDITY};

    fn app() -> (Router, Arc<AccountService>) {
        let accounts = Arc::new(AccountService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(TokenAuthority::new(b"router-secret", DEFAULT_TOKEN_VALIDITY).unwrap()),
        ));
        (build_router(Arc::clone(&accounts)), accounts)
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_returns_created_with_id_and_email() {
        // Arrange
        let (app, _) = app();
        let req = json_request(
            "POST",
            "/auth/register",
            None,
            json!({"email": "r@example.com", "password": "pw", "full_name": "R"}),
        );

        // Act
        let response = app.oneshot(req).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["email"], "r@example.com");
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        let (app, _) = app();
        let req = Request::post("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], "invalid payload");
    }

    #[tokio::test]
    async fn test_wrong_field_type_does_not_echo_parser_text() {
        let (app, _) = app();
        let req = json_request("POST", "/auth/register", None, json!({"email": 42, "password": "pw"}));

        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["message"], "invalid payload");
        assert!(!body.to_string().contains("invalid type"));
    }

    #[tokio::test]
    async fn test_api_without_token_is_missing_auth() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/api/users").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(read_json(response).await["error"], "missing_auth");
    }

    #[tokio::test]
    async fn test_login_then_read_own_record() {
        // Arrange
        let (app, accounts) = app();
        let me = accounts.register("me@example.com", "pw", "Me").await.unwrap();
        let login = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/login",
                None,
                json!({"email": "me@example.com", "password": "pw"}),
            ))
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::OK);
        let login = read_json(login).await;
        let token = login["token"].as_str().unwrap().to_string();
        assert_eq!(login["user"]["full_name"], "Me");

        // Act
        let response = app
            .oneshot(
                Request::get(format!("/api/users/{}", me.id))
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["email"], "me@example.com");
        assert_eq!(body["roles"], json!(["user"]));
    }

    #[tokio::test]
    async fn test_non_integer_path_id_is_validation_error() {
        let (app, accounts) = app();
        accounts.register("me@example.com", "pw", "Me").await.unwrap();
        let token = accounts.login("me@example.com", "pw").await.unwrap().token;

        let response = app
            .oneshot(
                Request::get("/api/users/abc")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_admin_creates_and_assigns_role() {
        // Arrange
        let (app, accounts) = app();
        accounts.ensure_admin("admin@local", "admin", "Administrator").await.unwrap();
        let target = accounts.register("t@example.com", "pw", "T").await.unwrap();
        let admin_token = accounts.login("admin@local", "admin").await.unwrap().token;

        // Act
        let created = app
            .clone()
            .oneshot(json_request("POST", "/api/roles", Some(&admin_token), json!({"name": "ops"})))
            .await
            .unwrap();
        let assigned = app
            .oneshot(json_request(
                "POST",
                &format!("/api/users/{}/roles", target.id),
                Some(&admin_token),
                json!({"role_name": "ops"}),
            ))
            .await
            .unwrap();

        // Assert
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(read_json(created).await["name"], "ops");
        assert_eq!(assigned.status(), StatusCode::OK);
        assert_eq!(read_json(assigned).await, json!({"status": "assigned"}));
    }

    #[tokio::test]
    async fn test_admin_delete_returns_status_deleted() {
        let (app, accounts) = app();
        accounts.ensure_admin("admin@local", "admin", "Administrator").await.unwrap();
        let victim = accounts.register("v@example.com", "pw", "V").await.unwrap();
        let admin_token = accounts.login("admin@local", "admin").await.unwrap().token;

        let response = app
            .oneshot(
                Request::delete(format!("/api/users/{}", victim.id))
                    .header(header::AUTHORIZATION, format!("Bearer {admin_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, json!({"status": "deleted"}));
    }
}
