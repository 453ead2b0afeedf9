//! Black-box tests of the HTTP API over a real listener.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};
use usvc_core::{TokenAuthority, DEFAULT_TOKEN_VALIDITY};
use usvc_server::application::accounts::AccountService;
use usvc_server::infrastructure::http::build_router;
use usvc_server::infrastructure::storage::{CredentialStore, InMemoryStore, SqliteStore};

const ADMIN_EMAIL: &str = "admin@local";
const ADMIN_PASSWORD: &str = "admin";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(Arc::new(InMemoryStore::new())).await
    }

    async fn spawn_with(store: Arc<dyn CredentialStore>) -> Self {
        // Same wiring as the binary, bound to an ephemeral port.
        let accounts = Arc::new(AccountService::new(
            store,
            Arc::new(TokenAuthority::new(b"black-box-secret", DEFAULT_TOKEN_VALIDITY).unwrap()),
        ));
        accounts
            .ensure_admin(ADMIN_EMAIL, ADMIN_PASSWORD, "Administrator")
            .await
            .expect("bootstrap admin");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let app = build_router(accounts);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn register(&self, email: &str, password: &str) -> u64 {
        let res = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({"email": email, "password": password, "full_name": email}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["id"].as_u64().expect("numeric id")
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().expect("token").to_string()
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn error_code(res: reqwest::Response) -> String {
    let body: Value = res.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_protected_route_without_token_is_unauthorized() {
    let server = TestServer::spawn().await;

    let res = server.client.get(server.url("/api/users")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "missing_auth");
}

#[tokio::test]
async fn test_garbage_bearer_token_is_invalid_token() {
    let server = TestServer::spawn().await;

    let res = server.get("/api/users", "garbage").await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "invalid_token");
}

#[tokio::test]
async fn test_non_bearer_scheme_is_invalid_auth_header() {
    let server = TestServer::spawn().await;

    let res = server
        .client
        .get(server.url("/api/users"))
        .header("Authorization", "Basic YWRtaW46YWRtaW4=")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "invalid_auth_header");
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_look_the_same() {
    let server = TestServer::spawn().await;
    server.register("known@example.com", "right").await;

    let mut bodies = Vec::new();
    for (email, password) in [("known@example.com", "wrong"), ("ghost@example.com", "right")] {
        let res = server
            .client
            .post(server.url("/auth/login"))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        bodies.push(res.json::<Value>().await.unwrap());
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[0]["error"], "invalid_credentials");
}

#[tokio::test]
async fn test_self_other_and_admin_access_matrix() {
    // Arrange
    let server = TestServer::spawn().await;
    let alice = server.register("alice@example.com", "pw-a").await;
    let bob = server.register("bob@example.com", "pw-b").await;
    let alice_token = server.login("alice@example.com", "pw-a").await;
    let admin_token = server.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    // Act
    let own = server.get(&format!("/api/users/{alice}"), &alice_token).await;
    let other = server.get(&format!("/api/users/{bob}"), &alice_token).await;
    let missing_as_user = server.get("/api/users/9999", &alice_token).await;
    let list_as_user = server.get("/api/users", &alice_token).await;
    let by_admin = server.get(&format!("/api/users/{bob}"), &admin_token).await;
    let missing_as_admin = server.get("/api/users/9999", &admin_token).await;
    let list_as_admin = server.get("/api/users", &admin_token).await;

    // Assert
    assert_eq!(own.status(), StatusCode::OK);
    assert_eq!(other.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(other).await, "forbidden");
    // Policy runs before lookup: a non-admin cannot probe for ids.
    assert_eq!(missing_as_user.status(), StatusCode::FORBIDDEN);
    assert_eq!(list_as_user.status(), StatusCode::FORBIDDEN);
    assert_eq!(by_admin.status(), StatusCode::OK);
    assert_eq!(missing_as_admin.status(), StatusCode::NOT_FOUND);
    assert_eq!(list_as_admin.status(), StatusCode::OK);
    let users: Value = list_as_admin.json().await.unwrap();
    assert_eq!(users.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_role_assignment_is_reflected_in_fresh_token_only() {
    // Arrange
    let server = TestServer::spawn().await;
    let carol = server.register("carol@example.com", "pw").await;
    let old_token = server.login("carol@example.com", "pw").await;
    let admin_token = server.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    // Act
    let res = server
        .client
        .post(server.url(&format!("/api/users/{carol}/roles")))
        .bearer_auth(&admin_token)
        .json(&json!({"role_name": "admin"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let new_token = server.login("carol@example.com", "pw").await;

    // Assert
    assert_eq!(server.get("/api/users", &old_token).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(server.get("/api/users", &new_token).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_own_profile_then_login_with_new_password() {
    let server = TestServer::spawn().await;
    let dave = server.register("dave@example.com", "old").await;
    let token = server.login("dave@example.com", "old").await;

    let res = server
        .client
        .put(server.url(&format!("/api/users/{dave}")))
        .bearer_auth(&token)
        .json(&json!({"full_name": "Dave D", "password": "new"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["full_name"], "Dave D");
    assert!(body.get("password_hash").is_none());
    server.login("dave@example.com", "new").await;
}

#[tokio::test]
async fn test_duplicate_registration_is_conflict() {
    let server = TestServer::spawn().await;
    server.register("dup@example.com", "pw").await;

    let res = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({"email": "dup@example.com", "password": "pw"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(error_code(res).await, "conflict");
}

#[tokio::test]
async fn test_user_cannot_delete_self_but_admin_can() {
    let server = TestServer::spawn().await;
    let erin = server.register("erin@example.com", "pw").await;
    let erin_token = server.login("erin@example.com", "pw").await;
    let admin_token = server.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let by_self = server
        .client
        .delete(server.url(&format!("/api/users/{erin}")))
        .bearer_auth(&erin_token)
        .send()
        .await
        .unwrap();
    let by_admin = server
        .client
        .delete(server.url(&format!("/api/users/{erin}")))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();

    assert_eq!(by_self.status(), StatusCode::FORBIDDEN);
    assert_eq!(by_admin.status(), StatusCode::OK);
    let body: Value = by_admin.json().await.unwrap();
    assert_eq!(body, json!({"status": "deleted"}));
}

#[tokio::test]
async fn test_accounts_survive_restart_on_sqlite() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("user.db");
    let first = SqliteStore::open(&path).await.unwrap();
    let server = TestServer::spawn_with(Arc::new(first.clone())).await;
    let frank = server.register("frank@example.com", "pw").await;
    drop(server);
    first.close().await;

    // Act
    let restarted = TestServer::spawn_with(Arc::new(SqliteStore::open(&path).await.unwrap())).await;
    let token = restarted.login("frank@example.com", "pw").await;

    // Assert
    let res = restarted.get(&format!("/api/users/{frank}"), &token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["roles"], json!(["user"]));
    // The bootstrap admin was found, not duplicated.
    let admin_token = restarted.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let users: Value = restarted.get("/api/users", &admin_token).await.json().await.unwrap();
    assert_eq!(users.as_array().unwrap().len(), 2);
}
