#![allow(dead_code)]

use axum::body::Body;
use http::{Method, Request};
use roomcast::config::GatewaySettings;
use roomcast::db;
use roomcast::models::user::{CreateUser, User};
use roomcast::routes;
use roomcast::state::AppState;
use sqlx::SqlitePool;
use uuid::Uuid;

/// A user created for testing, bundling the User record with its raw token.
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    /// Returns the Authorization header value.
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Test server that owns an in-memory SQLite pool and full AppState.
/// Each instance is isolated, so tests can run in parallel.
pub struct TestServer {
    pub state: AppState,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_settings(GatewaySettings::default()).await
    }

    pub async fn with_settings(settings: GatewaySettings) -> Self {
        let pool = db::create_pool("sqlite::memory:")
            .await
            .expect("failed to create test pool");

        Self {
            state: AppState::new(pool, settings),
        }
    }

    /// Returns an Axum Router wired to this server's state for `oneshot()` calls.
    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.state.db
    }

    /// Binds a TCP listener on port 0, spawns the server, and returns the address.
    pub async fn spawn(&self) -> String {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("127.0.0.1:{}", addr.port())
    }

    /// Create a user and issue a bearer token for them.
    pub async fn create_user_with_token(&self, email: &str) -> TestUser {
        let user = db::users::create_user(
            self.pool(),
            &CreateUser {
                email: email.to_string(),
            },
        )
        .await
        .expect("failed to create test user");

        let token = db::users::issue_token(self.pool(), user.id, 3600)
            .await
            .expect("failed to issue test token");

        TestUser { user, token }
    }

    /// Issue another token for an existing user. A negative TTL yields one that
    /// has already expired.
    pub async fn issue_token(&self, user: &TestUser, ttl_secs: i64) -> String {
        db::users::issue_token(self.pool(), user.user.id, ttl_secs)
            .await
            .expect("failed to issue test token")
    }

    /// Create a chat with the given members. Returns the chat ID.
    pub async fn create_chat(&self, members: &[&TestUser]) -> Uuid {
        let ids: Vec<i64> = members.iter().map(|m| m.user.id).collect();
        db::chats::create_chat(self.pool(), &ids)
            .await
            .expect("failed to create test chat")
    }
}

// ---------------------------------------------------------------------------
// Request builder helpers
// ---------------------------------------------------------------------------

/// Build an authenticated request with no body.
pub fn authenticated_request(method: Method, uri: &str, auth_header: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", auth_header)
        .body(Body::empty())
        .unwrap()
}

/// Build an authenticated request with a JSON body.
pub fn authenticated_json_request(
    method: Method,
    uri: &str,
    auth_header: &str,
    body: &serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", auth_header)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Parse a response body into a `serde_json::Value`.
pub async fn parse_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn test_app() -> axum::Router {
    let server = TestServer::new().await;
    routes::router(server.state)
}
