//! Login, cart synchronization on login, logout and session expiry.

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};

use phuphiem_integration_tests::{TestClient, sample_product, spawn_server, test_app, test_config};

// =============================================================================
// Fake Backend
// =============================================================================

#[derive(Clone)]
struct FakeBackend {
    /// Bodies of every `POST /cart-items`.
    cart_pushes: Arc<Mutex<Vec<Value>>>,
    /// Whether `GET /users/me` accepts the token.
    profile_ok: bool,
}

fn user_json() -> Value {
    json!({ "id": 7, "fullName": "Lan Anh", "email": "lan@example.com", "role": "customer" })
}

async fn login(Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] == "dung-mat-khau" {
        (
            StatusCode::OK,
            Json(json!({ "accessToken": "token-7", "user": user_json() })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Email hoặc mật khẩu không đúng" })),
        )
    }
}

async fn me(State(fake): State<FakeBackend>, headers: HeaderMap) -> impl IntoResponse {
    let bearer = headers.get("authorization").and_then(|v| v.to_str().ok());
    if fake.profile_ok && bearer == Some("Bearer token-7") {
        let mut profile = user_json();
        profile["userDetails"] = json!([]);
        (StatusCode::OK, Json(profile))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized" })),
        )
    }
}

async fn cart_items() -> Json<Value> {
    Json(json!([]))
}

async fn add_cart_item(State(fake): State<FakeBackend>, Json(body): Json<Value>) -> Json<Value> {
    if let Ok(mut pushes) = fake.cart_pushes.lock() {
        pushes.push(body);
    }
    Json(json!({}))
}

async fn spawn_backend(profile_ok: bool) -> (String, FakeBackend) {
    let fake = FakeBackend {
        cart_pushes: Arc::new(Mutex::new(Vec::new())),
        profile_ok,
    };
    let router = Router::new()
        .route("/auth/login", post(login))
        .route("/users/me", get(me))
        .route("/cart-items", get(cart_items).post(add_cart_item))
        .route("/products/1", get(|| async { Json(sample_product()) }))
        .with_state(fake.clone());
    (spawn_server(router).await, fake)
}

fn pushes(fake: &FakeBackend) -> Vec<Value> {
    fake.cart_pushes
        .lock()
        .map(|pushes| pushes.clone())
        .unwrap_or_default()
}

const LOGIN_FORM: &str = "email=lan%40example.com&password=dung-mat-khau";

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_pushes_guest_cart() {
    let (backend_url, fake) = spawn_backend(true).await;
    let mut client = TestClient::new(test_app(test_config(&backend_url, None)));

    client
        .post_form("/cart/add", "product_id=1&variant_id=11&quantity=2")
        .await;
    assert!(pushes(&fake).is_empty());

    let response = client.post_form("/auth/login", LOGIN_FORM).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/"));

    assert_eq!(
        pushes(&fake),
        vec![json!({ "variantId": 11, "quantity": 2 })]
    );

    let menu = client.get("/auth/menu").await;
    assert!(menu.body.contains("Lan Anh"));
    assert!(menu.body.contains("/auth/logout"));

    // Already synced lines are not pushed again.
    client.get("/cart").await;
    assert_eq!(pushes(&fake).len(), 1);
}

#[tokio::test]
async fn test_logged_in_add_is_mirrored() {
    let (backend_url, fake) = spawn_backend(true).await;
    let mut client = TestClient::new(test_app(test_config(&backend_url, None)));

    client.post_form("/auth/login", LOGIN_FORM).await;
    client
        .post_form("/cart/add", "product_id=1&variant_id=11&quantity=3")
        .await;

    assert_eq!(
        pushes(&fake),
        vec![json!({ "variantId": 11, "quantity": 3 })]
    );
}

#[tokio::test]
async fn test_wrong_password_shows_backend_message() {
    let (backend_url, _fake) = spawn_backend(true).await;
    let mut client = TestClient::new(test_app(test_config(&backend_url, None)));

    let response = client
        .post_form("/auth/login", "email=lan%40example.com&password=sai")
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("Email hoặc mật khẩu không đúng"));
    assert!(response.body.contains("lan@example.com"));

    let menu = client.get("/auth/menu").await;
    assert!(menu.body.contains("Đăng nhập"));
}

#[tokio::test]
async fn test_invalid_email_is_rejected_locally() {
    let (backend_url, _fake) = spawn_backend(true).await;
    let mut client = TestClient::new(test_app(test_config(&backend_url, None)));

    let response = client
        .post_form("/auth/login", "email=khong-phai-email&password=x")
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_logout_forgets_user_and_cart() {
    let (backend_url, _fake) = spawn_backend(true).await;
    let mut client = TestClient::new(test_app(test_config(&backend_url, None)));

    client.post_form("/auth/login", LOGIN_FORM).await;
    client.post_form("/cart/add", "product_id=1&variant_id=11").await;

    let response = client.post_form("/auth/logout", "").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/"));

    let menu = client.get("/auth/menu").await;
    assert!(menu.body.contains("Đăng nhập"));
    assert!(!menu.body.contains("Lan Anh"));

    let count = client.get("/cart/count").await;
    assert!(count.body.trim().is_empty());
}

// =============================================================================
// Session Expiry
// =============================================================================

#[tokio::test]
async fn test_rejected_token_expires_session() {
    let (backend_url, _fake) = spawn_backend(false).await;
    let mut client = TestClient::new(test_app(test_config(&backend_url, None)));

    client.post_form("/auth/login", LOGIN_FORM).await;

    let response = client.get("/account/profile").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(
        response.location(),
        Some("/auth/login?error=session_expired")
    );

    let menu = client.get("/auth/menu").await;
    assert!(menu.body.contains("Đăng nhập"));

    let login_page = client.get("/auth/login?error=session_expired").await;
    assert_eq!(login_page.status, StatusCode::OK);
}

#[tokio::test]
async fn test_account_requires_login() {
    let (backend_url, _fake) = spawn_backend(true).await;
    let mut client = TestClient::new(test_app(test_config(&backend_url, None)));

    let response = client.get("/account/orders").await;
    assert!(response.status.is_redirection());
    assert!(response.location().is_some_and(|l| l.starts_with("/auth/login")));
}

#[tokio::test]
async fn test_checkout_with_empty_cart_goes_back_to_cart() {
    let (backend_url, _fake) = spawn_backend(true).await;
    let mut client = TestClient::new(test_app(test_config(&backend_url, None)));

    client.post_form("/auth/login", LOGIN_FORM).await;

    let response = client.get("/checkout").await;
    assert!(response.status.is_redirection());
    assert_eq!(response.location(), Some("/cart"));
}

// =============================================================================
// OAuth Callback
// =============================================================================

#[tokio::test]
async fn test_callback_fetches_profile_without_user() {
    let (backend_url, _fake) = spawn_backend(true).await;
    let mut client = TestClient::new(test_app(test_config(&backend_url, None)));

    let response = client.get("/auth/callback?token=token-7").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/"));

    let menu = client.get("/auth/menu").await;
    assert!(menu.body.contains("Lan Anh"));
}

#[tokio::test]
async fn test_callback_with_user_json() {
    let (backend_url, _fake) = spawn_backend(false).await;
    let mut client = TestClient::new(test_app(test_config(&backend_url, None)));

    let response = client
        .get(
            "/auth/callback?accessToken=token-7&user=%7B%22id%22%3A7%2C%22fullName%22%3A%22Lan%20Anh%22%2C%22email%22%3A%22lan%40example.com%22%7D",
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);

    let menu = client.get("/auth/menu").await;
    assert!(menu.body.contains("Lan Anh"));
}

#[tokio::test]
async fn test_callback_without_token_shows_error() {
    let (backend_url, _fake) = spawn_backend(true).await;
    let mut client = TestClient::new(test_app(test_config(&backend_url, None)));

    let response = client.get("/auth/callback").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Đăng nhập thất bại"));
    assert!(response.body.contains("url=/auth/login"));
}
