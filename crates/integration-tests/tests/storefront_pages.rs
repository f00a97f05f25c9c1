//! Static pages, health checks and response headers.

use axum::{Json, Router, http::StatusCode, routing::get};
use serde_json::json;

use phuphiem_integration_tests::{
    TestClient, UNREACHABLE, sample_product, spawn_server, test_app, test_config,
};

fn client() -> TestClient {
    TestClient::new(test_app(test_config(UNREACHABLE, None)))
}

#[tokio::test]
async fn test_health_check() {
    let mut client = client();
    let response = client.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "ok");
}

#[tokio::test]
async fn test_about_page_renders() {
    let mut client = client();
    let response = client.get("/about").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("<html"));
    assert!(response.body.contains("/static/css/main.css"));
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let mut client = client();
    let response = client.get("/khong-ton-tai").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.contains("404"));
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let mut client = client();
    let response = client.get("/about").await;

    assert_eq!(response.header("x-frame-options"), Some("DENY"));
    assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
    assert!(
        response
            .header("content-security-policy")
            .is_some_and(|csp| csp.contains("https://unpkg.com"))
    );
    assert!(response.header("x-request-id").is_some());
}

#[tokio::test]
async fn test_static_assets_are_served() {
    let mut client = client();
    let response = client.get("/static/css/main.css").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains(".badge"));
}

#[tokio::test]
async fn test_product_listing_and_detail() {
    let backend = Router::new()
        .route(
            "/products",
            get(|| async {
                Json(json!({ "data": [sample_product()], "total": 1, "page": 1 }))
            }),
        )
        .route("/products/1", get(|| async { Json(sample_product()) }));
    let backend_url = spawn_server(backend).await;
    let mut client = TestClient::new(test_app(test_config(&backend_url, None)));

    let listing = client.get("/products").await;
    assert_eq!(listing.status, StatusCode::OK);
    assert!(listing.body.contains("Móc khóa len"));
    assert!(listing.body.contains("Phụ kiện"));
    assert!(listing.body.contains("45.000 ₫"));

    let detail = client.get("/products/1").await;
    assert_eq!(detail.status, StatusCode::OK);
    assert!(detail.body.contains("Móc khóa đan tay"));
    assert!(detail.body.contains("/static/img/placeholder.svg"));

    let missing = client.get("/products/abc").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_listing_shows_error_when_backend_is_down() {
    let mut client = client();
    let response = client.get("/products").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Không thể tải sản phẩm"));
}
