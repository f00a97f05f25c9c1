//! Session cart over the HTMX endpoints.

use axum::{Json, Router, http::StatusCode, routing::get};

use phuphiem_integration_tests::{TestClient, sample_product, spawn_server, test_app, test_config};

async fn client() -> TestClient {
    let backend = Router::new().route("/products/1", get(|| async { Json(sample_product()) }));
    let backend_url = spawn_server(backend).await;
    TestClient::new(test_app(test_config(&backend_url, None)))
}

#[tokio::test]
async fn test_add_to_cart_updates_badge_and_page() {
    let mut client = client().await;

    let added = client
        .post_form("/cart/add", "product_id=1&variant_id=11&quantity=2")
        .await;
    assert_eq!(added.status, StatusCode::OK);
    assert_eq!(added.header("hx-trigger"), Some("cart-updated"));
    assert!(added.body.contains(">2<"));
    assert!(client.has_session());

    let count = client.get("/cart/count").await;
    assert!(count.body.contains(">2<"));

    let page = client.get("/cart").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Móc khóa len"));
    assert!(page.body.contains("90.000 ₫"));
}

#[tokio::test]
async fn test_adding_same_variant_merges_lines() {
    let mut client = client().await;

    client.post_form("/cart/add", "product_id=1&variant_id=11").await;
    let second = client
        .post_form("/cart/add", "product_id=1&variant_id=11&quantity=3")
        .await;
    assert!(second.body.contains(">4<"));

    let page = client.get("/cart").await;
    assert_eq!(page.body.matches("name=\"note\"").count(), 1);
    assert!(page.body.contains("180.000 ₫"));
}

#[tokio::test]
async fn test_update_quantity_and_remove() {
    let mut client = client().await;
    client
        .post_form("/cart/add", "product_id=1&variant_id=11&quantity=2")
        .await;

    let updated = client
        .post_form("/cart/update", "line_id=1-11&quantity=5")
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.header("hx-trigger"), Some("cart-updated"));
    assert!(updated.body.contains("225.000 ₫"));

    let removed = client.post_form("/cart/remove", "line_id=1-11").await;
    assert!(removed.body.contains("Giỏ hàng của bạn đang trống"));
    assert!(client.get("/cart/count").await.body.trim().is_empty());
}

#[tokio::test]
async fn test_editing_unknown_line_does_not_trigger_refresh() {
    let mut client = client().await;
    client.post_form("/cart/add", "product_id=1&variant_id=11").await;

    let response = client
        .post_form("/cart/update", "line_id=9-99&quantity=3")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("hx-trigger"), None);
}

#[tokio::test]
async fn test_line_note_is_kept() {
    let mut client = client().await;
    client.post_form("/cart/add", "product_id=1&variant_id=11").await;

    let response = client
        .post_form("/cart/note", "line_id=1-11&note=M%C3%A0u+h%E1%BB%93ng")
        .await;
    assert!(response.body.contains("Màu hồng"));
}

#[tokio::test]
async fn test_clear_cart() {
    let mut client = client().await;
    client
        .post_form("/cart/add", "product_id=1&variant_id=11&quantity=2")
        .await;

    let cleared = client.post_form("/cart/clear", "").await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert!(cleared.body.contains("Giỏ hàng của bạn đang trống"));

    let page = client.get("/cart").await;
    assert!(page.body.contains("Giỏ hàng của bạn đang trống"));
}

#[tokio::test]
async fn test_unknown_product_is_rejected() {
    let mut client = client().await;

    let response = client
        .post_form("/cart/add", "product_id=2&variant_id=21")
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.contains("Sản phẩm không tồn tại"));
}

#[tokio::test]
async fn test_zero_quantity_is_rejected() {
    let mut client = client().await;

    let response = client
        .post_form("/cart/add", "product_id=1&variant_id=11&quantity=0")
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_anonymous_checkout_redirects_to_login() {
    let mut client = client().await;
    let response = client.get("/checkout").await;

    assert!(response.status.is_redirection());
    assert!(response.location().is_some_and(|l| l.starts_with("/auth/login")));
}
