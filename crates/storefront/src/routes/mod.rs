//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//! GET  /about                  - About page
//! GET  /contact                - Contact form
//! POST /contact                - Send contact message
//!
//! # Products
//! GET  /products               - Product listing (?page, ?search, ?category)
//! GET  /products/{id}          - Product detail
//!
//! # Cart (HTMX fragments)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (returns count badge, triggers cart-updated)
//! POST /cart/update            - Update quantity (returns cart_items fragment)
//! POST /cart/note              - Update line note (returns cart_items fragment)
//! POST /cart/remove            - Remove line (returns cart_items fragment)
//! POST /cart/clear             - Empty the cart (returns cart_items fragment)
//! GET  /cart/count             - Cart count badge (fragment)
//!
//! # Checkout & payment
//! GET  /checkout               - Confirmation page (requires auth)
//! POST /checkout               - Create order, redirect to VNPay (requires auth)
//! GET  /ReturnUrl              - Gateway return path, forwards to /returnurl
//! GET  /returnurl              - Handle VNPay return
//! GET  /order-result           - Handle VNPay return
//! GET  /payment/success        - Payment success page
//! GET  /payment/failure        - Payment failure page
//!
//! # Auth
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action
//! GET  /auth/callback          - OAuth token callback
//! POST /auth/logout            - Logout action
//! GET  /auth/menu              - Header user menu (fragment)
//!
//! # Account (requires auth)
//! GET  /account/profile                 - Profile and addresses
//! POST /account/profile/active          - Choose the active address
//! GET  /account/addresses/new           - New address form
//! POST /account/addresses               - Create address
//! GET  /account/addresses/{id}/edit     - Edit address form
//! POST /account/addresses/{id}          - Update address
//! GET  /account/orders                  - Order history
//! GET  /account/locations/districts     - District options (fragment)
//! GET  /account/locations/wards         - Ward options (fragment)
//!
//! # B2 API
//! GET  /api/b2/token           - Download token for product images
//! GET  /api/b2/image           - Signed URL for one file (?fileName)
//! ```

pub mod account;
pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod contact;
pub mod home;
pub mod pages;
pub mod payment;
pub mod products;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
///
/// Login and registration are rate limited per client IP.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/callback", get(auth::callback))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(limited)
        .route("/logout", post(auth::logout))
        .route("/menu", get(auth::menu))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
///
/// Mutations are rate limited; the page and the badge are not.
pub fn cart_routes() -> Router<AppState> {
    let mutations = Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/note", post(cart::update_note))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .layer(api_rate_limiter());

    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .merge(mutations)
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/account/profile") }))
        .route("/profile", get(account::profile))
        .route("/profile/active", post(account::set_active_address))
        .route("/addresses", post(account::create_address))
        .route("/addresses/new", get(account::new_address))
        .route("/addresses/{id}", post(account::update_address))
        .route("/addresses/{id}/edit", get(account::edit_address))
        .route("/orders", get(account::orders))
        .route("/locations/districts", get(account::district_options))
        .route("/locations/wards", get(account::ward_options))
}

/// Create the payment return routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/ReturnUrl", get(payment::legacy_return))
        .route("/returnurl", get(payment::vnpay_return))
        .route("/order-result", get(payment::vnpay_return))
        .route("/payment/success", get(payment::success))
        .route("/payment/failure", get(payment::failure))
}

/// Create the B2 API routes router.
pub fn b2_api_routes() -> Router<AppState> {
    Router::new()
        .route("/token", get(api::b2::token))
        .route("/image", get(api::b2::image_url))
        .layer(api_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Pages
        .route("/", get(home::home))
        .route("/about", get(pages::about))
        .route("/contact", get(contact::show).post(contact::submit))
        // Product routes
        .nest("/products", product_routes())
        // Cart routes
        .nest("/cart", cart_routes())
        // Checkout
        .route("/checkout", get(checkout::show).post(checkout::confirm))
        // VNPay return and result pages
        .merge(payment_routes())
        // Account routes
        .nest("/account", account_routes())
        // Auth routes
        .nest("/auth", auth_routes())
        // B2 API
        .nest("/api/b2", b2_api_routes())
        .fallback(pages::not_found)
}
