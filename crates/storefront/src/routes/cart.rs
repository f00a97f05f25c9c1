//! Cart route handlers.
//!
//! The cart lives in the session. Logged-in customers also have a backend
//! cart: the page load reconciles both, and additions are mirrored as they
//! happen. Line edits (quantity, note, removal) only touch the session cart.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{AppendHeaders, Html, IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use phuphiem_core::{Cart, CartLine, LineId, NewCartLine, Price, ProductId, VariantId};

use crate::b2::ImageResolver;
use crate::backend::BackendError;
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::services::cart_sync;
use crate::state::AppState;

/// HTMX event fired whenever the cart changes.
pub const CART_UPDATED_TRIGGER: (&str, &str) = ("HX-Trigger", "cart-updated");

// =============================================================================
// View Types
// =============================================================================

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub id: String,
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: String,
    pub size: Option<String>,
    pub price: Price,
    pub quantity: u32,
    pub note: String,
    pub line_total: Price,
    pub is_color_mixing_available: bool,
}

impl CartItemView {
    fn new(line: &CartLine, images: &ImageResolver) -> Self {
        Self {
            id: line.id.to_string(),
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            image_url: images.url(&line.image),
            size: line.size.clone(),
            price: line.price,
            quantity: line.quantity,
            note: line.note.clone().unwrap_or_default(),
            line_total: line.line_total(),
            is_color_mixing_available: line.is_color_mixing_available.unwrap_or(false),
        }
    }

    /// Quantity after pressing the minus button (never below one).
    #[must_use]
    pub fn decremented(&self) -> u32 {
        self.quantity.saturating_sub(1).max(1)
    }

    /// Quantity after pressing the plus button.
    #[must_use]
    pub fn incremented(&self) -> u32 {
        self.quantity.saturating_add(1)
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total_quantity: u32,
    pub total_amount: Price,
}

impl CartView {
    #[must_use]
    pub fn new(cart: &Cart, images: &ImageResolver) -> Self {
        Self {
            items: cart
                .lines()
                .iter()
                .map(|line| CartItemView::new(line, images))
                .collect(),
            total_quantity: cart.total_quantity(),
            total_amount: cart.total_amount(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: Option<u32>,
    pub note: Option<String>,
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityForm {
    pub line_id: String,
    pub quantity: u32,
}

/// Update note form data.
#[derive(Debug, Deserialize)]
pub struct UpdateNoteForm {
    pub line_id: String,
    #[serde(default)]
    pub note: String,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub line_id: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
///
/// For a logged-in customer the session cart is reconciled with the backend
/// cart first.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<CartShowTemplate, AppError> {
    let cart = match user {
        Some(user) => {
            cart_sync::synchronize(state.backend(), &session, &user.access_token).await?
        }
        None => cart_sync::load_cart(&session).await?,
    };

    let images = state.b2().image_resolver().await;
    Ok(CartShowTemplate {
        cart: CartView::new(&cart, &images),
    })
}

/// Add item to cart (HTMX).
///
/// Product data is read from the backend so the cart never trusts prices
/// posted by the browser. Returns the count badge and triggers
/// `cart-updated`.
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<AddToCartForm>,
) -> Result<Response, AppError> {
    let quantity = form.quantity.unwrap_or(1);
    if quantity == 0 {
        return Ok(error_fragment(StatusCode::BAD_REQUEST, "Số lượng không hợp lệ"));
    }

    let product = match state.backend().product(form.product_id).await {
        Ok(product) => product,
        Err(BackendError::NotFound(_)) => {
            return Ok(error_fragment(
                StatusCode::NOT_FOUND,
                "Sản phẩm không tồn tại",
            ));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load product for cart");
            return Ok(error_fragment(
                StatusCode::BAD_GATEWAY,
                "Không thể thêm vào giỏ hàng",
            ));
        }
    };

    let variant = match form.variant_id {
        Some(id) => product.variant(id),
        None => product.variants.first(),
    };
    let Some(variant) = variant else {
        return Ok(error_fragment(StatusCode::BAD_REQUEST, "Sản phẩm đã hết hàng"));
    };

    let item = NewCartLine {
        product_id: product.id,
        product_name: product.name.clone(),
        image: product.image.clone(),
        variant_id: Some(variant.id),
        size: Some(variant.size.clone()),
        price: variant.price,
        note: form.note,
        is_color_mixing_available: Some(product.is_color_mixing_available),
    };
    let variant_id = variant.id;

    let mut cart = cart_sync::load_cart(&session).await?;
    let Some(line_id) = cart.add(item, quantity) else {
        return Ok(error_fragment(StatusCode::BAD_REQUEST, "Số lượng không hợp lệ"));
    };
    cart_sync::save_cart(&session, &cart).await?;

    if let Some(user) = user {
        cart_sync::push_added(
            state.backend(),
            &session,
            &user.access_token,
            &line_id,
            variant_id,
            quantity,
        )
        .await?;
    }

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("line_id", line_id.as_str())]),
    );

    Ok((
        AppendHeaders([CART_UPDATED_TRIGGER]),
        CartCountTemplate {
            count: cart.total_quantity(),
        },
    )
        .into_response())
}

/// Update cart line quantity (HTMX).
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateQuantityForm>,
) -> Result<Response, AppError> {
    let line_id = LineId::from_raw(form.line_id);
    edit_cart(&state, &session, |cart| {
        cart.update_quantity(&line_id, form.quantity)
    })
    .await
}

/// Update cart line note (HTMX).
#[instrument(skip(state, session))]
pub async fn update_note(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateNoteForm>,
) -> Result<Response, AppError> {
    let line_id = LineId::from_raw(form.line_id);
    edit_cart(&state, &session, |cart| cart.update_note(&line_id, &form.note)).await
}

/// Remove item from cart (HTMX).
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response, AppError> {
    let line_id = LineId::from_raw(form.line_id);
    edit_cart(&state, &session, |cart| cart.remove(&line_id)).await
}

/// Empty the cart (HTMX).
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    edit_cart(&state, &session, |cart| {
        let had_lines = !cart.is_empty();
        cart.clear();
        had_lines
    })
    .await
}

/// Get cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> Result<CartCountTemplate, AppError> {
    let cart = cart_sync::load_cart(&session).await?;
    Ok(CartCountTemplate {
        count: cart.total_quantity(),
    })
}

// =============================================================================
// Helpers
// =============================================================================

/// Apply an edit to the session cart and render the items fragment.
///
/// `cart-updated` is only triggered when the edit changed something.
async fn edit_cart(
    state: &AppState,
    session: &Session,
    edit: impl FnOnce(&mut Cart) -> bool,
) -> Result<Response, AppError> {
    let mut cart = cart_sync::load_cart(session).await?;
    let changed = edit(&mut cart);
    if changed {
        cart_sync::save_cart(session, &cart).await?;
    }

    let images = state.b2().image_resolver().await;
    let fragment = CartItemsTemplate {
        cart: CartView::new(&cart, &images),
    };

    if changed {
        Ok((AppendHeaders([CART_UPDATED_TRIGGER]), fragment).into_response())
    } else {
        Ok(fragment.into_response())
    }
}

fn error_fragment(status: StatusCode, message: &str) -> Response {
    (
        status,
        Html(format!("<span class=\"cart-error\">{message}</span>")),
    )
        .into_response()
}
