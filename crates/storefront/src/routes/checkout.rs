//! Checkout route handlers.
//!
//! The confirmation page shows the customer, the active shipping address
//! and the cart. Confirming creates the order on the backend and hands the
//! customer over to VNPay.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use phuphiem_core::Cart;

use crate::backend::{UserProfile, VariantQuantity, VnpayCreateRequest};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::routes::auth::expire_session;
use crate::routes::cart::CartView;
use crate::services::cart_sync;
use crate::state::AppState;

const PROFILE_LOAD_ERROR: &str = "Không thể tải thông tin tài khoản. Vui lòng thử lại sau.";
const PAYMENT_ERROR: &str = "Không thể tạo thanh toán. Vui lòng thử lại sau.";
const MISSING_ADDRESS: &str =
    "Bạn chưa có địa chỉ giao hàng. Vui lòng cập nhật địa chỉ trong trang cá nhân.";
const MISSING_VARIANT: &str =
    "Một số sản phẩm trong giỏ hàng không còn hợp lệ. Vui lòng xóa và thêm lại.";

/// Customer block of the confirmation page.
#[derive(Clone)]
pub struct CustomerView {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub address: Option<String>,
}

impl CustomerView {
    fn new(profile: &UserProfile) -> Self {
        let active = profile.active_detail();
        Self {
            full_name: profile.full_name.clone(),
            email: profile.email.clone(),
            phone_number: active
                .and_then(|d| d.phone_number.clone())
                .unwrap_or_default(),
            address: active
                .map(|d| d.full_address())
                .filter(|a| !a.is_empty()),
        }
    }
}

/// Checkout confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub customer: Option<CustomerView>,
    pub cart: CartView,
    pub error: Option<String>,
}

impl CheckoutTemplate {
    /// Whether the confirm button is enabled.
    #[must_use]
    pub fn can_pay(&self) -> bool {
        !self.cart.is_empty()
            && self
                .customer
                .as_ref()
                .is_some_and(|c| c.address.is_some())
    }
}

/// Order note built from the per-line notes.
///
/// Each entry is `"<product> (<size>): <note>"`, or `"<product>: <note>"`
/// for lines without a size; entries are joined with `"; "`.
#[must_use]
pub fn order_note(cart: &Cart) -> Option<String> {
    let entries: Vec<String> = cart
        .lines()
        .iter()
        .filter_map(|line| {
            let note = line.note.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
            Some(match line.size.as_deref().filter(|s| !s.is_empty()) {
                Some(size) => format!("{} ({size}): {note}", line.product_name),
                None => format!("{}: {note}", line.product_name),
            })
        })
        .collect();

    (!entries.is_empty()).then(|| entries.join("; "))
}

/// VNPay request for the whole cart.
///
/// Fails when a line has no variant, since the backend orders variants.
pub fn payment_request(cart: &Cart) -> Result<VnpayCreateRequest, &'static str> {
    let product_variants = cart
        .lines()
        .iter()
        .map(|line| {
            line.variant_id
                .map(|variant_id| VariantQuantity {
                    variant_id,
                    quantity: line.quantity,
                })
                .ok_or(MISSING_VARIANT)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(VnpayCreateRequest {
        bank_code: String::new(),
        locale: "vn".to_string(),
        product_variants,
        note: order_note(cart),
    })
}

/// Display the checkout confirmation.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Response, AppError> {
    let cart = cart_sync::load_cart(&session).await?;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let images = state.b2().image_resolver().await;
    let cart = CartView::new(&cart, &images);

    let (customer, error) = match state.backend().current_user(&user.access_token).await {
        Ok(profile) => {
            let customer = CustomerView::new(&profile);
            let error = customer.address.is_none().then(|| MISSING_ADDRESS.to_string());
            (Some(customer), error)
        }
        Err(e) if e.is_unauthorized() => return Ok(expire_session(&session).await),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load profile for checkout");
            (None, Some(e.user_message(PROFILE_LOAD_ERROR)))
        }
    };

    Ok(CheckoutTemplate {
        customer,
        cart,
        error,
    }
    .into_response())
}

/// Create the order and redirect to VNPay.
#[instrument(skip(state, session, user))]
pub async fn confirm(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Response, AppError> {
    let cart = cart_sync::load_cart(&session).await?;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let images = state.b2().image_resolver().await;
    let view = CartView::new(&cart, &images);

    let profile = match state.backend().current_user(&user.access_token).await {
        Ok(profile) => profile,
        Err(e) if e.is_unauthorized() => return Ok(expire_session(&session).await),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load profile for checkout");
            return Ok(rejected(None, view, e.user_message(PROFILE_LOAD_ERROR)));
        }
    };
    let customer = CustomerView::new(&profile);
    if customer.address.is_none() {
        return Ok(rejected(Some(customer), view, MISSING_ADDRESS.to_string()));
    }

    let payload = match payment_request(&cart) {
        Ok(payload) => payload,
        Err(message) => return Ok(rejected(Some(customer), view, message.to_string())),
    };

    match state
        .backend()
        .create_vnpay_payment(&user.access_token, &payload)
        .await
    {
        Ok(created) => match created.payment_url.filter(|url| !url.is_empty()) {
            Some(url) => {
                let order_id = created.order_id.unwrap_or_default();
                tracing::info!(order_id = %order_id, "Redirecting to VNPay");
                add_breadcrumb(
                    "checkout",
                    "Payment created",
                    Some(&[("order_id", order_id.as_str())]),
                );
                Ok(Redirect::to(&url).into_response())
            }
            None => {
                tracing::error!("VNPay response carried no payment URL");
                Ok(rejected(Some(customer), view, PAYMENT_ERROR.to_string()))
            }
        },
        Err(e) if e.is_unauthorized() => Ok(expire_session(&session).await),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create VNPay payment");
            Ok(rejected(Some(customer), view, e.user_message(PAYMENT_ERROR)))
        }
    }
}

fn rejected(customer: Option<CustomerView>, cart: CartView, message: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutTemplate {
            customer,
            cart,
            error: Some(message),
        },
    )
        .into_response()
}
