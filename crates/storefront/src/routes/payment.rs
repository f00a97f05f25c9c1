//! VNPay return handling and payment result pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, RawQuery},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use phuphiem_core::Price;

use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::services::cart_sync;
use crate::services::vnpay::{DEFAULT_FAILURE_MESSAGE, PaymentOutcome, PaymentReturn};

/// Seconds the failure interstitial stays up before moving on.
pub const FAILURE_REFRESH_SECONDS: u32 = 3;

/// Interstitial shown while a failed payment is forwarded to its result page.
#[derive(Template, WebTemplate)]
#[template(path = "payment/return.html")]
pub struct PaymentReturnTemplate {
    pub message: String,
    pub redirect_url: String,
    pub refresh_seconds: u32,
}

/// Payment success page template.
#[derive(Template, WebTemplate)]
#[template(path = "payment/success.html")]
pub struct PaymentSuccessTemplate {
    pub order_id: Option<String>,
    pub amount: Option<Price>,
}

/// Payment failure page template.
#[derive(Template, WebTemplate)]
#[template(path = "payment/failure.html")]
pub struct PaymentFailureTemplate {
    pub order_id: Option<String>,
    pub message: String,
}

/// Query of the result pages.
#[derive(Debug, Default, Deserialize)]
pub struct ResultQuery {
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
    pub amount: Option<String>,
    pub error: Option<String>,
}

impl ResultQuery {
    fn order_id(&self) -> Option<String> {
        self.order_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

/// `GET /ReturnUrl`: the gateway's configured return path.
///
/// Forwards to `/returnurl` with the query untouched (307).
pub async fn legacy_return(RawQuery(query): RawQuery) -> Redirect {
    match query.filter(|q| !q.is_empty()) {
        Some(query) => Redirect::temporary(&format!("/returnurl?{query}")),
        None => Redirect::temporary("/returnurl"),
    }
}

/// `GET /returnurl` and `GET /order-result`.
///
/// Success empties the cart and goes straight to the success page; failure
/// shows the reason before moving on to the failure page.
#[instrument(skip(session))]
pub async fn vnpay_return(
    session: Session,
    Query(payment): Query<PaymentReturn>,
) -> Result<Response, AppError> {
    let outcome = payment.outcome();
    let redirect_url = outcome.redirect_url();

    match outcome {
        PaymentOutcome::Success { order_id, .. } => {
            cart_sync::clear_cart(&session).await?;
            tracing::info!(order_id = %order_id, "Payment succeeded");
            add_breadcrumb(
                "payment",
                "VNPay payment succeeded",
                Some(&[("order_id", order_id.as_str())]),
            );
            Ok(Redirect::to(&redirect_url).into_response())
        }
        PaymentOutcome::Failure { order_id, message } => {
            tracing::warn!(
                order_id = %order_id,
                response_code = payment.response_code.as_deref().unwrap_or(""),
                "Payment failed"
            );
            Ok(PaymentReturnTemplate {
                message,
                redirect_url,
                refresh_seconds: FAILURE_REFRESH_SECONDS,
            }
            .into_response())
        }
    }
}

/// Payment success page.
pub async fn success(Query(query): Query<ResultQuery>) -> impl IntoResponse {
    let amount = query
        .amount
        .as_deref()
        .map(Price::parse_or_zero)
        .filter(|amount| *amount > Price::ZERO);

    PaymentSuccessTemplate {
        order_id: query.order_id(),
        amount,
    }
}

/// Payment failure page.
pub async fn failure(Query(query): Query<ResultQuery>) -> impl IntoResponse {
    let message = query
        .error
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
        .to_string();

    PaymentFailureTemplate {
        order_id: query.order_id(),
        message,
    }
}
