//! Client for the shop backend REST API.
//!
//! # Architecture
//!
//! - The backend is the source of truth for products, users, carts and
//!   orders. Nothing is persisted locally apart from the session.
//! - Catalog and location reads are cached in `moka` (5 minute TTL).
//! - Calls made for a logged-in customer carry their bearer token.
//!
//! # Example
//!
//! ```rust,ignore
//! use phuphiem_storefront::backend::BackendClient;
//!
//! let client = BackendClient::new(&config.backend)?;
//! let page = client.products(1, None).await?;
//! let product = client.product(page.items[0].id).await?;
//! ```

mod cache;
mod client;
pub mod conversions;
pub mod types;

pub use client::{BackendClient, LoginSession};
pub use conversions::{Product, ProductPage, Variant, cart_line_from_backend};
pub use types::*;

use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the request with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The bearer token is missing, invalid or expired.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A login response carried no bearer token.
    #[error("Login response carried no access token")]
    MissingToken,

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl BackendError {
    /// Message safe to show to customers: the backend's own message for
    /// rejected requests, `fallback` for everything else.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Api { message, .. } | Self::Unauthorized(message) if !message.is_empty() => {
                message.clone()
            }
            _ => fallback.to_string(),
        }
    }

    /// Whether the customer has to log in again.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}
