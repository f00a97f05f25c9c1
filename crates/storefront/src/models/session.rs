//! Session-related types.
//!
//! Everything the storefront remembers about a visitor lives in the
//! server-side session: who they are (with the backend bearer token), their
//! cart, and how much of each cart line the backend already holds.

use serde::{Deserialize, Serialize};

use phuphiem_core::UserId;

use crate::backend::AuthUser;

/// Session-stored user identity.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Backend user id.
    pub id: UserId,
    /// Display name.
    pub full_name: String,
    /// Email address as the backend knows it.
    pub email: String,
    /// Backend role, if any.
    pub role: Option<String>,
    /// Bearer token for backend calls made on the user's behalf.
    pub access_token: String,
}

impl CurrentUser {
    /// Build the session identity from a backend user and token.
    #[must_use]
    pub fn new(user: AuthUser, access_token: String) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            role: user.role,
            access_token,
        }
    }

    /// Name for the header menu, falling back to the email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.email
        } else {
            &self.full_name
        }
    }
}

impl std::fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUser")
            .field("id", &self.id)
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the visitor's cart.
    pub const CART: &str = "cart";

    /// Key for the per-line quantities the backend is known to hold.
    pub const SYNCED_QUANTITIES: &str = "synced_quantities";
}
