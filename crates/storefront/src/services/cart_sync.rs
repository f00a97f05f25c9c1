//! Session cart storage and synchronization with the backend cart.
//!
//! The cart and the synced-quantity map are stored in the session. When a
//! logged-in customer's cart is loaded, it is reconciled with the backend
//! cart and any local additions the backend has not seen are pushed. Pushes
//! are best effort: a failure is logged and retried on the next sync.

use tower_sessions::Session;
use tracing::instrument;

use phuphiem_core::{Cart, LineId, SyncedQuantities, VariantId};

use crate::backend::{BackendClient, cart_line_from_backend};
use crate::models::session_keys;

type SessionResult<T> = Result<T, tower_sessions::session::Error>;

/// The cart stored in the session (empty when absent).
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_cart(session: &Session) -> SessionResult<Cart> {
    Ok(session
        .get::<Cart>(session_keys::CART)
        .await?
        .unwrap_or_default())
}

/// Store the cart.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_cart(session: &Session, cart: &Cart) -> SessionResult<()> {
    session.insert(session_keys::CART, cart).await
}

/// The synced-quantity map stored in the session (empty when absent).
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_synced(session: &Session) -> SessionResult<SyncedQuantities> {
    Ok(session
        .get::<SyncedQuantities>(session_keys::SYNCED_QUANTITIES)
        .await?
        .unwrap_or_default())
}

/// Store the synced-quantity map.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_synced(session: &Session, synced: &SyncedQuantities) -> SessionResult<()> {
    session.insert(session_keys::SYNCED_QUANTITIES, synced).await
}

/// Empty the cart and forget the synced quantities.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn clear_cart(session: &Session) -> SessionResult<()> {
    session.remove::<Cart>(session_keys::CART).await?;
    session
        .remove::<SyncedQuantities>(session_keys::SYNCED_QUANTITIES)
        .await?;
    Ok(())
}

/// Reconcile the session cart with the backend cart and push local deltas.
///
/// Backend failures leave the session cart untouched and are only logged.
///
/// # Errors
///
/// Returns an error if the session store fails.
#[instrument(skip_all)]
pub async fn synchronize(
    backend: &BackendClient,
    session: &Session,
    token: &str,
) -> SessionResult<Cart> {
    let local = load_cart(session).await?;

    let server_items = match backend.cart_items(token).await {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch server cart, keeping session cart");
            return Ok(local);
        }
    };

    let synced = load_synced(session).await?;
    let server_lines = server_items.into_iter().map(cart_line_from_backend);
    let mut result = local.reconcile(server_lines, &synced);

    for push in &result.pending {
        if let Err(e) = backend
            .add_cart_item(token, push.variant_id, push.quantity)
            .await
        {
            tracing::warn!(
                error = %e,
                line_id = %push.line_id,
                quantity = push.quantity,
                "Failed to push cart delta to backend"
            );
            result.synced.unrecord(&push.line_id, push.quantity);
        }
    }

    tracing::debug!(
        lines = result.cart.lines().len(),
        pushed = result.pending.len(),
        "Cart synchronized"
    );

    save_cart(session, &result.cart).await?;
    save_synced(session, &result.synced).await?;
    Ok(result.cart)
}

/// Mirror a `POST /cart/add` to the backend for a logged-in customer.
///
/// On success the synced map is bumped by `quantity`.
///
/// # Errors
///
/// Returns an error if the session store fails.
#[instrument(skip(backend, session, token))]
pub async fn push_added(
    backend: &BackendClient,
    session: &Session,
    token: &str,
    line_id: &LineId,
    variant_id: VariantId,
    quantity: u32,
) -> SessionResult<()> {
    match backend.add_cart_item(token, variant_id, quantity).await {
        Ok(()) => {
            let mut synced = load_synced(session).await?;
            synced.record_push(line_id, quantity);
            save_synced(session, &synced).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to add item to server cart");
            Ok(())
        }
    }
}
