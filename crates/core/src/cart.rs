//! Shopping cart lines and bookkeeping.
//!
//! The cart lives in the visitor's session. Once they log in it is
//! reconciled with the cart the backend keeps for their account, using a
//! side map of "quantity the server is known to hold" per line so that a
//! line both sides already know about is never counted twice.
//!
//! # Invariants
//!
//! - At most one line per [`LineId`] (product + variant).
//! - Every line has `quantity >= 1`. Explicit updates below 1 clamp to 1;
//!   lines that would end up at zero any other way are dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId, VariantId};

/// Composite key of a cart line: `"{product_id}-{variant_id}"`, or
/// `"{product_id}-default"` for products sold without variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    /// Build the key for a product and optional variant.
    #[must_use]
    pub fn new(product_id: ProductId, variant_id: Option<VariantId>) -> Self {
        match variant_id {
            Some(variant) => Self(format!("{product_id}-{variant}")),
            None => Self(format!("{product_id}-default")),
        }
    }

    /// Wrap a key received from a form.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for LineId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The product data needed to put something in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartLine {
    pub product_id: ProductId,
    pub product_name: String,
    /// B2 file name of the first product image (empty when none).
    pub image: String,
    pub variant_id: Option<VariantId>,
    pub size: Option<String>,
    pub price: Price,
    pub note: Option<String>,
    pub is_color_mixing_available: Option<bool>,
}

/// One row of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: LineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub image: String,
    pub variant_id: Option<VariantId>,
    pub size: Option<String>,
    pub price: Price,
    pub quantity: u32,
    pub note: Option<String>,
    pub is_color_mixing_available: Option<bool>,
}

impl CartLine {
    /// Create a line for `item` with the given quantity.
    #[must_use]
    pub fn new(item: NewCartLine, quantity: u32) -> Self {
        Self {
            id: LineId::new(item.product_id, item.variant_id),
            product_id: item.product_id,
            product_name: item.product_name,
            image: item.image,
            variant_id: item.variant_id,
            size: item.size,
            price: item.price,
            quantity,
            note: normalize_note(item.note),
            is_color_mixing_available: item.is_color_mixing_available,
        }
    }

    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// The visitor's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from arbitrary lines, restoring the invariants.
    ///
    /// Lines sharing a [`LineId`] are folded into the first occurrence
    /// (quantities summed) and zero-quantity lines are dropped.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            match cart.position(&line.id) {
                Some(idx) => {
                    if let Some(existing) = cart.lines.get_mut(idx) {
                        existing.quantity = existing.quantity.saturating_add(line.quantity);
                    }
                }
                None => cart.lines.push(line),
            }
        }
        cart
    }

    fn position(&self, id: &LineId) -> Option<usize> {
        self.lines.iter().position(|line| &line.id == id)
    }

    /// All lines in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Look up a line.
    #[must_use]
    pub fn get(&self, id: &LineId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.id == id)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add `quantity` of an item, merging into an existing line for the same
    /// product and variant. Returns the id of the affected line, or `None`
    /// when `quantity` is zero.
    pub fn add(&mut self, item: NewCartLine, quantity: u32) -> Option<LineId> {
        if quantity == 0 {
            return None;
        }

        let id = LineId::new(item.product_id, item.variant_id);
        if let Some(idx) = self.position(&id)
            && let Some(existing) = self.lines.get_mut(idx)
        {
            existing.quantity = existing.quantity.saturating_add(quantity);
            return Some(id);
        }

        self.lines.push(CartLine::new(item, quantity));
        Some(id)
    }

    /// Remove a line. Returns whether it existed.
    pub fn remove(&mut self, id: &LineId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| &line.id != id);
        self.lines.len() != before
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Set the quantity of a line, clamping anything below 1 to 1.
    /// Returns whether the line exists.
    pub fn update_quantity(&mut self, id: &LineId, quantity: u32) -> bool {
        match self.lines.iter_mut().find(|line| &line.id == id) {
            Some(line) => {
                line.quantity = quantity.max(1);
                true
            }
            None => false,
        }
    }

    /// Set or clear (blank input) the note of a line. Returns whether the
    /// line exists.
    pub fn update_note(&mut self, id: &LineId, note: &str) -> bool {
        match self.lines.iter_mut().find(|line| &line.id == id) {
            Some(line) => {
                line.note = normalize_note(Some(note.to_string()));
                true
            }
            None => false,
        }
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |sum, line| sum.saturating_add(line.quantity))
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn total_amount(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Merge this (session) cart with the lines the backend holds.
    ///
    /// The local delta of a line is `local - synced`, where a line missing
    /// from this cart counts as 0. It is negative when the customer removed
    /// a line or lowered its quantity since the last sync.
    ///
    /// - Server cart empty: this cart is kept as is and every line counts as
    ///   synced at its current quantity. Positive deltas are reported as
    ///   pending so the caller can push them.
    /// - Otherwise each server line becomes `server + delta`, dropped when
    ///   that reaches 0. Local-only lines survive with a positive delta.
    ///   Server lines come first, then local-only lines in their current
    ///   order.
    ///
    /// The returned map records what the server holds once the pending
    /// pushes land. Lines reduced locally keep their server quantity there,
    /// so the reduction still applies at the next reconciliation.
    #[must_use]
    pub fn reconcile(
        &self,
        server_lines: impl IntoIterator<Item = CartLine>,
        synced: &SyncedQuantities,
    ) -> Reconciliation {
        let server = Self::from_lines(server_lines);

        if server.is_empty() {
            let pending = self
                .lines
                .iter()
                .filter_map(|line| {
                    PendingPush::for_delta(line, synced.delta(&line.id, line.quantity))
                })
                .collect();
            return Reconciliation {
                cart: self.clone(),
                synced: SyncedQuantities::from_cart(self),
                pending,
            };
        }

        let mut merged = Vec::with_capacity(server.lines.len() + self.lines.len());
        let mut held = SyncedQuantities::new();
        let mut pending = Vec::new();

        for server_line in &server.lines {
            let mut line = server_line.clone();
            let local = self.get(&line.id);
            let delta = synced.delta(&line.id, local.map_or(0, |l| l.quantity));
            line.quantity = apply_delta(server_line.quantity, delta);
            if let Some(local) = local {
                if line.note.is_none() {
                    line.note.clone_from(&local.note);
                }
                if line.is_color_mixing_available.is_none() {
                    line.is_color_mixing_available = local.is_color_mixing_available;
                }
            }

            held.record_push(&line.id, server_line.quantity);
            if let Some(push) = PendingPush::for_delta(&line, delta) {
                held.record_push(&line.id, push.quantity);
                pending.push(push);
            }
            merged.push(line);
        }

        for local in &self.lines {
            if server.get(&local.id).is_some() {
                continue;
            }
            let delta = synced.delta(&local.id, local.quantity);
            let mut line = local.clone();
            line.quantity = apply_delta(0, delta);
            if let Some(push) = PendingPush::for_delta(&line, delta) {
                held.record_push(&line.id, push.quantity);
                pending.push(push);
            }
            merged.push(line);
        }

        Reconciliation {
            cart: Self::from_lines(merged),
            synced: held,
            pending,
        }
    }
}

/// `base + delta`, floored at 0.
fn apply_delta(base: u32, delta: i64) -> u32 {
    u32::try_from((i64::from(base) + delta).max(0)).unwrap_or(u32::MAX)
}

/// Quantity of each line the server is known to hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncedQuantities(BTreeMap<LineId, u32>);

impl SyncedQuantities {
    /// An empty map: nothing known to be on the server.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record every line of `cart` at its current quantity.
    #[must_use]
    pub fn from_cart(cart: &Cart) -> Self {
        Self(
            cart.lines()
                .iter()
                .map(|line| (line.id.clone(), line.quantity))
                .collect(),
        )
    }

    /// Last synced quantity of a line (0 when unknown).
    #[must_use]
    pub fn get(&self, id: &LineId) -> u32 {
        self.0.get(id).copied().unwrap_or(0)
    }

    /// Record that the server now holds `quantity` more of a line.
    pub fn record_push(&mut self, id: &LineId, quantity: u32) {
        if quantity == 0 {
            return;
        }
        let entry = self.0.entry(id.clone()).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    /// Take back `quantity` of an earlier record after the server refused
    /// the push, so the next reconciliation sends it again.
    pub fn unrecord(&mut self, id: &LineId, quantity: u32) {
        if let Some(entry) = self.0.get_mut(id) {
            *entry = entry.saturating_sub(quantity);
            if *entry == 0 {
                self.0.remove(id);
            }
        }
    }

    fn delta(&self, id: &LineId, local: u32) -> i64 {
        i64::from(local) - i64::from(self.get(id))
    }
}

/// A quantity the backend has not been told about yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPush {
    pub line_id: LineId,
    pub variant_id: VariantId,
    pub quantity: u32,
}

impl PendingPush {
    fn for_delta(line: &CartLine, delta: i64) -> Option<Self> {
        let quantity = u32::try_from(delta).ok().filter(|q| *q > 0)?;
        line.variant_id.map(|variant_id| Self {
            line_id: line.id.clone(),
            variant_id,
            quantity,
        })
    }
}

/// Outcome of [`Cart::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The merged cart to store in the session.
    pub cart: Cart,
    /// The synced-quantity map to store alongside it.
    pub synced: SyncedQuantities,
    /// Local deltas to push to the backend.
    pub pending: Vec<PendingPush>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn item(product: i64, variant: i64, price: i64) -> NewCartLine {
        NewCartLine {
            product_id: ProductId::new(product),
            product_name: format!("Product {product}"),
            image: format!("{product}.png"),
            variant_id: Some(VariantId::new(variant)),
            size: Some("M".to_string()),
            price: Price::from_dong(price),
            note: None,
            is_color_mixing_available: None,
        }
    }

    fn line(product: i64, variant: i64, quantity: u32) -> CartLine {
        CartLine::new(item(product, variant, 100_000), quantity)
    }

    fn id(product: i64, variant: i64) -> LineId {
        LineId::new(ProductId::new(product), Some(VariantId::new(variant)))
    }

    #[test]
    fn test_line_id_format() {
        assert_eq!(id(3, 9).as_str(), "3-9");
        assert_eq!(LineId::new(ProductId::new(3), None).as_str(), "3-default");
    }

    #[test]
    fn test_add_merges_same_variant() {
        let mut cart = Cart::new();
        cart.add(item(1, 10, 50_000), 1);
        cart.add(item(1, 10, 50_000), 2);
        cart.add(item(1, 11, 60_000), 1);

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.get(&id(1, 10)).unwrap().quantity, 3);
        assert_eq!(cart.total_quantity(), 4);
        assert_eq!(cart.total_amount(), Price::from_dong(210_000));
    }

    #[test]
    fn test_add_zero_is_noop() {
        let mut cart = Cart::new();
        assert!(cart.add(item(1, 10, 50_000), 0).is_none());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_clamps_to_one() {
        let mut cart = Cart::new();
        cart.add(item(1, 10, 50_000), 3);

        assert!(cart.update_quantity(&id(1, 10), 0));
        assert_eq!(cart.get(&id(1, 10)).unwrap().quantity, 1);
        assert!(!cart.update_quantity(&id(9, 9), 5));
    }

    #[test]
    fn test_update_note_blank_clears() {
        let mut cart = Cart::new();
        cart.add(item(1, 10, 50_000), 1);

        cart.update_note(&id(1, 10), "  pastel please ");
        assert_eq!(cart.get(&id(1, 10)).unwrap().note.as_deref(), Some("pastel please"));

        cart.update_note(&id(1, 10), "   ");
        assert_eq!(cart.get(&id(1, 10)).unwrap().note, None);
    }

    #[test]
    fn test_removing_last_line_empties_cart() {
        let mut cart = Cart::new();
        cart.add(item(1, 10, 50_000), 1);

        assert!(cart.remove(&id(1, 10)));
        assert!(cart.is_empty());
        assert_eq!(cart.total_quantity(), 0);
        assert_eq!(cart.total_amount(), Price::ZERO);
        assert!(!cart.remove(&id(1, 10)));
    }

    #[test]
    fn test_from_lines_dedupes_and_prunes() {
        let cart = Cart::from_lines([line(1, 10, 2), line(2, 20, 0), line(1, 10, 1)]);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
    }

    #[test]
    fn test_serde_roundtrip_keeps_lines() {
        let mut cart = Cart::new();
        cart.add(item(1, 10, 50_000), 2);
        let json = serde_json::to_string(&cart).unwrap();
        let back: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cart);
    }

    #[test]
    fn test_reconcile_empty_server_keeps_local() {
        let local = Cart::from_lines([line(1, 10, 2), line(2, 20, 1)]);
        let mut synced = SyncedQuantities::new();
        synced.record_push(&id(1, 10), 2);

        let result = local.reconcile(Vec::new(), &synced);

        assert_eq!(result.cart, local);
        assert_eq!(result.synced.get(&id(1, 10)), 2);
        assert_eq!(result.synced.get(&id(2, 20)), 1);
        assert_eq!(
            result.pending,
            vec![PendingPush {
                line_id: id(2, 20),
                variant_id: VariantId::new(20),
                quantity: 1,
            }]
        );
    }

    #[test]
    fn test_reconcile_never_double_counts_synced_line() {
        // Both sides know about 2 units and nothing changed locally.
        let local = Cart::from_lines([line(1, 10, 2)]);
        let synced = SyncedQuantities::from_cart(&local);

        let result = local.reconcile([line(1, 10, 2)], &synced);

        assert_eq!(result.cart.get(&id(1, 10)).unwrap().quantity, 2);
        assert!(result.pending.is_empty());
    }

    #[test]
    fn test_reconcile_adds_local_delta() {
        // Synced at 2, one more added locally, another device added 3.
        let local = Cart::from_lines([line(1, 10, 3)]);
        let mut synced = SyncedQuantities::new();
        synced.record_push(&id(1, 10), 2);

        let result = local.reconcile([line(1, 10, 5)], &synced);

        assert_eq!(result.cart.get(&id(1, 10)).unwrap().quantity, 6);
        assert_eq!(result.synced.get(&id(1, 10)), 6);
        assert_eq!(result.pending.len(), 1);
        assert_eq!(result.pending[0].quantity, 1);
    }

    #[test]
    fn test_reconcile_guest_lines_survive_login() {
        let local = Cart::from_lines([line(2, 20, 1)]);
        let result = local.reconcile([line(1, 10, 2)], &SyncedQuantities::new());

        let ids: Vec<_> = result.cart.lines().iter().map(|l| l.id.clone()).collect();
        assert_eq!(ids, vec![id(1, 10), id(2, 20)]);
        assert_eq!(result.pending.len(), 1);
        assert_eq!(result.pending[0].variant_id, VariantId::new(20));
    }

    #[test]
    fn test_reconcile_drops_synced_line_removed_on_server() {
        // The line was synced at 2 and the server no longer has it.
        let local = Cart::from_lines([line(1, 10, 2), line(2, 20, 1)]);
        let mut synced = SyncedQuantities::new();
        synced.record_push(&id(1, 10), 2);

        let result = local.reconcile([line(2, 20, 1)], &synced);

        assert!(result.cart.get(&id(1, 10)).is_none());
        assert_eq!(result.cart.get(&id(2, 20)).unwrap().quantity, 2);
    }

    #[test]
    fn test_reconcile_keeps_removed_line_removed() {
        let mut local = Cart::from_lines([line(1, 10, 2), line(2, 20, 1)]);
        let synced = SyncedQuantities::from_cart(&local);
        local.remove(&id(1, 10));

        let first = local.reconcile([line(1, 10, 2), line(2, 20, 1)], &synced);
        assert!(first.cart.get(&id(1, 10)).is_none());
        assert_eq!(first.cart.total_quantity(), 1);
        assert!(first.pending.is_empty());
        // The server still holds the removed line.
        assert_eq!(first.synced.get(&id(1, 10)), 2);

        let second = first
            .cart
            .reconcile([line(1, 10, 2), line(2, 20, 1)], &first.synced);
        assert_eq!(second.cart, first.cart);
    }

    #[test]
    fn test_reconcile_keeps_cleared_cart_empty() {
        let mut local = Cart::from_lines([line(1, 10, 2)]);
        let synced = SyncedQuantities::from_cart(&local);
        local.clear();

        let result = local.reconcile([line(1, 10, 2)], &synced);
        assert!(result.cart.is_empty());
        assert!(result.pending.is_empty());
    }

    #[test]
    fn test_reconcile_keeps_lowered_quantity() {
        let mut local = Cart::from_lines([line(1, 10, 4)]);
        let synced = SyncedQuantities::from_cart(&local);
        local.update_quantity(&id(1, 10), 1);

        let first = local.reconcile([line(1, 10, 4)], &synced);
        assert_eq!(first.cart.get(&id(1, 10)).unwrap().quantity, 1);
        assert!(first.pending.is_empty());

        let second = first.cart.reconcile([line(1, 10, 4)], &first.synced);
        assert_eq!(second.cart.get(&id(1, 10)).unwrap().quantity, 1);
    }

    #[test]
    fn test_reconcile_applies_reduction_to_server_growth() {
        // Synced at 3, lowered to 1 here, another device added 2.
        let local = Cart::from_lines([line(1, 10, 1)]);
        let mut synced = SyncedQuantities::new();
        synced.record_push(&id(1, 10), 3);

        let result = local.reconcile([line(1, 10, 5)], &synced);
        assert_eq!(result.cart.get(&id(1, 10)).unwrap().quantity, 3);
        assert_eq!(result.synced.get(&id(1, 10)), 5);
    }

    #[test]
    fn test_readding_removed_line_counts_once() {
        // Removed while the server kept 2, then 1 added and pushed.
        let local = Cart::from_lines([line(1, 10, 1)]);
        let mut synced = SyncedQuantities::new();
        synced.record_push(&id(1, 10), 2);
        synced.record_push(&id(1, 10), 1);

        let result = local.reconcile([line(1, 10, 3)], &synced);
        assert_eq!(result.cart.get(&id(1, 10)).unwrap().quantity, 1);
        assert!(result.pending.is_empty());
    }

    #[test]
    fn test_reconcile_carries_local_note() {
        let mut local = Cart::new();
        local.add(item(1, 10, 50_000), 1);
        local.update_note(&id(1, 10), "mix blue and white");
        let synced = SyncedQuantities::from_cart(&local);

        let result = local.reconcile([line(1, 10, 1)], &synced);

        assert_eq!(
            result.cart.get(&id(1, 10)).unwrap().note.as_deref(),
            Some("mix blue and white")
        );
    }

    #[test]
    fn test_failed_push_is_retried_next_time() {
        let local = Cart::from_lines([line(2, 20, 3)]);
        let mut first = local.reconcile([line(1, 10, 1)], &SyncedQuantities::new());
        // The push of the guest line failed.
        first.synced.unrecord(&id(2, 20), 3);
        assert_eq!(first.synced.get(&id(2, 20)), 0);

        let second = first.cart.reconcile([line(1, 10, 1)], &first.synced);
        assert_eq!(second.cart.get(&id(2, 20)).unwrap().quantity, 3);
        assert_eq!(second.pending.len(), 1);
        assert_eq!(second.pending[0].quantity, 3);
    }

    #[test]
    fn test_reconcile_is_stable_when_repeated() {
        let local = Cart::from_lines([line(1, 10, 1), line(2, 20, 4)]);
        let first = local.reconcile([line(1, 10, 2)], &SyncedQuantities::new());
        // The pushes succeeded: the server now holds the merged quantities.
        let server = first.cart.lines().to_vec();
        let second = first.cart.reconcile(server, &first.synced);

        assert_eq!(second.cart, first.cart);
        assert!(second.pending.is_empty());
    }
}
