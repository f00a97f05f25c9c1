//! Phuphiem Core - Shared domain types.
//!
//! This crate provides the types used by the storefront and its tooling:
//! - `storefront` - Server-rendered shop (catalog, cart, checkout, account)
//! - `cli` - Command-line tools for operational tasks
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Cart bookkeeping lives here so it can be tested
//! without a session store or a backend.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails and order statuses
//! - [`cart`] - Cart lines, cart operations and server reconciliation
//! - [`validation`] - Form rules shared by registration and checkout

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;
pub mod validation;

pub use cart::{Cart, CartLine, LineId, NewCartLine, PendingPush, Reconciliation, SyncedQuantities};
pub use types::*;
