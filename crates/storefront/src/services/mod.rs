//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart_sync` - Session cart storage and reconciliation with the backend cart
//! - `vnpay` - Parsing the VNPay return query and mapping response codes

pub mod cart_sync;
pub mod vnpay;
