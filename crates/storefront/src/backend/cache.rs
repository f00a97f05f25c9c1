//! Cache types for backend API responses.

use super::conversions::{Product, ProductPage};
use super::types::Location;
use phuphiem_core::ProductId;

/// Cache key for catalog and location reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Products { page: u32 },
    Provinces,
    Districts(String),
    Wards(String),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(ProductPage),
    Locations(Vec<Location>),
}
