//! Conversions from backend wire types to storefront types.

use phuphiem_core::{CartLine, LineId, Price, ProductId, VariantId};

use super::types::{BackendCartItem, BackendProduct, BackendVariant, ProductListResponse};

/// Category shown for products the backend left uncategorized.
pub const DEFAULT_CATEGORY: &str = "Khác";

/// Name shown for cart items whose product the backend did not embed.
pub const DEFAULT_PRODUCT_NAME: &str = "Sản phẩm";

/// Products per catalog page.
pub const PAGE_SIZE: u64 = 20;

/// A purchasable size of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub id: VariantId,
    pub size: String,
    pub price: Price,
}

/// A product as the storefront displays it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Price of the first variant (zero without variants).
    pub price: Price,
    /// B2 file name of the first image (empty without images).
    pub image: String,
    pub images: Vec<String>,
    pub category: String,
    pub is_color_mixing_available: bool,
    pub variants: Vec<Variant>,
}

impl Product {
    /// Whether anything can be added to the cart.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        !self.variants.is_empty()
    }

    /// Look up a variant by id.
    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }
}

/// One page of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub total: u64,
    pub page: u32,
}

impl ProductPage {
    /// Number of catalog pages, never less than one.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        u32::try_from(self.total.div_ceil(PAGE_SIZE).max(1)).unwrap_or(u32::MAX)
    }
}

impl From<BackendVariant> for Variant {
    fn from(v: BackendVariant) -> Self {
        Self {
            id: v.id,
            size: v.size,
            price: v.price,
        }
    }
}

impl From<BackendProduct> for Product {
    fn from(p: BackendProduct) -> Self {
        let variants: Vec<Variant> = p.variants.into_iter().map(Variant::from).collect();
        let price = variants.first().map_or(Price::ZERO, |v| v.price);
        let category = p
            .product_category
            .map(|c| c.category_name)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        Self {
            id: p.id,
            name: p.product_name,
            description: p.description.unwrap_or_default(),
            price,
            image: p.images.first().cloned().unwrap_or_default(),
            images: p.images,
            category,
            is_color_mixing_available: p.is_color_mixing_available,
            variants,
        }
    }
}

impl From<ProductListResponse> for ProductPage {
    fn from(list: ProductListResponse) -> Self {
        Self {
            items: list.data.into_iter().map(Product::from).collect(),
            total: list.total,
            page: list.page,
        }
    }
}

/// Map a server cart row to a cart line.
///
/// Rows without an embedded product fall back to the variant id as product
/// id and a generic name.
#[must_use]
pub fn cart_line_from_backend(item: BackendCartItem) -> CartLine {
    let variant = item.variant;
    let (product_id, product_name, image) = match variant.product {
        Some(product) => (
            product.id,
            product
                .product_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PRODUCT_NAME.to_string()),
            product.images.into_iter().next().unwrap_or_default(),
        ),
        None => (
            ProductId::new(variant.id.as_i64()),
            DEFAULT_PRODUCT_NAME.to_string(),
            String::new(),
        ),
    };

    CartLine {
        id: LineId::new(product_id, Some(variant.id)),
        product_id,
        product_name,
        image,
        variant_id: Some(variant.id),
        size: variant.size,
        price: variant.price,
        quantity: item.quantity,
        note: None,
        is_color_mixing_available: None,
    }
}
