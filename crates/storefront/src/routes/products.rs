//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use phuphiem_core::{Price, ProductId, VariantId};

use crate::b2::ImageResolver;
use crate::backend::{BackendError, Product, ProductPage};
use crate::error::AppError;
use crate::filters;
use crate::state::AppState;

/// Label of the pseudo-category that shows everything.
pub const ALL_CATEGORIES: &str = "Tất cả";

const LOAD_ERROR: &str = "Không thể tải sản phẩm. Vui lòng thử lại sau.";

// =============================================================================
// View Types
// =============================================================================

/// Product card data for listings.
#[derive(Clone)]
pub struct ProductCardView {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_url: String,
    pub category: String,
    pub in_stock: bool,
}

impl ProductCardView {
    #[must_use]
    pub fn new(product: &Product, images: &ImageResolver) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            image_url: images.url(&product.image),
            category: product.category.clone(),
            in_stock: product.in_stock(),
        }
    }
}

/// Variant option on the detail page.
#[derive(Clone)]
pub struct VariantView {
    pub id: VariantId,
    pub size: String,
    pub price: Price,
}

/// Product detail data.
#[derive(Clone)]
pub struct ProductDetailView {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image_urls: Vec<String>,
    pub category: String,
    pub is_color_mixing_available: bool,
    pub variants: Vec<VariantView>,
    pub in_stock: bool,
}

impl ProductDetailView {
    fn new(product: &Product, images: &ImageResolver) -> Self {
        let mut image_urls: Vec<String> = product.images.iter().map(|i| images.url(i)).collect();
        if image_urls.is_empty() {
            image_urls.push(images.url(""));
        }

        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            image_urls,
            category: product.category.clone(),
            is_color_mixing_available: product.is_color_mixing_available,
            variants: product
                .variants
                .iter()
                .map(|v| VariantView {
                    id: v.id,
                    size: v.size.clone(),
                    price: v.price,
                })
                .collect(),
            in_stock: product.in_stock(),
        }
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub page: Option<u32>,
    pub search: Option<String>,
    pub category: Option<String>,
}

impl ListingQuery {
    fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn category(&self) -> &str {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(ALL_CATEGORIES)
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub products: Vec<ProductCardView>,
    pub categories: Vec<String>,
    pub selected_category: String,
    pub search: String,
    pub current_page: u32,
    pub total_pages: u32,
    pub error: Option<String>,
}

/// A numbered pagination link.
#[derive(Clone)]
pub struct PageLink {
    pub number: u32,
    pub query: String,
    pub current: bool,
}

/// A category filter chip.
#[derive(Clone)]
pub struct CategoryLink {
    pub name: String,
    pub query: String,
    pub active: bool,
}

impl ProductsIndexTemplate {
    /// Query string for another page, keeping search and category.
    fn page_query(&self, page: u32) -> String {
        let mut query = format!("page={page}");
        if !self.search.is_empty() {
            query.push_str("&search=");
            query.push_str(&urlencoding::encode(&self.search));
        }
        if self.selected_category != ALL_CATEGORIES {
            query.push_str("&category=");
            query.push_str(&urlencoding::encode(&self.selected_category));
        }
        query
    }

    /// One link per page.
    #[must_use]
    pub fn page_links(&self) -> Vec<PageLink> {
        (1..=self.total_pages)
            .map(|number| PageLink {
                number,
                query: self.page_query(number),
                current: number == self.current_page,
            })
            .collect()
    }

    #[must_use]
    pub fn prev_query(&self) -> Option<String> {
        (self.current_page > 1).then(|| self.page_query(self.current_page - 1))
    }

    #[must_use]
    pub fn next_query(&self) -> Option<String> {
        (self.current_page < self.total_pages).then(|| self.page_query(self.current_page + 1))
    }

    /// Category chips; each keeps the search term and drops the page.
    #[must_use]
    pub fn category_links(&self) -> Vec<CategoryLink> {
        self.categories
            .iter()
            .map(|category| {
                let mut query = format!("category={}", urlencoding::encode(category));
                if !self.search.is_empty() {
                    query.push_str("&search=");
                    query.push_str(&urlencoding::encode(&self.search));
                }
                CategoryLink {
                    name: category.clone(),
                    query,
                    active: *category == self.selected_category,
                }
            })
            .collect()
    }
}

/// Categories present on a page, `"Tất cả"` first, in first-seen order.
#[must_use]
pub fn categories_of(products: &[Product]) -> Vec<String> {
    let mut categories = vec![ALL_CATEGORIES.to_string()];
    for product in products {
        if !categories.contains(&product.category) {
            categories.push(product.category.clone());
        }
    }
    categories
}

/// Products of a page in the selected category.
pub fn filter_by_category<'a>(
    products: &'a [Product],
    category: &'a str,
) -> impl Iterator<Item = &'a Product> {
    products
        .iter()
        .filter(move |p| category == ALL_CATEGORIES || p.category == category)
}

/// Display product listing page.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> impl IntoResponse {
    let page = query.page();
    let selected_category = query.category().to_string();
    let search = query.search().unwrap_or_default().to_string();

    let (listing, error) = match state.backend().products(page, query.search()).await {
        Ok(listing) => (listing, None),
        Err(e) => {
            tracing::error!(error = %e, page, "Failed to load products");
            (
                ProductPage {
                    items: Vec::new(),
                    total: 0,
                    page,
                },
                Some(LOAD_ERROR.to_string()),
            )
        }
    };

    let images = state.b2().image_resolver().await;
    let products = filter_by_category(&listing.items, &selected_category)
        .map(|p| ProductCardView::new(p, &images))
        .collect();

    ProductsIndexTemplate {
        products,
        categories: categories_of(&listing.items),
        selected_category,
        search,
        current_page: page,
        total_pages: listing.total_pages(),
        error,
    }
}

// =============================================================================
// Detail
// =============================================================================

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub product: ProductDetailView,
}

/// Display product detail page.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ProductShowTemplate, AppError> {
    let id: ProductId = id
        .parse()
        .map_err(|_| AppError::NotFound(format!("product {id}")))?;

    let product = state.backend().product(id).await.map_err(|e| match e {
        BackendError::NotFound(_) => AppError::NotFound(format!("product {id}")),
        other => AppError::Backend(other),
    })?;

    let images = state.b2().image_resolver().await;
    Ok(ProductShowTemplate {
        product: ProductDetailView::new(&product, &images),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Variant;

    fn product(id: i64, category: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Sản phẩm {id}"),
            description: String::new(),
            price: Price::from_dong(100_000),
            image: String::new(),
            images: Vec::new(),
            category: category.to_string(),
            is_color_mixing_available: false,
            variants: vec![Variant {
                id: VariantId::new(id * 10),
                size: "M".to_string(),
                price: Price::from_dong(100_000),
            }],
        }
    }

    #[test]
    fn test_categories_start_with_all_and_dedupe() {
        let products = vec![
            product(1, "Túi xách"),
            product(2, "Trang sức"),
            product(3, "Túi xách"),
        ];
        assert_eq!(
            categories_of(&products),
            vec!["Tất cả", "Túi xách", "Trang sức"]
        );
    }

    #[test]
    fn test_category_filter_within_page() {
        let products = vec![product(1, "Túi xách"), product(2, "Trang sức")];
        let ids: Vec<i64> = filter_by_category(&products, "Trang sức")
            .map(|p| p.id.as_i64())
            .collect();
        assert_eq!(ids, vec![2]);

        assert_eq!(filter_by_category(&products, ALL_CATEGORIES).count(), 2);
        assert_eq!(filter_by_category(&products, "Không có").count(), 0);
    }

    #[test]
    fn test_listing_query_defaults() {
        let query = ListingQuery {
            page: Some(0),
            search: Some("   ".to_string()),
            category: None,
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.search(), None);
        assert_eq!(query.category(), ALL_CATEGORIES);
    }

    #[test]
    fn test_pagination_links_keep_filters() {
        let template = ProductsIndexTemplate {
            products: Vec::new(),
            categories: vec![ALL_CATEGORIES.to_string(), "Túi xách".to_string()],
            selected_category: "Túi xách".to_string(),
            search: "len đan".to_string(),
            current_page: 1,
            total_pages: 3,
            error: None,
        };

        let links = template.page_links();
        assert_eq!(links.len(), 3);
        assert!(links.first().is_some_and(|l| l.current));
        assert_eq!(
            links.get(1).map(|l| l.query.as_str()),
            Some("page=2&search=len%20%C4%91an&category=T%C3%BAi%20x%C3%A1ch")
        );
        assert_eq!(template.prev_query(), None);
        assert!(template.next_query().is_some_and(|q| q.starts_with("page=2&")));

        let chips = template.category_links();
        assert_eq!(
            chips.first().map(|c| c.query.as_str()),
            Some("category=T%E1%BA%A5t%20c%E1%BA%A3&search=len%20%C4%91an")
        );
        assert!(chips.get(1).is_some_and(|c| c.active));
    }

    #[test]
    fn test_detail_view_uses_placeholder_without_images() {
        let view = ProductDetailView::new(&product(1, "Khác"), &ImageResolver::placeholder_only());
        assert_eq!(view.image_urls, vec![crate::b2::PLACEHOLDER_IMAGE.to_string()]);
        assert!(view.in_stock);
        assert_eq!(view.variants.len(), 1);
    }
}
