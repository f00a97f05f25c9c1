//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::filters;
use crate::routes::products::ProductCardView;
use crate::state::AppState;

/// Number of products featured on the home page.
pub const FEATURED_COUNT: usize = 8;

// =============================================================================
// Hero Configuration (Static content for the banner)
// =============================================================================

/// A single hero slide.
#[derive(Clone)]
pub struct HeroSlide {
    pub title: &'static str,
    pub description: &'static str,
    pub image_path: &'static str,
    pub link: &'static str,
}

/// Banner slides shown above the featured products.
pub const HERO_SLIDES: [HeroSlide; 3] = [
    HeroSlide {
        title: "Đồ Handmade Độc Đáo",
        description: "Khám phá bộ sưu tập các sản phẩm handmade được làm thủ công với tình yêu và sự tận tâm.",
        image_path: "/static/img/hero-1.svg",
        link: "/products",
    },
    HeroSlide {
        title: "Chất Lượng Cao",
        description: "Mỗi sản phẩm đều được kiểm tra kỹ lưỡng để đảm bảo chất lượng tốt nhất.",
        image_path: "/static/img/hero-2.svg",
        link: "/products",
    },
    HeroSlide {
        title: "Giao Hàng Nhanh",
        description: "Giao hàng toàn quốc với dịch vụ nhanh chóng và đáng tin cậy.",
        image_path: "/static/img/hero-3.svg",
        link: "/products",
    },
];

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub slides: Vec<HeroSlide>,
    pub products: Vec<ProductCardView>,
    pub error: Option<String>,
}

/// Display the home page.
#[instrument(skip(state))]
pub async fn home(State(state): State<AppState>) -> impl IntoResponse {
    let (products, error) = match state.backend().products(1, None).await {
        Ok(listing) => {
            let images = state.b2().image_resolver().await;
            let products = listing
                .items
                .iter()
                .take(FEATURED_COUNT)
                .map(|p| ProductCardView::new(p, &images))
                .collect();
            (products, None)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load featured products");
            (
                Vec::new(),
                Some("Không thể tải sản phẩm. Vui lòng thử lại sau.".to_string()),
            )
        }
    };

    HomeTemplate {
        slides: HERO_SLIDES.to_vec(),
        products,
        error,
    }
}
