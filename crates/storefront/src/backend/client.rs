//! `BackendClient` implementation.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use phuphiem_core::{ProductId, UserDetailId, VariantId};

use super::BackendError;
use super::cache::{CacheKey, CacheValue};
use super::conversions::{Product, ProductPage};
use super::types::{
    AddCartItemRequest, AddressRequest, AuthResponse, AuthUser, BackendCartItem, BackendProduct,
    ContactRequest, Location, LoginRequest, MyOrder, ProductListResponse, RegisterRequest,
    SetActiveDetailRequest, UserProfile, VnpayCreateRequest, VnpayCreateResponse,
};
use crate::config::BackendConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// A successful login: the bearer token and who it belongs to.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub user: Option<AuthUser>,
}

// =============================================================================
// BackendClient
// =============================================================================

/// Client for the shop backend and the contact form service.
///
/// Products and locations are cached for 5 minutes.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    api_url: String,
    contact_api_url: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                api_url: config.api_url.clone(),
                contact_api_url: config.contact_api_url.clone(),
                cache,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.api_url)
    }

    /// Send a request and decode a JSON body.
    async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, BackendError> {
        let body = Self::send(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(e)
        })
    }

    /// Send a request, map error statuses, and return the raw body.
    async fn send(request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = error_message(&body);
        debug!(status = %status, message = %message, "Backend returned non-success status");

        Err(match status {
            StatusCode::UNAUTHORIZED => BackendError::Unauthorized(message),
            StatusCode::NOT_FOUND => BackendError::NotFound(message),
            _ => BackendError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    // =========================================================================
    // Auth & Users
    // =========================================================================

    /// Exchange email and password for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns the backend's rejection, or [`BackendError::MissingToken`].
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession, BackendError> {
        let request = self
            .inner
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { email, password });

        let auth: AuthResponse = Self::execute(request).await?;
        let token = auth
            .bearer()
            .map(str::to_string)
            .ok_or(BackendError::MissingToken)?;

        Ok(LoginSession {
            token,
            user: auth.user,
        })
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns the backend's rejection (duplicate email, weak password, ...).
    #[instrument(skip(self, payload), fields(email = %payload.email))]
    pub async fn register(&self, payload: &RegisterRequest) -> Result<(), BackendError> {
        let request = self.inner.client.post(self.url("/auth/register")).json(payload);
        Self::send(request).await.map(|_| ())
    }

    /// Profile and addresses of the token's owner.
    ///
    /// # Errors
    ///
    /// [`BackendError::Unauthorized`] when the token expired.
    #[instrument(skip_all)]
    pub async fn current_user(&self, token: &str) -> Result<UserProfile, BackendError> {
        let request = self.inner.client.get(self.url("/users/me")).bearer_auth(token);
        Self::execute(request).await
    }

    /// Mark an address as the active one.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn set_active_detail(
        &self,
        token: &str,
        detail_id: UserDetailId,
    ) -> Result<(), BackendError> {
        let request = self
            .inner
            .client
            .put(self.url("/users/detail"))
            .bearer_auth(token)
            .json(&SetActiveDetailRequest { detail_id });
        Self::send(request).await.map(|_| ())
    }

    /// Add an address.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token, payload))]
    pub async fn create_detail(
        &self,
        token: &str,
        payload: &AddressRequest,
    ) -> Result<(), BackendError> {
        let request = self
            .inner
            .client
            .post(self.url("/users/details"))
            .bearer_auth(token)
            .json(payload);
        Self::send(request).await.map(|_| ())
    }

    /// Replace an address.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token, payload))]
    pub async fn update_detail(
        &self,
        token: &str,
        detail_id: UserDetailId,
        payload: &AddressRequest,
    ) -> Result<(), BackendError> {
        let request = self
            .inner
            .client
            .put(self.url(&format!("/users/details/{detail_id}")))
            .bearer_auth(token)
            .json(payload);
        Self::send(request).await.map(|_| ())
    }

    // =========================================================================
    // Locations
    // =========================================================================

    async fn locations(&self, key: CacheKey, path: String) -> Result<Vec<Location>, BackendError> {
        if let Some(CacheValue::Locations(locations)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for locations");
            return Ok(locations);
        }

        let locations: Vec<Location> = Self::execute(self.inner.client.get(self.url(&path))).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Locations(locations.clone()))
            .await;

        Ok(locations)
    }

    /// All provinces.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn provinces(&self) -> Result<Vec<Location>, BackendError> {
        self.locations(CacheKey::Provinces, "/locations/provinces".to_string())
            .await
    }

    /// Districts of a province.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn districts(&self, province_code: &str) -> Result<Vec<Location>, BackendError> {
        self.locations(
            CacheKey::Districts(province_code.to_string()),
            format!("/locations/provinces/{}/districts", urlencoding::encode(province_code)),
        )
        .await
    }

    /// Wards of a district.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn wards(&self, district_code: &str) -> Result<Vec<Location>, BackendError> {
        self.locations(
            CacheKey::Wards(district_code.to_string()),
            format!("/locations/districts/{}/wards", urlencoding::encode(district_code)),
        )
        .await
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// One catalog page, optionally filtered by a search term.
    ///
    /// Only unfiltered pages are cached.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products(
        &self,
        page: u32,
        search: Option<&str>,
    ) -> Result<ProductPage, BackendError> {
        let cache_key = CacheKey::Products { page };

        if search.is_none()
            && let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let mut query: Vec<(&str, String)> = vec![("page", page.to_string())];
        if let Some(term) = search {
            query.push(("search", term.to_string()));
        }

        let request = self.inner.client.get(self.url("/products")).query(&query);
        let list: ProductListResponse = Self::execute(request).await?;
        let products = ProductPage::from(list);

        if search.is_none() {
            self.inner
                .cache
                .insert(cache_key, CacheValue::Products(products.clone()))
                .await;
        }

        Ok(products)
    }

    /// A single product.
    ///
    /// # Errors
    ///
    /// [`BackendError::NotFound`] when the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: ProductId) -> Result<Product, BackendError> {
        let cache_key = CacheKey::Product(id);

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let request = self.inner.client.get(self.url(&format!("/products/{id}")));
        let data: BackendProduct = Self::execute(request).await?;
        let product = Product::from(data);

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// The customer's server-side cart.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip_all)]
    pub async fn cart_items(&self, token: &str) -> Result<Vec<BackendCartItem>, BackendError> {
        let request = self.inner.client.get(self.url("/cart-items")).bearer_auth(token);
        Self::execute(request).await
    }

    /// Add a quantity of a variant to the server-side cart.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn add_cart_item(
        &self,
        token: &str,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<(), BackendError> {
        let request = self
            .inner
            .client
            .post(self.url("/cart-items"))
            .bearer_auth(token)
            .json(&AddCartItemRequest {
                variant_id,
                quantity,
            });
        Self::send(request).await.map(|_| ())
    }

    // =========================================================================
    // Orders & Payment
    // =========================================================================

    /// The customer's orders.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip_all)]
    pub async fn my_orders(&self, token: &str) -> Result<Vec<MyOrder>, BackendError> {
        let request = self
            .inner
            .client
            .get(self.url("/orders/my-orders"))
            .bearer_auth(token);
        Self::execute(request).await
    }

    /// Create an order and a VNPay payment for it.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token, payload), fields(lines = payload.product_variants.len()))]
    pub async fn create_vnpay_payment(
        &self,
        token: &str,
        payload: &VnpayCreateRequest,
    ) -> Result<VnpayCreateResponse, BackendError> {
        let request = self
            .inner
            .client
            .post(self.url("/payment/vnpay/create"))
            .bearer_auth(token)
            .json(payload);
        Self::execute(request).await
    }

    // =========================================================================
    // Contact
    // =========================================================================

    /// Forward a contact form message.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, payload), fields(email = %payload.email))]
    pub async fn submit_contact(&self, payload: &ContactRequest) -> Result<(), BackendError> {
        let url = format!("{}/contact", self.inner.contact_api_url);
        let request = self.inner.client.post(url).json(payload);
        Self::send(request).await.map(|_| ())
    }
}

/// Pull a human-readable message out of an error body.
///
/// The backend answers `{"message": "..."}` or, for validation failures,
/// `{"message": ["...", "..."]}`. Plain-text bodies are used as is.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("message") {
            Some(serde_json::Value::String(message)) => message.clone(),
            Some(serde_json::Value::Array(messages)) => messages
                .iter()
                .filter_map(serde_json::Value::as_str)
                .collect::<Vec<_>>()
                .join("; "),
            _ => String::new(),
        },
        Ok(_) => String::new(),
        Err(_) => body.trim().chars().take(200).collect(),
    }
}
