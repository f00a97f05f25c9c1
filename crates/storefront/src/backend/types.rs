//! Wire types for the shop backend REST API.
//!
//! Field names follow the backend's camelCase JSON. Numeric fields the
//! backend is inconsistent about (prices, page numbers, location codes) are
//! decoded leniently through the helpers at the bottom of this file.

use serde::{Deserialize, Deserializer, Serialize};

use phuphiem_core::{
    CartItemId, CategoryId, LocationId, OrderDetailId, OrderId, OrderStatus, Price, ProductId,
    UserDetailId, UserId, VariantId,
};

// =============================================================================
// Auth & Users
// =============================================================================

/// User as returned inside auth responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Body of a successful `POST /auth/login`.
///
/// Older backend builds return `token` instead of `accessToken`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

impl AuthResponse {
    /// The bearer token, whichever field it came in.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .or(self.token.as_deref())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
}

/// `GET /users/me`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user_details: Vec<UserDetail>,
}

impl UserProfile {
    /// The address marked active, if any.
    #[must_use]
    pub fn active_detail(&self) -> Option<&UserDetail> {
        self.user_details.iter().find(|d| d.is_active())
    }

    /// Session identity for this profile.
    #[must_use]
    pub fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

/// A saved shipping address with its phone number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub id: UserDetailId,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub ward: Option<String>,
    #[serde(default)]
    pub province_id: Option<LocationId>,
    #[serde(default)]
    pub district_id: Option<LocationId>,
    #[serde(default)]
    pub ward_id: Option<LocationId>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UserDetail {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active.unwrap_or(false)
    }

    /// `"address, ward, district, province"`, skipping blank parts.
    #[must_use]
    pub fn full_address(&self) -> String {
        [&self.address, &self.ward, &self.district, &self.province]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveDetailRequest {
    pub detail_id: UserDetailId,
}

/// Body of `POST /users/details` and `PUT /users/details/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub province_id: LocationId,
    pub district_id: LocationId,
    pub ward_id: LocationId,
    pub province: String,
    pub district: String,
    pub ward: String,
    pub address: String,
}

/// A province, district or ward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    #[serde(deserialize_with = "string_or_number")]
    pub code: String,
    pub name: String,
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProduct {
    pub id: ProductId,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_color_mixing_available: bool,
    #[serde(default)]
    pub variants: Vec<BackendVariant>,
    #[serde(default)]
    pub product_category: Option<BackendCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendVariant {
    pub id: VariantId,
    #[serde(default)]
    pub size: String,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: Price,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendCategory {
    #[serde(default)]
    pub id: Option<CategoryId>,
    #[serde(default)]
    pub category_name: String,
}

/// `GET /products`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductListResponse {
    #[serde(default)]
    pub data: Vec<BackendProduct>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "first_page", deserialize_with = "lenient_page")]
    pub page: u32,
}

const fn first_page() -> u32 {
    1
}

// =============================================================================
// Cart
// =============================================================================

/// One row of `GET /cart-items`.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendCartItem {
    pub id: CartItemId,
    pub quantity: u32,
    pub variant: BackendCartVariant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendCartVariant {
    pub id: VariantId,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: Price,
    #[serde(default)]
    pub product: Option<ProductRef>,
}

/// Product summary embedded in cart items and orders.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub variant_id: VariantId,
    pub quantity: u32,
}

// =============================================================================
// Orders
// =============================================================================

/// One row of `GET /orders/my-orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyOrder {
    pub id: OrderId,
    pub status: OrderStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, deserialize_with = "lenient_optional_price")]
    pub total_amount: Option<Price>,
    #[serde(default)]
    pub order_details: Vec<OrderDetail>,
}

impl MyOrder {
    /// Sum of unit price times quantity over all details.
    #[must_use]
    pub fn computed_total(&self) -> Price {
        self.order_details.iter().map(OrderDetail::line_total).sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub id: OrderDetailId,
    pub quantity: u32,
    #[serde(default, deserialize_with = "lenient_price")]
    pub unit_price: Price,
    #[serde(default)]
    pub note: Option<String>,
    pub variant: OrderVariant,
}

impl OrderDetail {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderVariant {
    pub id: VariantId,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub product: Option<ProductRef>,
}

// =============================================================================
// Payment & Contact
// =============================================================================

/// Body of `POST /payment/vnpay/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VnpayCreateRequest {
    pub bank_code: String,
    pub locale: String,
    pub product_variants: Vec<VariantQuantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantQuantity {
    pub variant_id: VariantId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VnpayCreateResponse {
    #[serde(default)]
    pub payment_url: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

// =============================================================================
// Lenient decoding
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            Self::String(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(deserializer).map(StringOrNumber::into_string)
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(StringOrNumber::into_string))
}

/// Prices arrive as `"295000.00"`, sometimes as numbers. Anything
/// unparsable becomes zero.
fn lenient_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Price, D::Error> {
    Ok(lenient_optional_price(deserializer)?.unwrap_or(Price::ZERO))
}

fn lenient_optional_price<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Price>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?
        .map(|raw| Price::parse_or_zero(&raw.into_string())))
}

/// `page` is a number or a numeric string.
fn lenient_page<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?
        .and_then(|raw| raw.into_string().parse().ok())
        .unwrap_or(1))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_product_list_decodes_string_page() {
        let json = r#"{
            "data": [{
                "id": 4,
                "createdAt": "2025-11-02T08:00:00.000Z",
                "productName": "Hoa len tulip",
                "description": "Móc tay",
                "images": ["1764668600636-tulip.png"],
                "isColorMixingAvailable": true,
                "variants": [{"id": 9, "size": "S", "price": "295000.00"}],
                "productCategory": {"id": 1, "categoryName": "Hoa len"}
            }],
            "total": 21,
            "page": "2"
        }"#;

        let list: ProductListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.page, 2);
        assert_eq!(list.total, 21);
        assert_eq!(list.data[0].variants[0].price, Price::from_dong(295_000));
    }

    #[test]
    fn test_cart_item_without_product() {
        let json = r#"[{"id": 1, "quantity": 2, "variant": {"id": 7, "size": "M", "price": "abc"}}]"#;
        let items: Vec<BackendCartItem> = serde_json::from_str(json).unwrap();
        assert!(items[0].variant.product.is_none());
        assert_eq!(items[0].variant.price, Price::ZERO);
    }

    #[test]
    fn test_order_total_falls_back_to_details() {
        let json = r#"{
            "id": 12,
            "status": "Paid",
            "createdAt": "2025-12-01T03:15:00.000Z",
            "orderDetails": [
                {"id": 1, "quantity": 2, "unitPrice": "100000.00", "variant": {"id": 3, "size": "M"}},
                {"id": 2, "quantity": 1, "unitPrice": 50000, "note": "xanh", "variant": {"id": 4}}
            ]
        }"#;
        let order: MyOrder = serde_json::from_str(json).unwrap();
        assert_eq!(order.total_amount, None);
        assert_eq!(order.computed_total(), Price::from_dong(250_000));
    }

    #[test]
    fn test_auth_response_token_fallback() {
        let json = r#"{"token": "abc", "user": {"id": 1, "fullName": "Lan", "email": "lan@phuphiem.vn"}}"#;
        let auth: AuthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(auth.bearer(), Some("abc"));
    }

    #[test]
    fn test_location_numeric_code() {
        let loc: Location =
            serde_json::from_str(r#"{"id": 1, "code": 79, "name": "TP. Hồ Chí Minh"}"#).unwrap();
        assert_eq!(loc.code, "79");
    }

    #[test]
    fn test_vnpay_request_shape() {
        let req = VnpayCreateRequest {
            bank_code: String::new(),
            locale: "vn".to_string(),
            product_variants: vec![VariantQuantity {
                variant_id: VariantId::new(9),
                quantity: 2,
            }],
            note: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "bankCode": "",
                "locale": "vn",
                "productVariants": [{"variantId": 9, "quantity": 2}]
            })
        );
    }

    #[test]
    fn test_full_address_skips_blanks() {
        let detail = UserDetail {
            id: UserDetailId::new(1),
            phone_number: None,
            province: Some("Hà Nội".to_string()),
            district: Some(String::new()),
            ward: Some("Phường Láng Hạ".to_string()),
            province_id: None,
            district_id: None,
            ward_id: None,
            address: Some("12 Ngõ 4".to_string()),
            is_active: Some(true),
        };
        assert_eq!(detail.full_address(), "12 Ngõ 4, Phường Láng Hạ, Hà Nội");
    }
}
