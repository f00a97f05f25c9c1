//! Account route handlers: profile, shipping addresses and order history.
//!
//! Every handler here needs a logged-in customer. When the backend rejects
//! the stored token the session is dropped and the visitor is sent to the
//! login page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use phuphiem_core::{LocationId, OrderId, Price, UserDetailId, validation};

use crate::b2::ImageResolver;
use crate::backend::{
    AddressRequest, BackendClient, BackendError, Location, MyOrder, UserDetail, UserProfile,
    conversions::DEFAULT_PRODUCT_NAME,
};
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::routes::auth::expire_session;
use crate::state::AppState;

const PROFILE_LOAD_ERROR: &str = "Không thể tải thông tin người dùng.";
const ACTIVE_UPDATE_ERROR: &str = "Không thể cập nhật địa chỉ mặc định.";
const ORDERS_LOAD_ERROR: &str = "Không thể tải danh sách đơn hàng.";
const ADDRESS_SAVE_ERROR: &str = "Không thể lưu địa chỉ. Vui lòng thử lại.";
const ADDRESS_INVALID: &str = "Địa chỉ đã chọn không hợp lệ. Vui lòng chọn lại.";

// =============================================================================
// Profile
// =============================================================================

/// Profile display data.
#[derive(Clone)]
pub struct ProfileView {
    pub full_name: String,
    pub email: String,
    pub role: Option<String>,
}

/// Saved address display data.
#[derive(Clone)]
pub struct AddressView {
    pub id: UserDetailId,
    pub phone_number: String,
    pub province: String,
    pub district: String,
    pub ward: String,
    pub address: String,
    pub full_address: String,
    pub is_active: bool,
}

impl From<&UserDetail> for AddressView {
    fn from(detail: &UserDetail) -> Self {
        let or_blank = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            id: detail.id,
            phone_number: or_blank(&detail.phone_number),
            province: or_blank(&detail.province),
            district: or_blank(&detail.district),
            ward: or_blank(&detail.ward),
            address: or_blank(&detail.address),
            full_address: detail.full_address(),
            is_active: detail.is_active(),
        }
    }
}

/// Banners shown on the profile page after a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    pub error: Option<String>,
    pub saved: Option<String>,
}

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/profile.html")]
pub struct ProfileTemplate {
    pub profile: Option<ProfileView>,
    pub addresses: Vec<AddressView>,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Display the profile with the saved addresses.
#[instrument(skip(state, session, user))]
pub async fn profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ProfileQuery>,
) -> Response {
    let profile = match state.backend().current_user(&user.access_token).await {
        Ok(profile) => profile,
        Err(e) if e.is_unauthorized() => return expire_session(&session).await,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load profile");
            return ProfileTemplate {
                profile: None,
                addresses: Vec::new(),
                error: Some(e.user_message(PROFILE_LOAD_ERROR)),
                notice: None,
            }
            .into_response();
        }
    };

    let error = query
        .error
        .as_deref()
        .map(|_| ACTIVE_UPDATE_ERROR.to_string());
    let notice = query.saved.as_deref().map(|_| "Đã lưu địa chỉ.".to_string());

    ProfileTemplate {
        profile: Some(ProfileView {
            full_name: profile.full_name.clone(),
            email: profile.email.clone(),
            role: profile.role.clone(),
        }),
        addresses: profile.user_details.iter().map(AddressView::from).collect(),
        error,
        notice,
    }
    .into_response()
}

/// Active address form data.
#[derive(Debug, Deserialize)]
pub struct ActiveAddressForm {
    pub detail_id: UserDetailId,
}

/// Mark an address as the active one.
///
/// Already-active addresses are left alone.
#[instrument(skip(state, session, user))]
pub async fn set_active_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ActiveAddressForm>,
) -> Response {
    let token = &user.access_token;
    let result = match state.backend().current_user(token).await {
        Ok(profile) if is_already_active(&profile, form.detail_id) => Ok(()),
        Ok(_) => state.backend().set_active_detail(token, form.detail_id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => Redirect::to("/account/profile").into_response(),
        Err(e) if e.is_unauthorized() => expire_session(&session).await,
        Err(e) => {
            tracing::error!(error = %e, "Failed to set active address");
            Redirect::to("/account/profile?error=active").into_response()
        }
    }
}

/// Whether `detail_id` is already the active address.
#[must_use]
pub fn is_already_active(profile: &UserProfile, detail_id: UserDetailId) -> bool {
    profile.active_detail().is_some_and(|d| d.id == detail_id)
}

// =============================================================================
// Address Form
// =============================================================================

/// A `<select>` option.
#[derive(Clone)]
pub struct LocationOption {
    pub code: String,
    pub name: String,
    pub selected: bool,
}

fn options(locations: &[Location], selected: &str) -> Vec<LocationOption> {
    locations
        .iter()
        .map(|l| LocationOption {
            code: l.code.clone(),
            name: l.name.clone(),
            selected: !selected.is_empty() && l.code == selected,
        })
        .collect()
}

/// Address form data. The selects submit location codes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressForm {
    #[serde(default)]
    pub province_code: String,
    #[serde(default)]
    pub district_code: String,
    #[serde(default)]
    pub ward_code: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone_number: String,
}

impl AddressForm {
    /// Field-level problems, in form order.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.province_code.trim().is_empty() {
            errors.push("Vui lòng chọn tỉnh/thành phố".to_string());
        }
        if self.district_code.trim().is_empty() {
            errors.push("Vui lòng chọn quận/huyện".to_string());
        }
        if self.ward_code.trim().is_empty() {
            errors.push("Vui lòng chọn phường/xã".to_string());
        }
        if self.address.trim().is_empty() {
            errors.push("Vui lòng nhập địa chỉ chi tiết".to_string());
        }
        if !self.phone_number.trim().is_empty()
            && let Err(e) = validation::phone(&self.phone_number)
        {
            errors.push(e.to_string());
        }
        errors
    }

    /// Prefill from a saved address, mapping stored ids back to codes.
    async fn from_detail(backend: &BackendClient, detail: &UserDetail) -> Self {
        let province_code = match detail.province_id {
            Some(id) => code_of(backend.provinces().await, id),
            None => String::new(),
        };
        let district_code = match (detail.district_id, province_code.is_empty()) {
            (Some(id), false) => code_of(backend.districts(&province_code).await, id),
            _ => String::new(),
        };
        let ward_code = match (detail.ward_id, district_code.is_empty()) {
            (Some(id), false) => code_of(backend.wards(&district_code).await, id),
            _ => String::new(),
        };

        Self {
            province_code,
            district_code,
            ward_code,
            address: detail.address.clone().unwrap_or_default(),
            phone_number: detail.phone_number.clone().unwrap_or_default(),
        }
    }
}

fn code_of(locations: Result<Vec<Location>, BackendError>, id: LocationId) -> String {
    locations
        .ok()
        .and_then(|list| list.into_iter().find(|l| l.id == id))
        .map(|l| l.code)
        .unwrap_or_default()
}

fn find_code(locations: &[Location], code: &str) -> Option<(LocationId, String)> {
    locations
        .iter()
        .find(|l| l.code == code)
        .map(|l| (l.id, l.name.clone()))
}

/// Address form template (create and edit).
#[derive(Template, WebTemplate)]
#[template(path = "account/address_form.html")]
pub struct AddressFormTemplate {
    pub title: String,
    pub action: String,
    pub form: AddressForm,
    pub provinces: Vec<LocationOption>,
    pub districts: Vec<LocationOption>,
    pub wards: Vec<LocationOption>,
    pub errors: Vec<String>,
}

impl AddressFormTemplate {
    /// Build the form with the option lists for the current selection.
    async fn load(
        backend: &BackendClient,
        target: AddressTarget,
        form: AddressForm,
        mut errors: Vec<String>,
    ) -> Self {
        let provinces = match backend.provinces().await {
            Ok(list) => options(&list, &form.province_code),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load provinces");
                errors.push("Không thể tải danh sách tỉnh/thành phố".to_string());
                Vec::new()
            }
        };
        let districts = if form.province_code.is_empty() {
            Vec::new()
        } else {
            backend
                .districts(&form.province_code)
                .await
                .map(|list| options(&list, &form.district_code))
                .unwrap_or_default()
        };
        let wards = if form.district_code.is_empty() {
            Vec::new()
        } else {
            backend
                .wards(&form.district_code)
                .await
                .map(|list| options(&list, &form.ward_code))
                .unwrap_or_default()
        };

        Self {
            title: target.title().to_string(),
            action: target.action(),
            form,
            provinces,
            districts,
            wards,
            errors,
        }
    }
}

/// Which address the form saves to.
#[derive(Debug, Clone, Copy)]
enum AddressTarget {
    New,
    Existing(UserDetailId),
}

impl AddressTarget {
    const fn title(self) -> &'static str {
        match self {
            Self::New => "Thêm mới địa chỉ",
            Self::Existing(_) => "Cập nhật địa chỉ",
        }
    }

    fn action(self) -> String {
        match self {
            Self::New => "/account/addresses".to_string(),
            Self::Existing(id) => format!("/account/addresses/{id}"),
        }
    }
}

/// Display the new address form.
#[instrument(skip(state, _user))]
pub async fn new_address(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
) -> AddressFormTemplate {
    AddressFormTemplate::load(
        state.backend(),
        AddressTarget::New,
        AddressForm::default(),
        Vec::new(),
    )
    .await
}

/// Display the edit form for a saved address.
#[instrument(skip(state, session, user))]
pub async fn edit_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<UserDetailId>,
) -> Result<Response, AppError> {
    let profile = match state.backend().current_user(&user.access_token).await {
        Ok(profile) => profile,
        Err(e) if e.is_unauthorized() => return Ok(expire_session(&session).await),
        Err(e) => return Err(e.into()),
    };

    let detail = profile
        .user_details
        .iter()
        .find(|d| d.id == id)
        .ok_or_else(|| AppError::NotFound(format!("address {id}")))?;

    let form = AddressForm::from_detail(state.backend(), detail).await;
    Ok(
        AddressFormTemplate::load(state.backend(), AddressTarget::Existing(id), form, Vec::new())
            .await
            .into_response(),
    )
}

/// Create an address.
#[instrument(skip(state, session, user, form))]
pub async fn create_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Response {
    save_address(&state, &session, &user.access_token, AddressTarget::New, form).await
}

/// Update a saved address.
#[instrument(skip(state, session, user, form))]
pub async fn update_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<UserDetailId>,
    Form(form): Form<AddressForm>,
) -> Response {
    save_address(
        &state,
        &session,
        &user.access_token,
        AddressTarget::Existing(id),
        form,
    )
    .await
}

async fn save_address(
    state: &AppState,
    session: &Session,
    token: &str,
    target: AddressTarget,
    form: AddressForm,
) -> Response {
    let backend = state.backend();

    let errors = form.errors();
    if !errors.is_empty() {
        return invalid_address(backend, target, form, errors).await;
    }

    let Some(request) = resolve_address(backend, &form).await else {
        return invalid_address(backend, target, form, vec![ADDRESS_INVALID.to_string()]).await;
    };

    let result = match target {
        AddressTarget::New => backend.create_detail(token, &request).await,
        AddressTarget::Existing(id) => backend.update_detail(token, id, &request).await,
    };

    match result {
        Ok(()) => Redirect::to("/account/profile?saved=1").into_response(),
        Err(e) if e.is_unauthorized() => expire_session(session).await,
        Err(e) => {
            tracing::error!(error = %e, "Failed to save address");
            let errors = vec![e.user_message(ADDRESS_SAVE_ERROR)];
            invalid_address(backend, target, form, errors).await
        }
    }
}

async fn invalid_address(
    backend: &BackendClient,
    target: AddressTarget,
    form: AddressForm,
    errors: Vec<String>,
) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        AddressFormTemplate::load(backend, target, form, errors).await,
    )
        .into_response()
}

/// Resolve the submitted codes to ids and names.
///
/// `None` when a code does not belong to its parent.
async fn resolve_address(backend: &BackendClient, form: &AddressForm) -> Option<AddressRequest> {
    let provinces = backend.provinces().await.ok()?;
    let (province_id, province) = find_code(&provinces, form.province_code.trim())?;

    let districts = backend.districts(form.province_code.trim()).await.ok()?;
    let (district_id, district) = find_code(&districts, form.district_code.trim())?;

    let wards = backend.wards(form.district_code.trim()).await.ok()?;
    let (ward_id, ward) = find_code(&wards, form.ward_code.trim())?;

    let phone_number = validation::phone(&form.phone_number).ok();

    Some(AddressRequest {
        phone_number,
        province_id,
        district_id,
        ward_id,
        province,
        district,
        ward,
        address: form.address.trim().to_string(),
    })
}

// =============================================================================
// Location Cascades (HTMX)
// =============================================================================

/// `<option>` list fragment for the district and ward selects.
#[derive(Template, WebTemplate)]
#[template(path = "partials/location_options.html")]
pub struct LocationOptionsTemplate {
    pub placeholder: String,
    pub options: Vec<LocationOption>,
    /// Also empty the ward select (when the province changed).
    pub reset_wards: bool,
}

/// District cascade query.
#[derive(Debug, Deserialize)]
pub struct DistrictsQuery {
    #[serde(default)]
    pub province_code: String,
}

/// Ward cascade query.
#[derive(Debug, Deserialize)]
pub struct WardsQuery {
    #[serde(default)]
    pub district_code: String,
}

/// Districts of the chosen province (HTMX).
#[instrument(skip(state))]
pub async fn district_options(
    State(state): State<AppState>,
    Query(query): Query<DistrictsQuery>,
) -> LocationOptionsTemplate {
    let code = query.province_code.trim();
    let (placeholder, options) = if code.is_empty() {
        ("Chọn quận/huyện", Vec::new())
    } else {
        match state.backend().districts(code).await {
            Ok(list) => ("Chọn quận/huyện", options(&list, "")),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load districts");
                ("Không thể tải danh sách quận/huyện", Vec::new())
            }
        }
    };

    LocationOptionsTemplate {
        placeholder: placeholder.to_string(),
        options,
        reset_wards: true,
    }
}

/// Wards of the chosen district (HTMX).
#[instrument(skip(state))]
pub async fn ward_options(
    State(state): State<AppState>,
    Query(query): Query<WardsQuery>,
) -> LocationOptionsTemplate {
    let code = query.district_code.trim();
    let (placeholder, options) = if code.is_empty() {
        ("Chọn phường/xã", Vec::new())
    } else {
        match state.backend().wards(code).await {
            Ok(list) => ("Chọn phường/xã", options(&list, "")),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load wards");
                ("Không thể tải danh sách phường/xã", Vec::new())
            }
        }
    };

    LocationOptionsTemplate {
        placeholder: placeholder.to_string(),
        options,
        reset_wards: false,
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order line display data.
#[derive(Clone)]
pub struct OrderLineView {
    pub product_name: String,
    pub image_url: String,
    pub size: Option<String>,
    pub quantity: u32,
    pub unit_price: Price,
    pub note: Option<String>,
    pub line_total: Price,
}

/// Order display data.
#[derive(Clone)]
pub struct OrderView {
    pub id: OrderId,
    pub status_label: String,
    pub status_class: &'static str,
    pub created_at: String,
    pub lines: Vec<OrderLineView>,
    pub total: Price,
}

impl OrderView {
    #[must_use]
    pub fn new(order: &MyOrder, images: &ImageResolver) -> Self {
        let lines = order
            .order_details
            .iter()
            .map(|detail| {
                let product = detail.variant.product.as_ref();
                OrderLineView {
                    product_name: product
                        .and_then(|p| p.product_name.clone())
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_PRODUCT_NAME.to_string()),
                    image_url: images.url(
                        product
                            .and_then(|p| p.images.first())
                            .map_or("", String::as_str),
                    ),
                    size: detail.variant.size.clone(),
                    quantity: detail.quantity,
                    unit_price: detail.unit_price,
                    note: detail
                        .note
                        .clone()
                        .filter(|n| !n.trim().is_empty()),
                    line_total: detail.line_total(),
                }
            })
            .collect();

        Self {
            id: order.id,
            status_label: order.status.label().to_string(),
            status_class: order.status.badge_class(),
            created_at: order.created_at.clone(),
            lines,
            total: order.computed_total(),
        }
    }
}

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct OrdersTemplate {
    pub orders: Vec<OrderView>,
    pub error: Option<String>,
}

/// Display order history.
#[instrument(skip(state, session, user))]
pub async fn orders(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Response {
    match state.backend().my_orders(&user.access_token).await {
        Ok(orders) => {
            let images = state.b2().image_resolver().await;
            OrdersTemplate {
                orders: orders.iter().map(|o| OrderView::new(o, &images)).collect(),
                error: None,
            }
            .into_response()
        }
        Err(e) if e.is_unauthorized() => expire_session(&session).await,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load orders");
            OrdersTemplate {
                orders: Vec::new(),
                error: Some(e.user_message(ORDERS_LOAD_ERROR)),
            }
            .into_response()
        }
    }
}
