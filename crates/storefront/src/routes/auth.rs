//! Authentication route handlers.
//!
//! Password login and registration go through the backend's auth API. OAuth
//! logins finish at `/auth/callback`, where the backend hands over a bearer
//! token (and usually the user) in the query string.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use phuphiem_core::validation::{self, ValidationError};

use crate::backend::{AuthUser, BackendError, LoginSession, RegisterRequest};
use crate::error::{AppError, SESSION_EXPIRED_REDIRECT, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{OptionalAuth, set_current_user};
use crate::models::CurrentUser;
use crate::services::cart_sync;
use crate::state::AppState;

const LOGIN_FAILED: &str = "Đăng nhập thất bại. Vui lòng kiểm tra lại thông tin.";
const REGISTER_FAILED: &str = "Đăng ký thất bại. Vui lòng thử lại.";
const CALLBACK_MISSING_TOKEN: &str = "Không tìm thấy token đăng nhập.";
const CALLBACK_FAILED: &str = "Có lỗi xảy ra khi xử lý đăng nhập.";

/// Seconds before the callback error page sends the visitor to login.
pub const CALLBACK_ERROR_REFRESH_SECONDS: u32 = 2;

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub form: RegisterForm,
    pub errors: Vec<String>,
}

/// OAuth callback failure page; refreshes to the login page.
#[derive(Template, WebTemplate)]
#[template(path = "auth/callback_error.html")]
pub struct CallbackErrorTemplate {
    pub message: String,
    pub refresh_seconds: u32,
}

/// Header user menu fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/user_menu.html")]
pub struct UserMenuTemplate {
    pub user: Option<CurrentUser>,
}

// =============================================================================
// Forms
// =============================================================================

/// Query parameters shown on the login page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginPageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

impl LoginPageQuery {
    fn error_message(&self) -> Option<String> {
        match self.error.as_deref()? {
            "session_expired" => {
                Some("Phiên đăng nhập đã hết hạn. Vui lòng đăng nhập lại.".to_string())
            }
            _ => Some(LOGIN_FAILED.to_string()),
        }
    }

    fn notice(&self) -> Option<String> {
        match self.success.as_deref()? {
            "registered" => Some("Đăng ký thành công! Vui lòng đăng nhập.".to_string()),
            _ => None,
        }
    }
}

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl RegisterForm {
    /// Validate every field, collecting all problems.
    pub fn validate(&self) -> Result<RegisterRequest, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let full_name = validation::required(&self.full_name, "họ và tên")
            .map_err(|e| errors.push(e))
            .ok();
        let email = validation::email(&self.email)
            .map_err(|e| errors.push(e))
            .ok();
        let phone = validation::phone(&self.phone_number)
            .map_err(|e| errors.push(e))
            .ok();
        if let Err(e) = validation::password(&self.password) {
            errors.push(e);
        }
        if let Err(e) = validation::password_confirmation(&self.password, &self.confirm_password)
        {
            errors.push(e);
        }

        match (full_name, email, phone) {
            (Some(full_name), Some(email), Some(phone_number)) if errors.is_empty() => {
                Ok(RegisterRequest {
                    full_name: full_name.to_string(),
                    email: email.to_string(),
                    password: self.password.clone(),
                    phone_number,
                })
            }
            _ => Err(errors),
        }
    }

    /// Copy without the passwords, for re-rendering the form.
    fn without_passwords(self) -> Self {
        Self {
            password: String::new(),
            confirm_password: String::new(),
            ..self
        }
    }
}

/// OAuth callback query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub token: Option<String>,
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
    pub user: Option<String>,
}

impl CallbackQuery {
    /// `token` wins over `accessToken`; blanks count as missing.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        [self.token.as_deref(), self.access_token.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|t| !t.is_empty())
    }

    /// The user JSON, tolerating one extra layer of percent-encoding.
    #[must_use]
    pub fn user(&self) -> Option<AuthUser> {
        let raw = self.user.as_deref()?.trim();
        serde_json::from_str(raw).ok().or_else(|| {
            let decoded = urlencoding::decode(raw).ok()?;
            serde_json::from_str(&decoded).ok()
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display login page.
pub async fn login_page(Query(query): Query<LoginPageQuery>) -> impl IntoResponse {
    LoginTemplate {
        email: String::new(),
        error: query.error_message(),
        notice: query.notice(),
    }
}

/// Handle password login.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let failed = |email: String, message: String| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            LoginTemplate {
                email,
                error: Some(message),
                notice: None,
            },
        )
            .into_response()
    };

    let email = match validation::email(&form.email) {
        Ok(email) => email,
        Err(e) => return Ok(failed(form.email.trim().to_string(), e.to_string())),
    };
    if let Err(e) = validation::required(&form.password, "mật khẩu") {
        return Ok(failed(email.to_string(), e.to_string()));
    }

    let login = match state.backend().login(email.as_str(), &form.password).await {
        Ok(login) => login,
        Err(e) => {
            tracing::warn!(error = %e, "Login rejected");
            return Ok(failed(email.to_string(), e.user_message(LOGIN_FAILED)));
        }
    };

    match establish_session(&state, &session, login).await {
        Ok(()) => Ok(Redirect::to("/").into_response()),
        Err(EstablishError::Session(e)) => Err(e.into()),
        Err(EstablishError::Backend(e)) => {
            tracing::warn!(error = %e, "Could not load profile after login");
            Ok(failed(email.to_string(), e.user_message(LOGIN_FAILED)))
        }
    }
}

/// Display registration page.
pub async fn register_page() -> impl IntoResponse {
    RegisterTemplate {
        form: RegisterForm::default(),
        errors: Vec::new(),
    }
}

/// Handle registration.
#[instrument(skip(state, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Response {
    let request = match form.validate() {
        Ok(request) => request,
        Err(errors) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                RegisterTemplate {
                    form: form.without_passwords(),
                    errors: errors.iter().map(ToString::to_string).collect(),
                },
            )
                .into_response();
        }
    };

    match state.backend().register(&request).await {
        Ok(()) => {
            tracing::info!("Account registered");
            Redirect::to("/auth/login?success=registered").into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Registration rejected");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                RegisterTemplate {
                    form: form.without_passwords(),
                    errors: vec![e.user_message(REGISTER_FAILED)],
                },
            )
                .into_response()
        }
    }
}

/// Finish an OAuth login.
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let Some(token) = query.bearer() else {
        return Ok(callback_error(CALLBACK_MISSING_TOKEN));
    };

    let login = LoginSession {
        token: token.to_string(),
        user: query.user(),
    };

    match establish_session(&state, &session, login).await {
        Ok(()) => Ok(Redirect::to("/").into_response()),
        Err(EstablishError::Session(e)) => Err(e.into()),
        Err(EstablishError::Backend(e)) => {
            tracing::warn!(error = %e, "OAuth callback could not load the user");
            Ok(callback_error(CALLBACK_FAILED))
        }
    }
}

/// Log out: forget the customer, their cart and the synced quantities.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Redirect, AppError> {
    session.flush().await?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}

/// Header user menu (HTMX).
pub async fn menu(OptionalAuth(user): OptionalAuth) -> impl IntoResponse {
    UserMenuTemplate { user }
}

// =============================================================================
// Helpers
// =============================================================================

enum EstablishError {
    Backend(BackendError),
    Session(tower_sessions::session::Error),
}

/// Store the customer in the session and reconcile their cart.
///
/// When the login response carried no user, the profile is fetched.
async fn establish_session(
    state: &AppState,
    session: &Session,
    login: LoginSession,
) -> Result<(), EstablishError> {
    let user = match login.user {
        Some(user) => user,
        None => state
            .backend()
            .current_user(&login.token)
            .await
            .map_err(EstablishError::Backend)?
            .to_auth_user(),
    };

    let current = CurrentUser::new(user, login.token);
    set_current_user(session, &current)
        .await
        .map_err(EstablishError::Session)?;
    set_sentry_user(&current.id, Some(&current.email));
    tracing::info!(user_id = %current.id, "Customer logged in");

    cart_sync::synchronize(state.backend(), session, &current.access_token)
        .await
        .map_err(EstablishError::Session)?;
    Ok(())
}

fn callback_error(message: &str) -> Response {
    CallbackErrorTemplate {
        message: message.to_string(),
        refresh_seconds: CALLBACK_ERROR_REFRESH_SECONDS,
    }
    .into_response()
}

/// Drop the session after the backend rejected the stored token and send
/// the visitor to the login page.
pub async fn expire_session(session: &Session) -> Response {
    if let Err(e) = session.flush().await {
        tracing::error!(error = %e, "Failed to flush expired session");
    }
    clear_sentry_user();
    Redirect::to(SESSION_EXPIRED_REDIRECT).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_form() -> RegisterForm {
        RegisterForm {
            full_name: "Nguyễn Thị Lan".to_string(),
            email: "lan@example.vn".to_string(),
            phone_number: "0356 999 440".to_string(),
            password: "len2024xinh".to_string(),
            confirm_password: "len2024xinh".to_string(),
        }
    }

    #[test]
    fn test_register_form_valid() {
        let request = valid_form().validate().unwrap();
        assert_eq!(request.full_name, "Nguyễn Thị Lan");
        assert_eq!(request.phone_number, "0356999440");
    }

    #[test]
    fn test_register_form_collects_every_error() {
        let form = RegisterForm {
            full_name: String::new(),
            email: "lan".to_string(),
            phone_number: "12345".to_string(),
            password: "short".to_string(),
            confirm_password: "other".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.len() >= 5);
        assert!(errors.contains(&ValidationError::PasswordMismatch));
    }

    #[test]
    fn test_register_form_rejects_mismatch_only() {
        let form = RegisterForm {
            confirm_password: "khac2024".to_string(),
            ..valid_form()
        };
        assert_eq!(
            form.validate().unwrap_err(),
            vec![ValidationError::PasswordMismatch]
        );
    }

    #[test]
    fn test_callback_token_precedence() {
        let query = CallbackQuery {
            token: Some(" ".to_string()),
            access_token: Some("abc".to_string()),
            user: None,
        };
        assert_eq!(query.bearer(), Some("abc"));

        let query = CallbackQuery {
            token: Some("first".to_string()),
            access_token: Some("second".to_string()),
            user: None,
        };
        assert_eq!(query.bearer(), Some("first"));

        assert_eq!(CallbackQuery::default().bearer(), None);
    }

    #[test]
    fn test_callback_user_parsing() {
        let json = r#"{"id":7,"fullName":"Lan","email":"lan@example.vn"}"#;
        let query = CallbackQuery {
            user: Some(json.to_string()),
            ..CallbackQuery::default()
        };
        assert_eq!(query.user().unwrap().full_name, "Lan");

        let query = CallbackQuery {
            user: Some(urlencoding::encode(json).into_owned()),
            ..CallbackQuery::default()
        };
        assert_eq!(query.user().unwrap().id.as_i64(), 7);

        let query = CallbackQuery {
            user: Some("{not json".to_string()),
            ..CallbackQuery::default()
        };
        assert!(query.user().is_none());
    }

    #[test]
    fn test_login_page_messages() {
        let query = LoginPageQuery {
            error: Some("session_expired".to_string()),
            success: Some("registered".to_string()),
        };
        assert!(query.error_message().unwrap().contains("hết hạn"));
        assert!(query.notice().unwrap().contains("Đăng ký thành công"));
        assert!(LoginPageQuery::default().error_message().is_none());
    }
}
