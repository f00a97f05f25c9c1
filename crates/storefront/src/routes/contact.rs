//! Contact form route handlers.
//!
//! Messages are forwarded to the contact API.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Form, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::instrument;

use phuphiem_core::validation;

use crate::backend::ContactRequest;
use crate::filters;
use crate::state::AppState;

const SUCCESS_MESSAGE: &str =
    "Cảm ơn bạn đã liên hệ! Chúng tôi sẽ phản hồi trong thời gian sớm nhất.";
const FAILURE_MESSAGE: &str = "Gửi tin nhắn thất bại. Vui lòng thử lại sau.";

/// Contact form data.
#[derive(Debug, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

impl ContactForm {
    /// Validate and trim the form into the API payload.
    fn to_request(&self) -> Result<ContactRequest, validation::ValidationError> {
        let name = validation::required(&self.name, "họ và tên")?;
        let email = validation::email(&self.email)?;
        let message = validation::required(&self.message, "nội dung tin nhắn")?;
        Ok(ContactRequest {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
        })
    }
}

/// Contact page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/contact.html")]
pub struct ContactTemplate {
    pub form: ContactForm,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Display the contact page.
pub async fn show() -> impl IntoResponse {
    ContactTemplate {
        form: ContactForm::default(),
        error: None,
        success: None,
    }
}

/// Submit the contact form.
#[instrument(skip(state, form))]
pub async fn submit(
    State(state): State<AppState>,
    Form(form): Form<ContactForm>,
) -> impl IntoResponse {
    let request = match form.to_request() {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                ContactTemplate {
                    form,
                    error: Some(e.to_string()),
                    success: None,
                },
            );
        }
    };

    match state.backend().submit_contact(&request).await {
        Ok(()) => {
            tracing::info!("Contact message forwarded");
            (
                StatusCode::OK,
                ContactTemplate {
                    form: ContactForm::default(),
                    error: None,
                    success: Some(SUCCESS_MESSAGE.to_string()),
                },
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to forward contact message");
            (
                StatusCode::OK,
                ContactTemplate {
                    form,
                    error: Some(FAILURE_MESSAGE.to_string()),
                    success: None,
                },
            )
        }
    }
}
