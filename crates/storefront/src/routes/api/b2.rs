//! Backblaze B2 token API routes.
//!
//! Browsers that render product images themselves ask for a download token
//! or a signed URL here; the application key never leaves the server.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::b2::B2Error;
use crate::state::AppState;

/// Error response for the B2 endpoints.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip)]
    code: StatusCode,
}

impl ApiError {
    fn new(code: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: None,
            code,
        }
    }
}

impl From<B2Error> for ApiError {
    fn from(err: B2Error) -> Self {
        match err {
            B2Error::NotConfigured => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "B2 credentials are not configured",
            ),
            B2Error::Authorize { status, message } | B2Error::Api { status, message } => Self {
                error: message,
                status: Some(status),
                code: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            },
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.code.is_server_error() {
            tracing::error!(error = %self.error, status = self.code.as_u16(), "B2 API error");
        }
        (self.code, Json(self)).into_response()
    }
}

/// Response of `GET /api/b2/token`.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Response of `GET /api/b2/image`.
#[derive(Debug, Serialize)]
pub struct ImageUrlResponse {
    pub url: String,
}

/// Query of `GET /api/b2/image`.
#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
}

/// Download token for the product image prefix.
///
/// GET /api/b2/token
///
/// # Errors
///
/// Returns `ApiError` when B2 is not configured or rejects the request.
#[instrument(skip(state))]
pub async fn token(State(state): State<AppState>) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.b2().prefix_token().await?;
    Ok(Json(TokenResponse { token }))
}

/// Signed download URL for a single file.
///
/// GET /api/b2/image?fileName=
///
/// # Errors
///
/// Returns `ApiError` when `fileName` is missing or B2 fails.
#[instrument(skip(state))]
pub async fn image_url(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Json<ImageUrlResponse>, ApiError> {
    let file_name = query
        .file_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "fileName is required"))?;

    let url = state.b2().signed_file_url(file_name).await?;
    Ok(Json(ImageUrlResponse { url }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_configured_is_server_error() {
        let err = ApiError::from(B2Error::NotConfigured);
        assert_eq!(err.code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.status, None);
    }

    #[test]
    fn test_upstream_status_is_forwarded() {
        let err = ApiError::from(B2Error::Api {
            status: 401,
            message: "bad_auth_token".to_string(),
        });
        assert_eq!(err.code, StatusCode::UNAUTHORIZED);
        assert_eq!(err.status, Some(401));
        assert_eq!(err.error, "bad_auth_token");
    }

    #[test]
    fn test_error_body_shape() {
        let err = ApiError::from(B2Error::Authorize {
            status: 403,
            message: "B2 API error: 403".to_string(),
        });
        let body = serde_json::to_value(&err).unwrap_or_default();
        assert_eq!(body["error"], "B2 API error: 403");
        assert_eq!(body["status"], 403);
    }
}
