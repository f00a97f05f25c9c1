//! Backblaze B2 download authorization.
//!
//! Product images live in a private B2 bucket. The storefront holds the
//! application key, exchanges it for an account token (valid 24 hours, cached
//! 23) and uses that to mint download tokens for a file name prefix (valid one
//! hour, cached 50 minutes). Browsers only ever see download tokens.
//!
//! Concurrent cache misses for the same key share a single upstream call.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::B2Config;

/// Where images without a usable URL point.
pub const PLACEHOLDER_IMAGE: &str = "/static/img/placeholder.svg";

const ACCOUNT_TOKEN_TTL: Duration = Duration::from_secs(23 * 60 * 60);
const DOWNLOAD_TOKEN_TTL: Duration = Duration::from_secs(50 * 60);
const DOWNLOAD_TOKEN_VALIDITY_SECS: u32 = 3600;

/// Errors that can occur when talking to B2.
///
/// `Clone` so a failed shared load can be handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum B2Error {
    /// `B2_KEY_ID` or `B2_APPLICATION_KEY` is not set.
    #[error("B2_KEY_ID and B2_APPLICATION_KEY are required")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// `b2_authorize_account` rejected the credentials.
    #[error("B2 authorization failed: {message}")]
    Authorize { status: u16, message: String },

    /// `b2_get_download_authorization` returned an error.
    #[error("B2 API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for B2Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountAuthorization {
    authorization_token: String,
    api_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadAuthorization {
    authorization_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DownloadAuthorizationRequest<'a> {
    bucket_id: &'a str,
    file_name_prefix: &'a str,
    valid_duration_in_seconds: u32,
}

/// B2 error body: `{"code": "...", "message": "...", "status": 401}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

// =============================================================================
// B2Client
// =============================================================================

/// Client that mints and caches B2 download tokens.
#[derive(Clone)]
pub struct B2Client {
    inner: Arc<B2ClientInner>,
}

struct B2ClientInner {
    client: reqwest::Client,
    config: B2Config,
    account: Cache<(), AccountAuthorization>,
    downloads: Cache<String, String>,
}

impl B2Client {
    /// Create a new B2 client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &B2Config) -> Result<Self, B2Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            inner: Arc::new(B2ClientInner {
                client,
                config: config.clone(),
                account: Cache::builder()
                    .max_capacity(1)
                    .time_to_live(ACCOUNT_TOKEN_TTL)
                    .build(),
                downloads: Cache::builder()
                    .max_capacity(10_000)
                    .time_to_live(DOWNLOAD_TOKEN_TTL)
                    .build(),
            }),
        })
    }

    /// Whether credentials are configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.config.credentials().is_some()
    }

    /// Download token for the configured product image prefix.
    ///
    /// # Errors
    ///
    /// See [`Self::download_token`].
    pub async fn prefix_token(&self) -> Result<String, B2Error> {
        self.download_token(&self.inner.config.file_prefix).await
    }

    /// Download token valid for every file whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// [`B2Error::NotConfigured`] without credentials, otherwise whatever B2
    /// answered.
    #[instrument(skip(self))]
    pub async fn download_token(&self, prefix: &str) -> Result<String, B2Error> {
        if !self.is_configured() {
            return Err(B2Error::NotConfigured);
        }

        self.inner
            .downloads
            .try_get_with(prefix.to_string(), self.fetch_download_token(prefix))
            .await
            .map_err(|e| (*e).clone())
    }

    /// Signed URL for a single file, as served by `GET /api/b2/image`.
    ///
    /// # Errors
    ///
    /// See [`Self::download_token`].
    pub async fn signed_file_url(&self, file_name: &str) -> Result<String, B2Error> {
        let token = self.download_token(file_name).await?;
        Ok(format!(
            "{}/{file_name}?Authorization={token}",
            self.inner.config.download_url
        ))
    }

    /// Resolver for product image URLs, using the prefix token when it can be
    /// obtained. Without one every image resolves to the placeholder.
    pub async fn image_resolver(&self) -> ImageResolver {
        let token = if self.is_configured() {
            match self.prefix_token().await {
                Ok(token) => Some(token),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not obtain B2 download token");
                    None
                }
            }
        } else {
            None
        };

        ImageResolver {
            download_url: self.inner.config.download_url.clone(),
            file_prefix: self.inner.config.file_prefix.clone(),
            token,
        }
    }

    async fn account_authorization(&self) -> Result<AccountAuthorization, B2Error> {
        self.inner
            .account
            .try_get_with((), self.fetch_account_authorization())
            .await
            .map_err(|e| (*e).clone())
    }

    async fn fetch_account_authorization(&self) -> Result<AccountAuthorization, B2Error> {
        let (key_id, application_key) = self
            .inner
            .config
            .credentials()
            .ok_or(B2Error::NotConfigured)?;

        debug!("Authorizing B2 account");
        let url = format!(
            "{}/b2api/v2/b2_authorize_account",
            self.inner.config.api_url
        );
        let response = self
            .inner
            .client
            .get(url)
            .basic_auth(key_id, Some(application_key))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(B2Error::Authorize {
                status: status.as_u16(),
                message: error_message(
                    &body,
                    "Failed to authorize B2 account",
                    "B2 authorization error",
                ),
            });
        }

        serde_json::from_str(&body).map_err(|e| B2Error::Parse(e.to_string()))
    }

    async fn fetch_download_token(&self, prefix: &str) -> Result<String, B2Error> {
        let account = self.account_authorization().await?;

        debug!(prefix, "Requesting B2 download authorization");
        let url = format!(
            "{}/b2api/v2/b2_get_download_authorization",
            account.api_url
        );
        let response = self
            .inner
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, &account.authorization_token)
            .json(&DownloadAuthorizationRequest {
                bucket_id: &self.inner.config.bucket_id,
                file_name_prefix: prefix,
                valid_duration_in_seconds: DOWNLOAD_TOKEN_VALIDITY_SECS,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %body.chars().take(300).collect::<String>(),
                "B2 API error"
            );
            return Err(B2Error::Api {
                status: status.as_u16(),
                message: error_message(&body, "Failed to get B2 authorization", "B2 API error"),
            });
        }

        let auth: DownloadAuthorization =
            serde_json::from_str(&body).map_err(|e| B2Error::Parse(e.to_string()))?;
        Ok(auth.authorization_token)
    }
}

/// Message for a failed B2 call: B2's `message`, else `"<code_label>: <code>"`,
/// else the raw body, else `fallback`.
fn error_message(body: &str, fallback: &str, code_label: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) if !message.is_empty() => message,
        Ok(ErrorBody {
            code: Some(code), ..
        }) if !code.is_empty() => format!("{code_label}: {code}"),
        Ok(_) => fallback.to_string(),
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => fallback.to_string(),
    }
}

// =============================================================================
// Image URLs
// =============================================================================

/// Turns stored image names into browser URLs.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    download_url: String,
    file_prefix: String,
    token: Option<String>,
}

impl ImageResolver {
    /// Resolver that has no token and yields placeholders.
    #[must_use]
    pub fn placeholder_only() -> Self {
        Self {
            download_url: String::new(),
            file_prefix: String::new(),
            token: None,
        }
    }

    /// URL for an image name stored on a product.
    #[must_use]
    pub fn url(&self, file_name: &str) -> String {
        build_image_url(
            &self.download_url,
            &self.file_prefix,
            file_name,
            self.token.as_deref(),
        )
    }
}

/// Build a signed download URL for a stored image name.
///
/// Empty names or a missing token give the placeholder. Absolute URLs are
/// returned unchanged. Names without `file_prefix` get it prepended.
#[must_use]
pub fn build_image_url(
    download_url: &str,
    file_prefix: &str,
    file_name: &str,
    token: Option<&str>,
) -> String {
    let file_name = file_name.trim();
    if file_name.starts_with("http://") || file_name.starts_with("https://") {
        return file_name.to_string();
    }

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return PLACEHOLDER_IMAGE.to_string();
    };
    if file_name.is_empty() {
        return PLACEHOLDER_IMAGE.to_string();
    }

    let path = if file_name.starts_with(file_prefix) {
        file_name.to_string()
    } else {
        format!("{file_prefix}{file_name}")
    };

    format!("{download_url}/{path}?Authorization={token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOWNLOAD: &str = "https://f005.backblazeb2.com/file/Phuphiem";

    #[test]
    fn test_build_image_url_prepends_prefix() {
        assert_eq!(
            build_image_url(DOWNLOAD, "test-uploads/", "1764668600636-logo.png", Some("tok")),
            "https://f005.backblazeb2.com/file/Phuphiem/test-uploads/1764668600636-logo.png?Authorization=tok"
        );
        assert_eq!(
            build_image_url(DOWNLOAD, "test-uploads/", "test-uploads/a.png", Some("tok")),
            "https://f005.backblazeb2.com/file/Phuphiem/test-uploads/a.png?Authorization=tok"
        );
    }

    #[test]
    fn test_build_image_url_placeholder() {
        assert_eq!(
            build_image_url(DOWNLOAD, "test-uploads/", "", Some("tok")),
            PLACEHOLDER_IMAGE
        );
        assert_eq!(
            build_image_url(DOWNLOAD, "test-uploads/", "a.png", None),
            PLACEHOLDER_IMAGE
        );
    }

    #[test]
    fn test_build_image_url_full_url_passthrough() {
        assert_eq!(
            build_image_url(DOWNLOAD, "test-uploads/", "https://cdn.example.com/a.png", None),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(
                r#"{"code":"unauthorized","message":"bad key","status":401}"#,
                "x",
                "B2 API error"
            ),
            "bad key"
        );
        assert_eq!(
            error_message(r#"{"code":"bad_request","status":400}"#, "x", "B2 API error"),
            "B2 API error: bad_request"
        );
        assert_eq!(error_message("oops", "x", "B2 API error"), "oops");
        assert_eq!(error_message("", "fallback", "B2 API error"), "fallback");
    }
}
