//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for the session
//!   store (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `BACKEND_API_URL` - Shop backend REST API (default: `http://localhost:8386/api/v1`)
//! - `CONTACT_API_URL` - Contact form API (default: `http://localhost:3001/api`)
//! - `B2_KEY_ID` - Backblaze B2 application key id
//! - `B2_APPLICATION_KEY` - Backblaze B2 application key
//! - `B2_BUCKET_ID` - Bucket holding product images
//! - `B2_FILE_PREFIX` - Prefix of product image names (default: `test-uploads/`)
//! - `B2_API_URL` - B2 API host (default: `https://api.backblazeb2.com`)
//! - `B2_DOWNLOAD_URL` - Public download base for the bucket
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_BACKEND_API_URL: &str = "http://localhost:8386/api/v1";
const DEFAULT_CONTACT_API_URL: &str = "http://localhost:3001/api";
const DEFAULT_B2_BUCKET_ID: &str = "c02c3c8e5734dae39dad0814";
const DEFAULT_B2_FILE_PREFIX: &str = "test-uploads/";
const DEFAULT_B2_API_URL: &str = "https://api.backblazeb2.com";
const DEFAULT_B2_DOWNLOAD_URL: &str = "https://f005.backblazeb2.com/file/Phuphiem";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Shop backend and contact API endpoints
    pub backend: BackendConfig,
    /// Backblaze B2 image storage
    pub b2: B2Config,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors reported to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of requests traced in Sentry
    pub sentry_traces_sample_rate: f32,
}

/// Upstream REST APIs.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the shop backend, without trailing slash
    pub api_url: String,
    /// Base URL of the contact form service, without trailing slash
    pub contact_api_url: String,
}

/// Backblaze B2 configuration.
///
/// Implements `Debug` manually to redact the application key.
#[derive(Clone)]
pub struct B2Config {
    /// Application key id (`None` leaves the B2 endpoints unconfigured)
    pub key_id: Option<String>,
    /// Application key
    pub application_key: Option<SecretString>,
    /// Bucket holding product images
    pub bucket_id: String,
    /// Prefix every product image name lives under
    pub file_prefix: String,
    /// Host of the account authorization endpoint
    pub api_url: String,
    /// Public download base for the bucket
    pub download_url: String,
}

impl std::fmt::Debug for B2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("B2Config")
            .field("key_id", &self.key_id)
            .field(
                "application_key",
                &self.application_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("bucket_id", &self.bucket_id)
            .field("file_prefix", &self.file_prefix)
            .field("api_url", &self.api_url)
            .field("download_url", &self.download_url)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the B2 key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = trim_url(get_required_env("STOREFRONT_BASE_URL")?);

        let backend = BackendConfig::from_env();
        let b2 = B2Config::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            backend,
            b2,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: get_rate("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl BackendConfig {
    fn from_env() -> Self {
        Self {
            api_url: trim_url(get_env_or_default("BACKEND_API_URL", DEFAULT_BACKEND_API_URL)),
            contact_api_url: trim_url(get_env_or_default(
                "CONTACT_API_URL",
                DEFAULT_CONTACT_API_URL,
            )),
        }
    }
}

impl B2Config {
    fn from_env() -> Result<Self, ConfigError> {
        let application_key = match get_optional_env("B2_APPLICATION_KEY") {
            Some(key) => {
                validate_secret_strength(&key, "B2_APPLICATION_KEY")?;
                Some(SecretString::from(key))
            }
            None => None,
        };

        Ok(Self {
            key_id: get_optional_env("B2_KEY_ID"),
            application_key,
            bucket_id: get_env_or_default("B2_BUCKET_ID", DEFAULT_B2_BUCKET_ID),
            file_prefix: get_env_or_default("B2_FILE_PREFIX", DEFAULT_B2_FILE_PREFIX),
            api_url: trim_url(get_env_or_default("B2_API_URL", DEFAULT_B2_API_URL)),
            download_url: trim_url(get_env_or_default("B2_DOWNLOAD_URL", DEFAULT_B2_DOWNLOAD_URL)),
        })
    }

    /// Key id and application key, when both are set.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.key_id, &self.application_key) {
            (Some(id), Some(key)) => Some((id.as_str(), key.expose_secret())),
            _ => None,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse a sample rate in `0.0..=1.0`.
fn get_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate = raw
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be between 0.0 and 1.0".to_string(),
        ))
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn b2_config(key: Option<&str>) -> B2Config {
        B2Config {
            key_id: Some("005key".to_string()),
            application_key: key.map(SecretString::from),
            bucket_id: DEFAULT_B2_BUCKET_ID.to_string(),
            file_prefix: DEFAULT_B2_FILE_PREFIX.to_string(),
            api_url: DEFAULT_B2_API_URL.to_string(),
            download_url: DEFAULT_B2_DOWNLOAD_URL.to_string(),
        }
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("K005aB3xY9mK2nL5pQ7rT0uW4zC6") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(matches!(
            validate_secret_strength("your-b2-key-here", "B2_APPLICATION_KEY"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaa", "B2_APPLICATION_KEY").is_err());
        assert!(
            validate_secret_strength("K005aB3xY9mK2nL5pQ7rT0uW4zC6", "B2_APPLICATION_KEY").is_ok()
        );
    }

    #[test]
    fn test_trim_url() {
        assert_eq!(
            trim_url("http://localhost:8386/api/v1/".to_string()),
            "http://localhost:8386/api/v1"
        );
    }

    #[test]
    fn test_b2_credentials_need_both_parts() {
        assert!(b2_config(None).credentials().is_none());
        let config = b2_config(Some("K005secretvalue"));
        assert_eq!(config.credentials(), Some(("005key", "K005secretvalue")));
    }

    #[test]
    fn test_b2_config_debug_redacts_key() {
        let debug_output = format!("{:?}", b2_config(Some("K005supersecretkey")));
        assert!(debug_output.contains("005key"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("K005supersecretkey"));
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "https://phuphiem.vn".to_string(),
            backend: BackendConfig {
                api_url: DEFAULT_BACKEND_API_URL.to_string(),
                contact_api_url: DEFAULT_CONTACT_API_URL.to_string(),
            },
            b2: b2_config(None),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(config.is_secure());
    }
}
