//! Portal Configuration
//!
//! Everything is read from the environment (after `.env` is loaded by `main`).
//! Missing values fall back to defaults with a warning, so a bare `cargo run`
//! still boots against a local API.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

pub const DEFAULT_BLOB_CONTAINER_URL: &str =
    "https://deratorportal.blob.core.windows.net/zakaznici-soubory/";
pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1/";
pub const DEFAULT_INVOICE_API_URL: &str = "https://api.vyfakturuj.cz/2.0/";

/// Basic-auth pair for the invoicing API. Never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceCredentials {
    pub email: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub port: u16,
    /// Base URL of the portal REST API, always ending with `/`
    pub api_base_url: String,
    /// Static bearer token attached to every portal API call
    pub api_access_key: String,
    /// Prefix stripped from stored document URLs to get a blob name
    pub blob_container_url: String,
    pub identity_base_url: String,
    pub identity_api_key: String,
    pub invoice_api_url: String,
    pub invoice_credentials: Option<InvoiceCredentials>,
    pub session_ttl: Duration,
    pub upstream_timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            api_base_url: "http://localhost:7071/api/".to_string(),
            api_access_key: String::new(),
            blob_container_url: DEFAULT_BLOB_CONTAINER_URL.to_string(),
            identity_base_url: DEFAULT_IDENTITY_URL.to_string(),
            identity_api_key: String::new(),
            invoice_api_url: DEFAULT_INVOICE_API_URL.to_string(),
            invoice_credentials: None,
            session_ttl: Duration::from_secs(3600),
            upstream_timeout: Duration::from_secs(20),
        }
    }
}

impl PortalConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let invoice_credentials = match (optional("INVOICE_API_EMAIL"), optional("INVOICE_API_KEY")) {
            (Some(email), Some(api_key)) => Some(InvoiceCredentials { email, api_key }),
            _ => {
                warn!("INVOICE_API_EMAIL / INVOICE_API_KEY not set, invoices will be unavailable");
                None
            }
        };

        Self {
            port: parse_or("PORTAL_PORT", defaults.port),
            api_base_url: with_trailing_slash(string_or("API_BASE_URL", &defaults.api_base_url)),
            api_access_key: secret("API_ACCESS_KEY"),
            blob_container_url: with_trailing_slash(string_or(
                "BLOB_CONTAINER_URL",
                &defaults.blob_container_url,
            )),
            identity_base_url: with_trailing_slash(string_or(
                "IDENTITY_BASE_URL",
                &defaults.identity_base_url,
            )),
            identity_api_key: secret("FIREBASE_API_KEY"),
            invoice_api_url: with_trailing_slash(string_or(
                "INVOICE_API_URL",
                &defaults.invoice_api_url,
            )),
            invoice_credentials,
            session_ttl: Duration::from_secs(parse_or(
                "SESSION_TTL_SECS",
                defaults.session_ttl.as_secs(),
            )),
            upstream_timeout: Duration::from_secs(parse_or(
                "UPSTREAM_TIMEOUT_SECS",
                defaults.upstream_timeout.as_secs(),
            )),
        }
    }
}

/// OTLP collector endpoint. Read on its own, before `from_env`, because the
/// subscriber it selects must exist before config warnings are logged.
pub fn otlp_endpoint() -> Option<String> {
    optional("OTEL_EXPORTER_OTLP_ENDPOINT")
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn string_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn secret(key: &str) -> String {
    optional(key).unwrap_or_else(|| {
        warn!("{key} not set, upstream calls will likely be rejected");
        String::new()
    })
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match optional(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default: {default}");
            default
        }),
    }
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}
