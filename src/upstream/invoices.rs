//! Invoicing API client
//!
//! Invoices live in a third-party service. The Basic-auth credentials come from
//! server configuration only; the browser sees nothing but the invoice rows.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::records::Invoice;
use crate::config::{InvoiceCredentials, PortalConfig};
use crate::utils::truncate::snippet;

/// Newest invoices listed per customer.
pub const INVOICE_ROWS_LIMIT: u32 = 5;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invoice API credentials are not configured")]
    MissingCredentials,

    #[error(transparent)]
    Request(#[from] anyhow::Error),
}

#[async_trait]
pub trait InvoiceSource: Send + Sync {
    /// Most recent invoices issued to the given legal id (IČ), newest first.
    async fn recent(&self, legal_id: &str) -> Result<Vec<Invoice>, InvoiceError>;
}

pub struct InvoicingClient {
    client: Client,
    base_url: String,
    credentials: Option<InvoiceCredentials>,
}

impl InvoicingClient {
    pub fn new(config: &PortalConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .context("Failed to build invoicing client")?;

        Ok(Self {
            client,
            base_url: config.invoice_api_url.clone(),
            credentials: config.invoice_credentials.clone(),
        })
    }
}

#[async_trait]
impl InvoiceSource for InvoicingClient {
    async fn recent(&self, legal_id: &str) -> Result<Vec<Invoice>, InvoiceError> {
        let credentials = self.credentials.as_ref().ok_or(InvoiceError::MissingCredentials)?;
        debug!("Fetching invoices for IC {}", legal_id);

        let limit = INVOICE_ROWS_LIMIT.to_string();
        let response = self
            .client
            .get(format!("{}invoice/", self.base_url))
            .basic_auth(&credentials.email, Some(&credentials.api_key))
            .header(reqwest::header::ACCEPT, "*/*")
            .query(&[
                ("q", legal_id),
                ("rows_limit", limit.as_str()),
                ("sort", "date_created~desc"),
            ])
            .send()
            .await
            .context("Failed to reach invoicing API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Invoicing API returned {}: {}",
                status,
                snippet(&body, 256)
            )
            .into());
        }

        let invoices = response
            .json::<Vec<Invoice>>()
            .await
            .context("Failed to decode invoices")?;
        Ok(invoices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials_fail_before_any_request() {
        let client = InvoicingClient::new(&PortalConfig::default()).unwrap();
        let err = client.recent("12345678").await.unwrap_err();
        assert!(matches!(err, InvoiceError::MissingCredentials));
    }
}
