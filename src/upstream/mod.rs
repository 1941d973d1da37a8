//! Upstream Module
//!
//! Clients for the collaborators the portal fronts: the portal REST API (records,
//! blob storage operations) and the invoicing API.

pub mod invoices;
pub mod records;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::PortalConfig;
use crate::relay::BlobRef;
use crate::utils::truncate::snippet;

pub use invoices::{InvoiceError, InvoiceSource, InvoicingClient};
pub use records::{CustomerAccount, RecordId, RemediationUpdate};

/// GET endpoints that return collections keyed by a single id parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Inspections,
    Certificates,
    SafetySheets,
    Schedule,
    Maps,
    Trends,
    Checkpoints,
    CheckpointEvaluations,
    Nonconformities,
    NonconformityPhotos,
    TrendAnalysis,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Inspections => "inspections",
            Endpoint::Certificates => "certifikaty",
            Endpoint::SafetySheets => "safety-list",
            Endpoint::Schedule => "harmonogram",
            Endpoint::Maps => "mapy",
            Endpoint::Trends => "trends",
            Endpoint::Checkpoints => "checkpoints",
            Endpoint::CheckpointEvaluations => "vyhodnoceni",
            Endpoint::Nonconformities => "neshody",
            Endpoint::NonconformityPhotos => "neshody-foto",
            Endpoint::TrendAnalysis => "analyza-trendu",
        }
    }

    /// Name of the query parameter carrying the scope id.
    pub fn key_param(self) -> &'static str {
        match self {
            Endpoint::CheckpointEvaluations => "stanickaId",
            Endpoint::NonconformityPhotos => "neshodaId",
            _ => "zakaznikId",
        }
    }
}

/// What the blob download endpoint should hand back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentAccess {
    View,
    Download,
}

impl DocumentAccess {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentAccess::View => "view",
            DocumentAccess::Download => "download",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlobPayload {
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct PhotoUpload {
    /// Target blob name, e.g. `neshody/<customer>/<file>`
    pub blob_name: String,
    pub nonconformity_id: RecordId,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// The portal REST API as seen by the rest of the crate.
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// Accounts the e-mail may act for
    async fn customers(&self, email: &str) -> Result<Vec<CustomerAccount>>;

    /// Raw JSON body of a keyed GET endpoint
    async fn get_json(&self, endpoint: Endpoint, key: &str) -> Result<Value>;

    /// Short-lived signed URL for inline viewing
    async fn signed_url(&self, blob: &BlobRef) -> Result<String>;

    /// Binary content of a stored document
    async fn blob_bytes(&self, blob: &BlobRef) -> Result<BlobPayload>;

    async fn update_remediation(&self, update: &RemediationUpdate) -> Result<()>;

    /// Stores a remediation photo, returns its URL
    async fn upload_photo(&self, upload: PhotoUpload) -> Result<String>;

    async fn delete_blob(&self, blob: &BlobRef) -> Result<()>;
}

/// Decode a keyed collection into typed records.
pub async fn fetch_records<T: DeserializeOwned>(
    api: &dyn PortalApi,
    endpoint: Endpoint,
    key: &str,
) -> Result<Vec<T>> {
    let body = api.get_json(endpoint, key).await?;
    serde_json::from_value(body)
        .with_context(|| format!("Unexpected payload shape from '{}'", endpoint.path()))
}

/// reqwest-backed client for the portal REST API.
pub struct RestClient {
    client: Client,
    base_url: String,
    access_key: String,
}

impl RestClient {
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.upstream_timeout)
            .user_agent(concat!("derator-portal/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build portal API client")?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            access_key: config.api_access_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.access_key)
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<reqwest::Response> {
        debug!("Portal API call: {}", path);
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach portal API '{}'", path))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Portal API '{}' returned {}: {}", path, status, snippet(&body, 256));
        }
        Ok(response)
    }

    async fn download(&self, blob: &BlobRef, access: DocumentAccess) -> Result<reqwest::Response> {
        let request = self
            .request(Method::GET, "download")
            .query(&[("blobName", blob.as_str()), ("type", access.as_str())]);
        self.send("download", request).await
    }
}

#[async_trait]
impl PortalApi for RestClient {
    async fn customers(&self, email: &str) -> Result<Vec<CustomerAccount>> {
        let request = self.request(Method::GET, "customers").query(&[("email", email)]);
        let response = self.send("customers", request).await?;
        response.json().await.context("Failed to decode customer accounts")
    }

    async fn get_json(&self, endpoint: Endpoint, key: &str) -> Result<Value> {
        let request = self
            .request(Method::GET, endpoint.path())
            .query(&[(endpoint.key_param(), key)]);
        let response = self.send(endpoint.path(), request).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to decode '{}' response", endpoint.path()))
    }

    async fn signed_url(&self, blob: &BlobRef) -> Result<String> {
        let response = self.download(blob, DocumentAccess::View).await?;
        let body: Value = response.json().await.context("Failed to decode signed URL response")?;
        body["url"]
            .as_str()
            .map(str::to_string)
            .context("Signed URL response carried no 'url'")
    }

    async fn blob_bytes(&self, blob: &BlobRef) -> Result<BlobPayload> {
        let response = self.download(blob, DocumentAccess::Download).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.context("Failed to read document body")?;
        Ok(BlobPayload { content_type, bytes })
    }

    async fn update_remediation(&self, update: &RemediationUpdate) -> Result<()> {
        let request = self.request(Method::POST, "update-naprava-neshoda").json(update);
        self.send("update-naprava-neshoda", request).await?;
        Ok(())
    }

    async fn upload_photo(&self, upload: PhotoUpload) -> Result<String> {
        let mut part = reqwest::multipart::Part::bytes(upload.bytes.to_vec())
            .file_name(upload.file_name.clone());
        if let Some(ref content_type) = upload.content_type {
            part = part
                .mime_str(content_type)
                .context("Invalid content type for uploaded photo")?;
        }
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self
            .request(Method::POST, "upload-blob-storage")
            .query(&[
                ("blobName", upload.blob_name.as_str()),
                ("neshodaId", upload.nonconformity_id.as_str()),
            ])
            .multipart(form);
        let response = self.send("upload-blob-storage", request).await?;

        let body: Value = response.json().await.context("Failed to decode upload response")?;
        match body["url"].as_str() {
            Some(url) => Ok(url.to_string()),
            None => anyhow::bail!(
                "Upload rejected: {}",
                body["message"].as_str().unwrap_or("no url in response")
            ),
        }
    }

    async fn delete_blob(&self, blob: &BlobRef) -> Result<()> {
        let request = self
            .request(Method::DELETE, "delete-blob-storage")
            .query(&[("blobName", blob.as_str())]);
        self.send("delete-blob-storage", request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_key_params() {
        assert_eq!(Endpoint::Inspections.key_param(), "zakaznikId");
        assert_eq!(Endpoint::CheckpointEvaluations.key_param(), "stanickaId");
        assert_eq!(Endpoint::NonconformityPhotos.key_param(), "neshodaId");
        assert_eq!(Endpoint::Certificates.path(), "certifikaty");
    }

    #[test]
    fn test_rest_client_builds_from_default_config() {
        let client = RestClient::new(&PortalConfig::default()).unwrap();
        assert!(client.base_url.ends_with('/'));
    }
}
