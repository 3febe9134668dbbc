//! Uploads images and metadata to a content-addressed pinning gateway.

use crate::config::PinataSettings;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PinningError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Pinning rejected: {status} - {body}")]
    Rejected { status: u16, body: String },
    #[error("Pinning response did not contain a content hash")]
    MissingHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait PinningService: Send + Sync {
    async fn upload(&self, file: FileUpload) -> Result<ContentHash, PinningError>;

    async fn upload_json(&self, metadata: &Value) -> Result<ContentHash, PinningError>;

    /// Public URL a pinned hash is served from.
    fn gateway_url(&self, hash: &ContentHash) -> String;
}

#[derive(Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
}

fn content_hash(body: &str) -> Result<ContentHash, PinningError> {
    let response: PinResponse = serde_json::from_str(body).map_err(|_| PinningError::MissingHash)?;
    response
        .ipfs_hash
        .filter(|h| !h.is_empty())
        .map(ContentHash)
        .ok_or(PinningError::MissingHash)
}

/// Pinata HTTP API client.
#[derive(Clone)]
pub struct PinataClient {
    client: Client,
    settings: PinataSettings,
}

impl PinataClient {
    pub fn new(settings: PinataSettings) -> Result<Self, PinningError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, settings })
    }

    async fn pin(&self, request: reqwest::RequestBuilder) -> Result<ContentHash, PinningError> {
        let response = request
            .header("pinata_api_key", &self.settings.api_key)
            .header("pinata_secret_api_key", &self.settings.secret_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PinningError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        content_hash(&body)
    }
}

#[async_trait]
impl PinningService for PinataClient {
    async fn upload(&self, file: FileUpload) -> Result<ContentHash, PinningError> {
        debug!("Pinning file {} ({} bytes)", file.file_name, file.bytes.len());
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.mime_type)?;
        let form = Form::new().part("file", part);

        let hash = self
            .pin(self.client.post(&self.settings.post_url).multipart(form))
            .await?;
        info!("Pinned file as {}", hash);
        Ok(hash)
    }

    async fn upload_json(&self, metadata: &Value) -> Result<ContentHash, PinningError> {
        let hash = self
            .pin(self.client.post(&self.settings.post_json_url).json(metadata))
            .await?;
        info!("Pinned metadata as {}", hash);
        Ok(hash)
    }

    fn gateway_url(&self, hash: &ContentHash) -> String {
        format!("{}{}", self.settings.hash_url, hash)
    }
}
