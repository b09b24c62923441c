//! Image upload passthrough to the Cloudinary media host.
//!
//! Images are forwarded as base64 data URIs in a signed upload request and
//! the host's stable `secure_url` is returned. A failed upload changes
//! nothing locally: the project keeps whatever image reference it had.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::MediaConfig;
use crate::errors::{PortalError, Result};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<UploadError>,
}

#[derive(Debug, Deserialize)]
struct UploadError {
    message: String,
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

pub struct MediaClient {
    client: Client,
    config: MediaConfig,
    endpoint: String,
}

impl MediaClient {
    pub fn new(client: Client, config: MediaConfig) -> Self {
        MediaClient::with_api_base(client, config, API_BASE)
    }

    /// Client against another Cloudinary-compatible API root.
    pub fn with_api_base(client: Client, config: MediaConfig, api_base: &str) -> Self {
        let endpoint = format!(
            "{}/{}/image/upload",
            api_base.trim_end_matches('/'),
            config.cloud_name
        );
        MediaClient {
            client,
            config,
            endpoint,
        }
    }

    /// Upload one image and return its public URL.
    pub async fn upload_image(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", self.config.folder.as_str()), ("timestamp", timestamp.as_str())],
            &self.config.api_secret,
        );

        let body = json!({
            "file": data_uri(bytes, content_type),
            "api_key": self.config.api_key,
            "folder": self.config.folder,
            "timestamp": timestamp,
            "signature": signature,
            "signature_algorithm": "sha256",
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Media host unreachable: {e}");
                PortalError::Upload(e.to_string())
            })?;

        let status = resp.status();
        let parsed: UploadResponse = resp.json().await.map_err(|e| {
            warn!("Media host returned an unreadable body ({status}): {e}");
            PortalError::Upload(format!("unexpected response ({status})"))
        })?;

        if let Some(err) = parsed.error {
            warn!("Media host rejected upload ({status}): {}", err.message);
            return Err(PortalError::Upload(err.message));
        }

        let url = parsed
            .secure_url
            .ok_or_else(|| PortalError::Upload("response carried no URL".to_string()))?;
        debug!("Uploaded {} bytes → {url}", bytes.len());
        Ok(url)
    }
}

/// `data:<mime>;base64,<payload>`
fn data_uri(bytes: &[u8], content_type: &str) -> String {
    format!("data:{content_type};base64,{}", STANDARD.encode(bytes))
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, the API secret appended, SHA-256, lowercase hex.
fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
