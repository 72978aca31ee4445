/// Processing backend client
///
/// One method per endpoint family. Every call validates its upload first,
/// then sends exactly one request; nothing is retried.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use super::batch::BatchReport;
use super::operation::Operation;
use super::{build_client, decode_data_url, ensure_success, join_url};
use crate::error::{StudioError, StudioResult, ValidationError};
use crate::upload::{Upload, UploadLimits};

/// `GET /api/status`
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct BackendStatus {
    pub api_status: String,
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub models: BackendModels,
    #[serde(default)]
    pub features_available: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct BackendModels {
    #[serde(default)]
    pub u2net: Option<String>,
    #[serde(default)]
    pub realesrgan: Option<String>,
    #[serde(default)]
    pub enhancement: Option<String>,
}

impl BackendStatus {
    pub fn is_online(&self) -> bool {
        self.api_status == "online"
    }

    pub fn summary(&self) -> String {
        format!(
            "Backend: {}, Device: {}, U²Net: {}, Enhancement: {}",
            self.api_status,
            if self.device.is_empty() { "unknown" } else { &self.device },
            self.models.u2net.as_deref().unwrap_or("unknown"),
            self.models.enhancement.as_deref().unwrap_or("Unknown"),
        )
    }
}

#[derive(Deserialize)]
struct EdgeComparison {
    results: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ProcessingClient {
    client: reqwest::Client,
    base_url: String,
    limits: UploadLimits,
}

impl ProcessingClient {
    pub fn new(base_url: impl Into<String>, limits: UploadLimits, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into(),
            limits,
        }
    }

    /// Probe the backend
    pub async fn status(self) -> StudioResult<BackendStatus> {
        let response = self.client.get(join_url(&self.base_url, "/api/status")).send().await?;
        let status: BackendStatus = ensure_success(response).await?.json().await?;
        info!("📡 {}", status.summary());
        Ok(status)
    }

    /// Run one operation and return the encoded result image
    pub async fn process(self, upload: Upload, operation: Operation) -> StudioResult<Vec<u8>> {
        upload.validate(&self.limits)?;

        let mut form = Form::new().part("file", file_part(upload)?);
        for (name, value) in operation.fields() {
            form = form.text(name, value);
        }

        let url = join_url(&self.base_url, operation.endpoint());
        debug!("➡️  POST {} ({})", url, operation.describe());

        let response = self.client.post(url).multipart(form).send().await?;
        let bytes = ensure_success(response).await?.bytes().await?;

        debug!("⬅️  {} returned {} bytes", operation.describe(), bytes.len());
        Ok(bytes.to_vec())
    }

    /// Run every edge detector at once: `(method, encoded image)` by method name
    pub async fn compare_edge_detectors(self, upload: Upload) -> StudioResult<Vec<(String, Vec<u8>)>> {
        upload.validate(&self.limits)?;

        let form = Form::new().part("file", file_part(upload)?);
        let url = join_url(&self.base_url, "/api/compare-edge-detectors");
        let response = self.client.post(url).multipart(form).send().await?;
        let comparison: EdgeComparison = ensure_success(response).await?.json().await?;

        comparison
            .results
            .into_iter()
            .map(|(method, data_url)| decode_data_url(&data_url).map(|(_, bytes)| (method, bytes)))
            .collect()
    }

    /// Background-remove several files in one request
    pub async fn batch_process(self, uploads: Vec<Upload>) -> StudioResult<BatchReport> {
        if uploads.is_empty() {
            return Err(ValidationError::NoValidImages.into());
        }
        if uploads.len() > self.limits.max_files {
            return Err(ValidationError::TooManyFiles {
                count: uploads.len(),
                max: self.limits.max_files,
            }
            .into());
        }
        for upload in &uploads {
            upload.validate(&self.limits)?;
        }

        let count = uploads.len();
        let mut form = Form::new();
        for upload in uploads {
            form = form.part("files", file_part(upload)?);
        }

        info!("📦 Batch processing {} images", count);
        let url = join_url(&self.base_url, "/api/batch-process");
        let response = self.client.post(url).multipart(form).send().await?;
        let body = ensure_success(response).await?.bytes().await?;
        let report = BatchReport::from_json(&body)?;

        info!("✅ Batch complete: {}/{} successful", report.successful, report.total);
        Ok(report)
    }
}

fn file_part(upload: Upload) -> StudioResult<Part> {
    Part::bytes(upload.bytes)
        .file_name(upload.filename)
        .mime_str(&upload.mime)
        .map_err(|e| StudioError::Transport(format!("invalid MIME type: {}", e)))
}
