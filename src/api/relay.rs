/// Image-to-3D relay client
///
/// The relay forwards to a third-party generation service and keeps the
/// credential on its side. Every response is wrapped in `{success, ...}`;
/// a `success: false` body is treated like a non-2xx status.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use super::{build_client, ensure_success, join_url};
use crate::error::{StudioError, StudioResult};

/// Task status as reported by the generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Expired,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl ModelStatus {
    /// No further polling once a task reaches one of these
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ModelStatus::Succeeded | ModelStatus::Failed | ModelStatus::Expired | ModelStatus::Canceled
        )
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModelStatus::Pending => "Pending",
            ModelStatus::InProgress => "In progress",
            ModelStatus::Succeeded => "Succeeded",
            ModelStatus::Failed => "Failed",
            ModelStatus::Expired => "Expired",
            ModelStatus::Canceled => "Canceled",
            ModelStatus::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// One `check-status` answer
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    pub status: ModelStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Entry of the recent-models list
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelSummary {
    pub id: String,
    pub status: ModelStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    model_urls: Option<ModelUrls>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ModelUrls {
    #[serde(default)]
    glb: Option<String>,
}

impl ModelSummary {
    pub fn glb_url(&self) -> Option<&str> {
        self.model_urls.as_ref()?.glb.as_deref()
    }

    /// Creation time formatted for the list, when the service sent one
    pub fn created(&self) -> Option<String> {
        let millis = self.created_at?;
        chrono::DateTime::from_timestamp_millis(millis).map(|t| t.format("%Y-%m-%d %H:%M").to_string())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    image_url: &'a str,
    product_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    task_id: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelSummary>,
}

#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into(),
        }
    }

    /// Start a generation task; returns the task id
    pub async fn create_3d_model(self, image_url: String, product_name: String) -> StudioResult<String> {
        if image_url.trim().is_empty() {
            return Err(StudioError::decode("An image URL is required"));
        }

        let body = CreateRequest {
            image_url: &image_url,
            product_name: &product_name,
        };
        info!("🧊 Creating 3D model for {}", product_name);

        let response = self
            .client
            .post(join_url(&self.base_url, "/api/create-3d-model"))
            .json(&body)
            .send()
            .await?;
        let created: CreateResponse = unwrap_envelope(ensure_success(response).await?).await?;

        info!("🧊 Task created: {}", created.task_id);
        Ok(created.task_id)
    }

    pub async fn check_status(self, task_id: String) -> StudioResult<(String, GenerationStatus)> {
        let url = join_url(&self.base_url, &format!("/api/check-status/{}", task_id));
        let response = self.client.get(url).send().await?;
        let status: GenerationStatus = unwrap_envelope(ensure_success(response).await?).await?;

        debug!("🧊 {} is {} ({}%)", task_id, status.status, status.progress);
        Ok((task_id, status))
    }

    pub async fn list_models(self) -> StudioResult<Vec<ModelSummary>> {
        let response = self.client.get(join_url(&self.base_url, "/api/models")).send().await?;
        let list: ModelsResponse = unwrap_envelope(ensure_success(response).await?).await?;
        Ok(list.models)
    }

    /// GLB bytes of a finished task
    pub async fn download_model(self, task_id: String) -> StudioResult<(String, Vec<u8>)> {
        let url = join_url(&self.base_url, &format!("/api/download/{}", task_id));
        let response = self.client.get(url).send().await?;
        let bytes = ensure_success(response).await?.bytes().await?;

        info!("🧊 Downloaded model {} ({} bytes)", task_id, bytes.len());
        Ok((task_id, bytes.to_vec()))
    }
}

/// Decode a `{success, ...}` body, failing on `success: false`
async fn unwrap_envelope<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> StudioResult<T> {
    let status = response.status().as_u16();
    let body = response.bytes().await?;
    parse_envelope(status, &body)
}

fn parse_envelope<T: serde::de::DeserializeOwned>(status: u16, body: &[u8]) -> StudioResult<T> {
    let value: Value = serde_json::from_slice(body)?;
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = match value.get("error") {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => "Relay request failed".to_string(),
        };
        return Err(StudioError::Server { status, message });
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_server::serve;

    fn client(url: &str) -> RelayClient {
        RelayClient::new(url, Duration::from_secs(5))
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ModelStatus::Succeeded.is_terminal());
        assert!(ModelStatus::Canceled.is_terminal());
        assert!(!ModelStatus::Pending.is_terminal());
        assert!(!ModelStatus::InProgress.is_terminal());
        assert!(!ModelStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_unknown_status_does_not_fail_parsing() {
        let status: GenerationStatus =
            parse_envelope(200, br#"{"success": true, "status": "QUEUED_FOREVER", "progress": 3}"#).unwrap();
        assert_eq!(status.status, ModelStatus::Unknown);
        assert_eq!(status.progress, 3);
    }

    #[test]
    fn test_success_false_is_an_error() {
        let err = parse_envelope::<GenerationStatus>(200, br#"{"success": false, "error": "Model not ready yet"}"#)
            .unwrap_err();
        match err {
            StudioError::Server { message, .. } => assert_eq!(message, "Model not ready yet"),
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_sends_camel_case_body() {
        let server = serve(200, "application/json", br#"{"success": true, "taskId": "task-42"}"#.to_vec()).await;

        let task = client(&server.url)
            .create_3d_model("https://img.example/cup.png".into(), "Cup".into())
            .await
            .unwrap();
        assert_eq!(task, "task-42");

        let request = &server.requests()[0];
        assert!(request.starts_with("POST /api/create-3d-model"));
        assert!(request.contains(r#""imageUrl":"https://img.example/cup.png""#));
        assert!(request.contains(r#""productName":"Cup""#));
    }

    #[tokio::test]
    async fn test_empty_image_url_is_rejected_locally() {
        let server = serve(200, "application/json", vec![]).await;
        assert!(client(&server.url).create_3d_model("  ".into(), "Cup".into()).await.is_err());
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn test_check_status() {
        let body = br#"{"success": true, "status": "SUCCEEDED", "progress": 100, "modelUrl": "https://cdn/m.glb", "thumbnailUrl": "https://cdn/t.png", "data": {}}"#;
        let server = serve(200, "application/json", body.to_vec()).await;

        let (task, status) = client(&server.url).check_status("abc".into()).await.unwrap();
        assert_eq!(task, "abc");
        assert_eq!(status.status, ModelStatus::Succeeded);
        assert_eq!(status.model_url.as_deref(), Some("https://cdn/m.glb"));
        assert!(server.requests()[0].starts_with("GET /api/check-status/abc"));
    }

    #[tokio::test]
    async fn test_relay_error_surfaces_message() {
        let server = serve(500, "application/json", br#"{"success": false, "error": "Invalid API key"}"#.to_vec()).await;

        let err = client(&server.url).list_models().await.unwrap_err();
        match err {
            StudioError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Invalid API key");
            }
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_models() {
        let body = br#"{"success": true, "models": [
            {"id": "t1", "status": "SUCCEEDED", "progress": 100, "model_urls": {"glb": "https://cdn/1.glb"}, "thumbnail_url": "https://cdn/1.png", "created_at": 1700000000000},
            {"id": "t2", "status": "IN_PROGRESS", "progress": 40}
        ]}"#;
        let server = serve(200, "application/json", body.to_vec()).await;

        let models = client(&server.url).list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].glb_url(), Some("https://cdn/1.glb"));
        assert_eq!(models[0].created().as_deref(), Some("2023-11-14 22:13"));
        assert_eq!(models[1].status, ModelStatus::InProgress);
        assert_eq!(models[1].glb_url(), None);
    }

    #[tokio::test]
    async fn test_download_model_returns_bytes() {
        let server = serve(200, "model/gltf-binary", b"glTF\x02\x00\x00\x00".to_vec()).await;

        let (task, bytes) = client(&server.url).download_model("t1".into()).await.unwrap();
        assert_eq!(task, "t1");
        assert_eq!(&bytes[..4], b"glTF");
    }
}
