/// Batch background-removal report
///
/// The backend answers one JSON document for the whole batch; images come
/// back inline as PNG data URLs.

use serde::Deserialize;

use super::decode_data_url;
use crate::error::StudioResult;

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Request order
    pub items: Vec<BatchItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub filename: String,
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Success {
        /// Encoded image bytes (PNG)
        png: Vec<u8>,
        width: u32,
        height: u32,
    },
    Failure(String),
}

impl BatchItem {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Success { .. })
    }
}

impl BatchReport {
    pub fn successes(&self) -> impl Iterator<Item = (usize, &BatchItem)> {
        self.items.iter().enumerate().filter(|(_, item)| item.is_success())
    }

    /// Parse the backend's JSON body
    pub fn from_json(body: &[u8]) -> StudioResult<Self> {
        let raw: RawReport = serde_json::from_slice(body)?;
        Ok(raw.into())
    }
}

// ========== Wire format ==========

#[derive(Deserialize)]
struct RawReport {
    total: usize,
    successful: usize,
    failed: usize,
    #[serde(default)]
    results: Vec<RawItem>,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(default)]
    filename: Option<String>,
    status: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

impl From<RawReport> for BatchReport {
    fn from(raw: RawReport) -> Self {
        let items = raw
            .results
            .into_iter()
            .map(|item| {
                let filename = item.filename.unwrap_or_else(|| "image".to_string());
                let outcome = match (item.status.as_str(), item.image) {
                    ("success", Some(url)) => match decode_data_url(&url) {
                        Ok((_, png)) => BatchOutcome::Success {
                            png,
                            width: item.width.unwrap_or(0),
                            height: item.height.unwrap_or(0),
                        },
                        Err(e) => BatchOutcome::Failure(e.to_string()),
                    },
                    ("success", None) => BatchOutcome::Failure("Missing image data".to_string()),
                    _ => BatchOutcome::Failure(item.error.unwrap_or_else(|| "Unknown error".to_string())),
                };
                BatchItem { filename, outcome }
            })
            .collect();

        Self {
            total: raw.total,
            successful: raw.successful,
            failed: raw.failed,
            items,
        }
    }
}
