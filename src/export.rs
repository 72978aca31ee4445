/// Saving results to disk
///
/// Downloads always write full-resolution PNGs (never the scaled canvas)
/// into the configured download directory.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::api::{BatchItem, BatchOutcome};
use crate::error::StudioResult;
use crate::state::picture::Picture;

/// `background-removed-2024-05-01T12-30-45.png`
pub fn download_name(now: DateTime<Utc>) -> String {
    format!("background-removed-{}.png", now.format("%Y-%m-%dT%H-%M-%S"))
}

pub fn batch_item_name(filename: &str) -> String {
    format!("processed-{}", filename)
}

pub fn model_name(task_id: &str) -> String {
    format!("model-{}.glb", task_id)
}

/// Write `bytes` into `dir`, creating the directory if needed
pub async fn write_file(dir: PathBuf, name: String, bytes: Vec<u8>) -> StudioResult<PathBuf> {
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(sanitize(&name));
    tokio::fs::write(&path, &bytes).await?;
    info!("💾 Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

/// Save the displayed picture under a timestamped name
pub async fn save_picture(dir: PathBuf, picture: Picture) -> StudioResult<PathBuf> {
    let png = picture.encode_png_async().await?;
    write_file(dir, download_name(Utc::now()), png).await
}

/// Save one batch result as `processed-<filename>`; failed items save nothing
pub async fn save_batch_item(dir: PathBuf, item: BatchItem) -> StudioResult<Option<PathBuf>> {
    match item.outcome {
        BatchOutcome::Success { png, .. } => write_file(dir, batch_item_name(&item.filename), png)
            .await
            .map(Some),
        BatchOutcome::Failure(_) => Ok(None),
    }
}

/// Save every successful item, waiting `stagger × index` before each one
pub async fn save_batch(dir: PathBuf, items: Vec<BatchItem>, stagger: Duration) -> StudioResult<Vec<PathBuf>> {
    let mut saved = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_success() {
            continue;
        }
        if index > 0 && !stagger.is_zero() {
            tokio::time::sleep(stagger).await;
        }
        if let Some(path) = save_batch_item(dir.clone(), item).await? {
            saved.push(path);
        }
    }
    Ok(saved)
}

pub async fn save_model(dir: PathBuf, task_id: String, glb: Vec<u8>) -> StudioResult<PathBuf> {
    write_file(dir, model_name(&task_id), glb).await
}

/// Keep only the final path component so a server-supplied name cannot escape `dir`
fn sanitize(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "download".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{Rgba, RgbaImage};

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stellarion-export-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_download_name_format() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap();
        assert_eq!(download_name(now), "background-removed-2024-05-01T12-30-45.png");
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize("../../etc/passwd"), "passwd");
        assert_eq!(sanitize("cat.png"), "cat.png");
        assert_eq!(sanitize(".."), "download");
    }

    #[tokio::test]
    async fn test_saved_picture_keeps_dimensions() {
        let dir = scratch_dir("picture");
        let picture = Picture::from_rgba(RgbaImage::from_pixel(37, 11, Rgba([10, 20, 30, 128])));

        let path = save_picture(dir.clone(), picture).await.unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let reloaded = Picture::decode(&bytes).unwrap();

        assert_eq!(reloaded.dimensions(), (37, 11));
        assert_eq!(reloaded.rgba().get_pixel(0, 0), &Rgba([10, 20, 30, 128]));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_save_batch_skips_failures() {
        let dir = scratch_dir("batch");
        let items = vec![
            BatchItem {
                filename: "a.png".into(),
                outcome: BatchOutcome::Success {
                    png: b"one".to_vec(),
                    width: 1,
                    height: 1,
                },
            },
            BatchItem {
                filename: "b.png".into(),
                outcome: BatchOutcome::Failure("bad".into()),
            },
            BatchItem {
                filename: "c.png".into(),
                outcome: BatchOutcome::Success {
                    png: b"three".to_vec(),
                    width: 1,
                    height: 1,
                },
            },
        ];

        let saved = save_batch(dir.clone(), items, Duration::ZERO).await.unwrap();
        let names: Vec<String> = saved
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["processed-a.png", "processed-c.png"]);
        assert!(!dir.join("processed-b.png").exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_save_model_name() {
        let dir = scratch_dir("model");
        let path = save_model(dir.clone(), "task-9".into(), b"glTF".to_vec()).await.unwrap();
        assert!(path.ends_with("model-task-9.glb"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
