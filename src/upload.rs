/// Upload validation and packaging
///
/// Everything here runs before a request is built. A file that fails these
/// checks never touches the network.

use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{StudioResult, ValidationError};

/// Size and count limits the processing backend accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Inclusive
    pub max_bytes: u64,
    pub max_files: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            max_files: 10,
        }
    }
}

impl UploadLimits {
    fn limit_mb(&self) -> u64 {
        self.max_bytes / (1024 * 1024)
    }
}

/// A file as it will be sent: name, MIME type and contents
#[derive(Clone, PartialEq)]
pub struct Upload {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("filename", &self.filename)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Upload {
    pub fn new(filename: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// PNG re-upload of an in-memory picture, named like a canvas export
    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new("image.png", "image/png", bytes)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Check an already-loaded upload against the limits
    pub fn validate(&self, limits: &UploadLimits) -> Result<(), ValidationError> {
        validate_file(&self.filename, &self.mime, self.size(), limits)
    }

    /// Validate a file on disk and read it.
    ///
    /// Type and size are checked from the path and metadata first, so an
    /// oversized file is rejected without reading it.
    pub async fn open(path: PathBuf, limits: UploadLimits) -> StudioResult<Self> {
        let filename = file_name(&path);
        let mime = mime_for_path(&path);
        let size = tokio::fs::metadata(&path).await?.len();

        validate_file(&filename, &mime, size, &limits)?;

        let bytes = tokio::fs::read(&path).await?;
        debug!("📂 Read {} ({} bytes, {})", filename, bytes.len(), mime);

        Ok(Self { filename, mime, bytes })
    }
}

/// Core single-file check: MIME must start with `image/`, size ≤ limit
pub fn validate_file(
    filename: &str,
    mime: &str,
    size: u64,
    limits: &UploadLimits,
) -> Result<(), ValidationError> {
    if !mime.starts_with("image/") {
        return Err(ValidationError::NotAnImage {
            filename: filename.to_string(),
            mime: mime.to_string(),
        });
    }

    if size > limits.max_bytes {
        return Err(ValidationError::TooLarge {
            filename: filename.to_string(),
            size,
            limit_mb: limits.limit_mb(),
        });
    }

    Ok(())
}

/// Result of screening a batch selection
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSelection {
    pub accepted: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, ValidationError)>,
}

/// Screen a batch selection.
///
/// The count limit applies to the raw selection, before anything is
/// filtered out. Individually invalid files are skipped; an empty remainder
/// rejects the whole batch.
pub async fn screen_batch(paths: Vec<PathBuf>, limits: UploadLimits) -> Result<BatchSelection, ValidationError> {
    if paths.is_empty() {
        return Err(ValidationError::Empty);
    }
    if paths.len() > limits.max_files {
        return Err(ValidationError::TooManyFiles {
            count: paths.len(),
            max: limits.max_files,
        });
    }

    let mut accepted = Vec::new();
    let mut skipped = Vec::new();

    for path in paths {
        let filename = file_name(&path);
        let checked = match tokio::fs::metadata(&path).await {
            Ok(meta) => validate_file(&filename, &mime_for_path(&path), meta.len(), &limits),
            Err(e) => Err(ValidationError::Unreadable {
                filename,
                reason: e.to_string(),
            }),
        };
        match checked {
            Ok(()) => accepted.push(path),
            Err(e) => {
                warn!("⚠️  Skipping {}: {}", path.display(), e);
                skipped.push((path, e));
            }
        }
    }

    if accepted.is_empty() {
        return Err(ValidationError::NoValidImages);
    }

    Ok(BatchSelection { accepted, skipped })
}

/// Read every accepted file of a screened batch
pub async fn read_batch(selection: BatchSelection) -> StudioResult<Vec<Upload>> {
    let mut uploads = Vec::with_capacity(selection.accepted.len());
    for path in selection.accepted {
        let bytes = tokio::fs::read(&path).await?;
        uploads.push(Upload::new(file_name(&path), mime_for_path(&path), bytes));
    }
    Ok(uploads)
}

/// Collect the image files directly inside a folder, sorted by name.
///
/// Not recursive: a batch is capped at a handful of files anyway.
pub fn collect_folder(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && mime_for_path(p).starts_with("image/"))
        .collect();

    files.sort();
    debug!("🔍 Found {} images in {}", files.len(), folder.display());
    files
}

/// MIME type from the file extension, like a browser file input reports it
pub fn mime_for_path(path: &Path) -> String {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
