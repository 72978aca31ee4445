/// Error types for the studio client
///
/// Every failure the user can run into is one of these. Errors are `Clone`
/// because they travel back to the UI inside iced messages.

use thiserror::Error;

/// Local validation failures. These never reach the network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// MIME type does not start with `image/`
    #[error("Please upload a valid image file ({filename} is {mime})")]
    NotAnImage { filename: String, mime: String },

    /// File is larger than the upload limit
    #[error("File size must be less than {limit_mb}MB ({filename} is {size} bytes)")]
    TooLarge {
        filename: String,
        size: u64,
        limit_mb: u64,
    },

    /// File metadata could not be read
    #[error("Could not read {filename}: {reason}")]
    Unreadable { filename: String, reason: String },

    /// Batch selection holds more files than the backend accepts
    #[error("Maximum {max} images per batch ({count} selected)")]
    TooManyFiles { count: usize, max: usize },

    /// Every file of a batch was filtered out
    #[error("No valid images found")]
    NoValidImages,

    /// Nothing was selected
    #[error("No files selected")]
    Empty,
}

/// Main error type for the application.
#[derive(Error, Debug, Clone)]
pub enum StudioError {
    /// Input rejected before dispatch
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The request never produced a response (connect, timeout, body read)
    #[error("Network error: {0}")]
    Transport(String),

    /// Non-2xx response; `message` is the server's own error text when present
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Response body was not the image/JSON we expected
    #[error("Decode error: {0}")]
    Decode(String),

    /// Local file IO
    #[error("IO error: {0}")]
    Io(String),

    /// The processing backend did not report itself online
    #[error("Backend server is not running. Please start the server first.")]
    BackendOffline,
}

/// Convenience result type for studio operations.
pub type StudioResult<T> = Result<T, StudioError>;

impl StudioError {
    pub fn decode<T: Into<String>>(msg: T) -> Self {
        Self::Decode(msg.into())
    }

    /// Whether the failure happened before any request left the machine
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::BackendOffline | Self::Io(_))
    }
}

impl From<reqwest::Error> for StudioError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<std::io::Error> for StudioError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<image::ImageError> for StudioError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
