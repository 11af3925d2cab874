//! Error types for asset decoding and thumbnail rendering.

use thiserror::Error;

/// Result type alias using ThumbnailError.
pub type Result<T> = std::result::Result<T, ThumbnailError>;

/// Main error type for decoding and rendering operations.
///
/// Truncated sizes and unrecognized enum codes are not errors: they are
/// logged with `tracing::warn!` and resolved by clamping or by a documented
/// default.
#[derive(Error, Debug)]
pub enum ThumbnailError {
    /// Malformed magic, truncated header or unreachable offset.
    #[error("Format error in {section}: {reason}")]
    Format {
        /// Container section being parsed (chunk magic, "header", ...).
        section: String,
        /// What was wrong.
        reason: String,
    },

    /// Invalid back-reference or unsupported pixel/primitive variant.
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// Missing asset or GPU object creation failure.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read a ZIP archive.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Failed to encode or write an image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Failed to parse a JSON configuration.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ThumbnailError {
    pub(crate) fn format(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            section: section.into(),
            reason: reason.into(),
        }
    }

    /// Section named by a format error, if this is one.
    pub fn section(&self) -> Option<&str> {
        match self {
            Self::Format { section, .. } => Some(section),
            _ => None,
        }
    }
}
