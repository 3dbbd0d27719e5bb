//! Pre-flight validation of upload candidates.
//!
//! Runs entirely locally, before any network call: format is sniffed from
//! magic bytes (extensions lie), size and batch limits are enforced here so
//! the inference service never sees a request that was doomed anyway.

use std::path::Path;

use image::ImageFormat;
use thiserror::Error;

/// Largest accepted upload: 5 MiB.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Most images accepted in one analysis batch.
pub const MAX_BATCH_FILES: usize = 5;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{filename}: unsupported format {found} (JPEG or PNG required)")]
    UnsupportedFormat { filename: String, found: String },
    #[error("{filename}: {size} bytes exceeds the {limit} byte limit", limit = MAX_IMAGE_BYTES)]
    TooLarge { filename: String, size: usize },
    #[error("batch of {count} files exceeds the {limit} file limit", limit = MAX_BATCH_FILES)]
    TooManyFiles { count: usize },
}

/// Accepted image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }
}

/// A validated image ready for upload.
#[derive(Debug, Clone)]
pub struct UploadImage {
    pub filename: String,
    pub kind: ImageKind,
    pub data: Vec<u8>,
}

/// Whether a path carries a supported image extension (case-insensitive).
///
/// A cheap pre-filter for directory listings; [`validate_bytes`] still sniffs
/// the actual content.
pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            matches!(
                e.to_ascii_lowercase().as_str(),
                "jpg" | "jpeg" | "png"
            )
        })
        .unwrap_or(false)
}

/// Validate one upload candidate: content must sniff as JPEG or PNG and fit
/// under [`MAX_IMAGE_BYTES`].
pub fn validate_bytes(filename: &str, data: Vec<u8>) -> Result<UploadImage, ValidationError> {
    let kind = match image::guess_format(&data) {
        Ok(ImageFormat::Jpeg) => ImageKind::Jpeg,
        Ok(ImageFormat::Png) => ImageKind::Png,
        Ok(other) => {
            return Err(ValidationError::UnsupportedFormat {
                filename: filename.to_string(),
                found: format!("{other:?}"),
            });
        }
        Err(_) => {
            return Err(ValidationError::UnsupportedFormat {
                filename: filename.to_string(),
                found: "unrecognised data".to_string(),
            });
        }
    };

    if data.len() > MAX_IMAGE_BYTES {
        return Err(ValidationError::TooLarge {
            filename: filename.to_string(),
            size: data.len(),
        });
    }

    Ok(UploadImage {
        filename: filename.to_string(),
        kind,
        data,
    })
}

/// Enforce the per-batch file limit.
pub fn check_batch_size(count: usize) -> Result<(), ValidationError> {
    if count > MAX_BATCH_FILES {
        return Err(ValidationError::TooManyFiles { count });
    }
    Ok(())
}
