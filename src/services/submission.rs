use std::io::Cursor;
use std::sync::Arc;

use image::imageops::FilterType;
use image::ImageFormat;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::services::queue::{QueueError, QueueMessage, TaskQueue};
use crate::services::storage::{self, BlobStore, StorageError};

/// Canonical resolution input images are normalized to before storage.
const TARGET_DIMENSION: u32 = 224;

/// Formats a submission is allowed to arrive in.
const ALLOWED_FORMATS: &[ImageFormat] = &[ImageFormat::Png, ImageFormat::Jpeg];

/// An input image resized to the canonical resolution, re-encoded in its
/// original format.
#[derive(Debug)]
struct NormalizedImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

/// Accepts incoming images: validates and normalizes them, persists the blob
/// and the initial Pending record, and enqueues the processing message.
pub struct SubmissionService {
    db: PgPool,
    storage: Arc<BlobStore>,
    queue: Arc<TaskQueue>,
}

impl SubmissionService {
    pub fn new(db: PgPool, storage: Arc<BlobStore>, queue: Arc<TaskQueue>) -> Self {
        Self { db, storage, queue }
    }

    /// Submit an image for classification and return the new task id.
    ///
    /// The blob write must complete before the state-store write, and the
    /// state-store write before the enqueue: a worker must never receive a
    /// message for data that is not yet durably stored. A failure partway
    /// through leaves a partially initialized task; recovery is the client's
    /// resubmission.
    pub async fn submit(
        &self,
        image_bytes: &[u8],
        extension_hint: Option<&str>,
    ) -> Result<Uuid, SubmitError> {
        let normalized = normalize_image(image_bytes)?;

        let task_id = Uuid::new_v4();
        let extension = extension_hint
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| default_extension(normalized.format).to_string());
        let image_key = storage::image_key(task_id, &extension);

        tracing::debug!(task_id = %task_id, image_key = %image_key, "Storing normalized image");
        self.storage
            .upload(&image_key, &normalized.bytes, normalized.format.to_mime_type())
            .await?;

        queries::create_task(&self.db, task_id, &image_key).await?;

        self.queue
            .enqueue(&QueueMessage {
                task_id,
                image_key: image_key.clone(),
            })
            .await?;

        metrics::counter!("image_tasks_submitted_total").increment(1);
        tracing::info!(task_id = %task_id, image_key = %image_key, "Task submitted");

        Ok(task_id)
    }
}

/// Decode, validate, and resize an incoming image to the canonical square
/// resolution, preserving its original encoding.
fn normalize_image(image_bytes: &[u8]) -> Result<NormalizedImage, SubmitError> {
    let format = image::guess_format(image_bytes).map_err(|_| SubmitError::InvalidImage)?;

    if !ALLOWED_FORMATS.contains(&format) {
        return Err(SubmitError::UnsupportedFormat(format!("{format:?}")));
    }

    let decoded = image::load_from_memory_with_format(image_bytes, format)
        .map_err(|_| SubmitError::InvalidImage)?;

    let resized = decoded.resize_exact(TARGET_DIMENSION, TARGET_DIMENSION, FilterType::Triangle);

    let mut out = Cursor::new(Vec::new());
    resized.write_to(&mut out, format).map_err(SubmitError::Encode)?;

    Ok(NormalizedImage {
        bytes: out.into_inner(),
        format,
    })
}

fn default_extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("bin")
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Invalid image data")]
    InvalidImage,

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to encode normalized image: {0}")]
    Encode(#[source] image::ImageError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample_image_bytes(format: ImageFormat) -> Vec<u8> {
        let image = RgbImage::from_pixel(64, 48, Rgb([120, 40, 200]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut out, format)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn normalizes_png_to_canonical_square() {
        let normalized = normalize_image(&sample_image_bytes(ImageFormat::Png)).unwrap();
        assert_eq!(normalized.format, ImageFormat::Png);

        let reloaded = image::load_from_memory(&normalized.bytes).unwrap();
        assert_eq!(reloaded.width(), TARGET_DIMENSION);
        assert_eq!(reloaded.height(), TARGET_DIMENSION);
    }

    #[test]
    fn normalizes_jpeg_preserving_the_encoding() {
        let normalized = normalize_image(&sample_image_bytes(ImageFormat::Jpeg)).unwrap();
        assert_eq!(normalized.format, ImageFormat::Jpeg);
        assert_eq!(
            image::guess_format(&normalized.bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn rejects_undecodable_bytes() {
        let err = normalize_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, SubmitError::InvalidImage));
    }

    #[test]
    fn rejects_truncated_image_data() {
        let mut bytes = sample_image_bytes(ImageFormat::Png);
        bytes.truncate(20); // Valid magic, unreadable body
        let err = normalize_image(&bytes).unwrap_err();
        assert!(matches!(err, SubmitError::InvalidImage));
    }

    #[test]
    fn rejects_disallowed_formats() {
        // A GIF header is recognizable but outside the allowed set.
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";
        let err = normalize_image(gif).unwrap_err();
        assert!(matches!(err, SubmitError::UnsupportedFormat(_)));
    }

    #[test]
    fn default_extensions_match_common_usage() {
        assert_eq!(default_extension(ImageFormat::Png), "png");
        assert_eq!(default_extension(ImageFormat::Jpeg), "jpg");
    }
}
