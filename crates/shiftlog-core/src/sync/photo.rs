//! Photo preparation for upload.
//!
//! The queue only stores a file reference. Just before sending, the file is
//! decoded, bounded to a maximum edge, re-encoded as JPEG, and base64 encoded.

use std::io::Cursor;
use std::path::Path;

use base64::Engine;
use image::{codecs::jpeg::JpegEncoder, DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use super::TransportError;
use crate::wire::PhotoRequest;

/// Bounds applied to outgoing photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoOptions {
    /// Longest edge of the uploaded image in pixels.
    pub max_edge: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for PhotoOptions {
    fn default() -> Self {
        Self {
            max_edge: 1600,
            jpeg_quality: 70,
        }
    }
}

/// A photo ready to put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPhoto {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PreparedPhoto {
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.jpeg)
    }
}

/// Decode, bound, and re-encode image bytes as JPEG.
///
/// Images already within `max_edge` are not upscaled.
pub fn prepare_photo(source: &[u8], options: PhotoOptions) -> Result<PreparedPhoto, TransportError> {
    if source.is_empty() {
        return Err(TransportError::Prepare("photo file is empty".to_string()));
    }
    if options.max_edge == 0 {
        return Err(TransportError::Prepare(
            "photo max edge must be greater than zero".to_string(),
        ));
    }

    let decoded = image::load_from_memory(source)
        .map_err(|error| TransportError::Prepare(format!("failed to decode photo: {error}")))?;
    let (width, height) = decoded.dimensions();
    let resized = if width <= options.max_edge && height <= options.max_edge {
        decoded
    } else {
        decoded.thumbnail(options.max_edge, options.max_edge)
    };

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let (width, height) = rgb.dimensions();

    let mut cursor = Cursor::new(Vec::new());
    let quality = options.jpeg_quality.clamp(1, 100);
    JpegEncoder::new_with_quality(&mut cursor, quality)
        .encode_image(&rgb)
        .map_err(|error| TransportError::Prepare(format!("failed to encode JPEG: {error}")))?;

    Ok(PreparedPhoto {
        jpeg: cursor.into_inner(),
        width,
        height,
    })
}

/// Read the referenced file and attach it to the request.
///
/// File IO and image work run on the blocking pool.
pub async fn attach_image(
    mut request: PhotoRequest,
    options: PhotoOptions,
) -> Result<PhotoRequest, TransportError> {
    let path = request.photo_ref.clone();
    let encoded = tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(Path::new(&path))
            .map_err(|error| TransportError::Prepare(format!("failed to read {path}: {error}")))?;
        prepare_photo(&bytes, options).map(|photo| photo.to_base64())
    })
    .await
    .map_err(|error| TransportError::Prepare(format!("photo task failed: {error}")))??;

    request.image_base64 = Some(encoded);
    Ok(request)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgba};

    pub(crate) fn source_png(width: u32, height: u32) -> Vec<u8> {
        let image = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_fn(width, height, |_x, _y| {
            Rgba([200, 40, 40, 128])
        });

        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn prepare_bounds_longest_edge() {
        let prepared = prepare_photo(
            &source_png(800, 400),
            PhotoOptions {
                max_edge: 200,
                jpeg_quality: 70,
            },
        )
        .unwrap();

        assert_eq!((prepared.width, prepared.height), (200, 100));
        assert_eq!(&prepared.jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn prepare_does_not_upscale() {
        let prepared = prepare_photo(&source_png(64, 48), PhotoOptions::default()).unwrap();
        assert_eq!((prepared.width, prepared.height), (64, 48));
    }

    #[test]
    fn prepare_rejects_garbage() {
        let error = prepare_photo(b"not-an-image", PhotoOptions::default()).unwrap_err();
        assert!(error.to_string().contains("decode"));
    }

    #[tokio::test]
    async fn attach_reads_file_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.png");
        std::fs::write(&path, source_png(32, 32)).unwrap();

        let request = PhotoRequest {
            pair_code: "HK7M2P".to_string(),
            event_id: None,
            photo_ref: path.display().to_string(),
            latitude: None,
            longitude: None,
            timestamp: 1,
            address: None,
            image_base64: None,
        };
        let attached = attach_image(request, PhotoOptions::default()).await.unwrap();
        assert!(attached.image_base64.is_some_and(|data| !data.is_empty()));
    }

    #[tokio::test]
    async fn attach_reports_missing_file() {
        let request = PhotoRequest {
            pair_code: "HK7M2P".to_string(),
            event_id: None,
            photo_ref: "/definitely/not/here.jpg".to_string(),
            latitude: None,
            longitude: None,
            timestamp: 1,
            address: None,
            image_base64: None,
        };
        let error = attach_image(request, PhotoOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, TransportError::Prepare(_)));
    }
}
