//! Raster image files, passed through to OCR as-is.

use base64::Engine;
use tracing::debug;

use super::{ExtractedContent, FileExtractor, Result, SourceFile};
use crate::error::ExtractError;
use crate::models::statement::PageImage;

/// Encodes an image file as a single page image.
pub struct ImageExtractor;

impl FileExtractor for ImageExtractor {
    fn extract(&self, file: &SourceFile) -> Result<ExtractedContent> {
        let format = image::guess_format(&file.bytes)
            .map_err(|e| ExtractError::file_read(&file.name, format!("not a recognizable image: {}", e)))?;

        let mime_type = format.to_mime_type().to_string();
        debug!("Image {} detected as {}", file.name, mime_type);

        Ok(ExtractedContent::from_images(vec![PageImage {
            mime_type,
            data: base64::engine::general_purpose::STANDARD.encode(&file.bytes),
        }]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let mut data = Vec::new();
        DynamicImage::new_rgb8(4, 4)
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .unwrap();
        data
    }

    #[test]
    fn test_png_passes_through() {
        let bytes = png_bytes();
        let content = ImageExtractor
            .extract(&SourceFile::new("scan.png", bytes.clone()))
            .unwrap();

        assert_eq!(content.text, None);
        assert_eq!(content.images.len(), 1);
        assert_eq!(content.images[0].mime_type, "image/png");
        assert_eq!(
            base64::engine::general_purpose::STANDARD
                .decode(&content.images[0].data)
                .unwrap(),
            bytes
        );
    }

    #[test]
    fn test_corrupt_image_is_file_read_error() {
        let err = ImageExtractor
            .extract(&SourceFile::new("scan.jpg", b"garbage".to_vec()))
            .unwrap_err();
        assert!(matches!(err, ExtractError::FileRead { .. }));
    }
}
