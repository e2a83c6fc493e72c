use std::io::Cursor;

use image::{ImageFormat, ImageReader};

/// Allowed image formats for recipe images and avatars.
pub const ALLOWED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Maximum accepted image size (2MB).
pub const MAX_FILE_SIZE: usize = 2 * 1024 * 1024;

/// Detect the format from magic bytes and check that the header parses.
/// Returns the format on success.
pub fn validate_image(data: &[u8]) -> Result<ImageFormat, String> {
    if data.len() > MAX_FILE_SIZE {
        return Err(format!(
            "File too large. Maximum size is {} bytes",
            MAX_FILE_SIZE
        ));
    }

    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| format!("Failed to read image: {}", e))?;

    let format = reader
        .format()
        .ok_or_else(|| "Could not detect image format".to_string())?;

    if !ALLOWED_FORMATS.contains(&format) {
        return Err(format!(
            "Unsupported image format: {:?}. Allowed: JPEG, PNG, GIF, WebP",
            format
        ));
    }

    reader
        .into_dimensions()
        .map_err(|e| format!("Failed to decode image: {}", e))?;

    Ok(format)
}

/// File extension used when storing an image of `format`.
pub fn extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}

#[cfg(test)]
pub(crate) fn tiny_png() -> Vec<u8> {
    let img = image::RgbImage::new(2, 2);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_is_accepted() {
        assert_eq!(validate_image(&tiny_png()).unwrap(), ImageFormat::Png);
        assert_eq!(extension(ImageFormat::Png), "png");
    }

    #[test]
    fn test_random_bytes_are_rejected() {
        assert!(validate_image(b"definitely not an image").is_err());
    }

    #[test]
    fn test_oversized_input_is_rejected() {
        let data = vec![0u8; MAX_FILE_SIZE + 1];
        let err = validate_image(&data).unwrap_err();
        assert!(err.contains("too large"));
    }
}
