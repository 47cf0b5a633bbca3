use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::codecs::jpeg::JpegEncoder;

pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("cannot identify image file: {0}")]
    Decode(image::ImageError),
    #[error("failed to encode image as JPEG: {0}")]
    Encode(image::ImageError),
}

/// Decodes any supported image format and re-encodes it as baseline JPEG.
/// Alpha and palette images are flattened to RGB first.
pub fn reencode_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, EncodingError> {
    let img = image::load_from_memory(bytes).map_err(EncodingError::Decode)?;
    let rgb = img.to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&rgb)
        .map_err(EncodingError::Encode)?;
    Ok(jpeg)
}

pub fn jpeg_data_uri(jpeg: &[u8]) -> String {
    format!("{}{}", JPEG_DATA_URI_PREFIX, STANDARD.encode(jpeg))
}

pub fn image_to_data_uri(bytes: &[u8], quality: u8) -> Result<String, EncodingError> {
    let jpeg = reencode_jpeg(bytes, quality)?;
    Ok(jpeg_data_uri(&jpeg))
}
