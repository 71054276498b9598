use std::path::Path;

use dicom_pixeldata::{ConvertOptions, PixelDecoder};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};

/// Longest edge of a generated preview image.
const PREVIEW_MAX_EDGE: u32 = 256;

/// Decode a stored DICOM file and encode a PNG preview of its first frame.
///
/// Pixel values are rescaled to 8 bit with the modality/VOI LUTs applied,
/// then downscaled so neither edge exceeds [`PREVIEW_MAX_EDGE`].
pub fn render_preview(dicom_path: &Path) -> anyhow::Result<Vec<u8>> {
    let object = dicom::object::open_file(dicom_path)?;
    let pixel_data = object.decode_pixel_data()?;

    let options = ConvertOptions::default().force_8bit();
    let mut image = pixel_data.to_dynamic_image_with_options(0, &options)?;

    if image.width() > PREVIEW_MAX_EDGE || image.height() > PREVIEW_MAX_EDGE {
        image = image.thumbnail(PREVIEW_MAX_EDGE, PREVIEW_MAX_EDGE);
    }

    let mut buffer = Vec::new();
    let encoder = PngEncoder::new_with_quality(
        &mut buffer,
        CompressionType::default(),
        FilterType::default(),
    );
    image.write_with_encoder(encoder)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn garbage_input_is_an_error_not_a_panic() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not a dicom file").unwrap();

        assert!(render_preview(file.path()).is_err());
    }
}
