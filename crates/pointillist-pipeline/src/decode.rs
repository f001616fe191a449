//! Image decoding and luminance conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the
//! 8-bit RGB source image the rest of the pipeline reads. Alpha, if
//! present, is dropped.
//!
//! This is the first step in the pipeline: raw bytes in, `RgbImage` out.

use image::GrayImage;

use crate::types::{Dimensions, PipelineError, RgbImage};

/// Decode raw image bytes into an RGB image.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
/// Returns [`PipelineError::ZeroArea`] if the decoded image has no
/// pixels. The bundled PNG and BMP decoders already reject zero
/// dimensions as [`PipelineError::ImageDecode`]; the area check covers
/// any decoder that does not.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    into_rgb(&image::load_from_memory(bytes)?)
}

fn into_rgb(img: &image::DynamicImage) -> Result<RgbImage, PipelineError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(PipelineError::ZeroArea {
            width: img.width(),
            height: img.height(),
        });
    }
    Ok(img.to_rgb8())
}

/// Dimensions of an RGB image.
#[must_use]
pub fn dimensions(image: &RgbImage) -> Dimensions {
    Dimensions {
        width: image.width(),
        height: image.height(),
    }
}

/// Convert to a single luminance channel.
///
/// Uses the `image` crate's Rec. 601 weighting
/// (`0.299*R + 0.587*G + 0.114*B`).
#[must_use = "returns the luminance image"]
pub fn luminance(image: &RgbImage) -> GrayImage {
    image::DynamicImage::ImageRgb8(image.clone()).to_luma8()
}

/// Encode an RGB image as PNG bytes.
///
/// Test helper shared by the in-crate test modules.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn encode_png(img: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgb8,
    )
    .unwrap();
    buf
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn zero_area_image_is_rejected() {
        let err = into_rgb(&image::DynamicImage::new_rgb8(0, 3)).unwrap_err();
        assert!(matches!(err, PipelineError::ZeroArea { width: 0, height: 3 }));
        assert_eq!(err.kind(), crate::types::ErrorKind::InvalidInput);
    }

    #[test]
    fn zero_width_bmp_is_invalid_input() {
        // 14-byte file header + 12-byte core header, width 0, height 1.
        let mut bmp = Vec::new();
        bmp.extend_from_slice(b"BM");
        bmp.extend_from_slice(&26u32.to_le_bytes());
        bmp.extend_from_slice(&0u32.to_le_bytes());
        bmp.extend_from_slice(&26u32.to_le_bytes());
        bmp.extend_from_slice(&12u32.to_le_bytes());
        bmp.extend_from_slice(&0u16.to_le_bytes());
        bmp.extend_from_slice(&1u16.to_le_bytes());
        bmp.extend_from_slice(&1u16.to_le_bytes());
        bmp.extend_from_slice(&24u16.to_le_bytes());

        let err = decode(&bmp).unwrap_err();
        assert_eq!(err.kind(), crate::types::ErrorKind::InvalidInput);
    }

    #[test]
    fn valid_png_decodes_to_rgb() {
        let img = RgbImage::from_pixel(3, 2, image::Rgb([10, 200, 30]));
        let decoded = decode(&encode_png(&img)).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn rgba_png_drops_alpha() {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([40, 50, 60, 128]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();

        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded.get_pixel(1, 1), &image::Rgb([40, 50, 60]));
    }

    #[test]
    fn dimensions_match_input() {
        let img = RgbImage::new(17, 31);
        assert_eq!(
            dimensions(&img),
            Dimensions {
                width: 17,
                height: 31
            }
        );
    }

    #[test]
    fn luminance_weights_green_highest() {
        let img = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => image::Rgb([255, 0, 0]),
            1 => image::Rgb([0, 255, 0]),
            _ => image::Rgb([0, 0, 255]),
        });
        let gray = luminance(&img);
        let r = gray.get_pixel(0, 0).0[0];
        let g = gray.get_pixel(1, 0).0[0];
        let b = gray.get_pixel(2, 0).0[0];
        assert!(
            g > r && r > b,
            "expected green > red > blue luminance, got R={r} G={g} B={b}",
        );
    }
}
