use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

use crate::error::MeasureError;

/// Decode input bytes into a `DynamicImage`.
pub fn decode_image(input: &[u8]) -> Result<DynamicImage, MeasureError> {
    image::load_from_memory(input).map_err(|e| MeasureError::DecodeError(e.to_string()))
}

/// Detect the input image format from the raw bytes.
pub fn detect_format(input: &[u8]) -> Result<ImageFormat, MeasureError> {
    image::guess_format(input).map_err(|e| MeasureError::DecodeError(e.to_string()))
}

/// Flatten alpha channel by compositing onto a white background.
///
/// Transparent areas then read as unsaturated white and never pass a hue
/// threshold.
pub fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba: RgbaImage = image.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    let mut rgb = RgbImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let inv_alpha = 1.0 - alpha;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * inv_alpha).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }

    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageEncoder;

    fn make_test_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([40, 140, 50]));
        let mut buffer = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buffer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        buffer
    }

    #[test]
    fn decodes_png() {
        let png = make_test_png(30, 20);
        let img = decode_image(&png).unwrap();
        assert_eq!((img.width(), img.height()), (30, 20));
        assert_eq!(detect_format(&png).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn garbage_is_decode_error() {
        assert!(matches!(
            decode_image(b"not an image"),
            Err(MeasureError::DecodeError(_))
        ));
        assert!(matches!(
            detect_format(b"not an image"),
            Err(MeasureError::DecodeError(_))
        ));
    }

    #[test]
    fn flatten_alpha_composites_over_white() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, image::Rgba([0, 255, 0, 0]));
        let rgb = flatten_alpha(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0), &image::Rgb([255, 255, 255]));
    }

    #[test]
    fn flatten_alpha_preserves_opaque() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, image::Rgba([100, 150, 200, 255]));
        let rgb = flatten_alpha(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0), &image::Rgb([100, 150, 200]));
    }

    #[test]
    fn flatten_alpha_blends_semitransparent() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, image::Rgba([255, 0, 0, 128]));
        let rgb = flatten_alpha(&DynamicImage::ImageRgba8(rgba));
        let pixel = rgb.get_pixel(0, 0);
        assert!((pixel.0[0] as i16 - 255).abs() <= 1);
        assert!((pixel.0[1] as i16 - 127).abs() <= 2);
        assert!((pixel.0[2] as i16 - 127).abs() <= 2);
    }

    #[test]
    fn flatten_rgb_is_passthrough() {
        let img = RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]));
        let rgb = flatten_alpha(&DynamicImage::ImageRgb8(img.clone()));
        assert_eq!(rgb, img);
    }
}
