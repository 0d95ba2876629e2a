use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::GrayImage;

/// Decode an inbound still into an equalized 8-bit grayscale frame.
///
/// Accepts either a `data:<mime>;base64,<payload>` URL or a bare base64
/// payload. The result is what both the detector and the pupil estimator see.
pub fn decode_data_url(data: &str) -> Result<GrayImage> {
    let payload = match data.split_once(',') {
        Some((_, payload)) => payload,
        None => data,
    };
    let bytes = BASE64
        .decode(payload.trim())
        .context("image payload is not valid base64")?;
    decode_frame(&bytes)
}

pub fn decode_frame(bytes: &[u8]) -> Result<GrayImage> {
    if bytes.is_empty() {
        return Err(anyhow!("image payload is empty"));
    }
    let img = image::load_from_memory(bytes).context("failed to decode image bytes")?;
    let mut gray = img.to_luma8();
    equalize_histogram(&mut gray);
    Ok(gray)
}

/// Spread the intensity histogram over the full 0..=255 range.
///
/// Lookup table is `round(cdf(v) * 255 / (n - h_min))` with the darkest
/// populated bin pinned to 0. A single-valued image is left untouched.
pub fn equalize_histogram(image: &mut GrayImage) {
    let total = image.width() as u64 * image.height() as u64;
    if total == 0 {
        return;
    }

    let mut hist = [0u64; 256];
    for pixel in image.pixels() {
        hist[pixel[0] as usize] += 1;
    }

    let Some(first) = hist.iter().position(|&count| count > 0) else {
        return;
    };
    if hist[first] == total {
        return;
    }

    let scale = 255.0 / (total - hist[first]) as f64;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u64;
    for value in (first + 1)..256 {
        cumulative += hist[value];
        lut[value] = (cumulative as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }

    for pixel in image.pixels_mut() {
        pixel[0] = lut[pixel[0] as usize];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Luma};
    use std::io::Cursor;

    fn png_bytes(image: &GrayImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn equalize_stretches_two_levels_to_extremes() {
        let mut image = GrayImage::from_fn(4, 1, |x, _| Luma([if x < 2 { 100 } else { 120 }]));
        equalize_histogram(&mut image);
        assert_eq!(image.get_pixel(0, 0)[0], 0);
        assert_eq!(image.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn equalize_leaves_uniform_image_alone() {
        let mut image = GrayImage::from_pixel(3, 3, Luma([77]));
        equalize_histogram(&mut image);
        assert!(image.pixels().all(|p| p[0] == 77));
    }

    #[test]
    fn decodes_data_url_payload() {
        let source = GrayImage::from_fn(8, 8, |x, _| Luma([(x * 30) as u8]));
        let url = format!("data:image/png;base64,{}", BASE64.encode(png_bytes(&source)));

        let frame = decode_data_url(&url).unwrap();
        assert_eq!(frame.dimensions(), (8, 8));
        assert_eq!(frame.get_pixel(0, 0)[0], 0);
        assert_eq!(frame.get_pixel(7, 0)[0], 255);
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        assert!(decode_data_url("data:image/png;base64,!!!not-base64!!!").is_err());
        assert!(decode_frame(b"definitely not an image").is_err());
        assert!(decode_frame(&[]).is_err());
    }
}
