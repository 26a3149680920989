//! Page encoding: composited palette buffer → PNG bytes + content hash.
//!
//! The PNG is RGBA with every palette value `v` written as `(v, v, v, 255)`.
//! The transparent sentinel therefore comes out as opaque white, which is
//! what a blank sheet of paper looks like on the device. The content hash is
//! taken over the encoded bytes, so two pages hash equal exactly when their
//! PNG output is identical.

use crate::error::NoteError;
use crate::pipeline::composite::PixelBuffer;
use image::{DynamicImage, RgbaImage};
use sha1::{Digest, Sha1};
use std::io::Cursor;
use tracing::debug;

/// Encode a composited page as PNG.
pub fn encode_png(page: &PixelBuffer) -> Result<Vec<u8>, NoteError> {
    let expected = page.width as usize * page.height as usize;
    if page.width == 0 || page.height == 0 || page.pixels.len() != expected {
        return Err(NoteError::parse(format!(
            "cannot encode {}x{} page from {} pixels",
            page.width,
            page.height,
            page.pixels.len()
        )));
    }

    let rgba: Vec<u8> = page
        .pixels
        .iter()
        .flat_map(|&v| [v, v, v, 255])
        .collect();
    let img = RgbaImage::from_raw(page.width, page.height, rgba)
        .ok_or_else(|| NoteError::parse("RGBA buffer does not match page dimensions"))?;

    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| NoteError::parse(format!("PNG encode failed: {e}")))?;

    debug!(
        "Encoded {}x{} page → {} bytes PNG",
        page.width,
        page.height,
        buf.len()
    );
    Ok(buf)
}

/// Lower-case hex SHA-1 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::device::TRANSPARENT;

    #[test]
    fn encode_small_page() {
        let page = PixelBuffer {
            width: 2,
            height: 1,
            pixels: vec![0x00, TRANSPARENT],
        };
        let png = encode_png(&page).expect("encode should succeed");
        assert_eq!(&png[1..4], b"PNG");

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(decoded.get_pixel(1, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn mismatched_dimensions_fail() {
        let page = PixelBuffer {
            width: 3,
            height: 3,
            pixels: vec![0; 4],
        };
        assert!(matches!(encode_png(&page), Err(NoteError::Parse(_))));
    }

    #[test]
    fn hash_is_hex_sha1() {
        assert_eq!(content_hash(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn identical_pages_hash_equal() {
        let page = PixelBuffer::transparent(4, 4);
        let a = content_hash(&encode_png(&page).unwrap());
        let b = content_hash(&encode_png(&page).unwrap());
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }
}
