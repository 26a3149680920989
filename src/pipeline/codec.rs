//! Layer bitmap codecs: vendor run-length, deflate, and PNG backgrounds.
//!
//! Every decoder returns a [`PixelBuffer`] of exactly `width * height` bytes
//! pre-filled with [`TRANSPARENT`]; input that describes more pixels than
//! the page holds is truncated, input that describes fewer leaves the tail
//! transparent.

use crate::error::NoteError;
use crate::pipeline::composite::PixelBuffer;
use crate::pipeline::device::{
    ColorTable, DeviceGeneration, DARK_GRAY, GRAY, INTERNAL_PAGE_HEIGHT, TRANSPARENT,
};
use byteorder::{ByteOrder, LittleEndian};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;
use tracing::{debug, warn};

/// Default ceiling on inflated layer size.
pub const DEFAULT_MAX_INFLATE_BYTES: usize = 20 * 1024 * 1024;

/// Length byte that stands for a fixed long run.
const RLE_LONG_RUN_MARKER: u8 = 0xFF;
const RLE_LONG_RUN: usize = 0x4000;
const RLE_LONG_RUN_BLANK: usize = 0x400;
const RLE_HOLD_BIT: u8 = 0x80;

struct RunWriter<'a> {
    out: &'a mut [u8],
    pos: usize,
    table: &'a ColorTable,
}

impl RunWriter<'_> {
    fn emit(&mut self, code: u8, count: usize) {
        let end = self.pos.saturating_add(count).min(self.out.len());
        self.out[self.pos..end].fill(self.table.map(code));
        self.pos = end;
    }

    fn is_full(&self) -> bool {
        self.pos >= self.out.len()
    }
}

#[inline]
fn held_run(len: u8) -> usize {
    (((len & 0x7F) as usize) + 1) << 7
}

/// Decode a run-length layer.
///
/// `all_blank` shortens the long-run marker; it is set for blank white
/// background layers only.
pub fn decode_rle(
    data: &[u8],
    width: u32,
    height: u32,
    generation: DeviceGeneration,
    all_blank: bool,
) -> PixelBuffer {
    let table = ColorTable::for_generation(generation);
    let mut buf = PixelBuffer::transparent(width, height);
    let mut w = RunWriter {
        out: &mut buf.pixels,
        pos: 0,
        table: &table,
    };

    let mut held: Option<(u8, u8)> = None;
    let mut idx = 0usize;

    while idx + 1 < data.len() && !w.is_full() {
        let code = data[idx];
        let len = data[idx + 1];
        idx += 2;

        if let Some((held_code, held_len)) = held.take() {
            if held_code == code {
                w.emit(code, 1 + len as usize + held_run(held_len));
                continue;
            }
            w.emit(held_code, held_run(held_len));
        }

        if len == RLE_LONG_RUN_MARKER {
            let run = if all_blank {
                RLE_LONG_RUN_BLANK
            } else {
                RLE_LONG_RUN
            };
            w.emit(code, run);
        } else if len & RLE_HOLD_BIT != 0 {
            held = Some((code, len));
        } else {
            w.emit(code, len as usize + 1);
        }
    }

    if let Some((held_code, _)) = held {
        if !w.is_full() {
            let rest = w.out.len() - w.pos;
            w.emit(held_code, rest);
        }
    }

    buf
}

/// Inflate `data` (zlib, falling back to raw deflate) without producing more
/// than `limit` bytes.
fn inflate_bounded(data: &[u8], limit: usize) -> Result<Vec<u8>, NoteError> {
    let cap = (limit as u64).saturating_add(1);
    let mut out = Vec::new();
    let zlib = ZlibDecoder::new(data).take(cap).read_to_end(&mut out);

    if let Err(e) = zlib {
        if out.is_empty() {
            debug!("Zlib inflate failed ({e}), retrying as raw deflate");
            DeflateDecoder::new(data)
                .take(cap)
                .read_to_end(&mut out)
                .map_err(|e| NoteError::parse(format!("deflate layer: {e}")))?;
        } else {
            warn!(
                "Deflate layer truncated: kept {} bytes before error: {}",
                out.len(),
                e
            );
        }
    }

    if out.len() > limit {
        return Err(NoteError::parse(format!(
            "inflated layer exceeds {limit} byte limit"
        )));
    }
    Ok(out)
}

/// Decode a deflate-compressed layer of 16-bit codes.
pub fn decode_flate(
    data: &[u8],
    width: u32,
    height: u32,
    max_inflate_bytes: usize,
) -> Result<PixelBuffer, NoteError> {
    let raw = inflate_bounded(data, max_inflate_bytes)?;
    let mut codes: Vec<u16> = raw.chunks_exact(2).map(LittleEndian::read_u16).collect();
    codes.reverse();

    let mut buf = PixelBuffer::transparent(width, height);
    let total = buf.pixels.len();
    let stride = width.max(1) as usize;
    let mut out = 0usize;

    for (i, code) in codes.into_iter().enumerate() {
        if out >= total {
            break;
        }
        if i % stride < INTERNAL_PAGE_HEIGHT as usize {
            buf.pixels[out] = match code {
                0x0000 => 0x00,
                0x2104 => DARK_GRAY,
                0xE1E2 => GRAY,
                _ => TRANSPARENT,
            };
            out += 1;
        }
    }

    Ok(buf)
}

/// Decode a PNG background into 8-bit luma. The image must match the page.
pub fn decode_background_png(data: &[u8], width: u32, height: u32) -> Result<PixelBuffer, NoteError> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
        .map_err(|e| NoteError::parse(format!("background PNG: {e}")))?
        .to_luma8();
    if img.width() != width || img.height() != height {
        return Err(NoteError::parse(format!(
            "background PNG is {}x{}, page is {}x{}",
            img.width(),
            img.height(),
            width,
            height
        )));
    }
    Ok(PixelBuffer {
        width,
        height,
        pixels: img.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn rle(data: &[u8], width: u32) -> Vec<u8> {
        decode_rle(data, width, 1, DeviceGeneration::Base, false).pixels
    }

    fn zlib(bytes: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(bytes).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn literal_runs_are_len_plus_one() {
        let out = rle(&[0x61, 0x02, 0x62, 0x04], 8);
        assert_eq!(out, vec![0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn long_run_marker() {
        let out = decode_rle(&[0x61, 0xFF], 0x4000, 1, DeviceGeneration::Base, false);
        assert!(out.pixels.iter().all(|&p| p == 0x00));

        let out = decode_rle(&[0x61, 0xFF], 0x4000, 1, DeviceGeneration::Base, true);
        assert!(out.pixels[..0x400].iter().all(|&p| p == 0x00));
        assert!(out.pixels[0x400..].iter().all(|&p| p == TRANSPARENT));
    }

    #[test]
    fn held_run_merges_with_same_color() {
        // 1 + 5 + ((0 + 1) << 7) = 134
        let out = rle(&[0x61, 0x80, 0x61, 0x05], 140);
        assert!(out[..134].iter().all(|&p| p == 0x00));
        assert!(out[134..].iter().all(|&p| p == TRANSPARENT));
    }

    #[test]
    fn held_run_flushes_on_color_change() {
        let out = rle(&[0x61, 0x80, 0x63, 0x02], 131);
        assert!(out[..128].iter().all(|&p| p == 0x00));
        assert_eq!(&out[128..], &[0x9D, 0x9D, 0x9D]);
    }

    #[test]
    fn trailing_held_run_fills_remainder() {
        let out = rle(&[0x63, 0x00, 0x61, 0x81], 10);
        assert_eq!(out[0], 0x9D);
        assert!(out[1..].iter().all(|&p| p == 0x00));
    }

    #[test]
    fn output_is_bounded() {
        let out = rle(&[0x61, 0x7F, 0x61, 0x7F], 10);
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|&p| p == 0x00));
    }

    #[test]
    fn short_input_leaves_tail_transparent() {
        let out = rle(&[0x61, 0x01, 0x62], 5);
        assert_eq!(out, vec![0x00, 0x00, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn extended_palette() {
        let out = decode_rle(
            &[0x9D, 0x00, 0xC9, 0x00, 0x63, 0x00, 0x64, 0x00],
            4,
            1,
            DeviceGeneration::Extended,
            false,
        );
        assert_eq!(out.pixels, vec![0x9D, 0xC9, 0x30, 0x50]);
    }

    #[test]
    fn flate_reverses_and_maps_codes() {
        // Stored order is reversed: last code lands first.
        let mut raw = Vec::new();
        for code in [0x1234u16, 0xE1E2, 0x2104, 0x0000] {
            raw.extend_from_slice(&code.to_le_bytes());
        }
        let out = decode_flate(&zlib(&raw), 4, 1, DEFAULT_MAX_INFLATE_BYTES).unwrap();
        assert_eq!(out.pixels, vec![0x00, 0x9D, 0xC9, 0xFF]);
    }

    #[test]
    fn flate_accepts_raw_deflate() {
        use flate2::write::DeflateEncoder;
        let raw: Vec<u8> = [0x0000u16, 0x0000].iter().flat_map(|c| c.to_le_bytes()).collect();
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&raw).unwrap();
        let out = decode_flate(&enc.finish().unwrap(), 2, 1, DEFAULT_MAX_INFLATE_BYTES).unwrap();
        assert_eq!(out.pixels, vec![0x00, 0x00]);
    }

    #[test]
    fn flate_over_limit_is_rejected() {
        let payload = zlib(&vec![0u8; 4096]);
        let err = decode_flate(&payload, 10, 10, 1024).unwrap_err();
        assert!(matches!(err, NoteError::Parse(_)));
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn flate_unbounded_ceiling_still_decodes() {
        let raw: Vec<u8> = [0x0000u16, 0x2104].iter().flat_map(|c| c.to_le_bytes()).collect();
        let out = decode_flate(&zlib(&raw), 2, 1, usize::MAX).unwrap();
        assert_eq!(out.pixels, vec![0x9D, 0x00]);
    }

    #[test]
    fn flate_skips_columns_beyond_internal_height() {
        let width = INTERNAL_PAGE_HEIGHT + 2;
        let codes = vec![0x0000u16; width as usize];
        let raw: Vec<u8> = codes.iter().flat_map(|c| c.to_le_bytes()).collect();
        let out = decode_flate(&zlib(&raw), width, 1, DEFAULT_MAX_INFLATE_BYTES).unwrap();
        let inked = out.pixels.iter().filter(|&&p| p == 0x00).count();
        assert_eq!(inked, INTERNAL_PAGE_HEIGHT as usize);
        assert_eq!(out.pixels[width as usize - 1], TRANSPARENT);
    }

    #[test]
    fn background_png_must_match_page() {
        let img = image::GrayImage::from_pixel(4, 2, image::Luma([0x80]));
        let mut png = Vec::new();
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let ok = decode_background_png(&png, 4, 2).unwrap();
        assert!(ok.pixels.iter().all(|&p| p == 0x80));
        assert!(decode_background_png(&png, 2, 4).is_err());
        assert!(decode_background_png(b"not a png", 4, 2).is_err());
    }
}
