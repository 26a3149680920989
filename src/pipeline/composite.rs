//! Layer bitmaps and back-to-front compositing.

use crate::pipeline::device::TRANSPARENT;

/// One decoded layer (or a finished page): palette values, row-major,
/// `pixels.len() == width * height`. [`TRANSPARENT`] marks "no ink".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl PixelBuffer {
    /// A fully transparent buffer.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width as usize * height as usize],
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// Flatten layers given back-to-front. Later layers overwrite every pixel
/// they actually inked. Returns `None` when there is nothing to draw.
pub fn composite(layers: &[PixelBuffer]) -> Option<PixelBuffer> {
    let first = layers.first()?;
    let mut out = PixelBuffer::transparent(first.width, first.height);
    for layer in layers {
        for (dst, &src) in out.pixels.iter_mut().zip(&layer.pixels) {
            if src != TRANSPARENT {
                *dst = src;
            }
        }
    }
    Some(out)
}
