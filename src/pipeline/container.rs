//! Note container layout: signature, footer, header, page and layer records.
//!
//! ```text
//!  0      4                     24                          len-4   len
//!  ┌──────┬─────────────────────┬───────── ... ────────────┬───────┐
//!  │ note │ SN_FILE_VER_yyyymmdd│ blocks (u32 len + bytes) │footer@│
//!  └──────┴─────────────────────┴───────── ... ────────────┴───────┘
//! ```
//!
//! The footer block is a tag block listing the header (`FILE_FEATURE`) and one
//! `PAGE…` pointer per page. Each page block points at its layer blocks by
//! layer name, and each layer block points at its bitmap block.
//!
//! Opening a container ([`NoteContainer::open`]) reads every tag block and
//! fails the whole document on structural damage. Decoding a page
//! ([`NoteContainer::decode_page`]) is where per-layer damage is tolerated.

use crate::config::ParseOptions;
use crate::error::NoteError;
use crate::output::Page;
use crate::pipeline::codec::{decode_background_png, decode_flate, decode_rle};
use crate::pipeline::composite::{composite, PixelBuffer};
use crate::pipeline::cursor::ByteCursor;
use crate::pipeline::device::{
    page_dimensions, DeviceGeneration, BLANK_BITMAP_LEN, BLANK_STYLE, CUSTOM_BACKGROUND_PREFIX,
    FILE_TYPE_NOTE, MIN_CONTAINER_LEN, SIGNATURE_LEN,
};
use crate::pipeline::encode::encode_png;
use crate::pipeline::tags::TagBlock;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

static SIGNATURE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^SN_FILE_VER_\d{8}$").unwrap());

pub const MAIN_LAYER: &str = "MAINLAYER";
pub const BACKGROUND_LAYER: &str = "BGLAYER";
/// Front-to-back layer order used when a page has no `LAYERSEQ`.
pub const DEFAULT_LAYER_SEQ: [&str; 5] = [MAIN_LAYER, "LAYER1", "LAYER2", "LAYER3", BACKGROUND_LAYER];

const ORIENTATION_LANDSCAPE: &str = "1090";
const ORIENTATION_PORTRAIT: &str = "1000";
const FOOTER_POINTER_LEN: usize = 4;

/// Pixel encoding of one layer bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerProtocol {
    Rle,
    Flate,
    /// Anything else; decoded as run-length.
    Unknown(String),
}

impl LayerProtocol {
    pub fn from_tag(value: &str) -> Self {
        match value {
            "SN_ASA_COMPRESS" => LayerProtocol::Flate,
            "RATTA_RLE" | "" => LayerProtocol::Rle,
            other => LayerProtocol::Unknown(other.to_string()),
        }
    }
}

/// A layer resolved from a page, ready to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRecord {
    pub name: String,
    pub protocol: LayerProtocol,
    pub bitmap_offset: u32,
}

/// One page as declared in the footer.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: String,
    /// Position in the footer's page list.
    pub order: usize,
    pub style: String,
    pub orientation: String,
    pub width: u32,
    pub height: u32,
    /// Back-to-front.
    pub layer_order: Vec<String>,
    pub visibility: HashMap<String, bool>,
    tags: TagBlock,
}

impl PageRecord {
    /// `false` only when the page explicitly hides `layer`.
    pub fn is_layer_visible(&self, layer: &str) -> bool {
        self.visibility.get(layer).copied().unwrap_or(true)
    }

    /// Offset of the layer's tag block. Offset `0` means the layer is absent.
    pub fn layer_offset(&self, layer: &str) -> Option<u32> {
        self.tags.get_u32(layer).filter(|&offset| offset != 0)
    }
}

/// A validated container with its page records. Borrowing the input buffer,
/// pages decode lazily.
#[derive(Debug)]
pub struct NoteContainer<'a> {
    data: &'a [u8],
    pub file_type: String,
    pub signature: String,
    pub firmware: u32,
    pub generation: DeviceGeneration,
    pub page_width: u32,
    pub page_height: u32,
    pub pages: Vec<PageRecord>,
}

impl<'a> NoteContainer<'a> {
    /// Validate the signature and read footer, header and page records.
    pub fn open(data: &'a [u8]) -> Result<Self, NoteError> {
        if data.len() < MIN_CONTAINER_LEN {
            return Err(NoteError::invalid_format(format!(
                "file too small ({} bytes)",
                data.len()
            )));
        }

        let mut cursor = ByteCursor::new(data);
        let file_type = cursor.read_string(FILE_TYPE_NOTE.len())?;
        if file_type != FILE_TYPE_NOTE {
            return Err(NoteError::invalid_format(format!(
                "unsupported file type: {file_type}"
            )));
        }
        let signature = cursor.read_string(SIGNATURE_LEN)?;
        if !SIGNATURE_RE.is_match(&signature) {
            return Err(NoteError::invalid_format(format!(
                "invalid signature: {signature}"
            )));
        }
        let firmware: u32 = signature[SIGNATURE_LEN - 8..]
            .parse()
            .map_err(|_| NoteError::invalid_format(format!("invalid signature: {signature}")))?;
        let generation = DeviceGeneration::from_firmware(firmware);

        let footer_pointer_at = data.len() - FOOTER_POINTER_LEN;
        cursor.seek(footer_pointer_at);
        let footer_addr = cursor.read_u32_le()? as usize;
        if footer_addr >= footer_pointer_at {
            return Err(NoteError::parse("footer address out of bounds"));
        }
        cursor.seek(footer_addr);
        let footer = TagBlock::parse(&cursor.read_block_string()?);

        let equipment = match footer.get_u32("FILE_FEATURE") {
            Some(addr) => {
                cursor.seek(addr as usize);
                let header = TagBlock::parse(&cursor.read_block_string()?);
                header.get("APPLY_EQUIPMENT").map(str::to_string)
            }
            None => None,
        };
        let (page_width, page_height) = page_dimensions(equipment.as_deref());

        let page_addrs = footer.values_with_prefix("PAGE");
        if page_addrs.is_empty() {
            return Err(NoteError::parse("no pages"));
        }

        let mut pages = Vec::with_capacity(page_addrs.len());
        for (order, raw) in page_addrs.iter().enumerate() {
            let addr: usize = raw
                .trim()
                .parse()
                .map_err(|_| NoteError::parse(format!("invalid page address: {raw}")))?;
            cursor.seek(addr);
            let tags = TagBlock::parse(&cursor.read_block_string()?);
            pages.push(read_page_record(tags, order, page_width, page_height));
        }

        info!(
            "Opened note container: firmware {}, {:?}, {}x{}, {} page(s)",
            firmware,
            generation,
            page_width,
            page_height,
            pages.len()
        );

        Ok(Self {
            data,
            file_type,
            signature,
            firmware,
            generation,
            page_width,
            page_height,
            pages,
        })
    }

    /// Resolve a page layer to its protocol and bitmap pointer.
    ///
    /// `Ok(None)` when the page has no pointer for the layer or the layer
    /// block names no bitmap.
    pub fn layer_record(&self, page: &PageRecord, name: &str) -> Result<Option<LayerRecord>, NoteError> {
        let Some(offset) = page.layer_offset(name) else {
            return Ok(None);
        };
        let mut cursor = ByteCursor::new(self.data);
        cursor.seek(offset as usize);
        let tags = TagBlock::parse(&cursor.read_block_string()?);
        let protocol = LayerProtocol::from_tag(tags.get("LAYERPROTOCOL").unwrap_or(""));
        Ok(tags
            .get_u32("LAYERBITMAP")
            .filter(|&offset| offset != 0)
            .map(|bitmap_offset| LayerRecord {
                name: name.to_string(),
                protocol,
                bitmap_offset,
            }))
    }

    /// Decode one layer of `page`. `Ok(None)` means there is nothing to draw.
    pub fn decode_layer(
        &self,
        page: &PageRecord,
        name: &str,
        options: &ParseOptions,
    ) -> Result<Option<PixelBuffer>, NoteError> {
        let Some(layer) = self.layer_record(page, name)? else {
            return Ok(None);
        };
        let mut cursor = ByteCursor::new(self.data);
        cursor.seek(layer.bitmap_offset as usize);
        let bitmap = cursor.read_block()?;
        if bitmap.is_empty() {
            return Ok(None);
        }

        let is_background = layer.name == BACKGROUND_LAYER;
        if is_background && page.style.starts_with(CUSTOM_BACKGROUND_PREFIX) {
            return decode_background_png(bitmap, page.width, page.height).map(Some);
        }

        let pixels = match &layer.protocol {
            LayerProtocol::Flate => {
                decode_flate(bitmap, page.width, page.height, options.max_inflate_bytes)?
            }
            protocol => {
                if let LayerProtocol::Unknown(tag) = protocol {
                    debug!(
                        "Layer {} uses unknown protocol {:?}, decoding as RLE",
                        layer.name, tag
                    );
                }
                let all_blank =
                    is_background && page.style == BLANK_STYLE && bitmap.len() == BLANK_BITMAP_LEN;
                decode_rle(bitmap, page.width, page.height, self.generation, all_blank)
            }
        };
        Ok(Some(pixels))
    }

    /// Decode, composite and encode one page.
    ///
    /// Layer failures are logged and the layer skipped. Returns `Ok(None)`
    /// when no layer survives.
    pub fn decode_page(&self, page: &PageRecord, options: &ParseOptions) -> Result<Option<Page>, NoteError> {
        let mut layers = Vec::new();
        for name in &page.layer_order {
            if !page.is_layer_visible(name) {
                debug!("Page {}: layer {} hidden", page.id, name);
                continue;
            }
            match self.decode_layer(page, name, options) {
                Ok(Some(pixels)) => layers.push(pixels),
                Ok(None) => {}
                Err(e) => warn!("Page {}: skipping layer {}: {}", page.id, name, e),
            }
        }

        let Some(flat) = composite(&layers) else {
            warn!("Page {} has no decodable layers, dropping it", page.id);
            return Ok(None);
        };
        let png = encode_png(&flat)?;
        debug!("Page {} decoded from {} layer(s)", page.id, layers.len());

        Ok(Some(Page {
            id: page.id.clone(),
            order: page.order,
            width: page.width,
            height: page.height,
            png,
        }))
    }
}

fn read_page_record(tags: TagBlock, order: usize, page_width: u32, page_height: u32) -> PageRecord {
    let id = tags
        .get("PAGEID")
        .map(str::to_string)
        .unwrap_or_else(|| format!("page-{order}"));
    let style = tags.get("PAGESTYLE").unwrap_or("").to_string();
    let orientation = tags.get("ORIENTATION").unwrap_or(ORIENTATION_PORTRAIT).to_string();
    let (width, height) = if orientation == ORIENTATION_LANDSCAPE {
        (page_height, page_width)
    } else {
        (page_width, page_height)
    };

    let visibility = match tags.get("LAYERINFO") {
        Some(raw) => parse_layer_visibility(raw),
        None => HashMap::from([(MAIN_LAYER.to_string(), true)]),
    };

    let layer_order: Vec<String> = match tags.get("LAYERSEQ") {
        Some(seq) => seq.split(',').rev().map(str::to_string).collect(),
        None => DEFAULT_LAYER_SEQ.iter().rev().map(|s| s.to_string()).collect(),
    };

    PageRecord {
        id,
        order,
        style,
        orientation,
        width,
        height,
        layer_order,
        visibility,
        tags,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayerInfoEntry {
    #[serde(default)]
    is_background_layer: bool,
    #[serde(default)]
    layer_id: i64,
    #[serde(default = "visible_by_default")]
    is_visible: bool,
}

fn visible_by_default() -> bool {
    true
}

/// Decode a `LAYERINFO` payload: JSON with `#` in place of `:`, optionally
/// base64 wrapped. Falls back to "main layer visible" on any failure.
pub fn parse_layer_visibility(raw: &str) -> HashMap<String, bool> {
    match decode_layer_info(raw) {
        Ok(entries) => entries
            .into_iter()
            .map(|entry| {
                let name = if entry.is_background_layer {
                    BACKGROUND_LAYER.to_string()
                } else if entry.layer_id == 0 {
                    MAIN_LAYER.to_string()
                } else {
                    format!("LAYER{}", entry.layer_id)
                };
                (name, entry.is_visible)
            })
            .collect(),
        Err(e) => {
            warn!("Failed to parse LAYERINFO, only {MAIN_LAYER} visible: {e}");
            HashMap::from([(MAIN_LAYER.to_string(), true)])
        }
    }
}

fn decode_layer_info(raw: &str) -> Result<Vec<LayerInfoEntry>, String> {
    let json = raw.replace('#', ":");
    let json = if serde_json::from_str::<serde_json::Value>(&json).is_ok() {
        json
    } else {
        let bytes = STANDARD.decode(json.trim()).map_err(|e| e.to_string())?;
        String::from_utf8(bytes).map_err(|e| e.to_string())?
    };
    serde_json::from_str(&json).map_err(|e| e.to_string())
}
