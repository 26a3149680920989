//! Synthetic note containers for integration tests.
//!
//! Builds the container byte by byte: file type + signature, then one
//! length-prefixed block per bitmap, layer, page, header and footer, then the
//! footer address.

#![allow(dead_code)]

use tracing_subscriber::EnvFilter;

/// Route library logs through the test harness. `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const SIGNATURE_EXTENDED: &str = "SN_FILE_VER_20230015";
pub const SIGNATURE_BASE: &str = "SN_FILE_VER_20210010";

pub struct LayerSpec {
    pub name: &'static str,
    pub protocol: &'static str,
    pub bitmap: Vec<u8>,
}

pub struct PageSpec {
    pub id: Option<String>,
    pub extra_tags: String,
    pub layers: Vec<LayerSpec>,
}

impl PageSpec {
    pub fn new(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            extra_tags: String::new(),
            layers: Vec::new(),
        }
    }

    /// Main layer drawn with a single black run of `len` pixels.
    pub fn inked(id: &str, len: u8) -> Self {
        Self::new(id).layer("MAINLAYER", "RATTA_RLE", rle_run(0x61, len))
    }

    pub fn layer(mut self, name: &'static str, protocol: &'static str, bitmap: Vec<u8>) -> Self {
        self.layers.push(LayerSpec {
            name,
            protocol,
            bitmap,
        });
        self
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.extra_tags.push_str(&format!("<{key}:{value}>"));
        self
    }
}

/// One RLE pair: `len + 1` pixels of `code`.
pub fn rle_run(code: u8, len: u8) -> Vec<u8> {
    assert!(len < 0x80, "held runs not supported by this helper");
    vec![code, len]
}

pub struct NoteBuilder {
    signature: &'static str,
    equipment: Option<&'static str>,
    pages: Vec<PageSpec>,
}

impl NoteBuilder {
    pub fn new() -> Self {
        Self {
            signature: SIGNATURE_EXTENDED,
            equipment: Some("A5X"),
            pages: Vec::new(),
        }
    }

    pub fn signature(mut self, signature: &'static str) -> Self {
        self.signature = signature;
        self
    }

    pub fn equipment(mut self, equipment: &'static str) -> Self {
        self.equipment = Some(equipment);
        self
    }

    pub fn page(mut self, page: PageSpec) -> Self {
        self.pages.push(page);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"note");
        out.extend_from_slice(self.signature.as_bytes());

        let mut page_offsets = Vec::new();
        for page in &self.pages {
            let mut tags = String::new();
            if let Some(id) = &page.id {
                tags.push_str(&format!("<PAGEID:{id}>"));
            }
            tags.push_str("<PAGESTYLE:style_white>");
            for layer in &page.layers {
                let bitmap_at = push_block(&mut out, &layer.bitmap);
                let layer_tags = format!(
                    "<LAYERTYPE:NOTE><LAYERPROTOCOL:{}><LAYERNAME:{}><LAYERBITMAP:{}>",
                    layer.protocol, layer.name, bitmap_at
                );
                let layer_at = push_block(&mut out, layer_tags.as_bytes());
                tags.push_str(&format!("<{}:{}>", layer.name, layer_at));
            }
            tags.push_str(&page.extra_tags);
            page_offsets.push(push_block(&mut out, tags.as_bytes()));
        }

        let mut footer = String::new();
        if let Some(equipment) = self.equipment {
            let header = format!("<MODULE_LABEL:none><APPLY_EQUIPMENT:{equipment}>");
            let header_at = push_block(&mut out, header.as_bytes());
            footer.push_str(&format!("<FILE_FEATURE:{header_at}>"));
        }
        for (i, offset) in page_offsets.iter().enumerate() {
            footer.push_str(&format!("<PAGE{:04}:{}>", i + 1, offset));
        }
        let footer_at = push_block(&mut out, footer.as_bytes());
        out.extend_from_slice(&(footer_at as u32).to_le_bytes());
        out
    }
}

fn push_block(out: &mut Vec<u8>, bytes: &[u8]) -> usize {
    let at = out.len();
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
    at
}
