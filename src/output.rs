//! Decoded document model handed to OCR and generators.

use crate::metadata::PageHash;
use crate::pipeline::encode::content_hash;
use serde::Serialize;

/// One rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    /// Vendor page id, or `page-{order}` when the page carries none.
    pub id: String,
    /// Position in the source container. Pages dropped during decode leave
    /// gaps, so this is not an index into [`Document::pages`].
    pub order: usize,
    pub width: u32,
    pub height: u32,
    /// RGBA PNG.
    #[serde(skip)]
    pub png: Vec<u8>,
}

impl Page {
    pub fn content_hash(&self) -> String {
        content_hash(&self.png)
    }

    pub fn page_hash(&self) -> PageHash {
        PageHash {
            id: self.id.clone(),
            hash: self.content_hash(),
        }
    }
}

/// A parsed document: surviving pages sorted by `order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub title: String,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(title: impl Into<String>, mut pages: Vec<Page>) -> Self {
        pages.sort_by_key(|p| p.order);
        Self {
            title: title.into(),
            pages,
        }
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    /// Per-page content hashes in page order.
    pub fn page_hashes(&self) -> Vec<PageHash> {
        self.pages.iter().map(Page::page_hash).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: &str, order: usize, png: &[u8]) -> Page {
        Page {
            id: id.into(),
            order,
            width: 1,
            height: 1,
            png: png.to_vec(),
        }
    }

    #[test]
    fn document_sorts_by_order() {
        let doc = Document::new("t", vec![page("b", 2, b"2"), page("a", 0, b"0")]);
        let ids: Vec<_> = doc.pages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(doc.page("b").map(|p| p.order), Some(2));
    }

    #[test]
    fn page_hashes_follow_png_bytes() {
        let doc = Document::new("t", vec![page("a", 0, b"x"), page("b", 1, b"x")]);
        let hashes = doc.page_hashes();
        assert_eq!(hashes[0].hash, hashes[1].hash);
        assert_eq!(hashes[1].id, "b");
    }
}
