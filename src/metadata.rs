//! Persisted conversion metadata and the store that holds it.
//!
//! The library never writes metadata itself. It reads the previous record
//! through [`MetadataStore::get_metadata`], returns a fresh record on
//! success, and asks the store to render it ([`MetadataStore::format_metadata`])
//! when saving output.

use crate::error::BoxError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Content hash of one page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageHash {
    pub id: String,
    /// Lower-case hex SHA-1 of the page PNG.
    pub hash: String,
}

impl PageHash {
    pub fn new(id: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hash: hash.into(),
        }
    }
}

/// What the last successful conversion of a source looked like.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionMetadata {
    /// Source id, `None` for one-off conversions of dropped files.
    pub source: Option<String>,
    /// Id of the parser that produced the pages.
    #[serde(default)]
    pub parser: Option<String>,
    /// Hex SHA-1 of the whole source file.
    #[serde(default)]
    pub file_hash: Option<String>,
    /// Page hashes in page order.
    #[serde(default)]
    pub page_hashes: Vec<PageHash>,
    /// Output survives deletion of its source.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub keep: bool,
}

impl ConversionMetadata {
    /// Whether a host may delete this output once its source is gone.
    pub fn allows_cleanup(&self) -> bool {
        !self.keep
    }

    /// `true` when `file_hash` and `parser` both match; the source is
    /// byte-identical to what was converted last time.
    pub fn is_same_file(&self, file_hash: &str, parser: &str) -> bool {
        self.file_hash.as_deref() == Some(file_hash) && self.parser.as_deref() == Some(parser)
    }
}

/// Where previous conversion records live (e.g. output frontmatter).
pub trait MetadataStore: Send + Sync {
    fn get_metadata<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<ConversionMetadata>, BoxError>>;

    /// Render `metadata` as the prefix written in front of generated content.
    fn format_metadata(&self, metadata: &ConversionMetadata) -> String;
}
