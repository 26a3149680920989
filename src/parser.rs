//! Parser seam: bytes in, [`Document`] out.

use crate::config::ParseOptions;
use crate::error::NoteError;
use crate::output::{Document, Page};
use crate::pipeline::container::{NoteContainer, PageRecord};
use rayon::prelude::*;
use tracing::info;

/// Parser id recorded in conversion metadata.
pub const NOTE_PARSER_ID: &str = "note";

/// Anything that turns a source file into rendered pages.
pub trait DocumentParser: Send + Sync {
    /// Stable id; stored in metadata so a parser change forces re-conversion.
    fn id(&self) -> &str;

    fn parse(&self, data: &[u8]) -> Result<Document, NoteError>;
}

/// Parser for the vendor note container.
#[derive(Debug, Clone, Default)]
pub struct NoteParser {
    options: ParseOptions,
}

impl NoteParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }
}

impl DocumentParser for NoteParser {
    fn id(&self) -> &str {
        NOTE_PARSER_ID
    }

    fn parse(&self, data: &[u8]) -> Result<Document, NoteError> {
        let container = NoteContainer::open(data)?;
        let decode = |record: &PageRecord| container.decode_page(record, &self.options);

        let decoded: Vec<Option<Page>> = if self.options.parallel_pages {
            container
                .pages
                .par_iter()
                .map(decode)
                .collect::<Result<_, _>>()?
        } else {
            container
                .pages
                .iter()
                .map(decode)
                .collect::<Result<_, _>>()?
        };

        let pages: Vec<Page> = decoded.into_iter().flatten().collect();
        info!(
            "Decoded {}/{} page(s)",
            pages.len(),
            container.pages.len()
        );
        Ok(Document::new("Untitled", pages))
    }
}
