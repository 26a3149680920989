//! # snote-convert
//!
//! Decode handwritten-note containers into page images and re-convert them
//! incrementally.
//!
//! The crate has two halves:
//!
//! * a decoder for the vendor `.note` container: tag blocks, run-length and
//!   deflate layer bitmaps, per-device color tables and layer compositing,
//!   ending in one PNG plus a content hash per page;
//! * a change-aware orchestrator that compares those hashes with the last
//!   conversion, decides between skipping, patching and rebuilding, and reuses
//!   OCR text for pages that did not change.
//!
//! OCR engines, output generators, metadata storage and output writing are
//! host collaborators behind traits.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .note bytes
//!  │
//!  ├─ 1. Open     signature, footer, header, page records
//!  ├─ 2. Decode   layers per page (RLE / deflate / PNG background)
//!  ├─ 3. Flatten  composite layers, encode PNG, hash
//!  ├─ 4. Diff     none / content-only / append / structural / full
//!  ├─ 5. OCR      only the pages that need it, concurrently
//!  └─ 6. Output   generate or incrementally update, plus fresh metadata
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snote_convert::{DocumentParser, NoteParser};
//!
//! let bytes = std::fs::read("meeting.note")?;
//! let document = NoteParser::default().parse(&bytes)?;
//! for page in &document.pages {
//!     std::fs::write(format!("{}.png", page.id), &page.png)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `snote` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! snote-convert = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod diff;
pub mod error;
pub mod generator;
pub mod metadata;
pub mod ocr;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ParseOptions};
pub use convert::{ConversionOutcome, ConversionResult, Converter, PreviousOutput, SkipReason};
pub use diff::{classify, DiffKind, PageDiff};
pub use error::{BoxError, ConversionError, ConversionPhase, NoteError};
pub use generator::{save_output, FsOutputWriter, Generator, GeneratorOutput, IncrementalInput, OutputWriter, PageUpdate};
pub use metadata::{ConversionMetadata, MetadataStore, PageHash};
pub use ocr::{OcrEngine, OcrOptions, OcrRegion, OcrResult, OcrTextResult};
pub use output::{Document, Page};
pub use parser::{DocumentParser, NoteParser};
pub use pipeline::container::NoteContainer;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{decode_stream, PageStream};
