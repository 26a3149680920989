//! Change-aware conversion of one source file.
//!
//! [`Converter::convert`] walks a fixed sequence:
//!
//! 1. Hash the whole file; an unchanged file with the same parser is skipped
//!    before any decoding.
//! 2. Parse on the blocking pool.
//! 3. Classify page hashes against the saved metadata ([`crate::diff`]).
//! 4. OCR either every page (full / structural) or only added and changed
//!    pages (append / content-only), concurrently.
//! 5. Generate from scratch, or hand the generator an incremental update
//!    with the previous run's OCR text merged in.
//! 6. Return the output with fresh metadata built from the current page
//!    hashes. Nothing is persisted here; see [`Converter::save`].
//!
//! Any failure abandons the attempt with a [`ConversionError`] naming the
//! phase, and no metadata is produced.

use crate::config::ConversionConfig;
use crate::diff::{classify, DiffKind, PageDiff};
use crate::error::{BoxError, ConversionError, ConversionPhase, NoteError};
use crate::generator::{save_output, Generator, GeneratorOutput, IncrementalInput, OutputWriter, PageUpdate};
use crate::metadata::{ConversionMetadata, MetadataStore};
use crate::ocr::{filter_by_confidence, merge_ocr_results, parse_page_markers, OcrEngine, OcrOptions, OcrTextResult};
use crate::output::{Document, Page};
use crate::parser::{DocumentParser, NoteParser};
use crate::pipeline::encode::content_hash;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the previous conversion left on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviousOutput {
    pub content: String,
    pub assets: BTreeMap<String, Vec<u8>>,
    /// OCR text per page id.
    pub ocr_by_page: HashMap<String, Vec<String>>,
}

impl PreviousOutput {
    /// Rebuild from generated content, recovering OCR text from its
    /// `<!-- page: ID -->` markers.
    pub fn from_content(content: impl Into<String>, assets: BTreeMap<String, Vec<u8>>) -> Self {
        let content = content.into();
        let ocr_by_page = parse_page_markers(content.lines());
        Self {
            content,
            assets,
            ocr_by_page,
        }
    }
}

/// Why nothing was regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Byte-identical source, same parser.
    UnchangedFile,
    /// The file changed but every page hashes the same.
    UnchangedPages,
}

/// A completed conversion.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub output: GeneratorOutput,
    /// Persist this alongside the output; the next run diffs against it.
    pub metadata: ConversionMetadata,
    pub diff: PageDiff,
    /// Pages sent to OCR in this run.
    pub recognized_pages: usize,
}

#[derive(Debug, Clone)]
pub enum ConversionOutcome {
    Skipped(SkipReason),
    Converted(ConversionResult),
}

/// Drives parse → diff → OCR → generate for one source at a time.
///
/// Callers must not run two conversions of the same source concurrently.
pub struct Converter {
    parser: Arc<dyn DocumentParser>,
    generator: Arc<dyn Generator>,
    metadata: Arc<dyn MetadataStore>,
    ocr: Option<Arc<dyn OcrEngine>>,
    config: ConversionConfig,
}

impl Converter {
    pub fn new(
        parser: Arc<dyn DocumentParser>,
        generator: Arc<dyn Generator>,
        metadata: Arc<dyn MetadataStore>,
        config: ConversionConfig,
    ) -> Self {
        Self {
            parser,
            generator,
            metadata,
            ocr: None,
            config,
        }
    }

    /// A converter over [`NoteParser`] built from `config.parse`.
    pub fn for_notes(generator: Arc<dyn Generator>, metadata: Arc<dyn MetadataStore>, config: ConversionConfig) -> Self {
        let parser = Arc::new(NoteParser::new(config.parse.clone()));
        Self::new(parser, generator, metadata, config)
    }

    /// Recognise page text with `engine`. Without one, output carries no OCR.
    pub fn with_ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert `data` for `source_id`, reusing `previous` where the page
    /// diff allows it.
    pub async fn convert(
        &self,
        source_id: &str,
        output_name: &str,
        data: impl Into<Arc<[u8]>>,
        previous: Option<PreviousOutput>,
    ) -> Result<ConversionOutcome, ConversionError> {
        let data: Arc<[u8]> = data.into();
        let file_hash = content_hash(&data);
        info!("Converting {} ({} bytes)", source_id, data.len());

        let saved = self
            .metadata
            .get_metadata(source_id)
            .await
            .map_err(|e| ConversionError::wrap(ConversionPhase::Parse, e))?;

        if let Some(saved) = &saved {
            if saved.is_same_file(&file_hash, self.parser.id()) {
                info!("{} unchanged since last conversion, skipping", source_id);
                return Ok(ConversionOutcome::Skipped(SkipReason::UnchangedFile));
            }
        }

        let document = self.parse(Arc::clone(&data)).await?;
        let page_hashes = document.page_hashes();
        let saved_hashes = saved
            .as_ref()
            .map(|m| m.page_hashes.as_slice())
            .filter(|hashes| !hashes.is_empty());
        let diff = classify(&page_hashes, saved_hashes);
        info!(
            "{}: {} (added {}, changed {}, removed {}, unchanged {})",
            source_id,
            diff.kind,
            diff.added.len(),
            diff.changed.len(),
            diff.removed.len(),
            diff.unchanged.len()
        );

        let (output, recognized_pages) = match (diff.kind, previous) {
            (DiffKind::None, _) => {
                return Ok(ConversionOutcome::Skipped(SkipReason::UnchangedPages));
            }
            (DiffKind::Append | DiffKind::ContentOnly, Some(previous)) => {
                self.regenerate_partial(&document, &diff, previous, output_name)
                    .await?
            }
            (kind, previous) => {
                if previous.is_none() && !kind.is_full_rebuild() {
                    warn!(
                        "{}: {} change but no previous output, rebuilding everything",
                        source_id, kind
                    );
                }
                self.regenerate_full(&document, output_name).await?
            }
        };

        let metadata = ConversionMetadata {
            source: Some(source_id.to_string()),
            parser: Some(self.parser.id().to_string()),
            file_hash: Some(file_hash),
            page_hashes,
            keep: saved.as_ref().is_some_and(|m| m.keep),
        };

        Ok(ConversionOutcome::Converted(ConversionResult {
            output,
            metadata,
            diff,
            recognized_pages,
        }))
    }

    /// One-off conversion of a file with no tracked source. Always a full
    /// rebuild; the resulting metadata has no source and is kept on cleanup.
    pub async fn convert_dropped(
        &self,
        output_name: &str,
        data: impl Into<Arc<[u8]>>,
    ) -> Result<ConversionResult, ConversionError> {
        let data: Arc<[u8]> = data.into();
        let file_hash = content_hash(&data);
        let document = self.parse(data).await?;
        let page_hashes = document.page_hashes();
        let diff = classify(&page_hashes, None);

        let (output, recognized_pages) = self.regenerate_full(&document, output_name).await?;

        Ok(ConversionResult {
            output,
            metadata: ConversionMetadata {
                source: None,
                parser: Some(self.parser.id().to_string()),
                file_hash: Some(file_hash),
                page_hashes,
                keep: true,
            },
            diff,
            recognized_pages,
        })
    }

    /// Persist a result through `writer`, prefixed with its rendered metadata.
    pub async fn save(
        &self,
        writer: &dyn OutputWriter,
        result: &ConversionResult,
        output_dir: &Path,
        output_name: &str,
    ) -> Result<PathBuf, ConversionError> {
        save_output(
            writer,
            self.metadata.as_ref(),
            &result.output,
            output_dir,
            output_name,
            &result.metadata,
        )
        .await
    }

    async fn parse(&self, data: Arc<[u8]>) -> Result<Document, ConversionError> {
        let parser = Arc::clone(&self.parser);
        let document = tokio::task::spawn_blocking(move || parser.parse(&data))
            .await
            .map_err(|e| {
                ConversionError::new(
                    ConversionPhase::Parse,
                    NoteError::Internal(format!("parse task failed: {e}")),
                )
            })?
            .map_err(|e| ConversionError::new(ConversionPhase::Parse, e))?;
        debug!("Parsed {} page(s)", document.pages.len());
        Ok(document)
    }

    async fn regenerate_full(
        &self,
        document: &Document,
        output_name: &str,
    ) -> Result<(GeneratorOutput, usize), ConversionError> {
        let pages: Vec<&Page> = document.pages.iter().collect();
        let recognized = pages.len();
        let fresh = self.recognize(&pages).await?;
        let ocr = merge_ocr_results(document, &HashMap::new(), &fresh, &HashSet::new(), &[]);

        debug!("Generating {} with {}", output_name, self.generator.id());
        let output = self
            .generator
            .generate(document, output_name, &ocr)
            .map_err(|e| ConversionError::wrap(ConversionPhase::Generate, e))?;
        Ok((output, recognized))
    }

    async fn regenerate_partial(
        &self,
        document: &Document,
        diff: &PageDiff,
        previous: PreviousOutput,
        output_name: &str,
    ) -> Result<(GeneratorOutput, usize), ConversionError> {
        let dirty: HashSet<&str> = diff.dirty();
        let pages: Vec<&Page> = document
            .pages
            .iter()
            .filter(|p| dirty.contains(p.id.as_str()))
            .collect();
        let recognized = pages.len();
        let mut fresh = self.recognize(&pages).await?;
        let ocr_results = merge_ocr_results(document, &previous.ocr_by_page, &fresh, &dirty, &diff.removed);

        let updates = pages
            .into_iter()
            .map(|page| {
                let update = PageUpdate {
                    page: page.clone(),
                    ocr: fresh.remove(&page.id),
                };
                (page.id.clone(), update)
            })
            .collect();

        let input = IncrementalInput {
            existing_content: previous.content,
            existing_assets: previous.assets,
            updates,
            removed_page_ids: diff.removed.clone(),
            ocr_results,
        };

        debug!(
            "Updating {} with {} ({} page(s) replaced)",
            output_name,
            self.generator.id(),
            input.updates.len()
        );
        let output = self
            .generator
            .incremental_update(input, document, output_name)
            .map_err(|e| ConversionError::wrap(ConversionPhase::Generate, e))?;
        Ok((output, recognized))
    }

    /// OCR `pages` concurrently. Pages whose filtered text is empty get no
    /// entry. The first failure cancels the rest.
    async fn recognize(&self, pages: &[&Page]) -> Result<HashMap<String, OcrTextResult>, ConversionError> {
        let mut results = HashMap::new();
        let Some(engine) = self.ocr.as_ref() else {
            return Ok(results);
        };

        let threshold = self.config.confidence_threshold;
        let options = OcrOptions {
            confidence_threshold: Some(threshold),
            language: self.config.language.clone(),
        };
        let callback = self.config.progress_callback.as_ref();
        let pages: Vec<&Page> = pages.iter().copied().filter(|p| !p.png.is_empty()).collect();
        let total = pages.len();
        if let Some(cb) = callback {
            cb.on_conversion_start(total);
        }

        let options = &options;
        let mut pending = stream::iter(pages.into_iter().map(|page| async move {
            if let Some(cb) = callback {
                cb.on_page_start(&page.id, total);
            }
            let result: Result<_, BoxError> = engine.recognize(&page.png, options).await;
            (page, result)
        }))
        .buffer_unordered(self.config.concurrency.max(1));

        let mut done = 0usize;
        while let Some((page, result)) = pending.next().await {
            let result = match result {
                Ok(r) => r,
                Err(e) => {
                    warn!("OCR failed on page {}: {}", page.id, e);
                    if let Some(cb) = callback {
                        cb.on_page_error(&page.id, &e.to_string());
                    }
                    return Err(ConversionError::wrap(ConversionPhase::Ocr, e));
                }
            };

            done += 1;
            let texts = filter_by_confidence(&result.regions, threshold);
            debug!(
                "OCR page {}: kept {}/{} region(s)",
                page.id,
                texts.len(),
                result.regions.len()
            );
            if let Some(cb) = callback {
                cb.on_page_complete(&page.id, done, total, texts.len());
            }
            if !texts.is_empty() {
                results.insert(
                    page.id.clone(),
                    OcrTextResult {
                        page_id: page.id.clone(),
                        page_index: page.order,
                        texts,
                    },
                );
            }
        }

        if let Some(cb) = callback {
            cb.on_conversion_complete(total, done);
        }
        Ok(results)
    }
}
