//! Generator seam and output persistence.
//!
//! A [`Generator`] turns a [`Document`] plus OCR text into output content and
//! assets (one PNG per page, typically). The orchestrator calls either
//! [`Generator::generate`] for a rebuild or [`Generator::incremental_update`]
//! when only some pages changed. [`save_output`] then writes the result
//! through an [`OutputWriter`].

use crate::error::{BoxError, ConversionError, ConversionPhase};
use crate::metadata::{ConversionMetadata, MetadataStore};
use crate::ocr::OcrTextResult;
use crate::output::{Document, Page};
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Generated content plus its assets, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorOutput {
    pub content: String,
    pub assets: BTreeMap<String, Vec<u8>>,
    /// File extension including the dot, e.g. `.md`.
    pub extension: String,
}

/// A page produced in this run, with its fresh OCR text if any survived the
/// confidence filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUpdate {
    pub page: Page,
    pub ocr: Option<OcrTextResult>,
}

/// Everything a generator needs to patch a previous output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncrementalInput {
    pub existing_content: String,
    pub existing_assets: BTreeMap<String, Vec<u8>>,
    /// Added and changed pages, by id.
    pub updates: HashMap<String, PageUpdate>,
    pub removed_page_ids: Vec<String>,
    /// Fresh and carried-over OCR merged in page order.
    pub ocr_results: Vec<OcrTextResult>,
}

/// Host-provided output generator.
pub trait Generator: Send + Sync {
    /// Stable id, used in logs.
    fn id(&self) -> &str;

    fn generate(
        &self,
        document: &Document,
        output_name: &str,
        ocr: &[OcrTextResult],
    ) -> Result<GeneratorOutput, BoxError>;

    fn incremental_update(
        &self,
        input: IncrementalInput,
        document: &Document,
        output_name: &str,
    ) -> Result<GeneratorOutput, BoxError>;
}

/// Where generated files end up.
pub trait OutputWriter: Send + Sync {
    fn write_file<'a>(&'a self, path: &'a Path, content: &'a str) -> BoxFuture<'a, Result<(), BoxError>>;

    fn write_asset<'a>(&'a self, dir: &'a Path, name: &'a str, data: &'a [u8]) -> BoxFuture<'a, Result<(), BoxError>>;
}

/// Writes to the local filesystem. Content files are written to a temporary
/// sibling first and renamed into place.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOutputWriter;

impl OutputWriter for FsOutputWriter {
    fn write_file<'a>(&'a self, path: &'a Path, content: &'a str) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut tmp = path.as_os_str().to_owned();
            tmp.push(".tmp");
            let tmp = PathBuf::from(tmp);
            tokio::fs::write(&tmp, content).await?;
            tokio::fs::rename(&tmp, path).await?;
            Ok::<(), BoxError>(())
        })
    }

    fn write_asset<'a>(&'a self, dir: &'a Path, name: &'a str, data: &'a [u8]) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(dir.join(name), data).await?;
            Ok::<(), BoxError>(())
        })
    }
}

/// Write `metadata` + content to `<output_dir>/<output_name><ext>` and every
/// asset to `<output_dir>/assets/<output_name>/`. Returns the content path.
///
/// Failures are reported as [`ConversionPhase::Save`].
pub async fn save_output(
    writer: &dyn OutputWriter,
    store: &dyn MetadataStore,
    output: &GeneratorOutput,
    output_dir: &Path,
    output_name: &str,
    metadata: &ConversionMetadata,
) -> Result<PathBuf, ConversionError> {
    let path = output_dir.join(format!("{output_name}{}", output.extension));
    let content = format!("{}{}", store.format_metadata(metadata), output.content);

    writer
        .write_file(&path, &content)
        .await
        .map_err(|e| ConversionError::wrap(ConversionPhase::Save, e))?;

    if !output.assets.is_empty() {
        let assets_dir = output_dir.join("assets").join(output_name);
        for (name, data) in &output.assets {
            debug!("Writing asset {} ({} bytes)", name, data.len());
            writer
                .write_asset(&assets_dir, name, data)
                .await
                .map_err(|e| ConversionError::wrap(ConversionPhase::Save, e))?;
        }
    }

    info!(
        "Saved {} with {} asset(s)",
        path.display(),
        output.assets.len()
    );
    Ok(path)
}
