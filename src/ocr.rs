//! OCR seam and the text bookkeeping around it.
//!
//! The engine itself is a host collaborator ([`OcrEngine`]). This module
//! owns what happens to its output: the confidence filter, the per-page merge
//! of fresh and carried-over text, and recovery of previous text from
//! page-marked generator output.

use crate::error::BoxError;
use crate::output::Document;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

static PAGE_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<!-- page: (.+?) -->$").unwrap());

/// Options passed to every recognition call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrOptions {
    /// Regions below this confidence (0–100) are ignored.
    pub confidence_threshold: Option<u8>,
    /// Language hint, e.g. `"english"`.
    pub language: Option<String>,
}

/// One recognised text region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrRegion {
    pub text: String,
    /// 0–100; some engines do not report it.
    pub confidence: Option<f32>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Full engine output for one page image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    pub confidence: Option<f32>,
    pub regions: Vec<OcrRegion>,
}

/// Host-provided OCR engine.
pub trait OcrEngine: Send + Sync {
    /// Recognise text in a PNG page image.
    fn recognize<'a>(&'a self, png: &'a [u8], options: &'a OcrOptions) -> BoxFuture<'a, Result<OcrResult, BoxError>>;
}

/// Texts kept for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrTextResult {
    pub page_id: String,
    /// The page's `order`.
    pub page_index: usize,
    pub texts: Vec<String>,
}

/// Texts of regions at or above `threshold`. Regions without a confidence
/// are treated as fully confident.
pub fn filter_by_confidence(regions: &[OcrRegion], threshold: u8) -> Vec<String> {
    regions
        .iter()
        .filter(|r| r.confidence.unwrap_or(100.0) >= f32::from(threshold))
        .map(|r| r.text.clone())
        .collect()
}

/// OCR results for `document` in page order.
///
/// Removed pages are skipped. A fresh result wins. Pages in `refreshed` were
/// re-rendered this run and never fall back to `previous`; any other page
/// keeps its previous text if that is non-empty. Everything else is left out.
pub fn merge_ocr_results(
    document: &Document,
    previous: &HashMap<String, Vec<String>>,
    fresh: &HashMap<String, OcrTextResult>,
    refreshed: &HashSet<&str>,
    removed: &[String],
) -> Vec<OcrTextResult> {
    let removed: HashSet<&str> = removed.iter().map(String::as_str).collect();
    let mut pages: Vec<_> = document.pages.iter().collect();
    pages.sort_by_key(|p| p.order);

    pages
        .into_iter()
        .filter(|page| !removed.contains(page.id.as_str()))
        .filter_map(|page| {
            if let Some(result) = fresh.get(&page.id) {
                return Some(result.clone());
            }
            if refreshed.contains(page.id.as_str()) {
                return None;
            }
            previous
                .get(&page.id)
                .filter(|texts| !texts.is_empty())
                .map(|texts| OcrTextResult {
                    page_id: page.id.clone(),
                    page_index: page.order,
                    texts: texts.clone(),
                })
        })
        .collect()
}

/// Recover per-page text from output written with `<!-- page: ID -->`
/// markers. Blank lines are dropped; pages with no text are omitted; lines
/// before the first marker are ignored.
pub fn parse_page_markers<'a>(lines: impl IntoIterator<Item = &'a str>) -> HashMap<String, Vec<String>> {
    let mut result = HashMap::new();
    let mut current: Option<(String, Vec<String>)> = None;

    fn flush(result: &mut HashMap<String, Vec<String>>, page: Option<(String, Vec<String>)>) {
        if let Some((id, texts)) = page {
            let texts: Vec<String> = texts.into_iter().filter(|t| !t.is_empty()).collect();
            if !texts.is_empty() {
                result.insert(id, texts);
            }
        }
    }

    for line in lines {
        if let Some(caps) = PAGE_MARKER_RE.captures(line) {
            flush(&mut result, current.take());
            current = Some((caps[1].to_string(), Vec::new()));
        } else if let Some((_, texts)) = current.as_mut() {
            texts.push(line.to_string());
        }
    }
    flush(&mut result, current);
    result
}
