//! Configuration types for note decoding and conversion.
//!
//! Decoding knobs live in [`ParseOptions`]; everything the conversion
//! orchestrator needs on top of that lives in [`ConversionConfig`], built via
//! [`ConversionConfigBuilder`]. Setters clamp out-of-range values, and
//! [`ConversionConfigBuilder::build`] rejects combinations that cannot work.

use crate::error::NoteError;
use crate::pipeline::codec::DEFAULT_MAX_INFLATE_BYTES;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default minimum OCR region confidence (0–100).
pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 50;

/// Options for the container decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Ceiling on the inflated size of one deflate layer. Default: 20 MiB.
    ///
    /// A legitimate full-page layer inflates to a few MiB; anything past the
    /// ceiling is rejected as corrupt or hostile.
    pub max_inflate_bytes: usize,

    /// Decode pages on the rayon pool. Default: true.
    pub parallel_pages: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_inflate_bytes: DEFAULT_MAX_INFLATE_BYTES,
            parallel_pages: true,
        }
    }
}

/// Configuration for a conversion run.
///
/// # Example
/// ```rust
/// use snote_convert::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .concurrency(2)
///     .confidence_threshold(70)
///     .language("english")
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 2);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Concurrent OCR calls. Default: 4.
    ///
    /// Most OCR backends serialise internally; higher values only help with
    /// remote engines.
    pub concurrency: usize,

    /// OCR regions below this confidence (0–100) are dropped. Default: 50.
    pub confidence_threshold: u8,

    /// Language hint passed to the OCR engine.
    pub language: Option<String>,

    /// Decoder options.
    pub parse: ParseOptions,

    /// Per-page OCR progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            language: None,
            parse: ParseOptions::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("concurrency", &self.concurrency)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("language", &self.language)
            .field("parse", &self.parse)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn confidence_threshold(mut self, threshold: u8) -> Self {
        self.config.confidence_threshold = threshold.min(100);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = Some(language.into());
        self
    }

    pub fn max_inflate_bytes(mut self, bytes: usize) -> Self {
        self.config.parse.max_inflate_bytes = bytes;
        self
    }

    pub fn parallel_pages(mut self, v: bool) -> Self {
        self.config.parse.parallel_pages = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, NoteError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(NoteError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        if c.parse.max_inflate_bytes == 0 {
            return Err(NoteError::InvalidConfig(
                "inflate ceiling must be greater than zero".into(),
            ));
        }
        Ok(self.config)
    }
}
