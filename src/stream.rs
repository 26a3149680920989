//! Streaming decode API: emit pages as they finish decoding.
//!
//! Unlike [`crate::parser::NoteParser`], which returns only after every page
//! is decoded, [`decode_stream`] validates the container up front and then
//! yields [`Page`]s through a `Stream` as each one completes on the blocking
//! pool. Pages arrive in completion order; sort by `order` if order matters.
//! Pages with no decodable layers are dropped from the stream, exactly as
//! the eager parser drops them.

use crate::config::ParseOptions;
use crate::error::NoteError;
use crate::output::Page;
use crate::pipeline::container::NoteContainer;
use futures::stream::{self, StreamExt};
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of decoded pages.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<Page, NoteError>> + Send>>;

/// Decode a note container, streaming pages as they are ready.
///
/// # Returns
/// - `Ok(PageStream)`: a stream of `Result<Page, NoteError>`
/// - `Err(NoteError)`: the container itself is unreadable
///
/// # Example
/// ```rust,no_run
/// use snote_convert::{decode_stream, ParseOptions};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("meeting.note")?;
/// let mut pages = decode_stream(bytes, ParseOptions::default())?;
/// while let Some(page) = pages.next().await {
///     let page = page?;
///     println!("page {} ({}): {} bytes", page.order, page.id, page.png.len());
/// }
/// # Ok(())
/// # }
/// ```
pub fn decode_stream(bytes: impl Into<Arc<[u8]>>, options: ParseOptions) -> Result<PageStream, NoteError> {
    let data: Arc<[u8]> = bytes.into();
    let page_count = NoteContainer::open(&data)?.pages.len();
    let workers = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    info!(
        "Streaming {} page(s) over {} blocking worker(s)",
        page_count, workers
    );

    let options = Arc::new(options);
    let s = stream::iter((0..page_count).map(move |index| {
        let data = Arc::clone(&data);
        let options = Arc::clone(&options);
        async move {
            tokio::task::spawn_blocking(move || {
                // Each task re-reads the tag blocks so no borrow crosses threads.
                let container = NoteContainer::open(&data)?;
                container.decode_page(&container.pages[index], &options)
            })
            .await
            .map_err(|e| NoteError::Internal(format!("decode task failed: {e}")))?
        }
    }))
    .buffer_unordered(workers)
    .filter_map(|res: Result<Option<Page>, NoteError>| async move { res.transpose() });

    Ok(Box::pin(s))
}
