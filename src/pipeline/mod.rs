//! Decoding stages for the note container.
//!
//! Each submodule implements one step; everything here is synchronous and
//! works on an in-memory buffer.
//!
//! ## Data Flow
//!
//! ```text
//! container ──▶ codec ──▶ composite ──▶ encode
//! (tags, ptrs)  (RLE/zlib) (layers)     (PNG + SHA-1)
//! ```
//!
//! 1. [`cursor`] / [`tags`]: positional reads and `<KEY:VALUE>` blocks
//! 2. [`container`]: signature, footer, header, page and layer records
//! 3. [`codec`]: per-layer pixel decoding, using the palette from [`device`]
//! 4. [`composite`]: back-to-front layer flattening
//! 5. [`encode`]: PNG encoding and the page content hash

pub mod codec;
pub mod composite;
pub mod container;
pub mod cursor;
pub mod device;
pub mod encode;
pub mod tags;
