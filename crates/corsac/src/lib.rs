//! Corsac - Compressed Time Series Storage Core
//!
//! This crate provides the storage core of the Corsac time series database:
//! a bit-level compression codec, an immutable chunk container and the
//! cursor machinery that reads chunks back as one merged stream.
//!
//! # Components
//!
//! - [`RecordEncoder`] / [`RecordDecoder`]: delta-of-delta, XOR and
//!   same-or-varint compression for `(time, value, flag)` records
//! - [`Chunk`]: append-only compressed block with bloom and checksum
//!   metadata
//! - [`Cursor`] / [`CursorPlanner`]: chunk readers and the overlap-aware
//!   query plan
//!
//! # Example
//!
//! ```rust,ignore
//! use corsac::{Chunk, CursorPlanner, Record};
//!
//! // Fill a chunk until it seals itself
//! let mut chunk = Chunk::create(1024, Record::new(series, t0, flag, v0));
//! for rec in samples {
//!     if chunk.append(rec).is_err() {
//!         break; // sealed, start the next chunk
//!     }
//! }
//! chunk.close();
//!
//! // Read a set of chunks back as one time-ordered stream
//! let readers = chunks.iter().map(Chunk::get_reader).collect::<Result<_, _>>()?;
//! let mut cursor = CursorPlanner::plan(readers)?;
//! while let Some(rec) = cursor.read_next() {
//!     // records arrive in ascending time order, duplicates dropped
//! }
//! ```

#![deny(missing_docs)]

pub mod chunk;
pub mod codec;
pub mod cursor;
pub mod error;
pub mod record;

pub use chunk::{Chunk, ChunkHeader, ChunkKind, FlagBloom};
pub use codec::{RecordDecoder, RecordEncoder};
pub use cursor::{Cursor, CursorPlanner, LinearCursor, MergeCursor, SingleCursor};
pub use error::{Result, StoreError};
pub use record::{Flag, Record, SeriesId, TimeRange, Timestamp};
