//! Byte-range and sink capabilities the archive core is written against.
//!
//! The reader only ever asks for `(offset, length)` windows and the writer
//! only ever appends or patches the already-reserved prelude, so both sides
//! are expressed as small async traits with interchangeable backends:
//! in-memory buffers, files, memory maps and (behind the `http` feature)
//! HTTP range requests.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::Result;

mod file;
mod memory;
mod mmap;

#[cfg(feature = "http")]
mod http;

pub use file::{FileReader, FileSink};
pub use memory::{MemoryReader, MemorySink};
pub use mmap::MmapReader;

#[cfg(feature = "http")]
pub use http::HttpReader;

/// Random-access byte source backing a reader.
#[async_trait]
pub trait RangeReader: Debug + Send {
    /// Fetch `length` bytes starting at `offset`.
    ///
    /// Returns exactly `length` bytes unless EOF truncates the request, in
    /// which case whatever is available comes back.
    ///
    /// # Errors
    /// Any underlying I/O failure.
    async fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>>;
}

/// Append-plus-patch byte destination backing a writer.
#[async_trait]
pub trait ByteSink: Debug + Send {
    /// Extend the archive with `data`.
    ///
    /// # Errors
    /// Any underlying I/O failure.
    async fn append(&mut self, data: &[u8]) -> Result<()>;

    /// Overwrite bytes at `offset` inside the already-written span; used at
    /// commit to patch the prelude.
    ///
    /// # Errors
    /// Any underlying I/O failure.
    async fn write_at(&mut self, data: &[u8], offset: u64) -> Result<()>;
}
