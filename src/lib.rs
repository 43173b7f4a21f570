//! # `tilepack`
//!
//! A low level reader and writer for single-file tiled-data archives that
//! address pre-rendered map tiles by Hilbert quadtree coordinate. Two wire
//! flavors share one format: **planar** archives carry a single quadtree,
//! **cubic** archives carry one quadtree per face of a cubed-sphere
//! projection. Both use the same varint-packed directories, run-length tile
//! entries, pluggable compression and fixed 98 304-byte prelude, so a reader
//! can bootstrap from one range request.
//!
//! ## Examples
//!
//! ### Writing and reading an in-memory archive
//! ```rust
//! use tilepack::io::{MemoryReader, MemorySink};
//! use tilepack::{Compression, TilePackReader, TilePackWriter, TileType, WriterOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = WriterOptions::new(TileType::Png, Compression::None);
//!     let mut writer = TilePackWriter::new(MemorySink::new(), options).await?;
//!     writer.write_tile(0, 0, 0, b"hello world").await?;
//!     let sink = writer.commit(None).await?;
//!
//!     let mut reader = TilePackReader::new(MemoryReader::new(sink.into_inner()));
//!     let tile = reader.get_tile(0, 0, 0).await?;
//!     assert_eq!(tile.as_deref(), Some(&b"hello world"[..]));
//!     Ok(())
//! }
//! ```
//!
//! ### Writing a cubed-sphere archive to a file
//! ```rust,no_run
//! use tilepack::io::FileSink;
//! use tilepack::{Compression, Face, TilePackWriter, TileType, WriterOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sink = FileSink::create("./planet.tilepack").await?;
//!     let options = WriterOptions::new(TileType::Pbf, Compression::Gzip);
//!     let mut writer = TilePackWriter::new(sink, options).await?;
//!     writer.write_tile_face(Face::Face2, 4, 3, 9, b"...").await?;
//!     writer.commit(None).await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod cache;

mod directory;

mod header;

/// Errors for the module
pub mod error;

/// Pluggable block compression keyed by the archive's compression tags.
pub mod compression;

/// Byte-range provider and sink capabilities plus the bundled backends.
pub mod io;

/// Reads a tiled archive.
pub mod reader;

/// Hilbert tile-id coding.
pub mod tile_id;

/// Varint coding used by the directory format.
pub mod varint;

/// Writes a tiled archive.
pub mod writer;

pub use cache::{DirectoryCache, DEFAULT_CACHE_CAPACITY};
pub use directory::{find_tile, Directory, Entry};
pub use error::{Error, Result};
pub use header::{
    Compression, Face, Flavor, Header, TileType, HEADER_SIZE_CUBIC, HEADER_SIZE_PLANAR,
    PRELUDE_SIZE,
};
pub use reader::TilePackReader;
pub use tile_id::{tile_id, TileCoord, MAX_ZOOM};
pub use writer::{TilePackWriter, WriterOptions};
