use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::cache::{DirectoryCache, DEFAULT_CACHE_CAPACITY};
use crate::compression::decompress;
use crate::directory::{find_tile, Directory};
use crate::error::{Error, Result};
use crate::header::{Compression, Face, Flavor, Header, HEADER_SIZE_PLANAR, PRELUDE_SIZE};
use crate::io::RangeReader;
use crate::tile_id::TileCoord;

/// Root plus up to three leaf levels; anything deeper is a corrupt archive.
const MAX_DIRECTORY_DEPTH: usize = 4;

/// Everything the one-shot prelude fetch yields: the header, the pre-decoded
/// root directory of every face, and the decompressed metadata bytes.
#[derive(Debug)]
struct Prelude {
    header: Header,
    roots: [Arc<Directory>; 6],
    metadata_bytes: Vec<u8>,
}

/// Reads tiles out of a planar or cubic archive.
///
/// The first operation fetches the fixed 98 304-byte prelude in a single
/// range request and decodes the header and root directories from it; later
/// lookups only touch the archive for leaf directories (cached) and tile
/// payloads.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug)]
pub struct TilePackReader<R> {
    source: R,
    prelude: Option<Prelude>,
    metadata: Option<Value>,
    cache: DirectoryCache,
}

impl<R> TilePackReader<R>
where
    R: RangeReader,
{
    /// Create a reader over `source` with the default directory cache.
    pub fn new(source: R) -> Self {
        Self::with_cache_capacity(source, DEFAULT_CACHE_CAPACITY)
    }

    /// Create a reader whose leaf-directory cache holds `capacity` entries.
    pub fn with_cache_capacity(source: R, capacity: usize) -> Self {
        Self {
            source,
            prelude: None,
            metadata: None,
            cache: DirectoryCache::new(capacity),
        }
    }

    /// The archive header, fetching the prelude on first use.
    ///
    /// # Errors
    /// [`Error::MalformedHeader`] on an unrecognized archive; any I/O or
    /// decompression failure from the prelude fetch.
    pub async fn header(&mut self) -> Result<Header> {
        self.ensure_ready().await?;
        match &self.prelude {
            Some(prelude) => Ok(prelude.header.clone()),
            None => Err(Error::MalformedHeader("prelude unavailable".into())),
        }
    }

    /// The archive's JSON metadata, or `None` when the archive carries none.
    ///
    /// The blob is decompressed during the prelude fetch but only parsed
    /// here, on first request.
    ///
    /// # Errors
    /// [`Error::Metadata`] if the blob is not valid JSON; any prelude-fetch
    /// failure.
    pub async fn metadata(&mut self) -> Result<Option<Value>> {
        self.ensure_ready().await?;
        if let Some(value) = &self.metadata {
            return Ok(Some(value.clone()));
        }

        let bytes = match &self.prelude {
            Some(prelude) if !prelude.metadata_bytes.is_empty() => &prelude.metadata_bytes,
            _ => return Ok(None),
        };
        let value: Value = serde_json::from_slice(bytes)?;
        self.metadata = Some(value.clone());
        Ok(Some(value))
    }

    /// Fetch the payload of a planar tile (face 0).
    ///
    /// Returns `Ok(None)` when the tile is not in the archive.
    ///
    /// # Errors
    /// [`Error::InvalidCoordinate`], [`Error::DepthExceeded`],
    /// [`Error::EmptyDirectory`], plus any I/O or decompression failure.
    pub async fn get_tile(&mut self, zoom: u8, x: u64, y: u64) -> Result<Option<Vec<u8>>> {
        self.get_tile_face(Face::Face0, zoom, x, y).await
    }

    /// Fetch the payload of a tile on a cubed-sphere face.
    ///
    /// On a planar archive faces 1..5 hold no tiles, so lookups there come
    /// back `Ok(None)`.
    ///
    /// # Errors
    /// See [`Self::get_tile`].
    pub async fn get_tile_face(
        &mut self,
        face: Face,
        zoom: u8,
        x: u64,
        y: u64,
    ) -> Result<Option<Vec<u8>>> {
        self.ensure_ready().await?;
        let (header, root, root_offset) = match &self.prelude {
            Some(prelude) => (
                prelude.header.clone(),
                prelude.roots[face.index()].clone(),
                prelude.header.root_slot(face).0,
            ),
            None => return Err(Error::MalformedHeader("prelude unavailable".into())),
        };

        // written zoom range bounds the archive; skip the walk entirely
        if zoom < header.min_zoom || zoom > header.max_zoom {
            return Ok(None);
        }

        let tile_id = TileCoord::new(zoom, x, y).to_id()?;
        let (leaf_offset, _) = header.leaf_slot(face);
        let (mut dir_offset, mut dir_length) = header.root_slot(face);

        for level in 0..MAX_DIRECTORY_DEPTH {
            let directory = if dir_offset == root_offset {
                // the face's root is always resident; no cache round-trip
                root.clone()
            } else {
                self.load_directory(dir_offset, dir_length, header.internal_compression)
                    .await?
            };

            let Some(entry) = find_tile(&directory.entries, tile_id) else {
                return Ok(None);
            };

            if entry.run_length > 0 {
                trace!(tile_id, level, offset = entry.offset, "tile hit");
                let data = self
                    .source
                    .read_range(header.tile_data_offset + entry.offset, u64::from(entry.length))
                    .await?;
                let payload = decompress(&data, header.tile_compression).await?;
                return Ok(Some(payload));
            }

            // leaf pointer; descend
            dir_offset = leaf_offset + entry.offset;
            dir_length = u64::from(entry.length);
        }

        Err(Error::DepthExceeded)
    }

    /// Load a leaf directory through the cache.
    async fn load_directory(
        &mut self,
        offset: u64,
        length: u64,
        internal_compression: Compression,
    ) -> Result<Arc<Directory>> {
        if let Some(directory) = self.cache.get(offset) {
            return Ok(directory);
        }

        let raw = self.source.read_range(offset, length).await?;
        let bytes = decompress(&raw, internal_compression).await?;
        let directory = Directory::deserialize(&bytes)?;
        if directory.is_empty() {
            return Err(Error::EmptyDirectory);
        }

        let directory = Arc::new(directory);
        self.cache.set(offset, Arc::clone(&directory));
        Ok(directory)
    }

    /// One-shot prelude fetch and decode.
    async fn ensure_ready(&mut self) -> Result<()> {
        if self.prelude.is_some() {
            return Ok(());
        }

        let data = self.source.read_range(0, PRELUDE_SIZE as u64).await?;
        if data.len() < HEADER_SIZE_PLANAR {
            return Err(Error::MalformedHeader(format!(
                "archive is {} bytes, shorter than a planar header",
                data.len()
            )));
        }
        let header = Header::decode(&data)?;
        trace!(?header.flavor, "prelude loaded");

        let metadata_bytes = if header.metadata_length == 0 {
            Vec::new()
        } else {
            let raw = slice_prelude(&data, header.metadata_offset, header.metadata_length)?;
            decompress(raw, header.internal_compression).await?
        };

        let mut roots: [Arc<Directory>; 6] = Default::default();
        let faces: &[Face] = match header.flavor {
            Flavor::Planar => &[Face::Face0],
            Flavor::Cubic => &Face::ALL,
        };
        for &face in faces {
            let (offset, length) = header.root_slot(face);
            if length == 0 {
                continue;
            }
            let raw = slice_prelude(&data, offset, length)?;
            let bytes = decompress(raw, header.internal_compression).await?;
            roots[face.index()] = Arc::new(Directory::deserialize(&bytes)?);
        }

        self.prelude = Some(Prelude {
            header,
            roots,
            metadata_bytes,
        });
        Ok(())
    }
}

/// Bounds-checked view into the prelude buffer.
fn slice_prelude(data: &[u8], offset: u64, length: u64) -> Result<&[u8]> {
    let start = usize::try_from(offset).ok();
    let end = usize::try_from(offset.saturating_add(length)).ok();
    match (start, end) {
        (Some(start), Some(end)) if end <= data.len() => Ok(&data[start..end]),
        _ => Err(Error::MalformedHeader(format!(
            "prelude span {offset}+{length} is out of bounds"
        ))),
    }
}
