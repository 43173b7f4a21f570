use std::collections::HashMap;

use ahash::RandomState;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::compression::compress;
use crate::directory::{Directory, Entry};
use crate::error::{Error, Result};
use crate::header::{Compression, Face, Flavor, Header, TileType, PRELUDE_SIZE};
use crate::io::ByteSink;
use crate::tile_id::TileCoord;

/// Entries per leaf directory on the first partitioning attempt; doubled
/// until the root fits its budget.
const LEAF_SIZE_START: usize = 4096;

/// Static configuration for a [`TilePackWriter`].
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    /// payload format tag recorded in the header
    pub tile_type: TileType,
    /// compression applied to every tile payload as it is written
    pub tile_compression: Compression,
    /// compression applied to directories and metadata at commit
    pub internal_compression: Compression,
}

impl WriterOptions {
    pub const fn new(tile_type: TileType, tile_compression: Compression) -> Self {
        Self {
            tile_type,
            tile_compression,
            internal_compression: Compression::None,
        }
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self::new(TileType::Unknown, Compression::None)
    }
}

/// Builds a planar or cubic archive against a [`ByteSink`].
///
/// Construction reserves the fixed prelude, so tile payloads land straight in
/// the tile data region as they arrive. Identical compressed payloads are
/// stored once and shared by every tile that carries them. [`Self::commit`]
/// freezes the entries, sizes the directories and patches the prelude.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug)]
pub struct TilePackWriter<S> {
    sink: S,
    options: WriterOptions,
    /// per-face entry lists; planar archives only populate face 0
    entries: [Directory; 6],
    /// flipped by the first cubed-sphere write
    cubic: bool,
    /// bytes appended to the tile data region so far
    cursor: u64,
    /// compressed-payload digest -> offset of the stored copy
    payload_offsets: HashMap<[u8; 32], u64, RandomState>,
    addressed_tiles: u64,
    /// true while tiles keep arriving in ascending tile-id order
    clustered: bool,
    zoom_range: Option<(u8, u8)>,
}

impl<S> TilePackWriter<S>
where
    S: ByteSink,
{
    /// Start an archive on `sink`, reserving the 98 304-byte prelude.
    ///
    /// # Errors
    /// Any sink failure while zero-filling the prelude.
    pub async fn new(mut sink: S, options: WriterOptions) -> Result<Self> {
        sink.append(&vec![0u8; PRELUDE_SIZE]).await?;

        Ok(Self {
            sink,
            options,
            entries: Default::default(),
            cubic: false,
            cursor: 0,
            payload_offsets: HashMap::default(),
            addressed_tiles: 0,
            clustered: true,
            zoom_range: None,
        })
    }

    /// Write a planar tile by coordinate.
    ///
    /// # Errors
    /// [`Error::InvalidCoordinate`] for an unaddressable coordinate; any
    /// compression or sink failure.
    pub async fn write_tile(&mut self, zoom: u8, x: u64, y: u64, data: &[u8]) -> Result<()> {
        let tile_id = TileCoord::new(zoom, x, y).to_id()?;
        self.push_tile(Face::Face0, tile_id, data).await
    }

    /// Write a planar tile by raw tile-id.
    ///
    /// # Errors
    /// See [`Self::write_tile`].
    pub async fn write_tile_id(&mut self, tile_id: u64, data: &[u8]) -> Result<()> {
        self.push_tile(Face::Face0, tile_id, data).await
    }

    /// Write a tile onto a cubed-sphere face; the archive commits in the
    /// cubic flavor once any face write has happened.
    ///
    /// # Errors
    /// See [`Self::write_tile`].
    pub async fn write_tile_face(
        &mut self,
        face: Face,
        zoom: u8,
        x: u64,
        y: u64,
        data: &[u8],
    ) -> Result<()> {
        let tile_id = TileCoord::new(zoom, x, y).to_id()?;
        self.cubic = true;
        self.push_tile(face, tile_id, data).await
    }

    async fn push_tile(&mut self, face: Face, tile_id: u64, data: &[u8]) -> Result<()> {
        let payload = compress(data, self.options.tile_compression).await?;
        let length = u32::try_from(payload.len())
            .map_err(|_| Error::CapacityExceeded("tile payload exceeds u32".into()))?;
        let digest = *blake3::hash(&payload).as_bytes();

        let entries = &mut self.entries[face.index()];
        if let Some(last) = entries.entries.last() {
            if tile_id < last.tile_id {
                self.clustered = false;
            }
        }

        match self.payload_offsets.get(&digest) {
            Some(&offset) => {
                // shared payload; extend the last run when ids stay contiguous
                entries.push_entry(tile_id, offset, length);
            }
            None => {
                let offset = self.cursor;
                self.sink.append(&payload).await?;
                entries.push_entry(tile_id, offset, length);
                self.payload_offsets.insert(digest, offset);
                self.cursor += u64::from(length);
            }
        }

        self.addressed_tiles += 1;

        let zoom = TileCoord::from_id(tile_id)?.zoom;
        self.zoom_range = Some(match self.zoom_range {
            None => (zoom, zoom),
            Some((lo, hi)) => (lo.min(zoom), hi.max(zoom)),
        });

        Ok(())
    }

    /// Freeze the archive: sort and partition directories, lay out the
    /// prelude, append leaf blocks and patch the header.
    ///
    /// Returns the sink so callers can recover the finished archive.
    ///
    /// # Errors
    /// [`Error::CapacityExceeded`] if the roots plus metadata cannot fit the
    /// prelude; any compression, serialization or sink failure.
    pub async fn commit(mut self, metadata: Option<&Value>) -> Result<S> {
        let flavor = if self.cubic {
            Flavor::Cubic
        } else {
            Flavor::Planar
        };
        let header_size = flavor.header_size();
        let internal_compression = self.options.internal_compression;

        for directory in &mut self.entries {
            finalize_entries(directory);
        }

        let metadata_value = metadata.cloned().unwrap_or_else(|| json!({}));
        let metadata_bytes = compress(&serde_json::to_vec(&metadata_value)?, internal_compression)
            .await?;

        let root_budget = PRELUDE_SIZE
            .checked_sub(header_size + metadata_bytes.len())
            .ok_or_else(|| Error::CapacityExceeded("metadata blob overflows the prelude".into()))?;

        let faces: &[Face] = match flavor {
            Flavor::Planar => &[Face::Face0],
            Flavor::Cubic => &Face::ALL,
        };

        let mut roots: Vec<Vec<u8>> = Vec::with_capacity(faces.len());
        let mut leaves: Vec<Vec<u8>> = Vec::with_capacity(faces.len());
        for &face in faces {
            let optimized = optimize_directories(
                &self.entries[face.index()],
                root_budget,
                internal_compression,
            )
            .await?;
            trace!(
                face = face.index(),
                root_len = optimized.root_bytes.len(),
                leaves_len = optimized.leaves_bytes.len(),
                "directory partition"
            );
            roots.push(optimized.root_bytes);
            leaves.push(optimized.leaves_bytes);
        }

        // prelude layout: header, then root(s), then metadata, zero padding
        let mut root_offsets = [0u64; 6];
        let mut root_lengths = [0u64; 6];
        let mut prelude_pos = header_size as u64;
        for (i, &face) in faces.iter().enumerate() {
            root_offsets[face.index()] = prelude_pos;
            root_lengths[face.index()] = roots[i].len() as u64;
            prelude_pos += roots[i].len() as u64;
        }
        let metadata_offset = prelude_pos;
        let metadata_length = metadata_bytes.len() as u64;
        if prelude_pos + metadata_length > PRELUDE_SIZE as u64 {
            return Err(Error::CapacityExceeded(format!(
                "root directories and metadata need {} bytes of prelude",
                prelude_pos + metadata_length
            )));
        }

        // leaf blocks follow the tile data, one per face in face order
        let tile_data_length = self.cursor;
        let mut leaf_offsets = [0u64; 6];
        let mut leaf_lengths = [0u64; 6];
        for (i, &face) in faces.iter().enumerate() {
            leaf_offsets[face.index()] = PRELUDE_SIZE as u64 + self.cursor;
            leaf_lengths[face.index()] = leaves[i].len() as u64;
            if !leaves[i].is_empty() {
                self.sink.append(&leaves[i]).await?;
            }
            self.cursor += leaves[i].len() as u64;
        }

        let (min_zoom, max_zoom) = self.zoom_range.unwrap_or((0, 0));
        let header = Header {
            flavor,
            root_offsets,
            root_lengths,
            metadata_offset,
            metadata_length,
            leaf_offsets,
            leaf_lengths,
            tile_data_offset: PRELUDE_SIZE as u64,
            tile_data_length,
            num_addressed_tiles: self.addressed_tiles,
            num_tile_entries: self.entries[0].len() as u64,
            num_tile_contents: self.payload_offsets.len() as u64,
            clustered: self.clustered,
            internal_compression,
            tile_compression: self.options.tile_compression,
            tile_type: self.options.tile_type,
            min_zoom,
            max_zoom,
        };
        debug!(?header, "committing archive");

        self.sink.write_at(&header.encode(), 0).await?;
        for (i, &face) in faces.iter().enumerate() {
            if !roots[i].is_empty() {
                self.sink
                    .write_at(&roots[i], root_offsets[face.index()])
                    .await?;
            }
        }
        if !metadata_bytes.is_empty() {
            self.sink.write_at(&metadata_bytes, metadata_offset).await?;
        }

        Ok(self.sink)
    }
}

/// Sort a face's entries for the wire: ascending tile-id, duplicate ids
/// resolved last-writer-wins, adjacent runs re-merged.
fn finalize_entries(directory: &mut Directory) {
    let entries = &mut directory.entries;
    entries.sort_by_key(|e| e.tile_id);

    // stable sort keeps append order within equal ids; keep only the
    // last-written entry for each id
    entries.reverse();
    entries.dedup_by_key(|e| e.tile_id);
    entries.reverse();

    // sorting can put mergeable runs next to each other
    let mut merged: Vec<Entry> = Vec::with_capacity(entries.len());
    for entry in entries.drain(..) {
        if let Some(last) = merged.last_mut() {
            if entry.run_length > 0
                && last.run_length > 0
                && entry.tile_id == last.tile_id + u64::from(last.run_length)
                && entry.offset == last.offset
                && entry.length == last.length
            {
                last.run_length += entry.run_length;
                continue;
            }
        }
        merged.push(entry);
    }
    *entries = merged;
}

/// A face's directory sized for the prelude: root bytes plus the
/// concatenated leaf blocks the root points into.
#[derive(Debug, Default)]
struct OptimizedDirectory {
    root_bytes: Vec<u8>,
    leaves_bytes: Vec<u8>,
}

/// Fit a directory under `target_root_len`, splitting into leaves when the
/// single-level encoding is too large.
async fn optimize_directories(
    directory: &Directory,
    target_root_len: usize,
    internal_compression: Compression,
) -> Result<OptimizedDirectory> {
    let single = compress(&directory.serialize(), internal_compression).await?;
    if single.len() < target_root_len {
        return Ok(OptimizedDirectory {
            root_bytes: single,
            leaves_bytes: Vec::new(),
        });
    }

    let mut leaf_size = LEAF_SIZE_START;
    loop {
        let built = build_root_leaves(directory, leaf_size, internal_compression).await?;
        if built.root_bytes.len() < target_root_len {
            return Ok(built);
        }
        leaf_size *= 2;
    }
}

/// One partitioning attempt: contiguous chunks of `leaf_size` entries, each
/// serialized and compressed into the leaf block, with a `run_length = 0`
/// pointer per chunk seeded by its first tile-id.
async fn build_root_leaves(
    directory: &Directory,
    leaf_size: usize,
    internal_compression: Compression,
) -> Result<OptimizedDirectory> {
    let mut root = Directory::default();
    let mut leaves_bytes = Vec::new();

    for chunk in directory.entries.chunks(leaf_size) {
        let leaf = Directory::new(chunk.to_vec());
        let serialized = compress(&leaf.serialize(), internal_compression).await?;
        let length = u32::try_from(serialized.len())
            .map_err(|_| Error::CapacityExceeded("leaf directory exceeds u32".into()))?;
        root.entries.push(Entry::new(
            chunk[0].tile_id,
            leaves_bytes.len() as u64,
            length,
            0,
        ));
        leaves_bytes.extend_from_slice(&serialized);
    }

    Ok(OptimizedDirectory {
        root_bytes: compress(&root.serialize(), internal_compression).await?,
        leaves_bytes,
    })
}
