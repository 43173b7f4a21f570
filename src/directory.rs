use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::varint::{read_varint, write_varint};

/// A single directory record.
///
/// `run_length >= 1` marks a run of consecutive tile-ids sharing one payload;
/// `run_length == 0` marks a pointer to a leaf directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Entry {
    /// Hilbert id of the first tile in the run
    pub tile_id: u64,
    /// byte offset of the payload within the tile data region, or of the leaf
    /// block within the leaf directory region
    pub offset: u64,
    /// byte length of the payload or leaf block
    pub length: u32,
    /// number of consecutive tile-ids sharing this payload; `0` for leaves
    pub run_length: u32,
}

impl Entry {
    pub const fn new(tile_id: u64, offset: u64, length: u32, run_length: u32) -> Self {
        Self {
            tile_id,
            offset,
            length,
            run_length,
        }
    }

    /// Whether this entry points at a leaf directory rather than tile data.
    pub const fn is_leaf_pointer(&self) -> bool {
        self.run_length == 0
    }
}

/// An ordered list of entries, sorted strictly by `tile_id` ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    /// entries
    pub entries: Vec<Entry>,
}

impl Directory {
    pub const fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a tile entry, folding it into the previous entry when the
    /// run-length law allows: consecutive tile-ids with identical
    /// `(offset, length)` collapse into one run.
    pub fn push_entry(&mut self, tile_id: u64, offset: u64, length: u32) {
        if let Some(last) = self.entries.last_mut() {
            if tile_id == last.tile_id + u64::from(last.run_length)
                && last.offset == offset
                && last.length == length
            {
                last.run_length += 1;
                return;
            }
        }

        self.entries.push(Entry {
            tile_id,
            offset,
            length,
            run_length: 1,
        });
    }

    /// Serialize into the columnar wire layout: entry count, tile-id deltas,
    /// run lengths, lengths, then offsets.
    ///
    /// Offsets are stored `+1`; a stored `0` means "immediately after the
    /// previous entry", which is the common case in a clustered archive.
    /// Internal compression is applied by the caller.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.entries.len() * 4 + 2);

        write_varint(&mut buf, self.entries.len() as u64);

        let mut last_id = 0;
        for e in &self.entries {
            write_varint(&mut buf, e.tile_id - last_id);
            last_id = e.tile_id;
        }

        for e in &self.entries {
            write_varint(&mut buf, u64::from(e.run_length));
        }
        for e in &self.entries {
            write_varint(&mut buf, u64::from(e.length));
        }
        for (i, e) in self.entries.iter().enumerate() {
            if i > 0
                && e.offset
                    == self.entries[i - 1].offset + u64::from(self.entries[i - 1].length)
            {
                write_varint(&mut buf, 0);
            } else {
                write_varint(&mut buf, e.offset + 1);
            }
        }

        buf
    }

    /// Decode a directory from its (already decompressed) wire bytes.
    ///
    /// # Errors
    /// [`Error::VarintOverflow`] on truncated or overlong varints;
    /// [`Error::CorruptDirectory`] when a column value is out of range.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut buf = data;

        let num_entries = usize::try_from(read_varint(&mut buf)?)
            .map_err(|_| Error::CorruptDirectory("entry count exceeds usize".into()))?;
        // a real block carries at least a byte per entry
        if num_entries > data.len() {
            return Err(Error::CorruptDirectory(format!(
                "{} entries claimed in a {}-byte block",
                num_entries,
                data.len()
            )));
        }

        let mut entries: Vec<Entry> = Vec::with_capacity(num_entries);
        let mut last_id = 0;
        for _ in 0..num_entries {
            let delta = read_varint(&mut buf)?;
            last_id += delta;
            entries.push(Entry::new(last_id, 0, 0, 1));
        }

        for e in &mut entries {
            e.run_length = u32::try_from(read_varint(&mut buf)?)
                .map_err(|_| Error::CorruptDirectory("run length exceeds u32".into()))?;
        }
        for e in &mut entries {
            e.length = u32::try_from(read_varint(&mut buf)?)
                .map_err(|_| Error::CorruptDirectory("length exceeds u32".into()))?;
        }
        for i in 0..num_entries {
            let value = read_varint(&mut buf)?;
            entries[i].offset = if value == 0 {
                if i == 0 {
                    return Err(Error::CorruptDirectory(
                        "first entry uses the contiguous-offset sentinel".into(),
                    ));
                }
                entries[i - 1].offset + u64::from(entries[i - 1].length)
            } else {
                value - 1
            };
        }

        Ok(Self { entries })
    }
}

impl From<Vec<Entry>> for Directory {
    fn from(entries: Vec<Entry>) -> Self {
        Self { entries }
    }
}

/// Locate `tile_id` in a sorted entry slice.
///
/// On an exact miss the last candidate still wins when it is a leaf pointer
/// (the caller must recurse) or when the id falls inside its run.
pub fn find_tile(entries: &[Entry], tile_id: u64) -> Option<Entry> {
    if entries.is_empty() {
        return None;
    }
    let mut m: isize = 0;
    let mut n: isize = (entries.len() - 1) as isize;
    while m <= n {
        let k = (n + m) >> 1;
        match tile_id.cmp(&entries[k as usize].tile_id) {
            Ordering::Greater => m = k + 1,
            Ordering::Less => n = k - 1,
            Ordering::Equal => return Some(entries[k as usize]),
        }
    }

    // at this point, m > n
    if n >= 0 {
        let candidate = entries[n as usize];
        if candidate.run_length == 0 {
            return Some(candidate);
        }
        if tile_id - candidate.tile_id < u64::from(candidate.run_length) {
            return Some(candidate);
        }
    }

    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tile_id::tile_id;

    #[test]
    fn test_serialize_byte_exact() {
        let directory = Directory::new(vec![
            Entry::new(1, 2, 3, 4),
            Entry::new(5, 6, 7, 8),
            Entry::new(9, 10, 11, 12),
        ]);

        let data = directory.serialize();
        assert_eq!(data, vec![3, 1, 4, 4, 4, 8, 12, 3, 7, 11, 3, 7, 11]);
        assert_eq!(Directory::deserialize(&data).unwrap(), directory);
    }

    #[test]
    fn test_round_trip_contiguous_offsets() {
        // offsets that abut the previous entry use the 0 sentinel
        let directory = Directory::new(vec![
            Entry::new(0, 0, 10, 1),
            Entry::new(1, 10, 20, 1),
            Entry::new(2, 30, 5, 2),
            Entry::new(100, 0, 10, 1),
        ]);

        let data = directory.serialize();
        assert_eq!(Directory::deserialize(&data).unwrap(), directory);
    }

    #[test]
    fn test_round_trip_empty() {
        let directory = Directory::default();
        let data = directory.serialize();
        assert_eq!(data, vec![0]);
        assert_eq!(Directory::deserialize(&data).unwrap(), directory);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        // claims u64::MAX entries
        let mut bad = Vec::new();
        crate::varint::write_varint(&mut bad, u64::MAX);
        assert!(Directory::deserialize(&bad).is_err());

        // truncated columns
        let directory = Directory::new(vec![Entry::new(1, 2, 3, 4)]);
        let data = directory.serialize();
        assert!(Directory::deserialize(&data[..data.len() - 1]).is_err());
    }

    #[test]
    fn test_push_entry_merges_runs() {
        let mut directory = Directory::default();
        for id in 0..5 {
            directory.push_entry(id, 0, 6);
        }
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.entries[0].run_length, 5);

        // same offset but a gap in ids starts a new entry
        directory.push_entry(9, 0, 6);
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.entries[1].run_length, 1);

        // consecutive id at a different offset starts a new entry
        directory.push_entry(10, 6, 6);
        assert_eq!(directory.len(), 3);
    }

    #[test]
    fn test_find_tile_exact_and_runs() {
        let entries = vec![
            Entry::new(0, 0, 10, 1),
            Entry::new(5, 10, 10, 3),
            Entry::new(20, 20, 10, 1),
        ];

        assert_eq!(find_tile(&entries, 0).unwrap().offset, 0);
        assert_eq!(find_tile(&entries, 5).unwrap().offset, 10);
        // inside the run
        assert_eq!(find_tile(&entries, 7).unwrap().offset, 10);
        // just past the run
        assert!(find_tile(&entries, 8).is_none());
        assert_eq!(find_tile(&entries, 20).unwrap().offset, 20);
        assert!(find_tile(&entries, 21).is_none());
        // before the first entry
        assert!(find_tile(&entries[1..], 1).is_none());
    }

    #[test]
    fn test_find_tile_leaf_pointer_fallthrough() {
        let mut entries: Vec<Entry> = [(1u8, 0u64, 0u64), (1, 1, 0), (1, 0, 1), (1, 1, 1)]
            .iter()
            .map(|&(z, x, y)| Entry::new(tile_id(z, x, y).unwrap(), 0, 0, 0))
            .collect();
        entries.sort_by_key(|e| e.tile_id);

        // exact hit on a leaf pointer
        assert_eq!(find_tile(&entries, 2).unwrap().tile_id, 2);
        // a miss always falls through to the preceding leaf pointer
        assert_eq!(find_tile(&entries, 10).unwrap().tile_id, 4);
        assert!(find_tile(&[], 10).is_none());
    }
}
