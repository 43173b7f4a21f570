use std::path::Path;

use async_trait::async_trait;
use memmap2::Mmap;

use super::RangeReader;
use crate::error::Result;

/// Range reader over a memory-mapped archive.
///
/// Fetches never touch the executor; the page cache does the work.
#[derive(Debug)]
pub struct MmapReader {
    map: Mmap,
}

impl MmapReader {
    /// Map an existing archive.
    ///
    /// # Errors
    /// [`crate::Error::Io`] if the file cannot be opened or mapped.
    ///
    /// # Safety notes
    /// The mapping assumes the file is not truncated while the reader lives,
    /// the usual caveat of memory-mapped I/O.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map })
    }
}

#[async_trait]
impl RangeReader for MmapReader {
    async fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let len = self.map.len() as u64;
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(length).min(len) as usize;
        Ok(self.map[start..end].to_vec())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Result;
    use temp_dir::TempDir;

    #[tokio::test]
    async fn test_mmap_ranges() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("io.bin");
        std::fs::write(&path, b"0123456789")?;

        let mut reader = MmapReader::open(&path)?;
        assert_eq!(reader.read_range(2, 4).await?, b"2345");
        assert_eq!(reader.read_range(8, 100).await?, b"89");
        assert!(reader.read_range(20, 4).await?.is_empty());
        Ok(())
    }
}
