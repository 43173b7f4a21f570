use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::{ByteSink, RangeReader};
use crate::error::Result;

/// Range reader over a local file.
#[derive(Debug)]
pub struct FileReader {
    file: File,
}

impl FileReader {
    /// Open an existing archive for reading.
    ///
    /// # Errors
    /// [`crate::Error::Io`] if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).await?;
        Ok(Self { file })
    }
}

#[async_trait]
impl RangeReader for FileReader {
    async fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset)).await?;

        let length = usize::try_from(length)
            .map_err(|_| crate::Error::CapacityExceeded(format!("range of {length} bytes")))?;
        let mut buf = vec![0u8; length];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);

        Ok(buf)
    }
}

/// Sink that writes the archive to a local file.
#[derive(Debug)]
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Create (or truncate) the archive file.
    ///
    /// # Errors
    /// [`crate::Error::Io`] if the file cannot be created.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await?;
        Ok(Self { file })
    }
}

#[async_trait]
impl ByteSink for FileSink {
    async fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::End(0)).await?;
        self.file.write_all(data).await?;
        self.file.flush().await?;
        Ok(())
    }

    async fn write_at(&mut self, data: &[u8], offset: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.write_all(data).await?;
        self.file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Result;
    use temp_dir::TempDir;

    #[tokio::test]
    async fn test_file_round_trip() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("io.bin");

        let mut sink = FileSink::create(&path).await?;
        sink.append(b"0123456789").await?;
        sink.write_at(b"ab", 2).await?;
        sink.append(b"xyz").await?;

        let mut reader = FileReader::open(&path).await?;
        assert_eq!(reader.read_range(0, 10).await?, b"01ab456789");
        assert_eq!(reader.read_range(10, 3).await?, b"xyz");
        assert_eq!(reader.read_range(10, 100).await?, b"xyz");
        assert!(reader.read_range(50, 4).await?.is_empty());
        Ok(())
    }
}
