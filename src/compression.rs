//! One-shot (de)compression dispatched on the archive's [`Compression`] tags.
//!
//! Directories, metadata and tile payloads all pass through here; the tag
//! decides the algorithm, [`Compression::None`] is the identity, and
//! [`Compression::Unknown`] always fails with a typed error.

use std::io::Cursor;

use async_compression::tokio::bufread::{BrotliDecoder, GzipDecoder, ZstdDecoder};
use async_compression::tokio::write::{BrotliEncoder, GzipEncoder, ZstdEncoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::header::Compression;

/// Compress a complete block of bytes.
///
/// # Errors
/// [`Error::UnsupportedCompression`] for [`Compression::Unknown`];
/// [`Error::Io`] if the codec itself fails.
pub async fn compress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut encoder = GzipEncoder::new(Cursor::new(Vec::new()));
            encoder.write_all(data).await?;
            encoder.shutdown().await?;
            Ok(encoder.into_inner().into_inner())
        }
        Compression::Brotli => {
            let mut encoder = BrotliEncoder::new(Cursor::new(Vec::new()));
            encoder.write_all(data).await?;
            encoder.shutdown().await?;
            Ok(encoder.into_inner().into_inner())
        }
        Compression::Zstd => {
            let mut encoder = ZstdEncoder::new(Cursor::new(Vec::new()));
            encoder.write_all(data).await?;
            encoder.shutdown().await?;
            Ok(encoder.into_inner().into_inner())
        }
        Compression::Unknown => Err(Error::UnsupportedCompression(compression)),
    }
}

/// Decompress a complete block of bytes.
///
/// # Errors
/// [`Error::UnsupportedCompression`] for [`Compression::Unknown`];
/// [`Error::Io`] on a corrupt stream.
pub async fn decompress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut decoder = GzipDecoder::new(data);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).await?;
            Ok(out)
        }
        Compression::Brotli => {
            let mut decoder = BrotliDecoder::new(data);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).await?;
            Ok(out)
        }
        Compression::Zstd => {
            let mut decoder = ZstdDecoder::new(data);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).await?;
            Ok(out)
        }
        Compression::Unknown => Err(Error::UnsupportedCompression(compression)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Result;

    const SAMPLE: &[u8] = b"a directory is mostly small varints, which compress rather well \
                            when there are a few thousand of them in a row";

    #[tokio::test]
    async fn test_none_is_identity() -> Result<()> {
        let compressed = compress(SAMPLE, Compression::None).await?;
        assert_eq!(compressed, SAMPLE);
        assert_eq!(decompress(&compressed, Compression::None).await?, SAMPLE);
        Ok(())
    }

    #[tokio::test]
    async fn test_round_trips() -> Result<()> {
        for compression in [Compression::Gzip, Compression::Brotli, Compression::Zstd] {
            let compressed = compress(SAMPLE, compression).await?;
            assert_ne!(compressed, SAMPLE);
            assert_eq!(decompress(&compressed, compression).await?, SAMPLE);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_is_rejected() {
        assert!(matches!(
            compress(SAMPLE, Compression::Unknown).await,
            Err(Error::UnsupportedCompression(_))
        ));
        assert!(matches!(
            decompress(SAMPLE, Compression::Unknown).await,
            Err(Error::UnsupportedCompression(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_stream_errors() {
        let garbage = [0xde, 0xad, 0xbe, 0xef];
        assert!(decompress(&garbage, Compression::Gzip).await.is_err());
    }
}
