use thiserror::Error;

use crate::header::Compression;

/// Convenience alias used by every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
/// An error which occurred within the present crate
#[allow(clippy::module_name_repetitions)]
pub enum Error {
    /// A zoom above 26, or an x/y outside `[0, 2^zoom)`
    #[error("invalid tile coordinate: {0}")]
    InvalidCoordinate(String),

    /// A varint decode ran past ten bytes (or off the end of its buffer)
    #[error("varint exceeds the 10-byte limit")]
    VarintOverflow,

    /// A non-root directory decoded to zero entries
    #[error("empty leaf directory")]
    EmptyDirectory,

    /// A tile lookup walked more than four directory levels
    #[error("maximum directory depth exceeded")]
    DepthExceeded,

    /// The requested compression algorithm is not available
    #[error("unsupported compression: {}", .0.label())]
    UnsupportedCompression(Compression),

    /// An underlying byte-range or sink failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecognized magic bytes or spec version
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A directory block that decoded to nonsense
    #[error("corrupt directory: {0}")]
    CorruptDirectory(String),

    /// Metadata could not be serialized or parsed as JSON
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// A tile payload, metadata blob or directory outgrew a wire-format limit
    #[error("archive capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A range request over HTTP failed
    #[cfg(feature = "http")]
    #[error("http range request failed: {0}")]
    Http(#[from] reqwest::Error),
}
