//! Error taxonomy for the EWF engine

use thiserror::Error;

/// The error type for all EWF container operations
#[derive(Error, Debug)]
pub enum Error {
    /// Null/empty input to a contract (caller bug)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Underlying file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Segment file header signature did not match any known variant
    #[error("unrecognized segment file signature: {0}")]
    FormatSignature(String),

    /// Adler-32 over a 76-byte section descriptor did not match
    #[error("section CRC mismatch in {section} at offset {offset}")]
    SectionCrc {
        /// Section type the mismatch was found in
        section: String,
        /// Absolute offset of the failing descriptor
        offset: u64,
    },

    /// Adler-32 over a payload (volume/table/chunk/error2/hash) did not match
    #[error("payload CRC mismatch in {0}")]
    PayloadCrc(String),

    /// Deflate reported a fatal (memory or undefined) error
    #[error("compression failed: {0}")]
    CompressionFailed(String),

    /// Inflate reported a data error; recoverable into the chunk CRC-error set
    #[error("chunk {0} failed to decompress (data error)")]
    DecompressionDataError(usize),

    /// Destination buffer was not large enough; caller may grow and retry
    #[error("decompression destination too small: need at least {0} bytes")]
    DecompressionBufferTooSmall(usize),

    /// Chunk index, offset, or size exceeds signed 31-bit/63-bit bounds
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// Mandatory section (volume, table, done) absent from the chain
    #[error("missing mandatory section: {0}")]
    MissingSection(&'static str),

    /// Section type is recognized but this build refuses to act on it
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for EWF operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an [`Error::InvalidArgument`]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Build an [`Error::OutOfRange`]
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Error::OutOfRange(msg.into())
    }

    /// Build an [`Error::UnsupportedFormat`]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedFormat(msg.into())
    }
}
