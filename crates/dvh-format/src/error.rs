//! Error types for volume header parsing and building

use thiserror::Error;

/// Volume header format result type
pub type FormatResult<T> = Result<T, FormatError>;

/// Errors raised while decoding or encoding a volume header
#[derive(Debug, Error)]
pub enum FormatError {
    /// Fewer bytes than a full header block were supplied
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Magic number does not identify a volume header
    #[error("bad magic: expected {expected:#010x}, found {found:#010x}")]
    BadMagic {
        /// Magic value every volume header carries
        expected: u32,
        /// Value read from the block
        found: u32,
    },

    /// Two's-complement word sum over the block is not zero
    #[error("bad volume header checksum: word sum is {residual:#010x}, expected 0")]
    BadChecksum {
        /// Sum left over after accumulating every word
        residual: u32,
    },

    /// Directory entry name cannot be stored in a directory slot
    #[error("invalid directory name {name:?}: {reason}")]
    InvalidName {
        /// Offending name, lossily decoded
        name: String,
        /// Why the name was rejected
        reason: &'static str,
    },

    /// Encoded header came out at the wrong size
    #[error("encoded volume header is {actual} bytes, expected {expected}")]
    EncodedSize {
        /// Size of a header block
        expected: usize,
        /// Size actually produced
        actual: usize,
    },

    /// Binary read/write error
    #[error("binary format error: {0}")]
    Binary(#[from] binrw::Error),
}

impl FormatError {
    /// Check whether the block failed integrity validation
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::BadMagic { .. } | Self::BadChecksum { .. })
    }
}
