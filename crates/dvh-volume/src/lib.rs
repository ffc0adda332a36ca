//! Read-modify-write access to the volume directory of an SGI disk.
//!
//! A [`VolumeSession`] owns an open device and its decoded
//! [`VolumeHeader`](dvh_format::VolumeHeader). Entries can be extracted to
//! plain files, inserted from plain files, and removed. Every mutation
//! repacks all surviving entries contiguously behind the reserved area of
//! the volume header partition, then rewrites the header.
//!
//! # Commit ordering
//!
//! A commit is not atomic. Data blocks are written first and the header
//! block last, with no journal or shadow copy. If a write fails part way the
//! on-disk image is inconsistent; the session is marked torn and refuses
//! further mutations.
//!
//! Sessions assume exclusive use of the device and take no locks.
//!
//! # Example
//!
//! ```rust,no_run
//! use dvh_volume::{AccessMode, VolumeSession};
//! use std::path::Path;
//!
//! # fn example() -> dvh_volume::Result<()> {
//! let mut session = VolumeSession::open("/dev/sda", AccessMode::ReadWrite)?;
//! session.insert(Path::new("sash"), "sash")?;
//! session.extract("sash", Path::new("/tmp/sash.copy"))?;
//! session.remove("sash")?;
//! session.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use dvh_format::FormatError;
use thiserror::Error;

// Repack planning
pub mod allocator;

// Volume layout constants
pub mod config;

// Positioned I/O
pub mod device;

// Open sessions
pub mod session;

pub use allocator::{Placement, RepackPlan};
pub use config::VolumeConfig;
pub use device::{BlockDevice, seek_read_at, seek_write_at};
pub use session::{AccessMode, VolumeSession};

/// Result type for volume operations.
pub type Result<T> = std::result::Result<T, VolumeError>;

/// Errors that can occur during volume operations.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// Header block failed to decode or validate.
    #[error("Bad volume header: {0}")]
    Format(#[from] FormatError),

    /// Named entry is not in the volume directory.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Every directory slot is occupied.
    #[error("No more free entries in volume header ({slots} slots in use)")]
    DirectoryFull {
        /// Number of directory slots
        slots: usize,
    },

    /// Entries would not fit in the volume header partition.
    #[error("Not enough space left in volume header: need {needed} blocks, {available} available")]
    InsufficientSpace {
        /// Blocks required by all entries after the operation
        needed: u64,
        /// Blocks available for directory entries
        available: u64,
    },

    /// Fewer bytes were read than requested.
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Bytes requested
        expected: usize,
        /// Bytes read
        actual: usize,
    },

    /// Fewer bytes were written than requested.
    #[error("Short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite {
        /// Bytes requested
        expected: usize,
        /// Bytes written
        actual: usize,
    },

    /// A transfer buffer could not be allocated.
    #[error("No memory for a {bytes} byte buffer")]
    AllocationFailure {
        /// Requested buffer size
        bytes: u64,
    },

    /// I/O error from the operating system.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted
        context: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Mutation attempted on a read-only session.
    #[error("Volume header is opened read-only")]
    ReadOnly,

    /// An earlier commit failed after writing to the device.
    #[error("Volume header image is inconsistent after a failed commit; reopen the device")]
    Torn,

    /// Volume configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl VolumeError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Check if the error indicates the device holds damaged data
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::Format(e) => e.is_validation_error(),
            Self::Torn => true,
            _ => false,
        }
    }

    /// Check if the operation was refused before anything was written
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::DirectoryFull { .. }
                | Self::InsufficientSpace { .. }
                | Self::ReadOnly
                | Self::Torn
                | Self::Config(_)
                | Self::Format(FormatError::InvalidName { .. })
        )
    }
}
