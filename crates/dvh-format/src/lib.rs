//! Parser and builder for the SGI/IRIX disk volume header
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::doc_markdown)] // IRIX terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Field names follow the on-disk layout
//! The volume header is the first 512-byte block of an SGI-partitioned disk.
//! It carries boot information, drive parameters, a 16-entry partition table
//! and a 15-slot volume directory of small named files (boot loaders,
//! stand-alone tools) stored in the volume header partition.
//!
//! # Modules
//!
//! - **checksum**: two's-complement word sum that every header balances to zero
//! - **header**: the full record, with validating `decode` and checksumming `encode`
//! - **directory**: the fixed table of named entries and its lookup rules
//! - **partition**: partition table entries and type labels
//!
//! # Example
//!
//! ```rust
//! use dvh_format::{DirectoryEntry, DirectoryName, VolumeHeader};
//!
//! let mut header = VolumeHeader::new_blank(4096);
//! let name = DirectoryName::new("sash")?;
//! header.directory.place(0, DirectoryEntry::new(name, 4, 1024));
//!
//! let block = header.encode()?;
//! let decoded = VolumeHeader::decode(&block)?;
//! assert_eq!(decoded, header);
//! # Ok::<(), dvh_format::FormatError>(())
//! ```

#![warn(missing_docs)]

/// Two's-complement word checksum
pub mod checksum;
/// Volume directory slots and lookup
pub mod directory;
pub mod error;
/// Volume header record and codec
pub mod header;
/// Partition table entries
pub mod partition;

pub use directory::{DirectoryEntry, DirectoryName, DirectoryTable, NVDIR, VDNAMESIZE};
pub use error::{FormatError, FormatResult};
pub use header::{DeviceParameters, VHMAGIC, VOLUME_HEADER_SIZE, VolumeHeader};
pub use partition::{NPARTAB, PartitionEntry, PartitionType, VOLUME_HEADER_PARTITION};

/// Size of a logical block in bytes
pub const BLOCK_SIZE: usize = 512;
