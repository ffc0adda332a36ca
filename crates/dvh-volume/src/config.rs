//! Layout constants for the volume header partition
//!
//! Neither value is recorded anywhere in the header. Both are conventions
//! of IRIX volume headers and are kept here as named settings.

use crate::{Result, VolumeError};
use dvh_format::{NPARTAB, VOLUME_HEADER_PARTITION};

/// Blocks at the start of the volume header partition never handed to
/// directory entries, as observed on IRIX-written headers.
pub const RESERVED_BLOCKS: u32 = 4;

/// Where directory entries may be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeConfig {
    /// Partition whose extent bounds the directory data
    pub capacity_partition: usize,

    /// Blocks skipped at the start of that partition
    pub reserved_blocks: u32,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            capacity_partition: VOLUME_HEADER_PARTITION,
            reserved_blocks: RESERVED_BLOCKS,
        }
    }
}

impl VolumeConfig {
    /// Use a different partition as the directory area
    #[must_use]
    pub const fn with_capacity_partition(mut self, index: usize) -> Self {
        self.capacity_partition = index;
        self
    }

    /// Reserve a different number of leading blocks
    #[must_use]
    pub const fn with_reserved_blocks(mut self, blocks: u32) -> Self {
        self.reserved_blocks = blocks;
        self
    }

    /// Check the partition index is inside the partition table
    pub fn validate(&self) -> Result<()> {
        if self.capacity_partition >= NPARTAB {
            return Err(VolumeError::Config(format!(
                "capacity partition {} is outside the {NPARTAB}-entry partition table",
                self.capacity_partition
            )));
        }
        Ok(())
    }
}
