//! Repack planning for the volume directory.
//!
//! Every mutation recomputes the placement of all live entries. Entries are
//! laid out in slot order, back to back, starting right after the reserved
//! blocks of the capacity partition. Even entries that did not change are
//! moved to their recomputed offsets, so the data area never fragments.
//!
//! Planning is pure: a [`RepackPlan`] is built and validated from the header
//! alone, and the device is only touched once a plan exists. A failed check
//! therefore leaves the on-disk image exactly as it was.
//!
//! Capacity is `nblks - (firstlbn + reserved)` of the capacity partition.
//! The first block is subtracted from the block count even though the count
//! is already relative to it; IRIX-written headers start the volume header
//! partition at block 0, where the two readings agree.

use dvh_format::{BLOCK_SIZE, DirectoryEntry, DirectoryName, DirectoryTable, NVDIR, VolumeHeader};
use tracing::debug;

use crate::config::VolumeConfig;
use crate::{Result, VolumeError};

/// Where one live entry ends up after a repack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Directory slot of the entry.
    pub slot: usize,
    /// First block the entry's bytes are read from; `None` for the entry
    /// being inserted, whose bytes come from the caller.
    pub source_block: Option<u32>,
    /// First block the entry's bytes are written to.
    pub first_block: u32,
    /// Length of the entry in bytes.
    pub byte_len: u32,
}

impl Placement {
    /// Byte offset of the destination.
    pub const fn dest_offset(&self) -> u64 {
        self.first_block as u64 * BLOCK_SIZE as u64
    }

    /// Byte offset the surviving data is read from.
    pub fn source_offset(&self) -> Option<u64> {
        self.source_block
            .map(|block| u64::from(block) * BLOCK_SIZE as u64)
    }
}

/// Validated outcome of an insert or remove, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepackPlan {
    /// Directory as it will be committed.
    pub directory: DirectoryTable,
    /// One placement per live entry, in slot order.
    pub placements: Vec<Placement>,
    /// Slot receiving new content, if any.
    pub inserted_slot: Option<usize>,
    /// Slots cleared by the operation.
    pub cleared: usize,
    /// Blocks used by all entries after the operation.
    pub used_blocks: u64,
    /// Blocks available to directory entries.
    pub capacity_blocks: u64,
}

/// Number of blocks needed to hold `bytes`.
pub const fn blocks_for(bytes: u64) -> u64 {
    bytes.div_ceil(BLOCK_SIZE as u64)
}

/// Blocks of the capacity partition available to directory entries.
pub fn capacity_blocks(header: &VolumeHeader, config: &VolumeConfig) -> u64 {
    header
        .partition(config.capacity_partition)
        .map_or(0, |partition| {
            let capacity = i64::from(partition.blocks)
                - (i64::from(partition.first_block) + i64::from(config.reserved_blocks));
            u64::try_from(capacity).unwrap_or(0)
        })
}

/// First block handed to directory entries.
pub fn data_start_block(header: &VolumeHeader, config: &VolumeConfig) -> u64 {
    header
        .partition(config.capacity_partition)
        .map_or(0, |partition| u64::from(partition.first_block))
        + u64::from(config.reserved_blocks)
}

/// Plan storing `byte_len` bytes under `name`.
///
/// Any entry already holding the name is dropped first, so a replacement
/// never needs an extra slot. The new entry takes the lowest free slot.
pub fn plan_insert(
    header: &VolumeHeader,
    config: &VolumeConfig,
    name: &DirectoryName,
    byte_len: u64,
) -> Result<RepackPlan> {
    let mut directory = header.directory.clone();
    let cleared = directory.remove_all_named(name);

    if directory.is_full() {
        return Err(VolumeError::DirectoryFull { slots: NVDIR });
    }

    let needed = blocks_for(byte_len) + directory.used_blocks();
    let available = capacity_blocks(header, config);
    if needed > available {
        return Err(VolumeError::InsufficientSpace { needed, available });
    }

    let byte_len = u32::try_from(byte_len)
        .map_err(|_| VolumeError::InsufficientSpace { needed, available })?;

    let Some(slot) = directory.first_free() else {
        return Err(VolumeError::DirectoryFull { slots: NVDIR });
    };
    directory.place(slot, DirectoryEntry::new(*name, 0, byte_len));
    debug!(slot, name = %name, byte_len, "planned new entry");

    repack(header, config, directory, Some(slot), cleared)
}

/// Plan dropping every entry named `name`.
pub fn plan_remove(
    header: &VolumeHeader,
    config: &VolumeConfig,
    name: &DirectoryName,
) -> Result<RepackPlan> {
    let mut directory = header.directory.clone();
    let cleared = directory.remove_all_named(name);
    if cleared == 0 {
        return Err(VolumeError::NotFound(name.to_string()));
    }

    repack(header, config, directory, None, cleared)
}

/// Assign contiguous blocks to every live entry in slot order.
fn repack(
    header: &VolumeHeader,
    config: &VolumeConfig,
    mut directory: DirectoryTable,
    inserted_slot: Option<usize>,
    cleared: usize,
) -> Result<RepackPlan> {
    let capacity_blocks = capacity_blocks(header, config);
    let start = data_start_block(header, config);
    let mut dest = start;
    let mut placements = Vec::with_capacity(directory.occupied_count());

    for (slot, entry) in directory.occupied_mut() {
        let first_block = u32::try_from(dest).map_err(|_| VolumeError::InsufficientSpace {
            needed: dest - start + u64::from(entry.block_count()),
            available: capacity_blocks,
        })?;

        let source_block = (Some(slot) != inserted_slot).then_some(entry.first_block);
        debug!(slot, from = ?source_block, to = first_block, bytes = entry.byte_len, "repack placement");

        entry.first_block = first_block;
        placements.push(Placement {
            slot,
            source_block,
            first_block,
            byte_len: entry.byte_len,
        });
        dest += u64::from(entry.block_count());
    }

    Ok(RepackPlan {
        directory,
        placements,
        inserted_slot,
        cleared,
        used_blocks: dest - start,
        capacity_blocks,
    })
}
