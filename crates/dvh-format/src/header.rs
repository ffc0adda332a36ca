//! Volume header record
//!
//! Layout (512 bytes, big-endian):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x000  | 4    | Magic (`0x0BE5A941`) |
//! | 0x004  | 2    | Root partition index |
//! | 0x006  | 2    | Swap partition index |
//! | 0x008  | 16   | Boot file name |
//! | 0x018  | 48   | Device parameters |
//! | 0x048  | 240  | Volume directory (15 × 16) |
//! | 0x138  | 192  | Partition table (16 × 12) |
//! | 0x1F8  | 4    | Checksum |
//! | 0x1FC  | 4    | Fill |
//!
//! Decoding validates the magic and then the word checksum on the raw bytes
//! before any field is interpreted. Encoding serializes field by field with a
//! zero checksum, then stores the two's-complement sum in the checksum slot.

use crate::checksum::twos_complement_sum;
use crate::directory::DirectoryTable;
use crate::error::{FormatError, FormatResult};
use crate::partition::{NPARTAB, PartitionEntry, PartitionType, VOLUME_HEADER_PARTITION};
use binrw::{BinRead, BinWrite};
use std::borrow::Cow;
use std::io::Cursor;

/// Magic number identifying a volume header
pub const VHMAGIC: u32 = 0x0BE5_A941;

/// Size of the on-disk volume header in bytes
pub const VOLUME_HEADER_SIZE: usize = 512;

/// Length of the boot file name field
pub const BFNAMESIZE: usize = 16;

/// Size of the device parameter block in bytes
pub const DEVICE_PARAMETERS_SIZE: usize = 48;

/// Byte offset of the checksum word
pub const CHECKSUM_OFFSET: usize = 0x1F8;

/// Drive geometry and controller timing
///
/// None of these values are interpreted; they are carried through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
#[allow(missing_docs)]
pub struct DeviceParameters {
    pub skew: u8,
    pub gap1: u8,
    pub gap2: u8,
    pub spares_cyl: u8,
    pub cyls: u16,
    pub shd0: u16,
    pub trks0: u16,
    pub ctq_depth: u8,
    pub cylshi: u8,
    pub unused: u16,
    pub secs: u16,
    pub secbytes: u16,
    pub interleave: u16,
    pub flags: i32,
    pub datarate: i32,
    pub nretries: i32,
    pub mspw: i32,
    pub xgap1: u16,
    pub xsync: u16,
    pub xrdly: u16,
    pub xgap2: u16,
    pub xrgate: u16,
    pub xwcont: u16,
}

/// Parsed volume header
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct VolumeHeader {
    /// Magic number, [`VHMAGIC`] for every valid header
    pub magic: u32,
    /// Partition holding the root filesystem
    pub root_partition: i16,
    /// Partition used for swap
    pub swap_partition: i16,
    /// NUL-padded name of the file to boot
    pub boot_file: [u8; BFNAMESIZE],
    /// Device parameter block
    pub device: DeviceParameters,
    /// Volume directory
    pub directory: DirectoryTable,
    /// Partition table
    pub partitions: [PartitionEntry; NPARTAB],
    /// Checksum word as last read or encoded
    pub checksum: u32,
    /// Trailing pad word
    pub fill: u32,
}

impl VolumeHeader {
    /// Build a minimal valid header for a volume-header partition of
    /// `header_blocks` blocks starting at block 0
    pub fn new_blank(header_blocks: u32) -> Self {
        let mut partitions = [PartitionEntry::default(); NPARTAB];
        partitions[VOLUME_HEADER_PARTITION] =
            PartitionEntry::new(0, header_blocks, PartitionType::VolumeHeader);

        Self {
            magic: VHMAGIC,
            root_partition: 0,
            swap_partition: 1,
            boot_file: [0; BFNAMESIZE],
            device: DeviceParameters::default(),
            directory: DirectoryTable::new(),
            partitions,
            checksum: 0,
            fill: 0,
        }
    }

    /// Decode and validate a header block.
    ///
    /// Only the first [`VOLUME_HEADER_SIZE`] bytes are examined.
    pub fn decode(block: &[u8]) -> FormatResult<Self> {
        let block = block
            .get(..VOLUME_HEADER_SIZE)
            .ok_or(FormatError::ShortRead {
                expected: VOLUME_HEADER_SIZE,
                actual: block.len(),
            })?;

        let magic = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
        if magic != VHMAGIC {
            return Err(FormatError::BadMagic {
                expected: VHMAGIC,
                found: magic,
            });
        }

        let residual = twos_complement_sum(block);
        if residual != 0 {
            return Err(FormatError::BadChecksum { residual });
        }

        Ok(Self::read(&mut Cursor::new(block))?)
    }

    /// Encode the header to its on-disk block.
    ///
    /// The freshly computed checksum is also stored in `self.checksum`.
    pub fn encode(&mut self) -> FormatResult<[u8; VOLUME_HEADER_SIZE]> {
        self.checksum = 0;

        let mut cursor = Cursor::new(Vec::with_capacity(VOLUME_HEADER_SIZE));
        self.write(&mut cursor)?;
        let bytes = cursor.into_inner();

        let mut block: [u8; VOLUME_HEADER_SIZE] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| FormatError::EncodedSize {
                    expected: VOLUME_HEADER_SIZE,
                    actual: bytes.len(),
                })?;

        let sum = twos_complement_sum(&block);
        block[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&sum.to_be_bytes());
        self.checksum = sum;

        Ok(block)
    }

    /// Boot file name up to the first NUL
    pub fn boot_file_name(&self) -> Cow<'_, str> {
        let len = self
            .boot_file
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(BFNAMESIZE);
        String::from_utf8_lossy(&self.boot_file[..len])
    }

    /// Partition entry at `index`
    pub fn partition(&self, index: usize) -> Option<&PartitionEntry> {
        self.partitions.get(index)
    }

    /// Non-empty partitions with their indices
    pub fn used_partitions(&self) -> impl Iterator<Item = (usize, &PartitionEntry)> {
        self.partitions
            .iter()
            .enumerate()
            .filter(|(_, partition)| !partition.is_empty())
    }
}
