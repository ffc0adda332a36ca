//! Partition table entries and the partition type taxonomy

use binrw::{BinRead, BinWrite};
use std::fmt;

/// Number of partition table entries in a volume header
pub const NPARTAB: usize = 16;

/// Size of one on-disk partition entry in bytes
pub const PARTITION_ENTRY_SIZE: usize = 12;

/// Index of the partition describing the volume header itself
///
/// By IRIX convention partition 8 spans the reserved header region, and the
/// volume directory lives inside it.
pub const VOLUME_HEADER_PARTITION: usize = 8;

/// One slot of the partition table (12 bytes on disk)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct PartitionEntry {
    /// Number of blocks in the partition
    pub blocks: u32,
    /// First logical block of the partition
    pub first_block: u32,
    /// Raw partition type tag
    pub type_tag: u32,
}

impl PartitionEntry {
    /// Create a partition entry
    pub const fn new(first_block: u32, blocks: u32, kind: PartitionType) -> Self {
        Self {
            blocks,
            first_block,
            type_tag: kind.tag(),
        }
    }

    /// Unused partitions have zero blocks
    pub const fn is_empty(&self) -> bool {
        self.blocks == 0
    }

    /// Interpret the type tag
    pub const fn partition_type(&self) -> PartitionType {
        PartitionType::from_tag(self.type_tag)
    }
}

/// Partition type tags understood by IRIX and Linux
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionType {
    /// Volume header
    VolumeHeader,
    /// Bad track replacement area
    TrackReplacement,
    /// Bad sector replacement area
    SectorReplacement,
    /// Raw data
    Raw,
    /// BSD filesystem
    Bsd,
    /// System V filesystem
    SysV,
    /// Entire volume
    Volume,
    /// EFS filesystem
    Efs,
    /// Logical volume member
    LogicalVolume,
    /// Raw logical volume member
    RawLogicalVolume,
    /// XFS filesystem
    Xfs,
    /// XFS log
    XfsLog,
    /// XLV volume member
    Xlv,
    /// XVM volume member
    Xvm,
    /// Linux swap
    LinuxSwap,
    /// Linux native filesystem
    LinuxNative,
    /// Any tag not listed above
    Unknown(u32),
}

impl PartitionType {
    /// Decode a raw tag
    pub const fn from_tag(tag: u32) -> Self {
        match tag {
            0 => Self::VolumeHeader,
            1 => Self::TrackReplacement,
            2 => Self::SectorReplacement,
            3 => Self::Raw,
            4 => Self::Bsd,
            5 => Self::SysV,
            6 => Self::Volume,
            7 => Self::Efs,
            8 => Self::LogicalVolume,
            9 => Self::RawLogicalVolume,
            10 => Self::Xfs,
            11 => Self::XfsLog,
            12 => Self::Xlv,
            13 => Self::Xvm,
            0x82 => Self::LinuxSwap,
            0x83 => Self::LinuxNative,
            other => Self::Unknown(other),
        }
    }

    /// Raw on-disk tag
    pub const fn tag(self) -> u32 {
        match self {
            Self::VolumeHeader => 0,
            Self::TrackReplacement => 1,
            Self::SectorReplacement => 2,
            Self::Raw => 3,
            Self::Bsd => 4,
            Self::SysV => 5,
            Self::Volume => 6,
            Self::Efs => 7,
            Self::LogicalVolume => 8,
            Self::RawLogicalVolume => 9,
            Self::Xfs => 10,
            Self::XfsLog => 11,
            Self::Xlv => 12,
            Self::Xvm => 13,
            Self::LinuxSwap => 0x82,
            Self::LinuxNative => 0x83,
            Self::Unknown(tag) => tag,
        }
    }

    /// Human-readable label
    pub const fn label(self) -> &'static str {
        match self {
            Self::VolumeHeader => "Volume Header",
            Self::TrackReplacement => "Bad Track Replacement",
            Self::SectorReplacement => "Bad Sector Replacement",
            Self::Raw => "Data",
            Self::Bsd => "BSD filesystem",
            Self::SysV => "SysV filesystem",
            Self::Volume => "Volume",
            Self::Efs => "EFS",
            Self::LogicalVolume => "Logical Volume",
            Self::RawLogicalVolume => "Raw Logical Volume",
            Self::Xfs => "XFS",
            Self::XfsLog => "XFS Log",
            Self::Xlv => "XLV Volume",
            Self::Xvm => "XVM Volume",
            Self::LinuxSwap => "Linux Swap",
            Self::LinuxNative => "Linux Native",
            Self::Unknown(_) => "Unknown Partition Type",
        }
    }
}

impl From<u32> for PartitionType {
    fn from(tag: u32) -> Self {
        Self::from_tag(tag)
    }
}

impl fmt::Display for PartitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::{BinRead, BinWrite};
    use std::io::Cursor;

    #[test]
    fn test_known_tags_round_trip() {
        for tag in (0..=13).chain([0x82, 0x83]) {
            let kind = PartitionType::from_tag(tag);
            assert!(!matches!(kind, PartitionType::Unknown(_)), "tag {tag}");
            assert_eq!(kind.tag(), tag);
        }
    }

    #[test]
    fn test_unknown_tag_preserved() {
        let kind = PartitionType::from(0x42);
        assert_eq!(kind, PartitionType::Unknown(0x42));
        assert_eq!(kind.tag(), 0x42);
        assert_eq!(kind.to_string(), "Unknown Partition Type");
    }

    #[test]
    fn test_labels() {
        assert_eq!(PartitionType::VolumeHeader.label(), "Volume Header");
        assert_eq!(PartitionType::Raw.to_string(), "Data");
        assert_eq!(PartitionType::LinuxNative.label(), "Linux Native");
    }

    #[test]
    fn test_entry_wire_layout() {
        let entry = PartitionEntry::new(0x10, 0x1000, PartitionType::Xfs);
        let mut cursor = Cursor::new(Vec::new());
        entry.write(&mut cursor).unwrap();
        let bytes = cursor.into_inner();

        assert_eq!(bytes.len(), PARTITION_ENTRY_SIZE);
        // Block count comes first, then the first block, then the tag
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x10, 0x00]);
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x00, 0x10]);
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x00, 0x0A]);

        let parsed = PartitionEntry::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, entry);
        assert_eq!(parsed.partition_type(), PartitionType::Xfs);
    }

    #[test]
    fn test_empty_partition() {
        assert!(PartitionEntry::default().is_empty());
        assert!(!PartitionEntry::new(0, 1, PartitionType::Raw).is_empty());
    }
}
