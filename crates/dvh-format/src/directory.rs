//! Volume directory: the fixed table of named blobs kept in the header region
//!
//! On disk every slot is 16 bytes: an 8-byte NUL-padded name followed by a
//! big-endian start block and byte length. A slot whose first name byte is
//! zero is free. In memory the slots are `Option<DirectoryEntry>` so the
//! free/occupied distinction does not hinge on a sentinel name.
//!
//! Slots are normalized on the way back out. A free slot is written as 16
//! zero bytes even if it was read with a stale start or length, and name
//! bytes after the first NUL are not kept.
//!
//! Lookup is first-match in slot order. Nothing in the on-disk format stops
//! two slots from carrying the same name; when that happens only the first
//! is reachable by name. [`DirectoryTable::duplicate_names`] reports such
//! masked entries and [`DirectoryTable::remove_all_named`] clears every copy.

use crate::error::{FormatError, FormatResult};
use crate::BLOCK_SIZE;
use binrw::{BinRead, BinWrite};
use std::fmt;
use std::str::FromStr;

/// Number of directory slots in a volume header
pub const NVDIR: usize = 15;

/// Maximum length of a directory entry name in bytes
pub const VDNAMESIZE: usize = 8;

/// Size of one on-disk directory slot in bytes
pub const DIRECTORY_ENTRY_SIZE: usize = 16;

/// Name of a directory entry: 1 to 8 bytes, no NUL
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectoryName {
    bytes: [u8; VDNAMESIZE],
    len: usize,
}

impl DirectoryName {
    /// Validate a name given as a string
    pub fn new(name: &str) -> FormatResult<Self> {
        Self::from_bytes(name.as_bytes())
    }

    /// Validate a name given as raw bytes
    pub fn from_bytes(name: &[u8]) -> FormatResult<Self> {
        let reject = |reason| FormatError::InvalidName {
            name: String::from_utf8_lossy(name).into_owned(),
            reason,
        };

        if name.is_empty() {
            return Err(reject("name is empty"));
        }
        if name.len() > VDNAMESIZE {
            return Err(reject("name is longer than 8 bytes"));
        }
        if name.contains(&0) {
            return Err(reject("name contains a NUL byte"));
        }

        let mut bytes = [0u8; VDNAMESIZE];
        bytes[..name.len()].copy_from_slice(name);
        Ok(Self {
            bytes,
            len: name.len(),
        })
    }

    /// Read a name field; `None` marks a free slot
    fn from_field(field: [u8; VDNAMESIZE]) -> Option<Self> {
        let len = field.iter().position(|&b| b == 0).unwrap_or(VDNAMESIZE);
        if len == 0 {
            return None;
        }
        let mut bytes = [0u8; VDNAMESIZE];
        bytes[..len].copy_from_slice(&field[..len]);
        Some(Self { bytes, len })
    }

    /// Name bytes without padding
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// NUL-padded field as stored on disk
    pub const fn to_field(&self) -> [u8; VDNAMESIZE] {
        self.bytes
    }
}

impl FromStr for DirectoryName {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for DirectoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for DirectoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DirectoryName")
            .field(&String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

/// An occupied directory slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name
    pub name: DirectoryName,
    /// First logical block holding the entry's bytes
    pub first_block: u32,
    /// Length of the entry in bytes
    pub byte_len: u32,
}

impl DirectoryEntry {
    /// Create an entry
    pub const fn new(name: DirectoryName, first_block: u32, byte_len: u32) -> Self {
        Self {
            name,
            first_block,
            byte_len,
        }
    }

    /// Number of whole blocks the entry occupies
    pub const fn block_count(&self) -> u32 {
        self.byte_len.div_ceil(BLOCK_SIZE as u32)
    }

    /// Byte offset of the entry on the device
    pub const fn byte_offset(&self) -> u64 {
        self.first_block as u64 * BLOCK_SIZE as u64
    }
}

/// On-disk form of a slot
#[derive(BinRead, BinWrite)]
#[brw(big)]
struct RawSlot {
    name: [u8; VDNAMESIZE],
    first_block: u32,
    byte_len: u32,
}

impl RawSlot {
    fn into_entry(self) -> Option<DirectoryEntry> {
        DirectoryName::from_field(self.name)
            .map(|name| DirectoryEntry::new(name, self.first_block, self.byte_len))
    }

    fn from_entry(slot: Option<DirectoryEntry>) -> Self {
        match slot {
            Some(entry) => Self {
                name: entry.name.to_field(),
                first_block: entry.first_block,
                byte_len: entry.byte_len,
            },
            None => Self {
                name: [0; VDNAMESIZE],
                first_block: 0,
                byte_len: 0,
            },
        }
    }
}

/// The fixed array of directory slots
#[derive(Debug, Clone, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct DirectoryTable {
    #[br(map = |raw: [RawSlot; NVDIR]| raw.map(RawSlot::into_entry))]
    #[bw(map = |slots: &[Option<DirectoryEntry>; NVDIR]| (*slots).map(RawSlot::from_entry))]
    slots: [Option<DirectoryEntry>; NVDIR],
}

impl DirectoryTable {
    /// Create a table with every slot free
    pub fn new() -> Self {
        Self::default()
    }

    /// All slots in index order
    pub fn slots(&self) -> &[Option<DirectoryEntry>; NVDIR] {
        &self.slots
    }

    /// Entry in slot `index`, if occupied
    pub fn get(&self, index: usize) -> Option<&DirectoryEntry> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Index of the first occupied slot named `name`
    pub fn find_by_name(&self, name: &DirectoryName) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|entry| entry.name == *name))
    }

    /// First occupied slot named `name` together with its index
    pub fn lookup(&self, name: &DirectoryName) -> Option<(usize, &DirectoryEntry)> {
        self.find_by_name(name)
            .and_then(|index| self.get(index).map(|entry| (index, entry)))
    }

    /// Occupied slots in index order
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &DirectoryEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|entry| (index, entry)))
    }

    /// Occupied slots in index order, mutably
    pub fn occupied_mut(&mut self) -> impl Iterator<Item = (usize, &mut DirectoryEntry)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_mut().map(|entry| (index, entry)))
    }

    /// Number of occupied slots
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of free slots
    pub fn free_count(&self) -> usize {
        NVDIR - self.occupied_count()
    }

    /// No free slot left
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Index of the lowest free slot
    pub fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Store `entry` in slot `index`, returning what was there.
    ///
    /// Indices past the end of the table are ignored.
    pub fn place(&mut self, index: usize, entry: DirectoryEntry) -> Option<DirectoryEntry> {
        self.slots.get_mut(index).and_then(|slot| slot.replace(entry))
    }

    /// Free slot `index`, returning the entry it held.
    ///
    /// The entry's blocks are not reclaimed until the next repack.
    pub fn mark_free(&mut self, index: usize) -> Option<DirectoryEntry> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Free every slot named `name`; returns how many were cleared
    pub fn remove_all_named(&mut self, name: &DirectoryName) -> usize {
        let mut cleared = 0;
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|entry| entry.name == *name) {
                *slot = None;
                cleared += 1;
            }
        }
        cleared
    }

    /// Names held by more than one slot, in order of first appearance
    pub fn duplicate_names(&self) -> Vec<DirectoryName> {
        let mut duplicates: Vec<DirectoryName> = Vec::new();
        for (index, entry) in self.occupied() {
            if duplicates.contains(&entry.name) {
                continue;
            }
            if self.find_by_name(&entry.name) != Some(index) {
                duplicates.push(entry.name);
            }
        }
        duplicates
    }

    /// Total blocks occupied by all entries
    pub fn used_blocks(&self) -> u64 {
        self.occupied()
            .map(|(_, entry)| u64::from(entry.block_count()))
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::{BinRead, BinWrite};
    use std::io::Cursor;

    fn name(s: &str) -> DirectoryName {
        DirectoryName::new(s).unwrap()
    }

    fn entry(s: &str, first_block: u32, byte_len: u32) -> DirectoryEntry {
        DirectoryEntry::new(name(s), first_block, byte_len)
    }

    #[test]
    fn test_name_validation() {
        assert!(DirectoryName::new("sash").is_ok());
        assert!(DirectoryName::new("12345678").is_ok());
        assert!(matches!(
            DirectoryName::new(""),
            Err(FormatError::InvalidName { .. })
        ));
        assert!(matches!(
            DirectoryName::new("123456789"),
            Err(FormatError::InvalidName { .. })
        ));
        assert!(matches!(
            DirectoryName::from_bytes(b"ab\0c"),
            Err(FormatError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_name_field_padding() {
        let n = name("ide");
        assert_eq!(n.as_bytes(), b"ide");
        assert_eq!(&n.to_field(), b"ide\0\0\0\0\0");
        assert_eq!(n.to_string(), "ide");

        // Full-width names carry no terminator
        assert_eq!(
            DirectoryName::from_field(*b"symmon64"),
            Some(name("symmon64"))
        );
        // Bytes after the first NUL are not part of the name
        assert_eq!(DirectoryName::from_field(*b"sa\0xxxxx"), Some(name("sa")));
        assert_eq!(DirectoryName::from_field([0; VDNAMESIZE]), None);
    }

    #[test]
    fn test_block_count_rounds_up() {
        assert_eq!(entry("a", 0, 0).block_count(), 0);
        assert_eq!(entry("a", 0, 1).block_count(), 1);
        assert_eq!(entry("a", 0, 512).block_count(), 1);
        assert_eq!(entry("a", 0, 513).block_count(), 2);
        assert_eq!(entry("a", 0, 3000).block_count(), 6);
        assert_eq!(entry("a", 6, 10).byte_offset(), 3072);
    }

    #[test]
    fn test_find_and_slot_counts() {
        let mut table = DirectoryTable::new();
        assert_eq!(table.free_count(), NVDIR);
        assert_eq!(table.first_free(), Some(0));

        table.place(0, entry("sash", 4, 1024));
        table.place(3, entry("ide", 6, 100));

        assert_eq!(table.find_by_name(&name("ide")), Some(3));
        assert_eq!(table.find_by_name(&name("missing")), None);
        assert_eq!(table.occupied_count(), 2);
        assert_eq!(table.free_count(), NVDIR - 2);
        assert_eq!(table.first_free(), Some(1));
        assert_eq!(table.used_blocks(), 3);

        let order: Vec<usize> = table.occupied().map(|(index, _)| index).collect();
        assert_eq!(order, vec![0, 3]);
    }

    #[test]
    fn test_mark_free_and_full_table() {
        let mut table = DirectoryTable::new();
        for index in 0..NVDIR {
            table.place(index, entry(&format!("e{index}"), 0, 1));
        }
        assert!(table.is_full());
        assert_eq!(table.first_free(), None);

        let freed = table.mark_free(7).unwrap();
        assert_eq!(freed.name, name("e7"));
        assert!(!table.is_full());
        assert_eq!(table.first_free(), Some(7));
        assert!(table.mark_free(7).is_none());
        assert!(table.mark_free(NVDIR).is_none());
    }

    #[test]
    fn test_duplicate_names_mask_later_slots() {
        let mut table = DirectoryTable::new();
        table.place(1, entry("boot", 4, 10));
        table.place(4, entry("boot", 5, 20));
        table.place(5, entry("other", 6, 30));

        // Lookup only ever reaches the first copy
        let (index, found) = table.lookup(&name("boot")).unwrap();
        assert_eq!(index, 1);
        assert_eq!(found.byte_len, 10);
        assert_eq!(table.duplicate_names(), vec![name("boot")]);

        assert_eq!(table.remove_all_named(&name("boot")), 2);
        assert!(table.duplicate_names().is_empty());
        assert_eq!(table.occupied_count(), 1);
    }

    #[test]
    fn test_wire_layout() {
        let mut table = DirectoryTable::new();
        table.place(0, entry("sash", 4, 0x1234));

        let mut cursor = Cursor::new(Vec::new());
        table.write(&mut cursor).unwrap();
        let bytes = cursor.into_inner();

        assert_eq!(bytes.len(), NVDIR * DIRECTORY_ENTRY_SIZE);
        assert_eq!(&bytes[0..8], b"sash\0\0\0\0");
        assert_eq!(&bytes[8..12], &[0, 0, 0, 4]);
        assert_eq!(&bytes[12..16], &[0, 0, 0x12, 0x34]);
        assert!(bytes[16..].iter().all(|&b| b == 0));

        let parsed = DirectoryTable::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_free_slot_ignores_stale_fields() {
        // A slot with an empty name is free whatever its other fields hold
        let mut bytes = vec![0u8; NVDIR * DIRECTORY_ENTRY_SIZE];
        bytes[8..12].copy_from_slice(&7u32.to_be_bytes());
        bytes[12..16].copy_from_slice(&99u32.to_be_bytes());

        let parsed = DirectoryTable::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed.occupied_count(), 0);

        // Written back, the stale fields are gone
        let mut cursor = Cursor::new(Vec::new());
        parsed.write(&mut cursor).unwrap();
        assert!(cursor.into_inner().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_bytes_after_name_terminator_are_dropped() {
        let mut bytes = vec![0u8; NVDIR * DIRECTORY_ENTRY_SIZE];
        bytes[0..8].copy_from_slice(b"sa\0xxxxx");
        bytes[8..12].copy_from_slice(&4u32.to_be_bytes());
        bytes[12..16].copy_from_slice(&10u32.to_be_bytes());

        let parsed = DirectoryTable::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed.lookup(&name("sa")).unwrap().0, 0);

        let mut cursor = Cursor::new(Vec::new());
        parsed.write(&mut cursor).unwrap();
        let written = cursor.into_inner();
        assert_eq!(&written[0..8], b"sa\0\0\0\0\0\0");
        assert_eq!(&written[8..16], &[0, 0, 0, 4, 0, 0, 0, 10]);
    }
}
