//! Open sessions over a volume header.
//!
//! A session reads and validates block 0 when it opens and keeps the decoded
//! header in memory. `extract` only reads. `insert` and `remove` run the
//! repack planner first; nothing is written unless the plan is accepted.
//!
//! A commit then runs in two phases:
//! 1. Read every surviving entry from its current blocks into memory
//! 2. Write every live entry at its new blocks, in slot order, then the
//!    re-encoded header
//!
//! A failure in phase 1 leaves the device untouched. A failure in phase 2
//! leaves a torn image: the session logs it, returns the error and refuses
//! any further mutation.

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use dvh_format::{DirectoryEntry, DirectoryName, VOLUME_HEADER_SIZE, VolumeHeader};
use tracing::{debug, error, info, warn};

use crate::allocator::{self, RepackPlan};
use crate::config::VolumeConfig;
use crate::device::{BlockDevice, alloc_buffer, read_exact_at, write_all_at};
use crate::{Result, VolumeError};

/// How the device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Header and entries can be read but not modified.
    ReadOnly,
    /// Entries can be inserted and removed.
    ReadWrite,
}

impl AccessMode {
    /// Check if this mode allows writes.
    pub const fn can_write(self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

/// An open volume header.
///
/// Dropping the session releases the device.
#[derive(Debug)]
pub struct VolumeSession<D = File> {
    device: D,
    header: VolumeHeader,
    mode: AccessMode,
    config: VolumeConfig,
    torn: bool,
}

impl VolumeSession<File> {
    /// Open the device or image file at `path`.
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        Self::open_with_config(path, mode, VolumeConfig::default())
    }

    /// Open with non-default layout constants.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        mode: AccessMode,
        config: VolumeConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(mode.can_write())
            .open(path)
            .map_err(|e| VolumeError::io(format!("Couldn't open {}", path.display()), e))?;

        info!(path = %path.display(), ?mode, "opening volume header");
        Self::from_device_with_config(file, mode, config)
    }
}

impl<D: BlockDevice> VolumeSession<D> {
    /// Wrap an already open device.
    pub fn from_device(device: D, mode: AccessMode) -> Result<Self> {
        Self::from_device_with_config(device, mode, VolumeConfig::default())
    }

    /// Wrap an already open device with non-default layout constants.
    pub fn from_device_with_config(
        mut device: D,
        mode: AccessMode,
        config: VolumeConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut block = [0u8; VOLUME_HEADER_SIZE];
        read_exact_at(&mut device, &mut block, 0)?;
        let header = VolumeHeader::decode(&block)?;

        for name in header.directory.duplicate_names() {
            warn!(name = %name, "duplicate directory name; only the first slot is reachable");
        }
        debug!(
            entries = header.directory.occupied_count(),
            capacity = allocator::capacity_blocks(&header, &config),
            "volume header validated"
        );

        Ok(Self {
            device,
            header,
            mode,
            config,
            torn: false,
        })
    }

    /// Decoded header as of the last successful commit.
    pub const fn header(&self) -> &VolumeHeader {
        &self.header
    }

    /// Access mode the session was opened with.
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Layout constants in use.
    pub const fn config(&self) -> &VolumeConfig {
        &self.config
    }

    /// Whether a failed commit left the device inconsistent.
    pub const fn is_torn(&self) -> bool {
        self.torn
    }

    /// Blocks available to directory entries in total.
    pub fn capacity_blocks(&self) -> u64 {
        allocator::capacity_blocks(&self.header, &self.config)
    }

    /// Blocks not yet used by any entry.
    pub fn free_blocks(&self) -> u64 {
        self.capacity_blocks()
            .saturating_sub(self.header.directory.used_blocks())
    }

    /// First directory entry named `name`.
    pub fn lookup(&self, name: &str) -> Result<(usize, DirectoryEntry)> {
        let name = DirectoryName::new(name)?;
        self.header
            .directory
            .lookup(&name)
            .map(|(slot, entry)| (slot, *entry))
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))
    }

    /// Read the full contents of the entry named `name`.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let (slot, entry) = self.lookup(name)?;
        debug!(slot, name, bytes = entry.byte_len, "reading entry");

        let mut buf = alloc_buffer(u64::from(entry.byte_len))?;
        read_exact_at(&mut self.device, &mut buf, entry.byte_offset())?;
        Ok(buf)
    }

    /// Copy the entry named `name` into a plain file at `destination`.
    ///
    /// The file is created or truncated. If it cannot be written in full it
    /// is deleted before the error is returned.
    pub fn extract(&mut self, name: &str, destination: &Path) -> Result<()> {
        self.extract_with(name, destination, |path| File::create(path))
    }

    /// Like [`extract`](Self::extract), with `create` opening the output
    /// for `destination`.
    ///
    /// `create` is only called once the entry has been read. If the write
    /// fails, whatever `create` left at `destination` is removed.
    pub fn extract_with<W, F>(&mut self, name: &str, destination: &Path, create: F) -> Result<()>
    where
        W: BlockDevice,
        F: FnOnce(&Path) -> std::io::Result<W>,
    {
        let data = self.read_entry(name)?;

        let mut output = create(destination).map_err(|e| {
            VolumeError::io(
                format!("Couldn't open destination {}", destination.display()),
                e,
            )
        })?;

        let written = write_all_at(&mut output, &data, 0);
        drop(output);
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(destination) {
                warn!(path = %destination.display(), error = %cleanup, "couldn't remove partial output");
            }
            return Err(e);
        }

        info!(name, path = %destination.display(), bytes = data.len(), "extracted entry");
        Ok(())
    }

    /// Store the plain file at `source` under `name`, replacing any entry
    /// that already has that name.
    pub fn insert(&mut self, source: &Path, name: &str) -> Result<()> {
        self.ensure_writable()?;
        let name = DirectoryName::new(name)?;

        let mut file = File::open(source).map_err(|e| {
            VolumeError::io(format!("Couldn't open input {}", source.display()), e)
        })?;
        let size = file
            .metadata()
            .map_err(|e| VolumeError::io(format!("Couldn't stat {}", source.display()), e))?
            .len();

        let plan = allocator::plan_insert(&self.header, &self.config, &name, size)?;

        let mut data = alloc_buffer(size)?;
        read_exact_at(&mut file, &mut data, 0)?;

        self.commit(plan, Some(&data))?;
        info!(name = %name, path = %source.display(), bytes = size, "inserted entry");
        Ok(())
    }

    /// Store `data` under `name`, replacing any entry that already has that
    /// name.
    pub fn insert_bytes(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let name = DirectoryName::new(name)?;

        let plan = allocator::plan_insert(&self.header, &self.config, &name, data.len() as u64)?;
        self.commit(plan, Some(data))?;
        info!(name = %name, bytes = data.len(), "inserted entry");
        Ok(())
    }

    /// Drop the entry named `name` and repack the rest.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.ensure_writable()?;
        let name = DirectoryName::new(name)?;

        let plan = allocator::plan_remove(&self.header, &self.config, &name)?;
        if plan.cleared > 1 {
            warn!(name = %name, copies = plan.cleared, "removed duplicate directory entries");
        }
        self.commit(plan, None)?;
        info!(name = %name, "removed entry");
        Ok(())
    }

    /// Sync and release the device.
    pub fn close(mut self) -> Result<()> {
        self.device
            .sync()
            .map_err(|e| VolumeError::io("Couldn't sync device", e))
    }

    /// Release the session and hand back the device.
    pub fn into_inner(self) -> D {
        self.device
    }

    fn ensure_writable(&self) -> Result<()> {
        if !self.mode.can_write() {
            return Err(VolumeError::ReadOnly);
        }
        if self.torn {
            return Err(VolumeError::Torn);
        }
        Ok(())
    }

    fn commit(&mut self, plan: RepackPlan, new_data: Option<&[u8]>) -> Result<()> {
        // Phase 1: buffer survivors from their old blocks. Later entries may
        // be moved over the old blocks of earlier ones, so everything is read
        // before anything is written.
        let mut buffers = Vec::with_capacity(plan.placements.len());
        for placement in &plan.placements {
            let buffer = match placement.source_offset() {
                Some(offset) => {
                    let mut buf = alloc_buffer(u64::from(placement.byte_len))?;
                    read_exact_at(&mut self.device, &mut buf, offset)?;
                    debug!(slot = placement.slot, "copying entry to buffer");
                    Some(buf)
                }
                None if new_data.is_some() => None,
                None => {
                    return Err(VolumeError::Config(format!(
                        "no content supplied for directory slot {}",
                        placement.slot
                    )));
                }
            };
            buffers.push(buffer);
        }

        let mut header = self.header.clone();
        header.directory = plan.directory.clone();
        let block = header.encode()?;

        // Phase 2: from here on a failure leaves the image torn
        if let Err(e) = self.write_phase(&plan, &buffers, new_data, &block) {
            self.torn = true;
            error!(
                error = %e,
                "volume header commit failed part way; on-disk image is inconsistent"
            );
            return Err(e);
        }

        self.header = header;
        Ok(())
    }

    fn write_phase(
        &mut self,
        plan: &RepackPlan,
        buffers: &[Option<Vec<u8>>],
        new_data: Option<&[u8]>,
        header_block: &[u8],
    ) -> Result<()> {
        for (placement, buffer) in plan.placements.iter().zip(buffers) {
            let data = buffer.as_deref().or(new_data).unwrap_or_default();
            debug!(slot = placement.slot, block = placement.first_block, "writing entry");
            write_all_at(&mut self.device, data, placement.dest_offset())?;
        }

        write_all_at(&mut self.device, header_block, 0)?;
        self.device
            .sync()
            .map_err(|e| VolumeError::io("Couldn't sync volume header", e))?;
        debug!(bytes = header_block.len(), "rewrote volume header");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use dvh_format::BLOCK_SIZE;
    use std::io::Cursor;

    /// In-memory image with a 64-block volume header partition
    fn image() -> Cursor<Vec<u8>> {
        let mut header = VolumeHeader::new_blank(64);
        let mut data = header.encode().unwrap().to_vec();
        data.resize(64 * BLOCK_SIZE, 0);
        Cursor::new(data)
    }

    fn read_write() -> VolumeSession<Cursor<Vec<u8>>> {
        VolumeSession::from_device(image(), AccessMode::ReadWrite).unwrap()
    }

    #[test]
    fn test_open_validates_header() {
        let mut raw = image().into_inner();
        raw[100] ^= 0xFF;
        let err = VolumeSession::from_device(Cursor::new(raw), AccessMode::ReadOnly).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_open_short_device() {
        let err =
            VolumeSession::from_device(Cursor::new(vec![0u8; 100]), AccessMode::ReadOnly).unwrap_err();
        assert!(matches!(
            err,
            VolumeError::ShortRead {
                expected: VOLUME_HEADER_SIZE,
                actual: 100
            }
        ));
    }

    #[test]
    fn test_read_only_refuses_mutation() {
        let mut session = VolumeSession::from_device(image(), AccessMode::ReadOnly).unwrap();
        assert!(matches!(
            session.insert_bytes("a", b"x"),
            Err(VolumeError::ReadOnly)
        ));
        assert!(matches!(session.remove("a"), Err(VolumeError::ReadOnly)));
    }

    #[test]
    fn test_insert_read_remove() {
        let mut session = read_write();
        session.insert_bytes("sash", b"stand-alone shell").unwrap();

        let (slot, entry) = session.lookup("sash").unwrap();
        assert_eq!(slot, 0);
        assert_eq!(entry.first_block, 4);
        assert_eq!(session.read_entry("sash").unwrap(), b"stand-alone shell");
        assert_eq!(session.free_blocks(), 59);

        session.remove("sash").unwrap();
        assert!(matches!(session.lookup("sash"), Err(VolumeError::NotFound(_))));
        assert_eq!(session.free_blocks(), 60);
    }

    #[test]
    fn test_commit_rewrites_header() {
        let mut session = read_write();
        session.insert_bytes("ide", &[0x5A; 700]).unwrap();

        let raw = session.into_inner();
        let reopened = VolumeSession::from_device(raw, AccessMode::ReadOnly).unwrap();
        let (_, entry) = reopened.lookup("ide").unwrap();
        assert_eq!(entry.byte_len, 700);
        assert_eq!(entry.block_count(), 2);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut session = read_write();
        assert!(matches!(
            session.insert_bytes("much-too-long", b"x"),
            Err(VolumeError::Format(dvh_format::FormatError::InvalidName { .. }))
        ));
        assert!(session.lookup("").is_err());
    }

    #[test]
    fn test_torn_session_refuses_mutation() {
        let mut session = read_write();
        session.torn = true;
        assert!(matches!(
            session.insert_bytes("a", b"x"),
            Err(VolumeError::Torn)
        ));
        // Reads still work against the in-memory header
        assert!(matches!(session.lookup("a"), Err(VolumeError::NotFound(_))));
    }
}
