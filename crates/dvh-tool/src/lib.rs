//! Command line front end for SGI disk volume headers.
//!
//! The `dvhtool` binary is a thin wrapper around [`run`]. Exactly one action
//! flag is accepted per invocation; with none, usage is printed.
//!
//! # Configuration Sources
//!
//! - CLI arguments (`--device`, action flags)
//! - `DVHTOOL_DEVICE` for the device path
//! - `RUST_LOG` for log filtering (read by the binary)

#![warn(missing_docs)]

pub mod print;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, CommandFactory, Parser};
use dvh_format::{BLOCK_SIZE, VolumeHeader};
use dvh_volume::{AccessMode, VolumeSession};
use tracing::info;

/// Device used when neither `--device` nor `DVHTOOL_DEVICE` is given
pub const DEFAULT_DEVICE: &str = "volhdr-1.dat";

/// Command line arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dvhtool",
    about = "Manipulate the volume header of an SGI disk or disk image",
    version
)]
#[command(group(
    ArgGroup::new("action")
        .args([
            "print_volume_header",
            "print_volume_directory",
            "print_partitions",
            "print_all",
            "vh_remove",
            "vh_to_unix",
            "unix_to_vh",
            "init",
        ])
        .multiple(false)
))]
pub struct Cli {
    /// Disk device or image file holding the volume header
    #[arg(
        short = 'd',
        long,
        env = "DVHTOOL_DEVICE",
        default_value = DEFAULT_DEVICE,
        value_name = "DEVNAME"
    )]
    pub device: PathBuf,

    /// Show header data only
    #[arg(long)]
    pub print_volume_header: bool,

    /// Show volume table of contents
    #[arg(long)]
    pub print_volume_directory: bool,

    /// Show partition data
    #[arg(long)]
    pub print_partitions: bool,

    /// Equivalent to all three print options
    #[arg(long)]
    pub print_all: bool,

    /// Remove volhdr file NAME from the volume header
    #[arg(long, value_name = "NAME")]
    pub vh_remove: Option<String>,

    /// Copy volhdr file NAME to Unix file FILE
    #[arg(long, num_args = 2, value_names = ["NAME", "FILE"])]
    pub vh_to_unix: Option<Vec<String>>,

    /// Copy Unix file FILE to the volume header as NAME
    #[arg(long, num_args = 2, value_names = ["FILE", "NAME"])]
    pub unix_to_vh: Option<Vec<String>>,

    /// Create a new image with an empty BLOCKS-block volume header partition
    #[arg(long, value_name = "BLOCKS")]
    pub init: Option<u32>,
}

/// What a single invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Print usage and exit
    Usage,
    /// Print the boot information block
    PrintHeader,
    /// Print the volume directory
    PrintDirectory,
    /// Print the partition table
    PrintPartitions,
    /// Print partitions, boot information and directory
    PrintAll,
    /// Remove a directory entry
    Remove {
        /// Entry name
        name: String,
    },
    /// Copy a directory entry out to a plain file
    Extract {
        /// Entry name
        name: String,
        /// Destination file
        file: PathBuf,
    },
    /// Copy a plain file into the directory
    Insert {
        /// Source file
        file: PathBuf,
        /// Entry name
        name: String,
    },
    /// Write a blank image
    Init {
        /// Size of the volume header partition in blocks
        blocks: u32,
    },
}

impl Cli {
    /// Parse arguments from the process command line.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// The action selected by the flags.
    #[must_use]
    pub fn action(&self) -> Action {
        if self.print_volume_header {
            Action::PrintHeader
        } else if self.print_volume_directory {
            Action::PrintDirectory
        } else if self.print_partitions {
            Action::PrintPartitions
        } else if self.print_all {
            Action::PrintAll
        } else if let Some(name) = &self.vh_remove {
            Action::Remove { name: name.clone() }
        } else if let Some([name, file]) = self.vh_to_unix.as_deref() {
            Action::Extract {
                name: name.clone(),
                file: PathBuf::from(file),
            }
        } else if let Some([file, name]) = self.unix_to_vh.as_deref() {
            Action::Insert {
                file: PathBuf::from(file),
                name: name.clone(),
            }
        } else if let Some(blocks) = self.init {
            Action::Init { blocks }
        } else {
            Action::Usage
        }
    }
}

/// Carry out the action selected by `cli`, writing listings to `out`.
///
/// # Errors
///
/// Returns an error if the device cannot be opened or fails validation, or
/// if the selected operation is rejected or fails part way.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<()> {
    let device = cli.device.as_path();

    match cli.action() {
        Action::Usage => {
            write!(out, "{}", Cli::command().render_help())?;
            Ok(())
        }
        Action::PrintHeader => print_with(device, out, print::print_volume_header),
        Action::PrintDirectory => print_with(device, out, print::print_volume_directory),
        Action::PrintPartitions => print_with(device, out, print::print_partitions),
        Action::PrintAll => print_with(device, out, print::print_all),
        Action::Remove { name } => {
            let mut session = open(device, AccessMode::ReadWrite)?;
            session
                .remove(&name)
                .with_context(|| format!("Couldn't remove {name:?}"))?;
            session.close().context("Couldn't close device")
        }
        Action::Extract { name, file } => {
            let mut session = open(device, AccessMode::ReadOnly)?;
            session
                .extract(&name, &file)
                .with_context(|| format!("Couldn't copy {name:?} to {}", file.display()))?;
            session.close().context("Couldn't close device")
        }
        Action::Insert { file, name } => {
            let mut session = open(device, AccessMode::ReadWrite)?;
            session
                .insert(&file, &name)
                .with_context(|| format!("Couldn't copy {} to {name:?}", file.display()))?;
            session.close().context("Couldn't close device")
        }
        Action::Init { blocks } => init_image(device, blocks),
    }
}

fn open(device: &Path, mode: AccessMode) -> Result<VolumeSession> {
    VolumeSession::open(device, mode)
        .with_context(|| format!("Can't open disk volume header on {}", device.display()))
}

fn print_with<W: Write>(
    device: &Path,
    out: &mut W,
    print: impl FnOnce(&mut W, &VolumeHeader) -> std::io::Result<()>,
) -> Result<()> {
    let session = open(device, AccessMode::ReadOnly)?;
    print(out, session.header()).context("Couldn't write listing")?;
    session.close().context("Couldn't close device")
}

/// Write a blank image whose volume header partition spans `blocks` blocks.
///
/// The file is sized to the whole partition; an existing file is never
/// overwritten.
fn init_image(path: &Path, blocks: u32) -> Result<()> {
    if blocks == 0 {
        bail!("volume header partition must span at least one block");
    }

    let mut header = VolumeHeader::new_blank(blocks);
    let block = header.encode().context("Couldn't encode blank header")?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("Couldn't create {}", path.display()))?;
    file.write_all(&block)
        .and_then(|()| file.set_len(u64::from(blocks) * BLOCK_SIZE as u64))
        .and_then(|()| file.sync_all())
        .with_context(|| format!("Couldn't write {}", path.display()))?;

    info!(path = %path.display(), blocks, "created blank volume header");
    Ok(())
}
