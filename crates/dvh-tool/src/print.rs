//! Human-readable listings of a volume header.

use std::io::{self, Write};

use dvh_format::VolumeHeader;

/// Print the boot information block.
pub fn print_volume_header<W: Write>(out: &mut W, header: &VolumeHeader) -> io::Result<()> {
    writeln!(out, "----- bootinfo -----")?;
    writeln!(out, "Root partition: {}", header.root_partition)?;
    writeln!(out, "Swap partition: {}", header.swap_partition)?;
    writeln!(out, "Bootfile: \"{}\"", header.boot_file_name())
}

/// Print every occupied directory slot.
pub fn print_volume_directory<W: Write>(out: &mut W, header: &VolumeHeader) -> io::Result<()> {
    writeln!(out, "----- directory entries -----")?;
    for (slot, entry) in header.directory.occupied() {
        writeln!(
            out,
            "Entry #{slot}, name \"{}\", start {}, bytes {}",
            entry.name, entry.first_block, entry.byte_len
        )?;
    }
    Ok(())
}

/// Print every partition with a non-zero size.
pub fn print_partitions<W: Write>(out: &mut W, header: &VolumeHeader) -> io::Result<()> {
    writeln!(out, "----- partitions -----")?;
    for (index, partition) in header.used_partitions() {
        writeln!(
            out,
            "Part# {index:2}, start {}, blks {}, type {}",
            partition.first_block,
            partition.blocks,
            partition.partition_type().label()
        )?;
    }
    Ok(())
}

/// Partitions, then boot information, then the directory.
pub fn print_all<W: Write>(out: &mut W, header: &VolumeHeader) -> io::Result<()> {
    print_partitions(out, header)?;
    print_volume_header(out, header)?;
    print_volume_directory(out, header)
}
