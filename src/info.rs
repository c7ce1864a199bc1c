//! print what the superblock and the descriptor table say about a volume
use std::{fmt::Write as _, path::Path};

use byte_unit::Byte;

use crate::{cli_interface::open_volume, Ext2Fs};

/// print the summary of the image at `image_file_path`
pub fn info<P>(image_file_path: P) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let fs = open_volume(image_file_path)?;
    print!("{}", volume_report(&fs)?);
    Ok(())
}

fn human_size(bytes: u64) -> String {
    Byte::from_bytes(bytes as _)
        .get_appropriate_unit(true)
        .to_string()
}

/// render the superblock summary followed by one line per block group
pub fn volume_report<S>(fs: &Ext2Fs<S>) -> anyhow::Result<String> {
    let superblock = fs.superblock();
    let block_size = fs.block_size() as u64;
    let mut report = String::new();

    writeln!(report, "volume name: {}", superblock.volume_label())?;
    writeln!(report, "last mounted on: {}", superblock.last_mounted())?;
    writeln!(report, "revision: {}.{}", superblock.major_version, superblock.minor_version)?;
    writeln!(report, "state: {:?}", superblock.state)?;
    writeln!(report, "errors: {:?}", superblock.error_handling)?;
    writeln!(report, "creator os: {:?}", superblock.creator_os)?;
    writeln!(
        report,
        "size: {} ({} blocks of {})",
        human_size(fs.block_count() as u64 * block_size),
        fs.block_count(),
        human_size(block_size)
    )?;
    writeln!(
        report,
        "free: {} ({} blocks), {} reserved blocks",
        human_size(superblock.free_block_count as u64 * block_size),
        superblock.free_block_count,
        superblock.reserved_block_count
    )?;
    writeln!(
        report,
        "inodes: {} of {} bytes, {} free",
        fs.inode_count(),
        fs.inode_size(),
        superblock.free_inode_count
    )?;
    writeln!(report, "fragment size: {}", human_size(fs.fragment_size() as u64))?;
    writeln!(
        report,
        "groups: {} ({} blocks and {} inodes each)",
        fs.group_count(),
        fs.blocks_per_group(),
        fs.inodes_per_group()
    )?;
    writeln!(report, "compatible features: {:?}", superblock.feature_compat)?;
    writeln!(report, "incompatible features: {:?}", superblock.feature_incompat)?;
    writeln!(report, "read-only features: {:?}", superblock.feature_ro_compat)?;

    for layout in fs.layout() {
        let descriptor = fs.descriptor(layout.group)?;
        writeln!(
            report,
            "group {}: block bitmap {}, inode bitmap {}, inode table {}, {} free blocks, {} free inodes, {} directories",
            layout.group,
            descriptor.block_bitmap_block,
            descriptor.inode_bitmap_block,
            descriptor.inode_table_block,
            descriptor.free_blocks,
            descriptor.free_inodes,
            descriptor.directories
        )?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::init_test_environment::sample_image;

    #[test]
    fn test_report_of_sample_volume() -> anyhow::Result<()> {
        let fs = Ext2Fs::open(sample_image())?;
        let report = volume_report(&fs)?;

        assert!(report.contains("volume name: sample\n"));
        assert!(report.contains("last mounted on: /mnt/sample\n"));
        assert!(report.contains("state: Clean\n"));
        assert!(report.contains("1024 blocks of"));
        assert!(report.contains("inodes: 32 of 128 bytes, 20 free\n"));
        assert!(report.contains("groups: 1 (8192 blocks and 32 inodes each)\n"));
        assert!(report.contains(
            "group 0: block bitmap 3, inode bitmap 4, inode table 5, 1009 free blocks, 20 free inodes, 1 directories\n"
        ));
        Ok(())
    }
}
