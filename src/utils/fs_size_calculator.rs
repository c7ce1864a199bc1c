//! This module contains functions to calculate the size and position of different fs components

use crate::fs::{DESCRIPTOR_SIZE, SMALL_BLOCK_SIZE};

/// calculate the byte offset of the block group descriptor table
///
/// The table lives in the block following the superblock.
/// With 1 KiB blocks the superblock has block 1 to itself, so the table is in block 2,
/// with larger blocks the superblock shares block 0 with the boot sector and the table is in block 1.
/// # Example
/// ```
/// use ext2fs::utils::fs_size_calculator::descriptor_table_offset;
/// assert_eq!(descriptor_table_offset(1024), 2048);
/// assert_eq!(descriptor_table_offset(4096), 4096);
/// ```
pub const fn descriptor_table_offset(block_size: u32) -> u64 {
    if block_size == SMALL_BLOCK_SIZE {
        2 * block_size as u64
    } else {
        block_size as u64
    }
}

/// calculate how many descriptors fit into one block of the descriptor table
/// # Example
/// ```
/// use ext2fs::utils::fs_size_calculator::descriptors_per_block;
/// assert_eq!(descriptors_per_block(1024), 32);
/// assert_eq!(descriptors_per_block(4096), 128);
/// ```
pub const fn descriptors_per_block(block_size: u32) -> usize {
    block_size as usize / DESCRIPTOR_SIZE
}

/// calculate needed Inode Table size of one block group
/// # Arguments
/// - `inodes_per_group`: the number of inodes in a group
/// - `inode_size`: the size of one inode record
/// # Example
/// ```
/// use ext2fs::utils::fs_size_calculator::inode_table_size;
/// assert_eq!(inode_table_size(2048, 128), 256 * 1024);
/// ```
pub const fn inode_table_size(inodes_per_group: u32, inode_size: u32) -> u64 {
    inodes_per_group as u64 * inode_size as u64
}

/// caculate block group size
/// # Example
/// ```
/// use ext2fs::utils::fs_size_calculator::block_group_size;
/// assert_eq!(block_group_size(1024, 8192), 8 << 20);
/// ```
pub const fn block_group_size(block_size: u32, blocks_per_group: u32) -> u64 {
    block_size as u64 * blocks_per_group as u64
}

/// calculate data region size of one block group
///
/// what is left of the group after the block bitmap, the inode bitmap and the inode table
/// # Example
/// ```
/// use ext2fs::utils::fs_size_calculator::data_table_size;
/// let block_size = 1024;
/// let table_size = data_table_size(block_size, 8192, 2048, 128);
/// assert_eq!(table_size, 8192 * 1024 - 2 * 1024 - 2048 * 128);
/// ```
pub const fn data_table_size(
    block_size: u32,
    blocks_per_group: u32,
    inodes_per_group: u32,
    inode_size: u32,
) -> u64 {
    block_group_size(block_size, blocks_per_group)
        .saturating_sub(2 * block_size as u64) // block bitmap and inode bitmap
        .saturating_sub(inode_table_size(inodes_per_group, inode_size))
}

/// calculate how many block groups cover `block_count` blocks
/// # Example
/// ```
/// use ext2fs::utils::fs_size_calculator::group_count;
/// assert_eq!(group_count(8192, 8192), 1);
/// assert_eq!(group_count(8193, 8192), 2);
/// assert_eq!(group_count(100, 0), 0);
/// ```
pub const fn group_count(block_count: u32, blocks_per_group: u32) -> u32 {
    if blocks_per_group == 0 {
        return 0;
    }
    let groups = block_count / blocks_per_group;
    if block_count % blocks_per_group != 0 {
        groups + 1
    } else {
        groups
    }
}

/// calculate how many block addresses one indirect block holds
/// # Example
/// ```
/// use ext2fs::utils::fs_size_calculator::pointers_per_block;
/// assert_eq!(pointers_per_block(1024), 256);
/// ```
pub const fn pointers_per_block(block_size: u32) -> usize {
    block_size as usize / std::mem::size_of::<u32>()
}
