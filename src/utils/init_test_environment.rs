//! a small volume built in memory, shared by the tests
//!
//! - 1 KiB blocks, 1024 blocks, a single block group of 32 inodes
//! - block bitmap in block 3, inode bitmap in block 4, inode table in blocks 5 to 8
//! - the root directory (inode 2) in block 9 holds `.`, `..`, a deleted entry and `hello.txt`
//! - `hello.txt` (inode 12) uses blocks 10, 11, 12 directly and 14, 15 through the singly indirect block 13

use std::io::Cursor;

use crate::fs::{
    BlockGroupDescriptor, CompatibleFeatures, DirectoryEntry, DirectoryEntryType, ErrorHandling,
    FileSystemState, IncompatibleFeatures, Inode, InodeAccessor, InodeFlags, InodePermissions,
    InodeType, OperatingSystemId, ReadOnlyFeatures, Superblock, ROOT_INODE,
};
use crate::utils::time_util::TimeDurationStruct;

pub const SAMPLE_BLOCK_SIZE: u32 = 1024;
pub const SAMPLE_BLOCK_COUNT: u32 = 1024;
pub const ROOT_DIRECTORY_BLOCK: u32 = 9;
pub const HELLO_INODE: u32 = 12;
pub const HELLO_SINGLY_INDIRECT_BLOCK: u32 = 13;

const SAMPLE_TIME: u32 = 1_700_000_000;

fn label<const N: usize>(text: &str) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes[..text.len()].copy_from_slice(text.as_bytes());
    bytes
}

pub fn sample_superblock() -> Superblock {
    Superblock {
        inode_count: 32,
        block_count: SAMPLE_BLOCK_COUNT,
        reserved_block_count: 51,
        free_block_count: SAMPLE_BLOCK_COUNT - 15,
        free_inode_count: 20,
        first_data_block: 1,
        block_size: SAMPLE_BLOCK_SIZE,
        fragment_size: SAMPLE_BLOCK_SIZE,
        blocks_per_group: 8192,
        fragments_per_group: 8192,
        inodes_per_group: 32,
        last_mount_time: TimeDurationStruct::from_unix_seconds(SAMPLE_TIME),
        last_write_time: TimeDurationStruct::from_unix_seconds(SAMPLE_TIME + 60),
        mounts_since_check: 3,
        max_mounts_before_check: 20,
        state: FileSystemState::Clean,
        error_handling: ErrorHandling::Continue,
        minor_version: 0,
        last_check_time: TimeDurationStruct::from_unix_seconds(SAMPLE_TIME - 3600),
        check_interval: std::time::Duration::from_secs(0),
        creator_os: OperatingSystemId::Linux,
        major_version: 1,
        reserved_uid: 0,
        reserved_gid: 0,
        first_non_reserved_inode: 11,
        inode_size: 128,
        block_group_number: 0,
        feature_compat: CompatibleFeatures::EXTENDED_ATTRIBUTES,
        feature_incompat: IncompatibleFeatures::FILE_TYPE,
        feature_ro_compat: ReadOnlyFeatures::SPARSE_SUPERBLOCKS,
        filesystem_id: *b"\x01\x23\x45\x67\x89\xab\xcd\xef\x10\x32\x54\x76\x98\xba\xdc\xfe",
        volume_name: label("sample"),
        last_mounted_path: label("/mnt/sample"),
        compression_algorithms: 0,
        prealloc_file_blocks: 0,
        prealloc_dir_blocks: 0,
        journal_id: [0u8; 16],
        journal_inode: 0,
        journal_device: 0,
    }
}

/// one descriptor per 32 bytes of a block, only the first group is in use
pub fn sample_descriptors() -> Vec<BlockGroupDescriptor> {
    let mut descriptors = vec![BlockGroupDescriptor::default(); 32];
    descriptors[0] = BlockGroupDescriptor {
        block_bitmap_block: 3,
        inode_bitmap_block: 4,
        inode_table_block: 5,
        free_blocks: (SAMPLE_BLOCK_COUNT - 15) as u16,
        free_inodes: 20,
        directories: 1,
    };
    descriptors
}

pub fn sample_root_inode() -> Inode {
    let time = TimeDurationStruct::from_unix_seconds(SAMPLE_TIME);
    Inode {
        inode_type: InodeType::Directory,
        permissions: InodePermissions::from_bits_truncate(0o755),
        uid: 0,
        size: SAMPLE_BLOCK_SIZE,
        accessed_at: Some(time),
        created_at: time,
        modified_at: Some(time),
        deleted_at: None,
        gid: 0,
        hard_links: 2,
        sector_count: 2,
        flags: InodeFlags::empty(),
        direct_blocks: vec![ROOT_DIRECTORY_BLOCK],
        singly_indirect_block: None,
        doubly_indirect_block: None,
        triply_indirect_block: None,
        generation: 0,
        file_acl: 0,
        directory_acl: 0,
        fragment_address: 0,
        os_specific: [0u8; 16],
    }
}

pub fn sample_file_inode() -> Inode {
    let time = TimeDurationStruct::from_unix_seconds(SAMPLE_TIME + 30);
    Inode {
        inode_type: InodeType::File,
        permissions: InodePermissions::from_bits_truncate(0o644),
        uid: 1001,
        size: 5 * SAMPLE_BLOCK_SIZE - 100,
        accessed_at: Some(time),
        created_at: time,
        modified_at: None,
        deleted_at: None,
        gid: 1001,
        hard_links: 1,
        sector_count: 12,
        flags: InodeFlags::NO_DUMP,
        direct_blocks: vec![10, 11, 12],
        singly_indirect_block: Some(HELLO_SINGLY_INDIRECT_BLOCK),
        doubly_indirect_block: None,
        triply_indirect_block: None,
        generation: 7,
        file_acl: 0,
        directory_acl: 0,
        fragment_address: 0,
        os_specific: [0u8; 16],
    }
}

/// a symbolic link keeping `target` where the block pointers go
pub fn sample_fast_symlink(target: &str) -> anyhow::Result<Inode> {
    let mut link = Inode::new(
        InodeType::SymbolicLink,
        InodePermissions::from_bits_truncate(0o777),
    );
    link.size = target.len() as u32;
    let mut bytes = link.encode()?;
    bytes[40..40 + target.len()].copy_from_slice(target.as_bytes());
    Ok(Inode::decode(&bytes)?)
}

/// `.`, `..`, a deleted entry, then `hello.txt` stretched to the end of the block
pub fn sample_root_directory_block() -> Vec<u8> {
    let entries = [
        DirectoryEntry::new(ROOT_INODE, ".", DirectoryEntryType::Directory),
        DirectoryEntry::new(ROOT_INODE, "..", DirectoryEntryType::Directory),
        DirectoryEntry::new(0, "deleted", DirectoryEntryType::RegularFile),
        DirectoryEntry::new(HELLO_INODE, "hello.txt", DirectoryEntryType::RegularFile)
            .map(|entry| entry.with_entry_size(SAMPLE_BLOCK_SIZE as u16 - 40)),
    ];
    let mut block = Vec::with_capacity(SAMPLE_BLOCK_SIZE as usize);
    for entry in entries {
        let bytes = entry
            .and_then(|entry| entry.to_bytes())
            .expect("encode sample directory entry");
        block.extend_from_slice(&bytes);
    }
    assert_eq!(block.len(), SAMPLE_BLOCK_SIZE as usize);
    block
}

fn put_block(store: &mut Cursor<Vec<u8>>, block: u32, data: &[u8]) {
    let start = (block * SAMPLE_BLOCK_SIZE) as usize;
    store.get_mut()[start..start + data.len()].copy_from_slice(data);
}

/// the whole sample volume, positioned at 0
pub fn sample_image() -> Cursor<Vec<u8>> {
    let mut store = Cursor::new(vec![0u8; (SAMPLE_BLOCK_COUNT * SAMPLE_BLOCK_SIZE) as usize]);
    let superblock = sample_superblock();
    let descriptors = sample_descriptors();

    superblock
        .serialize_into(&mut store)
        .expect("write sample superblock");
    BlockGroupDescriptor::serialize_into(&mut store, SAMPLE_BLOCK_SIZE, &descriptors)
        .expect("write sample descriptor table");

    let inodes = InodeAccessor::new(&superblock, &descriptors);
    inodes
        .write(&mut store, &sample_root_inode(), ROOT_INODE)
        .expect("write sample root inode");
    inodes
        .write(&mut store, &sample_file_inode(), HELLO_INODE)
        .expect("write sample file inode");

    // blocks 1 to 15 and inodes 1 to 12 are in use
    put_block(&mut store, 3, &[0xff, 0x7f]);
    put_block(&mut store, 4, &[0xff, 0x0f]);

    put_block(&mut store, ROOT_DIRECTORY_BLOCK, &sample_root_directory_block());
    let mut pointers = Vec::new();
    for pointer in [14u32, 0, 15] {
        pointers.extend_from_slice(&pointer.to_le_bytes());
    }
    put_block(&mut store, HELLO_SINGLY_INDIRECT_BLOCK, &pointers);
    for block in [10, 11, 12, 14, 15] {
        put_block(&mut store, block, b"hello, world\n");
    }

    store.set_position(0);
    store
}
