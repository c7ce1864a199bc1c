//! the ext2 on-disk structures and the accessors reading and writing them
pub mod bitmap;
pub mod block_group;
pub mod directory;
pub mod filekind;
pub mod fs_layout;
pub mod inode;
pub mod superblock;

pub use bitmap::*;
pub use block_group::*;
pub use directory::*;
pub use filekind::*;
pub use fs_layout::*;
pub use inode::*;
pub use superblock::*;

/// value of the superblock signature field
pub const EXT2_MAGIC: u16 = 0xef53;
/// the superblock always starts at byte 1024, whatever the block size
pub const SUPERBLOCK_OFFSET: u64 = 1024;
/// bytes of the superblock this crate reads and writes
pub const SUPERBLOCK_SIZE: usize = 1020;
/// smallest block size, also the unit the size exponents are relative to
pub const SMALL_BLOCK_SIZE: u32 = 1024;
/// stride of a block group descriptor
pub const DESCRIPTOR_SIZE: usize = 32;
/// bytes of an inode record this crate reads and writes
pub const INODE_RECORD_SIZE: usize = 128;
/// inode size of revision 0 volumes, which leave the superblock field empty
pub const GOOD_OLD_INODE_SIZE: u16 = 128;
/// index of the root directory inode
pub const ROOT_INODE: u32 = 2;
/// number of direct block pointers in an inode
pub const DIRECT_POINTERS: usize = 12;
/// the deepest indirect pointer of an inode is triply indirect
pub const MAX_INDIRECTION: u8 = 3;
/// inode address, entry size, name length and entry type
pub const DIRECTORY_ENTRY_HEADER_SIZE: usize = 8;

/// encoding used for every on-disk record: little endian, fixed width integers,
/// fixed size arrays without a length prefix
pub(crate) fn record_config() -> impl bincode::config::Config {
    bincode::config::legacy()
}

/// decode a raw record from the start of `bytes`
pub(crate) fn decode_record<T>(bytes: &[u8]) -> crate::Result<T>
where
    T: bincode::Decode<()>,
{
    let (record, _bytes_read) = bincode::decode_from_slice(bytes, record_config())?;
    Ok(record)
}

/// encode a raw record into its on-disk bytes
pub(crate) fn encode_record<T>(record: &T) -> crate::Result<Vec<u8>>
where
    T: bincode::Encode,
{
    Ok(bincode::encode_to_vec(record, record_config())?)
}
