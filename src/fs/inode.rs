use std::io::{Read, Seek, Write};

use bincode::{Decode, Encode};
use bitflags::bitflags;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Ext2Error, Result},
    store_cursor::StoreCursor,
    utils::time_util::{self, TimeDurationStruct},
};

use super::{
    decode_record, encode_record, filekind::InodeType, BlockGroupDescriptor, Superblock,
    DIRECT_POINTERS, INODE_RECORD_SIZE, ROOT_INODE,
};

/// mask selecting the permission bits of an inode's mode field
pub const INODE_PERMISSION_MASK: u16 = 0x0fff;

/// bytes of link target a symbolic link can keep in its block pointers
pub const FAST_SYMLINK_CAPACITY: usize = 60;

bitflags! {
    /// the low 12 bits of the mode field
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InodePermissions: u16 {
        const OTHER_EXECUTE = 0o0001;
        const OTHER_WRITE = 0o0002;
        const OTHER_READ = 0o0004;
        const GROUP_EXECUTE = 0o0010;
        const GROUP_WRITE = 0o0020;
        const GROUP_READ = 0o0040;
        const USER_EXECUTE = 0o0100;
        const USER_WRITE = 0o0200;
        const USER_READ = 0o0400;
        const STICKY = 0o1000;
        const SET_GID = 0o2000;
        const SET_UID = 0o4000;
    }
}

bitflags! {
    /// behaviour flags of an inode
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InodeFlags: u32 {
        const SECURE_DELETION = 0x0000_0001;
        const KEEP_COPY = 0x0000_0002;
        const COMPRESSION = 0x0000_0004;
        const SYNCHRONOUS_UPDATES = 0x0000_0008;
        const IMMUTABLE = 0x0000_0010;
        const APPEND_ONLY = 0x0000_0020;
        const NO_DUMP = 0x0000_0040;
        const NO_ACCESS_TIME = 0x0000_0080;
        const HASH_INDEXED_DIRECTORY = 0x0001_0000;
        const AFS_DIRECTORY = 0x0002_0000;
        const JOURNAL_FILE_DATA = 0x0004_0000;
    }
}

/// an inode record as it is laid out on disk
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub(crate) struct RawInode {
    mode: u16,
    uid: u16,
    size: u32,
    access_time: u32,
    creation_time: u32,
    modification_time: u32,
    deletion_time: u32,
    gid: u16,
    hard_links: u16,
    sector_count: u32,
    flags: u32,
    os_specific_1: [u8; 4],
    direct_blocks: [u32; DIRECT_POINTERS],
    singly_indirect_block: u32,
    doubly_indirect_block: u32,
    triply_indirect_block: u32,
    generation: u32,
    file_acl: u32,
    directory_acl: u32,
    fragment_address: u32,
    os_specific_2: [u8; 12],
}

/// An inode of the volume.
///
/// Timestamps and block pointers stored as `0` on disk are `None` here,
/// empty direct pointers are left out of [Inode::direct_blocks].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub inode_type: InodeType,
    pub permissions: InodePermissions,
    pub uid: u16,
    /// file size in bytes, lower 32 bits
    pub size: u32,
    pub accessed_at: Option<TimeDurationStruct>,
    pub created_at: TimeDurationStruct,
    pub modified_at: Option<TimeDurationStruct>,
    pub deleted_at: Option<TimeDurationStruct>,
    pub gid: u16,
    pub hard_links: u16,
    /// 512 byte sectors reserved for this inode
    pub sector_count: u32,
    pub flags: InodeFlags,
    /// at most 12 block addresses, in on-disk order
    pub direct_blocks: Vec<u32>,
    pub singly_indirect_block: Option<u32>,
    pub doubly_indirect_block: Option<u32>,
    pub triply_indirect_block: Option<u32>,
    pub generation: u32,
    pub file_acl: u32,
    pub directory_acl: u32,
    pub fragment_address: u32,
    /// the two OS dependent zones of the record, 4 bytes then 12 bytes
    pub os_specific: [u8; 16],
}

fn optional_block(block: u32) -> Option<u32> {
    (block != 0).then_some(block)
}

/// Convert [RawInode] to [Inode], rejecting undefined types and flags
impl TryFrom<RawInode> for Inode {
    type Error = Ext2Error;

    fn try_from(raw: RawInode) -> Result<Self> {
        let inode_type = InodeType::try_from(raw.mode)?;
        let permissions = InodePermissions::from_bits_truncate(raw.mode & INODE_PERMISSION_MASK);
        let flags = InodeFlags::from_bits(raw.flags)
            .ok_or_else(|| Ext2Error::invalid_field("inode_flags", raw.flags))?;

        let mut os_specific = [0u8; 16];
        os_specific[..4].copy_from_slice(&raw.os_specific_1);
        os_specific[4..].copy_from_slice(&raw.os_specific_2);

        Ok(Inode {
            inode_type,
            permissions,
            uid: raw.uid,
            size: raw.size,
            accessed_at: TimeDurationStruct::from_optional_unix_seconds(raw.access_time),
            created_at: TimeDurationStruct::from_unix_seconds(raw.creation_time),
            modified_at: TimeDurationStruct::from_optional_unix_seconds(raw.modification_time),
            deleted_at: TimeDurationStruct::from_optional_unix_seconds(raw.deletion_time),
            gid: raw.gid,
            hard_links: raw.hard_links,
            sector_count: raw.sector_count,
            flags,
            direct_blocks: raw
                .direct_blocks
                .iter()
                .copied()
                .filter(|block| *block != 0)
                .collect(),
            singly_indirect_block: optional_block(raw.singly_indirect_block),
            doubly_indirect_block: optional_block(raw.doubly_indirect_block),
            triply_indirect_block: optional_block(raw.triply_indirect_block),
            generation: raw.generation,
            file_acl: raw.file_acl,
            directory_acl: raw.directory_acl,
            fragment_address: raw.fragment_address,
            os_specific,
        })
    }
}

/// Convert [Inode] back to its on-disk form
impl TryFrom<&Inode> for RawInode {
    type Error = Ext2Error;

    fn try_from(inode: &Inode) -> Result<Self> {
        if inode.direct_blocks.len() > DIRECT_POINTERS {
            return Err(Ext2Error::invalid_argument(
                "direct blocks",
                format!(
                    "an inode holds at most {DIRECT_POINTERS} direct pointers, got {}",
                    inode.direct_blocks.len()
                ),
            ));
        }
        let mut direct_blocks = [0u32; DIRECT_POINTERS];
        direct_blocks[..inode.direct_blocks.len()].copy_from_slice(&inode.direct_blocks);

        let mut os_specific_1 = [0u8; 4];
        let mut os_specific_2 = [0u8; 12];
        os_specific_1.copy_from_slice(&inode.os_specific[..4]);
        os_specific_2.copy_from_slice(&inode.os_specific[4..]);

        Ok(RawInode {
            mode: u16::from(inode.inode_type) | inode.permissions.bits(),
            uid: inode.uid,
            size: inode.size,
            access_time: TimeDurationStruct::optional_to_unix_seconds(
                inode.accessed_at,
                "accessed_at",
            )?,
            creation_time: inode.created_at.to_unix_seconds("created_at")?,
            modification_time: TimeDurationStruct::optional_to_unix_seconds(
                inode.modified_at,
                "modified_at",
            )?,
            deletion_time: TimeDurationStruct::optional_to_unix_seconds(
                inode.deleted_at,
                "deleted_at",
            )?,
            gid: inode.gid,
            hard_links: inode.hard_links,
            sector_count: inode.sector_count,
            flags: inode.flags.bits(),
            os_specific_1,
            direct_blocks,
            singly_indirect_block: inode.singly_indirect_block.unwrap_or(0),
            doubly_indirect_block: inode.doubly_indirect_block.unwrap_or(0),
            triply_indirect_block: inode.triply_indirect_block.unwrap_or(0),
            generation: inode.generation,
            file_acl: inode.file_acl,
            directory_acl: inode.directory_acl,
            fragment_address: inode.fragment_address,
            os_specific_2,
        })
    }
}

impl Inode {
    /// a fresh inode with one hard link, created now
    pub fn new(inode_type: InodeType, permissions: InodePermissions) -> Self {
        let now = time_util::now().truncate_to_seconds();
        Inode {
            inode_type,
            permissions,
            uid: 0,
            size: 0,
            accessed_at: Some(now),
            created_at: now,
            modified_at: Some(now),
            deleted_at: None,
            gid: 0,
            hard_links: 1,
            sector_count: 0,
            flags: InodeFlags::empty(),
            direct_blocks: Vec::new(),
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

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode_record::<RawInode>(bytes)?.try_into()
    }

    /// encode into the 128 byte on-disk record
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_record(&RawInode::try_from(self)?)
    }

    /// the whole mode field, type and permissions
    pub fn mode(&self) -> u16 {
        u16::from(self.inode_type) | self.permissions.bits()
    }

    pub fn is_directory(&self) -> bool {
        self.inode_type == InodeType::Directory
    }

    pub fn is_regular_file(&self) -> bool {
        self.inode_type == InodeType::File
    }

    pub fn is_symlink(&self) -> bool {
        self.inode_type == InodeType::SymbolicLink
    }

    /// a symbolic link whose target text lives in the block pointers
    ///
    /// Such a link owns no data block, so its pointers are not addresses.
    pub fn is_fast_symlink(&self) -> bool {
        self.is_symlink() && (self.sector_count == 0 || (self.size as usize) < FAST_SYMLINK_CAPACITY)
    }

    /// the present indirect pointers, each with its depth
    pub fn indirect_blocks(&self) -> impl Iterator<Item = (u32, u8)> {
        [
            (self.singly_indirect_block, 1),
            (self.doubly_indirect_block, 2),
            (self.triply_indirect_block, 3),
        ]
        .into_iter()
        .filter_map(|(block, depth)| block.map(|block| (block, depth)))
    }
}

/// Reads and writes inode records.
///
/// Borrows the cached superblock and descriptor table of the volume,
/// so it is cheap to create one per call.
#[derive(Debug, Clone, Copy)]
pub struct InodeAccessor<'a> {
    superblock: &'a Superblock,
    descriptors: &'a [BlockGroupDescriptor],
}

impl<'a> InodeAccessor<'a> {
    pub fn new(superblock: &'a Superblock, descriptors: &'a [BlockGroupDescriptor]) -> Self {
        Self {
            superblock,
            descriptors,
        }
    }

    /// byte offset of the record of inode `index`
    /// # Params
    /// - `index`: inode index, start at 1
    pub fn offset(&self, index: u32) -> Result<u64> {
        let inode_count = self.superblock.inode_count;
        if index == 0 || index > inode_count {
            return Err(Ext2Error::out_of_range("inode index", index, inode_count));
        }
        let inodes_per_group = self.superblock.inodes_per_group;
        let group = (index - 1) / inodes_per_group;
        let local = (index - 1) % inodes_per_group;
        let descriptor = self.descriptors.get(group as usize).ok_or_else(|| {
            Ext2Error::out_of_range("block group", group, self.descriptors.len() as u64)
        })?;

        Ok(descriptor.inode_table_block as u64 * self.superblock.block_size as u64
            + local as u64 * self.superblock.effective_inode_size() as u64)
    }

    pub fn read<R>(&self, store: &mut R, index: u32) -> Result<Inode>
    where
        R: Read + Seek,
    {
        let offset = self.offset(index)?;
        let mut buf = [0u8; INODE_RECORD_SIZE];
        let mut cursor = StoreCursor::at(store, offset)?;
        cursor.read_exact(&mut buf)?;
        cursor.restore()?;
        debug!("read inode {index} at offset {offset}");
        Inode::decode(&buf)
    }

    pub fn write<W>(&self, store: &mut W, inode: &Inode, index: u32) -> Result<()>
    where
        W: Write + Seek,
    {
        let offset = self.offset(index)?;
        let bytes = inode.encode()?;
        let mut cursor = StoreCursor::at(store, offset)?;
        cursor.write_all(&bytes)?;
        cursor.flush()?;
        cursor.restore()?;
        debug!("wrote inode {index} at offset {offset}");
        Ok(())
    }

    /// the root directory, inode 2
    pub fn read_root<R>(&self, store: &mut R) -> Result<Inode>
    where
        R: Read + Seek,
    {
        self.read(store, ROOT_INODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::init_test_environment::{
        sample_descriptors, sample_fast_symlink, sample_file_inode, sample_image,
        sample_root_inode, sample_superblock, HELLO_INODE,
    };

    #[test]
    fn test_record_layout() -> anyhow::Result<()> {
        let mut inode = sample_file_inode();
        inode.direct_blocks = vec![100, 200, 300];
        inode.triply_indirect_block = Some(900);
        let bytes = inode.encode()?;

        assert_eq!(bytes.len(), INODE_RECORD_SIZE);
        assert_eq!(&bytes[..2], &0x81a4u16.to_le_bytes());
        assert_eq!(&bytes[40..44], &100u32.to_le_bytes());
        assert_eq!(&bytes[48..52], &300u32.to_le_bytes());
        // unused direct pointers are zero
        assert!(bytes[52..88].iter().all(|b| *b == 0));
        assert_eq!(&bytes[96..100], &900u32.to_le_bytes());
        Ok(())
    }

    #[test]
    fn test_inode_round_trip() -> anyhow::Result<()> {
        let mut inode = sample_file_inode();
        inode.flags = InodeFlags::IMMUTABLE | InodeFlags::JOURNAL_FILE_DATA;
        inode.deleted_at = Some(TimeDurationStruct::from_unix_seconds(1_700_000_500));
        inode.doubly_indirect_block = Some(77);
        inode.os_specific = *b"0123456789abcdef";

        assert_eq!(Inode::decode(&inode.encode()?)?, inode);
        Ok(())
    }

    #[test]
    fn test_fast_symlink() -> anyhow::Result<()> {
        let link = sample_fast_symlink("/usr/lib/x")?;
        // the target text decodes as pointers
        assert!(!link.direct_blocks.is_empty());
        assert!(link.is_fast_symlink());

        let mut slow = link.clone();
        slow.size = 200;
        slow.sector_count = 2;
        assert!(!slow.is_fast_symlink());

        let mut file = sample_file_inode();
        file.size = 10;
        file.sector_count = 0;
        assert!(!file.is_fast_symlink());
        Ok(())
    }

    #[test]
    fn test_zero_direct_pointers_are_dropped() -> anyhow::Result<()> {
        let mut bytes = sample_file_inode().encode()?;
        bytes[40..88].fill(0);
        bytes[40..44].copy_from_slice(&5u32.to_le_bytes());
        bytes[48..52].copy_from_slice(&6u32.to_le_bytes());
        bytes[88..92].fill(0);

        let inode = Inode::decode(&bytes)?;
        assert_eq!(inode.direct_blocks, vec![5, 6]);
        assert_eq!(inode.singly_indirect_block, None);
        Ok(())
    }

    #[test]
    fn test_undefined_type_and_flags() -> anyhow::Result<()> {
        let bytes = sample_file_inode().encode()?;

        let mut bad_type = bytes.clone();
        bad_type[..2].copy_from_slice(&0x31a4u16.to_le_bytes());
        let err = Inode::decode(&bad_type).unwrap_err();
        assert!(matches!(err, Ext2Error::InvalidField { field: "inode_type", .. }));

        let mut bad_flags = bytes;
        bad_flags[32..36].copy_from_slice(&0x0000_0100u32.to_le_bytes());
        let err = Inode::decode(&bad_flags).unwrap_err();
        assert!(matches!(err, Ext2Error::InvalidField { field: "inode_flags", .. }));
        Ok(())
    }

    #[test]
    fn test_too_many_direct_pointers() {
        let mut inode = sample_file_inode();
        inode.direct_blocks = (1..=13).collect();
        assert!(inode.encode().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_offset() -> anyhow::Result<()> {
        let superblock = sample_superblock();
        let descriptors = sample_descriptors();
        let accessor = InodeAccessor::new(&superblock, &descriptors);
        // the inode table of group 0 starts in block 5
        assert_eq!(accessor.offset(1)?, 5 * 1024);
        assert_eq!(accessor.offset(2)?, 5 * 1024 + 128);
        assert_eq!(accessor.offset(32)?, 5 * 1024 + 31 * 128);
        Ok(())
    }

    #[test]
    fn test_index_out_of_range() {
        let superblock = sample_superblock();
        let descriptors = sample_descriptors();
        let accessor = InodeAccessor::new(&superblock, &descriptors);
        assert!(accessor.offset(0).unwrap_err().is_invalid_argument());
        assert!(accessor.offset(33).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_group_beyond_descriptor_table() {
        let mut superblock = sample_superblock();
        superblock.inode_count = 64;
        let descriptors = sample_descriptors()[..1].to_vec();
        let accessor = InodeAccessor::new(&superblock, &descriptors);
        let err = accessor.offset(33).unwrap_err();
        assert!(matches!(
            err,
            Ext2Error::OutOfRange {
                argument: "block group",
                value: 1,
                limit: 1
            }
        ));
    }

    #[test]
    fn test_read_and_write_on_image() -> anyhow::Result<()> {
        let mut store = sample_image();
        let superblock = sample_superblock();
        let descriptors = sample_descriptors();
        let accessor = InodeAccessor::new(&superblock, &descriptors);

        store.set_position(99);
        assert_eq!(accessor.read_root(&mut store)?, sample_root_inode());
        assert_eq!(accessor.read(&mut store, HELLO_INODE)?, sample_file_inode());
        assert_eq!(store.position(), 99);

        let mut changed = sample_file_inode();
        changed.hard_links = 2;
        changed.uid = 1000;
        accessor.write(&mut store, &changed, HELLO_INODE)?;
        assert_eq!(store.position(), 99);
        assert_eq!(accessor.read(&mut store, HELLO_INODE)?, changed);
        // the neighbours are untouched
        assert_eq!(accessor.read_root(&mut store)?, sample_root_inode());
        Ok(())
    }

    #[test]
    fn test_new_inode() {
        let inode = Inode::new(InodeType::Directory, InodePermissions::from_bits_truncate(0o755));
        assert!(inode.is_directory());
        assert_eq!(inode.mode(), 0o40755);
        assert_eq!(inode.indirect_blocks().count(), 0);
        assert_eq!(inode.created_at.nsec, 0);
    }
}
