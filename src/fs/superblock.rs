use std::io::{Read, Seek, Write};
use std::time::Duration;

use bincode::{Decode, Encode};
use bitflags::bitflags;
use log::debug;
use serde::{Deserialize, Serialize, Serializer};

use crate::{
    error::{Ext2Error, Result},
    store_cursor::StoreCursor,
    utils::{fs_size_calculator, time_util::TimeDurationStruct},
};

use super::{
    decode_record, encode_record, EXT2_MAGIC, GOOD_OLD_INODE_SIZE, SMALL_BLOCK_SIZE,
    SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE,
};

/// largest size exponent whose size still fits into 32 bits: `1024 << 21 == 2 GiB`
const MAX_LOG_SIZE: u32 = 21;

/// whether the volume was unmounted cleanly
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum FileSystemState {
    Clean = 1,
    Errors = 2,
}

impl TryFrom<u16> for FileSystemState {
    type Error = Ext2Error;
    fn try_from(value: u16) -> Result<Self> {
        match value {
            1 => Ok(FileSystemState::Clean),
            2 => Ok(FileSystemState::Errors),
            other => Err(Ext2Error::invalid_field("file_system_state", other)),
        }
    }
}

/// what the driver should do when it finds an error
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorHandling {
    Continue = 1,
    RemountReadOnly = 2,
    Panic = 3,
}

impl TryFrom<u16> for ErrorHandling {
    type Error = Ext2Error;
    fn try_from(value: u16) -> Result<Self> {
        match value {
            1 => Ok(ErrorHandling::Continue),
            2 => Ok(ErrorHandling::RemountReadOnly),
            3 => Ok(ErrorHandling::Panic),
            other => Err(Ext2Error::invalid_field("error_handling", other)),
        }
    }
}

/// the operating system which created the volume
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum OperatingSystemId {
    Linux = 0,
    GnuHurd = 1,
    Masix = 2,
    FreeBsd = 3,
    Other = 4,
}

impl TryFrom<u32> for OperatingSystemId {
    type Error = Ext2Error;
    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(OperatingSystemId::Linux),
            1 => Ok(OperatingSystemId::GnuHurd),
            2 => Ok(OperatingSystemId::Masix),
            3 => Ok(OperatingSystemId::FreeBsd),
            4 => Ok(OperatingSystemId::Other),
            other => Err(Ext2Error::invalid_field("creator_os", other)),
        }
    }
}

bitflags! {
    /// features a driver may ignore
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompatibleFeatures: u32 {
        const DIRECTORY_PREALLOCATION = 0x0001;
        const IMAGIC_INODES = 0x0002;
        const HAS_JOURNAL = 0x0004;
        const EXTENDED_ATTRIBUTES = 0x0008;
        const RESIZE_INODE = 0x0010;
        const DIRECTORY_INDEX = 0x0020;
    }
}

bitflags! {
    /// features a driver must understand to use the volume at all
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IncompatibleFeatures: u32 {
        const COMPRESSION = 0x0001;
        /// directory entries carry a type byte
        const FILE_TYPE = 0x0002;
        const NEEDS_RECOVERY = 0x0004;
        const JOURNAL_DEVICE = 0x0008;
        const META_BLOCK_GROUPS = 0x0010;
    }
}

bitflags! {
    /// features a driver must understand to write to the volume
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ReadOnlyFeatures: u32 {
        const SPARSE_SUPERBLOCKS = 0x0001;
        const LARGE_FILES = 0x0002;
        const BINARY_TREE_DIRECTORIES = 0x0004;
    }
}

/// the superblock exactly as it is laid out on disk, starting at byte 1024
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub(crate) struct RawSuperblock {
    inode_count: u32,
    block_count: u32,
    reserved_block_count: u32,
    free_block_count: u32,
    free_inode_count: u32,
    first_data_block: u32,
    log_block_size: u32,
    log_fragment_size: u32,
    blocks_per_group: u32,
    fragments_per_group: u32,
    inodes_per_group: u32,
    last_mount_time: u32,
    last_write_time: u32,
    mounts_since_check: u16,
    max_mounts_before_check: u16,
    magic: u16,
    state: u16,
    error_handling: u16,
    minor_version: u16,
    last_check_time: u32,
    check_interval: u32,
    creator_os: u32,
    major_version: u32,
    reserved_uid: u16,
    reserved_gid: u16,
    first_non_reserved_inode: u32,
    inode_size: u16,
    block_group_number: u16,
    feature_compat: u32,
    feature_incompat: u32,
    feature_ro_compat: u32,
    filesystem_id: [u8; 16],
    volume_name: [u8; 16],
    last_mounted_path: [u8; 64],
    compression_algorithms: u32,
    prealloc_file_blocks: u8,
    prealloc_dir_blocks: u8,
    reserved_after_prealloc: [u8; 2],
    journal_id: [u8; 16],
    journal_inode: u32,
    journal_device: u32,
    reserved_tail: [u8; 788],
}

/// The superblock of this filesystem
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub inode_count: u32,
    pub block_count: u32,
    /// blocks only the superuser may allocate
    pub reserved_block_count: u32,
    pub free_block_count: u32,
    pub free_inode_count: u32,
    /// block holding the superblock, `1` for 1 KiB blocks and `0` otherwise
    pub first_data_block: u32,
    /// data block size in bytes
    pub block_size: u32,
    pub fragment_size: u32,
    pub blocks_per_group: u32,
    pub fragments_per_group: u32,
    pub inodes_per_group: u32,
    pub last_mount_time: TimeDurationStruct,
    pub last_write_time: TimeDurationStruct,
    pub mounts_since_check: u16,
    pub max_mounts_before_check: u16,
    pub state: FileSystemState,
    pub error_handling: ErrorHandling,
    pub minor_version: u16,
    pub last_check_time: TimeDurationStruct,
    pub check_interval: Duration,
    pub creator_os: OperatingSystemId,
    pub major_version: u32,
    pub reserved_uid: u16,
    pub reserved_gid: u16,
    pub first_non_reserved_inode: u32,
    /// size of an inode record as declared on disk, see [Superblock::effective_inode_size]
    pub inode_size: u16,
    /// block group holding this copy of the superblock
    pub block_group_number: u16,
    pub feature_compat: CompatibleFeatures,
    pub feature_incompat: IncompatibleFeatures,
    pub feature_ro_compat: ReadOnlyFeatures,
    pub filesystem_id: [u8; 16],
    #[serde(serialize_with = "serialize_label")]
    pub volume_name: [u8; 16],
    #[serde(serialize_with = "serialize_label")]
    pub last_mounted_path: [u8; 64],
    pub compression_algorithms: u32,
    pub prealloc_file_blocks: u8,
    pub prealloc_dir_blocks: u8,
    pub journal_id: [u8; 16],
    pub journal_inode: u32,
    pub journal_device: u32,
}

/// NUL padded labels are shown as text
fn serialize_label<S, const N: usize>(label: &[u8; N], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&label_to_string(label))
}

fn label_to_string(label: &[u8]) -> String {
    label
        .iter()
        .take_while(|b| **b != 0)
        .map(|b| *b as char)
        .collect()
}

/// `1024 << log`, refusing exponents whose size doesn't fit into 32 bits
fn size_from_log(field: &'static str, log: u32) -> Result<u32> {
    if log > MAX_LOG_SIZE {
        return Err(Ext2Error::invalid_field(field, log));
    }
    Ok(SMALL_BLOCK_SIZE << log)
}

/// `log2(size) - 10`, only powers of two from 1024 up can be stored
fn log_from_size(field: &'static str, size: u32) -> Result<u32> {
    if !size.is_power_of_two() || size < SMALL_BLOCK_SIZE {
        return Err(Ext2Error::invalid_field(field, size));
    }
    Ok(size.trailing_zeros() - SMALL_BLOCK_SIZE.trailing_zeros())
}

fn non_zero(field: &'static str, value: u32) -> Result<u32> {
    if value == 0 {
        return Err(Ext2Error::invalid_field(field, value));
    }
    Ok(value)
}

/// Convert [RawSuperblock] to [Superblock], validating the signature and every enumerated field
impl TryFrom<RawSuperblock> for Superblock {
    type Error = Ext2Error;

    fn try_from(raw: RawSuperblock) -> Result<Self> {
        if raw.magic != EXT2_MAGIC {
            return Err(Ext2Error::InvalidSignature {
                expected: EXT2_MAGIC,
                actual: raw.magic,
            });
        }
        let state = FileSystemState::try_from(raw.state)?;
        let error_handling = ErrorHandling::try_from(raw.error_handling)?;
        let creator_os = OperatingSystemId::try_from(raw.creator_os)?;

        Ok(Superblock {
            inode_count: raw.inode_count,
            block_count: raw.block_count,
            reserved_block_count: raw.reserved_block_count,
            free_block_count: raw.free_block_count,
            free_inode_count: raw.free_inode_count,
            first_data_block: raw.first_data_block,
            block_size: size_from_log("block_size", raw.log_block_size)?,
            fragment_size: size_from_log("fragment_size", raw.log_fragment_size)?,
            blocks_per_group: non_zero("blocks_per_group", raw.blocks_per_group)?,
            fragments_per_group: raw.fragments_per_group,
            inodes_per_group: non_zero("inodes_per_group", raw.inodes_per_group)?,
            last_mount_time: TimeDurationStruct::from_unix_seconds(raw.last_mount_time),
            last_write_time: TimeDurationStruct::from_unix_seconds(raw.last_write_time),
            mounts_since_check: raw.mounts_since_check,
            max_mounts_before_check: raw.max_mounts_before_check,
            state,
            error_handling,
            minor_version: raw.minor_version,
            last_check_time: TimeDurationStruct::from_unix_seconds(raw.last_check_time),
            check_interval: Duration::from_secs(raw.check_interval as u64),
            creator_os,
            major_version: raw.major_version,
            reserved_uid: raw.reserved_uid,
            reserved_gid: raw.reserved_gid,
            first_non_reserved_inode: raw.first_non_reserved_inode,
            inode_size: raw.inode_size,
            block_group_number: raw.block_group_number,
            feature_compat: CompatibleFeatures::from_bits_retain(raw.feature_compat),
            feature_incompat: IncompatibleFeatures::from_bits_retain(raw.feature_incompat),
            feature_ro_compat: ReadOnlyFeatures::from_bits_retain(raw.feature_ro_compat),
            filesystem_id: raw.filesystem_id,
            volume_name: raw.volume_name,
            last_mounted_path: raw.last_mounted_path,
            compression_algorithms: raw.compression_algorithms,
            prealloc_file_blocks: raw.prealloc_file_blocks,
            prealloc_dir_blocks: raw.prealloc_dir_blocks,
            journal_id: raw.journal_id,
            journal_inode: raw.journal_inode,
            journal_device: raw.journal_device,
        })
    }
}

/// Convert [Superblock] back to its on-disk form, reserved zones are zero filled
impl TryFrom<&Superblock> for RawSuperblock {
    type Error = Ext2Error;

    fn try_from(sb: &Superblock) -> Result<Self> {
        let check_interval = u32::try_from(sb.check_interval.as_secs())
            .map_err(|_| Ext2Error::invalid_field("check_interval", sb.check_interval.as_secs()))?;

        Ok(RawSuperblock {
            inode_count: sb.inode_count,
            block_count: sb.block_count,
            reserved_block_count: sb.reserved_block_count,
            free_block_count: sb.free_block_count,
            free_inode_count: sb.free_inode_count,
            first_data_block: sb.first_data_block,
            log_block_size: log_from_size("block_size", sb.block_size)?,
            log_fragment_size: log_from_size("fragment_size", sb.fragment_size)?,
            blocks_per_group: sb.blocks_per_group,
            fragments_per_group: sb.fragments_per_group,
            inodes_per_group: sb.inodes_per_group,
            last_mount_time: sb.last_mount_time.to_unix_seconds("last_mount_time")?,
            last_write_time: sb.last_write_time.to_unix_seconds("last_write_time")?,
            mounts_since_check: sb.mounts_since_check,
            max_mounts_before_check: sb.max_mounts_before_check,
            magic: EXT2_MAGIC,
            state: sb.state as u16,
            error_handling: sb.error_handling as u16,
            minor_version: sb.minor_version,
            last_check_time: sb.last_check_time.to_unix_seconds("last_check_time")?,
            check_interval,
            creator_os: sb.creator_os as u32,
            major_version: sb.major_version,
            reserved_uid: sb.reserved_uid,
            reserved_gid: sb.reserved_gid,
            first_non_reserved_inode: sb.first_non_reserved_inode,
            inode_size: sb.inode_size,
            block_group_number: sb.block_group_number,
            feature_compat: sb.feature_compat.bits(),
            feature_incompat: sb.feature_incompat.bits(),
            feature_ro_compat: sb.feature_ro_compat.bits(),
            filesystem_id: sb.filesystem_id,
            volume_name: sb.volume_name,
            last_mounted_path: sb.last_mounted_path,
            compression_algorithms: sb.compression_algorithms,
            prealloc_file_blocks: sb.prealloc_file_blocks,
            prealloc_dir_blocks: sb.prealloc_dir_blocks,
            reserved_after_prealloc: [0u8; 2],
            journal_id: sb.journal_id,
            journal_inode: sb.journal_inode,
            journal_device: sb.journal_device,
            reserved_tail: [0u8; 788],
        })
    }
}

/// for serialize and deserialize
impl Superblock {
    /// decode a superblock from its on-disk bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode_record::<RawSuperblock>(bytes)?.try_into()
    }

    /// encode this superblock into its on-disk bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_record(&RawSuperblock::try_from(self)?)
    }

    /// read the superblock at byte 1024, the stream position is left untouched
    pub fn deserialize_from<R>(r: &mut R) -> Result<Self>
    where
        R: Read + Seek,
    {
        let mut buf = vec![0u8; SUPERBLOCK_SIZE];
        let mut cursor = StoreCursor::at(r, SUPERBLOCK_OFFSET)?;
        cursor.read_exact(&mut buf)?;
        cursor.restore()?;
        debug!("read superblock at offset {SUPERBLOCK_OFFSET}");
        Self::decode(&buf)
    }

    /// write the superblock at byte 1024, the stream position is left untouched
    pub fn serialize_into<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write + Seek,
    {
        let bytes = self.encode()?;
        let mut cursor = StoreCursor::at(w, SUPERBLOCK_OFFSET)?;
        cursor.write_all(&bytes)?;
        cursor.flush()?;
        cursor.restore()?;
        debug!("wrote superblock at offset {SUPERBLOCK_OFFSET}");
        Ok(())
    }
}

/// geometry derived from the superblock
impl Superblock {
    /// inode record stride, revision 0 volumes use a fixed 128 bytes
    pub fn effective_inode_size(&self) -> u16 {
        if self.major_version == 0 {
            GOOD_OLD_INODE_SIZE
        } else {
            self.inode_size
        }
    }

    /// number of block groups, the last one may be partial
    pub fn group_count(&self) -> u32 {
        fs_size_calculator::group_count(self.block_count, self.blocks_per_group)
    }

    pub fn volume_label(&self) -> String {
        label_to_string(&self.volume_name)
    }

    pub fn last_mounted(&self) -> String {
        label_to_string(&self.last_mounted_path)
    }
}

/// Keeps the superblock of an open volume.
///
/// The cached copy is read once by [SuperblockAccessor::open]
/// and only replaced by [SuperblockAccessor::write].
#[derive(Debug, Clone)]
pub struct SuperblockAccessor {
    superblock: Superblock,
}

impl SuperblockAccessor {
    pub fn open<R>(store: &mut R) -> Result<Self>
    where
        R: Read + Seek,
    {
        Ok(Self {
            superblock: Superblock::deserialize_from(store)?,
        })
    }

    /// read the superblock from disk again, the cached copy is not touched
    pub fn read<R>(&self, store: &mut R) -> Result<Superblock>
    where
        R: Read + Seek,
    {
        Superblock::deserialize_from(store)
    }

    /// write `superblock` to disk and cache it
    pub fn write<W>(&mut self, store: &mut W, superblock: Superblock) -> Result<()>
    where
        W: Write + Seek,
    {
        superblock.serialize_into(store)?;
        self.superblock = superblock;
        Ok(())
    }

    #[inline]
    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    #[inline]
    pub fn block_size(&self) -> u32 {
        self.superblock.block_size
    }

    #[inline]
    pub fn fragment_size(&self) -> u32 {
        self.superblock.fragment_size
    }

    #[inline]
    pub fn inode_count(&self) -> u32 {
        self.superblock.inode_count
    }

    #[inline]
    pub fn inode_size(&self) -> u16 {
        self.superblock.effective_inode_size()
    }

    #[inline]
    pub fn block_count(&self) -> u32 {
        self.superblock.block_count
    }

    #[inline]
    pub fn blocks_per_group(&self) -> u32 {
        self.superblock.blocks_per_group
    }

    #[inline]
    pub fn inodes_per_group(&self) -> u32 {
        self.superblock.inodes_per_group
    }

    #[inline]
    pub fn group_count(&self) -> u32 {
        self.superblock.group_count()
    }
}
