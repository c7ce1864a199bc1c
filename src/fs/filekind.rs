use serde::{Deserialize, Serialize};

use crate::error::{Ext2Error, Result};

/// mask selecting the type nibble of an inode's mode field
pub const INODE_TYPE_MASK: u16 = 0xf000;

/// an enum to describe the type of an inode,
/// stored in the high nibble of the mode field
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum InodeType {
    /// a named pipe
    Fifo = 0x1000,
    CharacterDevice = 0x2000,
    /// a directory
    Directory = 0x4000,
    BlockDevice = 0x6000,
    /// an regular file
    File = 0x8000,
    /// a symbolic link
    SymbolicLink = 0xa000,
    UnixSocket = 0xc000,
}

impl TryFrom<u16> for InodeType {
    type Error = Ext2Error;

    /// `mode` is the whole mode field, permission bits are ignored
    fn try_from(mode: u16) -> Result<Self> {
        match mode & INODE_TYPE_MASK {
            0x1000 => Ok(InodeType::Fifo),
            0x2000 => Ok(InodeType::CharacterDevice),
            0x4000 => Ok(InodeType::Directory),
            0x6000 => Ok(InodeType::BlockDevice),
            0x8000 => Ok(InodeType::File),
            0xa000 => Ok(InodeType::SymbolicLink),
            0xc000 => Ok(InodeType::UnixSocket),
            other => Err(Ext2Error::invalid_field("inode_type", other)),
        }
    }
}

impl From<InodeType> for u16 {
    fn from(kind: InodeType) -> Self {
        kind as u16
    }
}

/// the type byte of a directory entry
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DirectoryEntryType {
    /// Unknown
    #[default]
    Unknown = 0,
    RegularFile = 1,
    Directory = 2,
    CharacterDevice = 3,
    BlockDevice = 4,
    Fifo = 5,
    Socket = 6,
    SymbolicLink = 7,
}

impl DirectoryEntryType {
    /// decode the type byte, `None` for values the format doesn't define
    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(DirectoryEntryType::Unknown),
            1 => Some(DirectoryEntryType::RegularFile),
            2 => Some(DirectoryEntryType::Directory),
            3 => Some(DirectoryEntryType::CharacterDevice),
            4 => Some(DirectoryEntryType::BlockDevice),
            5 => Some(DirectoryEntryType::Fifo),
            6 => Some(DirectoryEntryType::Socket),
            7 => Some(DirectoryEntryType::SymbolicLink),
            _ => None,
        }
    }
}

/// the entry type a directory would record for an inode of this type
impl From<InodeType> for DirectoryEntryType {
    fn from(kind: InodeType) -> Self {
        match kind {
            InodeType::Fifo => DirectoryEntryType::Fifo,
            InodeType::CharacterDevice => DirectoryEntryType::CharacterDevice,
            InodeType::Directory => DirectoryEntryType::Directory,
            InodeType::BlockDevice => DirectoryEntryType::BlockDevice,
            InodeType::File => DirectoryEntryType::RegularFile,
            InodeType::SymbolicLink => DirectoryEntryType::SymbolicLink,
            InodeType::UnixSocket => DirectoryEntryType::Socket,
        }
    }
}
