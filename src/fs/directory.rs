use std::iter::FusedIterator;

use bincode::{Decode, Encode};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Ext2Error, Result};

use super::{decode_record, encode_record, filekind::DirectoryEntryType, DIRECTORY_ENTRY_HEADER_SIZE};

/// the fixed part of a directory entry on disk, the name follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
struct RawDirectoryEntryHeader {
    inode: u32,
    entry_size: u16,
    name_length: u8,
    entry_type: u8,
}

/// A live entry of a directory block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// inode the entry points to, never `0` for a decoded entry
    pub inode: u32,
    /// distance to the next entry, header, name and padding included
    pub entry_size: u16,
    pub name_length: u8,
    pub entry_type: DirectoryEntryType,
    /// one char per name byte
    pub name: String,
}

impl DirectoryEntry {
    /// an entry whose size is just enough for its name, rounded up to 4 bytes
    /// # Params
    /// - `name`: must only hold chars up to `U+00FF` and at most 255 of them
    pub fn new(inode: u32, name: &str, entry_type: DirectoryEntryType) -> Result<Self> {
        let name_bytes = latin1_bytes(name)?;
        let name_length = u8::try_from(name_bytes.len()).map_err(|_| {
            Ext2Error::invalid_argument(
                "directory entry name",
                format!("{} bytes is longer than 255", name_bytes.len()),
            )
        })?;
        let entry_size = (DIRECTORY_ENTRY_HEADER_SIZE + name_bytes.len() + 3) & !3;
        Ok(Self {
            inode,
            entry_size: entry_size as u16,
            name_length,
            entry_type,
            name: name.to_string(),
        })
    }

    /// stretch the entry over `entry_size` bytes, like the last entry of a block
    pub fn with_entry_size(mut self, entry_size: u16) -> Self {
        self.entry_size = entry_size;
        self
    }

    /// encode into `entry_size` bytes: header, name then zero padding
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let name_bytes = latin1_bytes(&self.name)?;
        if name_bytes.len() != self.name_length as usize {
            return Err(Ext2Error::invalid_argument(
                "directory entry name",
                format!(
                    "name is {} bytes but name length says {}",
                    name_bytes.len(),
                    self.name_length
                ),
            ));
        }
        let entry_size = self.entry_size as usize;
        if entry_size < DIRECTORY_ENTRY_HEADER_SIZE + name_bytes.len() {
            return Err(Ext2Error::invalid_argument(
                "directory entry size",
                format!("{entry_size} bytes can't hold a {} byte name", name_bytes.len()),
            ));
        }

        let mut bytes = encode_record(&RawDirectoryEntryHeader {
            inode: self.inode,
            entry_size: self.entry_size,
            name_length: self.name_length,
            entry_type: self.entry_type as u8,
        })?;
        bytes.extend_from_slice(&name_bytes);
        bytes.resize(entry_size, 0);
        Ok(bytes)
    }
}

fn latin1_bytes(name: &str) -> Result<Vec<u8>> {
    name.chars()
        .map(|c| {
            u8::try_from(c).map_err(|_| {
                Ext2Error::invalid_argument(
                    "directory entry name",
                    format!("{c:?} is not a Latin-1 char"),
                )
            })
        })
        .collect()
}

/// Lazily walks the entries of one directory block.
///
/// Deleted entries (inode `0`) are skipped.
/// The walk stops at the first entry whose size doesn't make sense,
/// everything after it is ignored.
#[derive(Debug, Clone)]
pub struct DirectoryEntries<'a> {
    block: &'a [u8],
    position: usize,
}

/// walk the entries of `block`
pub fn decode_entries(block: &[u8]) -> DirectoryEntries<'_> {
    DirectoryEntries { block, position: 0 }
}

impl DirectoryEntries<'_> {
    fn stop(&mut self) {
        self.position = self.block.len();
    }
}

impl Iterator for DirectoryEntries<'_> {
    type Item = DirectoryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while self.position + DIRECTORY_ENTRY_HEADER_SIZE <= self.block.len() {
            let start = self.position;
            let header = match decode_record::<RawDirectoryEntryHeader>(&self.block[start..]) {
                Ok(header) => header,
                Err(err) => {
                    warn!("unreadable directory entry at byte {start}: {err}");
                    self.stop();
                    return None;
                }
            };

            let entry_size = header.entry_size as usize;
            let name_length = header.name_length as usize;
            if entry_size < DIRECTORY_ENTRY_HEADER_SIZE
                || start + entry_size > self.block.len()
                || DIRECTORY_ENTRY_HEADER_SIZE + name_length > entry_size
            {
                warn!(
                    "directory block truncated at byte {start}: entry size {entry_size}, name length {name_length}"
                );
                self.stop();
                return None;
            }
            self.position += entry_size;

            if header.inode == 0 {
                continue;
            }

            let name_start = start + DIRECTORY_ENTRY_HEADER_SIZE;
            let name = self.block[name_start..name_start + name_length]
                .iter()
                .map(|b| *b as char)
                .collect();
            let entry_type =
                DirectoryEntryType::from_raw(header.entry_type).unwrap_or_else(|| {
                    warn!(
                        "unknown type {} of directory entry for inode {}",
                        header.entry_type, header.inode
                    );
                    DirectoryEntryType::Unknown
                });

            return Some(DirectoryEntry {
                inode: header.inode,
                entry_size: header.entry_size,
                name_length: header.name_length,
                entry_type,
                name,
            });
        }
        None
    }
}

impl FusedIterator for DirectoryEntries<'_> {}
