//! what does an ext2 volume look like on disk
//!
//! Every volume has the following layout:
//! - boot sector and superblock, the superblock always at byte 1024
//! - block group descriptor table, in the block after the superblock
//! - block groups, each made of
//!   - block bitmap (one block)
//!   - inode bitmap (one block)
//!   - inode table
//!   - data blocks

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, Write},
    path::Path,
};

use log::{debug, info};
use serde::Serialize;

use crate::{
    error::{Ext2Error, Result},
    store_cursor::StoreCursor,
    utils::fs_size_calculator,
};

use super::{
    decode_entries, BlockGroupDescriptor, Bitmap, DescriptorTableAccessor, DirectoryEntry, Inode,
    InodeAccessor, Superblock, SuperblockAccessor, MAX_INDIRECTION, ROOT_INODE,
};

/// byte offsets and sizes of the regions of one block group
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupLayout {
    pub group: u32,
    pub block_bitmap_offset: u64,
    pub inode_bitmap_offset: u64,
    pub inode_table_offset: u64,
    pub inode_table_size: u64,
    pub data_offset: u64,
    pub data_size: u64,
}

impl GroupLayout {
    /// compute where the regions of `group` start
    ///
    /// The first group begins after the descriptor table,
    /// the others at their nominal position `group * blocks_per_group * block_size`.
    pub fn new(superblock: &Superblock, group: u32) -> Self {
        let block_size = superblock.block_size;
        let block_bitmap_offset = if group == 0 {
            fs_size_calculator::descriptor_table_offset(block_size) + block_size as u64
        } else {
            group as u64 * fs_size_calculator::block_group_size(block_size, superblock.blocks_per_group)
        };
        let inode_bitmap_offset = block_bitmap_offset + block_size as u64;
        let inode_table_offset = inode_bitmap_offset + block_size as u64;
        let inode_table_size = fs_size_calculator::inode_table_size(
            superblock.inodes_per_group,
            superblock.effective_inode_size() as u32,
        );

        Self {
            group,
            block_bitmap_offset,
            inode_bitmap_offset,
            inode_table_offset,
            inode_table_size,
            data_offset: inode_table_offset + inode_table_size,
            data_size: fs_size_calculator::data_table_size(
                block_size,
                superblock.blocks_per_group,
                superblock.inodes_per_group,
                superblock.effective_inode_size() as u32,
            ),
        }
    }
}

/// An open ext2 volume.
///
/// Owns the backing store and the cached superblock and descriptor table.
/// Every operation leaves the stream position of the store where it was.
#[derive(Debug)]
pub struct Ext2Fs<S> {
    store: S,
    superblock: SuperblockAccessor,
    descriptors: DescriptorTableAccessor,
}

impl Ext2Fs<File> {
    /// open the image file (or block device) at `image_path`
    /// # Params
    /// - `image_path`: the path of the image file, something like `Block Device`, like **/dev/sda1**
    /// - `writable`: whether to open it for writing too
    pub fn open_image<P>(image_path: P, writable: bool) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(image_path.as_ref())?;
        info!("opening image {}", image_path.as_ref().display());
        Self::open(file)
    }
}

impl<S> Ext2Fs<S>
where
    S: Read + Seek,
{
    /// read the superblock and the descriptor table of the volume in `store`
    pub fn open(mut store: S) -> Result<Self> {
        let superblock = SuperblockAccessor::open(&mut store)?;
        let descriptors = DescriptorTableAccessor::open(&mut store, superblock.block_size())?;
        info!(
            "opened ext2 volume: {} blocks of {} bytes, {} inodes, {} groups",
            superblock.block_count(),
            superblock.block_size(),
            superblock.inode_count(),
            superblock.group_count()
        );
        Ok(Self {
            store,
            superblock,
            descriptors,
        })
    }

    /// give the backing store back
    pub fn close(self) -> S {
        self.store
    }
}

/// get the geometry of this volume
impl<S> Ext2Fs<S> {
    #[inline]
    pub fn superblock(&self) -> &Superblock {
        self.superblock.superblock()
    }

    #[inline]
    pub fn descriptors(&self) -> &[BlockGroupDescriptor] {
        self.descriptors.descriptors()
    }

    #[inline]
    pub fn block_size(&self) -> u32 {
        self.superblock.block_size()
    }

    #[inline]
    pub fn fragment_size(&self) -> u32 {
        self.superblock.fragment_size()
    }

    #[inline]
    pub fn block_count(&self) -> u32 {
        self.superblock.block_count()
    }

    #[inline]
    pub fn inode_count(&self) -> u32 {
        self.superblock.inode_count()
    }

    #[inline]
    pub fn inode_size(&self) -> u16 {
        self.superblock.inode_size()
    }

    #[inline]
    pub fn blocks_per_group(&self) -> u32 {
        self.superblock.blocks_per_group()
    }

    #[inline]
    pub fn inodes_per_group(&self) -> u32 {
        self.superblock.inodes_per_group()
    }

    #[inline]
    pub fn group_count(&self) -> u32 {
        self.superblock.group_count()
    }

    /// the descriptor of an existing block group
    pub fn descriptor(&self, group: u32) -> Result<&BlockGroupDescriptor> {
        let group_count = self.group_count();
        if group >= group_count {
            return Err(Ext2Error::out_of_range("block group", group, group_count));
        }
        self.descriptors.descriptor(group)
    }

    /// region offsets of every block group
    pub fn layout(&self) -> Vec<GroupLayout> {
        (0..self.group_count())
            .map(|group| GroupLayout::new(self.superblock(), group))
            .collect()
    }
}

/// inode and data block operations
impl<S> Ext2Fs<S>
where
    S: Read + Seek,
{
    /// # Params
    /// - `index`: inode index, start at 1
    pub fn read_inode(&mut self, index: u32) -> Result<Inode> {
        InodeAccessor::new(self.superblock.superblock(), self.descriptors.descriptors())
            .read(&mut self.store, index)
    }

    pub fn read_root_inode(&mut self) -> Result<Inode> {
        InodeAccessor::new(self.superblock.superblock(), self.descriptors.descriptors())
            .read_root(&mut self.store)
    }

    /// read the whole block `block`
    pub fn read_block(&mut self, block: u32) -> Result<Vec<u8>> {
        let block_size = self.block_size();
        let offset = block as u64 * block_size as u64;
        let mut buf = vec![0u8; block_size as usize];
        let mut cursor = StoreCursor::at(&mut self.store, offset)?;
        cursor.read_exact(&mut buf)?;
        cursor.restore()?;
        debug!("read block {block} at offset {offset}");
        Ok(buf)
    }

    /// every data block of `inode`, in file order
    ///
    /// The direct pointers come first, then the blocks reached through the
    /// singly, doubly and triply indirect pointers. Empty pointers are skipped.
    /// A fast symbolic link owns no block.
    pub fn data_blocks(&mut self, inode: &Inode) -> Result<Vec<u32>> {
        if inode.is_fast_symlink() {
            debug!("fast symbolic link of {} bytes, no data blocks", inode.size);
            return Ok(Vec::new());
        }
        let mut blocks: Vec<u32> = inode
            .direct_blocks
            .iter()
            .copied()
            .filter(|block| *block != 0)
            .collect();
        for (block, depth) in inode.indirect_blocks() {
            self.expand_indirect(block, depth, &mut blocks)?;
        }
        Ok(blocks)
    }

    /// the addresses held by a pointer block, empty entries included
    fn read_pointer_block(&mut self, block: u32) -> Result<Vec<u32>> {
        let pointers_per_block = fs_size_calculator::pointers_per_block(self.block_size());
        let data = self.read_block(block)?;
        let mut pointers = Vec::with_capacity(pointers_per_block);
        for chunk in data.chunks_exact(std::mem::size_of::<u32>()) {
            pointers.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        Ok(pointers)
    }

    // depth 1 holds data block addresses, deeper levels hold pointer blocks
    fn expand_indirect(&mut self, block: u32, depth: u8, blocks: &mut Vec<u32>) -> Result<()> {
        if depth == 0 || depth > MAX_INDIRECTION {
            return Err(Ext2Error::out_of_range(
                "indirection depth",
                depth,
                MAX_INDIRECTION,
            ));
        }
        for pointer in self.read_pointer_block(block)? {
            if pointer == 0 {
                continue;
            }
            if depth == 1 {
                blocks.push(pointer);
            } else {
                self.expand_indirect(pointer, depth - 1, blocks)?;
            }
        }
        Ok(())
    }
}

/// directory operations
impl<S> Ext2Fs<S>
where
    S: Read + Seek,
{
    /// the live entries of directory `inode`, block after block
    pub fn read_directory(&mut self, inode: &Inode) -> Result<Vec<DirectoryEntry>> {
        if !inode.is_directory() {
            return Err(Ext2Error::invalid_argument(
                "inode",
                format!("{:?} is not a directory", inode.inode_type),
            ));
        }
        let mut entries = Vec::new();
        for block in self.data_blocks(inode)? {
            let data = self.read_block(block)?;
            entries.extend(decode_entries(&data));
        }
        Ok(entries)
    }

    /// the inode number of the live entry `name` of directory `inode`
    pub fn find_entry(&mut self, inode: &Inode, name: &str) -> Result<Option<u32>> {
        Ok(self
            .read_directory(inode)?
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.inode))
    }

    /// walk an absolute path from the root directory down to its inode number
    ///
    /// Empty components are ignored, so `/` and `//` both name the root.
    /// `.` and `..` are looked up like any other name.
    pub fn resolve_path(&mut self, path: &str) -> Result<u32> {
        let mut current = ROOT_INODE;
        for name in path.split('/').filter(|name| !name.is_empty()) {
            let directory = self.read_inode(current)?;
            if !directory.is_directory() {
                return Err(Ext2Error::invalid_argument(
                    "path",
                    format!(
                        "{path}: inode {current} is a {:?}, not a directory",
                        directory.inode_type
                    ),
                ));
            }
            current = self.find_entry(&directory, name)?.ok_or_else(|| {
                Ext2Error::invalid_argument("path", format!("{path}: no entry named {name}"))
            })?;
        }
        debug!("resolved {path} to inode {current}");
        Ok(current)
    }

    pub fn read_root_directory(&mut self) -> Result<Vec<DirectoryEntry>> {
        let root = self.read_root_inode()?;
        self.read_directory(&root)
    }

    /// names of the entries of the root directory
    pub fn list_root_directory(&mut self) -> Result<Vec<String>> {
        Ok(self
            .read_root_directory()?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }
}

/// bitmap operations
impl<S> Ext2Fs<S>
where
    S: Read + Seek,
{
    /// block usage bitmap of `group`, one bit per block of the group
    pub fn read_block_bitmap(&mut self, group: u32) -> Result<Bitmap> {
        let block = self.descriptor(group)?.block_bitmap_block;
        let capacity = self.blocks_per_group() as usize;
        Bitmap::new(self.read_block(block)?, capacity)
    }

    /// inode usage bitmap of `group`, one bit per inode of the group
    pub fn read_inode_bitmap(&mut self, group: u32) -> Result<Bitmap> {
        let block = self.descriptor(group)?.inode_bitmap_block;
        let capacity = self.inodes_per_group() as usize;
        Bitmap::new(self.read_block(block)?, capacity)
    }
}

/// write operations
impl<S> Ext2Fs<S>
where
    S: Read + Write + Seek,
{
    /// write the superblock and cache it
    pub fn write_superblock(&mut self, superblock: Superblock) -> Result<()> {
        self.superblock.write(&mut self.store, superblock)
    }

    /// write the whole descriptor table and cache it
    pub fn write_descriptors(&mut self, descriptors: Vec<BlockGroupDescriptor>) -> Result<()> {
        self.descriptors.write(&mut self.store, descriptors)
    }

    pub fn write_inode(&mut self, inode: &Inode, index: u32) -> Result<()> {
        InodeAccessor::new(self.superblock.superblock(), self.descriptors.descriptors())
            .write(&mut self.store, inode, index)
    }

    /// overwrite block `block`, `data` must be exactly one block long
    pub fn write_block(&mut self, block: u32, data: &[u8]) -> Result<()> {
        let block_size = self.block_size();
        if data.len() != block_size as usize {
            return Err(Ext2Error::invalid_argument(
                "block data",
                format!("expected {block_size} bytes, got {}", data.len()),
            ));
        }
        let offset = block as u64 * block_size as u64;
        let mut cursor = StoreCursor::at(&mut self.store, offset)?;
        cursor.write_all(data)?;
        cursor.flush()?;
        cursor.restore()?;
        debug!("wrote block {block} at offset {offset}");
        Ok(())
    }

    pub fn write_block_bitmap(&mut self, group: u32, bitmap: &Bitmap) -> Result<()> {
        let block = self.descriptor(group)?.block_bitmap_block;
        self.write_block(block, bitmap.as_bytes())
    }

    pub fn write_inode_bitmap(&mut self, group: u32, bitmap: &Bitmap) -> Result<()> {
        let block = self.descriptor(group)?.inode_bitmap_block;
        self.write_block(block, bitmap.as_bytes())
    }
}
