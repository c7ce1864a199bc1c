use std::io::{Read, Seek, Write};

use bincode::{Decode, Encode};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Ext2Error, Result},
    store_cursor::StoreCursor,
    utils::fs_size_calculator,
};

use super::{decode_record, encode_record, DESCRIPTOR_SIZE};

/// a block group descriptor as it is laid out on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub(crate) struct RawBlockGroupDescriptor {
    block_bitmap_block: u32,
    inode_bitmap_block: u32,
    inode_table_block: u32,
    free_blocks: u16,
    free_inodes: u16,
    directories: u16,
    reserved: [u8; 14],
}

/// where the metadata of one block group lives and how full the group is
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockGroupDescriptor {
    /// block holding the block usage bitmap
    pub block_bitmap_block: u32,
    /// block holding the inode usage bitmap
    pub inode_bitmap_block: u32,
    /// first block of the inode table
    pub inode_table_block: u32,
    pub free_blocks: u16,
    pub free_inodes: u16,
    /// number of inodes of the group which are directories
    pub directories: u16,
}

impl From<RawBlockGroupDescriptor> for BlockGroupDescriptor {
    fn from(raw: RawBlockGroupDescriptor) -> Self {
        Self {
            block_bitmap_block: raw.block_bitmap_block,
            inode_bitmap_block: raw.inode_bitmap_block,
            inode_table_block: raw.inode_table_block,
            free_blocks: raw.free_blocks,
            free_inodes: raw.free_inodes,
            directories: raw.directories,
        }
    }
}

impl From<&BlockGroupDescriptor> for RawBlockGroupDescriptor {
    fn from(descriptor: &BlockGroupDescriptor) -> Self {
        Self {
            block_bitmap_block: descriptor.block_bitmap_block,
            inode_bitmap_block: descriptor.inode_bitmap_block,
            inode_table_block: descriptor.inode_table_block,
            free_blocks: descriptor.free_blocks,
            free_inodes: descriptor.free_inodes,
            directories: descriptor.directories,
            reserved: [0u8; 14],
        }
    }
}

/// for serialize and deserialize
impl BlockGroupDescriptor {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode_record::<RawBlockGroupDescriptor>(bytes).map(Into::into)
    }

    /// encode into the 32 byte on-disk record, padding is zero filled
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_record(&RawBlockGroupDescriptor::from(self))
    }

    /// read a whole descriptor table, which fills one block
    /// # Params
    /// - `block_size`: block size of the volume, fixes both the offset and the length of the table
    pub fn deserialize_from<R>(r: &mut R, block_size: u32) -> Result<Vec<Self>>
    where
        R: Read + Seek,
    {
        let offset = fs_size_calculator::descriptor_table_offset(block_size);
        let count = fs_size_calculator::descriptors_per_block(block_size);
        let mut buf = vec![0u8; count * DESCRIPTOR_SIZE];

        let mut cursor = StoreCursor::at(r, offset)?;
        cursor.read_exact(&mut buf)?;
        cursor.restore()?;
        debug!("read {count} block group descriptors at offset {offset}");

        buf.chunks_exact(DESCRIPTOR_SIZE).map(Self::decode).collect()
    }

    /// write a whole descriptor table
    ///
    /// the table must hold exactly `block_size / 32` descriptors
    pub fn serialize_into<W>(w: &mut W, block_size: u32, descriptors: &[Self]) -> Result<()>
    where
        W: Write + Seek,
    {
        let expected = fs_size_calculator::descriptors_per_block(block_size);
        if descriptors.len() != expected {
            return Err(Ext2Error::DescriptorCountMismatch {
                expected,
                actual: descriptors.len(),
            });
        }

        let mut buf = Vec::with_capacity(expected * DESCRIPTOR_SIZE);
        for descriptor in descriptors {
            buf.extend_from_slice(&descriptor.encode()?);
        }

        let offset = fs_size_calculator::descriptor_table_offset(block_size);
        let mut cursor = StoreCursor::at(w, offset)?;
        cursor.write_all(&buf)?;
        cursor.flush()?;
        cursor.restore()?;
        debug!("wrote {expected} block group descriptors at offset {offset}");
        Ok(())
    }
}

/// Keeps the block group descriptor table of an open volume.
///
/// Like the superblock, the table is read once and only replaced by [DescriptorTableAccessor::write].
#[derive(Debug, Clone)]
pub struct DescriptorTableAccessor {
    block_size: u32,
    descriptors: Vec<BlockGroupDescriptor>,
}

impl DescriptorTableAccessor {
    pub fn open<R>(store: &mut R, block_size: u32) -> Result<Self>
    where
        R: Read + Seek,
    {
        Ok(Self {
            block_size,
            descriptors: BlockGroupDescriptor::deserialize_from(store, block_size)?,
        })
    }

    /// read the table from disk again, the cached copy is not touched
    pub fn read<R>(&self, store: &mut R) -> Result<Vec<BlockGroupDescriptor>>
    where
        R: Read + Seek,
    {
        BlockGroupDescriptor::deserialize_from(store, self.block_size)
    }

    /// write `descriptors` to disk and cache them
    pub fn write<W>(&mut self, store: &mut W, descriptors: Vec<BlockGroupDescriptor>) -> Result<()>
    where
        W: Write + Seek,
    {
        BlockGroupDescriptor::serialize_into(store, self.block_size, &descriptors)?;
        self.descriptors = descriptors;
        Ok(())
    }

    #[inline]
    pub fn descriptors(&self) -> &[BlockGroupDescriptor] {
        &self.descriptors
    }

    /// the descriptor of block group `group`
    pub fn descriptor(&self, group: u32) -> Result<&BlockGroupDescriptor> {
        self.descriptors
            .get(group as usize)
            .ok_or_else(|| Ext2Error::out_of_range("block group", group, self.descriptors.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::Superblock;
    use crate::utils::init_test_environment::{sample_descriptors, sample_superblock};
    use std::io::Cursor;

    fn blank_store() -> anyhow::Result<Cursor<Vec<u8>>> {
        let mut store = Cursor::new(vec![0u8; 4 * 4096]);
        sample_superblock().serialize_into(&mut store)?;
        Ok(store)
    }

    #[test]
    fn test_descriptor_layout() -> anyhow::Result<()> {
        let descriptor = BlockGroupDescriptor {
            block_bitmap_block: 3,
            inode_bitmap_block: 4,
            inode_table_block: 5,
            free_blocks: 100,
            free_inodes: 20,
            directories: 2,
        };
        let bytes = descriptor.encode()?;
        assert_eq!(bytes.len(), DESCRIPTOR_SIZE);
        assert_eq!(&bytes[..4], &3u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &5u32.to_le_bytes());
        assert_eq!(&bytes[16..18], &2u16.to_le_bytes());
        assert!(bytes[18..].iter().all(|b| *b == 0));
        assert_eq!(BlockGroupDescriptor::decode(&bytes)?, descriptor);
        Ok(())
    }

    #[test]
    fn test_table_round_trip() -> anyhow::Result<()> {
        let mut store = blank_store()?;
        store.set_position(11);
        let mut accessor = DescriptorTableAccessor {
            block_size: 1024,
            descriptors: Vec::new(),
        };
        accessor.write(&mut store, sample_descriptors())?;
        assert_eq!(store.position(), 11);

        let reopened = DescriptorTableAccessor::open(&mut store, 1024)?;
        assert_eq!(store.position(), 11);
        assert_eq!(reopened.descriptors(), sample_descriptors().as_slice());
        assert_eq!(reopened.descriptors().len(), 32);
        // the table of a 1 KiB block volume lives in block 2
        assert_eq!(&store.get_ref()[2048..2052], &3u32.to_le_bytes());
        Ok(())
    }

    #[test]
    fn test_larger_blocks_move_the_table() -> anyhow::Result<()> {
        let mut store = Cursor::new(vec![0u8; 4 * 4096]);
        let mut superblock: Superblock = sample_superblock();
        superblock.block_size = 4096;
        superblock.serialize_into(&mut store)?;

        let mut descriptors = vec![BlockGroupDescriptor::default(); 128];
        descriptors[0].inode_table_block = 7;
        BlockGroupDescriptor::serialize_into(&mut store, 4096, &descriptors)?;
        assert_eq!(&store.get_ref()[4096 + 8..4096 + 12], &7u32.to_le_bytes());

        let accessor = DescriptorTableAccessor::open(&mut store, 4096)?;
        assert_eq!(accessor.descriptor(0)?.inode_table_block, 7);
        Ok(())
    }

    #[test]
    fn test_length_mismatch() -> anyhow::Result<()> {
        let mut store = blank_store()?;
        let mut accessor = DescriptorTableAccessor::open(&mut store, 1024)?;
        let err = accessor
            .write(&mut store, vec![BlockGroupDescriptor::default(); 31])
            .unwrap_err();
        assert!(err.is_malformed());
        assert!(matches!(
            err,
            Ext2Error::DescriptorCountMismatch {
                expected: 32,
                actual: 31
            }
        ));
        Ok(())
    }

    #[test]
    fn test_group_out_of_range() -> anyhow::Result<()> {
        let mut store = blank_store()?;
        let accessor = DescriptorTableAccessor::open(&mut store, 1024)?;
        assert!(accessor.descriptor(31).is_ok());
        assert!(accessor.descriptor(32).unwrap_err().is_invalid_argument());
        Ok(())
    }
}
