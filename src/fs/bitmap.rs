use bitvec::prelude::*;

use crate::error::{Ext2Error, Result};

/// A usage bitmap, one bit per block or inode of a group.
///
/// Backed by the raw bytes of a bitmap block, bit 0 is the least significant bit of byte 0.
/// Only the first `capacity` bits are addressable, the rest of the buffer is carried along untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: BitVec<u8, Lsb0>,
    capacity: usize,
}

impl Bitmap {
    /// # Params
    /// - `bytes`: the backing buffer
    /// - `capacity`: number of addressable bits, at most `bytes.len() * 8`
    pub fn new(bytes: Vec<u8>, capacity: usize) -> Result<Self> {
        let available = bytes.len() * 8;
        if capacity > available {
            return Err(Ext2Error::invalid_argument(
                "bitmap capacity",
                format!("{capacity} bits don't fit into a {available} bit buffer"),
            ));
        }
        Ok(Self {
            bits: BitVec::from_vec(bytes),
            capacity,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.capacity {
            return Err(Ext2Error::out_of_range(
                "bitmap index",
                index as u64,
                self.capacity as u64,
            ));
        }
        Ok(())
    }

    /// whether bit `index` is set
    pub fn test(&self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        Ok(self.bits[index])
    }

    pub fn set(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.bits.set(index, true);
        Ok(())
    }

    pub fn reset(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.bits.set(index, false);
        Ok(())
    }

    pub fn toggle(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let bit = self.bits[index];
        self.bits.set(index, !bit);
        Ok(())
    }

    /// number of set bits in the whole buffer
    ///
    /// bits past `capacity` are expected to be zero, they are counted all the same
    pub fn used_bits(&self) -> usize {
        self.bits.count_ones()
    }

    /// `capacity - used_bits()`
    pub fn unused_bits(&self) -> usize {
        self.capacity.saturating_sub(self.used_bits())
    }

    /// indices of the set bits, ascending
    pub fn set_bits(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits[..self.capacity].iter_ones()
    }

    /// indices of the clear bits, ascending
    pub fn unset_bits(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits[..self.capacity].iter_zeros()
    }

    /// the backing buffer
    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bits.into_vec()
    }
}
