//! show how much of a group bitmap is in use
use std::{
    fmt::Write as _,
    io::{Read, Seek},
    path::Path,
};

use anyhow::Context;

use crate::{cli_interface::open_volume, Bitmap, Ext2Fs};

/// the two bitmaps of a block group
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapKind {
    /// one bit per block
    Block,
    /// one bit per inode
    Inode,
}

/// print the usage of a group bitmap of the image at `image_file_path`
/// # Params
/// - `group`: the block group, start at 0
/// - `kind`: which of the two bitmaps of the group
pub fn bitmap_usage<P>(image_file_path: P, group: u32, kind: BitmapKind) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let mut fs = open_volume(image_file_path)?;
    print!("{}", bitmap_report(&mut fs, group, kind)?);
    Ok(())
}

/// render used and unused counts, then the ranges of set bits
///
/// `used` and `unused` count every bit of the bitmap block, the padding past
/// the capacity included. `set within capacity` counts only tracked objects.
pub fn bitmap_report<S>(fs: &mut Ext2Fs<S>, group: u32, kind: BitmapKind) -> anyhow::Result<String>
where
    S: Read + Seek,
{
    let bitmap = match kind {
        BitmapKind::Block => fs.read_block_bitmap(group),
        BitmapKind::Inode => fs.read_inode_bitmap(group),
    }
    .with_context(|| format!("failed to read the {kind:?} bitmap of group {group}"))?;

    let mut report = String::new();
    writeln!(report, "{kind:?} bitmap of group {group}")?;
    writeln!(report, "capacity: {}", bitmap.capacity())?;
    writeln!(report, "used: {}", bitmap.used_bits())?;
    writeln!(report, "unused: {}", bitmap.unused_bits())?;
    let set_within_capacity = bitmap.set_bits().count();
    writeln!(report, "set within capacity: {set_within_capacity}")?;
    if set_within_capacity != bitmap.used_bits() {
        writeln!(
            report,
            "note: {} padding bits past the capacity are set and counted as used",
            bitmap.used_bits() - set_within_capacity
        )?;
    }
    let ranges: Vec<String> = used_ranges(&bitmap)
        .into_iter()
        .map(|(first, last)| {
            if first == last {
                first.to_string()
            } else {
                format!("{first}-{last}")
            }
        })
        .collect();
    writeln!(report, "in use: {}", ranges.join(", "))?;
    Ok(report)
}

/// runs of consecutive set bits, as inclusive `(first, last)` pairs
pub fn used_ranges(bitmap: &Bitmap) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for index in bitmap.set_bits() {
        match ranges.last_mut() {
            Some((_, last)) if *last + 1 == index => *last = index,
            _ => ranges.push((index, index)),
        }
    }
    ranges
}
