//! list a directory of a volume
use std::{
    fmt::Write as _,
    io::{Read, Seek},
    path::Path,
};

use anyhow::Context;

use crate::{cli_interface::open_volume, Ext2Fs};

/// print the entries of a directory of the image at `image_file_path`
/// # Params
/// - `inode`: the directory to list
/// - `path`: an absolute path inside the volume, takes the place of `inode` when given
pub fn ls<P>(image_file_path: P, inode: u32, path: Option<&str>) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let mut fs = open_volume(image_file_path)?;
    let inode = listing_target(&mut fs, inode, path)?;
    print!("{}", directory_listing(&mut fs, inode)?);
    Ok(())
}

/// the inode `path` leads to, or `inode` without a path
pub fn listing_target<S>(fs: &mut Ext2Fs<S>, inode: u32, path: Option<&str>) -> anyhow::Result<u32>
where
    S: Read + Seek,
{
    match path {
        Some(path) => fs
            .resolve_path(path)
            .with_context(|| format!("failed to resolve {path}")),
        None => Ok(inode),
    }
}

/// one line per live entry: inode, entry type and name
pub fn directory_listing<S>(fs: &mut Ext2Fs<S>, inode: u32) -> anyhow::Result<String>
where
    S: Read + Seek,
{
    let directory = fs
        .read_inode(inode)
        .with_context(|| format!("failed to read inode {inode}"))?;
    let entries = fs
        .read_directory(&directory)
        .with_context(|| format!("failed to list inode {inode}"))?;

    let mut listing = String::new();
    for entry in entries {
        writeln!(
            listing,
            "{:>8}  {:<16}  {}",
            entry.inode,
            format!("{:?}", entry.entry_type),
            entry.name
        )?;
    }
    Ok(listing)
}
