//! dump an inode of a volume as YAML
use std::{
    io::{Read, Seek},
    path::Path,
};

use anyhow::Context;
use serde::Serialize;

use crate::{cli_interface::open_volume, Ext2Fs, Inode};

/// what `stat` prints about an inode
#[derive(Serialize, Debug)]
pub struct InodeReport {
    pub index: u32,
    pub inode: Inode,
    /// every data block, in file order
    pub data_blocks: Vec<u32>,
}

/// print inode `inode` of the image at `image_file_path`
pub fn stat<P>(image_file_path: P, inode: u32) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let mut fs = open_volume(image_file_path)?;
    print!("{}", serde_yaml::to_string(&inode_report(&mut fs, inode)?)?);
    Ok(())
}

pub fn inode_report<S>(fs: &mut Ext2Fs<S>, index: u32) -> anyhow::Result<InodeReport>
where
    S: Read + Seek,
{
    let inode = fs
        .read_inode(index)
        .with_context(|| format!("failed to read inode {index}"))?;
    let data_blocks = fs
        .data_blocks(&inode)
        .with_context(|| format!("failed to resolve the blocks of inode {index}"))?;
    Ok(InodeReport {
        index,
        inode,
        data_blocks,
    })
}
