//! the command line of the `ext2fs` binary
mod cli_struct;

use std::{fs::File, path::Path};

use anyhow::Context;

pub use cli_struct::*;

use crate::Ext2Fs;

/// open the image file read-only, for the subcommands which only inspect it
pub fn open_volume<P>(image_file_path: P) -> anyhow::Result<Ext2Fs<File>>
where
    P: AsRef<Path>,
{
    let image_file_path = image_file_path.as_ref();
    Ext2Fs::open_image(image_file_path, false)
        .with_context(|| format!("failed to open ext2 image {}", image_file_path.display()))
}
