use clap::Parser;
use ext2fs::cli_interface::Ext2Cli;
/// a CLI interface to users to inspect an ext2 image file,
/// or a block device holding an ext2 volume.
///
/// Nothing is written to the volume, set `RUST_LOG=debug` to trace every structure read.
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = Ext2Cli::parse();
    match args {
        Ext2Cli::Info(args) => {
            ext2fs::info::info(args.image_file_path)?;
        }
        Ext2Cli::Ls(args) => {
            ext2fs::ls::ls(args.image_file_path, args.inode, args.path.as_deref())?;
        }
        Ext2Cli::Stat(args) => {
            ext2fs::stat::stat(args.image_file_path, args.inode)?;
        }
        Ext2Cli::Bitmap(args) => {
            ext2fs::bitmap_usage::bitmap_usage(args.image_file_path, args.group, args.kind)?;
        }
    }
    Ok(())
}
