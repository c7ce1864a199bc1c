use clap::Parser;

use crate::{bitmap_usage::BitmapKind, ROOT_INODE};

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum Ext2Cli {
    /// print the superblock and a summary of every block group
    Info(InfoArgs),
    /// list the entries of a directory
    Ls(LsArgs),
    /// dump an inode and the data blocks it uses
    Stat(StatArgs),
    /// show which bits of a group bitmap are in use
    Bitmap(BitmapArgs),
}

/// volume summary subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "print a summary of the volume")]
pub struct InfoArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
}

/// directory listing subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "list a directory")]
pub struct LsArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the inode of the directory, the root directory by default
    #[clap(short, long, default_value_t = ROOT_INODE)]
    pub inode: u32,
    /// the absolute path of the directory inside the volume
    #[clap(short = 'P', long, conflicts_with = "inode")]
    pub path: Option<String>,
}

/// inode dump subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "dump an inode")]
pub struct StatArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the inode to dump, start at 1
    #[clap(short, long)]
    pub inode: u32,
}

/// bitmap usage subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "show the usage of a group bitmap")]
pub struct BitmapArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the block group, start at 0
    #[clap(short, long)]
    pub group: u32,
    /// which bitmap of the group
    #[clap(short, long, value_enum, default_value_t = BitmapKind::Block)]
    pub kind: BitmapKind,
}

/// test the `Ext2Cli` struct
/// test `info` and `ls` subcommands
#[cfg(test)]
mod listing_parse_args_tests {
    use super::*;
    /// test short parameter form
    #[test]
    fn test_short_parameter_form() {
        let args = Ext2Cli::parse_from(["ext2fs", "info", "-p", "test.img"]);
        assert_eq!(
            args,
            Ext2Cli::Info(InfoArgs {
                image_file_path: "test.img".to_string(),
            })
        );

        let args = Ext2Cli::parse_from(["ext2fs", "ls", "-p", "test.img", "-i", "12"]);
        assert_eq!(
            args,
            Ext2Cli::Ls(LsArgs {
                image_file_path: "test.img".to_string(),
                inode: 12,
                path: None,
            })
        );

        let args = Ext2Cli::parse_from(["ext2fs", "ls", "-p", "test.img", "-P", "/lost+found"]);
        assert_eq!(
            args,
            Ext2Cli::Ls(LsArgs {
                image_file_path: "test.img".to_string(),
                inode: 2,
                path: Some("/lost+found".to_string()),
            })
        );
    }
    /// `ls` lists the root directory unless told otherwise
    #[test]
    fn test_default_inode() {
        let image_file_path_name = concat!("--", "image-file-path");
        let args = Ext2Cli::parse_from(["ext2fs", "ls", image_file_path_name, "test.img"]);
        assert_eq!(
            args,
            Ext2Cli::Ls(LsArgs {
                image_file_path: "test.img".to_string(),
                inode: 2,
                path: None,
            })
        );
    }
    /// a directory is named by inode or by path, not both
    #[test]
    fn test_inode_and_path_conflict() {
        assert!(Ext2Cli::try_parse_from([
            "ext2fs", "ls", "-p", "test.img", "-i", "12", "--path", "/"
        ])
        .is_err());
    }
}
