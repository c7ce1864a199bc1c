pub mod bitmap_usage;
pub mod cli_interface;
pub mod error;
mod fs;
pub mod info;
pub mod ls;
pub mod stat;
pub mod store_cursor;
pub mod utils;
pub use error::{Ext2Error, Result};
pub use fs::*;
