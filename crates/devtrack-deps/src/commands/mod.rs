//! Command implementations that operate on the filesystem directly.

pub mod init;
