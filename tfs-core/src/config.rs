//! Fixed layout constants.
//!
//! These are not runtime-configurable: the spec they implement fixes them
//! at build time, the same way `xv6`/`ov6` fix `BSIZE`, `NINODE`, `NOFILE`
//! and friends in `param.rs`.

/// Size in bytes of a single data block.
pub const BLOCK_SIZE: usize = 1024;

/// Number of data blocks in the pool.
pub const DATA_BLOCKS: usize = 1024;

/// Number of entries in the inode table.
pub const INODE_TABLE_SIZE: usize = 50;

/// Number of entries in the open-file table.
pub const MAX_OPEN_FILES: usize = 20;

/// Maximum length of a file name, including the null terminator.
pub const MAX_FILE_NAME: usize = 40;

/// Number of direct block references held inline in an inode.
pub const MAX_DIRECT_BLOCKS: usize = 10;

/// Number of block references that fit in one indirect block.
pub const REFS_PER_INDIRECT: usize = BLOCK_SIZE / 4;

/// Largest byte offset reachable through the direct blocks alone.
pub const MAX_BYTES_DIRECT: usize = MAX_DIRECT_BLOCKS * BLOCK_SIZE;

/// Largest file size in bytes (direct region plus one indirect block).
pub const MAX_BYTES: usize = (MAX_DIRECT_BLOCKS + REFS_PER_INDIRECT) * BLOCK_SIZE;

/// Sentinel inumber meaning "no inode" / "empty directory slot".
pub const NO_INUM: i32 = -1;

/// Root directory's fixed inumber.
pub const ROOT_INUM: usize = 0;

const _: () = assert!(MAX_BYTES_DIRECT == 10 * 1024);
const _: () = assert!(MAX_BYTES == 266 * 1024);
const _: () = assert!(REFS_PER_INDIRECT == 256);
