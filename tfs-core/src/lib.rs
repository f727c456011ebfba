//! TFS: a concurrent, flat, in-memory toy filesystem for multi-threaded
//! use within a single process.
//!
//! Clients open, read, write, and close regular files identified by
//! single-component absolute paths (`/name`); a single root directory
//! holds every entry. There is no backing store — persistence is
//! simulated — but [`delay`] injects artificial latency at the points
//! a real disk-backed filesystem would block, so timing-sensitive
//! tests can observe interleavings a purely in-memory structure would
//! never produce.
//!
//! The entry point is [`api::Filesystem`]; [`ffi_shim`] adds the
//! `-1`-on-failure mirror of each operation for callers that want the
//! C-style return convention instead of `Result`.

mod api;
mod block;
mod config;
mod delay;
mod dir;
mod error;
mod ffi_shim;
mod inode;
mod layout;
mod lock;
mod open_file;
mod path;
mod rw;

pub use api::{flags, Filesystem};
pub use config::{
    BLOCK_SIZE, DATA_BLOCKS, INODE_TABLE_SIZE, MAX_BYTES, MAX_BYTES_DIRECT, MAX_DIRECT_BLOCKS,
    MAX_FILE_NAME, MAX_OPEN_FILES,
};
pub use error::{Error, Result};
pub use inode::{Inumber, Kind};
pub use open_file::Handle;
