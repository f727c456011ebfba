//! Public API (§4.I): `init`, `destroy`, `lookup`, `open`, `close`,
//! `read`, `write`.
//!
//! [`Filesystem`] is the state handle §9 calls for in place of a
//! process-wide singleton: every operation takes `&self`, so tests can
//! run many independent filesystems side by side.

use crate::block::DataBlockPool;
use crate::config::ROOT_INUM;
use crate::dir;
use crate::error::{Error, Result};
use crate::inode::{Inumber, InodeTable, Kind};
use crate::open_file::{Handle, OpenFileTable};
use crate::path;
use crate::rw;

/// Bits of the `open` flags mask (§6). Values are this crate's own
/// choice — only the bit-field style and orthogonal combinability are
/// part of the contract.
pub mod flags {
    pub const APPEND: u32 = 1 << 0;
    pub const TRUNC: u32 = 1 << 1;
    pub const CREATE: u32 = 1 << 6;
}

/// A single, independent filesystem instance. Construction is the
/// `init()` of §4.I; dropping it is `destroy()` — there is no backing
/// store to flush, so teardown is just freeing the in-memory tables.
pub struct Filesystem {
    inodes: InodeTable,
    blocks: DataBlockPool,
    open_files: OpenFileTable,
    root: Inumber,
}

impl Filesystem {
    /// Builds fresh, empty state and creates the root directory inode,
    /// which is guaranteed to land at inumber 0 since nothing else has
    /// been allocated yet.
    pub fn init() -> Result<Self> {
        let blocks = DataBlockPool::new();
        let inodes = InodeTable::new();
        let open_files = OpenFileTable::new();
        let root = inodes.create(Kind::Directory, &blocks)?;
        debug_assert_eq!(root, ROOT_INUM);
        log::info!("filesystem initialised, root inode {root}");
        Ok(Self { inodes, blocks, open_files, root })
    }

    /// Idempotent in-memory teardown. Consuming `self` and letting the
    /// tables drop is the whole of it — there is nothing external to
    /// release.
    pub fn destroy(self) {
        log::info!("filesystem destroyed");
    }

    /// Resolves `path` to an inumber, failing if the path is malformed
    /// or has no entry in the root directory.
    pub fn lookup(&self, path: &str) -> Result<Inumber> {
        let name = path::strip_root(path)?;
        dir::find(&self.inodes, &self.blocks, self.root, name)
    }

    /// Opens `path` under `flags` (`CREATE`, `APPEND`, `TRUNC`),
    /// returning a handle. See §4.I for the exact semantics of each
    /// bit's combination.
    pub fn open(&self, path: &str, flags: u32) -> Result<Handle> {
        let name = path::strip_root(path)?;
        let create = flags & flags::CREATE != 0;
        let append = flags & flags::APPEND != 0;
        let trunc = flags & flags::TRUNC != 0;

        let inumber = match dir::find(&self.inodes, &self.blocks, self.root, name) {
            Ok(inumber) => inumber,
            Err(Error::NotFound) if create => {
                let inumber = self.inodes.create(Kind::File, &self.blocks)?;
                if let Err(err) = dir::add_entry(&self.inodes, &self.blocks, self.root, inumber, name) {
                    log::warn!("rolling back inode {inumber}: {err}");
                    let _ = self.inodes.delete(inumber, &self.blocks);
                    return Err(err);
                }
                inumber
            }
            Err(err) => return Err(err),
        };

        if trunc {
            self.truncate(inumber)?;
        }

        let offset = if append {
            self.inodes.fields(inumber)?.read()?.size
        } else {
            0
        };

        self.open_files.add(inumber, offset)
    }

    /// Frees the open-file entry for `handle`.
    pub fn close(&self, handle: Handle) -> Result<()> {
        self.open_files.remove(handle)
    }

    /// Reads into `buf` from the handle's current offset, advancing it.
    pub fn read(&self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        rw::read(&self.inodes, &self.blocks, &self.open_files, handle, buf)
    }

    /// Writes `data` at the handle's current offset, advancing it.
    pub fn write(&self, handle: Handle, data: &[u8]) -> Result<usize> {
        rw::write(&self.inodes, &self.blocks, &self.open_files, handle, data)
    }

    /// §4.H's truncate: frees every block the inode references (not
    /// just the working block — the §9 OQ2 resolution carried through
    /// to the open-with-`TRUNC` path as well as `delete`) and resets
    /// size to zero.
    fn truncate(&self, inumber: Inumber) -> Result<()> {
        let dual = self.inodes.fields(inumber)?;
        let _token = dual.lock()?;
        let mut fields = dual.write()?;
        if fields.size == 0 {
            return Ok(());
        }
        for slot in &mut fields.direct {
            if let Some(block) = slot.take() {
                let _ = self.blocks.free(block);
            }
        }
        if let Some(indirect) = fields.indirect.take() {
            // SAFETY: this inode's write-mode lock, held above, excludes
            // every other thread that could still be reading this
            // indirect block.
            let refs = unsafe { self.blocks.block(indirect) };
            for chunk in refs.chunks_exact(4) {
                let raw = i32::from_le_bytes(chunk.try_into().unwrap());
                if raw >= 0 {
                    let _ = self.blocks.free(raw as usize);
                }
            }
            let _ = self.blocks.free(indirect);
        }
        fields.size = 0;
        fields.working_block = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_block_round_trip_s1() {
        let fs = Filesystem::init().unwrap();
        let fh = fs.open("/a", flags::CREATE).unwrap();
        assert_eq!(fs.write(fh, b"hello").unwrap(), 5);
        fs.close(fh).unwrap();

        let fh = fs.open("/a", 0).unwrap();
        let mut buf = [0u8; 512];
        assert_eq!(fs.read(fh, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
    }

    #[test]
    fn append_scenario_s4() {
        let fs = Filesystem::init().unwrap();
        let fh1 = fs.open("/p", flags::CREATE).unwrap();
        let first = vec![b'1'; 100];
        assert_eq!(fs.write(fh1, &first).unwrap(), 100);
        fs.close(fh1).unwrap();

        let fh2 = fs.open("/p", flags::APPEND).unwrap();
        let second = vec![b'2'; 50];
        assert_eq!(fs.write(fh2, &second).unwrap(), 50);
        fs.close(fh2).unwrap();

        let fh3 = fs.open("/p", 0).unwrap();
        let mut buf = [0u8; 150];
        assert_eq!(fs.read(fh3, &mut buf).unwrap(), 150);
        assert!(buf[..100].iter().all(|&b| b == b'1'));
        assert!(buf[100..].iter().all(|&b| b == b'2'));
    }

    #[test]
    fn create_truncate_resets_size_s6() {
        let fs = Filesystem::init().unwrap();
        let fh = fs.open("/t", flags::CREATE).unwrap();
        fs.write(fh, b"some content").unwrap();
        fs.close(fh).unwrap();

        let fh = fs.open("/t", flags::CREATE | flags::TRUNC).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(fs.read(fh, &mut buf).unwrap(), 0);
    }

    #[test]
    fn reopen_without_create_requires_prior_create_s_prop4() {
        let fs = Filesystem::init().unwrap();
        assert_eq!(fs.open("/missing", 0).err(), Some(Error::NotFound));
        let fh = fs.open("/missing", flags::CREATE).unwrap();
        fs.close(fh).unwrap();
        let fh2 = fs.open("/missing", 0).unwrap();
        fs.close(fh2).unwrap();
    }

    #[test]
    fn lookup_reflects_open_file_table() {
        let fs = Filesystem::init().unwrap();
        let fh = fs.open("/x", flags::CREATE).unwrap();
        fs.close(fh).unwrap();
        let inumber = fs.lookup("/x").unwrap();
        assert_ne!(inumber, fs.root);
    }
}
