//! Root directory (§4.D).
//!
//! The root directory is plain inode content: a single data block of
//! fixed-size entries. §9 flags that the source couples directory
//! mutation to the open-file table's mutex by accident; this rewrite
//! instead serialises directory access on the directory inode's own
//! [`DualLock`] token, which is the lock that should have owned it.

use crate::block::DataBlockPool;
use crate::config::{BLOCK_SIZE, MAX_FILE_NAME, NO_INUM};
use crate::error::{Error, Result};
use crate::inode::{Inumber, Kind, InodeTable};

/// Entry layout: a fixed-width name followed by a 4-byte little-endian
/// inumber (`NO_INUM` marks an empty slot).
const ENTRY_SIZE: usize = MAX_FILE_NAME + 4;
pub const MAX_DIR_ENTRIES: usize = BLOCK_SIZE / ENTRY_SIZE;

pub struct DirEntry;

impl DirEntry {
    /// Writes `NO_INUM` into every entry's inumber field, leaving names
    /// zeroed. Used to initialise a freshly allocated directory block.
    pub fn format_empty_block(block: &mut [u8]) {
        for idx in 0..MAX_DIR_ENTRIES {
            Self::write_raw(block, idx, &[0u8; MAX_FILE_NAME], NO_INUM);
        }
    }

    fn offset(idx: usize) -> usize {
        idx * ENTRY_SIZE
    }

    fn read_inumber(block: &[u8], idx: usize) -> i32 {
        let at = Self::offset(idx) + MAX_FILE_NAME;
        i32::from_le_bytes(block[at..at + 4].try_into().unwrap())
    }

    fn read_name(block: &[u8], idx: usize) -> &[u8] {
        let at = Self::offset(idx);
        let raw = &block[at..at + MAX_FILE_NAME];
        let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        &raw[..len]
    }

    fn write_raw(block: &mut [u8], idx: usize, name: &[u8; MAX_FILE_NAME], inumber: i32) {
        let at = Self::offset(idx);
        block[at..at + MAX_FILE_NAME].copy_from_slice(name);
        block[at + MAX_FILE_NAME..at + ENTRY_SIZE].copy_from_slice(&inumber.to_le_bytes());
    }

    fn write(block: &mut [u8], idx: usize, name: &str, inumber: i32) -> Result<()> {
        if name.is_empty() || name.len() >= MAX_FILE_NAME {
            return Err(Error::InvalidInput);
        }
        let mut raw = [0u8; MAX_FILE_NAME];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        Self::write_raw(block, idx, &raw, inumber);
        Ok(())
    }
}

/// Adds a `name -> sub_inumber` entry to `dir_inumber`'s block. Fails
/// if `dir_inumber` does not name a directory, `name` is empty or too
/// long, or the block has no empty slot left.
pub fn add_entry(
    inodes: &InodeTable,
    blocks: &DataBlockPool,
    dir_inumber: Inumber,
    sub_inumber: Inumber,
    name: &str,
) -> Result<()> {
    if name.is_empty() || name.len() >= MAX_FILE_NAME {
        return Err(Error::InvalidInput);
    }
    let dual = inodes.fields(dir_inumber)?;
    let _token = dual.lock()?;
    let fields = dual.read()?;
    if fields.kind != Kind::Directory {
        return Err(Error::InvalidInput);
    }
    let block = fields.direct[0].ok_or(Error::InvalidInput)?;
    drop(fields);

    // SAFETY: the directory inode's mutex token, held above, serialises
    // every reader and writer of this block against one another.
    let view = unsafe { blocks.block_mut(block) };
    for idx in 0..MAX_DIR_ENTRIES {
        if DirEntry::read_inumber(view, idx) == NO_INUM {
            DirEntry::write(view, idx, name, sub_inumber as i32)?;
            log::debug!("added directory entry {name:?} -> inode {sub_inumber}");
            return Ok(());
        }
    }
    Err(Error::Exhausted)
}

/// Looks up `name` in `dir_inumber`'s block. `NotFound` if absent.
pub fn find(
    inodes: &InodeTable,
    blocks: &DataBlockPool,
    dir_inumber: Inumber,
    name: &str,
) -> Result<Inumber> {
    if name.is_empty() || name.len() >= MAX_FILE_NAME {
        return Err(Error::InvalidInput);
    }
    let dual = inodes.fields(dir_inumber)?;
    let _token = dual.lock()?;
    let fields = dual.read()?;
    if fields.kind != Kind::Directory {
        return Err(Error::InvalidInput);
    }
    let block = fields.direct[0].ok_or(Error::InvalidInput)?;
    drop(fields);

    // SAFETY: same token as `add_entry`, held for the duration of the scan.
    let view = unsafe { blocks.block(block) };
    for idx in 0..MAX_DIR_ENTRIES {
        let inumber = DirEntry::read_inumber(view, idx);
        if inumber != NO_INUM && DirEntry::read_name(view, idx) == name.as_bytes() {
            return Ok(inumber as Inumber);
        }
    }
    Err(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::Kind;

    fn setup() -> (DataBlockPool, InodeTable, Inumber) {
        let blocks = DataBlockPool::new();
        let inodes = InodeTable::new();
        let root = inodes.create(Kind::Directory, &blocks).unwrap();
        (blocks, inodes, root)
    }

    #[test]
    fn add_then_find() {
        let (blocks, inodes, root) = setup();
        let file = inodes.create(Kind::File, &blocks).unwrap();
        add_entry(&inodes, &blocks, root, file, "a").unwrap();
        assert_eq!(find(&inodes, &blocks, root, "a").unwrap(), file);
    }

    #[test]
    fn find_missing_is_not_found() {
        let (blocks, inodes, root) = setup();
        assert_eq!(find(&inodes, &blocks, root, "missing"), Err(Error::NotFound));
    }

    #[test]
    fn add_rejects_non_directory() {
        let (blocks, inodes, _root) = setup();
        let file = inodes.create(Kind::File, &blocks).unwrap();
        let other = inodes.create(Kind::File, &blocks).unwrap();
        assert_eq!(
            add_entry(&inodes, &blocks, file, other, "a"),
            Err(Error::InvalidInput)
        );
    }

    #[test]
    fn add_fills_all_slots_then_exhausts() {
        let (blocks, inodes, root) = setup();
        for i in 0..MAX_DIR_ENTRIES {
            let file = inodes.create(Kind::File, &blocks).unwrap();
            add_entry(&inodes, &blocks, root, file, &format!("f{i}")).unwrap();
        }
        let overflow = inodes.create(Kind::File, &blocks).unwrap();
        assert_eq!(
            add_entry(&inodes, &blocks, root, overflow, "one-too-many"),
            Err(Error::Exhausted)
        );
    }
}
