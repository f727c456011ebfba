//! Data-block pool (§4.B).
//!
//! A fixed array of fixed-size blocks with a free bitmap. Block content is
//! a single flat byte region; per §5's "Shared-resource policy" the
//! content itself is *not* individually locked — correctness relies on
//! the invariant that a reader only touches a block whose reference was
//! installed by a write that has already released its locks.

use std::cell::UnsafeCell;

use std::sync::Mutex;

use crate::config::{BLOCK_SIZE, DATA_BLOCKS};
use crate::delay;
use crate::error::{Error, LockResultExt as _, Result};

/// Index of a block within the pool, in `0..DATA_BLOCKS`.
pub type BlockIndex = usize;

pub struct DataBlockPool {
    /// Taken/Free bitmap. `true` means taken. This is the `data_blocks`
    /// lock of §5 — a plain mutex, no reader-writer counterpart, since
    /// every access to the bitmap mutates it (alloc or free).
    bitmap: Mutex<Box<[bool]>>,
    storage: UnsafeCell<Box<[u8]>>,
}

// SAFETY: `storage` is only ever accessed through `block()`/`block_mut()`,
// which document that the caller must already hold whatever higher-level
// lock (an inode's or the directory's) makes the access race-free. The
// pool itself never reads or writes `storage`.
unsafe impl Sync for DataBlockPool {}

impl DataBlockPool {
    pub fn new() -> Self {
        Self {
            bitmap: Mutex::new(vec![false; DATA_BLOCKS].into_boxed_slice()),
            storage: UnsafeCell::new(vec![0u8; BLOCK_SIZE * DATA_BLOCKS].into_boxed_slice()),
        }
    }

    /// First-fit scan under the pool's mutex. Flips the first Free slot
    /// to Taken and returns its index, or `Exhausted` if the bitmap is
    /// full.
    pub fn alloc(&self) -> Result<BlockIndex> {
        let mut bitmap = self.bitmap.lock().or_lock_failure()?;
        delay::bitmap_scan(bitmap.len(), BLOCK_SIZE);
        let Some(index) = bitmap.iter().position(|&taken| !taken) else {
            log::warn!("data-block pool exhausted");
            return Err(Error::Exhausted);
        };
        bitmap[index] = true;
        log::debug!("allocated data block {index}");
        Ok(index)
    }

    /// Marks `index` Free. Fails if `index` is out of range.
    pub fn free(&self, index: BlockIndex) -> Result<()> {
        let mut bitmap = self.bitmap.lock().or_lock_failure()?;
        let slot = bitmap.get_mut(index).ok_or(Error::InvalidInput)?;
        *slot = false;
        log::debug!("freed data block {index}");
        Ok(())
    }

    /// Returns a shared view of block `index`.
    ///
    /// # Safety
    ///
    /// Never fails for a valid index, but the view is unsynchronized:
    /// the caller must already hold whatever inode or directory lock
    /// makes reading this particular block race-free.
    pub unsafe fn block(&self, index: BlockIndex) -> &[u8] {
        delay::block_fetch();
        let start = index * BLOCK_SIZE;
        // SAFETY: forwarded from the caller's obligation above; `index`
        // was range-checked by the caller (every installed block index
        // came from a successful `alloc()`).
        unsafe { &(*self.storage.get())[start..start + BLOCK_SIZE] }
    }

    /// Returns an exclusive view of block `index`.
    ///
    /// # Safety
    ///
    /// Same obligation as [`DataBlockPool::block`], plus: the caller
    /// must not hold any other live view (shared or exclusive) of the
    /// same index.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn block_mut(&self, index: BlockIndex) -> &mut [u8] {
        delay::block_fetch();
        let start = index * BLOCK_SIZE;
        // SAFETY: forwarded from the caller's obligation above.
        unsafe { &mut (*self.storage.get())[start..start + BLOCK_SIZE] }
    }

    /// Zeroes block `index`. Used right after allocation.
    pub fn zero(&self, index: BlockIndex) {
        // SAFETY: called only on blocks this call just allocated, before
        // any reference to them has escaped to another thread.
        unsafe { self.block_mut(index) }.fill(0);
    }
}

impl Default for DataBlockPool {
    fn default() -> Self {
        Self::new()
    }
}
