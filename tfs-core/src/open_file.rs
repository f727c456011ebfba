//! Open-file table (§4.E).
//!
//! Fixed set of open-file entries (`file_map` + `open_file[i]` of §5).
//! §9 flags that the source's `add` performs no internal locking and
//! trusts callers to already hold the file-map lock; this rewrite
//! closes that gap by having `add` take its own lock, so no caller can
//! get it wrong.

use crate::config::{BLOCK_SIZE, MAX_OPEN_FILES};
use crate::delay;
use crate::error::{Error, Result};
use crate::inode::Inumber;
use crate::lock::DualLock;

pub type Handle = usize;

#[derive(Debug, Clone, Copy)]
pub struct OpenFileFields {
    pub inumber: Inumber,
    pub offset: usize,
}

pub struct OpenFileTable {
    /// `file_map`: Taken/Free bitmap for the table itself.
    bitmap: DualLock<Box<[bool]>>,
    slots: Box<[DualLock<OpenFileFields>]>,
}

impl OpenFileTable {
    pub fn new() -> Self {
        Self {
            bitmap: DualLock::new(vec![false; MAX_OPEN_FILES].into_boxed_slice()),
            slots: (0..MAX_OPEN_FILES)
                .map(|_| DualLock::new(OpenFileFields { inumber: 0, offset: 0 }))
                .collect(),
        }
    }

    /// Allocates a handle for `(inumber, offset)`. Unlike the source's
    /// `add_to_open_file_table`, takes the table's own lock rather than
    /// depending on the caller to hold it.
    pub fn add(&self, inumber: Inumber, offset: usize) -> Result<Handle> {
        let _token = self.bitmap.lock()?;
        let mut bitmap = self.bitmap.write()?;
        delay::bitmap_scan(bitmap.len(), BLOCK_SIZE);
        let Some(handle) = bitmap.iter().position(|&taken| !taken) else {
            log::warn!("open-file table exhausted");
            return Err(Error::Exhausted);
        };
        bitmap[handle] = true;
        drop(bitmap);
        *self.slots[handle].write()? = OpenFileFields { inumber, offset };
        log::debug!("opened handle {handle} for inode {inumber}");
        Ok(handle)
    }

    /// Frees `handle`. Fails if it is out of range or already Free.
    pub fn remove(&self, handle: Handle) -> Result<()> {
        let _token = self.bitmap.lock()?;
        let mut bitmap = self.bitmap.write()?;
        let slot = bitmap.get_mut(handle).ok_or(Error::InvalidInput)?;
        if !*slot {
            return Err(Error::InvalidInput);
        }
        *slot = false;
        log::debug!("closed handle {handle}");
        Ok(())
    }

    /// Bounds-checked access to a handle's lock. No occupancy check —
    /// same contract as [`crate::inode::InodeTable::fields`].
    pub fn fields(&self, handle: Handle) -> Result<&DualLock<OpenFileFields>> {
        self.slots.get(handle).ok_or(Error::InvalidInput)
    }
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self::new()
    }
}
