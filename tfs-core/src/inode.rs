//! Inode table (§4.C).
//!
//! A fixed array of inodes plus a free bitmap (`inode_map` of §5). Each
//! slot carries its own [`DualLock`], matching the `inode[i]` entry of
//! the lock inventory; the table-wide bitmap is a second, independent
//! `DualLock` guarding only allocation.

use crate::block::{BlockIndex, DataBlockPool};
use crate::config::{BLOCK_SIZE, INODE_TABLE_SIZE, MAX_DIRECT_BLOCKS};
use crate::delay;
use crate::dir::DirEntry;
use crate::error::{Error, Result};
use crate::lock::DualLock;

pub type Inumber = usize;

/// What an inode describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    File,
    Directory,
}

/// The mutable fields of one inode. Protected by that inode's own
/// `DualLock`; nothing in this type synchronises itself.
#[derive(Debug, Clone)]
pub struct InodeFields {
    pub kind: Kind,
    pub size: usize,
    pub direct: [Option<BlockIndex>; MAX_DIRECT_BLOCKS],
    pub indirect: Option<BlockIndex>,
    /// Most recently allocated block, so the append path does not have
    /// to re-walk the direct/indirect layout to find where it left off.
    pub working_block: Option<BlockIndex>,
}

impl InodeFields {
    fn empty(kind: Kind) -> Self {
        Self {
            kind,
            size: 0,
            direct: [None; MAX_DIRECT_BLOCKS],
            indirect: None,
            working_block: None,
        }
    }

    /// Every block index currently attributed to this inode, direct
    /// slots first, indirect-block slot last. Does not walk the
    /// contents of the indirect block itself — callers that need those
    /// entries read them through the layout engine.
    pub fn referenced_blocks(&self) -> impl Iterator<Item = BlockIndex> + '_ {
        self.direct.iter().copied().flatten().chain(self.indirect)
    }
}

pub struct InodeTable {
    /// `inode_map`: Taken/Free bitmap for the table itself.
    bitmap: DualLock<Box<[bool]>>,
    slots: Box<[DualLock<InodeFields>]>,
}

impl InodeTable {
    pub fn new() -> Self {
        Self {
            bitmap: DualLock::new(vec![false; INODE_TABLE_SIZE].into_boxed_slice()),
            slots: (0..INODE_TABLE_SIZE)
                .map(|_| DualLock::new(InodeFields::empty(Kind::File)))
                .collect(),
        }
    }

    /// Allocates a free inumber and initialises its fields for `kind`.
    /// Directory creation also allocates and zero-fills its directory
    /// block. Holds the table's mutex token across the whole scan, per
    /// §9's allowance that an implementer may do so instead of
    /// re-acquiring per iteration.
    pub fn create(&self, kind: Kind, blocks: &DataBlockPool) -> Result<Inumber> {
        let _token = self.bitmap.lock()?;
        let mut bitmap = self.bitmap.write()?;
        delay::bitmap_scan(bitmap.len(), BLOCK_SIZE);
        let Some(inumber) = bitmap.iter().position(|&taken| !taken) else {
            log::warn!("inode table exhausted");
            return Err(Error::Exhausted);
        };
        bitmap[inumber] = true;
        drop(bitmap);

        let mut fields = self.slots[inumber].write()?;
        *fields = InodeFields::empty(kind);
        if kind == Kind::Directory {
            let block = match blocks.alloc() {
                Ok(block) => block,
                Err(err) => {
                    drop(fields);
                    match self.bitmap.write() {
                        Ok(mut bitmap) => bitmap[inumber] = false,
                        Err(_) => log::error!(
                            "failed to roll back inode {inumber}: bitmap lock poisoned"
                        ),
                    }
                    log::warn!("rolling back inode {inumber}: directory block allocation failed");
                    return Err(err);
                }
            };
            blocks.zero(block);
            // SAFETY: `block` was just allocated by this call and no
            // reference to it has escaped yet.
            let view = unsafe { blocks.block_mut(block) };
            DirEntry::format_empty_block(view);
            fields.direct[0] = Some(block);
            fields.size = crate::config::BLOCK_SIZE;
        }
        drop(fields);

        log::debug!("created inode {inumber} ({kind:?})");
        Ok(inumber)
    }

    /// Frees `inumber` and every data block it references (direct
    /// slots, the indirect block's own slot, and — per the §9 OQ2
    /// resolution — every block the indirect block points at).
    pub fn delete(&self, inumber: Inumber, blocks: &DataBlockPool) -> Result<()> {
        let _token = self.bitmap.lock()?;
        let mut bitmap = self.bitmap.write()?;
        let slot = bitmap.get_mut(inumber).ok_or(Error::InvalidInput)?;
        if !*slot {
            return Err(Error::NotFound);
        }
        *slot = false;
        drop(bitmap);

        delay::inode_delete();
        let mut fields = self.slots[inumber].write()?;
        if fields.size > 0 {
            for block in fields.direct.iter().flatten() {
                let _ = blocks.free(*block);
            }
            if let Some(indirect) = fields.indirect {
                // SAFETY: the inode slot is freed and this thread holds
                // the only live reference to its fields; no other
                // thread can still be reading the indirect block.
                let refs = unsafe { blocks.block(indirect) };
                for chunk in refs.chunks_exact(4) {
                    let raw = i32::from_le_bytes(chunk.try_into().unwrap());
                    if raw >= 0 {
                        let _ = blocks.free(raw as BlockIndex);
                    }
                }
                let _ = blocks.free(indirect);
            }
        }
        *fields = InodeFields::empty(Kind::File);
        log::debug!("deleted inode {inumber}");
        Ok(())
    }

    /// Bounds-checked access to an inode's lock. Performs no occupancy
    /// check and no locking of its own — callers resolve a path (which
    /// already implies occupancy) before taking the returned lock.
    pub fn fields(&self, inumber: Inumber) -> Result<&DualLock<InodeFields>> {
        delay::inode_fetch();
        self.slots.get(inumber).ok_or(Error::InvalidInput)
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
