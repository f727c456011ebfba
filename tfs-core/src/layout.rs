//! File layout engine (§4.G).
//!
//! Pure addressing: maps a byte offset to a region (direct or
//! indirect) plus a position within that region's block list, and
//! reads/writes the 4-byte block references packed into an indirect
//! block. Carries no locks and no storage of its own — [`crate::rw`]
//! drives it while holding the inode's lock.

use crate::block::BlockIndex;
use crate::config::{BLOCK_SIZE, MAX_BYTES_DIRECT, MAX_DIRECT_BLOCKS};

/// Which half of the two-level layout a byte offset falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Direct,
    Indirect,
}

/// Classifies `offset`, the offset's index within that region's block
/// list, and the intra-block offset.
pub fn locate(offset: usize) -> (Region, usize, usize) {
    let intra = offset % BLOCK_SIZE;
    if offset < MAX_BYTES_DIRECT {
        (Region::Direct, offset / BLOCK_SIZE, intra)
    } else {
        (Region::Indirect, (offset - MAX_BYTES_DIRECT) / BLOCK_SIZE, intra)
    }
}

/// Number of whole block-sized references that fit in one indirect
/// block, i.e. `BLOCK_SIZE / 4`.
pub const fn direct_capacity() -> usize {
    MAX_DIRECT_BLOCKS
}

const REF_SIZE: usize = 4;

fn ref_offset(index: usize) -> usize {
    index * REF_SIZE
}

/// Reads the `index`-th 4-byte block reference out of an indirect
/// block's content. A negative stored value means "unassigned".
pub fn read_indirect_ref(indirect_block: &[u8], index: usize) -> Option<BlockIndex> {
    let at = ref_offset(index);
    let raw = i32::from_le_bytes(indirect_block[at..at + REF_SIZE].try_into().unwrap());
    (raw >= 0).then_some(raw as BlockIndex)
}

/// Writes the `index`-th 4-byte block reference. `None` stores the
/// "unassigned" sentinel (`-1`).
pub fn write_indirect_ref(indirect_block: &mut [u8], index: usize, block: Option<BlockIndex>) {
    let at = ref_offset(index);
    let raw: i32 = block.map_or(-1, |b| b as i32);
    indirect_block[at..at + REF_SIZE].copy_from_slice(&raw.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DATA_BLOCKS;

    #[test]
    fn locate_direct_region() {
        assert_eq!(locate(0), (Region::Direct, 0, 0));
        assert_eq!(locate(BLOCK_SIZE + 5), (Region::Direct, 1, 5));
        assert_eq!(locate(MAX_BYTES_DIRECT - 1), (Region::Direct, 9, BLOCK_SIZE - 1));
    }

    #[test]
    fn locate_indirect_region() {
        assert_eq!(locate(MAX_BYTES_DIRECT), (Region::Indirect, 0, 0));
        assert_eq!(
            locate(MAX_BYTES_DIRECT + BLOCK_SIZE + 3),
            (Region::Indirect, 1, 3)
        );
    }

    #[test]
    fn indirect_ref_roundtrip() {
        let mut block = vec![0u8; BLOCK_SIZE];
        write_indirect_ref(&mut block, 0, Some(DATA_BLOCKS - 1));
        write_indirect_ref(&mut block, 1, None);
        assert_eq!(read_indirect_ref(&block, 0), Some(DATA_BLOCKS - 1));
        assert_eq!(read_indirect_ref(&block, 1), None);
    }
}
