//! Read/write engine (§4.H).
//!
//! Orchestrates range splitting across the direct/indirect boundary,
//! on-demand block allocation during writes, and the memory copies.
//! Per the §9 OQ1 resolution, the inode lock is taken in **write**
//! mode for the whole operation (a `RwLockReadGuard` cannot mutate
//! `size`/`direct`/`indirect` in safe Rust, so the source's read-mode
//! hold cannot be reproduced without `unsafe`); concurrent writers to
//! distinct handles on the same inode now genuinely serialise instead
//! of racing.

use crate::block::DataBlockPool;
use crate::config::{BLOCK_SIZE, MAX_BYTES, MAX_BYTES_DIRECT, MAX_DIRECT_BLOCKS};
use crate::error::{Error, Result};
use crate::inode::{InodeFields, InodeTable};
use crate::layout::{self, Region};
use crate::open_file::{Handle, OpenFileTable};

/// Writes `data` at the handle's current offset, advancing it by the
/// number of bytes actually written. Never writes past `MAX_BYTES`;
/// hitting that ceiling clamps the count rather than failing.
pub fn write(
    inodes: &InodeTable,
    blocks: &DataBlockPool,
    open_files: &OpenFileTable,
    handle: Handle,
    data: &[u8],
) -> Result<usize> {
    if data.is_empty() {
        return Err(Error::InvalidInput);
    }

    let entry_lock = open_files.fields(handle)?;
    let _entry_token = entry_lock.lock()?;
    let (inumber, offset) = {
        let entry = entry_lock.read()?;
        (entry.inumber, entry.offset)
    };

    let inode_lock = inodes.fields(inumber)?;
    let mut fields = inode_lock.write()?;

    let to_write = data.len().min(MAX_BYTES.saturating_sub(offset));
    if to_write == 0 {
        return Ok(0);
    }
    let data = &data[..to_write];

    let written = if offset + to_write <= MAX_BYTES_DIRECT {
        direct_write(&mut fields, blocks, offset, data)?
    } else if offset >= MAX_BYTES_DIRECT {
        ensure_indirect(&mut fields, blocks)?;
        indirect_write(&mut fields, blocks, offset, data)?
    } else {
        let direct_size = MAX_BYTES_DIRECT - offset;
        let n1 = direct_write(&mut fields, blocks, offset, &data[..direct_size])?;
        ensure_indirect(&mut fields, blocks)?;
        let n2 = indirect_write(&mut fields, blocks, offset + n1, &data[direct_size..])?;
        n1 + n2
    };
    drop(fields);

    entry_lock.write()?.offset = offset + written;
    Ok(written)
}

/// Reads up to `buf.len()` bytes from the handle's current offset,
/// advancing it by the number of bytes actually read.
pub fn read(
    inodes: &InodeTable,
    blocks: &DataBlockPool,
    open_files: &OpenFileTable,
    handle: Handle,
    buf: &mut [u8],
) -> Result<usize> {
    if buf.is_empty() {
        return Err(Error::InvalidInput);
    }

    let entry_lock = open_files.fields(handle)?;
    let _entry_token = entry_lock.lock()?;
    let (inumber, offset) = {
        let entry = entry_lock.read()?;
        (entry.inumber, entry.offset)
    };

    let inode_lock = inodes.fields(inumber)?;
    let fields = inode_lock.read()?;

    let to_read = buf.len().min(fields.size.saturating_sub(offset));
    if to_read == 0 {
        return Ok(0);
    }
    let buf = &mut buf[..to_read];

    let total = if offset + to_read <= MAX_BYTES_DIRECT {
        direct_read(&fields, blocks, offset, buf)?
    } else if offset >= MAX_BYTES_DIRECT {
        indirect_read(&fields, blocks, offset, buf)?
    } else {
        let direct_bytes = MAX_BYTES_DIRECT - offset;
        let (direct_buf, indirect_buf) = buf.split_at_mut(direct_bytes);
        let n1 = direct_read(&fields, blocks, offset, direct_buf)?;
        let n2 = indirect_read(&fields, blocks, offset + n1, indirect_buf)?;
        n1 + n2
    };
    drop(fields);

    entry_lock.write()?.offset = offset + total;
    Ok(total)
}

fn ensure_indirect(fields: &mut InodeFields, blocks: &DataBlockPool) -> Result<()> {
    if fields.indirect.is_none() {
        let block = blocks.alloc()?;
        blocks.zero(block);
        fields.indirect = Some(block);
    }
    Ok(())
}

/// Direct sub-procedure: allocates a block whenever `offset` lands on
/// a block boundary with no block registered yet, then copies into
/// the current block, advancing until `data` is exhausted or the
/// direct region (10 slots) runs out.
fn direct_write(
    fields: &mut InodeFields,
    blocks: &DataBlockPool,
    mut offset: usize,
    data: &[u8],
) -> Result<usize> {
    let mut written = 0;
    while written < data.len() {
        let (region, index, intra) = layout::locate(offset);
        debug_assert_eq!(region, Region::Direct);
        if index >= MAX_DIRECT_BLOCKS {
            break;
        }
        if fields.direct[index].is_none() {
            let block = blocks.alloc()?;
            blocks.zero(block);
            fields.direct[index] = Some(block);
            fields.working_block = Some(block);
        }
        let block = fields.direct[index].unwrap();
        let count = (BLOCK_SIZE - intra).min(data.len() - written);
        // SAFETY: the caller holds the inode's write-mode lock, which
        // this crate treats as exclusive ownership of every block this
        // inode references for the duration of the call.
        let view = unsafe { blocks.block_mut(block) };
        view[intra..intra + count].copy_from_slice(&data[written..written + count]);
        offset += count;
        written += count;
        fields.size = fields.size.max(offset);
    }
    Ok(written)
}

/// Indirect sub-procedure: identical shape, allocating new blocks into
/// the indirect block's reference slots instead of `i_block`.
fn indirect_write(
    fields: &mut InodeFields,
    blocks: &DataBlockPool,
    mut offset: usize,
    data: &[u8],
) -> Result<usize> {
    let indirect = fields.indirect.ok_or(Error::InvalidInput)?;
    let mut written = 0;
    while written < data.len() {
        let (region, index, intra) = layout::locate(offset);
        debug_assert_eq!(region, Region::Indirect);
        if index >= crate::config::REFS_PER_INDIRECT {
            break;
        }
        let existing = {
            // SAFETY: see `direct_write`.
            let view = unsafe { blocks.block(indirect) };
            layout::read_indirect_ref(view, index)
        };
        let block = match existing {
            Some(block) => block,
            None => {
                let block = blocks.alloc()?;
                blocks.zero(block);
                // SAFETY: see `direct_write`.
                let view = unsafe { blocks.block_mut(indirect) };
                layout::write_indirect_ref(view, index, Some(block));
                fields.working_block = Some(block);
                block
            }
        };
        let count = (BLOCK_SIZE - intra).min(data.len() - written);
        // SAFETY: see `direct_write`.
        let view = unsafe { blocks.block_mut(block) };
        view[intra..intra + count].copy_from_slice(&data[written..written + count]);
        offset += count;
        written += count;
        fields.size = fields.size.max(offset);
    }
    Ok(written)
}

fn direct_read(
    fields: &InodeFields,
    blocks: &DataBlockPool,
    mut offset: usize,
    buf: &mut [u8],
) -> Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        let (region, index, intra) = layout::locate(offset);
        debug_assert_eq!(region, Region::Direct);
        let Some(block) = fields.direct.get(index).copied().flatten() else {
            break;
        };
        let count = (BLOCK_SIZE - intra).min(buf.len() - read);
        // SAFETY: the caller holds the inode's read-mode lock, so this
        // inode's own writers cannot be concurrently mutating the
        // blocks it references.
        let view = unsafe { blocks.block(block) };
        buf[read..read + count].copy_from_slice(&view[intra..intra + count]);
        offset += count;
        read += count;
    }
    Ok(read)
}

fn indirect_read(
    fields: &InodeFields,
    blocks: &DataBlockPool,
    mut offset: usize,
    buf: &mut [u8],
) -> Result<usize> {
    let Some(indirect) = fields.indirect else {
        return Ok(0);
    };
    let mut read = 0;
    while read < buf.len() {
        let (region, index, intra) = layout::locate(offset);
        debug_assert_eq!(region, Region::Indirect);
        // SAFETY: see `direct_read`.
        let refs = unsafe { blocks.block(indirect) };
        let Some(block) = layout::read_indirect_ref(refs, index) else {
            break;
        };
        let count = (BLOCK_SIZE - intra).min(buf.len() - read);
        // SAFETY: see `direct_read`.
        let view = unsafe { blocks.block(block) };
        buf[read..read + count].copy_from_slice(&view[intra..intra + count]);
        offset += count;
        read += count;
    }
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::Kind;

    struct Fixture {
        inodes: InodeTable,
        blocks: DataBlockPool,
        open_files: OpenFileTable,
        handle: Handle,
    }

    fn fixture() -> Fixture {
        let inodes = InodeTable::new();
        let blocks = DataBlockPool::new();
        let open_files = OpenFileTable::new();
        let inumber = inodes.create(Kind::File, &blocks).unwrap();
        let handle = open_files.add(inumber, 0).unwrap();
        Fixture { inodes, blocks, open_files, handle }
    }

    #[test]
    fn single_block_round_trip() {
        let f = fixture();
        let n = write(&f.inodes, &f.blocks, &f.open_files, f.handle, b"hello").unwrap();
        assert_eq!(n, 5);
        f.open_files.fields(f.handle).unwrap().write().unwrap().offset = 0;
        let mut buf = [0u8; 512];
        let read_n = read(&f.inodes, &f.blocks, &f.open_files, f.handle, &mut buf).unwrap();
        assert_eq!(read_n, 5);
        assert_eq!(&buf[..5], b"hello");
    }

    #[test]
    fn cross_block_write_leaves_tail_zeroed() {
        let f = fixture();
        let data = vec![b'X'; 1500];
        let n = write(&f.inodes, &f.blocks, &f.open_files, f.handle, &data).unwrap();
        assert_eq!(n, 1500);
        let inumber = f.open_files.fields(f.handle).unwrap().read().unwrap().inumber;
        let second_block = f.inodes.fields(inumber).unwrap().read().unwrap().direct[1].unwrap();
        // SAFETY: test has exclusive access; no writer is concurrently live.
        let view = unsafe { f.blocks.block(second_block) };
        let written_in_second_block = 1500 - BLOCK_SIZE;
        assert!(view[written_in_second_block..].iter().all(|&b| b == 0));
    }

    #[test]
    fn direct_to_indirect_straddle() {
        let f = fixture();
        let a = vec![b'A'; MAX_BYTES_DIRECT];
        assert_eq!(write(&f.inodes, &f.blocks, &f.open_files, f.handle, &a).unwrap(), MAX_BYTES_DIRECT);
        let b = vec![b'B'; 2048];
        assert_eq!(write(&f.inodes, &f.blocks, &f.open_files, f.handle, &b).unwrap(), 2048);

        f.open_files.fields(f.handle).unwrap().write().unwrap().offset = 0;
        let mut buf = vec![0u8; MAX_BYTES_DIRECT + 2048];
        let n = read(&f.inodes, &f.blocks, &f.open_files, f.handle, &mut buf).unwrap();
        assert_eq!(n, MAX_BYTES_DIRECT + 2048);
        assert!(buf[..MAX_BYTES_DIRECT].iter().all(|&b| b == b'A'));
        assert!(buf[MAX_BYTES_DIRECT..].iter().all(|&b| b == b'B'));
    }

    #[test]
    fn concurrent_writes_to_distinct_block_aligned_regions() {
        use std::sync::Arc;
        use std::thread;

        let inodes = Arc::new(InodeTable::new());
        let blocks = Arc::new(DataBlockPool::new());
        let open_files = Arc::new(OpenFileTable::new());
        let inumber = inodes.create(Kind::File, &blocks).unwrap();

        let thread_count: usize = 6;
        let joins: Vec<_> = (0..thread_count)
            .map(|i| {
                let inodes = Arc::clone(&inodes);
                let blocks = Arc::clone(&blocks);
                let open_files = Arc::clone(&open_files);
                thread::spawn(move || {
                    let handle = open_files.add(inumber, i * BLOCK_SIZE).unwrap();
                    let data = vec![b'0' + i as u8; BLOCK_SIZE];
                    let n = write(&inodes, &blocks, &open_files, handle, &data).unwrap();
                    open_files.remove(handle).unwrap();
                    n
                })
            })
            .collect();

        let total: usize = joins.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, thread_count * BLOCK_SIZE);

        let fields = inodes.fields(inumber).unwrap().read().unwrap();
        assert_eq!(fields.size, thread_count * BLOCK_SIZE);
        for i in 0..thread_count {
            let block = fields.direct[i].unwrap();
            // SAFETY: no writer is concurrently live; the scan above completed.
            let view = unsafe { blocks.block(block) };
            assert!(view.iter().all(|&b| b == b'0' + i as u8));
        }
    }

    #[test]
    fn writing_max_bytes_then_one_more_clamps_to_zero() {
        let f = fixture();
        let full = vec![b'Z'; MAX_BYTES];
        assert_eq!(write(&f.inodes, &f.blocks, &f.open_files, f.handle, &full).unwrap(), MAX_BYTES);
        assert_eq!(write(&f.inodes, &f.blocks, &f.open_files, f.handle, b"!").unwrap(), 0);
    }
}
