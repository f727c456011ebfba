//! Delay injector (§4.A).
//!
//! Emulates secondary-storage latency at defined touch points so that
//! timing-sensitive tests can observe interleavings that a truly
//! in-memory structure would never produce. Functionally a no-op:
//! correctness never depends on how long this spins.

use std::hint;
use std::time::{Duration, Instant};

/// How long a single simulated "disk touch" takes.
const TOUCH_DURATION: Duration = Duration::from_micros(20);

/// Busy-waits for one simulated storage access.
///
/// Uses a wall-clock deadline with `hint::spin_loop` rather than a plain
/// counting loop so the optimizer cannot prove the wait has no observable
/// effect and elide it.
fn touch() {
    let deadline = Instant::now() + TOUCH_DURATION;
    while Instant::now() < deadline {
        hint::spin_loop();
    }
}

/// One touch per `BLOCK_SIZE`-worth of bitmap scanned.
pub(crate) fn bitmap_scan(bytes_scanned: usize, block_size: usize) {
    let touches = bytes_scanned.div_ceil(block_size.max(1)).max(1);
    for _ in 0..touches {
        touch();
    }
}

/// One touch per inode fetch.
pub(crate) fn inode_fetch() {
    touch();
}

/// One touch per block-content fetch.
pub(crate) fn block_fetch() {
    touch();
}

/// Two touches per `inode_delete`.
pub(crate) fn inode_delete() {
    touch();
    touch();
}
