//! Error kinds (§7).
//!
//! `Partial` is deliberately absent: a short read/write is communicated by
//! returning `Ok(n)` with `n` smaller than requested, not as an error.

/// Failure kinds the filesystem core distinguishes internally.
///
/// The public API (`Filesystem::*_raw`) collapses every variant to `-1`,
/// matching the C-style return convention of §6; callers that use the
/// `Result`-returning methods directly keep the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid input")]
    InvalidInput,

    #[error("not found")]
    NotFound,

    #[error("resource exhausted")]
    Exhausted,

    #[error("lock failure")]
    LockFailure,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Maps a `std::sync` lock result to [`Error::LockFailure`] (§7: "the
/// underlying lock primitive returned non-zero"). A poisoned lock means
/// some other thread panicked while holding it, leaving the protected
/// state potentially inconsistent — the caller's operation fails rather
/// than reading or writing through that state.
pub(crate) trait LockResultExt<T> {
    fn or_lock_failure(self) -> Result<T>;
}

impl<T> LockResultExt<T> for std::sync::LockResult<T> {
    fn or_lock_failure(self) -> Result<T> {
        self.map_err(|_| {
            log::warn!("lock poisoned");
            Error::LockFailure
        })
    }
}
