//! C-compatible shim (§6/§7): collapses every [`crate::error::Error`]
//! to `-1`, matching the "non-negative on success, -1 on failure"
//! return convention expected by the external CLI driver.

use crate::api::Filesystem;
use crate::open_file::Handle;

impl Filesystem {
    pub fn lookup_raw(&self, path: &str) -> i64 {
        self.lookup(path).map_or(-1, |inumber| inumber as i64)
    }

    pub fn open_raw(&self, path: &str, flags: u32) -> i64 {
        self.open(path, flags).map_or(-1, |handle| handle as i64)
    }

    pub fn close_raw(&self, handle: Handle) -> i64 {
        self.close(handle).map_or(-1, |()| 0)
    }

    pub fn read_raw(&self, handle: Handle, buf: &mut [u8]) -> i64 {
        self.read(handle, buf).map_or(-1, |n| n as i64)
    }

    pub fn write_raw(&self, handle: Handle, data: &[u8]) -> i64 {
        self.write(handle, data).map_or(-1, |n| n as i64)
    }
}
