// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub use sfs_err::*;

/// Metadata mapped from a resolved directory entry, the way `getattr` would
/// fill a `struct stat`.
#[derive(Debug, Clone, Copy)]
pub struct Attr {
    pub is_directory: bool,
    pub mode: u32,
    pub nlink: u32,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
}

/// Operations a single-volume filesystem core exposes to host glue.
///
/// Every operation takes an absolute, `/`-separated path and performs its
/// own resolution; there is no separate open/close handle in this API.
pub trait FileSystem {
    fn getattr(&self, path: &str) -> Result<Attr>;

    /// Names of the directory's children, `.` and `..` included, in slot
    /// order.
    fn readdir(&self, path: &str) -> Result<Vec<String>>;

    fn mkdir(&self, path: &str) -> Result<()>;

    fn rmdir(&self, path: &str) -> Result<()>;

    fn create(&self, path: &str) -> Result<()>;

    fn unlink(&self, path: &str) -> Result<()>;

    fn read(&self, path: &str, offset: u64, buffer: &mut [u8]) -> Result<u64>;

    /// Returns the number of bytes actually written; a short write on
    /// mid-operation `NoSpace` is success, not an error.
    fn write(&self, path: &str, offset: u64, buffer: &[u8]) -> Result<u64>;

    fn truncate(&self, path: &str, size: u64) -> Result<()>;
}
