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

//! Maps a resolved directory entry to the `Attr` the host-facing trait
//! returns. The format stores no timestamps or permission bits of its own,
//! so these are synthesized at query time rather than round-tripped.

use sfs_iface::Attr;

use crate::dir::ResolvedEntry;

pub(crate) fn attr_of(entry: &ResolvedEntry) -> Attr {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let (mode, nlink) = if entry.is_directory() {
        (0o040_755, 2)
    } else {
        (0o100_644, 1)
    };

    Attr {
        is_directory: entry.is_directory(),
        mode,
        nlink,
        size: entry.byte_len() as u64,
        uid: unsafe { libc::getuid() },
        gid: unsafe { libc::getgid() },
        atime: now,
        mtime: now,
        ctime: now,
    }
}
