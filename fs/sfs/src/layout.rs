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

//! On-disk format constants and the packed directory entry record.
//!
//! Unlike FAT/exFAT/NTFS, this format carries no boot sector: every offset
//! below is a compile-time constant, and an image is only ever valid for
//! one build of this crate.

use std::mem::size_of;

use zerocopy::{
    little_endian::{U16, U32},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

/// Bytes per data block.
pub const BLOCK_SIZE: usize = 512;
/// Maximum filename length including the NUL terminator.
pub const FILENAME_MAX: usize = 28;
/// Slot count of the root directory region.
pub const ROOTDIR_NENTRIES: usize = 64;
/// Slot count of every non-root directory's slot array. A subdirectory's
/// slots live in a single data block, so this is `BLOCK_SIZE / ENTRY_SIZE`
/// rounded down (15, not the rounder 16, to avoid spilling into the next
/// block in the chain).
pub const DIR_NENTRIES: usize = 15;
/// Number of entries in the block table, one per data block.
pub const BLOCKTBL_NENTRIES: usize = 4096;

/// Block index sentinel: slot/block unused.
pub const EMPTY: u16 = 0xFFFF;
/// Block index sentinel: chain tail.
pub const END: u16 = 0xFFFE;

/// High bit of the `size` word: entry is a directory.
pub const DIRECTORY: u32 = 0x8000_0000;
/// Low bits of the `size` word: file length in bytes.
pub const SIZEMASK: u32 = 0x7FFF_FFFF;

pub const ENTRY_SIZE: u64 = size_of::<RawEntry>() as u64;

pub const ROOTDIR_OFF: u64 = 0;
pub const ROOTDIR_SIZE: u64 = ROOTDIR_NENTRIES as u64 * ENTRY_SIZE;
pub const BLOCKTBL_OFF: u64 = ROOTDIR_OFF + ROOTDIR_SIZE;
pub const BLOCKTBL_SIZE: u64 = BLOCKTBL_NENTRIES as u64 * size_of::<u16>() as u64;
pub const DATA_OFF: u64 = BLOCKTBL_OFF + BLOCKTBL_SIZE;
pub const DATA_SIZE: u64 = BLOCKTBL_NENTRIES as u64 * BLOCK_SIZE as u64;
/// Total size a backing image must have for every offset above to stay in
/// bounds.
pub const IMAGE_SIZE: u64 = DATA_OFF + DATA_SIZE;

/// A directory entry, packed on disk exactly as spec'd: a NUL-padded name,
/// the head block of the entry's chain (or `EMPTY`/`END`), and a size word
/// whose high bit doubles as the directory flag.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct RawEntry {
    pub filename: [u8; FILENAME_MAX],
    pub first_block: U16,
    pub size: U32,
}

impl RawEntry {
    /// A cleared slot: empty name, no chain, zero size.
    pub const fn free() -> Self {
        Self {
            filename: [0; FILENAME_MAX],
            first_block: U16::new(EMPTY),
            size: U32::new(0),
        }
    }

    pub fn name_len(&self) -> usize {
        self.filename
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.filename.len())
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.filename[..self.name_len()]
    }

    pub fn is_free(&self) -> bool {
        self.filename[0] == 0
    }
}
