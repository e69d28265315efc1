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

//! Directory slot tables, name lookup, and path resolution.

use std::mem::MaybeUninit;

use sfs_ds::{DataStorage, Error, FsError, Result};
use zerocopy::{little_endian::U16 as LeU16, little_endian::U32 as LeU32, FromBytes, IntoBytes};

use crate::layout::{
    RawEntry, DATA_OFF, DIRECTORY, DIR_NENTRIES, ENTRY_SIZE, ROOTDIR_NENTRIES, ROOTDIR_OFF,
    SIZEMASK,
};

/// A resolved directory entry together with the absolute offset it lives
/// at, the handle every mutating operation carries forward.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ResolvedEntry {
    pub first_block: u16,
    pub size_word: u32,
    pub offset: u64,
}

impl ResolvedEntry {
    pub fn is_directory(&self) -> bool {
        self.size_word & DIRECTORY != 0
    }

    pub fn byte_len(&self) -> u32 {
        self.size_word & SIZEMASK
    }

    /// The synthetic entry `"/"` resolves to: no disk access, no backing
    /// chain, directory flag set.
    fn root() -> Self {
        Self {
            first_block: crate::layout::EMPTY,
            size_word: DIRECTORY,
            offset: ROOTDIR_OFF,
        }
    }
}

/// A directory's slot table: either the root region or a subdirectory's
/// first block.
#[derive(Clone, Copy)]
pub(crate) struct DirRegion {
    pub offset: u64,
    pub n_slots: usize,
}

impl DirRegion {
    pub fn root() -> Self {
        Self {
            offset: ROOTDIR_OFF,
            n_slots: ROOTDIR_NENTRIES,
        }
    }

    pub fn sub(first_block: u16) -> Self {
        Self {
            offset: DATA_OFF + first_block as u64 * crate::layout::BLOCK_SIZE as u64,
            n_slots: DIR_NENTRIES,
        }
    }

    pub fn slot_offset(&self, index: usize) -> u64 {
        self.offset + index as u64 * ENTRY_SIZE
    }
}

pub(crate) fn read_entry<DS: DataStorage>(ds: &DS, offset: u64) -> Result<RawEntry> {
    let mut entry: RawEntry = unsafe { MaybeUninit::uninit().assume_init() };
    ds.read(offset, entry.as_mut_bytes())?;
    Ok(entry)
}

fn write_entry<DS: DataStorage>(ds: &DS, offset: u64, entry: &RawEntry) -> Result<()> {
    ds.write(offset, entry.as_bytes())
}

/// Linear scan for a slot whose `filename` matches `name`. Names are
/// unique within one directory, so the first match is the only match.
pub(crate) fn lookup_in_dir<DS: DataStorage>(
    ds: &DS,
    region: &DirRegion,
    name: &str,
) -> Result<ResolvedEntry> {
    for index in 0..region.n_slots {
        let offset = region.slot_offset(index);
        let entry = read_entry(ds, offset)?;
        if !entry.is_free() && entry.name_bytes() == name.as_bytes() {
            return Ok(ResolvedEntry {
                first_block: entry.first_block.get(),
                size_word: entry.size.get(),
                offset,
            });
        }
    }
    Err(Error::Fs(FsError::NotFound))
}

/// Linear scan for the first slot whose `filename` starts with NUL.
pub(crate) fn find_free_slot<DS: DataStorage>(ds: &DS, region: &DirRegion) -> Result<u64> {
    for index in 0..region.n_slots {
        let offset = region.slot_offset(index);
        let entry = read_entry(ds, offset)?;
        if entry.is_free() {
            return Ok(offset);
        }
    }
    Err(Error::Fs(FsError::NoSpace))
}

/// True iff every slot's `filename` starts with NUL.
pub(crate) fn is_empty<DS: DataStorage>(ds: &DS, region: &DirRegion) -> Result<bool> {
    for index in 0..region.n_slots {
        let entry = read_entry(ds, region.slot_offset(index))?;
        if !entry.is_free() {
            return Ok(false);
        }
    }
    Ok(true)
}

pub(crate) fn install_entry<DS: DataStorage>(
    ds: &DS,
    slot_offset: u64,
    name: &str,
    first_block: u16,
    size_word: u32,
) -> Result<()> {
    let mut entry = RawEntry::free();
    entry.filename[..name.len()].copy_from_slice(name.as_bytes());
    entry.first_block = LeU16::new(first_block);
    entry.size = LeU32::new(size_word);
    write_entry(ds, slot_offset, &entry)
}

pub(crate) fn clear_entry<DS: DataStorage>(ds: &DS, slot_offset: u64) -> Result<()> {
    write_entry(ds, slot_offset, &RawEntry::free())
}

/// Overwrites the `first_block`/`size` fields of an already-resolved entry,
/// preserving its name. Used by write/truncate after a chain mutation.
pub(crate) fn update_entry<DS: DataStorage>(
    ds: &DS,
    offset: u64,
    first_block: u16,
    size_word: u32,
) -> Result<()> {
    let mut entry = read_entry(ds, offset)?;
    entry.first_block = LeU16::new(first_block);
    entry.size = LeU32::new(size_word);
    write_entry(ds, offset, &entry)
}

/// Splits an absolute path into (parent path, final component), rejecting
/// components that don't fit the on-disk filename field.
pub(crate) fn split_parent(path: &str) -> Result<(&str, &str)> {
    let last_slash = path
        .rfind('/')
        .ok_or(Error::Fs(FsError::NotFound))?;
    let final_component = &path[last_slash + 1..];
    if final_component.is_empty() {
        return Err(Error::Fs(FsError::NotFound));
    }
    if final_component.len() > crate::layout::FILENAME_MAX - 1 {
        return Err(Error::Fs(FsError::NameTooLong));
    }
    let parent_path = if last_slash == 0 {
        "/"
    } else {
        &path[..last_slash]
    };
    Ok((parent_path, final_component))
}

/// Resolves an absolute path to its entry and the entry's absolute disk
/// offset. `"/"` is handled without any disk access; every other path is
/// composed of single-directory lookups from the root downward.
pub(crate) fn resolve<DS: DataStorage>(ds: &DS, path: &str) -> Result<ResolvedEntry> {
    if path == "/" {
        return Ok(ResolvedEntry::root());
    }

    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    if components.is_empty() {
        return Err(Error::Fs(FsError::NotFound));
    }

    let mut region = DirRegion::root();
    let mut entry = None;
    let last = components.len() - 1;
    for (index, component) in components.iter().enumerate() {
        let found = lookup_in_dir(ds, &region, component)?;
        if index != last {
            if !found.is_directory() {
                return Err(Error::Fs(FsError::NotDirectory));
            }
            region = DirRegion::sub(found.first_block);
        }
        entry = Some(found);
    }
    entry.ok_or(Error::Fs(FsError::NotFound))
}

/// Resolves the directory region a directory entry's slot array lives in:
/// the root region for `"/"`, else the entry's own two-block chain.
pub(crate) fn region_of(path: &str, entry: &ResolvedEntry) -> DirRegion {
    if path == "/" {
        DirRegion::root()
    } else {
        DirRegion::sub(entry.first_block)
    }
}

/// Every non-empty slot's name, in slot order, with the standard `.`/`..`
/// entries synthesized ahead of them — the format stores neither, so a
/// caller-facing listing has to add them itself.
pub(crate) fn list_names<DS: DataStorage>(ds: &DS, region: &DirRegion) -> Result<Vec<String>> {
    let mut names = vec![".".to_string(), "..".to_string()];
    for index in 0..region.n_slots {
        let entry = read_entry(ds, region.slot_offset(index))?;
        if !entry.is_free() {
            names.push(String::from_utf8_lossy(entry.name_bytes()).into_owned());
        }
    }
    Ok(names)
}
