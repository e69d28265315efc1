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

//! A single-volume filesystem: a fixed root directory region, a block
//! allocation table, and a contiguous data region, all at compile-time
//! offsets.

mod attr;
mod block;
mod dir;
mod file;
mod layout;

use log::{debug, error};
use sfs_ds::{DataStorage, Error, FsError, Result};
use sfs_iface::{Attr, FileSystem};

use block::BlockTable;
use layout::{DIRECTORY, IMAGE_SIZE};

/// Binds the on-disk layout to a backing [`DataStorage`] device.
pub struct Sfs<DS: DataStorage> {
    ds: DS,
}

impl<DS: DataStorage> Sfs<DS> {
    /// Lays out a fresh, empty filesystem: clears the root directory region
    /// and marks every data block free. Does not size or zero the data
    /// region itself; callers format onto a device already sized to at
    /// least [`IMAGE_SIZE`].
    pub fn format(ds: DS) -> Result<Self> {
        debug!("formatting volume, image size {IMAGE_SIZE} bytes");
        let region = dir::DirRegion::root();
        for index in 0..region.n_slots {
            dir::clear_entry(&ds, region.slot_offset(index))?;
        }
        BlockTable(&ds).format()?;
        Ok(Self { ds })
    }

    /// Opens an already-formatted volume without touching its contents.
    pub fn open(ds: DS) -> Result<Self> {
        Ok(Self { ds })
    }
}

impl<DS: DataStorage> FileSystem for Sfs<DS> {
    fn getattr(&self, path: &str) -> Result<Attr> {
        let entry = dir::resolve(&self.ds, path)?;
        Ok(attr::attr_of(&entry))
    }

    fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let entry = dir::resolve(&self.ds, path)?;
        if !entry.is_directory() {
            return Err(Error::Fs(FsError::NotDirectory));
        }
        let region = dir::region_of(path, &entry);
        dir::list_names(&self.ds, &region)
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        if path == "/" {
            return Err(Error::Fs(FsError::Exists));
        }
        let (parent_path, name) = dir::split_parent(path)?;
        let parent = dir::resolve(&self.ds, parent_path)?;
        if !parent.is_directory() {
            return Err(Error::Fs(FsError::NotDirectory));
        }
        let parent_region = dir::region_of(parent_path, &parent);

        if dir::lookup_in_dir(&self.ds, &parent_region, name).is_ok() {
            return Err(Error::Fs(FsError::Exists));
        }
        let table = BlockTable(&self.ds);
        let first_block = table.allocate_one()?;
        // Commit b1 before asking for b2, so the second scan can't return
        // the same index; on b2 failure, release it back rather than leak it.
        table.terminate(first_block)?;
        let second_block = match table.allocate_one() {
            Ok(block) => block,
            Err(error) => {
                table.free_chain(first_block)?;
                return Err(error);
            }
        };
        table.link(first_block, second_block)?;
        table.terminate(second_block)?;

        let sub = dir::DirRegion::sub(first_block);
        for index in 0..sub.n_slots {
            dir::clear_entry(&self.ds, sub.slot_offset(index))?;
        }

        let slot = match dir::find_free_slot(&self.ds, &parent_region) {
            Ok(slot) => slot,
            Err(error) => {
                table.free_chain(first_block)?;
                return Err(error);
            }
        };
        dir::install_entry(&self.ds, slot, name, first_block, DIRECTORY)
    }

    fn rmdir(&self, path: &str) -> Result<()> {
        if path == "/" {
            return Err(Error::Fs(FsError::Busy));
        }
        let (parent_path, name) = dir::split_parent(path)?;
        let parent = dir::resolve(&self.ds, parent_path)?;
        if !parent.is_directory() {
            return Err(Error::Fs(FsError::NotDirectory));
        }
        let parent_region = dir::region_of(parent_path, &parent);
        let entry = dir::lookup_in_dir(&self.ds, &parent_region, name)?;
        if !entry.is_directory() {
            return Err(Error::Fs(FsError::NotDirectory));
        }

        let sub = dir::DirRegion::sub(entry.first_block);
        if !dir::is_empty(&self.ds, &sub)? {
            return Err(Error::Fs(FsError::NotEmpty));
        }

        BlockTable(&self.ds).free_chain(entry.first_block)?;
        dir::clear_entry(&self.ds, entry.offset)?;
        debug!("removed directory {path}");
        Ok(())
    }

    fn create(&self, path: &str) -> Result<()> {
        if path == "/" {
            return Err(Error::Fs(FsError::Exists));
        }
        let (parent_path, name) = dir::split_parent(path)?;
        let parent = dir::resolve(&self.ds, parent_path)?;
        if !parent.is_directory() {
            return Err(Error::Fs(FsError::NotDirectory));
        }
        let parent_region = dir::region_of(parent_path, &parent);

        if dir::lookup_in_dir(&self.ds, &parent_region, name).is_ok() {
            return Err(Error::Fs(FsError::Exists));
        }
        let slot = dir::find_free_slot(&self.ds, &parent_region)?;
        dir::install_entry(&self.ds, slot, name, layout::END, 0)
    }

    fn unlink(&self, path: &str) -> Result<()> {
        let (parent_path, name) = dir::split_parent(path)?;
        let parent = dir::resolve(&self.ds, parent_path)?;
        if !parent.is_directory() {
            return Err(Error::Fs(FsError::NotDirectory));
        }
        let parent_region = dir::region_of(parent_path, &parent);
        let entry = dir::lookup_in_dir(&self.ds, &parent_region, name)?;
        if entry.is_directory() {
            return Err(Error::Fs(FsError::IsDirectory));
        }

        BlockTable(&self.ds).free_chain(entry.first_block)?;
        dir::clear_entry(&self.ds, entry.offset)?;
        debug!("unlinked {path}");
        Ok(())
    }

    fn read(&self, path: &str, offset: u64, buffer: &mut [u8]) -> Result<u64> {
        let entry = dir::resolve(&self.ds, path)?;
        if entry.is_directory() {
            return Err(Error::Fs(FsError::IsDirectory));
        }
        file::read(&self.ds, &entry, offset, buffer)
    }

    fn write(&self, path: &str, offset: u64, buffer: &[u8]) -> Result<u64> {
        let entry = dir::resolve(&self.ds, path)?;
        if entry.is_directory() {
            return Err(Error::Fs(FsError::IsDirectory));
        }
        if offset.saturating_add(buffer.len() as u64) > layout::SIZEMASK as u64 {
            error!("write at {path} would exceed maximum file size");
            return Err(Error::Fs(FsError::FileTooBig));
        }
        file::write(&self.ds, &entry, offset, buffer)
    }

    fn truncate(&self, path: &str, size: u64) -> Result<()> {
        let entry = dir::resolve(&self.ds, path)?;
        if entry.is_directory() {
            return Err(Error::Fs(FsError::IsDirectory));
        }
        file::truncate(&self.ds, &entry, size)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use sfs_ds::{DataStorage, Result};

    use super::*;
    use crate::layout::{BLOCK_SIZE, IMAGE_SIZE};

    struct MemStorage(RefCell<Vec<u8>>);

    impl MemStorage {
        fn new() -> Self {
            Self(RefCell::new(vec![0u8; IMAGE_SIZE as usize]))
        }
    }

    impl DataStorage for MemStorage {
        fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
            let storage = self.0.borrow();
            let start = offset as usize;
            buffer.copy_from_slice(&storage[start..start + buffer.len()]);
            Ok(())
        }

        fn write(&self, offset: u64, buffer: &[u8]) -> Result<()> {
            let mut storage = self.0.borrow_mut();
            let start = offset as usize;
            storage[start..start + buffer.len()].copy_from_slice(buffer);
            Ok(())
        }
    }

    fn fresh() -> Sfs<MemStorage> {
        Sfs::format(MemStorage::new()).unwrap()
    }

    #[test]
    fn root_starts_empty() {
        let fs = fresh();
        assert_eq!(
            fs.readdir("/").unwrap(),
            vec![".".to_string(), "..".to_string()]
        );
    }

    #[test]
    fn create_and_read_write_round_trip() {
        let fs = fresh();
        fs.create("/a.txt").unwrap();
        assert_eq!(
            fs.readdir("/").unwrap(),
            vec![".".to_string(), "..".to_string(), "a.txt".to_string()]
        );

        let written = fs.write("/a.txt", 0, b"hello world").unwrap();
        assert_eq!(written, 11);

        let mut buffer = [0u8; 11];
        let read = fs.read("/a.txt", 0, &mut buffer).unwrap();
        assert_eq!(read, 11);
        assert_eq!(&buffer, b"hello world");

        let attr = fs.getattr("/a.txt").unwrap();
        assert_eq!(attr.size, 11);
        assert!(!attr.is_directory);
    }

    #[test]
    fn write_spanning_multiple_blocks_then_read_back() {
        let fs = fresh();
        fs.create("/big.bin").unwrap();

        let payload: Vec<u8> = (0..(BLOCK_SIZE * 3 + 17))
            .map(|i| (i % 251) as u8)
            .collect();
        let written = fs.write("/big.bin", 0, &payload).unwrap();
        assert_eq!(written as usize, payload.len());

        let mut readback = vec![0u8; payload.len()];
        let read = fs.read("/big.bin", 0, &mut readback).unwrap();
        assert_eq!(read as usize, payload.len());
        assert_eq!(readback, payload);
    }

    #[test]
    fn truncate_grows_with_zero_fill() {
        let fs = fresh();
        fs.create("/f").unwrap();
        fs.write("/f", 0, b"ab").unwrap();
        fs.truncate("/f", (BLOCK_SIZE + 10) as u64).unwrap();

        let mut buffer = vec![0u8; BLOCK_SIZE + 10];
        fs.read("/f", 0, &mut buffer).unwrap();
        assert_eq!(&buffer[0..2], b"ab");
        assert!(buffer[2..].iter().all(|&b| b == 0));

        let attr = fs.getattr("/f").unwrap();
        assert_eq!(attr.size, (BLOCK_SIZE + 10) as u64);
    }

    #[test]
    fn truncate_shrinks_and_frees_blocks() {
        let fs = fresh();
        fs.create("/f").unwrap();
        let payload = vec![7u8; BLOCK_SIZE * 2 + 5];
        fs.write("/f", 0, &payload).unwrap();

        fs.truncate("/f", 3).unwrap();
        let attr = fs.getattr("/f").unwrap();
        assert_eq!(attr.size, 3);

        let mut buffer = [0u8; 3];
        fs.read("/f", 0, &mut buffer).unwrap();
        assert_eq!(&buffer, &[7, 7, 7]);
    }

    #[test]
    fn mkdir_rmdir_and_nested_paths() {
        let fs = fresh();
        fs.mkdir("/sub").unwrap();
        assert!(fs.getattr("/sub").unwrap().is_directory);

        fs.create("/sub/inner.txt").unwrap();
        fs.write("/sub/inner.txt", 0, b"x").unwrap();
        assert_eq!(
            fs.readdir("/sub").unwrap(),
            vec![".".to_string(), "..".to_string(), "inner.txt".to_string()]
        );

        assert!(matches!(
            fs.rmdir("/sub"),
            Err(Error::Fs(FsError::NotEmpty))
        ));

        fs.unlink("/sub/inner.txt").unwrap();
        fs.rmdir("/sub").unwrap();
        assert_eq!(
            fs.readdir("/").unwrap(),
            vec![".".to_string(), "..".to_string()]
        );
    }

    #[test]
    fn create_duplicate_name_fails() {
        let fs = fresh();
        fs.create("/dup").unwrap();
        assert!(matches!(fs.create("/dup"), Err(Error::Fs(FsError::Exists))));
    }

    #[test]
    fn read_past_end_of_file_yields_zero() {
        let fs = fresh();
        fs.create("/f").unwrap();
        fs.write("/f", 0, b"abc").unwrap();

        let mut buffer = [0u8; 8];
        let read = fs.read("/f", 3, &mut buffer).unwrap();
        assert_eq!(read, 0);
    }

    #[test]
    fn unlink_missing_file_fails_not_found() {
        let fs = fresh();
        assert!(matches!(
            fs.unlink("/missing"),
            Err(Error::Fs(FsError::NotFound))
        ));
    }

    #[test]
    fn rmdir_root_is_busy() {
        let fs = fresh();
        assert!(matches!(fs.rmdir("/"), Err(Error::Fs(FsError::Busy))));
    }

    #[test]
    fn mkdir_name_too_long_fails() {
        let fs = fresh();
        let name = "/".to_string() + &"x".repeat(crate::layout::FILENAME_MAX);
        assert!(matches!(
            fs.mkdir(&name),
            Err(Error::Fs(FsError::NameTooLong))
        ));
    }

    #[test]
    fn truncate_same_size_twice_is_idempotent() {
        let fs = fresh();
        fs.create("/f").unwrap();
        fs.write("/f", 0, b"hello").unwrap();
        fs.truncate("/f", 5).unwrap();
        fs.truncate("/f", 5).unwrap();
        assert_eq!(fs.getattr("/f").unwrap().size, 5);
        let mut buffer = [0u8; 5];
        fs.read("/f", 0, &mut buffer).unwrap();
        assert_eq!(&buffer, b"hello");
    }

    #[test]
    fn truncate_to_zero_frees_head_block() {
        let fs = fresh();
        fs.create("/f").unwrap();
        fs.write("/f", 0, b"hello").unwrap();
        fs.truncate("/f", 0).unwrap();
        assert_eq!(fs.getattr("/f").unwrap().size, 0);

        let mut buffer = [0u8; 1];
        assert_eq!(fs.read("/f", 0, &mut buffer).unwrap(), 0);
    }

    #[test]
    fn write_after_truncate_to_zero_resets_size() {
        let fs = fresh();
        fs.create("/f").unwrap();
        fs.write("/f", 0, b"hello").unwrap();
        fs.truncate("/f", 0).unwrap();
        let written = fs.write("/f", 0, b"hi").unwrap();
        assert_eq!(written, 2);
        assert_eq!(fs.getattr("/f").unwrap().size, 2);
    }

    #[test]
    fn read_crossing_block_boundary_matches_split_reads() {
        let fs = fresh();
        fs.create("/f").unwrap();
        let payload: Vec<u8> = (0..(BLOCK_SIZE * 2)).map(|i| (i % 256) as u8).collect();
        fs.write("/f", 0, &payload).unwrap();

        let mut whole = vec![0u8; payload.len()];
        fs.read("/f", 0, &mut whole).unwrap();

        let split_at = BLOCK_SIZE - 3;
        let mut first = vec![0u8; split_at];
        let mut second = vec![0u8; payload.len() - split_at];
        fs.read("/f", 0, &mut first).unwrap();
        fs.read("/f", split_at as u64, &mut second).unwrap();

        assert_eq!(&whole[..split_at], &first[..]);
        assert_eq!(&whole[split_at..], &second[..]);
    }

    #[test]
    fn mkdir_on_existing_name_fails_exists() {
        let fs = fresh();
        fs.mkdir("/sub").unwrap();
        assert!(matches!(fs.mkdir("/sub"), Err(Error::Fs(FsError::Exists))));
    }

    #[test]
    fn mkdir_with_one_free_block_fails_nospace_and_leaves_table_unchanged() {
        use crate::layout::BLOCKTBL_NENTRIES;

        let fs = fresh();
        fs.create("/big").unwrap();
        let almost_all = (BLOCKTBL_NENTRIES - 1) * BLOCK_SIZE;
        fs.truncate("/big", almost_all as u64).unwrap();

        assert!(matches!(fs.mkdir("/d"), Err(Error::Fs(FsError::NoSpace))));

        // the single remaining free block is still free and allocatable,
        // proving the failed mkdir didn't consume or leak it.
        fs.truncate("/big", (almost_all + BLOCK_SIZE) as u64)
            .unwrap();
    }

    #[test]
    fn mkdir_allocates_a_two_block_chain() {
        let fs = fresh();
        fs.mkdir("/d").unwrap();
        // a subdirectory's chain holds exactly two blocks: the slot table
        // plus a reserved second block, per the on-disk format.
        fs.create("/d/a").unwrap();
        fs.create("/d/b").unwrap();
        assert_eq!(
            fs.readdir("/d").unwrap(),
            vec![
                ".".to_string(),
                "..".to_string(),
                "a".to_string(),
                "b".to_string()
            ]
        );
    }

    #[test]
    fn nested_path_through_non_directory_fails() {
        let fs = fresh();
        fs.create("/f").unwrap();
        assert!(matches!(
            fs.create("/f/inner"),
            Err(Error::Fs(FsError::NotDirectory))
        ));
    }

    #[test]
    fn unlink_through_non_directory_parent_fails() {
        let fs = fresh();
        fs.create("/f").unwrap();
        assert!(matches!(
            fs.unlink("/f/x"),
            Err(Error::Fs(FsError::NotDirectory))
        ));
    }

    #[test]
    fn rmdir_through_non_directory_parent_fails() {
        let fs = fresh();
        fs.create("/f").unwrap();
        assert!(matches!(
            fs.rmdir("/f/x"),
            Err(Error::Fs(FsError::NotDirectory))
        ));
    }

    #[test]
    fn mkdir_root_fails_exists() {
        let fs = fresh();
        assert!(matches!(fs.mkdir("/"), Err(Error::Fs(FsError::Exists))));
    }

    #[test]
    fn create_root_fails_exists() {
        let fs = fresh();
        assert!(matches!(fs.create("/"), Err(Error::Fs(FsError::Exists))));
    }
}
