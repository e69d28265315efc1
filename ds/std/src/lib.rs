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

use std::{
    fs::{File, OpenOptions},
    os::unix::fs::FileExt,
    path::Path,
};

use log::error;
use sfs_ds::{DataStorage, Error, IoError, Result};

pub struct DataStorageServer {
    file: File,
}

impl DataStorageServer {
    /// Opens an existing backing image for read-write access.
    pub fn open(file_path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(file_path)
            .map_err(|error| Error::Io(IoError::Device(error)))?;
        Ok(Self { file })
    }

    /// Creates a fresh, zero-filled backing image of exactly `len` bytes.
    ///
    /// `len` should match the core's total layout size (root region + block
    /// table + data region) so every offset the core computes stays in
    /// bounds.
    pub fn create(file_path: impl AsRef<Path>, len: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(file_path)
            .map_err(|error| Error::Io(IoError::Device(error)))?;
        file.set_len(len)
            .map_err(|error| Error::Io(IoError::Device(error)))?;
        Ok(Self { file })
    }
}

impl DataStorage for DataStorageServer {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(buffer, offset).map_err(|error| {
            error!("read at {offset} failed: {error}");
            Error::Io(IoError::Device(error))
        })
    }

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        self.file.write_all_at(buffer, offset).map_err(|error| {
            error!("write at {offset} failed: {error}");
            Error::Io(IoError::Device(error))
        })
    }
}
