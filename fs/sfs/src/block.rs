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

//! Free/used/end-of-chain state of every data block.
//!
//! `allocate_one` hands back a raw free index without committing any state;
//! the caller decides whether the block becomes a head, an interior link,
//! or a tail, and writes the table slot accordingly.

use std::mem::{size_of, MaybeUninit};

use log::{debug, trace};
use sfs_ds::{DataStorage, Error, FsError, Result};
use zerocopy::{little_endian::U16, FromBytes, IntoBytes};

use crate::layout::{BLOCKTBL_NENTRIES, BLOCKTBL_OFF, EMPTY, END};

pub(crate) struct BlockTable<'ds, DS: DataStorage>(pub &'ds DS);

impl<'ds, DS: DataStorage> BlockTable<'ds, DS> {
    fn slot_offset(index: u16) -> u64 {
        BLOCKTBL_OFF + index as u64 * size_of::<u16>() as u64
    }

    fn read_slot(&self, index: u16) -> Result<u16> {
        let mut raw: U16 = unsafe { MaybeUninit::uninit().assume_init() };
        self.0.read(Self::slot_offset(index), raw.as_mut_bytes())?;
        Ok(raw.get())
    }

    fn write_slot(&self, index: u16, value: u16) -> Result<()> {
        let raw = U16::new(value);
        self.0.write(Self::slot_offset(index), raw.as_bytes())
    }

    /// Scans from index 0 for the first `EMPTY` slot. Does not mutate the
    /// table: the caller commits the slot's new role.
    pub fn allocate_one(&self) -> Result<u16> {
        for index in 0..BLOCKTBL_NENTRIES as u16 {
            if self.read_slot(index)? == EMPTY {
                trace!("block {index} available");
                return Ok(index);
            }
        }
        Err(Error::Fs(FsError::NoSpace))
    }

    /// Traverses `head`, `T[head]`, `T[T[head]]`, ... stopping before `END`.
    /// `head == END` (or `EMPTY`) yields an empty sequence.
    pub fn walk_chain(&self, head: u16) -> ChainWalk<'_, 'ds, DS> {
        ChainWalk {
            table: self,
            next: head,
        }
    }

    /// Frees every block reachable from `head`. A no-op for `head == END`
    /// or `head == EMPTY`. Iterative, not recursive.
    pub fn free_chain(&self, head: u16) -> Result<()> {
        let mut current = head;
        while current != END && current != EMPTY {
            let next = self.read_slot(current)?;
            self.write_slot(current, EMPTY)?;
            debug!("freed block {current}");
            current = next;
        }
        Ok(())
    }

    /// Reads `T[b]` without consuming it through an iterator, for callers
    /// that need to inspect one hop at a time (truncate's shrink/grow).
    pub fn next_of(&self, b: u16) -> Result<u16> {
        self.read_slot(b)
    }

    /// Writes `b` into `T[a]`, appending `b` after `a`.
    pub fn link(&self, a: u16, b: u16) -> Result<()> {
        self.write_slot(a, b)
    }

    /// Writes `END` into `T[b]`.
    pub fn terminate(&self, b: u16) -> Result<()> {
        self.write_slot(b, END)
    }

    /// Writes `EMPTY` into every table slot, the starting state for a
    /// freshly formatted image.
    pub(crate) fn format(&self) -> Result<()> {
        for index in 0..BLOCKTBL_NENTRIES as u16 {
            self.write_slot(index, EMPTY)?;
        }
        Ok(())
    }
}

pub(crate) struct ChainWalk<'a, 'ds, DS: DataStorage> {
    table: &'a BlockTable<'ds, DS>,
    next: u16,
}

impl<'a, 'ds, DS: DataStorage> Iterator for ChainWalk<'a, 'ds, DS> {
    type Item = Result<u16>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == END || self.next == EMPTY {
            return None;
        }

        let current = self.next;
        match self.table.read_slot(current) {
            Ok(next) => {
                self.next = next;
                Some(Ok(current))
            }
            Err(error) => {
                self.next = END;
                Some(Err(error))
            }
        }
    }
}
