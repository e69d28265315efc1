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

//! Byte-range read/write/truncate against a file's block chain.

use std::cmp::{min, Ordering};

use sfs_ds::{DataStorage, Error, FsError, Result};

use crate::block::BlockTable;
use crate::dir::{self, ResolvedEntry};
use crate::layout::{BLOCK_SIZE, DATA_OFF, END, SIZEMASK};

fn block_offset(block: u16) -> u64 {
    DATA_OFF + block as u64 * BLOCK_SIZE as u64
}

fn blocks_for(size: u64) -> usize {
    ((size + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64) as usize
}

/// Reads up to `buffer.len()` bytes starting at `offset`, clamped to the
/// file's size. Returns the number of bytes actually produced.
pub(crate) fn read<DS: DataStorage>(
    ds: &DS,
    entry: &ResolvedEntry,
    offset: u64,
    buffer: &mut [u8],
) -> Result<u64> {
    let size = entry.byte_len() as u64;
    if offset >= size {
        return Ok(0);
    }
    let n = min(buffer.len() as u64, size - offset) as usize;

    let table = BlockTable(ds);
    let mut chain = table.walk_chain(entry.first_block);

    let Some(first) = chain.next() else {
        return Ok(0);
    };
    let mut block = first?;
    let mut remaining_offset = offset;
    while remaining_offset >= BLOCK_SIZE as u64 {
        let Some(next) = chain.next() else {
            return Ok(0);
        };
        block = next?;
        remaining_offset -= BLOCK_SIZE as u64;
    }

    let mut produced = 0usize;
    let mut block_off = remaining_offset as usize;
    loop {
        let can_read = min(BLOCK_SIZE - block_off, n - produced);
        ds.read(
            block_offset(block) + block_off as u64,
            &mut buffer[produced..produced + can_read],
        )?;
        produced += can_read;
        if produced >= n {
            break;
        }
        block_off = 0;
        match chain.next() {
            Some(Ok(next)) => block = next,
            Some(Err(error)) => return Err(error),
            None => break,
        }
    }
    Ok(produced as u64)
}

/// Writes `buffer` at `offset`, growing the chain as needed. A mid-write
/// allocation failure stops the write and returns the partial count as a
/// success, matching a POSIX short write; an allocation failure while still
/// walking to the starting offset (no bytes written yet) is a hard
/// `NoSpace` error.
pub(crate) fn write<DS: DataStorage>(
    ds: &DS,
    entry: &ResolvedEntry,
    offset: u64,
    buffer: &[u8],
) -> Result<u64> {
    let table = BlockTable(ds);
    let current_size = entry.byte_len() as u64;

    let mut head = entry.first_block;
    if head == END {
        let new_head = table.allocate_one()?;
        table.terminate(new_head)?;
        head = new_head;
    }

    let blocks_to_skip = (offset / BLOCK_SIZE as u64) as usize;
    let mut current = head;
    for _ in 0..blocks_to_skip {
        let next = table.next_of(current)?;
        current = if next == END {
            let new_block = table.allocate_one()?;
            table.link(current, new_block)?;
            table.terminate(new_block)?;
            new_block
        } else {
            next
        };
    }

    let block_base = blocks_to_skip as u64 * BLOCK_SIZE as u64;
    let mut block_off = (offset - block_base) as usize;
    let mut written = 0usize;
    loop {
        let can_write = min(BLOCK_SIZE - block_off, buffer.len() - written);
        ds.write(
            block_offset(current) + block_off as u64,
            &buffer[written..written + can_write],
        )?;
        written += can_write;
        if written >= buffer.len() {
            break;
        }
        block_off = 0;

        let next = table.next_of(current)?;
        if next == END {
            match table.allocate_one() {
                Ok(new_block) => {
                    table.link(current, new_block)?;
                    table.terminate(new_block)?;
                    current = new_block;
                }
                Err(Error::Fs(FsError::NoSpace)) => break,
                Err(error) => return Err(error),
            }
        } else {
            current = next;
        }
    }

    let new_extent = offset + written as u64;
    if new_extent > current_size {
        dir::update_entry(ds, entry.offset, head, new_extent as u32)?;
    } else if head != entry.first_block {
        // head was established but the write somehow did not extend size
        // (empty buffer): persist the newly allocated chain anyway.
        dir::update_entry(ds, entry.offset, head, entry.size_word)?;
    }

    Ok(written as u64)
}

/// Grows or shrinks a file's block chain to `new_size` and persists the
/// updated size (the directory bit, always clear for files, is preserved
/// implicitly since it is never set here).
pub(crate) fn truncate<DS: DataStorage>(
    ds: &DS,
    entry: &ResolvedEntry,
    new_size: u64,
) -> Result<()> {
    if new_size > SIZEMASK as u64 {
        return Err(Error::Fs(FsError::FileTooBig));
    }

    let current_size = entry.byte_len() as u64;
    let table = BlockTable(ds);

    let new_first_block = match new_size.cmp(&current_size) {
        Ordering::Less => shrink(&table, entry.first_block, new_size)?,
        Ordering::Greater => grow(ds, &table, entry.first_block, current_size, new_size)?,
        Ordering::Equal => entry.first_block,
    };

    dir::update_entry(ds, entry.offset, new_first_block, new_size as u32)
}

/// Walks to the block that becomes the new tail, frees everything beyond
/// it, and terminates it. Shrinking to zero frees the head itself.
fn shrink<DS: DataStorage>(table: &BlockTable<DS>, head: u16, new_size: u64) -> Result<u16> {
    let blocks_needed = blocks_for(new_size);
    if blocks_needed == 0 {
        table.free_chain(head)?;
        return Ok(END);
    }

    let mut tail = head;
    for _ in 0..blocks_needed - 1 {
        tail = table.next_of(tail)?;
    }
    let successor = table.next_of(tail)?;
    if successor != END {
        table.free_chain(successor)?;
    }
    table.terminate(tail)?;
    Ok(head)
}

/// Establishes a head if the chain is empty, then extends the chain one
/// zero-filled block at a time until it holds `ceil(new_size / BLOCK_SIZE)`
/// blocks.
fn grow<DS: DataStorage>(
    ds: &DS,
    table: &BlockTable<DS>,
    head: u16,
    current_size: u64,
    new_size: u64,
) -> Result<u16> {
    let blocks_needed = blocks_for(new_size);

    let (new_first_block, mut tail, mut blocks_have) = if head == END {
        let new_head = table.allocate_one()?;
        ds.write(block_offset(new_head), &[0u8; BLOCK_SIZE])?;
        (new_head, new_head, 1usize)
    } else {
        let mut tail = head;
        loop {
            let next = table.next_of(tail)?;
            if next == END {
                break;
            }
            tail = next;
        }
        (head, tail, blocks_for(current_size))
    };

    while blocks_have < blocks_needed {
        let new_block = table.allocate_one()?;
        table.link(tail, new_block)?;
        ds.write(block_offset(new_block), &[0u8; BLOCK_SIZE])?;
        tail = new_block;
        blocks_have += 1;
    }
    table.terminate(tail)?;

    Ok(new_first_block)
}
