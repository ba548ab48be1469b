// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Buffer and codec factory abstractions.
//!
//! The source infrastructure lets an application substitute a pool
//! allocator, a static buffer arena, or plain `malloc`/`free` behind these
//! two interfaces without the transport or client manager caring which.
//! Rust's allocator is already decoupled from these call sites, so the
//! default implementations here just heap-allocate, but the trait objects
//! stay the seam a `no_std`/pool-backed implementation would plug into.

use std::sync::Arc;

use crate::codec::BasicCodec;
use crate::message_buffer::MessageBuffer;

/// The capacity a [`DefaultBufferFactory`] hands out when none is given
/// explicitly. A configuration choice, not a protocol constant.
pub const DEFAULT_BUFFER_CAPACITY: usize = 256;

/// Creates and disposes of [`MessageBuffer`]s. `dispose` exists as a seam
/// for a pool-backed implementation to recycle storage; the default
/// implementation relies on `Drop`.
pub trait MessageBufferFactory: Send + Sync {
    fn create(&self) -> MessageBuffer;

    fn dispose(&self, _buffer: MessageBuffer) {}
}

/// Creates and disposes of [`BasicCodec`]s, each bound to a freshly created
/// buffer from a [`MessageBufferFactory`].
pub trait CodecFactory: Send + Sync {
    fn create(&self) -> BasicCodec;

    fn dispose(&self, _codec: BasicCodec) {}
}

/// Hands out fixed-capacity heap-allocated buffers.
pub struct DefaultBufferFactory {
    capacity: usize,
}

impl DefaultBufferFactory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Default for DefaultBufferFactory {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl MessageBufferFactory for DefaultBufferFactory {
    fn create(&self) -> MessageBuffer {
        MessageBuffer::with_capacity(self.capacity)
    }
}

/// Pairs a [`BasicCodec`] with buffers drawn from a [`MessageBufferFactory`].
pub struct DefaultCodecFactory {
    buffers: Arc<dyn MessageBufferFactory>,
}

impl DefaultCodecFactory {
    pub fn new(buffers: Arc<dyn MessageBufferFactory>) -> Self {
        Self { buffers }
    }
}

impl CodecFactory for DefaultCodecFactory {
    fn create(&self) -> BasicCodec {
        BasicCodec::new(self.buffers.create())
    }
}
