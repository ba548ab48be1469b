// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Runtime core of an embedded RPC framework: message framing, the wire
//! codec, a client manager with an optional transport arbitrator, and a
//! server dispatch loop.
//!
//! This crate is the language-agnostic contract layer only. IDL parsing,
//! generated stub code, and concrete link-layer transports (UART, SPI,
//! RPMsg, TCP device glue) are out of scope; downstream crates implement
//! [`transport::Transport`] and [`server::Service`] on top of this one.
//!
//! ## Frame on the wire
//!
//! ```text
//! offset  size  field
//! 0       2     message_size     (u16, native endian, = N)
//! 2       2     crc16            (u16, native endian, over the N payload bytes)
//! 4       N     payload          (message header + codec-encoded body)
//! ```
//!
//! The message header inside the payload is 8 bytes: a `u32` packing
//! `[version:8 | service_id:8 | request_id:8 | message_type:8]`, followed
//! by a `u32` sequence number. Both the frame header and the message header
//! are written in the platform's native byte order. This protocol assumes
//! homogeneous endianness between peers and does not negotiate otherwise.

pub mod client;
pub mod codec;
pub mod crc;
pub mod error;
pub mod factory;
pub mod message_buffer;
pub mod server;
pub mod sync;
pub mod transport;

pub use client::{ArbitratedClientManager, ClientManager, RequestContext};
pub use codec::{BasicCodec, MessageHeader, MessageType};
pub use error::{Error, Result, Status};
pub use factory::{CodecFactory, DefaultBufferFactory, DefaultCodecFactory, MessageBufferFactory};
pub use message_buffer::MessageBuffer;
pub use server::{Service, SimpleServer};
pub use transport::arbitrator::{ClientToken, TransportArbitrator};
pub use transport::framed::FramedTransport;
pub use transport::Transport;
