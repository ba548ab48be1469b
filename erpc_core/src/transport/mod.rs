// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

pub mod arbitrator;
pub mod framed;
pub mod pipe;

use crate::error::Error;
use crate::message_buffer::MessageBuffer;

/// The abstraction both the client manager and the server dispatch loop
/// talk to. [`framed::FramedTransport`] and [`arbitrator::TransportArbitrator`]
/// both implement it; a concrete link-layer driver (UART, SPI, RPMsg) would
/// implement it too, but that's outside this crate.
pub trait Transport {
    fn send(&self, message: &MessageBuffer) -> Result<(), Error>;
    fn receive(&self, message: &mut MessageBuffer) -> Result<(), Error>;

    /// Whether a call to `receive` would return immediately with a message
    /// already available. Transports with no way to peek (most blocking
    /// streams) default to `true`, matching the base behavior.
    fn has_message(&self) -> bool {
        true
    }
}
