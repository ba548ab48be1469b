// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::io::{Read, Write};
use std::sync::Mutex;

use log::{trace, warn};

use crate::crc::{crc16, ComputeCrc};
use crate::error::{Error, Status};
use crate::message_buffer::MessageBuffer;

use super::Transport;

/// The fixed 4-byte header in front of every frame: a `u16` payload length
/// followed by a `u16` CRC-16 over that payload. Both fields are written in
/// the platform's native byte order. This protocol assumes homogeneous
/// endianness between peers and does not negotiate otherwise.
const HEADER_LEN: usize = 4;

/// Wraps an underlying duplex byte stream with the length+CRC frame header.
///
/// `R` and `W` are independent halves of the same stream (for a TCP
/// connection, `stream.try_clone()`; for the in-process test pipe in
/// [`super::pipe`], a duplicated file descriptor) so that a send in progress
/// on one thread never blocks a concurrent receive on another; the send and
/// receive locks below guard only same-direction callers against each other.
pub struct FramedTransport<R, W> {
    receiver: Mutex<R>,
    sender: Mutex<W>,
    crc: ComputeCrc,
}

impl<R: Read, W: Write> FramedTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            receiver: Mutex::new(reader),
            sender: Mutex::new(writer),
            crc: crc16,
        }
    }

    /// Substitutes the CRC routine, e.g. for a hardware CRC peripheral. Must
    /// compute the same polynomial and initial value as [`crc16`].
    pub fn set_crc_function(&mut self, crc: ComputeCrc) {
        self.crc = crc;
    }
}

impl<R: Read, W: Write> Transport for FramedTransport<R, W> {
    fn send(&self, message: &MessageBuffer) -> Result<(), Error> {
        let mut writer = self.sender.lock().unwrap();

        let length = message.used();
        debug_assert!(length <= u16::MAX as usize);
        let crc = (self.crc)(message.data());

        let mut header = [0u8; HEADER_LEN];
        header[0..2].copy_from_slice(&(length as u16).to_ne_bytes());
        header[2..4].copy_from_slice(&crc.to_ne_bytes());

        writer
            .write_all(&header)
            .map_err(|e| Error::Io(Status::SendFailed, e))?;
        writer
            .write_all(message.data())
            .map_err(|e| Error::Io(Status::SendFailed, e))?;

        trace!("sent frame: {length} bytes, crc {crc:#06x}");
        Ok(())
    }

    fn receive(&self, message: &mut MessageBuffer) -> Result<(), Error> {
        let mut reader = self.receiver.lock().unwrap();

        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header).map_err(|e| {
            let status = if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Status::ConnectionClosed
            } else {
                Status::ReceiveFailed
            };
            Error::Io(status, e)
        })?;

        let message_size = u16::from_ne_bytes([header[0], header[1]]) as usize;
        let expected_crc = u16::from_ne_bytes([header[2], header[3]]);

        if message_size > message.capacity() {
            return Err(Status::BufferOverrun.into());
        }

        reader
            .read_exact(&mut message.raw_mut()[..message_size])
            .map_err(|e| Error::Io(Status::ReceiveFailed, e))?;
        drop(reader);

        message.set_used(message_size);

        let computed_crc = (self.crc)(message.data());
        if computed_crc != expected_crc {
            warn!("frame CRC mismatch: expected {expected_crc:#06x}, computed {computed_crc:#06x}");
            return Err(Status::CrcCheckFailed.into());
        }

        trace!("received frame: {message_size} bytes");
        Ok(())
    }
}
