// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use crate::error::{Error, Status};
use crate::message_buffer::MessageBuffer;

/// Version byte packed into every message header's top byte. Peers with a
/// mismatched version reject the message with `InvalidMessageVersion`.
pub const CODEC_VERSION: u8 = 1;

const NULL_FLAG: u8 = 1;
const NOT_NULL_FLAG: u8 = 0;

/// The four kinds of message a header can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Invocation,
    Oneway,
    Reply,
    /// Reserved; never emitted by this implementation, but a known value a
    /// decoder must not choke on.
    Notification,
}

impl MessageType {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Invocation),
            1 => Some(Self::Oneway),
            2 => Some(Self::Reply),
            3 => Some(Self::Notification),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Invocation => 0,
            Self::Oneway => 1,
            Self::Reply => 2,
            Self::Notification => 3,
        }
    }
}

/// The decoded contents of a message header (see the wire layout in the
/// crate's top-level documentation).
#[derive(Debug, Clone, Copy)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub service_id: u32,
    pub request_id: u32,
    pub sequence: u32,
}

/// Serializes and deserializes values into a [`MessageBuffer`] through a
/// single linear cursor.
///
/// Every `write_*`/`read_*` method is sticky on error: once [`Self::status`]
/// is non-OK, later calls are no-ops that preserve the first error, so
/// generated stub code can chain a whole argument list and check the status
/// once at the end.
pub struct BasicCodec {
    buffer: MessageBuffer,
    position: usize,
    remaining: usize,
    status: Option<Status>,
}

impl BasicCodec {
    pub fn new(buffer: MessageBuffer) -> Self {
        let remaining = buffer.capacity();
        Self {
            buffer,
            position: 0,
            remaining,
            status: None,
        }
    }

    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut MessageBuffer {
        &mut self.buffer
    }

    /// Replaces the codec's buffer, returning the old one. Used by a buffer
    /// factory recycling storage between requests.
    pub fn take_buffer(&mut self) -> MessageBuffer {
        self.reset();
        std::mem::replace(&mut self.buffer, MessageBuffer::empty())
    }

    pub fn set_buffer(&mut self, buffer: MessageBuffer) {
        self.remaining = buffer.capacity();
        self.buffer = buffer;
        self.position = 0;
        self.status = None;
    }

    /// Rewinds the cursor to the start of the buffer without touching its
    /// contents or `used` length. Required before reading a reply whose
    /// buffer storage a transport (such as the arbitrator) may have swapped
    /// out from under this codec since it was last used.
    pub fn reset(&mut self) {
        self.position = 0;
        self.remaining = self.buffer.capacity();
    }

    pub fn status(&self) -> Result<(), Error> {
        match self.status {
            None => Ok(()),
            Some(s) => Err(s.into()),
        }
    }

    fn update_status(&mut self, s: Status) {
        if self.status.is_none() {
            self.status = Some(s);
        }
    }

    fn write_data(&mut self, data: &[u8]) {
        if self.status.is_some() {
            return;
        }
        let mut cursor = self.buffer.cursor_from(self.position, self.remaining);
        let result = cursor.write(data);
        self.position = cursor.position();
        self.remaining = cursor.remaining();
        if let Err(e) = result {
            self.status = Some(e.status());
        }
    }

    fn read_data(&mut self, out: &mut [u8]) {
        if self.status.is_some() {
            return;
        }
        let mut cursor = self.buffer.cursor_from(self.position, self.remaining);
        let result = cursor.read(out);
        self.position = cursor.position();
        self.remaining = cursor.remaining();
        if let Err(e) = result {
            self.status = Some(e.status());
        }
    }

    // -- message header -----------------------------------------------

    pub fn start_write_message(
        &mut self,
        message_type: MessageType,
        service_id: u32,
        request_id: u32,
        sequence: u32,
    ) {
        let header = ((CODEC_VERSION as u32) << 24)
            | ((service_id & 0xff) << 16)
            | ((request_id & 0xff) << 8)
            | (message_type.to_u8() as u32);
        self.write_u32(header);
        self.write_u32(sequence);
    }

    pub fn start_read_message(&mut self) -> Result<MessageHeader, Error> {
        let header = self.read_u32_checked()?;
        if ((header >> 24) & 0xff) as u8 != CODEC_VERSION {
            self.update_status(Status::InvalidMessageVersion);
        }
        self.status()?;

        let service_id = (header >> 16) & 0xff;
        let request_id = (header >> 8) & 0xff;
        let message_type = MessageType::from_u8((header & 0xff) as u8).ok_or(Status::Fail)?;
        let sequence = self.read_u32_checked()?;

        Ok(MessageHeader {
            message_type,
            service_id,
            request_id,
            sequence,
        })
    }

    // -- scalars --------------------------------------------------------

    pub fn write_bool(&mut self, value: bool) {
        self.write_data(&[value as u8]);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_data(&value.to_ne_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_data(&value.to_ne_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_data(&value.to_ne_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_data(&value.to_ne_bytes());
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_data(&value.to_ne_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_data(&value.to_ne_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_data(&value.to_ne_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_data(&value.to_ne_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_data(&value.to_ne_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write_data(&value.to_ne_bytes());
    }

    pub fn read_bool(&mut self) -> bool {
        let mut v = [0u8; 1];
        self.read_data(&mut v);
        v[0] != 0
    }

    pub fn read_i8(&mut self) -> i8 {
        let mut v = [0u8; 1];
        self.read_data(&mut v);
        i8::from_ne_bytes(v)
    }

    pub fn read_i16(&mut self) -> i16 {
        let mut v = [0u8; 2];
        self.read_data(&mut v);
        i16::from_ne_bytes(v)
    }

    pub fn read_i32(&mut self) -> i32 {
        let mut v = [0u8; 4];
        self.read_data(&mut v);
        i32::from_ne_bytes(v)
    }

    pub fn read_i64(&mut self) -> i64 {
        let mut v = [0u8; 8];
        self.read_data(&mut v);
        i64::from_ne_bytes(v)
    }

    pub fn read_u8(&mut self) -> u8 {
        let mut v = [0u8; 1];
        self.read_data(&mut v);
        u8::from_ne_bytes(v)
    }

    pub fn read_u16(&mut self) -> u16 {
        let mut v = [0u8; 2];
        self.read_data(&mut v);
        u16::from_ne_bytes(v)
    }

    pub fn read_u32(&mut self) -> u32 {
        let mut v = [0u8; 4];
        self.read_data(&mut v);
        u32::from_ne_bytes(v)
    }

    /// Like `read_u32`, but surfaces the codec's status immediately instead
    /// of requiring the caller check it afterward. Used internally by header
    /// decoding, which must branch on the result right away.
    fn read_u32_checked(&mut self) -> Result<u32, Error> {
        let v = self.read_u32();
        self.status()?;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> u64 {
        let mut v = [0u8; 8];
        self.read_data(&mut v);
        u64::from_ne_bytes(v)
    }

    pub fn read_f32(&mut self) -> f32 {
        let mut v = [0u8; 4];
        self.read_data(&mut v);
        f32::from_ne_bytes(v)
    }

    pub fn read_f64(&mut self) -> f64 {
        let mut v = [0u8; 8];
        self.read_data(&mut v);
        f64::from_ne_bytes(v)
    }

    // -- pointers, strings, binary, lists, unions, null flags -----------

    pub fn write_ptr(&mut self, value: u64) {
        let size = std::mem::size_of::<u64>() as u8;
        self.write_u8(size);
        self.write_data(&value.to_ne_bytes());
    }

    pub fn read_ptr(&mut self) -> u64 {
        let size = self.read_u8();
        if size as usize > std::mem::size_of::<u64>() {
            self.update_status(Status::BadAddressScale);
        }
        let mut buf = [0u8; 8];
        if self.status.is_none() {
            let mut tmp = vec![0u8; size as usize];
            self.read_data(&mut tmp);
            buf[..tmp.len()].copy_from_slice(&tmp);
        }
        u64::from_ne_bytes(buf)
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_binary(value.as_bytes());
    }

    pub fn write_binary(&mut self, value: &[u8]) {
        self.write_u32(value.len() as u32);
        self.write_data(value);
    }

    /// Reads a length-prefixed byte blob without copying it out of the
    /// buffer; the returned slice borrows the codec's buffer directly.
    pub fn read_binary(&mut self) -> Result<&[u8], Error> {
        let len = self.read_u32();
        if self.status.is_some() {
            return Err(self.status.unwrap().into());
        }
        let len = len as usize;
        if self.remaining < len {
            self.status = Some(Status::BufferOverrun);
            return Err(Status::BufferOverrun.into());
        }
        let slice = self.buffer.slice_at(self.position, len)?;
        self.position += len;
        self.remaining -= len;
        Ok(slice)
    }

    pub fn read_string(&mut self) -> Result<&str, Error> {
        let bytes = self.read_binary()?;
        std::str::from_utf8(bytes).map_err(|_| Status::InvalidArgument.into())
    }

    pub fn start_write_list(&mut self, length: u32) {
        self.write_u32(length);
    }

    pub fn start_read_list(&mut self) -> u32 {
        let len = self.read_u32();
        if self.status.is_some() {
            0
        } else {
            len
        }
    }

    pub fn start_write_union(&mut self, discriminator: i32) {
        self.write_i32(discriminator);
    }

    pub fn start_read_union(&mut self) -> i32 {
        self.read_i32()
    }

    pub fn write_null_flag(&mut self, is_null: bool) {
        self.write_u8(if is_null { NULL_FLAG } else { NOT_NULL_FLAG });
    }

    pub fn read_null_flag(&mut self) -> bool {
        self.read_u8() == NULL_FLAG
    }

    /// Encodes a selection from a callback table of more than one entry as
    /// its index; fails with `UnknownCallback` if `callback` is not a member
    /// of `table`.
    pub fn write_callback(&mut self, table: &[usize], callback: usize) {
        debug_assert!(table.len() > 1, "use write_single_callback for a table of one");
        match table.iter().position(|&c| c == callback) {
            Some(index) => self.write_u8(index as u8),
            None => self.update_status(Status::UnknownCallback),
        }
    }

    pub fn read_callback(&mut self, table: &[usize]) -> usize {
        debug_assert!(table.len() > 1, "use read_single_callback for a table of one");
        let index = self.read_u8();
        if self.status.is_some() {
            return 0;
        }
        match table.get(index as usize) {
            Some(&callback) => callback,
            None => {
                self.update_status(Status::UnknownCallback);
                0
            }
        }
    }

    /// A declaration with exactly one possible callback needs no wire
    /// representation; the two sides just need to agree it's the same one.
    pub fn write_single_callback(&mut self, declared: usize, actual: usize) {
        if declared != actual {
            self.update_status(Status::UnknownCallback);
        }
    }

    pub fn read_single_callback(&mut self, declared: usize) -> usize {
        declared
    }
}
