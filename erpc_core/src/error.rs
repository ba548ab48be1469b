// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

/// Status codes returned by the core's operations.
///
/// This mirrors the C enum used by the original infrastructure one-for-one;
/// it carries no payload of its own; diagnostic context (an I/O error, for
/// example) rides alongside it in [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Status {
    Success,
    Fail,
    SendFailed,
    ReceiveFailed,
    InitFailed,
    Timeout,
    ConnectionFailure,
    ConnectionClosed,
    InvalidArgument,
    BufferOverrun,
    MemoryError,
    CrcCheckFailed,
    InvalidMessageVersion,
    ExpectedReply,
    BadAddressScale,
    UnknownName,
    UnknownCallback,
    ServerIsDown,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Success => "success",
                Self::Fail => "generic failure",
                Self::SendFailed => "transport send failed",
                Self::ReceiveFailed => "transport receive failed",
                Self::InitFailed => "initialization failed",
                Self::Timeout => "operation timed out",
                Self::ConnectionFailure => "connection failure",
                Self::ConnectionClosed => "connection closed",
                Self::InvalidArgument => "invalid argument",
                Self::BufferOverrun => "buffer overrun",
                Self::MemoryError => "memory error",
                Self::CrcCheckFailed => "CRC check failed",
                Self::InvalidMessageVersion => "invalid message version",
                Self::ExpectedReply => "expected a reply message",
                Self::BadAddressScale => "pointer too wide for this platform",
                Self::UnknownName => "unknown name",
                Self::UnknownCallback => "unknown callback",
                Self::ServerIsDown => "server is down",
            }
        )
    }
}

/// The error type threaded through every fallible core operation.
#[derive(Debug)]
pub enum Error {
    /// A status with no further context.
    Status(Status),

    /// A status arising from a failed I/O operation on the underlying
    /// transport stream.
    Io(Status, std::io::Error),
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Self::Status(s) => *s,
            Self::Io(s, _) => *s,
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(s) => write!(f, "{s}"),
            Self::Io(s, e) => write!(f, "{s}: {e}"),
        }
    }
}

impl From<Status> for Error {
    fn from(s: Status) -> Self {
        Self::Status(s)
    }
}

/// I/O errors on `receive` map to `ReceiveFailed`; callers that need to
/// distinguish `send` failures construct `Error::Io(Status::SendFailed, e)`
/// directly rather than relying on this conversion.
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Status::ReceiveFailed, e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
