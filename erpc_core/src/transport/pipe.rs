// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! An in-process, socketpair-backed duplex endpoint. Exists only to drive
//! the crate's own tests without a real UART/SPI/TCP transport; no
//! production code path depends on it.

use std::io::{Read, Write};
use std::os::fd::OwnedFd;

use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};

/// One end of a connected pair of byte streams.
pub struct Endpoint {
    fd: OwnedFd,
}

/// Creates a connected pair of endpoints, each readable and writable.
pub fn pipe() -> std::io::Result<(Endpoint, Endpoint)> {
    let (a, b) = socketpair(
        AddressFamily::Unix,
        SockType::Stream,
        None,
        SockFlag::empty(),
    )?;

    Ok((Endpoint { fd: a }, Endpoint { fd: b }))
}

impl Endpoint {
    /// Splits this endpoint into independent read and write halves backed
    /// by duplicated descriptors, so [`super::framed::FramedTransport`] can
    /// hold them in separate locks without the send and receive sides
    /// fighting over one `&mut`.
    pub fn split(self) -> std::io::Result<(EndpointHalf, EndpointHalf)> {
        let dup = self.fd.try_clone()?;
        Ok((EndpointHalf { fd: self.fd }, EndpointHalf { fd: dup }))
    }
}

/// One direction (or both, if used that way) of a split [`Endpoint`].
pub struct EndpointHalf {
    fd: OwnedFd,
}

impl EndpointHalf {
    /// Duplicates the underlying descriptor. Tests use this to hand the
    /// same socket to two different `FramedTransport` roles (e.g. a
    /// receiver that will never actually send) without needing a second,
    /// unused `Write` implementor.
    pub fn try_clone_for_test(&self) -> EndpointHalf {
        EndpointHalf {
            fd: self.fd.try_clone().expect("dup of test socket failed"),
        }
    }
}

impl Read for EndpointHalf {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(nix::unistd::read(&self.fd, buf)?)
    }
}

impl Write for EndpointHalf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(nix::unistd::write(&self.fd, buf)?)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
