// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Routes incoming invocations to registered service handlers and returns
//! replies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;

use crate::codec::{BasicCodec, MessageType};
use crate::error::{Error, Status};
use crate::factory::CodecFactory;
use crate::transport::Transport;

/// A collection of remotely-invocable methods identified by a `service_id`.
/// Registered with a [`SimpleServer`] before it starts running; the core
/// never adds or removes services once dispatch is underway.
pub trait Service: Send + Sync {
    fn service_id(&self) -> u32;

    /// Handles one invocation. `in_codec` is positioned just after the
    /// message header, ready to read the call's arguments; the
    /// implementation must write the reply header and results (for a
    /// non-oneway call) into `out_codec`. A returned `Err` is logged and the
    /// server loop continues, see [`SimpleServer::run`]'s failure policy.
    fn handle_invocation(
        &self,
        method_id: u32,
        sequence: u32,
        in_codec: &mut BasicCodec,
        out_codec: &mut BasicCodec,
    ) -> Result<(), Error>;
}

/// Runs the receive→dispatch→reply loop over a shared [`Transport`],
/// routing each inbound invocation to the registered [`Service`] matching
/// its `service_id`.
pub struct SimpleServer<T> {
    transport: Arc<T>,
    codec_factory: Arc<dyn CodecFactory>,
    services: Vec<Box<dyn Service>>,
    running: AtomicBool,
}

impl<T: Transport> SimpleServer<T> {
    pub fn new(transport: Arc<T>, codec_factory: Arc<dyn CodecFactory>) -> Self {
        Self {
            transport,
            codec_factory,
            services: Vec::new(),
            running: AtomicBool::new(true),
        }
    }

    /// Appends a service to the registry, in insertion order. Must be
    /// called before [`Self::run`]/[`Self::poll`] starts dispatching.
    pub fn add_service(&mut self, service: Box<dyn Service>) {
        self.services.push(service);
    }

    fn find_service(&self, service_id: u32) -> Option<&dyn Service> {
        self.services
            .iter()
            .find(|s| s.service_id() == service_id)
            .map(|s| s.as_ref())
    }

    /// Runs one receive→dispatch→reply iteration unconditionally.
    pub fn run_once(&self) -> Result<(), Error> {
        let mut in_codec = self.codec_factory.create();
        let received = self.transport.receive(in_codec.buffer_mut());
        if let Err(e) = received {
            self.codec_factory.dispose(in_codec);
            return Err(e);
        }
        // A transport (the arbitrator, in particular) may swap the buffer
        // this codec points at out from under it.
        in_codec.reset();

        let mut out_codec = self.codec_factory.create();
        let result = self.dispatch(&mut in_codec, &mut out_codec);

        self.codec_factory.dispose(in_codec);
        self.codec_factory.dispose(out_codec);

        result
    }

    fn dispatch(&self, in_codec: &mut BasicCodec, out_codec: &mut BasicCodec) -> Result<(), Error> {
        let header = in_codec.start_read_message()?;
        if header.message_type != MessageType::Invocation && header.message_type != MessageType::Oneway {
            return Err(Status::InvalidArgument.into());
        }

        let service = self
            .find_service(header.service_id)
            .ok_or(Status::InvalidArgument)?;

        if let Err(e) = service.handle_invocation(header.request_id, header.sequence, in_codec, out_codec)
        {
            warn!(
                "service {} method {} failed: {}",
                header.service_id, header.request_id, e
            );
        }

        if header.message_type == MessageType::Invocation {
            self.transport.send(out_codec.buffer())?;
        }

        Ok(())
    }

    /// Runs until [`Self::stop`] is called or a transport error occurs.
    /// Does not unblock a thread currently parked inside `transport.receive`.
    /// That's the transport's responsibility (typically by closing the
    /// underlying channel).
    pub fn run(&self) -> Result<(), Error> {
        while self.running.load(Ordering::Acquire) {
            self.run_once()?;
        }
        Ok(())
    }

    /// Runs at most one iteration, short-circuiting if the transport
    /// reports no message is waiting. Returns `Ok(true)` if an iteration
    /// ran, `Ok(false)` if it was skipped, `Err(ServerIsDown)` if `stop` has
    /// been called.
    pub fn poll(&self) -> Result<bool, Error> {
        if !self.running.load(Ordering::Acquire) {
            return Err(Status::ServerIsDown.into());
        }
        if !self.transport.has_message() {
            return Ok(false);
        }
        self.run_once()?;
        Ok(true)
    }

    /// Flips the running flag; the loop exits after its current iteration.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}
