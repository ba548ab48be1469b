// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Issues requests and matches replies by sequence number.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::codec::{BasicCodec, MessageType};
use crate::error::{Error, Status};
use crate::factory::CodecFactory;
use crate::transport::arbitrator::{ClientToken, TransportArbitrator};
use crate::transport::Transport;

/// Per-call state owned by the calling thread for the duration of one
/// request/reply round trip.
pub struct RequestContext {
    sequence: u32,
    out_codec: BasicCodec,
    in_codec: Option<BasicCodec>,
    is_oneway: bool,
}

impl RequestContext {
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn is_oneway(&self) -> bool {
        self.is_oneway
    }

    /// The codec a stub writes the invocation's arguments into.
    pub fn out_codec(&mut self) -> &mut BasicCodec {
        &mut self.out_codec
    }

    /// The codec a stub reads the reply's results from. `None` for oneway
    /// requests, which never receive a reply.
    pub fn in_codec(&mut self) -> Option<&mut BasicCodec> {
        self.in_codec.as_mut()
    }
}

/// Invoked with the status of every failed [`ClientManager::perform_request`]
/// / [`ArbitratedClientManager::perform_request`] call. Diagnostic only;
/// it never alters the call's return value.
pub type ErrorHandler = Box<dyn Fn(Status) + Send + Sync>;

fn verify_reply(sequence: u32, in_codec: &mut BasicCodec) -> Result<(), Error> {
    // The transport (or arbitrator) may have swapped the buffer this codec
    // points at, so the cursor must be rewound before reading the header.
    in_codec.reset();
    let header = in_codec.start_read_message()?;
    if header.message_type != MessageType::Reply || header.sequence != sequence {
        return Err(Status::ExpectedReply.into());
    }
    Ok(())
}

/// Drives request/reply round trips directly over a shared [`Transport`].
/// Use [`ArbitratedClientManager`] instead when a [`TransportArbitrator`]
/// multiplexes the transport with a local server.
pub struct ClientManager<T> {
    transport: Arc<T>,
    codec_factory: Arc<dyn CodecFactory>,
    next_sequence: AtomicU32,
    error_handler: Option<ErrorHandler>,
}

impl<T: Transport> ClientManager<T> {
    pub fn new(transport: Arc<T>, codec_factory: Arc<dyn CodecFactory>) -> Self {
        Self {
            transport,
            codec_factory,
            next_sequence: AtomicU32::new(0),
            error_handler: None,
        }
    }

    pub fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.error_handler = Some(handler);
    }

    pub fn create_request(&self, is_oneway: bool) -> RequestContext {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let out_codec = self.codec_factory.create();
        let in_codec = (!is_oneway).then(|| self.codec_factory.create());
        RequestContext {
            sequence,
            out_codec,
            in_codec,
            is_oneway,
        }
    }

    pub fn perform_request(&self, request: &mut RequestContext) -> Result<(), Error> {
        let result = self.perform_request_inner(request);
        if let Err(ref e) = result {
            if let Some(handler) = &self.error_handler {
                handler(e.status());
            }
        }
        result
    }

    fn perform_request_inner(&self, request: &mut RequestContext) -> Result<(), Error> {
        self.transport.send(request.out_codec.buffer())?;

        if request.is_oneway {
            return Ok(());
        }

        let in_codec = request
            .in_codec
            .as_mut()
            .expect("non-oneway request always has an in_codec");
        self.transport.receive(in_codec.buffer_mut())?;
        verify_reply(request.sequence, in_codec)
    }

    pub fn release_request(&self, request: RequestContext) {
        self.codec_factory.dispose(request.out_codec);
        if let Some(in_codec) = request.in_codec {
            self.codec_factory.dispose(in_codec);
        }
    }
}

/// Drives request/reply round trips through a [`TransportArbitrator`],
/// registering the pending client before the request is sent so a reply
/// that arrives early still finds somewhere to go.
pub struct ArbitratedClientManager<T> {
    arbitrator: Arc<TransportArbitrator<T>>,
    codec_factory: Arc<dyn CodecFactory>,
    next_sequence: AtomicU32,
    error_handler: Option<ErrorHandler>,
}

impl<T: Transport> ArbitratedClientManager<T> {
    pub fn new(arbitrator: Arc<TransportArbitrator<T>>, codec_factory: Arc<dyn CodecFactory>) -> Self {
        Self {
            arbitrator,
            codec_factory,
            next_sequence: AtomicU32::new(0),
            error_handler: None,
        }
    }

    pub fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.error_handler = Some(handler);
    }

    pub fn create_request(&self, is_oneway: bool) -> RequestContext {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let out_codec = self.codec_factory.create();
        let in_codec = (!is_oneway).then(|| self.codec_factory.create());
        RequestContext {
            sequence,
            out_codec,
            in_codec,
            is_oneway,
        }
    }

    /// Like [`ClientManager::perform_request`], but with no timeout on the
    /// arbitrated wait.
    pub fn perform_request(&self, request: &mut RequestContext) -> Result<(), Error> {
        self.perform_request_timeout(request, None)
    }

    pub fn perform_request_timeout(
        &self,
        request: &mut RequestContext,
        timeout: Option<Duration>,
    ) -> Result<(), Error> {
        let result = self.perform_request_inner(request, timeout);
        if let Err(ref e) = result {
            if let Some(handler) = &self.error_handler {
                handler(e.status());
            }
        }
        result
    }

    fn perform_request_inner(
        &self,
        request: &mut RequestContext,
        timeout: Option<Duration>,
    ) -> Result<(), Error> {
        let token: Option<ClientToken> = (!request.is_oneway)
            .then(|| self.arbitrator.prepare_client_receive(request.sequence));

        self.arbitrator.send(request.out_codec.buffer())?;

        if request.is_oneway {
            return Ok(());
        }

        let token = token.expect("non-oneway request always prepares a client token");
        let reply_buffer = self.arbitrator.client_receive(token, timeout)?;

        let in_codec = request
            .in_codec
            .as_mut()
            .expect("non-oneway request always has an in_codec");
        in_codec.set_buffer(reply_buffer);
        verify_reply(request.sequence, in_codec)
    }

    pub fn release_request(&self, request: RequestContext) {
        self.codec_factory.dispose(request.out_codec);
        if let Some(in_codec) = request.in_codec {
            self.codec_factory.dispose(in_codec);
        }
    }
}

/// Logs a failed call at `warn!`; a ready-made [`ErrorHandler`] for callers
/// that just want diagnostics without writing their own closure.
pub fn logging_error_handler() -> ErrorHandler {
    Box::new(|status| {
        if status != Status::Success {
            warn!("eRPC call failed: {status}");
        } else {
            debug!("eRPC call succeeded");
        }
    })
}
