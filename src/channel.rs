use std::collections::VecDeque;
use std::io;

use crate::epoll::Ready;
use crate::framing::{Receive, Send};
use crate::net::tcp::TcpStream;
use crate::registry::ConnectionId;
use crate::transport::{PlaintextTransport, Transport};

/// One registered connection: the socket, its framing state, and the
/// bookkeeping the selector needs to dispatch readiness events to it.
/// Owns a non-blocking socket plus whatever handshake (`Transport`) sits in
/// front of the size-delimited frames it reads and writes.
pub struct Channel {
    id: ConnectionId,
    stream: TcpStream,
    transport: Box<dyn Transport>,
    connect_pending: bool,
    max_receive_size: Option<usize>,
    in_flight_send: Option<Send>,
    in_progress_receive: Option<Receive>,
    staged_receives: VecDeque<Receive>,
    muted: bool,
}

impl Channel {
    pub fn new(
        id: ConnectionId,
        stream: TcpStream,
        transport: Box<dyn Transport>,
        connect_pending: bool,
        max_receive_size: Option<usize>,
    ) -> Channel {
        Channel {
            id,
            stream,
            transport,
            connect_pending,
            max_receive_size,
            in_flight_send: None,
            in_progress_receive: None,
            staged_receives: VecDeque::new(),
            muted: false,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn is_connecting(&self) -> bool {
        self.connect_pending
    }

    /// Resolves a pending non-blocking connect once the socket reports
    /// writable. Returns `Ok(true)` on success; a connect-level failure
    /// (`SO_ERROR` set) comes back as an `Err` for the caller to treat as a
    /// disconnect.
    pub fn finish_connect(&mut self) -> io::Result<bool> {
        if !self.connect_pending {
            return Ok(true);
        }
        match self.stream.connect_error()? {
            Some(e) => Err(e),
            None => {
                self.connect_pending = false;
                Ok(true)
            }
        }
    }

    /// Drives the transport handshake forward. A no-op past the plaintext
    /// default, but the seam a future TLS transport plugs into.
    pub fn prepare(&mut self, readiness: Ready) -> io::Result<bool> {
        self.transport.prepare(&mut self.stream, readiness)
    }

    pub fn is_ready(&self) -> bool {
        !self.connect_pending && self.transport.ready()
    }

    pub fn set_send(&mut self, send: Send) -> bool {
        if self.in_flight_send.is_some() {
            return false;
        }
        self.in_flight_send = Some(send);
        true
    }

    pub fn has_send(&self) -> bool {
        self.in_flight_send.is_some()
    }

    /// Advances the in-flight send. Returns the completed `Send` once the
    /// whole frame has left the process.
    pub fn write(&mut self) -> io::Result<Option<Send>> {
        let Some(send) = self.in_flight_send.as_mut() else {
            return Ok(None);
        };
        if send.write_to(&mut self.stream)? {
            Ok(self.in_flight_send.take())
        } else {
            Ok(None)
        }
    }

    /// Reads until the socket reports `WouldBlock`, staging every frame
    /// that completes along the way. Mirrors spec.md's "drain the socket
    /// per readable event, not just one frame" read loop.
    pub fn read(&mut self) -> io::Result<()> {
        loop {
            let max_receive_size = self.max_receive_size;
            let receive = self
                .in_progress_receive
                .get_or_insert_with(|| Receive::new(self.id.as_str().to_owned(), max_receive_size));

            match receive.read_from(&mut self.stream) {
                Ok(Some(payload)) => {
                    let source = self.id.as_str().to_owned();
                    self.staged_receives.push_back(Receive::completed(source, payload));
                    self.in_progress_receive = None;
                }
                Ok(None) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Pops the oldest staged receive, preserving arrival order across
    /// polls (§4.7 drains at most one per channel per poll).
    pub fn pop_staged_receive(&mut self) -> Option<Receive> {
        self.staged_receives.pop_front()
    }

    pub fn has_staged_receives(&self) -> bool {
        !self.staged_receives.is_empty()
    }

    pub fn mute(&mut self) {
        self.muted = true;
    }

    pub fn unmute(&mut self) {
        self.muted = false;
    }

    pub fn is_mute(&self) -> bool {
        self.muted
    }

    pub fn close(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

/// External collaborator responsible for turning a freshly connected or
/// registered socket into a `Channel`, the seam spec.md's "channel builder"
/// plugs into (e.g. to attach a different `Transport`).
pub trait ChannelBuilder: ::std::marker::Send {
    fn build(
        &self,
        id: ConnectionId,
        stream: TcpStream,
        connect_pending: bool,
        max_receive_size: Option<usize>,
    ) -> Channel;
}

#[derive(Debug, Default)]
pub struct PlaintextChannelBuilder;

impl ChannelBuilder for PlaintextChannelBuilder {
    fn build(
        &self,
        id: ConnectionId,
        stream: TcpStream,
        connect_pending: bool,
        max_receive_size: Option<usize>,
    ) -> Channel {
        Channel::new(id, stream, Box::new(PlaintextTransport::new()), connect_pending, max_receive_size)
    }
}
