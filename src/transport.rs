use std::io;

use crate::epoll::Ready;
use crate::net::tcp::TcpStream;

/// Hook for layering a handshake (TLS, SASL, ...) on top of an established
/// TCP connection before framed reads/writes begin. Plaintext connections
/// are ready from the moment the TCP handshake completes; this trait is
/// the seam a future transport would plug into without touching the rest
/// of the selector.
pub trait Transport: Send {
    /// Drives the handshake forward using the readiness the channel was
    /// last woken for. Returns `true` once application data can flow.
    fn prepare(&mut self, stream: &mut TcpStream, readiness: Ready) -> io::Result<bool>;

    /// Whether the handshake has completed and framed I/O may proceed.
    fn ready(&self) -> bool;
}

/// The only `Transport` this crate ships: no handshake, ready immediately.
#[derive(Debug, Default)]
pub struct PlaintextTransport {
    ready: bool,
}

impl PlaintextTransport {
    pub fn new() -> PlaintextTransport {
        PlaintextTransport { ready: true }
    }
}

impl Transport for PlaintextTransport {
    fn prepare(&mut self, _stream: &mut TcpStream, _readiness: Ready) -> io::Result<bool> {
        Ok(true)
    }

    fn ready(&self) -> bool {
        self.ready
    }
}
