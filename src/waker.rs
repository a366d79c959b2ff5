use std::io;

use crate::epoll::{Epoll, EpollOpt, Evented, Ready, Token};
use crate::sys::eventfd::EventFd;

/// The one thread-safe entry point into the selector: a cross-thread
/// `wakeup()` backed by a Linux eventfd, registered for read-ready interest
/// alongside every channel so a pending write unblocks a concurrent
/// `poll`'s `epoll_wait`.
pub struct Waker {
    fd: EventFd,
}

impl Waker {
    pub fn new(epoll: &Epoll, token: Token) -> io::Result<Waker> {
        let fd = EventFd::new()?;
        fd.add(epoll, token, Ready::readable(), EpollOpt::level())?;
        Ok(Waker { fd })
    }

    pub fn wake(&self) -> io::Result<()> {
        match self.fd.write(1) {
            Ok(()) => Ok(()),
            // Already has a pending wakeup queued; coalescing is fine since
            // wakeup only needs to guarantee "poll will return", not count.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Drains the eventfd counter so the next `wake()` is observed by a
    /// fresh `epoll_wait` rather than seeing a stale readable event.
    pub fn reset(&self) {
        let _ = self.fd.read();
    }
}
