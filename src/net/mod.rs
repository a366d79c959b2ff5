//! Non-blocking TCP handles wired into the selector's `Epoll`.

pub mod tcp;

pub use tcp::{connect_nonblocking, TcpListener, TcpStream};
