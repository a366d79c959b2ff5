use std::io;

use crate::registry::ConnectionId;

/// Errors the selector surfaces to its caller. Every variant maps to a
/// concrete invariant violation or a wrapped OS failure; nothing here is
/// a catch-all.
#[derive(thiserror::Error, Debug)]
pub enum SelectorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("connection id `{0}` is already registered")]
    DuplicateId(ConnectionId),

    #[error("no channel registered for connection id `{0}`")]
    NoSuchConnection(ConnectionId),

    #[error("address could not be resolved: {0}")]
    UnresolvableAddress(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, SelectorError>;
