use std::collections::HashMap;
use std::fmt;

use slab::Slab;

use crate::channel::Channel;
use crate::epoll::Token;

/// Caller-chosen connection identifier, matching Kafka's string node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> ConnectionId {
        ConnectionId(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> ConnectionId {
        ConnectionId(s.to_owned())
    }
}

impl std::borrow::Borrow<str> for ConnectionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Combines the slab that owns every `Channel` (keyed by the epoll `Token`
/// it was registered under) with the id-to-token lookup the public API is
/// addressed by. The slab key doubling as the token is what gives the
/// selector exactly one selection key per channel, and vice versa, by
/// construction rather than by a checked invariant.
#[derive(Default)]
pub struct Registry {
    channels: Slab<Channel>,
    tokens: HashMap<ConnectionId, Token>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            channels: Slab::new(),
            tokens: HashMap::new(),
        }
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.tokens.contains_key(id)
    }

    pub fn insert(&mut self, id: ConnectionId, build: impl FnOnce(Token) -> Channel) -> Token {
        let entry = self.channels.vacant_entry();
        let token = Token(entry.key());
        entry.insert(build(token));
        self.tokens.insert(id, token);
        token
    }

    pub fn token_for(&self, id: &ConnectionId) -> Option<Token> {
        self.tokens.get(id).copied()
    }

    pub fn get(&self, token: Token) -> Option<&Channel> {
        self.channels.get(token.0)
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Channel> {
        self.channels.get_mut(token.0)
    }

    pub fn by_id(&self, id: &ConnectionId) -> Option<&Channel> {
        self.token_for(id).and_then(|token| self.get(token))
    }

    pub fn by_id_mut(&mut self, id: &ConnectionId) -> Option<&mut Channel> {
        self.token_for(id).and_then(|token| self.channels.get_mut(token.0))
    }

    /// Removes a channel by token, returning its connection id and the
    /// channel itself. Separated from `Channel::close` so callers can run
    /// the rest of the teardown (metrics, idle-tracker removal, recording
    /// the disconnect reason) with an owned `Channel` instead of juggling
    /// a borrow of `self`.
    pub fn remove(&mut self, token: Token) -> Option<(ConnectionId, Channel)> {
        if !self.channels.contains(token.0) {
            return None;
        }
        let channel = self.channels.remove(token.0);
        let id = channel.id().clone();
        self.tokens.remove(&id);
        Some((id, channel))
    }

    pub fn ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.tokens.keys()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }
}
