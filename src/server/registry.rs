use std::collections::HashMap;
use std::time::{Duration, Instant};

use mio::Token;

use crate::http::connection::Connection;

/// First token handed to a client; lower values are reserved for the
/// listener and the waker.
const FIRST_CLIENT_TOKEN: usize = 2;

/// Owner of every live connection, keyed by its poll token.
///
/// The event loop keeps the registry and the multiplexer in step: a
/// connection is registered for readiness exactly while it has an entry here.
pub struct Registry<S> {
    connections: HashMap<Token, Connection<S>>,
    next_token: usize,
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Registry<S> {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            next_token: FIRST_CLIENT_TOKEN,
        }
    }

    /// Hands out a token no live connection uses.
    pub fn allocate(&mut self) -> Token {
        loop {
            let token = Token(self.next_token);
            self.next_token = self.next_token.checked_add(1).unwrap_or(FIRST_CLIENT_TOKEN);
            if !self.connections.contains_key(&token) {
                return token;
            }
        }
    }

    pub fn insert(&mut self, token: Token, connection: Connection<S>) {
        self.connections.insert(token, connection);
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Connection<S>> {
        self.connections.get_mut(&token)
    }

    /// Removes the entry; a second removal of the same token returns `None`.
    pub fn remove(&mut self, token: Token) -> Option<Connection<S>> {
        self.connections.remove(&token)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Tokens of connections with no activity for at least `timeout`.
    pub fn idle(&self, now: Instant, timeout: Duration) -> Vec<Token> {
        self.connections
            .iter()
            .filter(|(_, connection)| connection.is_idle(now, timeout))
            .map(|(token, _)| *token)
            .collect()
    }
}
