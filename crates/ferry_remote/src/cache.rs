//! Process-wide connection cache.
//!
//! The [`ConnectionCache`] is an explicit registry object rather than an
//! ambient global: create one at startup, inject it into the engine, and
//! drop or [`close_all`](ConnectionCache::close_all) it at shutdown. Tests
//! create their own so no state leaks between them.
//!
//! # Identity
//!
//! For a given canonical [`AuthKey`], every caller receives the same
//! `Arc<Connection>` until the entry is evicted with
//! [`evict`](ConnectionCache::evict). Closing the connection does not evict
//! it; the next [`connect`](ConnectionCache::connect) re-dials behind the
//! same handle.
//!
//! # Concurrency
//!
//! Lookup and insert happen under one map lock. The first dial for a key
//! happens outside the lock; if two threads race, the loser's session is
//! closed and discarded so exactly one connection per key is retained.

use crate::auth::{Auth, AuthKey, DEFAULT_SSH_PORT};
use crate::connection::Connection;
use crate::error::ConnectionError;
use crate::transport::Connector;
use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use parking_lot::Mutex;
use std::sync::Arc;

/// Keyed cache of live remote connections.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ferry_remote::{Auth, ConnectionCache, LoopbackConnector};
///
/// let cache = ConnectionCache::new(Arc::new(LoopbackConnector::new()));
/// let a = cache.connect(&Auth::new("localhost")).unwrap();
/// let b = cache.connect(&Auth::new("LOCALHOST").with_port(22)).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// a.close();
/// let c = cache.connect(&Auth::new("localhost")).unwrap();
/// assert!(Arc::ptr_eq(&a, &c));
/// assert!(c.is_active());
/// ```
pub struct ConnectionCache {
    connector: Arc<dyn Connector>,
    default_port: u16,
    entries: Mutex<HashMap<AuthKey, Arc<Connection>>>,
}

impl core::fmt::Debug for ConnectionCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectionCache")
            .field("connector", &self.connector.name())
            .field("default_port", &self.default_port)
            .field("entries", &self.keys())
            .finish()
    }
}

impl ConnectionCache {
    /// Creates an empty cache dialing through `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            default_port: DEFAULT_SSH_PORT,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the port assumed for auth fields without one.
    #[must_use]
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    /// Returns the canonical key `auth` is cached under.
    #[must_use]
    pub fn key_for(&self, auth: &Auth) -> AuthKey {
        AuthKey::canonicalize(auth, self.default_port)
    }

    /// Returns the connection for `auth`, dialing if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if a session cannot be established. A
    /// failed dial leaves no entry behind, so the next call retries.
    pub fn connect(&self, auth: &Auth) -> Result<Arc<Connection>, ConnectionError> {
        let key = self.key_for(auth);

        let cached = self.entries.lock().get(&key).cloned();
        if let Some(connection) = cached {
            tracing::trace!(%key, "connection cache hit");
            connection.ensure_open()?;
            return Ok(connection);
        }

        tracing::debug!(%key, connector = self.connector.name(), "dialing");
        let mut session = Some(self.connector.dial(auth)?);

        let connection = match self.entries.lock().entry(key) {
            Entry::Occupied(existing) => Arc::clone(existing.get()),
            Entry::Vacant(slot) => {
                let fresh = session.take().ok_or(ConnectionError::Closed)?;
                let connection = Arc::new(Connection::from_session(
                    slot.key().clone(),
                    auth.clone(),
                    Arc::clone(&self.connector),
                    fresh,
                ));
                slot.insert(Arc::clone(&connection));
                connection
            }
        };

        if let Some(mut loser) = session {
            // Another thread finished its dial first; keep its handle.
            loser.close();
            connection.ensure_open()?;
        }
        Ok(connection)
    }

    /// Returns the cached connection for `auth` without dialing.
    #[must_use]
    pub fn get(&self, auth: &Auth) -> Option<Arc<Connection>> {
        self.entries.lock().get(&self.key_for(auth)).cloned()
    }

    /// Closes the connection for `auth` if cached. Idempotent.
    pub fn close(&self, auth: &Auth) {
        if let Some(connection) = self.get(auth) {
            connection.close();
        }
    }

    /// Closes and removes the entry for `auth`.
    ///
    /// Later calls to [`connect`](Self::connect) return a new handle.
    pub fn evict(&self, auth: &Auth) -> Option<Arc<Connection>> {
        let evicted = self.entries.lock().remove(&self.key_for(auth));
        if let Some(connection) = &evicted {
            connection.close();
        }
        evicted
    }

    /// Closes every cached connection, keeping the entries.
    pub fn close_all(&self) {
        let connections: Vec<_> = self.entries.lock().values().cloned().collect();
        for connection in connections {
            connection.close();
        }
    }

    /// Closes and removes every entry.
    pub fn clear(&self) {
        let drained: Vec<_> = self.entries.lock().drain().map(|(_, c)| c).collect();
        for connection in drained {
            connection.close();
        }
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the cached keys.
    #[must_use]
    pub fn keys(&self) -> Vec<AuthKey> {
        self.entries.lock().keys().cloned().collect()
    }
}
