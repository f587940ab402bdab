//! Remote transport boundary and connection cache for Ferry.
//!
//! This crate owns everything about reaching a remote host:
//!
//! - [`Auth`] and its canonical form [`AuthKey`]
//! - [`Transport`] and [`Connector`], the boundary to the secure transport
//! - [`Connection`], a shared handle that re-dials behind a stable identity
//! - [`ConnectionCache`], the keyed registry of live connections
//!
//! Two connectors ship with the crate: [`SshConnector`] (system OpenSSH
//! client) and [`LoopbackConnector`] (local filesystem, used in tests).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ferry_remote::{Auth, ConnectionCache, LoopbackConnector};
//!
//! let cache = ConnectionCache::new(Arc::new(LoopbackConnector::new()));
//! let conn = cache.connect(&Auth::new("localhost")).unwrap();
//! assert!(conn.is_active());
//! ```

mod auth;
mod cache;
mod connection;
mod error;
mod loopback;
pub mod ssh;
mod transport;

pub use auth::{Auth, AuthKey, DEFAULT_SSH_PORT};
pub use cache::ConnectionCache;
pub use connection::Connection;
pub use error::ConnectionError;
pub use loopback::LoopbackConnector;
pub use ssh::SshConnector;
pub use transport::{Connector, Transport};
