//! Authentication fields and their canonical cache key.
//!
//! An [`Auth`] is what a caller (or a parsed resource identifier) says about
//! how to reach a host. Two `Auth` values that describe the same endpoint may
//! still differ textually (`LocalHost` vs `localhost`, an explicit default
//! port vs none), so the connection cache never compares `Auth` directly.
//! Instead it keys on [`AuthKey`], produced by the pure function
//! [`AuthKey::canonicalize`].

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Port assumed when neither the identifier nor the configuration names one.
pub const DEFAULT_SSH_PORT: u16 = 22;

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication fields for a remote endpoint.
///
/// # Example
///
/// ```
/// use ferry_remote::Auth;
///
/// let auth = Auth::new("localhost").with_username("joe").with_port(2222);
/// assert_eq!(auth.get("hostname").as_deref(), Some("localhost"));
/// assert_eq!(auth.get("username").as_deref(), Some("joe"));
/// assert_eq!(auth.get("port").as_deref(), Some("2222"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    hostname: String,
    username: Option<String>,
    port: Option<u16>,
    key_file: Option<PathBuf>,
    extra: BTreeMap<String, String>,
}

impl Auth {
    /// Creates auth fields for the given host.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    /// Sets the login user.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the private key file.
    #[must_use]
    pub fn with_key_file(mut self, key_file: impl Into<PathBuf>) -> Self {
        self.key_file = Some(key_file.into());
        self
    }

    /// Adds a transport-specific option that does not take part in identity.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Returns the host name.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Returns the login user, if any.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the explicit port, if any.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the private key file, if any.
    #[must_use]
    pub fn key_file(&self) -> Option<&PathBuf> {
        self.key_file.as_ref()
    }

    /// Returns the transport-specific options.
    #[must_use]
    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// Looks up a field by its mapping name.
    ///
    /// Recognised names are `hostname`, `username`, `port` and `key_filename`;
    /// anything else is looked up in the extra options.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<String> {
        match field {
            "hostname" => Some(self.hostname.clone()),
            "username" => self.username.clone(),
            "port" => self.port.map(|port| port.to_string()),
            "key_filename" => self.key_file.as_ref().map(|p| p.display().to_string()),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Overlays every field set in `other` on top of `self`.
    ///
    /// An empty hostname in `other` leaves the current hostname in place.
    #[must_use]
    pub fn merged(mut self, other: &Auth) -> Self {
        if !other.hostname.is_empty() {
            self.hostname.clone_from(&other.hostname);
        }
        if other.username.is_some() {
            self.username.clone_from(&other.username);
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.key_file.is_some() {
            self.key_file.clone_from(&other.key_file);
        }
        for (key, value) in &other.extra {
            self.extra.insert(key.clone(), value.clone());
        }
        self
    }

    /// Renders `[user@]host` as accepted by OpenSSH.
    #[must_use]
    pub fn destination(&self) -> String {
        match &self.username {
            Some(user) => format!("{user}@{}", self.hostname),
            None => self.hostname.clone(),
        }
    }
}

impl core::fmt::Display for Auth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.destination())?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthKey
// ─────────────────────────────────────────────────────────────────────────────

/// Canonical identity of a remote endpoint.
///
/// Two [`Auth`] values that canonicalize to equal keys share one cached
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthKey {
    hostname: String,
    username: Option<String>,
    port: u16,
    key_file: Option<PathBuf>,
}

impl AuthKey {
    /// Canonicalizes auth fields into a comparable key.
    ///
    /// The hostname is trimmed and lower-cased, a missing port becomes
    /// `default_port`, and extra options are ignored.
    #[must_use]
    pub fn canonicalize(auth: &Auth, default_port: u16) -> Self {
        Self {
            hostname: auth.hostname.trim().to_ascii_lowercase(),
            username: auth.username.clone(),
            port: auth.port.unwrap_or(default_port),
            key_file: auth.key_file.clone(),
        }
    }

    /// Returns the canonical hostname.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Returns the canonical port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl core::fmt::Display for AuthKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(user) = &self.username {
            write!(f, "{user}@")?;
        }
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_case_and_whitespace_do_not_matter() {
        let a = AuthKey::canonicalize(&Auth::new("LocalHost"), DEFAULT_SSH_PORT);
        let b = AuthKey::canonicalize(&Auth::new(" localhost "), DEFAULT_SSH_PORT);
        assert_eq!(a, b);
    }

    #[test]
    fn explicit_default_port_matches_implicit() {
        let a = AuthKey::canonicalize(&Auth::new("host"), 22);
        let b = AuthKey::canonicalize(&Auth::new("host").with_port(22), 22);
        assert_eq!(a, b);
        assert_ne!(
            a,
            AuthKey::canonicalize(&Auth::new("host").with_port(2222), 22)
        );
    }

    #[test]
    fn user_and_key_file_take_part_in_identity() {
        let plain = AuthKey::canonicalize(&Auth::new("host"), 22);
        let joe = AuthKey::canonicalize(&Auth::new("host").with_username("joe"), 22);
        let keyed = AuthKey::canonicalize(&Auth::new("host").with_key_file("/k"), 22);
        assert_ne!(plain, joe);
        assert_ne!(plain, keyed);
    }

    #[test]
    fn extra_options_are_ignored() {
        let a = AuthKey::canonicalize(&Auth::new("host").with_extra("timeout", "5"), 22);
        let b = AuthKey::canonicalize(&Auth::new("host"), 22);
        assert_eq!(a, b);
    }

    #[test]
    fn merged_overlays_set_fields_only() {
        let base = Auth::new("a").with_username("joe").with_port(2200);
        let merged = base.merged(&Auth::new("").with_port(22).with_extra("x", "1"));
        assert_eq!(merged.hostname(), "a");
        assert_eq!(merged.username(), Some("joe"));
        assert_eq!(merged.port(), Some(22));
        assert_eq!(merged.get("x").as_deref(), Some("1"));
    }

    #[test]
    fn display_formats() {
        let auth = Auth::new("host").with_username("joe").with_port(2222);
        assert_eq!(auth.to_string(), "joe@host:2222");
        assert_eq!(
            AuthKey::canonicalize(&Auth::new("HOST"), 22).to_string(),
            "host:22"
        );
    }
}
