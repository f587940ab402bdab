//! Resource identifier parsing.
//!
//! # Grammar
//!
//! ```text
//! remote := [scheme "://"] [user "@"] host ":" [port (":" | "/")] path
//! local  := ["file://"] path
//! ```
//!
//! - `scheme` is `ssh`, `sftp` or `scp`; it may be omitted when the
//!   `[user@]host:path` shape is unambiguous.
//! - The host spec ends at the *first* `:`. Everything after it belongs to the
//!   path (after an optional port), so paths may contain `:` and `@`.
//! - A port is a run of digits directly after the host separator, followed by
//!   either `:` (`host:2222:/data`) or `/` (`host:2222/data`).
//! - Bracketed IPv6 hosts (`[::1]:/data`) are accepted.
//! - A single drive letter followed by `:\` or `:/` (`C:\data`) is a local
//!   Windows path, not a host.
//!
//! # Globs and directories
//!
//! When the final path segment contains a glob (`*.csv`), the descriptor's
//! path is truncated to the containing directory (trailing `/` kept), the
//! segment is kept as the [`pattern`](ResourceDescriptor::pattern), and the
//! pattern's extension becomes the [`type_hint`](ResourceDescriptor::type_hint).
//! A path ending in `/` is also a directory, without a pattern.

use crate::error::ResourceError;
use ferry_remote::Auth;

/// Schemes accepted for remote identifiers.
const REMOTE_SCHEMES: &[&str] = &["ssh", "sftp", "scp"];

/// Characters that make a path segment a glob.
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Where a resource lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// A path on the local filesystem.
    Local,
    /// A path on a host reachable through the secure transport.
    Remote,
}

/// A parsed resource identifier.
///
/// Immutable once parsed; the Resource Constructor reads it and applies
/// caller overrides on its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    scheme: Scheme,
    auth: Option<Auth>,
    path: String,
    type_hint: Option<String>,
    pattern: Option<String>,
    directory: bool,
}

impl ResourceDescriptor {
    /// Returns the scheme.
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the parsed auth fields, present for remote identifiers.
    #[must_use]
    pub fn auth(&self) -> Option<&Auth> {
        self.auth.as_ref()
    }

    /// Returns the path. For globs this is the containing directory.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the lower-cased extension of the file or glob, if any.
    #[must_use]
    pub fn type_hint(&self) -> Option<&str> {
        self.type_hint.as_deref()
    }

    /// Returns the glob pattern stripped from the path, if any.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// Returns true if the identifier names a directory of resources.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.directory
    }

    /// Returns true for remote identifiers.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.scheme == Scheme::Remote
    }
}

impl core::fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(auth) = &self.auth {
            f.write_str("ssh://")?;
            if let Some(user) = auth.username() {
                write!(f, "{user}@")?;
            }
            if auth.hostname().contains(':') {
                write!(f, "[{}]", auth.hostname())?;
            } else {
                f.write_str(auth.hostname())?;
            }
            if let Some(port) = auth.port() {
                write!(f, ":{port}")?;
            }
            f.write_str(":")?;
        }
        f.write_str(&self.path)?;
        if let Some(pattern) = &self.pattern {
            f.write_str(pattern)?;
        }
        Ok(())
    }
}

/// Parses a resource identifier.
///
/// # Errors
///
/// Returns [`ResourceError::MalformedUri`] when the string fits neither
/// grammar: empty input, unsupported scheme, empty user/host/path, an invalid
/// port, or a glob outside the final path segment.
///
/// # Example
///
/// ```
/// use ferry_resource::uri::{parse, Scheme};
///
/// let d = parse("ssh://joe@localhost:/path/to/*.csv").unwrap();
/// assert_eq!(d.scheme(), Scheme::Remote);
/// assert_eq!(d.auth().unwrap().username(), Some("joe"));
/// assert_eq!(d.path(), "/path/to/");
/// assert_eq!(d.pattern(), Some("*.csv"));
/// assert_eq!(d.type_hint(), Some("csv"));
/// ```
pub fn parse(uri: &str) -> Result<ResourceDescriptor, ResourceError> {
    let input = uri.trim();
    if input.is_empty() {
        return Err(ResourceError::malformed(uri, "empty identifier"));
    }

    if let Some((scheme, rest)) = input.split_once("://") {
        let scheme = scheme.to_ascii_lowercase();
        return if REMOTE_SCHEMES.contains(&scheme.as_str()) {
            parse_remote(uri, rest)
        } else if scheme == "file" {
            parse_local(uri, rest)
        } else {
            Err(ResourceError::malformed(
                uri,
                format!("unsupported scheme '{scheme}'"),
            ))
        };
    }

    if looks_remote(input) {
        parse_remote(uri, input)
    } else {
        parse_local(uri, input)
    }
}

/// Returns true if a scheme-less identifier has the `[user@]host:path` shape.
fn looks_remote(input: &str) -> bool {
    if input.starts_with(['/', '.', '~', '\\']) {
        return false;
    }
    if input.starts_with('[') {
        return input.contains("]:");
    }
    let Some((prefix, rest)) = input.split_once(':') else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }
    let host = prefix.rsplit_once('@').map_or(prefix, |(_, host)| host);
    // `C:\data` and `C:/data` are drive letters.
    if host.len() == 1 && host.chars().all(|c| c.is_ascii_alphabetic()) && rest.starts_with(['\\', '/']) {
        return false;
    }
    !prefix.contains(['/', '\\']) && is_hostname(host)
}

fn is_hostname(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

fn parse_remote(uri: &str, rest: &str) -> Result<ResourceDescriptor, ResourceError> {
    let (user, host_and_path) = match rest.split_once('@') {
        // Only an `@` before the host separator introduces a user.
        Some((user, tail)) if !user.contains(':') && !user.contains('/') => (Some(user), tail),
        _ => (None, rest),
    };
    if user.is_some_and(str::is_empty) {
        return Err(ResourceError::malformed(uri, "empty user name"));
    }

    let (host, after_host) = if let Some(bracketed) = host_and_path.strip_prefix('[') {
        let (host, tail) = bracketed
            .split_once(']')
            .ok_or_else(|| ResourceError::malformed(uri, "unterminated '[' in host"))?;
        let tail = tail
            .strip_prefix(':')
            .ok_or_else(|| ResourceError::malformed(uri, "missing ':' after host"))?;
        (host, tail)
    } else {
        let (host, tail) = host_and_path
            .split_once(':')
            .ok_or_else(|| ResourceError::malformed(uri, "missing ':' between host and path"))?;
        if !is_hostname(host) {
            return Err(ResourceError::malformed(
                uri,
                format!("invalid host '{host}'"),
            ));
        }
        (host, tail)
    };
    if host.is_empty() {
        return Err(ResourceError::malformed(uri, "empty host"));
    }

    let (port, path) = split_port(uri, after_host)?;
    if path.is_empty() {
        return Err(ResourceError::malformed(uri, "empty path"));
    }

    let mut auth = Auth::new(host);
    if let Some(user) = user {
        auth = auth.with_username(user);
    }
    if let Some(port) = port {
        auth = auth.with_port(port);
    }

    let mut descriptor = split_path(uri, path)?;
    descriptor.scheme = Scheme::Remote;
    descriptor.auth = Some(auth);
    Ok(descriptor)
}

/// Splits an optional leading port off the text after the host separator.
fn split_port<'a>(uri: &str, after_host: &'a str) -> Result<(Option<u16>, &'a str), ResourceError> {
    let digits = after_host
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after_host.len());
    if digits == 0 {
        return Ok((None, after_host));
    }
    let (number, tail) = after_host.split_at(digits);
    let path = match tail.chars().next() {
        Some(':') => &tail[1..],
        Some('/') => tail,
        // Digits not followed by a separator are part of a relative path.
        _ => return Ok((None, after_host)),
    };
    let port = number
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| ResourceError::malformed(uri, format!("invalid port '{number}'")))?;
    Ok((Some(port), path))
}

fn parse_local(uri: &str, path: &str) -> Result<ResourceDescriptor, ResourceError> {
    if path.is_empty() {
        return Err(ResourceError::malformed(uri, "empty path"));
    }
    split_path(uri, path)
}

/// Detects directories, globs and the extension hint.
fn split_path(uri: &str, path: &str) -> Result<ResourceDescriptor, ResourceError> {
    let (dir, last) = match path.rfind('/') {
        Some(idx) => path.split_at(idx + 1),
        None => ("", path),
    };

    if dir.contains(GLOB_META) {
        return Err(ResourceError::malformed(
            uri,
            "glob patterns are only supported in the final path segment",
        ));
    }

    let mut descriptor = ResourceDescriptor {
        scheme: Scheme::Local,
        auth: None,
        path: path.to_string(),
        type_hint: None,
        pattern: None,
        directory: false,
    };

    if last.contains(GLOB_META) {
        descriptor.path = if dir.is_empty() { "./".to_string() } else { dir.to_string() };
        descriptor.pattern = Some(last.to_string());
        descriptor.directory = true;
        descriptor.type_hint = extension(last).filter(|ext| !ext.contains(GLOB_META));
    } else if last.is_empty() {
        descriptor.directory = true;
    } else {
        descriptor.type_hint = extension(last);
    }
    Ok(descriptor)
}

fn extension(segment: &str) -> Option<String> {
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
