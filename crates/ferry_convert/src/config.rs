//! Engine configuration.

use ferry_remote::DEFAULT_SSH_PORT;
use std::path::{Path, PathBuf};

/// Environment variable overriding [`EngineConfig::temp_dir`].
pub const TEMP_DIR_ENV: &str = "FERRY_TEMP_DIR";
/// Environment variable overriding [`EngineConfig::remote_temp_dir`].
pub const REMOTE_TEMP_DIR_ENV: &str = "FERRY_REMOTE_TEMP_DIR";
/// Environment variable overriding [`EngineConfig::default_port`].
pub const DEFAULT_PORT_ENV: &str = "FERRY_DEFAULT_PORT";

/// Where the engine stages temporaries and how it canonicalizes auth.
///
/// # Example
///
/// ```
/// use ferry_convert::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_temp_dir("/var/tmp/ferry")
///     .with_remote_temp_dir("/scratch");
/// assert_eq!(config.remote_temp_dir(), "/scratch");
/// assert_eq!(config.default_port(), 22);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    temp_dir: PathBuf,
    remote_temp_dir: String,
    default_port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            remote_temp_dir: "/tmp".to_string(),
            default_port: DEFAULT_SSH_PORT,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from `FERRY_*` environment variables on top of the
    /// defaults. Unparseable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup(TEMP_DIR_ENV).filter(|v| !v.is_empty()) {
            config.temp_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(REMOTE_TEMP_DIR_ENV).filter(|v| !v.is_empty()) {
            config.remote_temp_dir = dir;
        }
        if let Some(port) = lookup(DEFAULT_PORT_ENV) {
            match port.parse::<u16>() {
                Ok(port) if port != 0 => config.default_port = port,
                _ => tracing::warn!(value = %port, "ignoring invalid {DEFAULT_PORT_ENV}"),
            }
        }
        config
    }

    /// Sets the local staging directory.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Sets the remote staging directory.
    #[must_use]
    pub fn with_remote_temp_dir(mut self, dir: impl Into<String>) -> Self {
        self.remote_temp_dir = dir.into();
        self
    }

    /// Sets the port assumed when auth fields omit one.
    #[must_use]
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    /// Returns the local staging directory.
    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Returns the remote staging directory.
    #[must_use]
    pub fn remote_temp_dir(&self) -> &str {
        &self.remote_temp_dir
    }

    /// Returns the default SSH port.
    #[must_use]
    pub fn default_port(&self) -> u16 {
        self.default_port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            (TEMP_DIR_ENV, "/work/tmp"),
            (REMOTE_TEMP_DIR_ENV, "/remote/tmp"),
            (DEFAULT_PORT_ENV, "2222"),
        ]));
        assert_eq!(config.temp_dir(), Path::new("/work/tmp"));
        assert_eq!(config.remote_temp_dir(), "/remote/tmp");
        assert_eq!(config.default_port(), 2222);
    }

    #[test]
    fn invalid_port_is_ignored() {
        let config = EngineConfig::from_lookup(lookup(&[(DEFAULT_PORT_ENV, "ssh")]));
        assert_eq!(config.default_port(), DEFAULT_SSH_PORT);
        let config = EngineConfig::from_lookup(lookup(&[(DEFAULT_PORT_ENV, "0")]));
        assert_eq!(config.default_port(), DEFAULT_SSH_PORT);
    }

    #[test]
    fn empty_values_keep_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[(REMOTE_TEMP_DIR_ENV, "")]));
        assert_eq!(config.remote_temp_dir(), "/tmp");
    }
}
