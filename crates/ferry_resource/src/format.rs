//! Type tags used for dispatch.
//!
//! Every registry in the engine (converters, drop routines, discover routines)
//! is keyed by [`ResourceType`], a small `Copy` value combining where the data
//! lives ([`Storage`]), how it is encoded ([`FormatId`]), and whether it is a
//! directory of such resources.

use serde::{Deserialize, Serialize};

/// Name of an encoding, e.g. `csv` or `jsonl`.
///
/// Format names are static strings chosen by the backend that registers them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FormatId(&'static str);

impl FormatId {
    /// Creates a format id.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the format name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl core::fmt::Debug for FormatId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FormatId({})", self.0)
    }
}

impl core::fmt::Display for FormatId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.0)
    }
}

/// The in-memory table format.
pub const RECORDS: FormatId = FormatId::new("records");

/// Where a resource's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Storage {
    /// Local filesystem.
    Local,
    /// Remote host, reached through a connection.
    Remote,
    /// Process memory.
    Memory,
}

/// A dispatch key: storage, format and directory-ness.
///
/// `Remote(csv)` and `Remote(json)` are distinct types for conversion but
/// share one drop routine; `directory(csv)` and `directory(json)` are distinct
/// to the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceType {
    storage: Storage,
    format: FormatId,
    directory: bool,
}

impl ResourceType {
    /// A local file of `format`.
    #[must_use]
    pub const fn local(format: FormatId) -> Self {
        Self::new(Storage::Local, format)
    }

    /// A remote file of `format`.
    #[must_use]
    pub const fn remote(format: FormatId) -> Self {
        Self::new(Storage::Remote, format)
    }

    /// The in-memory records table.
    #[must_use]
    pub const fn records() -> Self {
        Self::new(Storage::Memory, RECORDS)
    }

    /// A single resource with the given storage and format.
    #[must_use]
    pub const fn new(storage: Storage, format: FormatId) -> Self {
        Self {
            storage,
            format,
            directory: false,
        }
    }

    /// The directory-of-`self` type.
    #[must_use]
    pub const fn directory(self) -> Self {
        Self {
            directory: true,
            ..self
        }
    }

    /// The element type of a directory type, or `self` for single resources.
    #[must_use]
    pub const fn element(self) -> Self {
        Self {
            directory: false,
            ..self
        }
    }

    /// Returns the storage.
    #[must_use]
    pub const fn storage(&self) -> Storage {
        self.storage
    }

    /// Returns the format.
    #[must_use]
    pub const fn format(&self) -> FormatId {
        self.format
    }

    /// Returns true for directory types.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        self.directory
    }

    /// Returns true for remote storage.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.storage == Storage::Remote
    }
}

impl core::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.directory {
            f.write_str("directory(")?;
        }
        match self.storage {
            Storage::Local => write!(f, "{}", self.format)?,
            Storage::Remote => write!(f, "remote({})", self.format)?,
            Storage::Memory => write!(f, "memory({})", self.format)?,
        }
        if self.directory {
            f.write_str(")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: FormatId = FormatId::new("csv");

    #[test]
    fn display_names_nest() {
        assert_eq!(ResourceType::local(CSV).to_string(), "csv");
        assert_eq!(ResourceType::remote(CSV).to_string(), "remote(csv)");
        assert_eq!(
            ResourceType::remote(CSV).directory().to_string(),
            "directory(remote(csv))"
        );
        assert_eq!(ResourceType::records().to_string(), "memory(records)");
    }

    #[test]
    fn element_strips_directory() {
        let dir = ResourceType::local(CSV).directory();
        assert!(dir.is_directory());
        assert_eq!(dir.element(), ResourceType::local(CSV));
        assert_ne!(dir, ResourceType::local(FormatId::new("json")).directory());
    }
}
