//! Typed resource handles.

use crate::directory::{Directory, DirectoryRoot};
use crate::format::{FormatId, ResourceType, Storage};
use crate::records::Records;
use ferry_remote::{Auth, Connection};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a resource's data is.
#[derive(Debug, Clone)]
pub enum Location {
    /// A local file.
    Local {
        /// File path.
        path: PathBuf,
        /// Encoding.
        format: FormatId,
    },
    /// A file on a remote host.
    Remote {
        /// Owning connection, borrowed from the cache.
        connection: Arc<Connection>,
        /// Remote file path.
        path: String,
        /// Encoding.
        format: FormatId,
    },
    /// A directory of resources.
    Directory(Directory),
    /// An in-memory table.
    Memory(Arc<Records>),
}

/// A typed handle over a location.
///
/// Resources are value-like descriptors: building one never touches the
/// backing store, and cloning one is cheap. A temporary resource is the same
/// location tagged as disposable; dropping it uses the same routine as the
/// plain type.
#[derive(Debug, Clone)]
pub struct Resource {
    location: Location,
    temporary: bool,
}

impl Resource {
    /// Creates a resource over `location`.
    #[must_use]
    pub fn new(location: Location) -> Self {
        Self {
            location,
            temporary: false,
        }
    }

    /// A local file.
    #[must_use]
    pub fn local(path: impl Into<PathBuf>, format: FormatId) -> Self {
        Self::new(Location::Local {
            path: path.into(),
            format,
        })
    }

    /// A remote file reached through `connection`.
    #[must_use]
    pub fn remote(connection: Arc<Connection>, path: impl Into<String>, format: FormatId) -> Self {
        Self::new(Location::Remote {
            connection,
            path: path.into(),
            format,
        })
    }

    /// A directory.
    #[must_use]
    pub fn directory(directory: Directory) -> Self {
        Self::new(Location::Directory(directory))
    }

    /// An in-memory table.
    #[must_use]
    pub fn memory(records: impl Into<Arc<Records>>) -> Self {
        Self::new(Location::Memory(records.into()))
    }

    /// Marks the resource as disposable.
    #[must_use]
    pub fn into_temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    /// Sets the disposable flag.
    #[must_use]
    pub fn with_temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    /// Returns true for disposable resources.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Returns the location.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Returns the dispatch type. Temporariness is not part of it.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        match &self.location {
            Location::Local { format, .. } => ResourceType::local(*format),
            Location::Remote { format, .. } => ResourceType::remote(*format),
            Location::Directory(directory) => directory.resource_type(),
            Location::Memory(_) => ResourceType::records(),
        }
    }

    /// Returns the format (the element format for directories).
    #[must_use]
    pub fn format(&self) -> FormatId {
        self.resource_type().format()
    }

    /// Returns the storage.
    #[must_use]
    pub fn storage(&self) -> Storage {
        self.resource_type().storage()
    }

    /// Returns the local path of a local file.
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        match &self.location {
            Location::Local { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Returns the connection and path of a remote file.
    #[must_use]
    pub fn remote_file(&self) -> Option<(&Arc<Connection>, &str)> {
        match &self.location {
            Location::Remote {
                connection, path, ..
            } => Some((connection, path)),
            _ => None,
        }
    }

    /// Returns the connection of a remote file or remote directory.
    #[must_use]
    pub fn connection(&self) -> Option<&Arc<Connection>> {
        match &self.location {
            Location::Remote { connection, .. } => Some(connection),
            Location::Directory(directory) => match directory.root() {
                DirectoryRoot::Remote { connection, .. } => Some(connection),
                DirectoryRoot::Local(_) => None,
            },
            _ => None,
        }
    }

    /// Returns the auth fields of the owning connection.
    #[must_use]
    pub fn auth(&self) -> Option<&Auth> {
        self.connection().map(|c| c.auth())
    }

    /// Returns the directory, if this is one.
    #[must_use]
    pub fn as_directory(&self) -> Option<&Directory> {
        match &self.location {
            Location::Directory(directory) => Some(directory),
            _ => None,
        }
    }

    /// Returns the table, if this is in memory.
    #[must_use]
    pub fn as_records(&self) -> Option<&Arc<Records>> {
        match &self.location {
            Location::Memory(records) => Some(records),
            _ => None,
        }
    }

    /// Returns true if both handles name the same backing artifact.
    ///
    /// Remote files compare by canonical connection key and path; in-memory
    /// tables by identity.
    #[must_use]
    pub fn same_location(&self, other: &Self) -> bool {
        match (&self.location, &other.location) {
            (Location::Local { path: a, .. }, Location::Local { path: b, .. }) => a == b,
            (
                Location::Remote {
                    connection: ca,
                    path: pa,
                    ..
                },
                Location::Remote {
                    connection: cb,
                    path: pb,
                    ..
                },
            ) => ca.key() == cb.key() && pa == pb,
            (Location::Directory(a), Location::Directory(b)) => a.same_location(b),
            (Location::Memory(a), Location::Memory(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.location {
            Location::Local { path, .. } => write!(f, "{}", path.display())?,
            Location::Remote {
                connection, path, ..
            } => write!(f, "ssh://{}:{path}", connection.auth().destination())?,
            Location::Directory(directory) => write!(f, "{directory}")?,
            Location::Memory(records) => write!(f, "<{} records>", records.len())?,
        }
        write!(f, " [{}", self.resource_type())?;
        if self.temporary {
            f.write_str(", temporary")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_remote::{ConnectionCache, LoopbackConnector};

    const CSV: FormatId = FormatId::new("csv");

    #[test]
    fn temporary_does_not_change_type() {
        let plain = Resource::local("/tmp/a.csv", CSV);
        let temp = plain.clone().into_temporary();
        assert!(temp.is_temporary());
        assert_eq!(plain.resource_type(), temp.resource_type());
        assert!(plain.same_location(&temp));
        assert_eq!(temp.to_string(), "/tmp/a.csv [csv, temporary]");
    }

    #[test]
    fn remote_files_compare_by_key_and_path() {
        let cache = ConnectionCache::new(Arc::new(LoopbackConnector::new()));
        let a = cache.connect(&Auth::new("localhost")).unwrap();
        let b = cache.connect(&Auth::new("LocalHost").with_port(22)).unwrap();
        let ra = Resource::remote(a, "/data/x.csv", CSV);
        let rb = Resource::remote(b, "/data/x.csv", FormatId::new("json"));
        assert!(ra.same_location(&rb));
        assert_eq!(ra.resource_type(), ResourceType::remote(CSV));
        assert!(!ra.same_location(&Resource::local("/data/x.csv", CSV)));
        assert_eq!(ra.auth().unwrap().hostname(), "localhost");
    }

    #[test]
    fn directory_type_carries_element() {
        let dir = Resource::directory(Directory::new(DirectoryRoot::Local("/data".into()), CSV));
        assert_eq!(dir.resource_type(), ResourceType::local(CSV).directory());
        assert_eq!(dir.format(), CSV);
        assert!(dir.as_directory().is_some());
    }

    #[test]
    fn memory_identity() {
        let records = Arc::new(Records::new(["a"]));
        let a = Resource::memory(Arc::clone(&records));
        let b = Resource::memory(records);
        assert!(a.same_location(&b));
        assert!(!a.same_location(&Resource::memory(Records::new(["a"]))));
        assert_eq!(a.storage(), Storage::Memory);
    }
}
