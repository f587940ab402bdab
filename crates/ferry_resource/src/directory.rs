//! Directories of homogeneous resources.
//!
//! A [`Directory`] is a base location, an optional glob, and the format of
//! its members. Membership is never cached: each call to
//! [`members`](Directory::members) lists the backing store again, since a
//! remote directory may change between calls.

use crate::error::ResourceError;
use crate::format::{FormatId, ResourceType, Storage};
use crate::resource::Resource;
use ferry_remote::{Connection, ConnectionError};
use globset::{GlobBuilder, GlobMatcher};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a directory's members live.
#[derive(Debug, Clone)]
pub enum DirectoryRoot {
    /// A local directory.
    Local(PathBuf),
    /// A directory on a remote host.
    Remote {
        /// Owning connection.
        connection: Arc<Connection>,
        /// Remote directory path.
        path: String,
    },
}

impl DirectoryRoot {
    /// Returns the storage of the root and its members.
    #[must_use]
    pub fn storage(&self) -> Storage {
        match self {
            Self::Local(_) => Storage::Local,
            Self::Remote { .. } => Storage::Remote,
        }
    }

    /// Returns the path of a member named `name`.
    #[must_use]
    pub fn child_path(&self, name: &str) -> String {
        match self {
            Self::Local(path) => path.join(name).to_string_lossy().into_owned(),
            Self::Remote { path, .. } => join_remote(path, name),
        }
    }

    /// Lists the regular, non-hidden files under the root, sorted.
    ///
    /// A root that does not exist has no files.
    ///
    /// # Errors
    ///
    /// Returns I/O or connection failures other than "not found".
    pub fn files(&self) -> Result<Vec<String>, ResourceError> {
        let mut names = match self {
            Self::Local(path) => match std::fs::read_dir(path) {
                Ok(entries) => {
                    let mut names = Vec::new();
                    for entry in entries {
                        let entry = entry?;
                        if entry.file_type()?.is_file() {
                            names.push(entry.file_name().to_string_lossy().into_owned());
                        }
                    }
                    names
                }
                Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
                Err(err) => return Err(err.into()),
            },
            Self::Remote { connection, path } => match connection.list(path) {
                Ok(names) => names.into_iter().filter(|n| !n.ends_with('/')).collect(),
                Err(err) if err.is_not_found() => Vec::new(),
                Err(err) => return Err(err.into()),
            },
        };
        names.retain(|name| !name.starts_with('.'));
        names.sort();
        tracing::debug!(root = %self, files = names.len(), "listed directory");
        Ok(names)
    }

    /// Creates the root directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns I/O or connection failures.
    pub fn create(&self) -> Result<(), ResourceError> {
        match self {
            Self::Local(path) => std::fs::create_dir_all(path)?,
            Self::Remote { connection, path } => connection.create_dir(path)?,
        }
        Ok(())
    }

    /// Removes the root if it is empty. Absent or non-empty roots are left
    /// alone.
    ///
    /// # Errors
    ///
    /// Returns unexpected I/O or connection failures.
    pub fn remove_if_empty(&self) -> Result<(), ResourceError> {
        match self {
            Self::Local(path) => match std::fs::remove_dir(path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => Ok(()),
                Err(err) => Err(err.into()),
            },
            Self::Remote { connection, path } => {
                if connection.list(path).is_ok_and(|names| !names.is_empty()) {
                    return Ok(());
                }
                match connection.remove_dir(path) {
                    Ok(()) => Ok(()),
                    Err(err) if err.is_not_found() => Ok(()),
                    Err(ConnectionError::Command { .. }) => Ok(()),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    fn same_place(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Local(a), Self::Local(b)) => a == b,
            (
                Self::Remote { connection: a, path: pa },
                Self::Remote { connection: b, path: pb },
            ) => a.key() == b.key() && pa == pb,
            _ => false,
        }
    }
}

impl core::fmt::Display for DirectoryRoot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote { connection, path } => {
                write!(f, "ssh://{}:{path}", connection.auth().destination())
            }
        }
    }
}

/// Joins a remote directory and a name with `/`.
#[must_use]
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// A directory of resources sharing one format.
#[derive(Debug, Clone)]
pub struct Directory {
    root: DirectoryRoot,
    pattern: Option<String>,
    extensions: Vec<String>,
    element: FormatId,
}

impl Directory {
    /// Creates a directory whose members have format `element`.
    #[must_use]
    pub fn new(root: DirectoryRoot, element: FormatId) -> Self {
        Self {
            root,
            pattern: None,
            extensions: Vec::new(),
            element,
        }
    }

    /// Restricts members to names matching a glob.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Restricts members to files with one of `extensions`, compared without
    /// regard to case. An empty set admits every file.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Returns the root.
    #[must_use]
    pub fn root(&self) -> &DirectoryRoot {
        &self.root
    }

    /// Returns the glob, if any.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// Returns the member extensions, empty if unrestricted.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Returns the member format.
    #[must_use]
    pub fn element(&self) -> FormatId {
        self.element
    }

    /// Returns the type of each member.
    #[must_use]
    pub fn subtype(&self) -> ResourceType {
        ResourceType::new(self.root.storage(), self.element)
    }

    /// Returns the directory's own dispatch type.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.subtype().directory()
    }

    /// Returns the names of the current members.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::MalformedUri`] for an invalid glob, or the
    /// listing failure.
    pub fn member_names(&self) -> Result<Vec<String>, ResourceError> {
        let matcher = self.matcher()?;
        let mut names = self.root.files()?;
        if let Some(matcher) = matcher {
            names.retain(|name| matcher.is_match(name));
        }
        if !self.extensions.is_empty() {
            names.retain(|name| self.admits_extension(name));
        }
        Ok(names)
    }

    /// Lists the current members.
    ///
    /// The listing happens now; the returned iterator builds each member
    /// resource as it is pulled. Call again to see later changes.
    ///
    /// # Errors
    ///
    /// See [`member_names`](Self::member_names).
    pub fn members(&self) -> Result<Members, ResourceError> {
        Ok(Members {
            root: self.root.clone(),
            element: self.element,
            names: self.member_names()?.into_iter(),
        })
    }

    /// Returns the member resource called `name`, whether or not it exists.
    #[must_use]
    pub fn child(&self, name: &str) -> Resource {
        member(&self.root, self.element, name)
    }

    /// Returns true if both name the same root and pattern.
    #[must_use]
    pub fn same_location(&self, other: &Self) -> bool {
        self.root.same_place(&other.root) && self.pattern == other.pattern
    }

    fn admits_extension(&self, name: &str) -> bool {
        std::path::Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.contains(&ext))
    }

    fn matcher(&self) -> Result<Option<GlobMatcher>, ResourceError> {
        let Some(pattern) = &self.pattern else {
            return Ok(None);
        };
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|err| ResourceError::malformed(pattern.clone(), err.to_string()))?;
        Ok(Some(glob.compile_matcher()))
    }
}

impl core::fmt::Display for Directory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.root)?;
        if let Some(pattern) = &self.pattern {
            f.write_str(pattern)?;
        }
        Ok(())
    }
}

fn member(root: &DirectoryRoot, element: FormatId, name: &str) -> Resource {
    match root {
        DirectoryRoot::Local(path) => Resource::local(path.join(name), element),
        DirectoryRoot::Remote { connection, path } => {
            Resource::remote(Arc::clone(connection), join_remote(path, name), element)
        }
    }
}

/// Iterator over a directory listing.
#[derive(Debug)]
pub struct Members {
    root: DirectoryRoot,
    element: FormatId,
    names: std::vec::IntoIter<String>,
}

impl Iterator for Members {
    type Item = Resource;

    fn next(&mut self) -> Option<Resource> {
        let name = self.names.next()?;
        Some(member(&self.root, self.element, &name))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.names.size_hint()
    }
}

impl ExactSizeIterator for Members {}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_remote::{Auth, ConnectionCache, LoopbackConnector};
    use std::fs;

    const CSV: FormatId = FormatId::new("csv");

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.csv", "b.csv", "c.json", ".hidden.csv"] {
            fs::write(dir.path().join(name), "x\n1\n").unwrap();
        }
        fs::create_dir(dir.path().join("nested.csv")).unwrap();
        dir
    }

    #[test]
    fn local_members_follow_the_glob() {
        let dir = fixture();
        let directory =
            Directory::new(DirectoryRoot::Local(dir.path().to_path_buf()), CSV).with_pattern("*.csv");
        assert_eq!(directory.member_names().unwrap(), vec!["a.csv", "b.csv"]);
        let members: Vec<_> = directory.members().unwrap().collect();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].resource_type(), ResourceType::local(CSV));
    }

    #[test]
    fn extensions_exclude_foreign_files() {
        let dir = fixture();
        fs::write(dir.path().join("README"), "read me\n").unwrap();
        fs::write(dir.path().join("E.CSV"), "x\n").unwrap();
        let directory = Directory::new(DirectoryRoot::Local(dir.path().to_path_buf()), CSV)
            .with_extensions([".csv"]);
        assert_eq!(directory.extensions(), ["csv"]);
        assert_eq!(
            directory.member_names().unwrap(),
            vec!["E.CSV", "a.csv", "b.csv"]
        );
    }

    #[test]
    fn membership_is_relisted_each_call() {
        let dir = fixture();
        let directory =
            Directory::new(DirectoryRoot::Local(dir.path().to_path_buf()), CSV).with_pattern("*.csv");
        assert_eq!(directory.members().unwrap().len(), 2);
        fs::write(dir.path().join("d.csv"), "x\n").unwrap();
        assert_eq!(directory.members().unwrap().len(), 3);
    }

    #[test]
    fn remote_members_use_the_connection() {
        let dir = fixture();
        let cache = ConnectionCache::new(Arc::new(LoopbackConnector::new()));
        let connection = cache.connect(&Auth::new("localhost")).unwrap();
        let root = DirectoryRoot::Remote {
            connection,
            path: dir.path().to_string_lossy().into_owned(),
        };
        let directory = Directory::new(root, CSV).with_pattern("*.csv");
        let members: Vec<_> = directory.members().unwrap().collect();
        assert_eq!(members.len(), 2);
        assert!(members.iter().all(|m| m.resource_type() == ResourceType::remote(CSV)));
        assert_eq!(directory.resource_type(), ResourceType::remote(CSV).directory());
    }

    #[test]
    fn missing_root_has_no_members() {
        let directory = Directory::new(DirectoryRoot::Local("/nonexistent/ferry".into()), CSV);
        assert!(directory.member_names().unwrap().is_empty());
    }

    #[test]
    fn invalid_glob_is_malformed() {
        let directory = Directory::new(DirectoryRoot::Local(".".into()), CSV).with_pattern("[");
        assert!(matches!(
            directory.member_names(),
            Err(ResourceError::MalformedUri { .. })
        ));
    }

    #[test]
    fn remove_if_empty_keeps_populated_directories() {
        let dir = fixture();
        let root = DirectoryRoot::Local(dir.path().to_path_buf());
        root.remove_if_empty().unwrap();
        assert!(dir.path().exists());

        let empty = DirectoryRoot::Local(dir.path().join("nested.csv"));
        empty.remove_if_empty().unwrap();
        assert!(!dir.path().join("nested.csv").exists());
        empty.remove_if_empty().unwrap();
    }

    #[test]
    fn remote_join() {
        assert_eq!(join_remote("/tmp/", "a.csv"), "/tmp/a.csv");
        assert_eq!(join_remote("/tmp", "a.csv"), "/tmp/a.csv");
        assert_eq!(join_remote("", "a.csv"), "a.csv");
    }
}
