//! Per-conversion staging scope.
//!
//! A [`Session`] lives for one [`Engine::convert`] call. Every fresh
//! destination a converter allocates through it is recorded as *staged*.
//! After each plan step the engine drops every staged resource except the
//! step's output; when a step fails it drops everything staged since the plan
//! started. The final result is committed (handed to the caller) and is the
//! only allocation that survives.
//!
//! If a converter panics, the session's `Drop` still drops whatever is
//! staged.

use crate::codec::Params;
use crate::engine::{ConvertOptions, Engine};
use crate::error::EngineError;
use ferry_remote::Connection;
use ferry_resource::directory::join_remote;
use ferry_resource::{Directory, DirectoryRoot, Resource, ResourceType, Storage};
use std::sync::Arc;

/// Where a converter should put its output.
#[derive(Debug, Clone)]
pub enum Destination {
    /// Overwrite this resource.
    Existing(Resource),
    /// Materialize a new resource of this type.
    Fresh {
        /// Type to create.
        ty: ResourceType,
        /// True if the caller asked for a disposable result.
        temporary: bool,
    },
}

impl Destination {
    /// Returns the type the converter must produce.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Existing(resource) => resource.resource_type(),
            Self::Fresh { ty, .. } => *ty,
        }
    }
}

/// Staging scope handed to converters.
pub struct Session<'a> {
    engine: &'a Engine,
    options: &'a ConvertOptions,
    connections: Vec<Arc<Connection>>,
    staged: Vec<Resource>,
}

impl core::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("staged", &self.staged.iter().map(ToString::to_string).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<'a> Session<'a> {
    /// Opens a session.
    ///
    /// `known` are connections already in play (the target's, the
    /// source's); fresh remote resources reuse the first of them unless the
    /// options carry auth.
    pub(crate) fn new(
        engine: &'a Engine,
        options: &'a ConvertOptions,
        known: impl IntoIterator<Item = Arc<Connection>>,
    ) -> Self {
        Self {
            engine,
            options,
            connections: known.into_iter().collect(),
            staged: Vec::new(),
        }
    }

    /// Returns the engine.
    #[must_use]
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Returns the codec parameters for this conversion.
    #[must_use]
    pub fn params(&self) -> &'a Params {
        &self.options.params
    }

    /// Returns the connection fresh remote resources are created on.
    ///
    /// Explicit auth in the options wins, then the connection of the target,
    /// then that of the source.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AmbiguousResource`] when nothing names a host,
    /// or the dial error.
    pub fn connection(&mut self) -> Result<Arc<Connection>, EngineError> {
        if let Some(auth) = &self.options.auth {
            let connection = self.engine.connect(auth)?;
            self.connections.insert(0, Arc::clone(&connection));
            return Ok(connection);
        }
        self.connections.first().cloned().ok_or_else(|| {
            EngineError::ambiguous("a fresh remote resource needs auth naming its host")
        })
    }

    /// Returns `destination` as a concrete resource, allocating fresh ones.
    ///
    /// # Errors
    ///
    /// See [`allocate`](Self::allocate).
    pub fn target(&mut self, destination: &Destination) -> Result<Resource, EngineError> {
        match destination {
            Destination::Existing(resource) => Ok(resource.clone()),
            Destination::Fresh { ty, temporary } => {
                Ok(self.allocate(*ty)?.with_temporary(*temporary))
            }
        }
    }

    /// Allocates a new, empty location of type `ty` and stages it.
    ///
    /// Local files go under the configured temp dir, remote files under the
    /// remote temp dir. Directories are created immediately; files are not.
    ///
    /// # Errors
    ///
    /// Fails for in-memory types (converters build those directly), when no
    /// connection is available for a remote type, or when a directory cannot
    /// be created.
    pub fn allocate(&mut self, ty: ResourceType) -> Result<Resource, EngineError> {
        let config = self.engine.config();
        let name = format!("ferry-{}", nanoid::nanoid!());
        let ext = self.engine.codecs().extension(ty.format());

        let resource = match (ty.storage(), ty.is_directory()) {
            (Storage::Memory, _) => {
                return Err(EngineError::unknown_format(format!(
                    "cannot allocate storage for {ty}"
                )));
            }
            (Storage::Local, false) => {
                std::fs::create_dir_all(config.temp_dir())?;
                Resource::local(config.temp_dir().join(format!("{name}.{ext}")), ty.format())
            }
            (Storage::Remote, false) => {
                let connection = self.connection()?;
                let path = join_remote(config.remote_temp_dir(), &format!("{name}.{ext}"));
                Resource::remote(connection, path, ty.format())
            }
            (Storage::Local, true) => {
                let root = DirectoryRoot::Local(config.temp_dir().join(&name));
                root.create()?;
                Resource::directory(Directory::new(root, ty.format()))
            }
            (Storage::Remote, true) => {
                let connection = self.connection()?;
                let path = join_remote(config.remote_temp_dir(), &format!("{name}/"));
                let root = DirectoryRoot::Remote { connection, path };
                root.create()?;
                Resource::directory(Directory::new(root, ty.format()))
            }
        }
        .into_temporary();

        tracing::trace!(resource = %resource, "staged");
        self.staged.push(resource.clone());
        Ok(resource)
    }

    /// Returns a marker for the current staging depth.
    pub(crate) fn mark(&self) -> usize {
        self.staged.len()
    }

    /// Drops everything staged since `mark` except `keep`.
    pub(crate) fn release(&mut self, mark: usize, keep: &Resource) {
        let mut kept = Vec::new();
        for resource in self.staged.drain(mark.min(self.staged.len())..).collect::<Vec<_>>() {
            if resource.same_location(keep) {
                kept.push(resource);
            } else {
                self.engine.drop_quietly(&resource);
            }
        }
        self.staged.extend(kept);
    }

    /// Drops everything staged since `mark`.
    pub(crate) fn rollback(&mut self, mark: usize) {
        let doomed: Vec<_> = self.staged.drain(mark.min(self.staged.len())..).collect();
        for resource in doomed.iter().rev() {
            self.engine.drop_quietly(resource);
        }
    }

    /// Hands `result` to the caller: it is no longer dropped with the session.
    pub(crate) fn commit(&mut self, result: &Resource) {
        self.staged.retain(|staged| !staged.same_location(result));
    }

    /// Returns the resources currently staged.
    #[must_use]
    pub fn staged(&self) -> &[Resource] {
        &self.staged
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if !self.staged.is_empty() {
            tracing::debug!(count = self.staged.len(), "dropping leftover staged resources");
            self.rollback(0);
        }
    }
}
