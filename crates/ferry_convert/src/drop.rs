//! Type-indexed cleanup routines.
//!
//! A drop routine is selected by the resource's [`ResourceType`]. An exact
//! registration wins; otherwise the routine registered for the resource's
//! [`Storage`] applies to every format on that storage. This is how every
//! remote format shares one remote-delete routine.
//!
//! Routines must treat an absent artifact as success.

use crate::engine::Engine;
use crate::error::BoxError;
use ferry_resource::{Resource, ResourceType, Storage};
use hashbrown::HashMap;
use std::sync::Arc;

/// Signature of a drop routine.
pub type DropFn = dyn Fn(&Resource, &Engine) -> Result<(), BoxError> + Send + Sync;

/// A named drop routine.
#[derive(Clone)]
pub struct DropRoutine {
    name: String,
    f: Arc<DropFn>,
}

impl core::fmt::Debug for DropRoutine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DropRoutine").field("name", &self.name).finish_non_exhaustive()
    }
}

impl DropRoutine {
    /// Creates a routine.
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&Resource, &Engine) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    /// Returns the routine's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if both handles share one routine.
    #[must_use]
    pub fn same_routine(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }

    pub(crate) fn run(&self, resource: &Resource, engine: &Engine) -> Result<(), BoxError> {
        (self.f)(resource, engine)
    }
}

/// Drop routines by exact type and by storage.
#[derive(Debug, Default)]
pub struct DropRegistry {
    exact: HashMap<ResourceType, DropRoutine>,
    by_storage: HashMap<Storage, DropRoutine>,
}

impl DropRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a routine for one type.
    pub fn register(&mut self, ty: ResourceType, routine: DropRoutine) {
        self.exact.insert(ty, routine);
    }

    /// Registers a routine for every file type on `storage`.
    pub fn register_for_storage(&mut self, storage: Storage, routine: DropRoutine) {
        self.by_storage.insert(storage, routine);
    }

    /// Returns the routine that applies to `ty`.
    #[must_use]
    pub fn routine_for(&self, ty: ResourceType) -> Option<&DropRoutine> {
        self.exact
            .get(&ty)
            .or_else(|| self.by_storage.get(&ty.storage()))
    }
}
