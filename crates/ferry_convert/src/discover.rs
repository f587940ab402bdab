//! Type-indexed schema discovery.
//!
//! Lookup follows the drop dispatcher: exact type first, then storage.
//! Routines for different storages of one format must agree, so that a local
//! file and a remote copy of it discover the same [`Schema`].

use crate::engine::Engine;
use crate::error::BoxError;
use ferry_resource::{Resource, ResourceType, Schema, Storage};
use hashbrown::HashMap;
use std::sync::Arc;

/// Signature of a discover routine.
pub type DiscoverFn = dyn Fn(&Resource, &Engine) -> Result<Schema, BoxError> + Send + Sync;

/// Discover routines by exact type and by storage.
#[derive(Default)]
pub struct DiscoverRegistry {
    exact: HashMap<ResourceType, Arc<DiscoverFn>>,
    by_storage: HashMap<Storage, Arc<DiscoverFn>>,
}

impl core::fmt::Debug for DiscoverRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DiscoverRegistry")
            .field("exact", &self.exact.keys().collect::<Vec<_>>())
            .field("by_storage", &self.by_storage.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DiscoverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a routine for one type.
    pub fn register(
        &mut self,
        ty: ResourceType,
        f: impl Fn(&Resource, &Engine) -> Result<Schema, BoxError> + Send + Sync + 'static,
    ) {
        self.exact.insert(ty, Arc::new(f));
    }

    /// Registers a routine for every file type on `storage`.
    pub fn register_for_storage(
        &mut self,
        storage: Storage,
        f: impl Fn(&Resource, &Engine) -> Result<Schema, BoxError> + Send + Sync + 'static,
    ) {
        self.by_storage.insert(storage, Arc::new(f));
    }

    /// Returns the routine that applies to `ty`.
    #[must_use]
    pub fn routine_for(&self, ty: ResourceType) -> Option<&Arc<DiscoverFn>> {
        self.exact
            .get(&ty)
            .or_else(|| self.by_storage.get(&ty.storage()))
    }
}
