//! # Ferry Internal Library
//!
//! Re-exports the core Ferry crates for convenience.

/// Layer 1: Remote connections and their cache.
pub use ferry_remote;

/// Layer 1: Resource identifiers, types and values.
pub use ferry_resource;

/// Layer 2: Plugins, conversion planning and the engine.
pub use ferry_convert;

/// Layer 3: Built-in formats and storages.
pub use ferry_backends;

/// Layer 3: Tracing and plugin groups.
pub use ferry_core;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use ferry_backends::{CSV, JSON, JSON_LINES};
    pub use ferry_convert::{
        ConvertOptions, Engine, EngineBuilder, EngineConfig, EngineError, Overrides, Plan,
        Plugin, PluginGroup, PluginId, Target,
    };
    pub use ferry_core::{DefaultPlugins, MinimalPlugins, TracingFormat, TracingPlugin};
    pub use ferry_remote::{Auth, Connection, ConnectionError};
    pub use ferry_resource::{FormatId, Records, Resource, ResourceType, Schema, Storage};
}
