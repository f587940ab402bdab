//! Core infrastructure plugins for Ferry.
//!
//! This crate provides the plugins most Ferry applications need:
//!
//! - [`TracingPlugin`] - Logging and observability via the `tracing` crate
//! - [`DefaultPlugins`] - Tracing plus every built-in backend
//! - [`MinimalPlugins`] - Every built-in backend, no subscriber
//!
//! # Example
//!
//! ```
//! use ferry_convert::{EngineBuilder, PluginGroup};
//! use ferry_core::MinimalPlugins;
//!
//! let engine = EngineBuilder::new()
//!     .add_plugins(MinimalPlugins.build())
//!     .build();
//! assert_eq!(engine.codecs().len(), 3);
//! ```
//!
//! # Individual Plugin Usage
//!
//! For fine-grained control, add plugins individually:
//!
//! ```
//! use ferry_backends::{CsvPlugin, LocalPlugin, RecordsPlugin};
//! use ferry_convert::EngineBuilder;
//! use ferry_core::TracingPlugin;
//! use tracing::Level;
//!
//! let engine = EngineBuilder::new()
//!     .add_plugins(TracingPlugin::default().with_level(Level::DEBUG))
//!     .add_plugins(RecordsPlugin)
//!     .add_plugins(LocalPlugin)
//!     .add_plugins(CsvPlugin)
//!     .build();
//! ```
//!
//! # Architecture
//!
//! - **Layer 1** (`ferry_remote`, `ferry_resource`): connections and resource values
//! - **Layer 2** (`ferry_convert`): plugins, planner and engine
//! - **Layer 3** (`ferry_backends`, `ferry_core`): concrete formats and storages

mod tracing_plugin;

pub use tracing_plugin::{TracingConfig, TracingFormat, TracingPlugin};

use ferry_backends::{CsvPlugin, JsonPlugin, LocalPlugin, RecordsPlugin, RemotePlugin};
use ferry_convert::{PluginGroup, PluginGroupBuilder};

/// Default plugins for most Ferry applications.
///
/// Includes:
/// - [`TracingPlugin`] - Logging and observability
/// - [`RecordsPlugin`] - The in-memory `records` type
/// - [`LocalPlugin`] - Local files
/// - [`RemotePlugin`] - Remote files
/// - [`CsvPlugin`] - `csv`
/// - [`JsonPlugin`] - `json` and `jsonl`
///
/// # Customization
///
/// ```
/// use ferry_convert::{EngineBuilder, PluginGroup};
/// use ferry_core::{DefaultPlugins, TracingFormat, TracingPlugin};
///
/// let engine = EngineBuilder::new()
///     .add_plugins(
///         DefaultPlugins
///             .build()
///             .disable::<TracingPlugin>()
///             .add(TracingPlugin::new().with_format(TracingFormat::Json)),
///     )
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct DefaultPlugins;

impl PluginGroup for DefaultPlugins {
    fn build(self) -> PluginGroupBuilder {
        MinimalPlugins.build().add_before::<TracingPlugin, RecordsPlugin>(TracingPlugin::default())
    }
}

/// Minimal plugins for headless or testing scenarios.
///
/// Every built-in format and storage, without tracing, making it suitable
/// for tests that install their own subscriber or none.
#[derive(Debug, Default)]
pub struct MinimalPlugins;

impl PluginGroup for MinimalPlugins {
    fn build(self) -> PluginGroupBuilder {
        PluginGroupBuilder::new()
            .add(RecordsPlugin)
            .add(LocalPlugin)
            .add(RemotePlugin)
            .add(CsvPlugin)
            .add(JsonPlugin)
    }
}
