//! Converter registry, planner and resource lifecycle for Ferry.
//!
//! `ferry_convert` is format-agnostic. It provides:
//!
//! - [`plugin`] - the plugin lifecycle backends register through
//! - [`codec`] - the byte-level [`Codec`] boundary
//! - [`registry`] - converter edges keyed by `(from, to)` type
//! - [`planner`] - shortest-path planning over those edges
//! - [`session`] - staging of intermediate resources during a conversion
//! - [`drop`] and [`discover`] - type-indexed cleanup and schema routines
//! - [`engine`] - the [`Engine`] tying them together
//!
//! # Example
//!
//! ```
//! use ferry_convert::{Converter, EngineBuilder, Plugin};
//! use ferry_resource::{FormatId, ResourceType};
//!
//! const A: FormatId = FormatId::new("a");
//! const B: FormatId = FormatId::new("b");
//! const C: FormatId = FormatId::new("c");
//!
//! struct Edges;
//! impl Plugin for Edges {
//!     fn build(&self, builder: &mut EngineBuilder) {
//!         let (a, b, c) = (ResourceType::local(A), ResourceType::local(B), ResourceType::local(C));
//!         builder
//!             .register_converter(Converter::new("a->b", a, b, |s, _, _| Ok(s.clone())))
//!             .register_converter(Converter::new("b->c", b, c, |s, _, _| Ok(s.clone())));
//!     }
//! }
//!
//! let engine = EngineBuilder::new().add_plugins(Edges).build();
//! let plan = engine.plan(ResourceType::local(A), ResourceType::local(C)).unwrap();
//! assert_eq!(plan.to_string(), "a -[a->b]-> b -[b->c]-> c");
//! ```

pub mod codec;
pub mod config;
pub mod discover;
pub mod drop;
pub mod engine;
mod error;
pub mod planner;
pub mod plugin;
pub mod registry;
pub mod session;

pub use codec::{Codec, CodecRegistry, Params};
pub use config::EngineConfig;
pub use discover::DiscoverRegistry;
pub use drop::{DropRegistry, DropRoutine};
pub use engine::{ConvertOptions, Engine, EngineBuilder, Overrides, Target};
pub use error::{BoxError, CodecError, EngineError};
pub use planner::{ConversionPath, Plan};
pub use plugin::{Plugin, PluginGroup, PluginGroupBuilder, PluginId, Plugins};
pub use registry::{ConvertFn, Converter, ConverterRegistry};
pub use session::{Destination, Session};
