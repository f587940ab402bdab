//! Built-in backends for Ferry.
//!
//! Format plugins contribute codecs:
//!
//! - [`CsvPlugin`] - `csv`
//! - [`JsonPlugin`] - `json` (array of objects) and `jsonl` (one object per line)
//!
//! Storage plugins contribute edges, drop and discover routines for every
//! registered codec:
//!
//! - [`RecordsPlugin`] - the in-memory `records` type
//! - [`LocalPlugin`] - `local(F) <-> records`
//! - [`RemotePlugin`] - `local(F) <-> remote(F)` through the owning connection
//!
//! # Example
//!
//! ```
//! use ferry_backends::{CSV, CsvPlugin, LocalPlugin, RecordsPlugin};
//! use ferry_convert::EngineBuilder;
//! use ferry_resource::ResourceType;
//!
//! let engine = EngineBuilder::new()
//!     .add_plugins(RecordsPlugin)
//!     .add_plugins(LocalPlugin)
//!     .add_plugins(CsvPlugin)
//!     .build();
//! let plan = engine
//!     .plan(ResourceType::local(CSV), ResourceType::records())
//!     .unwrap();
//! assert_eq!(plan.len(), 1);
//! ```

mod delimited;
mod json;
mod local;
mod records;
mod remote;

pub use delimited::{CSV, CsvCodec, CsvPlugin};
pub use json::{JSON, JSON_LINES, JsonCodec, JsonLinesCodec, JsonPlugin};
pub use local::LocalPlugin;
pub use records::RecordsPlugin;
pub use remote::RemotePlugin;
