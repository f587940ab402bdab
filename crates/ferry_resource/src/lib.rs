//! Resource identifiers and typed resource handles for Ferry.
//!
//! - [`uri`] - the identifier parser producing a [`ResourceDescriptor`]
//! - [`format`] - dispatch type tags ([`FormatId`], [`Storage`], [`ResourceType`])
//! - [`resource`] - [`Resource`] handles over local, remote, directory and
//!   in-memory locations
//! - [`directory`] - lazily listed [`Directory`] members
//! - [`records`] and [`schema`] - the in-memory table and its inferred [`Schema`]
//!
//! Nothing in this crate knows about concrete encodings; codecs and
//! converters live in `ferry_backends` and are dispatched by `ferry_convert`.

pub mod directory;
mod error;
pub mod format;
pub mod records;
pub mod resource;
pub mod schema;
pub mod uri;

pub use directory::{Directory, DirectoryRoot, Members};
pub use error::ResourceError;
pub use format::{FormatId, RECORDS, ResourceType, Storage};
pub use records::Records;
pub use resource::{Location, Resource};
pub use schema::{DataType, Field, Schema};
pub use uri::{ResourceDescriptor, Scheme};
