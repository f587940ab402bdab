//! Plan and run conversions between data formats, across local files,
//! remote hosts and memory.
//!
//! ```
//! use ferry::prelude::*;
//!
//! let engine = EngineBuilder::new()
//!     .add_plugins(MinimalPlugins.build())
//!     .build();
//! let plan = engine
//!     .plan(ResourceType::local(CSV), ResourceType::remote(JSON))
//!     .unwrap();
//! assert_eq!(plan.len(), 3);
//! ```

pub use ferry_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use ferry_internal::prelude::*;
}
