//! Backend registration through plugins.
//!
//! Every codec, converter edge, drop routine and discover routine reaches the
//! engine through a [`Plugin`]. The engine itself knows no formats.
//!
//! # Example
//!
//! ```
//! use ferry_convert::{EngineBuilder, Plugin, PluginId};
//!
//! struct Scratch;
//! impl Plugin for Scratch {
//!     fn build(&self, _builder: &mut EngineBuilder) {}
//! }
//!
//! struct UsesScratch;
//! impl Plugin for UsesScratch {
//!     fn build(&self, _builder: &mut EngineBuilder) {}
//!
//!     fn dependencies(&self) -> Vec<PluginId> {
//!         vec![PluginId::of::<Scratch>()]
//!     }
//! }
//!
//! let engine = EngineBuilder::new()
//!     .add_plugins(UsesScratch)
//!     .add_plugins(Scratch)
//!     .build();
//! assert_eq!(engine.plugin_names().len(), 2);
//! ```

use core::any::TypeId;

use crate::engine::{Engine, EngineBuilder};

// ─────────────────────────────────────────────────────────────────────────────
// PluginId
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for a plugin type.
///
/// Used for dependency resolution and duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginId {
    type_id: TypeId,
    type_name: &'static str,
}

impl PluginId {
    /// Creates a `PluginId` for the given plugin type.
    #[must_use]
    pub fn of<P: Plugin>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: core::any::type_name::<P>(),
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name for debugging.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A unit of backend registration.
///
/// Lifecycle, driven by [`EngineBuilder::build`] and [`Engine::shutdown`]:
///
/// 1. **Build** - `build()` in dependency order
/// 2. **Ready** - `ready()` in dependency order, after every plugin was built,
///    so a plugin can register edges for formats other plugins contributed
/// 3. **Cleanup** - `cleanup()` in reverse order at shutdown
///
/// # Example
///
/// ```ignore
/// impl Plugin for CsvPlugin {
///     fn build(&self, builder: &mut EngineBuilder) {
///         builder.register_codec(CsvCodec);
///     }
///
///     fn dependencies(&self) -> Vec<PluginId> {
///         vec![PluginId::of::<RecordsPlugin>()]
///     }
/// }
/// ```
pub trait Plugin: Send + Sync + 'static {
    /// Registers codecs, converters and routines.
    fn build(&self, builder: &mut EngineBuilder);

    /// Called after all plugins have been built.
    ///
    /// Registrations that depend on what other plugins contributed (for
    /// instance one edge per known codec) belong here.
    fn ready(&self, _builder: &mut EngineBuilder) {}

    /// Called when the engine shuts down, in **reverse** dependency order.
    fn cleanup(&self, _engine: &Engine) {}

    /// Returns the plugin's name for debugging and error messages.
    ///
    /// Default implementation returns the type name.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Declares plugins that must be added before this one.
    ///
    /// The builder panics if dependencies are not satisfied when `build()` is
    /// called.
    fn dependencies(&self) -> Vec<PluginId> {
        Vec::new()
    }

    /// Returns true if this plugin can only be added once.
    ///
    /// Default is `true`: adding the same plugin type twice will panic.
    fn is_unique(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugins Trait (for add_plugins polymorphism)
// ─────────────────────────────────────────────────────────────────────────────

/// Types that can be passed to [`EngineBuilder::add_plugins`]: a single
/// [`Plugin`] or a [`PluginGroupBuilder`].
pub trait Plugins {
    /// Adds these plugins to the builder.
    fn add_to_builder(self, builder: &mut EngineBuilder);
}

impl<P: Plugin> Plugins for P {
    fn add_to_builder(self, builder: &mut EngineBuilder) {
        let id = PluginId::of::<P>();
        builder.add_plugin_boxed(BoxedPlugin {
            id,
            plugin: Box::new(self),
        });
    }
}

impl Plugins for PluginGroupBuilder {
    fn add_to_builder(self, builder: &mut EngineBuilder) {
        for boxed in self.plugins {
            builder.add_plugin_boxed(boxed);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PluginGroup Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A collection of plugins that can be added together.
///
/// ```ignore
/// EngineBuilder::new()
///     .add_plugins(DefaultPlugins.build().disable::<TracingPlugin>())
///     .build();
/// ```
pub trait PluginGroup {
    /// Returns the plugins in this group.
    fn build(self) -> PluginGroupBuilder;
}

// ─────────────────────────────────────────────────────────────────────────────
// BoxedPlugin
// ─────────────────────────────────────────────────────────────────────────────

/// A boxed plugin with its [`PluginId`] captured before boxing.
pub(crate) struct BoxedPlugin {
    pub(crate) id: PluginId,
    pub(crate) plugin: Box<dyn Plugin>,
}

impl BoxedPlugin {
    pub(crate) fn name(&self) -> &str {
        self.plugin.name()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PluginGroupBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for customizing plugin groups.
#[derive(Default)]
pub struct PluginGroupBuilder {
    pub(crate) plugins: Vec<BoxedPlugin>,
}

impl PluginGroupBuilder {
    /// Creates a new empty plugin group builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Adds a plugin to the end of the group.
    #[must_use]
    #[expect(
        clippy::should_implement_trait,
        reason = "This is a builder method, not std::ops::Add"
    )]
    pub fn add<P: Plugin>(mut self, plugin: P) -> Self {
        self.plugins.push(BoxedPlugin {
            id: PluginId::of::<P>(),
            plugin: Box::new(plugin),
        });
        self
    }

    /// Adds a plugin before `Target`, or at the beginning if `Target` is not
    /// in the group.
    #[must_use]
    pub fn add_before<P: Plugin, Target: Plugin>(mut self, plugin: P) -> Self {
        let position = self.position_of::<Target>().unwrap_or(0);
        self.plugins.insert(
            position,
            BoxedPlugin {
                id: PluginId::of::<P>(),
                plugin: Box::new(plugin),
            },
        );
        self
    }

    /// Adds a plugin after `Target`, or at the end if `Target` is not in the
    /// group.
    #[must_use]
    pub fn add_after<P: Plugin, Target: Plugin>(mut self, plugin: P) -> Self {
        let position = self
            .position_of::<Target>()
            .map_or(self.plugins.len(), |i| i + 1);
        self.plugins.insert(
            position,
            BoxedPlugin {
                id: PluginId::of::<P>(),
                plugin: Box::new(plugin),
            },
        );
        self
    }

    /// Removes a plugin from the group by type. No-op if absent.
    #[must_use]
    pub fn disable<P: Plugin>(mut self) -> Self {
        let id = PluginId::of::<P>();
        self.plugins.retain(|p| p.id != id);
        self
    }

    /// Returns true if the group contains a plugin of type `P`.
    #[must_use]
    pub fn contains<P: Plugin>(&self) -> bool {
        self.position_of::<P>().is_some()
    }

    /// Returns the number of plugins in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true if the group contains no plugins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn position_of<P: Plugin>(&self) -> Option<usize> {
        let id = PluginId::of::<P>();
        self.plugins.iter().position(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct PluginA;
    impl Plugin for PluginA {
        fn build(&self, _builder: &mut EngineBuilder) {}
    }

    struct PluginB;
    impl Plugin for PluginB {
        fn build(&self, _builder: &mut EngineBuilder) {}
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<PluginA>()]
        }
    }

    struct PluginC;
    impl Plugin for PluginC {
        fn build(&self, _builder: &mut EngineBuilder) {}
    }

    fn names(builder: &PluginGroupBuilder) -> Vec<&str> {
        builder
            .plugins
            .iter()
            .map(|p| p.name().rsplit("::").next().unwrap_or_default())
            .collect()
    }

    #[test]
    fn plugin_id_equality() {
        assert_eq!(PluginId::of::<PluginA>(), PluginId::of::<PluginA>());
        assert_ne!(PluginId::of::<PluginA>(), PluginId::of::<PluginB>());
        assert!(PluginId::of::<PluginA>().type_name().contains("PluginA"));
    }

    #[test]
    fn plugin_defaults() {
        assert!(PluginA.name().contains("PluginA"));
        assert!(PluginA.is_unique());
        assert!(PluginA.dependencies().is_empty());
    }

    #[test]
    fn group_builder_ordering() {
        let builder = PluginGroupBuilder::new()
            .add(PluginA)
            .add(PluginB)
            .add_before::<_, PluginB>(PluginC);
        assert_eq!(names(&builder), vec!["PluginA", "PluginC", "PluginB"]);

        let builder = PluginGroupBuilder::new()
            .add(PluginA)
            .add(PluginB)
            .add_after::<_, PluginA>(PluginC);
        assert_eq!(names(&builder), vec!["PluginA", "PluginC", "PluginB"]);
    }

    #[test]
    fn group_builder_missing_target() {
        let builder = PluginGroupBuilder::new()
            .add(PluginA)
            .add_before::<_, PluginB>(PluginC);
        assert_eq!(names(&builder), vec!["PluginC", "PluginA"]);

        let builder = PluginGroupBuilder::new()
            .add(PluginA)
            .add_after::<_, PluginB>(PluginC);
        assert_eq!(names(&builder), vec!["PluginA", "PluginC"]);
    }

    #[test]
    fn group_builder_disable() {
        let builder = PluginGroupBuilder::new()
            .add(PluginA)
            .add(PluginB)
            .disable::<PluginA>()
            .disable::<PluginC>();
        assert_eq!(builder.len(), 1);
        assert!(builder.contains::<PluginB>());
        assert!(!builder.contains::<PluginA>());
    }

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        deps: Vec<PluginId>,
    }

    impl Plugin for Recorder {
        fn build(&self, _builder: &mut EngineBuilder) {
            self.log.lock().push(format!("build {}", self.label));
        }

        fn ready(&self, _builder: &mut EngineBuilder) {
            self.log.lock().push(format!("ready {}", self.label));
        }

        fn cleanup(&self, _engine: &Engine) {
            self.log.lock().push(format!("cleanup {}", self.label));
        }

        fn name(&self) -> &str {
            self.label
        }

        fn dependencies(&self) -> Vec<PluginId> {
            self.deps.clone()
        }

        fn is_unique(&self) -> bool {
            false
        }
    }

    #[test]
    fn lifecycle_runs_build_then_ready_then_reverse_cleanup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = EngineBuilder::new()
            .add_plugins(Recorder {
                label: "first",
                log: Arc::clone(&log),
                deps: Vec::new(),
            })
            .add_plugins(Recorder {
                label: "second",
                log: Arc::clone(&log),
                deps: Vec::new(),
            })
            .build();
        engine.shutdown();
        assert_eq!(
            *log.lock(),
            vec![
                "build first",
                "build second",
                "ready first",
                "ready second",
                "cleanup second",
                "cleanup first",
            ]
        );
    }

    #[test]
    fn dependencies_build_first() {
        let engine = EngineBuilder::new().add_plugins(PluginB).add_plugins(PluginA).build();
        let order: Vec<_> = engine
            .plugin_names()
            .into_iter()
            .map(|n| n.rsplit("::").next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(order, vec!["PluginA", "PluginB"]);
    }

    #[test]
    #[should_panic(expected = "is unique and was already added")]
    fn unique_plugin_added_twice_panics() {
        let _ = EngineBuilder::new().add_plugins(PluginA).add_plugins(PluginA);
    }

    #[test]
    #[should_panic(expected = "which was not added")]
    fn missing_dependency_panics() {
        let _ = EngineBuilder::new().add_plugins(PluginB).build();
    }

    struct Cyclic1;
    struct Cyclic2;
    impl Plugin for Cyclic1 {
        fn build(&self, _builder: &mut EngineBuilder) {}
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<Cyclic2>()]
        }
    }
    impl Plugin for Cyclic2 {
        fn build(&self, _builder: &mut EngineBuilder) {}
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<Cyclic1>()]
        }
    }

    #[test]
    #[should_panic(expected = "Circular dependency")]
    fn circular_dependency_panics() {
        let _ = EngineBuilder::new().add_plugins(Cyclic1).add_plugins(Cyclic2).build();
    }
}
