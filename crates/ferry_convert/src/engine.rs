//! The engine: resource construction, conversion, discovery and drop.
//!
//! An [`Engine`] is assembled once by an [`EngineBuilder`] from plugins and is
//! immutable afterwards. Its registries are the only state the planner and
//! the dispatchers read. The connection cache is the only shared mutable
//! state and is injected, never global.
//!
//! # Example
//!
//! ```
//! use ferry_convert::{EngineBuilder, EngineError};
//!
//! let engine = EngineBuilder::new().build();
//! // No plugin contributed a codec, so nothing can be resolved.
//! assert!(matches!(
//!     engine.resource("data.csv"),
//!     Err(EngineError::UnknownFormat(_))
//! ));
//! ```

use crate::codec::{Codec, CodecRegistry, Params};
use crate::config::EngineConfig;
use crate::discover::DiscoverRegistry;
use crate::drop::{DropRegistry, DropRoutine};
use crate::error::{BoxError, EngineError};
use crate::planner::{self, ConversionPath, Plan};
use crate::plugin::{BoxedPlugin, PluginId, Plugins};
use crate::registry::{Converter, ConverterRegistry};
use crate::session::{Destination, Session};
use ferry_remote::{Auth, Connection, ConnectionCache, ConnectionError, Connector, SshConnector};
use ferry_resource::uri::{self, ResourceDescriptor};
use ferry_resource::{
    Directory, DirectoryRoot, FormatId, RECORDS, Records, Resource, ResourceType, Schema, Storage,
};
use hashbrown::{HashMap, HashSet};
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Conversion inputs
// ─────────────────────────────────────────────────────────────────────────────

/// What a conversion should produce.
#[derive(Debug, Clone)]
pub enum Target {
    /// Overwrite this resource.
    Existing(Resource),
    /// Materialize a new resource of this type and keep it.
    Fresh(ResourceType),
    /// Materialize a new disposable resource of this type.
    ///
    /// The caller drops it with [`Engine::drop`] when done.
    Temporary(ResourceType),
}

impl Target {
    /// Returns the type the conversion must produce.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Existing(resource) => resource.resource_type(),
            Self::Fresh(ty) | Self::Temporary(ty) => *ty,
        }
    }
}

impl From<Resource> for Target {
    fn from(resource: Resource) -> Self {
        Self::Existing(resource)
    }
}

/// Per-call conversion options.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Host for fresh remote targets when neither side names one.
    pub auth: Option<Auth>,
    /// Codec parameters, passed to every edge.
    pub params: Params,
}

impl ConvertOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the auth used for fresh remote targets.
    #[must_use]
    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Adds a codec parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Values that take precedence over what an identifier says.
///
/// ```
/// use ferry_convert::Overrides;
///
/// let overrides = Overrides::new().hostname("db.internal").port(2222).format("csv");
/// assert_eq!(overrides.auth().hostname(), "db.internal");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    auth: Auth,
    format: Option<String>,
    directory: Option<bool>,
}

impl Overrides {
    /// Creates empty overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host. The resource becomes remote.
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.auth = self.auth.merged(&Auth::new(hostname));
        self
    }

    /// Sets the login user.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.auth = self.auth.with_username(username);
        self
    }

    /// Sets the port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.auth = self.auth.with_port(port);
        self
    }

    /// Sets the private key file.
    #[must_use]
    pub fn key_file(mut self, key_file: impl Into<PathBuf>) -> Self {
        self.auth = self.auth.with_key_file(key_file);
        self
    }

    /// Adds a transport option.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth = self.auth.with_extra(key, value);
        self
    }

    /// Sets the format, by name or extension.
    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Forces the identifier to be read as a directory (`true`) or a single
    /// file (`false`).
    #[must_use]
    pub fn directory(mut self, directory: bool) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Returns the auth fields set so far. The hostname is empty if unset.
    #[must_use]
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    fn has_auth_fields(&self) -> bool {
        self.auth.username().is_some()
            || self.auth.port().is_some()
            || self.auth.key_file().is_some()
            || !self.auth.extra().is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EngineBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Assembles an [`Engine`] from plugins.
///
/// # Example
///
/// ```ignore
/// let engine = EngineBuilder::new()
///     .with_config(EngineConfig::from_env())
///     .with_connector(Arc::new(LoopbackConnector::new()))
///     .add_plugins(DefaultPlugins.build())
///     .build();
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    connector: Option<Arc<dyn Connector>>,
    connections: Option<Arc<ConnectionCache>>,
    codecs: CodecRegistry,
    converters: ConverterRegistry,
    drops: DropRegistry,
    discovers: DiscoverRegistry,
    plugin_ids: HashSet<PluginId>,
    pending: Vec<BoxedPlugin>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("codecs", &self.codecs)
            .field("converters", &self.converters)
            .field(
                "plugins",
                &self.pending.iter().map(BoxedPlugin::name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Creates a builder with default configuration and no plugins.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            connector: None,
            connections: None,
            codecs: CodecRegistry::new(),
            converters: ConverterRegistry::new(),
            drops: DropRegistry::new(),
            discovers: DiscoverRegistry::new(),
            plugin_ids: HashSet::new(),
            pending: Vec::new(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the transport connector. Defaults to [`SshConnector`].
    ///
    /// Ignored if a cache is injected with
    /// [`with_connection_cache`](Self::with_connection_cache).
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Shares an existing connection cache with this engine.
    #[must_use]
    pub fn with_connection_cache(mut self, connections: Arc<ConnectionCache>) -> Self {
        self.connections = Some(connections);
        self
    }

    /// Adds one plugin or a plugin group.
    ///
    /// # Panics
    ///
    /// Panics if a unique plugin is added twice.
    #[must_use]
    pub fn add_plugins<P: Plugins>(mut self, plugins: P) -> Self {
        plugins.add_to_builder(&mut self);
        self
    }

    pub(crate) fn add_plugin_boxed(&mut self, boxed: BoxedPlugin) {
        if boxed.plugin.is_unique() && self.plugin_ids.contains(&boxed.id) {
            panic!(
                "Plugin '{}' is unique and was already added.\n\
                 If you intended to add this plugin multiple times, \
                 set `is_unique()` to return `false`.",
                boxed.name()
            );
        }
        self.plugin_ids.insert(boxed.id);
        self.pending.push(boxed);
    }

    /// Registers a codec.
    pub fn register_codec(&mut self, codec: impl Codec) -> &mut Self {
        self.codecs.register(codec);
        self
    }

    /// Registers a converter edge, replacing any edge for the same pair.
    pub fn register_converter(&mut self, converter: Converter) -> &mut Self {
        self.converters.register(converter);
        self
    }

    /// Registers a drop routine for one type.
    pub fn register_drop(&mut self, ty: ResourceType, routine: DropRoutine) -> &mut Self {
        self.drops.register(ty, routine);
        self
    }

    /// Registers a drop routine for every file type on `storage`.
    pub fn register_drop_for_storage(
        &mut self,
        storage: Storage,
        routine: DropRoutine,
    ) -> &mut Self {
        self.drops.register_for_storage(storage, routine);
        self
    }

    /// Registers a discover routine for one type.
    pub fn register_discover(
        &mut self,
        ty: ResourceType,
        f: impl Fn(&Resource, &Engine) -> Result<Schema, BoxError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.discovers.register(ty, f);
        self
    }

    /// Registers a discover routine for every file type on `storage`.
    pub fn register_discover_for_storage(
        &mut self,
        storage: Storage,
        f: impl Fn(&Resource, &Engine) -> Result<Schema, BoxError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.discovers.register_for_storage(storage, f);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the codecs registered so far.
    #[must_use]
    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Returns the converters registered so far.
    #[must_use]
    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Builds every plugin, readies every plugin, and returns the engine.
    ///
    /// # Panics
    ///
    /// - If a plugin's dependency was not added
    /// - If plugin dependencies form a cycle
    #[must_use]
    pub fn build(mut self) -> Engine {
        let plugins = sort_plugins_by_dependencies(core::mem::take(&mut self.pending));

        for entry in &plugins {
            debug!(plugin = entry.name(), "building plugin");
            entry.plugin.build(&mut self);
        }
        for entry in &plugins {
            entry.plugin.ready(&mut self);
        }

        let connections = self.connections.unwrap_or_else(|| {
            let connector: Arc<dyn Connector> = match self.connector {
                Some(connector) => connector,
                None => Arc::new(SshConnector::default()),
            };
            Arc::new(ConnectionCache::new(connector).with_default_port(self.config.default_port()))
        });

        debug!(
            plugins = plugins.len(),
            codecs = self.codecs.len(),
            converters = self.converters.len(),
            "engine ready"
        );

        Engine {
            config: self.config,
            connections,
            codecs: self.codecs,
            converters: self.converters,
            drops: self.drops,
            discovers: self.discovers,
            plugins,
            shut_down: AtomicBool::new(false),
        }
    }
}

/// Orders plugins so that every plugin comes after its dependencies.
///
/// Plugins without an ordering constraint keep the order they were added in.
fn sort_plugins_by_dependencies(pending: Vec<BoxedPlugin>) -> Vec<BoxedPlugin> {
    let n = pending.len();
    let mut index_of: HashMap<PluginId, Vec<usize>> = HashMap::new();
    for (i, entry) in pending.iter().enumerate() {
        index_of.entry(entry.id).or_default().push(i);
    }

    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, entry) in pending.iter().enumerate() {
        for dep in entry.plugin.dependencies() {
            let Some(providers) = index_of.get(&dep) else {
                panic!(
                    "Plugin '{}' requires '{}' which was not added.\n\
                     Add {} before building, or use a plugin group that includes it.",
                    entry.name(),
                    dep.type_name(),
                    dep.type_name()
                );
            };
            for &provider in providers {
                dependents[provider].push(i);
                in_degree[i] += 1;
            }
        }
    }

    // Kahn's algorithm; the queue is FIFO so insertion order breaks ties.
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut sorted = Vec::with_capacity(n);
    while let Some(idx) = queue.pop_front() {
        sorted.push(idx);
        for &dependent in &dependents[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if sorted.len() != n {
        let in_cycle: Vec<&str> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg > 0)
            .map(|(i, _)| pending[i].name())
            .collect();
        panic!(
            "Circular dependency detected among plugins: {in_cycle:?}\n\
             Break the cycle by extracting shared registrations into a separate plugin."
        );
    }

    let mut slots: Vec<Option<BoxedPlugin>> = pending.into_iter().map(Some).collect();
    sorted
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// The resolution and conversion engine.
///
/// Shareable across threads; concurrent conversions against one host are
/// serialized by that host's [`Connection`].
pub struct Engine {
    config: EngineConfig,
    connections: Arc<ConnectionCache>,
    codecs: CodecRegistry,
    converters: ConverterRegistry,
    drops: DropRegistry,
    discovers: DiscoverRegistry,
    plugins: Vec<BoxedPlugin>,
    shut_down: AtomicBool,
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("connections", &self.connections)
            .field("codecs", &self.codecs)
            .field("converters", &self.converters)
            .field("plugins", &self.plugin_names())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Returns a new builder.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the codec registry.
    #[must_use]
    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Returns the converter registry.
    #[must_use]
    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Returns the drop registry.
    #[must_use]
    pub fn drops(&self) -> &DropRegistry {
        &self.drops
    }

    /// Returns the connection cache.
    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionCache> {
        &self.connections
    }

    /// Returns plugin names in build order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(BoxedPlugin::name).collect()
    }

    /// Returns the cached connection for `auth`, dialing if needed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Connection`] if the host cannot be reached.
    pub fn connect(&self, auth: &Auth) -> Result<Arc<Connection>, EngineError> {
        Ok(self.connections.connect(auth)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resource construction
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolves an identifier into a resource.
    ///
    /// # Errors
    ///
    /// See [`resource_with`](Self::resource_with).
    pub fn resource(&self, uri: &str) -> Result<Resource, EngineError> {
        self.resource_with(uri, &Overrides::default())
    }

    /// Resolves an identifier into a resource, with `overrides` taking
    /// precedence over the identifier.
    ///
    /// Identifiers ending in a glob or `/` become directories. A directory
    /// without a format hint takes the format of its members. Without a glob,
    /// only files carrying one of the member codec's extensions are members.
    ///
    /// # Errors
    ///
    /// - [`EngineError::MalformedUri`] if the identifier cannot be parsed
    /// - [`EngineError::UnknownFormat`] if no codec matches the hint or extension
    /// - [`EngineError::AmbiguousResource`] if identifier and overrides contradict
    /// - [`EngineError::Connection`] if a remote host cannot be reached
    pub fn resource_with(&self, uri: &str, overrides: &Overrides) -> Result<Resource, EngineError> {
        let descriptor = uri::parse(uri)?;

        let auth = match descriptor.auth() {
            Some(parsed) => Some(parsed.clone().merged(&overrides.auth)),
            None if !overrides.auth.hostname().is_empty() => Some(overrides.auth.clone()),
            None if overrides.has_auth_fields() => {
                return Err(EngineError::ambiguous(format!(
                    "'{uri}' is a local path but auth fields were given without a hostname"
                )));
            }
            None => None,
        };

        let directory = match overrides.directory {
            Some(false) if descriptor.pattern().is_some() => {
                return Err(EngineError::ambiguous(format!(
                    "'{uri}' contains a glob but a single file was requested"
                )));
            }
            Some(false) if descriptor.is_directory() => {
                return Err(EngineError::ambiguous(format!(
                    "'{uri}' names a directory but a single file was requested"
                )));
            }
            Some(forced) => forced,
            None => descriptor.is_directory(),
        };

        let format = self.hinted_format(uri, &descriptor, overrides)?;
        let connection = auth.as_ref().map(|auth| self.connect(auth)).transpose()?;
        let path = descriptor.path();

        if directory {
            let root = match connection {
                Some(connection) => DirectoryRoot::Remote {
                    connection,
                    path: path.to_string(),
                },
                None => DirectoryRoot::Local(PathBuf::from(path)),
            };
            let element = match format {
                Some(format) => format,
                None => self.member_format(uri, &root, descriptor.pattern())?,
            };
            let mut dir = Directory::new(root, element);
            match descriptor.pattern() {
                Some(pattern) => dir = dir.with_pattern(pattern),
                None => {
                    let extensions = self.codecs.require(element)?.extensions();
                    dir = dir.with_extensions(extensions);
                }
            }
            debug!(uri, resource = %dir, "resolved directory");
            return Ok(Resource::directory(dir));
        }

        let format = format.ok_or_else(|| {
            EngineError::unknown_format(format!("'{uri}' has no extension and no format was given"))
        })?;
        let resource = match connection {
            Some(connection) => Resource::remote(connection, path, format),
            None => Resource::local(path, format),
        };
        debug!(uri, %resource, "resolved");
        Ok(resource)
    }

    /// Returns a remote file resource on the host named by `auth`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Connection`] if the host cannot be reached.
    pub fn remote(
        &self,
        format: FormatId,
        path: impl Into<String>,
        auth: &Auth,
    ) -> Result<Resource, EngineError> {
        Ok(Resource::remote(self.connect(auth)?, path, format))
    }

    fn hinted_format(
        &self,
        uri: &str,
        descriptor: &ResourceDescriptor,
        overrides: &Overrides,
    ) -> Result<Option<FormatId>, EngineError> {
        let lookup = |hint: &str| {
            self.codecs
                .lookup(hint)
                .ok_or_else(|| EngineError::unknown_format(format!("no backend for '{hint}'")))
        };
        let Some(explicit) = overrides.format.as_deref() else {
            return descriptor.type_hint().map(lookup).transpose();
        };
        let explicit = lookup(explicit)?;
        // An explicit format outranks an extension no backend knows.
        let parsed = descriptor.type_hint().and_then(|hint| self.codecs.lookup(hint));
        if let (Some(glob), Some(parsed)) = (descriptor.pattern(), parsed)
            && parsed != explicit
        {
            return Err(EngineError::ambiguous(format!(
                "'{uri}': glob '{glob}' selects {parsed} files but format {explicit} was requested"
            )));
        }
        Ok(Some(explicit))
    }

    fn member_format(
        &self,
        uri: &str,
        root: &DirectoryRoot,
        pattern: Option<&str>,
    ) -> Result<FormatId, EngineError> {
        let mut listing = Directory::new(root.clone(), RECORDS);
        if let Some(pattern) = pattern {
            listing = listing.with_pattern(pattern);
        }
        let mut formats = BTreeSet::new();
        for name in listing.member_names()? {
            let ext = Path::new(&name)
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default();
            let format = self.codecs.lookup(&ext).ok_or_else(|| {
                EngineError::unknown_format(format!("no backend for member '{name}' of '{uri}'"))
            })?;
            formats.insert(format);
        }
        let mut formats = formats.into_iter();
        match (formats.next(), formats.next()) {
            (Some(format), None) => Ok(format),
            (None, _) => Err(EngineError::unknown_format(format!(
                "'{uri}' is empty, so its member format must be given"
            ))),
            (Some(first), Some(second)) => Err(EngineError::ambiguous(format!(
                "'{uri}' mixes {first} and {second} members"
            ))),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Conversion
    // ─────────────────────────────────────────────────────────────────────────

    /// Plans a conversion between two types without touching any resource.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoConversionPath`] if no route exists.
    pub fn plan(&self, from: ResourceType, to: ResourceType) -> Result<Plan, EngineError> {
        planner::plan(&self.converters, from, to)
    }

    /// Converts `source` into `target`.
    ///
    /// The plan is computed before anything is touched, so a missing route
    /// fails without side effects. Intermediate resources are dropped as
    /// soon as the next step has consumed them, and on failure everything
    /// the conversion allocated is dropped.
    ///
    /// Fresh remote targets are created on the host of
    /// [`ConvertOptions::auth`], else of the source.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NoConversionPath`] if the types are not connected
    /// - [`EngineError::AmbiguousResource`] if a fresh remote target has no host
    /// - [`EngineError::ConversionFailure`] naming the edge that failed
    pub fn convert(
        &self,
        target: Target,
        source: &Resource,
        options: &ConvertOptions,
    ) -> Result<Resource, EngineError> {
        let from = source.resource_type();
        let to = target.resource_type();

        if let Target::Existing(existing) = &target
            && existing.same_location(source)
        {
            debug!(resource = %source, "source and target coincide");
            return Ok(existing.clone());
        }

        let plan = self.plan(from, to)?;
        debug!(%plan, "planned");

        let known = match &target {
            Target::Existing(existing) => existing.connection().cloned(),
            Target::Fresh(_) | Target::Temporary(_) => None,
        };
        let mut session = Session::new(
            self,
            options,
            known.into_iter().chain(source.connection().cloned()),
        );
        if to.is_remote() && !matches!(target, Target::Existing(_)) {
            session.connection()?;
        }

        let destination = match target {
            Target::Existing(resource) => Destination::Existing(resource),
            Target::Fresh(ty) => Destination::Fresh {
                ty,
                temporary: false,
            },
            Target::Temporary(ty) => Destination::Fresh {
                ty,
                temporary: true,
            },
        };

        let result = self.execute(&plan, source, &destination, &mut session)?;
        session.commit(&result);
        info!(source = %source, target = %result, %plan, "converted");
        Ok(result)
    }

    /// Converts `source` into the resource named by `uri`.
    ///
    /// # Errors
    ///
    /// See [`resource`](Self::resource) and [`convert`](Self::convert).
    pub fn convert_to_uri(
        &self,
        uri: &str,
        source: &Resource,
        options: &ConvertOptions,
    ) -> Result<Resource, EngineError> {
        let target = self.resource(uri)?;
        self.convert(Target::Existing(target), source, options)
    }

    /// Reads `resource` into memory.
    ///
    /// # Errors
    ///
    /// See [`convert`](Self::convert).
    pub fn records(&self, resource: &Resource) -> Result<Records, EngineError> {
        if let Some(records) = resource.as_records() {
            return Ok(Records::clone(records));
        }
        let result = self.convert(
            Target::Fresh(ResourceType::records()),
            resource,
            &ConvertOptions::default(),
        )?;
        match result.as_records() {
            Some(records) => Ok(Records::clone(records)),
            None => Err(EngineError::unknown_format(format!(
                "conversion to records produced {}",
                result.resource_type()
            ))),
        }
    }

    fn execute(
        &self,
        plan: &Plan,
        source: &Resource,
        destination: &Destination,
        session: &mut Session<'_>,
    ) -> Result<Resource, EngineError> {
        match plan {
            Plan::Direct(path) => self.run_path(path, source, destination, session),
            Plan::MapMembers(path) => self.map_members(path, source, destination, session),
            Plan::Concatenate { element, rest } => {
                self.concatenate(element, rest, source, destination, session)
            }
        }
    }

    fn run_path(
        &self,
        path: &ConversionPath,
        source: &Resource,
        destination: &Destination,
        session: &mut Session<'_>,
    ) -> Result<Resource, EngineError> {
        let mark = session.mark();
        let mut current = source.clone();
        let last = path.len().saturating_sub(1);

        for (i, step) in path.steps().iter().enumerate() {
            let step_destination = if i == last {
                destination.clone()
            } else {
                Destination::Fresh {
                    ty: step.to_type(),
                    temporary: true,
                }
            };
            debug!(edge = step.name(), from = %current, "applying edge");
            match step.apply(&current, &step_destination, session) {
                Ok(output) => {
                    session.release(mark, &output);
                    current = output;
                }
                Err(err) => {
                    session.rollback(mark);
                    warn!(edge = step.name(), error = %err, "edge failed");
                    return Err(EngineError::ConversionFailure {
                        edge: step.name().to_string(),
                        source: err,
                    });
                }
            }
        }
        Ok(current)
    }

    fn map_members(
        &self,
        path: &ConversionPath,
        source: &Resource,
        destination: &Destination,
        session: &mut Session<'_>,
    ) -> Result<Resource, EngineError> {
        let input = as_directory(source)?;
        let output = session.target(destination)?;
        let target_dir = as_directory(&output)?;
        target_dir.root().create()?;

        let ext = self.codecs.extension(target_dir.element());
        for name in input.member_names()? {
            let stem = Path::new(&name)
                .file_stem()
                .map_or_else(|| name.clone(), |stem| stem.to_string_lossy().into_owned());
            let child = target_dir.child(&format!("{stem}.{ext}"));
            self.run_path(path, &input.child(&name), &Destination::Existing(child), session)?;
        }
        Ok(output)
    }

    fn concatenate(
        &self,
        element: &ConversionPath,
        rest: &ConversionPath,
        source: &Resource,
        destination: &Destination,
        session: &mut Session<'_>,
    ) -> Result<Resource, EngineError> {
        let input = as_directory(source)?;
        let records_type = ResourceType::records();
        let mut combined: Option<Records> = None;

        for member in input.members()? {
            let mark = session.mark();
            let out = self.run_path(
                element,
                &member,
                &Destination::Fresh {
                    ty: records_type,
                    temporary: true,
                },
                session,
            )?;
            let Some(records) = out.as_records() else {
                session.rollback(mark);
                return Err(EngineError::unknown_format(format!(
                    "reading {member} produced {} instead of records",
                    out.resource_type()
                )));
            };
            match &mut combined {
                Some(all) => all.extend(records),
                None => combined = Some(Records::clone(records)),
            }
            session.rollback(mark);
        }

        let memory = Resource::memory(combined.unwrap_or_default()).into_temporary();
        if rest.is_empty() {
            return Ok(memory);
        }
        self.run_path(rest, &memory, destination, session)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Discover & drop
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the schema of `resource`.
    ///
    /// A directory has the schema of its first member, or an empty schema if
    /// it has none.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownFormat`] if no discover routine applies,
    /// or the routine's error.
    pub fn discover(&self, resource: &Resource) -> Result<Schema, EngineError> {
        if let Some(dir) = resource.as_directory() {
            return match dir.members()?.next() {
                Some(first) => self.discover(&first),
                None => Ok(Schema::default()),
            };
        }
        let ty = resource.resource_type();
        let routine = self
            .discovers
            .routine_for(ty)
            .ok_or_else(|| EngineError::unknown_format(format!("cannot discover {ty}")))?;
        routine(resource, self).map_err(|err| routine_error("discover", err))
    }

    /// Ensures the artifact behind `resource` no longer exists.
    ///
    /// Idempotent: an absent artifact is success, and cleanup failures are
    /// logged, not returned. Remote resources are always deleted through
    /// their connection. Directories drop every current member, and
    /// temporary directories also remove their (then empty) base.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownFormat`] only if no drop routine is
    /// registered for the resource's type.
    pub fn drop(&self, resource: &Resource) -> Result<(), EngineError> {
        if let Some(dir) = resource.as_directory() {
            match dir.members() {
                Ok(members) => {
                    for member in members {
                        self.drop(&member)?;
                    }
                }
                Err(err) => warn!(resource = %resource, error = %err, "cannot list members to drop"),
            }
            if resource.is_temporary()
                && let Err(err) = dir.root().remove_if_empty()
            {
                warn!(resource = %resource, error = %err, "cannot remove directory");
            }
            return Ok(());
        }

        let ty = resource.resource_type();
        let routine = self
            .drops
            .routine_for(ty)
            .ok_or_else(|| EngineError::unknown_format(format!("no drop routine for {ty}")))?;
        if let Err(err) = routine.run(resource, self) {
            warn!(
                routine = routine.name(),
                resource = %resource,
                error = %err,
                "drop failed; ignoring"
            );
        }
        Ok(())
    }

    /// Resolves `uri` and drops it.
    ///
    /// # Errors
    ///
    /// See [`resource`](Self::resource) and [`drop`](Self::drop).
    pub fn drop_uri(&self, uri: &str) -> Result<(), EngineError> {
        let resource = self.resource(uri)?;
        self.drop(&resource)
    }

    pub(crate) fn drop_quietly(&self, resource: &Resource) {
        if let Err(err) = self.drop(resource) {
            warn!(resource = %resource, error = %err, "cannot drop staged resource");
        }
    }

    /// Runs plugin cleanup in reverse order and closes every cached
    /// connection. Later calls do nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        for entry in self.plugins.iter().rev() {
            entry.plugin.cleanup(self);
        }
        self.connections.close_all();
        debug!("engine shut down");
    }
}

fn as_directory(resource: &Resource) -> Result<&Directory, EngineError> {
    resource
        .as_directory()
        .ok_or_else(|| EngineError::ambiguous(format!("{resource} is not a directory")))
}

/// Maps a routine's boxed error back onto the engine taxonomy where possible.
fn routine_error(routine: &str, err: BoxError) -> EngineError {
    let err = match err.downcast::<EngineError>() {
        Ok(engine) => return *engine,
        Err(err) => err,
    };
    let err = match err.downcast::<ConnectionError>() {
        Ok(conn) => return EngineError::Connection(*conn),
        Err(err) => err,
    };
    match err.downcast::<std::io::Error>() {
        Ok(io) => EngineError::Io(*io),
        Err(source) => EngineError::ConversionFailure {
            edge: routine.to_string(),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Plugin;
    use ferry_remote::LoopbackConnector;

    const TXT: FormatId = FormatId::new("txt");

    struct Text;

    impl Codec for Text {
        fn format(&self) -> FormatId {
            TXT
        }

        fn extensions(&self) -> &[&'static str] {
            &["txt"]
        }

        fn decode(&self, bytes: &[u8], _params: &Params) -> Result<Records, crate::CodecError> {
            let text = String::from_utf8_lossy(bytes);
            Ok(Records::from_rows(
                ["line"],
                text.lines().map(|l| vec![serde_json::Value::from(l)]),
            ))
        }

        fn encode(&self, records: &Records, _params: &Params) -> Result<Vec<u8>, crate::CodecError> {
            let mut out = String::new();
            for row in records.rows() {
                out.push_str(row.first().and_then(|v| v.as_str()).unwrap_or_default());
                out.push('\n');
            }
            Ok(out.into_bytes())
        }
    }

    struct TextPlugin;

    impl Plugin for TextPlugin {
        fn build(&self, builder: &mut EngineBuilder) {
            builder.register_codec(Text);
            builder.register_drop(
                ResourceType::local(TXT),
                DropRoutine::new("local", |resource, _| {
                    if let Some(path) = resource.local_path() {
                        match std::fs::remove_file(path) {
                            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                                return Err(err.into());
                            }
                            _ => {}
                        }
                    }
                    Ok(())
                }),
            );
        }
    }

    fn engine(root: &Path) -> Engine {
        EngineBuilder::new()
            .with_config(EngineConfig::default().with_temp_dir(root.join("tmp")))
            .with_connector(Arc::new(LoopbackConnector::with_root(root.join("remote"))))
            .add_plugins(TextPlugin)
            .build()
    }

    #[test]
    fn resource_resolves_files_and_globs() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());

        let file = engine.resource("/data/notes.txt").unwrap();
        assert_eq!(file.resource_type(), ResourceType::local(TXT));

        let glob = engine.resource("/data/*.txt").unwrap();
        assert_eq!(glob.resource_type(), ResourceType::local(TXT).directory());
        assert_eq!(glob.as_directory().unwrap().pattern(), Some("*.txt"));

        let remote = engine.resource("joe@box:/srv/notes.txt").unwrap();
        assert_eq!(remote.resource_type(), ResourceType::remote(TXT));
        assert_eq!(remote.auth().unwrap().username(), Some("joe"));
    }

    #[test]
    fn overrides_take_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());

        let remote = engine
            .resource_with("/srv/notes", &Overrides::new().hostname("box").format("txt"))
            .unwrap();
        assert!(remote.resource_type().is_remote());
        assert_eq!(remote.auth().unwrap().hostname(), "box");

        let port = engine
            .resource_with("box:2200/srv/a.txt", &Overrides::new().port(2222))
            .unwrap();
        assert_eq!(port.auth().unwrap().port(), Some(2222));

        let renamed = engine
            .resource_with("/data/notes.bak", &Overrides::new().format("txt"))
            .unwrap();
        assert_eq!(renamed.resource_type(), ResourceType::local(TXT));
    }

    #[test]
    fn resource_errors() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());

        assert!(matches!(
            engine.resource("/data/table.xlsx"),
            Err(EngineError::UnknownFormat(_))
        ));
        assert!(matches!(
            engine.resource("/data/README"),
            Err(EngineError::UnknownFormat(_))
        ));
        assert!(matches!(
            engine.resource("gopher://host/x"),
            Err(EngineError::MalformedUri { .. })
        ));
        assert!(matches!(
            engine.resource_with("/data/*.txt", &Overrides::new().directory(false)),
            Err(EngineError::AmbiguousResource(_))
        ));
        assert!(matches!(
            engine.resource_with("/data/a.txt", &Overrides::new().username("joe")),
            Err(EngineError::AmbiguousResource(_))
        ));
    }

    #[test]
    fn directory_format_comes_from_members() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        let uri = format!("{}/", data.display());

        assert!(matches!(engine.resource(&uri), Err(EngineError::UnknownFormat(_))));

        std::fs::write(data.join("a.txt"), "x\n").unwrap();
        let resolved = engine.resource(&uri).unwrap();
        assert_eq!(resolved.resource_type(), ResourceType::local(TXT).directory());
    }

    #[test]
    fn drop_is_idempotent_and_requires_a_routine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, "x\n").unwrap();

        let resource = Resource::local(&path, TXT);
        engine.drop(&resource).unwrap();
        engine.drop(&resource).unwrap();
        assert!(!path.exists());

        let unknown = Resource::local(dir.path().join("a.bin"), FormatId::new("bin"));
        assert!(matches!(engine.drop(&unknown), Err(EngineError::UnknownFormat(_))));
    }

    #[test]
    fn dropping_a_forced_directory_spares_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        for name in ["a.txt", "notes.json", "README"] {
            std::fs::write(data.join(name), "x\n").unwrap();
        }

        let uri = format!("{}/", data.display());
        let resource = engine
            .resource_with(&uri, &Overrides::new().format("txt"))
            .unwrap();
        let members = resource.as_directory().unwrap().member_names().unwrap();
        assert_eq!(members, vec!["a.txt"]);

        engine.drop(&resource).unwrap();
        assert!(!data.join("a.txt").exists());
        assert!(data.join("notes.json").exists());
        assert!(data.join("README").exists());
    }

    #[test]
    fn missing_route_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let source = Resource::local(dir.path().join("a.txt"), TXT);

        let err = engine
            .convert(
                Target::Temporary(ResourceType::remote(TXT)),
                &source,
                &ConvertOptions::new().with_auth(Auth::new("box")),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::NoConversionPath { .. }));
        assert!(engine.connections().is_empty());
        assert!(!dir.path().join("tmp").exists());
    }

    #[test]
    fn same_location_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let source = Resource::local(dir.path().join("a.txt"), TXT);
        let out = engine
            .convert(Target::Existing(source.clone()), &source, &ConvertOptions::new())
            .unwrap();
        assert!(out.same_location(&source));
    }

    #[test]
    fn discover_without_routine_is_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let source = Resource::local(dir.path().join("a.txt"), TXT);
        assert!(matches!(engine.discover(&source), Err(EngineError::UnknownFormat(_))));
    }

    #[test]
    fn routine_errors_keep_their_category() {
        let io: BoxError = Box::new(std::io::Error::other("disk"));
        assert!(matches!(routine_error("discover", io), EngineError::Io(_)));

        let conn: BoxError = Box::new(ConnectionError::unreachable("box"));
        assert!(matches!(routine_error("discover", conn), EngineError::Connection(_)));

        let other: BoxError = "bad bytes".into();
        assert!(matches!(
            routine_error("discover", other),
            EngineError::ConversionFailure { ref edge, .. } if edge == "discover"
        ));
    }

    #[test]
    fn shutdown_closes_connections_once() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let conn = engine.connect(&Auth::new("box")).unwrap();
        assert!(conn.is_active());
        engine.shutdown();
        assert!(!conn.is_active());
        engine.shutdown();
    }
}
