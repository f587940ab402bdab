//! Converter edges.
//!
//! The registry maps an ordered pair of [`ResourceType`]s to at most one
//! [`Converter`]. Registering a second converter for the same pair replaces
//! the first. Every registration is numbered, and the planner uses those
//! numbers to break ties between equal-cost paths.

use crate::error::BoxError;
use crate::session::{Destination, Session};
use ferry_resource::{Resource, ResourceType};
use indexmap::IndexMap;
use std::sync::Arc;

/// Signature of a converter's `apply`.
///
/// Receives the source resource and where to put the result, and returns the
/// resource it produced. Converters allocate fresh destinations through the
/// [`Session`] so that the engine can clean them up.
pub type ConvertFn =
    dyn Fn(&Resource, &Destination, &mut Session<'_>) -> Result<Resource, BoxError> + Send + Sync;

/// One edge of the conversion graph.
pub struct Converter {
    name: String,
    from: ResourceType,
    to: ResourceType,
    cost: u32,
    seq: u64,
    apply: Box<ConvertFn>,
}

impl core::fmt::Debug for Converter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Converter")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("cost", &self.cost)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Creates an edge with cost 1.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        from: ResourceType,
        to: ResourceType,
        apply: impl Fn(&Resource, &Destination, &mut Session<'_>) -> Result<Resource, BoxError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            from,
            to,
            cost: 1,
            seq: 0,
            apply: Box::new(apply),
        }
    }

    /// Sets the edge cost.
    ///
    /// # Panics
    ///
    /// Panics if `cost` is zero; the planner relies on positive weights.
    #[must_use]
    pub fn with_cost(mut self, cost: u32) -> Self {
        assert!(cost > 0, "converter '{}' must have a positive cost", self.name);
        self.cost = cost;
        self
    }

    /// Returns the edge name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the source type.
    #[must_use]
    pub fn from_type(&self) -> ResourceType {
        self.from
    }

    /// Returns the target type.
    #[must_use]
    pub fn to_type(&self) -> ResourceType {
        self.to
    }

    /// Returns the cost.
    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Returns the registration number; lower registered earlier.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Runs the converter.
    ///
    /// # Errors
    ///
    /// Returns whatever the converter returns.
    pub fn apply(
        &self,
        source: &Resource,
        destination: &Destination,
        session: &mut Session<'_>,
    ) -> Result<Resource, BoxError> {
        (self.apply)(source, destination, session)
    }
}

/// All registered edges.
#[derive(Default)]
pub struct ConverterRegistry {
    edges: IndexMap<(ResourceType, ResourceType), Arc<Converter>>,
    next_seq: u64,
}

impl core::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field(
                "edges",
                &self
                    .edges
                    .values()
                    .map(|c| format!("{}: {} -> {}", c.name, c.from, c.to))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ConverterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an edge, returning the edge it replaced.
    pub fn register(&mut self, mut converter: Converter) -> Option<Arc<Converter>> {
        converter.seq = self.next_seq;
        self.next_seq += 1;
        let key = (converter.from, converter.to);
        let replaced = self.edges.insert(key, Arc::new(converter));
        if let Some(old) = &replaced {
            tracing::debug!(
                edge = old.name(),
                from = %key.0,
                to = %key.1,
                "converter replaced"
            );
        }
        replaced
    }

    /// Returns the edge for a pair.
    #[must_use]
    pub fn get(&self, from: ResourceType, to: ResourceType) -> Option<&Arc<Converter>> {
        self.edges.get(&(from, to))
    }

    /// Returns the edges leaving `from`.
    pub fn edges_from(&self, from: ResourceType) -> impl Iterator<Item = &Arc<Converter>> + '_ {
        self.edges.values().filter(move |c| c.from == from)
    }

    /// Returns every edge.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Converter>> + '_ {
        self.edges.values()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if no edge is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_resource::FormatId;

    fn noop(name: &str, from: ResourceType, to: ResourceType) -> Converter {
        Converter::new(name, from, to, |source, _, _| Ok(source.clone()))
    }

    const CSV: FormatId = FormatId::new("csv");
    const JSON: FormatId = FormatId::new("json");

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = ConverterRegistry::new();
        let (a, b) = (ResourceType::local(CSV), ResourceType::local(JSON));
        assert!(registry.register(noop("first", a, b)).is_none());
        let replaced = registry.register(noop("second", a, b)).unwrap();
        assert_eq!(replaced.name(), "first");
        assert_eq!(registry.len(), 1);
        let edge = registry.get(a, b).unwrap();
        assert_eq!(edge.name(), "second");
        assert_eq!(edge.seq(), 1);
    }

    #[test]
    fn edges_from_filters_by_source() {
        let mut registry = ConverterRegistry::new();
        let (a, b) = (ResourceType::local(CSV), ResourceType::local(JSON));
        registry.register(noop("ab", a, b));
        registry.register(noop("ba", b, a));
        let names: Vec<_> = registry.edges_from(a).map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["ab"]);
    }

    #[test]
    #[should_panic(expected = "positive cost")]
    fn zero_cost_is_rejected() {
        let _ = noop("free", ResourceType::local(CSV), ResourceType::local(JSON)).with_cost(0);
    }
}
