//! Path search over the converter graph.
//!
//! # Algorithm
//!
//! 1. A registered edge straight from the source type to the target type is
//!    used as-is, whatever its cost.
//! 2. Otherwise a Dijkstra search runs over all edges, weighted by cost.
//!    Paths are ordered by `(total cost, registration numbers of their
//!    edges)`, so among equal-cost paths the one whose first differing edge
//!    was registered earliest wins.
//! 3. Directory sources without a registered directory edge are planned
//!    element-wise: directory → directory maps the element path over every
//!    member, directory → anything else reads members into records,
//!    concatenates them and continues from records.
//!
//! Planning has no side effects; it only reads the registry.

use crate::error::EngineError;
use crate::registry::{Converter, ConverterRegistry};
use ferry_resource::ResourceType;
use hashbrown::{HashMap, HashSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// ConversionPath
// ─────────────────────────────────────────────────────────────────────────────

/// An ordered chain of edges from one type to another.
#[derive(Debug, Clone)]
pub struct ConversionPath {
    from: ResourceType,
    to: ResourceType,
    steps: Vec<Arc<Converter>>,
}

impl ConversionPath {
    /// A path with no steps, for when source and target already agree.
    #[must_use]
    pub fn identity(ty: ResourceType) -> Self {
        Self {
            from: ty,
            to: ty,
            steps: Vec::new(),
        }
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

    /// Returns the edges in order.
    #[must_use]
    pub fn steps(&self) -> &[Arc<Converter>] {
        &self.steps
    }

    /// Returns the sum of edge costs.
    #[must_use]
    pub fn cost(&self) -> u64 {
        self.steps.iter().map(|c| u64::from(c.cost())).sum()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true for the identity path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the edge names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|c| c.name()).collect()
    }
}

impl core::fmt::Display for ConversionPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.from)?;
        for step in &self.steps {
            write!(f, " -[{}]-> {}", step.name(), step.to_type())?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plan
// ─────────────────────────────────────────────────────────────────────────────

/// How a conversion will run.
#[derive(Debug, Clone)]
pub enum Plan {
    /// Apply the path to the source once.
    Direct(ConversionPath),
    /// Apply the element path to every member of a directory, writing into a
    /// directory of the target element type.
    MapMembers(ConversionPath),
    /// Convert every member to records with `element`, concatenate, then
    /// apply `rest` to the combined records.
    Concatenate {
        /// Member → records.
        element: ConversionPath,
        /// Records → target. Empty when the target is records.
        rest: ConversionPath,
    },
}

impl Plan {
    /// Returns the number of edges applied per element.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Direct(path) | Self::MapMembers(path) => path.len(),
            Self::Concatenate { element, rest } => element.len() + rest.len(),
        }
    }

    /// Returns true if no edge runs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Display for Plan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Direct(path) => write!(f, "{path}"),
            Self::MapMembers(path) => write!(f, "for each member: {path}"),
            Self::Concatenate { element, rest } => {
                write!(f, "for each member: {element}; concatenate")?;
                if !rest.is_empty() {
                    write!(f, "; then {rest}")?;
                }
                Ok(())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Search
// ─────────────────────────────────────────────────────────────────────────────

/// Finds the path from `from` to `to`, or `None`.
///
/// At least one edge is always applied, so `from == to` looks for a route
/// that copies the resource (a self edge or a round trip).
#[must_use]
pub fn shortest_path(
    registry: &ConverterRegistry,
    from: ResourceType,
    to: ResourceType,
) -> Option<ConversionPath> {
    if let Some(direct) = registry.get(from, to) {
        return Some(ConversionPath {
            from,
            to,
            steps: vec![Arc::clone(direct)],
        });
    }

    // Entries order by (cost, edge sequence numbers); `Reverse` makes the
    // max-heap pop the smallest.
    type Entry = Reverse<(u64, Vec<u64>, ResourceType)>;
    let mut heap: BinaryHeap<Entry> = BinaryHeap::new();
    let mut settled: HashSet<ResourceType> = HashSet::new();
    let mut best: HashMap<Vec<u64>, Vec<Arc<Converter>>> = HashMap::new();

    for edge in registry.edges_from(from) {
        let seqs = vec![edge.seq()];
        best.insert(seqs.clone(), vec![Arc::clone(edge)]);
        heap.push(Reverse((u64::from(edge.cost()), seqs, edge.to_type())));
    }

    while let Some(Reverse((cost, seqs, node))) = heap.pop() {
        if node == to {
            let steps = best.remove(&seqs)?;
            return Some(ConversionPath { from, to, steps });
        }
        if !settled.insert(node) {
            continue;
        }
        let Some(prefix) = best.get(&seqs).cloned() else {
            continue;
        };
        for edge in registry.edges_from(node) {
            if settled.contains(&edge.to_type()) && edge.to_type() != to {
                continue;
            }
            let mut next_seqs = seqs.clone();
            next_seqs.push(edge.seq());
            let mut steps = prefix.clone();
            steps.push(Arc::clone(edge));
            best.insert(next_seqs.clone(), steps);
            heap.push(Reverse((cost + u64::from(edge.cost()), next_seqs, edge.to_type())));
        }
    }
    None
}

/// Plans a conversion between two types.
///
/// # Errors
///
/// Returns [`EngineError::NoConversionPath`] when no route exists.
pub fn plan(
    registry: &ConverterRegistry,
    from: ResourceType,
    to: ResourceType,
) -> Result<Plan, EngineError> {
    if let Some(path) = shortest_path(registry, from, to) {
        return Ok(Plan::Direct(path));
    }
    let missing = || EngineError::NoConversionPath { from, to };
    if !from.is_directory() {
        return Err(missing());
    }

    let element = from.element();
    if to.is_directory() {
        let path = shortest_path(registry, element, to.element()).ok_or_else(missing)?;
        return Ok(Plan::MapMembers(path));
    }

    let records = ResourceType::records();
    let to_records = if element == records {
        ConversionPath::identity(records)
    } else {
        shortest_path(registry, element, records).ok_or_else(missing)?
    };
    let rest = if to == records {
        ConversionPath::identity(records)
    } else {
        shortest_path(registry, records, to).ok_or_else(missing)?
    };
    Ok(Plan::Concatenate {
        element: to_records,
        rest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_resource::FormatId;

    const A: FormatId = FormatId::new("a");
    const B: FormatId = FormatId::new("b");
    const C: FormatId = FormatId::new("c");
    const D: FormatId = FormatId::new("d");

    fn t(format: FormatId) -> ResourceType {
        ResourceType::local(format)
    }

    fn edge(name: &str, from: FormatId, to: FormatId) -> Converter {
        Converter::new(name, t(from), t(to), |source, _, _| Ok(source.clone()))
    }

    #[test]
    fn direct_edge_wins_even_if_costlier() {
        let mut registry = ConverterRegistry::new();
        registry.register(edge("ab", A, B).with_cost(10));
        registry.register(edge("ac", A, C));
        registry.register(edge("cb", C, B));
        let path = shortest_path(&registry, t(A), t(B)).unwrap();
        assert_eq!(path.names(), vec!["ab"]);
    }

    #[test]
    fn cheapest_multi_step_path() {
        let mut registry = ConverterRegistry::new();
        registry.register(edge("ab", A, B).with_cost(5));
        registry.register(edge("bd", B, D));
        registry.register(edge("ac", A, C));
        registry.register(edge("cd", C, D).with_cost(2));
        let path = shortest_path(&registry, t(A), t(D)).unwrap();
        assert_eq!(path.names(), vec!["ac", "cd"]);
        assert_eq!(path.cost(), 3);
        assert_eq!(path.to_string(), "a -[ac]-> c -[cd]-> d");
    }

    #[test]
    fn equal_cost_tie_goes_to_first_registered() {
        let mut registry = ConverterRegistry::new();
        registry.register(edge("ab", A, B));
        registry.register(edge("bd", B, D));
        registry.register(edge("ac", A, C));
        registry.register(edge("cd", C, D));
        let path = shortest_path(&registry, t(A), t(D)).unwrap();
        assert_eq!(path.names(), vec!["ab", "bd"]);

        let mut reversed = ConverterRegistry::new();
        reversed.register(edge("ac", A, C));
        reversed.register(edge("cd", C, D));
        reversed.register(edge("ab", A, B));
        reversed.register(edge("bd", B, D));
        let path = shortest_path(&reversed, t(A), t(D)).unwrap();
        assert_eq!(path.names(), vec!["ac", "cd"]);
    }

    #[test]
    fn no_path() {
        let mut registry = ConverterRegistry::new();
        registry.register(edge("ab", A, B));
        assert!(shortest_path(&registry, t(B), t(A)).is_none());
        assert!(matches!(
            plan(&registry, t(B), t(A)),
            Err(EngineError::NoConversionPath { .. })
        ));
    }

    #[test]
    fn same_type_needs_a_round_trip() {
        let mut registry = ConverterRegistry::new();
        registry.register(edge("ab", A, B));
        registry.register(edge("ba", B, A));
        let path = shortest_path(&registry, t(A), t(A)).unwrap();
        assert_eq!(path.names(), vec!["ab", "ba"]);
    }

    #[test]
    fn directories_map_or_concatenate() {
        let mut registry = ConverterRegistry::new();
        let records = ResourceType::records();
        registry.register(Converter::new("a->records", t(A), records, |s, _, _| Ok(s.clone())));
        registry.register(Converter::new("records->b", records, t(B), |s, _, _| Ok(s.clone())));

        let mapped = plan(&registry, t(A).directory(), t(B).directory()).unwrap();
        assert!(matches!(&mapped, Plan::MapMembers(p) if p.len() == 2));

        let concat = plan(&registry, t(A).directory(), t(B)).unwrap();
        match concat {
            Plan::Concatenate { element, rest } => {
                assert_eq!(element.names(), vec!["a->records"]);
                assert_eq!(rest.names(), vec!["records->b"]);
            }
            other => panic!("unexpected plan {other}"),
        }

        let to_records = plan(&registry, t(A).directory(), records).unwrap();
        assert!(matches!(to_records, Plan::Concatenate { ref rest, .. } if rest.is_empty()));
    }
}
