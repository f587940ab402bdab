//! Property tests for the planner against an exhaustive search.

use ferry_convert::planner::shortest_path;
use ferry_convert::{Converter, ConverterRegistry};
use ferry_resource::{FormatId, ResourceType};
use proptest::prelude::*;

const NODES: [FormatId; 5] = [
    FormatId::new("n0"),
    FormatId::new("n1"),
    FormatId::new("n2"),
    FormatId::new("n3"),
    FormatId::new("n4"),
];

fn ty(i: usize) -> ResourceType {
    ResourceType::local(NODES[i])
}

fn registry(edges: &[(usize, usize, u32)]) -> ConverterRegistry {
    let mut registry = ConverterRegistry::new();
    for (i, &(from, to, cost)) in edges.iter().enumerate() {
        registry.register(
            Converter::new(format!("e{i}"), ty(from), ty(to), |s, _, _| Ok(s.clone()))
                .with_cost(cost),
        );
    }
    registry
}

/// Lowest `(cost, registration numbers)` over all simple paths.
fn exhaustive(
    registry: &ConverterRegistry,
    from: ResourceType,
    to: ResourceType,
) -> Option<(u64, Vec<u64>)> {
    fn walk(
        registry: &ConverterRegistry,
        node: ResourceType,
        to: ResourceType,
        visited: &mut Vec<ResourceType>,
        cost: u64,
        seqs: &mut Vec<u64>,
        best: &mut Option<(u64, Vec<u64>)>,
    ) {
        if node == to && !seqs.is_empty() {
            let candidate = (cost, seqs.clone());
            if best.as_ref().is_none_or(|b| candidate < *b) {
                *best = Some(candidate);
            }
            return;
        }
        for edge in registry.edges_from(node) {
            let next = edge.to_type();
            if visited.contains(&next) {
                continue;
            }
            visited.push(next);
            seqs.push(edge.seq());
            walk(registry, next, to, visited, cost + u64::from(edge.cost()), seqs, best);
            seqs.pop();
            visited.pop();
        }
    }

    let mut best = None;
    walk(registry, from, to, &mut vec![from], 0, &mut Vec::new(), &mut best);
    best
}

fn edges() -> impl Strategy<Value = Vec<(usize, usize, u32)>> {
    prop::collection::vec((0..NODES.len(), 0..NODES.len(), 1u32..4), 0..16)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn planning_is_deterministic(edges in edges(), from in 0..NODES.len(), to in 0..NODES.len()) {
        let first = registry(&edges);
        let second = registry(&edges);
        let a = shortest_path(&first, ty(from), ty(to)).map(|p| p.names().join(","));
        let b = shortest_path(&first, ty(from), ty(to)).map(|p| p.names().join(","));
        let c = shortest_path(&second, ty(from), ty(to)).map(|p| p.names().join(","));
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&a, &c);
    }

    #[test]
    fn path_is_cheapest_and_first_registered(
        edges in edges(),
        from in 0..NODES.len(),
        to in 0..NODES.len(),
    ) {
        prop_assume!(from != to);
        let registry = registry(&edges);
        let found = shortest_path(&registry, ty(from), ty(to));

        if let Some(direct) = registry.get(ty(from), ty(to)) {
            let path = found.expect("a direct edge is always a path");
            prop_assert_eq!(path.names(), vec![direct.name()]);
            return Ok(());
        }

        let expected = exhaustive(&registry, ty(from), ty(to));
        match (found, expected) {
            (None, None) => {}
            (Some(path), Some((cost, seqs))) => {
                prop_assert_eq!(path.cost(), cost);
                let got: Vec<u64> = path.steps().iter().map(|s| s.seq()).collect();
                prop_assert_eq!(got, seqs);

                prop_assert_eq!(path.steps()[0].from_type(), ty(from));
                for pair in path.steps().windows(2) {
                    prop_assert_eq!(pair[0].to_type(), pair[1].from_type());
                }
                prop_assert_eq!(path.steps()[path.len() - 1].to_type(), ty(to));
            }
            (found, expected) => {
                prop_assert!(
                    false,
                    "planner found {:?}, exhaustive search found {:?}",
                    found.map(|p| p.to_string()),
                    expected
                );
            }
        }
    }
}
