use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{disjoint_path_pair, k_shortest_paths, shortest_path, DisjointKind, KspConstraints};
use crate::error::{PathflowError, Result};
use crate::model::{GraphModel, NodeId, Path};

/// Explicit registry of the path algorithms a host can select by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathAlgorithm {
    Dijkstra,
    Yen,
    SuurballeLink,
    SuurballeNode,
}

impl PathAlgorithm {
    pub const ALL: [PathAlgorithm; 4] = [
        PathAlgorithm::Dijkstra,
        PathAlgorithm::Yen,
        PathAlgorithm::SuurballeLink,
        PathAlgorithm::SuurballeNode,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PathAlgorithm::Dijkstra => "dijkstra",
            PathAlgorithm::Yen => "yen",
            PathAlgorithm::SuurballeLink => "suurballe-link",
            PathAlgorithm::SuurballeNode => "suurballe-node",
        }
    }
}

impl fmt::Display for PathAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PathAlgorithm {
    type Err = PathflowError;

    fn from_str(raw: &str) -> Result<Self> {
        let key = raw.trim().to_lowercase().replace('_', "-");
        match key.as_str() {
            "dijkstra" | "spf" | "shortest" => Ok(PathAlgorithm::Dijkstra),
            "yen" | "ksp" => Ok(PathAlgorithm::Yen),
            "suurballe-link" | "suurballe" | "link-disjoint" => Ok(PathAlgorithm::SuurballeLink),
            "suurballe-node" | "node-disjoint" => Ok(PathAlgorithm::SuurballeNode),
            _ => Err(PathflowError::UnknownAlgorithm(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathRequest {
    pub origin: NodeId,
    pub destination: NodeId,
    pub k: usize,
    pub constraints: KspConstraints,
}

impl PathRequest {
    pub fn new(origin: NodeId, destination: NodeId) -> Self {
        Self {
            origin,
            destination,
            k: 1,
            constraints: KspConstraints::default(),
        }
    }
}

pub fn compute_paths(
    graph: &GraphModel<'_>,
    algorithm: PathAlgorithm,
    request: &PathRequest,
) -> Result<Vec<Path>> {
    let network = graph.network();
    network.check_node(request.origin)?;
    network.check_node(request.destination)?;

    match algorithm {
        PathAlgorithm::Dijkstra => Ok(shortest_path(graph, request.origin, request.destination)
            .into_iter()
            .collect()),
        PathAlgorithm::Yen => Ok(k_shortest_paths(
            graph,
            request.origin,
            request.destination,
            request.k,
            &request.constraints,
        )),
        PathAlgorithm::SuurballeLink => disjoint_path_pair(
            graph,
            request.origin,
            request.destination,
            DisjointKind::Link,
        ),
        PathAlgorithm::SuurballeNode => disjoint_path_pair(
            graph,
            request.origin,
            request.destination,
            DisjointKind::Node,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Network;

    #[test]
    fn names_round_trip_through_from_str() {
        for algorithm in PathAlgorithm::ALL {
            assert_eq!(algorithm.name().parse::<PathAlgorithm>(), Ok(algorithm));
        }
        assert_eq!("KSP".parse::<PathAlgorithm>(), Ok(PathAlgorithm::Yen));
        assert!(matches!(
            "bellman".parse::<PathAlgorithm>(),
            Err(PathflowError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn dispatch_reaches_every_algorithm() {
        let mut network = Network::new();
        for name in ["a", "b", "c", "d"] {
            network.add_node(name);
        }
        network.add_link(0, 1, 1.0).unwrap();
        network.add_link(1, 3, 1.0).unwrap();
        network.add_link(0, 2, 1.0).unwrap();
        network.add_link(2, 3, 1.0).unwrap();
        let graph = GraphModel::new(&network);

        let mut request = PathRequest::new(0, 3);
        request.k = 5;
        let expected = [1, 2, 2, 2];
        for (algorithm, count) in PathAlgorithm::ALL.into_iter().zip(expected) {
            let paths = compute_paths(&graph, algorithm, &request).unwrap();
            assert_eq!(paths.len(), count, "{algorithm}");
        }

        request.destination = 42;
        assert!(compute_paths(&graph, PathAlgorithm::Dijkstra, &request).is_err());
    }
}
