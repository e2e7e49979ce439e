use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;

use super::network::{GraphModel, LinkId, Network, NodeId};
use crate::error::{PathflowError, Result};

const EPS: f64 = 1e-9;

/// A non-empty, continuous sequence of links together with the cost it was
/// evaluated at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    links: Vec<LinkId>,
    nodes: Vec<NodeId>,
    cost: f64,
}

impl Path {
    /// Builds a path and evaluates its cost under `graph`.
    pub fn new(graph: &GraphModel<'_>, links: Vec<LinkId>) -> Result<Self> {
        let cost = graph.path_cost(&links);
        Self::with_cost(graph.network(), links, cost)
    }

    pub fn with_cost(network: &Network, links: Vec<LinkId>, cost: f64) -> Result<Self> {
        let nodes = check_continuity(network, &links)?;
        Ok(Self { links, nodes, cost })
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    /// Traversed nodes, origin first; one longer than [`Path::links`].
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn origin(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn destination(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn hop_count(&self) -> usize {
        self.links.len()
    }

    pub fn length_km(&self, network: &Network) -> f64 {
        self.links
            .iter()
            .filter_map(|link| network.link(*link))
            .map(|link| link.length_km)
            .sum()
    }

    pub fn delay_ms(&self, network: &Network) -> f64 {
        self.links
            .iter()
            .filter_map(|link| network.link(*link))
            .map(|link| link.propagation_delay_ms())
            .sum()
    }

    pub fn contains_link(&self, link: LinkId) -> bool {
        self.links.contains(&link)
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn intermediate_nodes(&self) -> &[NodeId] {
        &self.nodes[1..self.nodes.len() - 1]
    }

    pub fn is_loopless(&self) -> bool {
        let unique: BTreeSet<NodeId> = self.nodes.iter().copied().collect();
        unique.len() == self.nodes.len()
    }

    pub fn shares_link_with(&self, other: &Path) -> bool {
        self.links.iter().any(|link| other.contains_link(*link))
    }

    pub fn shares_intermediate_node_with(&self, other: &Path) -> bool {
        let theirs: BTreeSet<NodeId> = other.intermediate_nodes().iter().copied().collect();
        self.intermediate_nodes()
            .iter()
            .any(|node| theirs.contains(node))
    }
}

/// Checks that consecutive links share a node and returns the node sequence.
pub fn check_continuity(network: &Network, links: &[LinkId]) -> Result<Vec<NodeId>> {
    let Some(first) = links.first() else {
        return Err(PathflowError::InvalidPath("path has no links".to_string()));
    };
    let first = network.link(*first).ok_or(PathflowError::UnknownLink(*first))?;

    let mut nodes = Vec::with_capacity(links.len() + 1);
    nodes.push(first.origin);
    let mut current = first.origin;
    for link_id in links {
        let link = network
            .link(*link_id)
            .ok_or(PathflowError::UnknownLink(*link_id))?;
        if link.origin != current {
            return Err(PathflowError::InvalidPath(format!(
                "link {} starts at node {} but the path is at node {}",
                link.index, link.origin, current
            )));
        }
        current = link.destination;
        nodes.push(current);
    }
    Ok(nodes)
}

/// Weight ascending, then hop count descending, then link sequence.
pub fn compare_paths(a: &Path, b: &Path) -> Ordering {
    let by_cost = if (a.cost - b.cost).abs() <= EPS {
        Ordering::Equal
    } else {
        a.cost.total_cmp(&b.cost)
    };
    by_cost
        .then_with(|| b.hop_count().cmp(&a.hop_count()))
        .then_with(|| a.links.cmp(&b.links))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Network {
        let mut network = Network::new();
        for name in ["a", "b", "c"] {
            network.add_node(name);
        }
        network.add_link(0, 1, 1.0).unwrap();
        network.add_link(1, 2, 2.0).unwrap();
        network.add_link(0, 2, 3.0).unwrap();
        network
    }

    #[test]
    fn continuity_is_enforced() {
        let network = line();
        let graph = GraphModel::new(&network).with_link_costs().unwrap();
        let path = Path::new(&graph, vec![0, 1]).unwrap();
        assert_eq!(path.nodes(), &[0, 1, 2]);
        assert_eq!(path.cost(), 3.0);

        assert!(matches!(
            Path::new(&graph, vec![1, 0]),
            Err(PathflowError::InvalidPath(_))
        ));
        assert!(matches!(
            Path::new(&graph, Vec::new()),
            Err(PathflowError::InvalidPath(_))
        ));
        assert!(matches!(
            Path::new(&graph, vec![9]),
            Err(PathflowError::UnknownLink(9))
        ));
    }

    #[test]
    fn equal_cost_prefers_more_hops_first() {
        let network = line();
        let graph = GraphModel::new(&network).with_link_costs().unwrap();
        let two_hops = Path::new(&graph, vec![0, 1]).unwrap();
        let direct = Path::new(&graph, vec![2]).unwrap();
        assert_eq!(compare_paths(&two_hops, &direct), Ordering::Less);
    }

    #[test]
    fn intermediate_nodes_exclude_endpoints() {
        let network = line();
        let graph = GraphModel::new(&network);
        let path = Path::new(&graph, vec![0, 1]).unwrap();
        assert_eq!(path.intermediate_nodes(), &[1]);
        assert!(path.is_loopless());
    }
}
