use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::spf::{SearchArc, SearchGraph};
use crate::model::{compare_paths, GraphModel, LinkId, NodeId, Path};

const EPS: f64 = 1e-9;

/// Bounds applied to every enumerated path. A value that is `None`, zero or
/// negative leaves the corresponding dimension unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KspConstraints {
    pub max_hops: Option<usize>,
    pub max_length_km: Option<f64>,
    pub max_delay_ms: Option<f64>,
    pub max_cost: Option<f64>,
    pub max_cost_factor: Option<f64>,
    pub max_cost_offset: Option<f64>,
}

fn bound(value: Option<f64>) -> Option<f64> {
    value.filter(|limit| *limit > 0.0)
}

impl KspConstraints {
    fn hop_bound(&self) -> Option<usize> {
        self.max_hops.filter(|limit| *limit > 0)
    }

    /// Absolute bounds: hop count, physical length and propagation delay.
    pub fn accept_path(&self, graph: &GraphModel<'_>, path: &Path) -> bool {
        if let Some(max_hops) = self.hop_bound() {
            if path.hop_count() > max_hops {
                return false;
            }
        }
        if let Some(max_length) = bound(self.max_length_km) {
            if path.length_km(graph.network()) > max_length + EPS {
                return false;
            }
        }
        if let Some(max_delay) = bound(self.max_delay_ms) {
            if path.delay_ms(graph.network()) > max_delay + EPS {
                return false;
            }
        }
        true
    }

    /// Bounds relative to the cost of the first (shortest) accepted path.
    pub fn compare_to_shortest(&self, path: &Path, shortest_cost: f64) -> bool {
        let cost = path.cost();
        if let Some(max_cost) = bound(self.max_cost) {
            if cost > max_cost + EPS {
                return false;
            }
        }
        if let Some(factor) = bound(self.max_cost_factor) {
            if cost > factor * shortest_cost + EPS {
                return false;
            }
        }
        if let Some(offset) = bound(self.max_cost_offset) {
            if cost > shortest_cost + offset + EPS {
                return false;
            }
        }
        true
    }
}

struct Candidate(Path);

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_paths(&other.0, &self.0)
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Search graph for the enumeration. Links longer than the path length
/// bound can never appear in an accepted path, so they are left out up front.
fn build_search_graph(graph: &GraphModel<'_>, constraints: &KspConstraints) -> SearchGraph {
    let max_length = bound(constraints.max_length_km);
    let mut search = SearchGraph::with_vertices(graph.network().node_count());
    let mut skipped = 0usize;
    for link in graph.usable_links() {
        if max_length.is_some_and(|limit| link.length_km > limit + EPS) {
            skipped += 1;
            continue;
        }
        search.add_arc(SearchArc {
            id: link.index,
            tail: link.origin,
            head: link.destination,
            cost: graph.cost(link.index),
        });
    }
    if skipped > 0 {
        debug!("ksp: {skipped} link(s) exceed the path length bound on their own");
    }
    search
}

fn to_path(graph: &GraphModel<'_>, links: Vec<LinkId>) -> Option<Path> {
    Path::new(graph, links).ok()
}

/// Yen's algorithm: up to `k` loopless paths ordered by
/// [`compare_paths`], each satisfying `constraints`.
pub fn k_shortest_paths(
    graph: &GraphModel<'_>,
    origin: NodeId,
    destination: NodeId,
    k: usize,
    constraints: &KspConstraints,
) -> Vec<Path> {
    if k == 0
        || origin == destination
        || !graph.contains_node(origin)
        || !graph.contains_node(destination)
    {
        return Vec::new();
    }

    let search = build_search_graph(graph, constraints);
    let Some(first_arcs) = search
        .search(origin, Some(destination), &BTreeSet::new(), &BTreeSet::new())
        .arcs_to(destination)
    else {
        return Vec::new();
    };
    let Some(first_path) = to_path(graph, first_arcs.iter().map(|arc| arc.id).collect()) else {
        return Vec::new();
    };
    if !constraints.accept_path(graph, &first_path)
        || !constraints.compare_to_shortest(&first_path, first_path.cost())
    {
        return Vec::new();
    }

    let shortest_cost = first_path.cost();
    let mut seen: BTreeSet<Vec<LinkId>> = BTreeSet::new();
    seen.insert(first_path.links().to_vec());
    let mut accepted = vec![first_path];
    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::new();

    while accepted.len() < k {
        let previous = &accepted[accepted.len() - 1];

        for deviation in 0..previous.hop_count() {
            let spur_node = previous.nodes()[deviation];
            let head_links = &previous.links()[..deviation];

            let blocked_nodes: BTreeSet<NodeId> =
                previous.nodes()[..deviation].iter().copied().collect();
            let blocked_links: BTreeSet<LinkId> = accepted
                .iter()
                .filter(|path| {
                    path.hop_count() > deviation && &path.links()[..deviation] == head_links
                })
                .map(|path| path.links()[deviation])
                .collect();

            let Some(tail) = search
                .search(spur_node, Some(destination), &blocked_nodes, &blocked_links)
                .arcs_to(destination)
            else {
                continue;
            };

            let mut links = head_links.to_vec();
            links.extend(tail.iter().map(|arc| arc.id));
            if !seen.insert(links.clone()) {
                continue;
            }
            let Some(candidate) = to_path(graph, links) else {
                continue;
            };
            if constraints.accept_path(graph, &candidate)
                && constraints.compare_to_shortest(&candidate, shortest_cost)
            {
                candidates.push(Candidate(candidate));
            }
        }

        let Some(Candidate(best)) = candidates.pop() else {
            break;
        };
        accepted.push(best);
    }

    // Dijkstra does not prefer longer equal-cost paths, so the first path
    // may need to move behind its equal-cost peers.
    accepted.sort_by(compare_paths);
    debug!(
        "ksp {origin}->{destination}: {} path(s) accepted, {} candidate(s) left",
        accepted.len(),
        candidates.len()
    );
    accepted
}
