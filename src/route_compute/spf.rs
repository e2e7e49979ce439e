use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use crate::model::{GraphModel, NodeId, Path};

const EPS: f64 = 1e-9;

/// Directed arc of a search graph. `id` is the link index for graphs built
/// from a [`GraphModel`], or an arena slot for auxiliary graphs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SearchArc {
    pub id: usize,
    pub tail: usize,
    pub head: usize,
    pub cost: f64,
}

/// Adjacency lists Dijkstra runs on. Every search in the crate goes through
/// this type so auxiliary graphs (reversed or split) reuse the same routine.
#[derive(Debug, Clone, Default)]
pub(crate) struct SearchGraph {
    outgoing: Vec<Vec<SearchArc>>,
}

impl SearchGraph {
    pub fn with_vertices(count: usize) -> Self {
        Self {
            outgoing: vec![Vec::new(); count],
        }
    }

    pub fn from_model(graph: &GraphModel<'_>) -> Self {
        let mut search = Self::with_vertices(graph.network().node_count());
        for link in graph.usable_links() {
            search.add_arc(SearchArc {
                id: link.index,
                tail: link.origin,
                head: link.destination,
                cost: graph.cost(link.index),
            });
        }
        search
    }

    pub fn vertex_count(&self) -> usize {
        self.outgoing.len()
    }

    /// Arcs with a non-finite or negative cost are dropped.
    pub fn add_arc(&mut self, arc: SearchArc) {
        if !arc.cost.is_finite() || arc.cost < 0.0 {
            return;
        }
        if arc.tail >= self.outgoing.len() || arc.head >= self.outgoing.len() {
            return;
        }
        self.outgoing[arc.tail].push(arc);
    }

    pub fn arcs(&self) -> impl Iterator<Item = &SearchArc> {
        self.outgoing.iter().flatten()
    }

    pub fn search(
        &self,
        src: usize,
        target: Option<usize>,
        blocked_vertices: &BTreeSet<usize>,
        blocked_arcs: &BTreeSet<usize>,
    ) -> SearchTree {
        let count = self.vertex_count();
        let mut dist = vec![f64::INFINITY; count];
        let mut parent: Vec<Option<SearchArc>> = vec![None; count];
        let mut settled = vec![false; count];

        if src >= count || blocked_vertices.contains(&src) {
            return SearchTree { src, dist, parent };
        }

        let mut heap = BinaryHeap::new();
        dist[src] = 0.0;
        heap.push(Label {
            cost: 0.0,
            vertex: src,
            via: None,
        });

        while let Some(label) = heap.pop() {
            let u = label.vertex;
            if settled[u] || label.cost > dist[u] + EPS {
                continue;
            }
            settled[u] = true;
            if target == Some(u) {
                break;
            }

            for arc in &self.outgoing[u] {
                let v = arc.head;
                if settled[v] || blocked_vertices.contains(&v) || blocked_arcs.contains(&arc.id) {
                    continue;
                }

                let candidate = dist[u] + arc.cost;
                let better = candidate + EPS < dist[v];
                let tied = (candidate - dist[v]).abs() <= EPS
                    && parent[v].is_some_and(|current| arc.id < current.id);

                if better || tied {
                    dist[v] = candidate;
                    parent[v] = Some(*arc);
                    heap.push(Label {
                        cost: candidate,
                        vertex: v,
                        via: Some(arc.id),
                    });
                }
            }
        }

        SearchTree { src, dist, parent }
    }
}

/// Tentative distance waiting in the search heap, tagged with the arc that
/// produced it. The heap pops the cheapest label first and breaks cost ties
/// on the lower arc id, so equal-cost searches settle deterministically.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Label {
    cost: f64,
    vertex: usize,
    via: Option<usize>,
}

impl Eq for Label {}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.via.cmp(&self.via))
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SearchTree {
    src: usize,
    dist: Vec<f64>,
    parent: Vec<Option<SearchArc>>,
}

impl SearchTree {
    pub fn distance(&self, vertex: usize) -> f64 {
        self.dist.get(vertex).copied().unwrap_or(f64::INFINITY)
    }

    pub fn distances(self) -> Vec<f64> {
        self.dist
    }

    /// Arcs from the source to `dst`, or `None` when unreachable.
    pub fn arcs_to(&self, dst: usize) -> Option<Vec<SearchArc>> {
        if !self.distance(dst).is_finite() {
            return None;
        }
        let mut reversed = Vec::new();
        let mut current = dst;
        for _ in 0..self.parent.len() {
            if current == self.src {
                reversed.reverse();
                return Some(reversed);
            }
            let arc = self.parent[current]?;
            reversed.push(arc);
            current = arc.tail;
        }
        None
    }
}

/// Minimum-cost path, or `None` if an endpoint is outside the graph, both
/// endpoints coincide, or the destination is unreachable.
pub fn shortest_path(graph: &GraphModel<'_>, origin: NodeId, destination: NodeId) -> Option<Path> {
    if origin == destination || !graph.contains_node(origin) || !graph.contains_node(destination)
    {
        return None;
    }
    let search = SearchGraph::from_model(graph);
    let tree = search.search(origin, Some(destination), &BTreeSet::new(), &BTreeSet::new());
    let arcs = tree.arcs_to(destination)?;
    Path::new(graph, arcs.iter().map(|arc| arc.id).collect()).ok()
}

/// Distance from `origin` to every node; unreachable nodes are infinite.
pub fn shortest_distances(graph: &GraphModel<'_>, origin: NodeId) -> Vec<f64> {
    let search = SearchGraph::from_model(graph);
    if !graph.contains_node(origin) {
        return vec![f64::INFINITY; search.vertex_count()];
    }
    search
        .search(origin, None, &BTreeSet::new(), &BTreeSet::new())
        .distances()
}
