use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::spf::{SearchArc, SearchGraph};
use crate::error::{PathflowError, Result};
use crate::model::{compare_paths, GraphModel, LinkId, NodeId, Path};

const CLAMP_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisjointKind {
    #[default]
    Link,
    Node,
}

impl FromStr for DisjointKind {
    type Err = PathflowError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "link" | "links" => Ok(DisjointKind::Link),
            "node" | "nodes" => Ok(DisjointKind::Node),
            _ => Err(PathflowError::UnknownDisjointKind(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PairOutcome {
    Unreachable,
    Single(Vec<SearchArc>),
    Pair(Vec<SearchArc>, Vec<SearchArc>),
}

/// Vertex of the auxiliary graph built for node-disjoint searches. Every
/// intermediate node keeps its index as the "in" copy and gains an "out" copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuxVertex {
    Real(NodeId),
    SplitOut(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuxLinkKind {
    Real(LinkId),
    Synthetic(NodeId),
}

#[derive(Debug, Clone, Copy)]
struct AuxLink {
    kind: AuxLinkKind,
    tail: AuxVertex,
    head: AuxVertex,
    cost: f64,
}

/// Arena of auxiliary links; arc ids in the derived search graph are arena
/// slots.
struct SplitGraph {
    node_count: usize,
    arena: Vec<AuxLink>,
}

impl SplitGraph {
    fn build(graph: &GraphModel<'_>, origin: NodeId, destination: NodeId) -> Self {
        let network = graph.network();
        let node_count = network.node_count();
        let is_split =
            |node: NodeId| node != origin && node != destination && graph.contains_node(node);

        let mut arena = Vec::new();
        for node in 0..node_count {
            if is_split(node) {
                arena.push(AuxLink {
                    kind: AuxLinkKind::Synthetic(node),
                    tail: AuxVertex::Real(node),
                    head: AuxVertex::SplitOut(node),
                    cost: 1.0,
                });
            }
        }
        for link in graph.usable_links() {
            let tail = if is_split(link.origin) {
                AuxVertex::SplitOut(link.origin)
            } else {
                AuxVertex::Real(link.origin)
            };
            arena.push(AuxLink {
                kind: AuxLinkKind::Real(link.index),
                tail,
                head: AuxVertex::Real(link.destination),
                cost: graph.cost(link.index),
            });
        }
        Self { node_count, arena }
    }

    fn vertex_index(&self, vertex: AuxVertex) -> usize {
        match vertex {
            AuxVertex::Real(node) => node,
            AuxVertex::SplitOut(node) => self.node_count + node,
        }
    }

    fn search_graph(&self) -> SearchGraph {
        let mut search = SearchGraph::with_vertices(2 * self.node_count);
        for (slot, link) in self.arena.iter().enumerate() {
            search.add_arc(SearchArc {
                id: slot,
                tail: self.vertex_index(link.tail),
                head: self.vertex_index(link.head),
                cost: link.cost,
            });
        }
        search
    }

    fn real_links(&self, arcs: &[SearchArc]) -> Vec<LinkId> {
        arcs.iter()
            .filter_map(|arc| match self.arena[arc.id].kind {
                AuxLinkKind::Real(link) => Some(link),
                AuxLinkKind::Synthetic(_) => None,
            })
            .collect()
    }
}

fn touches(arc: &SearchArc, vertex: usize) -> bool {
    arc.tail == vertex || arc.head == vertex
}

/// Walks from `src` through unused pool arcs until `dst`; `None` on a dead end.
fn extend_through_pool(
    pool: &[SearchArc],
    used: &mut [bool],
    src: usize,
    dst: usize,
) -> Option<Vec<SearchArc>> {
    let mut arcs = Vec::new();
    let mut current = src;
    while current != dst {
        if arcs.len() >= pool.len() {
            return None;
        }
        let (slot, arc) = pool
            .iter()
            .enumerate()
            .filter(|(slot, arc)| !used[*slot] && arc.tail == current)
            .min_by_key(|(_, arc)| arc.id)?;
        used[slot] = true;
        arcs.push(*arc);
        current = arc.head;
    }
    Some(arcs)
}

fn suurballe(search: &SearchGraph, src: usize, dst: usize) -> PairOutcome {
    let no_blocks = BTreeSet::new();
    let tree = search.search(src, None, &no_blocks, &no_blocks);
    let Some(first) = tree.arcs_to(dst) else {
        return PairOutcome::Unreachable;
    };
    let first_ids: BTreeSet<usize> = first.iter().map(|arc| arc.id).collect();

    let mut residual = SearchGraph::with_vertices(search.vertex_count());
    for arc in search.arcs() {
        let (du, dv) = (tree.distance(arc.tail), tree.distance(arc.head));
        if !du.is_finite() || !dv.is_finite() {
            continue;
        }
        if first_ids.contains(&arc.id) {
            residual.add_arc(SearchArc {
                id: arc.id,
                tail: arc.head,
                head: arc.tail,
                cost: 0.0,
            });
            continue;
        }
        let mut reduced = arc.cost - dv + du;
        if reduced < 0.0 && reduced >= -CLAMP_EPS * (1.0 + du.abs().max(dv.abs())) {
            reduced = 0.0;
        }
        residual.add_arc(SearchArc {
            cost: reduced,
            ..*arc
        });
    }

    let Some(second) = residual
        .search(src, Some(dst), &no_blocks, &no_blocks)
        .arcs_to(dst)
    else {
        return PairOutcome::Single(first);
    };

    let common: BTreeSet<usize> = second
        .iter()
        .map(|arc| arc.id)
        .filter(|id| first_ids.contains(id))
        .collect();
    let infeasible = first
        .iter()
        .filter(|arc| common.contains(&arc.id))
        .any(|arc| touches(arc, src) || touches(arc, dst));
    if infeasible {
        debug!("disjoint pair: shared link touches an endpoint");
        return PairOutcome::Single(first);
    }

    let pool: Vec<SearchArc> = first
        .iter()
        .chain(second.iter())
        .filter(|arc| !common.contains(&arc.id))
        .copied()
        .collect();
    let mut used = vec![false; pool.len()];
    let Some(a) = extend_through_pool(&pool, &mut used, src, dst) else {
        return PairOutcome::Single(first);
    };
    let Some(b) = extend_through_pool(&pool, &mut used, src, dst) else {
        return PairOutcome::Single(first);
    };
    if used.iter().any(|taken| !taken) {
        debug!("disjoint pair: recombination left unused links");
        return PairOutcome::Single(first);
    }
    PairOutcome::Pair(a, b)
}

/// Suurballe-Tarjan: up to two disjoint paths of minimum total cost, cheaper
/// path first. Returns a single path when no disjoint pair exists and nothing
/// when the destination is unreachable.
pub fn disjoint_path_pair(
    graph: &GraphModel<'_>,
    origin: NodeId,
    destination: NodeId,
    kind: DisjointKind,
) -> Result<Vec<Path>> {
    let network = graph.network();
    network.check_node(origin)?;
    network.check_node(destination)?;
    if origin == destination || !graph.contains_node(origin) || !graph.contains_node(destination)
    {
        return Ok(Vec::new());
    }

    let link_lists: Vec<Vec<LinkId>> = match kind {
        DisjointKind::Link => {
            let ids =
                |arcs: Vec<SearchArc>| -> Vec<LinkId> { arcs.iter().map(|arc| arc.id).collect() };
            match suurballe(&SearchGraph::from_model(graph), origin, destination) {
                PairOutcome::Unreachable => Vec::new(),
                PairOutcome::Single(first) => vec![ids(first)],
                PairOutcome::Pair(a, b) => vec![ids(a), ids(b)],
            }
        }
        DisjointKind::Node => {
            let split = SplitGraph::build(graph, origin, destination);
            let src = split.vertex_index(AuxVertex::Real(origin));
            let dst = split.vertex_index(AuxVertex::Real(destination));
            match suurballe(&split.search_graph(), src, dst) {
                PairOutcome::Unreachable => Vec::new(),
                PairOutcome::Single(first) => vec![split.real_links(&first)],
                PairOutcome::Pair(a, b) => vec![split.real_links(&a), split.real_links(&b)],
            }
        }
    };

    let mut paths = link_lists
        .into_iter()
        .map(|links| Path::new(graph, links))
        .collect::<Result<Vec<Path>>>()?;
    paths.sort_by(compare_paths);
    debug!(
        "disjoint pair {origin}->{destination} ({kind:?}): {} path(s)",
        paths.len()
    );
    Ok(paths)
}
