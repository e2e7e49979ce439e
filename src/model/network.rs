use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{PathflowError, Result};

pub type NodeId = usize;
pub type LinkId = usize;

/// Signal speed in fiber, used when a link does not state its own.
pub const DEFAULT_PROPAGATION_SPEED_KM_PER_S: f64 = 200_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub index: NodeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub index: LinkId,
    pub origin: NodeId,
    pub destination: NodeId,
    pub cost: f64,
    pub capacity: f64,
    pub length_km: f64,
    pub propagation_speed_km_per_s: f64,
}

impl Link {
    pub fn propagation_delay_ms(&self) -> f64 {
        if self.length_km == 0.0 {
            return 0.0;
        }
        if self.propagation_speed_km_per_s <= 0.0 {
            return f64::INFINITY;
        }
        1000.0 * self.length_km / self.propagation_speed_km_per_s
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkAttributes {
    pub cost: f64,
    pub capacity: f64,
    pub length_km: f64,
    pub propagation_speed_km_per_s: f64,
}

impl Default for LinkAttributes {
    fn default() -> Self {
        Self {
            cost: 1.0,
            capacity: 0.0,
            length_km: 0.0,
            propagation_speed_km_per_s: DEFAULT_PROPAGATION_SPEED_KM_PER_S,
        }
    }
}

/// Caller-owned topology. Node and link indices are dense and assigned in
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: Vec<Node>,
    links: Vec<Link>,
    outgoing: Vec<Vec<LinkId>>,
    incoming: Vec<Vec<LinkId>>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(Node {
            index,
            name: name.into(),
        });
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        index
    }

    pub fn add_link(&mut self, origin: NodeId, destination: NodeId, cost: f64) -> Result<LinkId> {
        self.add_link_with(
            origin,
            destination,
            LinkAttributes {
                cost,
                ..Default::default()
            },
        )
    }

    pub fn add_link_with(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        attributes: LinkAttributes,
    ) -> Result<LinkId> {
        self.check_node(origin)?;
        self.check_node(destination)?;
        if origin == destination {
            return Err(PathflowError::InvalidTopology(format!(
                "self-loop link at node {origin}"
            )));
        }
        if attributes.cost.is_nan() || attributes.cost < 0.0 {
            return Err(PathflowError::NegativeCost {
                link: self.links.len(),
                cost: attributes.cost,
            });
        }
        if attributes.capacity.is_nan()
            || attributes.capacity < 0.0
            || attributes.length_km.is_nan()
            || attributes.length_km < 0.0
        {
            return Err(PathflowError::InvalidTopology(format!(
                "link {origin}->{destination} has negative capacity or length"
            )));
        }

        let index = self.links.len();
        self.links.push(Link {
            index,
            origin,
            destination,
            cost: attributes.cost,
            capacity: attributes.capacity,
            length_km: attributes.length_km,
            propagation_speed_km_per_s: attributes.propagation_speed_km_per_s,
        });
        self.outgoing[origin].push(index);
        self.incoming[destination].push(index);
        Ok(index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node)
    }

    pub fn link(&self, link: LinkId) -> Option<&Link> {
        self.links.get(link)
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|node| node.name == name)
            .map(|node| node.index)
    }

    pub fn outgoing_links(&self, node: NodeId) -> &[LinkId] {
        self.outgoing.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn incoming_links(&self, node: NodeId) -> &[LinkId] {
        self.incoming.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn check_node(&self, node: NodeId) -> Result<()> {
        if node < self.nodes.len() {
            Ok(())
        } else {
            Err(PathflowError::UnknownNode(node))
        }
    }

    pub fn check_link(&self, link: LinkId) -> Result<()> {
        if link < self.links.len() {
            Ok(())
        } else {
            Err(PathflowError::UnknownLink(link))
        }
    }
}

/// Scalar used to weigh a link when no explicit closure is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostMetric {
    #[default]
    Hops,
    Weight,
    LengthKm,
    DelayMs,
}

impl CostMetric {
    pub fn link_cost(self, link: &Link) -> f64 {
        match self {
            CostMetric::Hops => 1.0,
            CostMetric::Weight => link.cost,
            CostMetric::LengthKm => link.length_km,
            CostMetric::DelayMs => link.propagation_delay_ms(),
        }
    }
}

/// Read-only view over a [`Network`] with one cost per link.
///
/// Costs are evaluated once when the view is built. A link whose own `cost`
/// is infinite, whose evaluated cost is infinite, that was filtered out, or
/// that touches a filtered node is absent from every search.
#[derive(Debug, Clone)]
pub struct GraphModel<'a> {
    network: &'a Network,
    costs: Vec<f64>,
    link_enabled: Vec<bool>,
    node_enabled: Vec<bool>,
}

impl<'a> GraphModel<'a> {
    /// Unit cost per link: searches minimize hop count.
    pub fn new(network: &'a Network) -> Self {
        let costs = network
            .links()
            .iter()
            .map(|link| if link.cost.is_infinite() { f64::INFINITY } else { 1.0 })
            .collect();
        Self {
            network,
            costs,
            link_enabled: vec![true; network.link_count()],
            node_enabled: vec![true; network.node_count()],
        }
    }

    /// Unit cost for every link, whatever its own `cost`. Used to trace flow
    /// that forwarding rules have already placed on the network.
    pub fn hop_view(network: &'a Network) -> Self {
        Self {
            network,
            costs: vec![1.0; network.link_count()],
            link_enabled: vec![true; network.link_count()],
            node_enabled: vec![true; network.node_count()],
        }
    }

    pub fn with_cost_fn<F>(mut self, cost_fn: F) -> Result<Self>
    where
        F: Fn(&Link) -> f64,
    {
        for link in self.network.links() {
            let cost = if link.cost.is_infinite() {
                f64::INFINITY
            } else {
                cost_fn(link)
            };
            if cost.is_nan() || cost < 0.0 {
                return Err(PathflowError::NegativeCost {
                    link: link.index,
                    cost,
                });
            }
            self.costs[link.index] = cost;
        }
        Ok(self)
    }

    pub fn with_metric(self, metric: CostMetric) -> Result<Self> {
        self.with_cost_fn(|link| metric.link_cost(link))
    }

    pub fn with_link_costs(self) -> Result<Self> {
        self.with_metric(CostMetric::Weight)
    }

    /// Keeps only the listed links.
    pub fn restrict_links(mut self, allowed: impl IntoIterator<Item = LinkId>) -> Self {
        let allowed: BTreeSet<LinkId> = allowed.into_iter().collect();
        for (index, enabled) in self.link_enabled.iter_mut().enumerate() {
            *enabled = *enabled && allowed.contains(&index);
        }
        self
    }

    pub fn without_links(mut self, blocked: impl IntoIterator<Item = LinkId>) -> Self {
        for link in blocked {
            if let Some(enabled) = self.link_enabled.get_mut(link) {
                *enabled = false;
            }
        }
        self
    }

    /// Keeps only the listed nodes; links touching any other node disappear.
    pub fn restrict_nodes(mut self, allowed: impl IntoIterator<Item = NodeId>) -> Self {
        let allowed: BTreeSet<NodeId> = allowed.into_iter().collect();
        for (index, enabled) in self.node_enabled.iter_mut().enumerate() {
            *enabled = *enabled && allowed.contains(&index);
        }
        self
    }

    pub fn network(&self) -> &'a Network {
        self.network
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.node_enabled.get(node).copied().unwrap_or(false)
    }

    pub fn cost(&self, link: LinkId) -> f64 {
        let Some(l) = self.network.link(link) else {
            return f64::INFINITY;
        };
        if !self.link_enabled[link]
            || !self.node_enabled[l.origin]
            || !self.node_enabled[l.destination]
        {
            return f64::INFINITY;
        }
        self.costs[link]
    }

    pub fn is_usable(&self, link: LinkId) -> bool {
        self.cost(link).is_finite()
    }

    pub fn usable_links(&self) -> impl Iterator<Item = &'a Link> + '_ {
        self.network
            .links()
            .iter()
            .filter(move |link| self.is_usable(link.index))
    }

    pub fn path_cost(&self, links: &[LinkId]) -> f64 {
        links.iter().map(|link| self.cost(*link)).sum()
    }
}
