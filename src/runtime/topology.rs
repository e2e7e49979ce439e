use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::error::{PathflowError, Result};
use crate::model::{Demand, LinkAttributes, Network, NodeId, RoutingMatrix};

#[derive(Debug, Clone, Deserialize)]
struct LinkInput {
    origin: String,
    destination: String,
    cost: Option<f64>,
    capacity: Option<f64>,
    length_km: Option<f64>,
    propagation_speed_km_per_s: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct DemandInput {
    ingress: String,
    egress: String,
    #[serde(default)]
    offered_traffic: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct TopologyInput {
    nodes: Vec<String>,
    #[serde(default)]
    links: Vec<LinkInput>,
    #[serde(default)]
    demands: Vec<DemandInput>,
    /// `f_te` rows keyed by destination node name, one fraction per link.
    forwarding: Option<BTreeMap<String, Vec<f64>>>,
}

/// Network, traffic and optional per-destination forwarding rules read from
/// one JSON document.
#[derive(Debug, Clone)]
pub struct Topology {
    pub network: Network,
    pub demands: Vec<Demand>,
    pub forwarding: Option<RoutingMatrix>,
}

impl Topology {
    pub fn from_json(text: &str) -> Result<Self> {
        let input: TopologyInput = serde_json::from_str(text)
            .map_err(|err| PathflowError::InvalidTopology(err.to_string()))?;

        let mut network = Network::new();
        for name in &input.nodes {
            if network.node_by_name(name).is_some() {
                return Err(PathflowError::InvalidTopology(format!(
                    "duplicate node name {name}"
                )));
            }
            network.add_node(name.clone());
        }

        let lookup = |network: &Network, name: &str| -> Result<NodeId> {
            network
                .node_by_name(name)
                .ok_or_else(|| PathflowError::InvalidTopology(format!("unknown node {name}")))
        };

        let defaults = LinkAttributes::default();
        for link in &input.links {
            let origin = lookup(&network, &link.origin)?;
            let destination = lookup(&network, &link.destination)?;
            network.add_link_with(
                origin,
                destination,
                LinkAttributes {
                    cost: link.cost.unwrap_or(defaults.cost),
                    capacity: link.capacity.unwrap_or(defaults.capacity),
                    length_km: link.length_km.unwrap_or(defaults.length_km),
                    propagation_speed_km_per_s: link
                        .propagation_speed_km_per_s
                        .unwrap_or(defaults.propagation_speed_km_per_s),
                },
            )?;
        }

        let mut demands = Vec::with_capacity(input.demands.len());
        for (index, demand) in input.demands.iter().enumerate() {
            let parsed = Demand::new(
                index,
                lookup(&network, &demand.ingress)?,
                lookup(&network, &demand.egress)?,
                demand.offered_traffic,
            );
            parsed
                .validate(&network)
                .map_err(|err| PathflowError::InvalidTopology(err.to_string()))?;
            demands.push(parsed);
        }

        let forwarding = match input.forwarding {
            None => None,
            Some(rows) => {
                let mut f_te = RoutingMatrix::zeros(network.node_count(), network.link_count());
                for (destination, fractions) in rows {
                    let node = lookup(&network, &destination)?;
                    f_te.set_row(node, &fractions)?;
                }
                Some(f_te)
            }
        };

        Ok(Topology {
            network,
            demands,
            forwarding,
        })
    }

    pub fn node_named(&self, name: &str) -> Result<NodeId> {
        self.network
            .node_by_name(name)
            .ok_or_else(|| PathflowError::InvalidTopology(format!("unknown node {name}")))
    }
}

pub fn load_topology(path: &Path) -> anyhow::Result<Topology> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read topology file {}", path.display()))?;
    Topology::from_json(&raw).with_context(|| format!("invalid topology {}", path.display()))
}
