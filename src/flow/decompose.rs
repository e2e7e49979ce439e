use serde::Serialize;
use tracing::{debug, warn};

use super::convert::{check_demands, check_row_len};
use crate::error::{PathflowError, Result};
use crate::model::{Demand, GraphModel, Network, NodeId, Route, RoutingMatrix};
use crate::route_compute::shortest_path;

/// Explicit routes extracted from a flow row. `unrouted` is the part of the
/// ingress outflow left stranded in the residual flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    pub routes: Vec<Route>,
    pub unrouted: f64,
}

impl Decomposition {
    pub fn carried(&self) -> f64 {
        self.routes.iter().map(|route| route.volume).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.unrouted == 0.0
    }
}

fn net_outflow(network: &Network, residual: &[f64], node: NodeId) -> f64 {
    let out: f64 = network
        .outgoing_links(node)
        .iter()
        .map(|link| residual[*link].max(0.0))
        .sum();
    let into: f64 = network
        .incoming_links(node)
        .iter()
        .map(|link| residual[*link].max(0.0))
        .sum();
    out - into
}

/// Splits the flow of one demand into loopless paths, always peeling off the
/// hop-shortest path over links that still carry flow.
pub fn decompose_flow_to_paths(
    network: &Network,
    demand: &Demand,
    x_de_row: &[f64],
    precision: f64,
) -> Result<Decomposition> {
    demand.validate(network)?;
    check_row_len(network, "x_de row", x_de_row)?;
    if let Some(link) = x_de_row.iter().position(|x| !x.is_finite() || *x < -precision) {
        return Err(PathflowError::InvalidRouting(format!(
            "link {link} carries flow {}",
            x_de_row[link]
        )));
    }

    let mut decomposition = Decomposition {
        routes: Vec::new(),
        unrouted: 0.0,
    };
    if demand.ingress == demand.egress {
        return Ok(decomposition);
    }

    let mut residual: Vec<f64> = x_de_row
        .iter()
        .map(|x| if *x < precision { 0.0 } else { *x })
        .collect();

    // every round either drains the imbalance or empties a bottleneck link
    for _ in 0..=network.link_count() {
        let imbalance = net_outflow(network, &residual, demand.ingress);
        if imbalance <= precision {
            break;
        }

        let carrying = residual
            .iter()
            .enumerate()
            .filter(|(_, x)| **x > 0.0)
            .map(|(link, _)| link);
        let graph = GraphModel::hop_view(network).restrict_links(carrying);
        let Some(path) = shortest_path(&graph, demand.ingress, demand.egress) else {
            warn!(
                "demand {}: {:.6} of flow cannot be mapped onto paths",
                demand.index, imbalance
            );
            decomposition.unrouted = imbalance;
            break;
        };

        let bottleneck = path
            .links()
            .iter()
            .map(|link| residual[*link])
            .fold(f64::INFINITY, f64::min);
        let volume = bottleneck.min(imbalance);
        for link in path.links() {
            let left = residual[*link] - volume;
            residual[*link] = if left.abs() < precision { 0.0 } else { left };
        }
        debug!(
            "demand {}: {:.6} over {} hops",
            demand.index,
            volume,
            path.hop_count()
        );
        decomposition.routes.push(Route {
            demand: demand.index,
            path,
            volume,
        });
    }

    Ok(decomposition)
}

/// Decomposes every row of `x_de`; the result is indexed by demand.
pub fn xde_to_paths(
    network: &Network,
    demands: &[Demand],
    x_de: &RoutingMatrix,
    precision: f64,
) -> Result<Vec<Decomposition>> {
    check_demands(network, demands)?;
    x_de.check_shape("x_de", demands.len(), network.link_count())?;
    demands
        .iter()
        .map(|demand| decompose_flow_to_paths(network, demand, x_de.row(demand.index), precision))
        .collect()
}
