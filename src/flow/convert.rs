use serde::Serialize;
use tracing::{debug, warn};

use super::fundamental::fundamental_row;
use crate::error::{PathflowError, Result};
use crate::model::{CycleClassification, Demand, Network, NodeId, Route, RoutingMatrix};

/// Absolute flow of one demand obtained from its forwarding fractions.
/// `x_de` and `absorbed_fraction` are `None` for closed cycles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandFlow {
    pub classification: CycleClassification,
    pub x_de: Option<Vec<f64>>,
    pub absorbed_fraction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForwardingRules {
    /// `f_te`: one row per destination node.
    PerDestination(RoutingMatrix),
    /// `f_de`: one row per demand.
    PerDemand(RoutingMatrix),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowConversion {
    /// Rows of demands in closed cycles are left at zero.
    pub x_de: RoutingMatrix,
    pub x_te: RoutingMatrix,
    pub absorbed_fraction: Vec<Option<f64>>,
    pub classification: Vec<CycleClassification>,
}

impl FlowConversion {
    pub fn all_loopless(&self) -> bool {
        self.classification
            .iter()
            .all(|class| *class == CycleClassification::Loopless)
    }

    pub fn closed_cycle_demands(&self) -> Vec<usize> {
        self.classification
            .iter()
            .enumerate()
            .filter(|(_, class)| **class == CycleClassification::ClosedCycles)
            .map(|(demand, _)| demand)
            .collect()
    }
}

pub(crate) fn check_demands(network: &Network, demands: &[Demand]) -> Result<()> {
    for (position, demand) in demands.iter().enumerate() {
        demand.validate(network)?;
        if demand.index != position {
            return Err(PathflowError::InvalidRouting(format!(
                "demand at position {position} carries index {}",
                demand.index
            )));
        }
    }
    Ok(())
}

pub(crate) fn check_row_len(network: &Network, what: &'static str, row: &[f64]) -> Result<()> {
    if row.len() != network.link_count() {
        return Err(PathflowError::DimensionMismatch {
            what,
            expected: network.link_count(),
            actual: row.len(),
        });
    }
    Ok(())
}

/// Fractions must lie in [0, 1], sum to at most 1 per node and be zero on
/// links leaving the node where traffic is absorbed.
fn check_fraction_row(
    network: &Network,
    row: &[f64],
    absorbing: NodeId,
    precision: f64,
) -> Result<()> {
    check_row_len(network, "forwarding row", row)?;
    let mut out_sum = vec![0.0; network.node_count()];
    for link in network.links() {
        let fraction = row[link.index];
        if !fraction.is_finite() || fraction < -precision || fraction > 1.0 + precision {
            return Err(PathflowError::InvalidRouting(format!(
                "fraction {fraction} on link {} is outside [0, 1]",
                link.index
            )));
        }
        if link.origin == absorbing && fraction > precision {
            return Err(PathflowError::InvalidRouting(format!(
                "link {} leaves destination node {absorbing} with fraction {fraction}",
                link.index
            )));
        }
        out_sum[link.origin] += fraction.max(0.0);
    }
    if let Some((node, sum)) = out_sum
        .iter()
        .enumerate()
        .find(|(_, sum)| **sum > 1.0 + precision)
    {
        return Err(PathflowError::InvalidRouting(format!(
            "node {node} forwards {sum} of its traffic"
        )));
    }
    Ok(())
}

/// Divides every link's flow by the total outflow at its origin.
fn normalize_row(network: &Network, row: &[f64], absorbing: NodeId) -> Vec<f64> {
    let mut outflow = vec![0.0; network.node_count()];
    for link in network.links() {
        outflow[link.origin] += row[link.index].max(0.0);
    }
    network
        .links()
        .iter()
        .map(|link| {
            let total = outflow[link.origin];
            if link.origin == absorbing || total <= 0.0 {
                0.0
            } else {
                row[link.index].max(0.0) / total
            }
        })
        .collect()
}

/// Copies, for every demand, the `f_te` row of its egress node.
pub fn fte_to_fde(
    network: &Network,
    demands: &[Demand],
    f_te: &RoutingMatrix,
) -> Result<RoutingMatrix> {
    check_demands(network, demands)?;
    f_te.check_shape("f_te", network.node_count(), network.link_count())?;
    let mut f_de = RoutingMatrix::zeros(demands.len(), network.link_count());
    for demand in demands {
        f_de.set_row(demand.index, f_te.row(demand.egress))?;
    }
    Ok(f_de)
}

/// Absolute flow and cycle classification of one demand routed by
/// forwarding fractions.
pub fn fde_to_xde(
    network: &Network,
    demand: &Demand,
    f_de_row: &[f64],
    precision: f64,
) -> Result<DemandFlow> {
    demand.validate(network)?;
    check_fraction_row(network, f_de_row, demand.egress, precision)?;

    if demand.ingress == demand.egress {
        return Ok(DemandFlow {
            classification: CycleClassification::Loopless,
            x_de: Some(vec![0.0; network.link_count()]),
            absorbed_fraction: Some(1.0),
        });
    }

    let row = match fundamental_row(network, f_de_row, demand.ingress, demand.egress)? {
        Ok(row) => row,
        Err(classification) => {
            warn!(
                "demand {} ({} -> {}) is trapped in a closed routing cycle",
                demand.index, demand.ingress, demand.egress
            );
            return Ok(DemandFlow {
                classification,
                x_de: None,
                absorbed_fraction: None,
            });
        }
    };

    let x_de = network
        .links()
        .iter()
        .map(|link| {
            if link.origin == demand.egress {
                return 0.0;
            }
            let flow = demand.offered_traffic * row.visits(link.origin) * f_de_row[link.index];
            if flow.abs() < precision {
                0.0
            } else {
                flow
            }
        })
        .collect();

    let classification = if row.has_revisits(precision) {
        CycleClassification::OpenCycles
    } else {
        CycleClassification::Loopless
    };
    debug!(
        "demand {}: {:?}, absorbed {:.6}",
        demand.index,
        classification,
        row.visits(demand.egress)
    );

    Ok(DemandFlow {
        classification,
        x_de: Some(x_de),
        absorbed_fraction: Some(row.visits(demand.egress)),
    })
}

/// Per-demand forwarding fractions implied by absolute per-demand flows.
pub fn xde_to_fde(
    network: &Network,
    demands: &[Demand],
    x_de: &RoutingMatrix,
) -> Result<RoutingMatrix> {
    check_demands(network, demands)?;
    x_de.check_shape("x_de", demands.len(), network.link_count())?;
    let mut f_de = RoutingMatrix::zeros(demands.len(), network.link_count());
    for demand in demands {
        let fractions = normalize_row(network, x_de.row(demand.index), demand.egress);
        f_de.set_row(demand.index, &fractions)?;
    }
    Ok(f_de)
}

/// Per-destination forwarding fractions implied by absolute per-destination flows.
pub fn xte_to_fte(network: &Network, x_te: &RoutingMatrix) -> Result<RoutingMatrix> {
    x_te.check_shape("x_te", network.node_count(), network.link_count())?;
    let mut f_te = RoutingMatrix::zeros(network.node_count(), network.link_count());
    for destination in 0..network.node_count() {
        let fractions = normalize_row(network, x_te.row(destination), destination);
        f_te.set_row(destination, &fractions)?;
    }
    Ok(f_te)
}

/// Sums per-demand flows by egress node.
pub fn xde_to_xte(
    network: &Network,
    demands: &[Demand],
    x_de: &RoutingMatrix,
) -> Result<RoutingMatrix> {
    check_demands(network, demands)?;
    x_de.check_shape("x_de", demands.len(), network.link_count())?;
    let mut x_te = RoutingMatrix::zeros(network.node_count(), network.link_count());
    for demand in demands {
        let source = x_de.row(demand.index);
        for (cell, flow) in x_te.row_mut(demand.egress).iter_mut().zip(source) {
            *cell += flow;
        }
    }
    Ok(x_te)
}

/// Converts forwarding rules of either shape into absolute flows for every
/// demand, classifying the routing cycles each demand runs into.
pub fn convert_forwarding_to_flow(
    network: &Network,
    demands: &[Demand],
    rules: &ForwardingRules,
    precision: f64,
) -> Result<FlowConversion> {
    let f_de = match rules {
        ForwardingRules::PerDestination(f_te) => fte_to_fde(network, demands, f_te)?,
        ForwardingRules::PerDemand(f_de) => {
            check_demands(network, demands)?;
            f_de.check_shape("f_de", demands.len(), network.link_count())?;
            f_de.clone()
        }
    };

    let mut x_de = RoutingMatrix::zeros(demands.len(), network.link_count());
    let mut absorbed_fraction = Vec::with_capacity(demands.len());
    let mut classification = Vec::with_capacity(demands.len());
    for demand in demands {
        let flow = fde_to_xde(network, demand, f_de.row(demand.index), precision)?;
        if let Some(row) = &flow.x_de {
            x_de.set_row(demand.index, row)?;
        }
        absorbed_fraction.push(flow.absorbed_fraction);
        classification.push(flow.classification);
    }

    let x_te = xde_to_xte(network, demands, &x_de)?;
    Ok(FlowConversion {
        x_de,
        x_te,
        absorbed_fraction,
        classification,
    })
}

/// Absolute per-demand link flows carried by an explicit path list.
pub fn paths_to_xde(
    network: &Network,
    demand_count: usize,
    routes: &[Route],
) -> Result<RoutingMatrix> {
    let mut x_de = RoutingMatrix::zeros(demand_count, network.link_count());
    for route in routes {
        if route.demand >= demand_count {
            return Err(PathflowError::InvalidRouting(format!(
                "route references demand {} of {demand_count}",
                route.demand
            )));
        }
        for link in route.path.links() {
            network.check_link(*link)?;
            x_de[(route.demand, *link)] += route.volume;
        }
    }
    Ok(x_de)
}

/// Total carried flow over capacity per link. Links without capacity report
/// zero when idle and infinity when carrying traffic.
pub fn link_utilization(network: &Network, x_de: &RoutingMatrix) -> Result<Vec<f64>> {
    if x_de.cols() != network.link_count() {
        return Err(PathflowError::DimensionMismatch {
            what: "x_de",
            expected: network.link_count(),
            actual: x_de.cols(),
        });
    }
    Ok(network
        .links()
        .iter()
        .map(|link| {
            let carried: f64 = (0..x_de.rows()).map(|row| x_de[(row, link.index)]).sum();
            if carried <= 0.0 {
                0.0
            } else if link.capacity <= 0.0 {
                f64::INFINITY
            } else {
                carried / link.capacity
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphModel, LinkAttributes, Path};

    const PRECISION: f64 = 1e-9;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
        }
    }

    // 0 -> 1 -> 3, 0 -> 2 -> 3, 1 -> 0 back link
    fn square() -> Network {
        let mut network = Network::new();
        for name in ["a", "b", "c", "d"] {
            network.add_node(name);
        }
        let attrs = LinkAttributes {
            capacity: 10.0,
            ..Default::default()
        };
        network.add_link_with(0, 1, attrs).unwrap();
        network.add_link_with(1, 3, attrs).unwrap();
        network.add_link_with(0, 2, attrs).unwrap();
        network.add_link_with(2, 3, attrs).unwrap();
        network.add_link_with(1, 0, attrs).unwrap();
        network
    }

    #[test]
    fn split_routing_is_loopless() {
        let network = square();
        let demand = Demand::new(0, 0, 3, 8.0);
        let flow = fde_to_xde(&network, &demand, &[0.75, 1.0, 0.25, 1.0, 0.0], PRECISION).unwrap();
        assert_eq!(flow.classification, CycleClassification::Loopless);
        let x = flow.x_de.unwrap();
        assert!((x[0] - 6.0).abs() < 1e-9);
        assert!((x[1] - 6.0).abs() < 1e-9);
        assert!((x[2] - 2.0).abs() < 1e-9);
        assert!((flow.absorbed_fraction.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bounce_back_is_an_open_cycle() {
        let network = square();
        let demand = Demand::new(0, 0, 3, 4.0);
        let flow = fde_to_xde(&network, &demand, &[1.0, 0.5, 0.0, 0.0, 0.5], PRECISION).unwrap();
        assert_eq!(flow.classification, CycleClassification::OpenCycles);
        let x = flow.x_de.unwrap();
        assert!((x[0] - 8.0).abs() < 1e-9);
        assert!((x[1] - 4.0).abs() < 1e-9);
        assert!((x[4] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn ping_pong_is_a_closed_cycle() {
        let network = square();
        let demand = Demand::new(0, 0, 3, 1.0);
        let flow = fde_to_xde(&network, &demand, &[1.0, 0.0, 0.0, 0.0, 1.0], PRECISION).unwrap();
        assert_eq!(flow.classification, CycleClassification::ClosedCycles);
        assert!(flow.x_de.is_none());
        assert!(flow.absorbed_fraction.is_none());
    }

    #[test]
    fn malformed_fractions_fail_fast() {
        let network = square();
        let demand = Demand::new(0, 0, 3, 1.0);
        assert!(matches!(
            fde_to_xde(&network, &demand, &[0.8, 1.0, 0.8, 1.0, 0.0], PRECISION),
            Err(PathflowError::InvalidRouting(_))
        ));
        assert!(matches!(
            fde_to_xde(&network, &demand, &[1.0, 1.0], PRECISION),
            Err(PathflowError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn flows_round_trip_through_fractions() {
        let network = square();
        let demands = vec![Demand::new(0, 0, 3, 8.0), Demand::new(1, 1, 3, 2.0)];
        let x_de = RoutingMatrix::from_rows(vec![
            vec![6.0, 6.0, 2.0, 2.0, 0.0],
            vec![0.0, 2.0, 0.0, 0.0, 0.0],
        ])
        .unwrap();

        let f_de = xde_to_fde(&network, &demands, &x_de).unwrap();
        let back = convert_forwarding_to_flow(
            &network,
            &demands,
            &ForwardingRules::PerDemand(f_de),
            PRECISION,
        )
        .unwrap();
        assert!(back.all_loopless());
        assert_close(back.x_de.row(0), x_de.row(0));
        assert_close(back.x_de.row(1), x_de.row(1));
        assert_close(back.x_te.row(3), &[6.0, 8.0, 2.0, 2.0, 0.0]);
    }

    #[test]
    fn destination_rules_feed_every_demand_towards_that_node() {
        let network = square();
        let demands = vec![Demand::new(0, 0, 3, 1.0), Demand::new(1, 2, 3, 3.0)];
        let mut f_te = RoutingMatrix::zeros(4, 5);
        f_te.set_row(3, &[0.0, 1.0, 1.0, 1.0, 0.0]).unwrap();

        let f_de = fte_to_fde(&network, &demands, &f_te).unwrap();
        assert_eq!(f_de.row(0), f_te.row(3));

        let out = convert_forwarding_to_flow(
            &network,
            &demands,
            &ForwardingRules::PerDestination(f_te.clone()),
            PRECISION,
        )
        .unwrap();
        assert_close(out.x_de.row(0), &[0.0, 0.0, 1.0, 1.0, 0.0]);
        assert_close(out.x_de.row(1), &[0.0, 0.0, 0.0, 3.0, 0.0]);
        assert_close(out.x_te.row(3), &[0.0, 0.0, 1.0, 4.0, 0.0]);

        let f_back = xte_to_fte(&network, &out.x_te).unwrap();
        assert_close(f_back.row(3), &[0.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn closed_cycle_rows_stay_empty_in_batch_conversion() {
        let network = square();
        let demands = vec![Demand::new(0, 0, 3, 1.0)];
        let f_de = RoutingMatrix::from_rows(vec![vec![1.0, 0.0, 0.0, 0.0, 1.0]]).unwrap();
        let out = convert_forwarding_to_flow(
            &network,
            &demands,
            &ForwardingRules::PerDemand(f_de),
            PRECISION,
        )
        .unwrap();
        assert_eq!(out.closed_cycle_demands(), vec![0]);
        assert!(!out.all_loopless());
        assert!(out.x_de.row(0).iter().all(|x| *x == 0.0));
    }

    #[test]
    fn explicit_routes_become_link_flows_and_utilization() {
        let network = square();
        let graph = GraphModel::new(&network);
        let routes = vec![
            Route {
                demand: 0,
                path: Path::new(&graph, vec![0, 1]).unwrap(),
                volume: 5.0,
            },
            Route {
                demand: 0,
                path: Path::new(&graph, vec![2, 3]).unwrap(),
                volume: 1.0,
            },
        ];
        let x_de = paths_to_xde(&network, 1, &routes).unwrap();
        assert_eq!(x_de.row(0), &[5.0, 5.0, 1.0, 1.0, 0.0]);

        let utilization = link_utilization(&network, &x_de).unwrap();
        assert_eq!(utilization, vec![0.5, 0.5, 0.1, 0.1, 0.0]);

        assert!(paths_to_xde(&network, 0, &routes).is_err());
    }
}
