use std::collections::VecDeque;

use nalgebra::DMatrix;

use super::convert::check_row_len;
use crate::error::Result;
use crate::model::{CycleClassification, Network, NodeId};

const SINGULAR_PIVOT: f64 = 1e-12;

/// Ingress row of the fundamental matrix `(I - Q)^-1` of the absorbing chain
/// described by per-link forwarding fractions, plus its diagonal.
///
/// Only nodes reachable from the ingress take part in the solve; every other
/// node has zero expected visits.
#[derive(Debug, Clone, PartialEq)]
pub struct FundamentalRow {
    visits: Vec<f64>,
    diagonal: Vec<f64>,
}

impl FundamentalRow {
    /// Expected number of times traffic injected at the ingress visits `node`.
    pub fn visits(&self, node: NodeId) -> f64 {
        self.visits.get(node).copied().unwrap_or(0.0)
    }

    /// True when some reachable node is expected to be visited more than once
    /// by traffic starting there.
    pub fn has_revisits(&self, precision: f64) -> bool {
        self.diagonal.iter().any(|visits| *visits > 1.0 + precision)
    }
}

fn forwarding_reach(
    network: &Network,
    fractions: &[f64],
    ingress: NodeId,
    egress: NodeId,
) -> Vec<Option<usize>> {
    let mut position: Vec<Option<usize>> = vec![None; network.node_count()];
    let mut queue = VecDeque::from([ingress]);
    position[ingress] = Some(0);
    let mut next = 1;
    while let Some(node) = queue.pop_front() {
        if node == egress {
            continue;
        }
        for link_id in network.outgoing_links(node) {
            if fractions[*link_id] <= 0.0 {
                continue;
            }
            let Some(link) = network.link(*link_id) else {
                continue;
            };
            if position[link.destination].is_none() {
                position[link.destination] = Some(next);
                next += 1;
                queue.push_back(link.destination);
            }
        }
    }
    position
}

/// Solves for the ingress row. The outer error reports malformed input; the
/// inner `ClosedCycles` means traffic is trapped in a closed cycle and no
/// finite flow exists.
pub fn fundamental_row(
    network: &Network,
    fractions: &[f64],
    ingress: NodeId,
    egress: NodeId,
) -> Result<std::result::Result<FundamentalRow, CycleClassification>> {
    network.check_node(ingress)?;
    network.check_node(egress)?;
    check_row_len(network, "forwarding row", fractions)?;
    Ok(solve_row(network, fractions, ingress, egress))
}

fn solve_row(
    network: &Network,
    fractions: &[f64],
    ingress: NodeId,
    egress: NodeId,
) -> std::result::Result<FundamentalRow, CycleClassification> {
    let position = forwarding_reach(network, fractions, ingress, egress);
    let size = position.iter().flatten().count();

    let mut system = DMatrix::<f64>::identity(size, size);
    for link in network.links() {
        let fraction = fractions[link.index];
        if fraction <= 0.0 || link.origin == egress {
            continue;
        }
        let (Some(row), Some(col)) = (position[link.origin], position[link.destination]) else {
            continue;
        };
        system[(row, col)] -= fraction;
    }

    let lu = system.lu();
    if lu
        .u()
        .diagonal()
        .iter()
        .any(|pivot| pivot.abs() < SINGULAR_PIVOT)
    {
        return Err(CycleClassification::ClosedCycles);
    }
    let inverse = lu.try_inverse().ok_or(CycleClassification::ClosedCycles)?;
    if inverse.iter().any(|value| !value.is_finite()) {
        return Err(CycleClassification::ClosedCycles);
    }

    let mut visits = vec![0.0; network.node_count()];
    let mut diagonal = vec![0.0; network.node_count()];
    let ingress_row = position[ingress].unwrap_or(0);
    for (node, slot) in position.iter().enumerate() {
        if let Some(slot) = slot {
            visits[node] = inverse[(ingress_row, *slot)];
            diagonal[node] = inverse[(*slot, *slot)];
        }
    }
    Ok(FundamentalRow { visits, diagonal })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PathflowError;

    fn network_with(nodes: usize, links: &[(usize, usize)]) -> Network {
        let mut network = Network::new();
        for idx in 0..nodes {
            network.add_node(format!("n{idx}"));
        }
        for (origin, destination) in links {
            network.add_link(*origin, *destination, 1.0).unwrap();
        }
        network
    }

    #[test]
    fn loopless_chain_visits_each_node_once() {
        let network = network_with(3, &[(0, 1), (1, 2)]);
        let row = fundamental_row(&network, &[1.0, 1.0], 0, 2).unwrap().unwrap();
        assert!((row.visits(0) - 1.0).abs() < 1e-12);
        assert!((row.visits(2) - 1.0).abs() < 1e-12);
        assert!(!row.has_revisits(1e-9));
    }

    #[test]
    fn mutual_forwarding_is_a_closed_cycle() {
        let network = network_with(3, &[(0, 1), (1, 0), (1, 2)]);
        let err = fundamental_row(&network, &[1.0, 1.0, 0.0], 0, 2)
            .unwrap()
            .unwrap_err();
        assert_eq!(err, CycleClassification::ClosedCycles);
    }

    #[test]
    fn partial_return_is_an_open_cycle() {
        // node 1 sends half of its traffic back to node 0
        let network = network_with(3, &[(0, 1), (1, 0), (1, 2)]);
        let row = fundamental_row(&network, &[1.0, 0.5, 0.5], 0, 2)
            .unwrap()
            .unwrap();
        assert!((row.visits(0) - 2.0).abs() < 1e-9);
        assert!((row.visits(2) - 1.0).abs() < 1e-9);
        assert!(row.has_revisits(1e-9));
    }

    #[test]
    fn unreachable_closed_cycle_does_not_taint_the_demand() {
        let network = network_with(4, &[(0, 1), (2, 3), (3, 2)]);
        let row = fundamental_row(&network, &[1.0, 1.0, 1.0], 0, 1)
            .unwrap()
            .unwrap();
        assert!((row.visits(1) - 1.0).abs() < 1e-12);
        assert_eq!(row.visits(2), 0.0);
    }

    #[test]
    fn malformed_input_is_an_error_not_a_panic() {
        let network = network_with(2, &[(0, 1), (1, 0)]);
        assert!(matches!(
            fundamental_row(&network, &[1.0], 0, 1),
            Err(PathflowError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            fundamental_row(&network, &[1.0, 0.0], 7, 1),
            Err(PathflowError::UnknownNode(7))
        ));
        assert!(matches!(
            fundamental_row(&network, &[1.0, 0.0], 0, 9),
            Err(PathflowError::UnknownNode(9))
        ));
    }
}
