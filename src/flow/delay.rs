use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use super::convert::check_row_len;
use crate::error::Result;
use crate::model::{Network, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WorstCase {
    pub delay_ms: f64,
    pub length_km: f64,
}

impl WorstCase {
    pub const UNBOUNDED: WorstCase = WorstCase {
        delay_ms: f64::INFINITY,
        length_km: f64::INFINITY,
    };

    pub fn is_bounded(&self) -> bool {
        self.delay_ms.is_finite() && self.length_km.is_finite()
    }

    const ZERO: WorstCase = WorstCase {
        delay_ms: 0.0,
        length_km: 0.0,
    };

    fn max(self, other: WorstCase) -> WorstCase {
        WorstCase {
            delay_ms: self.delay_ms.max(other.delay_ms),
            length_km: self.length_km.max(other.length_km),
        }
    }
}

/// Largest propagation delay and length over every route the forwarding
/// fractions may send traffic along.
///
/// The frontier starts at the ingress and advances one hop per round over
/// links with a positive fraction. Arrivals at the same node within a round
/// merge to their component-wise maximum. Reaching the ingress again, or any
/// node other than the egress in a later round, makes both values infinite,
/// as does an egress that is never reached.
pub fn worst_case_delay_and_length(
    network: &Network,
    f_de_row: &[f64],
    ingress: NodeId,
    egress: NodeId,
) -> Result<WorstCase> {
    network.check_node(ingress)?;
    network.check_node(egress)?;
    check_row_len(network, "forwarding row", f_de_row)?;
    if ingress == egress {
        return Ok(WorstCase::ZERO);
    }

    let mut visited = BTreeSet::from([ingress]);
    let mut frontier = BTreeMap::from([(ingress, WorstCase::ZERO)]);
    let mut at_egress: Option<WorstCase> = None;
    let mut rounds = 0usize;

    while !frontier.is_empty() {
        rounds += 1;
        let mut next: BTreeMap<NodeId, WorstCase> = BTreeMap::new();
        for (node, here) in &frontier {
            for link_id in network.outgoing_links(*node) {
                if f_de_row[*link_id] <= 0.0 {
                    continue;
                }
                let Some(link) = network.link(*link_id) else {
                    continue;
                };
                let reached = WorstCase {
                    delay_ms: here.delay_ms + link.propagation_delay_ms(),
                    length_km: here.length_km + link.length_km,
                };
                let to = link.destination;
                if to == egress {
                    at_egress = Some(at_egress.map_or(reached, |seen| seen.max(reached)));
                } else if visited.contains(&to) {
                    debug!("forwarding from {ingress} to {egress} revisits node {to}");
                    return Ok(WorstCase::UNBOUNDED);
                } else {
                    next.entry(to)
                        .and_modify(|seen| *seen = seen.max(reached))
                        .or_insert(reached);
                }
            }
        }
        visited.extend(next.keys().copied());
        frontier = next;
    }

    debug!("worst case from {ingress} to {egress} settled after {rounds} rounds");
    Ok(at_egress.unwrap_or(WorstCase::UNBOUNDED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PathflowError;
    use crate::model::LinkAttributes;

    fn span(length_km: f64) -> LinkAttributes {
        LinkAttributes {
            length_km,
            propagation_speed_km_per_s: 200_000.0,
            ..Default::default()
        }
    }

    // 0 -> 1 -> 3 (100 + 300 km), 0 -> 2 -> 3 (200 + 100 km), 3 -> 0
    fn diamond() -> Network {
        let mut network = Network::new();
        for name in ["a", "b", "c", "d"] {
            network.add_node(name);
        }
        network.add_link_with(0, 1, span(100.0)).unwrap();
        network.add_link_with(1, 3, span(300.0)).unwrap();
        network.add_link_with(0, 2, span(200.0)).unwrap();
        network.add_link_with(2, 3, span(100.0)).unwrap();
        network.add_link_with(3, 0, span(50.0)).unwrap();
        network
    }

    #[test]
    fn single_route_sums_its_links() {
        let network = diamond();
        let worst =
            worst_case_delay_and_length(&network, &[1.0, 1.0, 0.0, 0.0, 0.0], 0, 3).unwrap();
        assert!((worst.length_km - 400.0).abs() < 1e-9);
        assert!((worst.delay_ms - 2.0).abs() < 1e-9);
    }

    #[test]
    fn split_routing_takes_the_longest_branch() {
        let network = diamond();
        let worst =
            worst_case_delay_and_length(&network, &[0.5, 1.0, 0.5, 1.0, 0.0], 0, 3).unwrap();
        assert!((worst.length_km - 400.0).abs() < 1e-9);
        assert!(worst.is_bounded());
    }

    #[test]
    fn egress_outgoing_rules_are_ignored() {
        let network = diamond();
        let worst =
            worst_case_delay_and_length(&network, &[1.0, 1.0, 0.0, 0.0, 1.0], 0, 3).unwrap();
        assert!((worst.length_km - 400.0).abs() < 1e-9);
    }

    #[test]
    fn forwarding_loop_is_unbounded() {
        let mut network = diamond();
        network.add_link_with(1, 0, span(10.0)).unwrap();
        let rules = [1.0, 0.5, 0.0, 0.0, 0.0, 0.5];
        let worst = worst_case_delay_and_length(&network, &rules, 0, 3).unwrap();
        assert_eq!(worst, WorstCase::UNBOUNDED);
        assert_eq!(worst_case_delay_and_length(&network, &rules, 0, 3).unwrap(), worst);
    }

    #[test]
    fn unreachable_egress_is_unbounded() {
        let network = diamond();
        let worst =
            worst_case_delay_and_length(&network, &[1.0, 0.0, 0.0, 0.0, 0.0], 0, 3).unwrap();
        assert!(!worst.is_bounded());
    }

    #[test]
    fn branches_of_unequal_depth_are_unbounded() {
        // 0 -> 1 -> 3 and 0 -> 2 -> 4 -> 3 meet at 3 in different rounds
        let mut network = Network::new();
        for name in ["a", "b", "c", "d", "e", "f"] {
            network.add_node(name);
        }
        for (from, to) in [(0, 1), (1, 3), (0, 2), (2, 4), (4, 3), (3, 5)] {
            network.add_link_with(from, to, span(100.0)).unwrap();
        }
        let rules = [0.5, 1.0, 0.5, 1.0, 1.0, 1.0];
        let worst = worst_case_delay_and_length(&network, &rules, 0, 5).unwrap();
        assert_eq!(worst, WorstCase::UNBOUNDED);
    }

    #[test]
    fn egress_reached_in_several_rounds_keeps_the_maximum() {
        // 0 -> 2 directly (50 km) and 0 -> 1 -> 2 (100 + 100 km)
        let mut network = Network::new();
        for name in ["a", "b", "c"] {
            network.add_node(name);
        }
        network.add_link_with(0, 2, span(50.0)).unwrap();
        network.add_link_with(0, 1, span(100.0)).unwrap();
        network.add_link_with(1, 2, span(100.0)).unwrap();
        let worst = worst_case_delay_and_length(&network, &[0.5, 0.5, 1.0], 0, 2).unwrap();
        assert!((worst.length_km - 200.0).abs() < 1e-9);
        assert!((worst.delay_ms - 1.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_input_is_an_error() {
        let network = diamond();
        assert!(matches!(
            worst_case_delay_and_length(&network, &[1.0, 1.0], 0, 3),
            Err(PathflowError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            worst_case_delay_and_length(&network, &[0.0; 5], 8, 3),
            Err(PathflowError::UnknownNode(8))
        ));
        assert!(matches!(
            worst_case_delay_and_length(&network, &[0.0; 5], 0, 8),
            Err(PathflowError::UnknownNode(8))
        ));
    }
}
