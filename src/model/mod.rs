pub mod network;
pub mod path;
pub mod routing;

pub use network::{
    CostMetric, GraphModel, Link, LinkAttributes, LinkId, Network, Node, NodeId,
    DEFAULT_PROPAGATION_SPEED_KM_PER_S,
};
pub use path::{check_continuity, compare_paths, Path};
pub use routing::{CycleClassification, Demand, Route, RoutingMatrix};
