//! Conversions between forwarding fractions, link flows and explicit paths.

mod convert;
mod decompose;
mod delay;
mod fundamental;

/// Flows and fractions below this magnitude are treated as zero.
pub const DEFAULT_PRECISION: f64 = 1e-6;

pub use convert::{
    convert_forwarding_to_flow, fde_to_xde, fte_to_fde, link_utilization, paths_to_xde,
    xde_to_fde, xde_to_xte, xte_to_fte, DemandFlow, FlowConversion, ForwardingRules,
};
pub use decompose::{decompose_flow_to_paths, xde_to_paths, Decomposition};
pub use delay::{worst_case_delay_and_length, WorstCase};
pub use fundamental::{fundamental_row, FundamentalRow};
