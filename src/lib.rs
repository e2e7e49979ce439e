//! Path computation and flow routing over directed network topologies.

pub mod error;
pub mod flow;
pub mod model;
pub mod route_compute;
pub mod runtime;

pub use error::{PathflowError, Result};
