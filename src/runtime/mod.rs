pub mod config;
pub mod timing;
pub mod topology;

pub use config::{load_engine_config, EngineConfig, KspConfig};
pub use timing::Stopwatch;
pub use topology::{load_topology, Topology};
