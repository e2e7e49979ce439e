mod disjoint;
mod ksp;
mod spf;
mod strategy;

pub use disjoint::{disjoint_path_pair, DisjointKind};
pub use ksp::{k_shortest_paths, KspConstraints};
pub use spf::{shortest_distances, shortest_path};
pub use strategy::{compute_paths, PathAlgorithm, PathRequest};
