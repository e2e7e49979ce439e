use thiserror::Error;

pub type Result<T> = std::result::Result<T, PathflowError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PathflowError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("link {link} has unusable cost {cost}")]
    NegativeCost { link: usize, cost: f64 },

    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown node index {0}")]
    UnknownNode(usize),

    #[error("unknown link index {0}")]
    UnknownLink(usize),

    #[error("invalid routing: {0}")]
    InvalidRouting(String),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("unknown path algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("unknown disjointness: {0}")]
    UnknownDisjointKind(String),
}
