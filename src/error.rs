//! Error types.

use thiserror::Error;

/// An error building or loading a road network.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid topology: {0}")]
    InvalidTopology(#[from] TopologyError),

    #[cfg(feature = "serde")]
    #[error("Failed to parse topology: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The reason a topology description was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("road {road} lists neighbour {neighbour}, which does not exist")]
    UnknownNeighbour { road: usize, neighbour: usize },

    #[error("road {road} lists itself as a neighbour")]
    SelfLoop { road: usize },

    #[error("road {road} lists neighbour {neighbour} more than once")]
    DuplicateNeighbour { road: usize, neighbour: usize },

    #[error("road {road} has {count} neighbours, at most {max} are supported")]
    TooManyNeighbours { road: usize, count: usize, max: usize },

    #[error("road {road} lists {neighbour} as a neighbour, but not the other way round")]
    AsymmetricAdjacency { road: usize, neighbour: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
