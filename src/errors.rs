//! Grid construction, extraction and persistence errors

use crate::grid::{HashKey, LatticeIndex};

/// Result alias used throughout the crate.
pub type GridResult<T> = Result<T, GridError>;

/// All the hard failures the grid can report.
///
/// Configuration problems (degenerate bounding box, unusable voxel size) are not
/// represented here: they are logged and the grid degrades to a best-effort result.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// (Io) The persistence stream could not be opened, read or written
    #[error("(Io) {0}")]
    Io(#[from] std::io::Error),
    /// (Parse) A token of a grid file could not be parsed
    #[error("(Parse) expected {expected}, found {token:?}")]
    Parse { token: String, expected: &'static str },
    /// (UnexpectedEof) A grid file ended before all declared records were read
    #[error("(UnexpectedEof) grid file ended while reading {expected}")]
    UnexpectedEof { expected: &'static str },
    /// (CorruptGrid) A grid file parsed but describes an inconsistent grid
    #[error("(CorruptGrid) {0}")]
    CorruptGrid(String),
    /// (HashCollision) Two distinct lattice indices produced the same hash key
    #[error(
        "(HashCollision) key {key} maps to lattice index {existing:?}, cannot insert {incoming:?}"
    )]
    HashCollision {
        key: HashKey,
        existing: LatticeIndex,
        incoming: LatticeIndex,
    },
    /// (UnresolvedCorner) An active marching-cubes configuration reached a corner
    /// without a query point
    #[error("(UnresolvedCorner) cell {cell} corner {corner} unset (configuration {configuration})")]
    UnresolvedCorner {
        cell: usize,
        corner: usize,
        configuration: u8,
    },
}
