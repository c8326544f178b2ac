//! Error types for the warehouse tour benchmark.
//!
//! Routing and exact-solver failures are per-scenario: callers are expected
//! to log them and move on to the next scenario. Degenerate inputs are not
//! errors and never show up here.

use crate::grid::Cell;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Goal cell cannot be reached from the start cell.
    #[error("no path from {start:?} to {goal:?}")]
    NoPath { start: Cell, goal: Cell },

    /// A coordinate lies outside the grid.
    #[error("cell {cell:?} is outside the {width}x{height} grid")]
    CellOutOfBounds {
        cell: Cell,
        width: usize,
        height: usize,
    },

    /// A waypoint, depot or path endpoint sits on an obstacle.
    #[error("cell {cell:?} is blocked")]
    CellBlocked { cell: Cell },

    /// A one-way restriction was declared between non-adjacent cells.
    #[error("one-way edge {from:?} -> {to:?} does not join two adjacent cells")]
    InvalidOneWay { from: Cell, to: Cell },

    /// Instance is too large for the bitmask DP; skip rather than retry.
    #[error("exact solver refuses {nodes} nodes (limit {max_nodes})")]
    ExactTooLarge { nodes: usize, max_nodes: usize },

    /// Exact solver ran out of wall-clock budget before proving the optimum.
    #[error("exact solver timed out after {elapsed_secs:.2}s (limit {limit_secs:.2}s)")]
    ExactTimeout { elapsed_secs: f64, limit_secs: f64 },

    /// Registry lookup failed.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Start index does not name a node of the distance matrix.
    #[error("start index {start} out of range for {nodes} nodes")]
    InvalidStart { start: usize, nodes: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("map parse error: {0}")]
    MapParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// True for failures that invalidate a scenario (as opposed to a
    /// configuration mistake that should abort the whole batch).
    pub fn is_scenario_failure(&self) -> bool {
        matches!(
            self,
            Error::NoPath { .. }
                | Error::CellBlocked { .. }
                | Error::CellOutOfBounds { .. }
                | Error::ExactTooLarge { .. }
                | Error::ExactTimeout { .. }
        )
    }
}
