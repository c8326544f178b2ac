//! Warehouse Tour Bench Library
//!
//! Tour construction for warehouse order picking on obstacle grids, and the
//! tooling to compare the algorithms fairly.
//!
//! # Features
//!
//! - Grid model with obstacles and one-way aisles, ASCII and MovingAI loading
//! - A* and uniform-cost routing, memoized distance oracle with a weighted mode
//! - Exact bitmask dynamic programming (Held-Karp)
//! - Nearest neighbor, NN + 2-opt and a multi-start hybrid
//! - Genetic algorithm, ant colony and ant lion optimization
//! - Discrete-event collision replay of several agents on one grid
//! - Scenario generation and a benchmark runner with CSV export
//!
//! # Example
//!
//! ```no_run
//! use warehouse_tour_bench::algorithm::{plan, Algorithm, AlgorithmParams};
//! use warehouse_tour_bench::distance::DistanceOracle;
//! use warehouse_tour_bench::grid::Grid;
//!
//! let grid = Grid::new(5, 5);
//! let mut oracle = DistanceOracle::new(&grid);
//! let matrix = oracle.build(&[(0, 0), (4, 4), (0, 4), (4, 0)]).unwrap();
//!
//! let tour = plan(Algorithm::Exact, &matrix, 0, 0, &AlgorithmParams::default()).unwrap();
//! println!("Tour cost: {:.2}", tour.cost);
//! ```

pub mod error;
pub mod grid;
pub mod routing;
pub mod distance;
pub mod tour;
pub mod exact;
pub mod heuristics;
pub mod algorithm;
pub mod collision;
pub mod scenario;
pub mod benchmark;

pub use algorithm::{plan, Algorithm, AlgorithmParams};
pub use distance::{DistanceMatrix, DistanceOracle};
pub use error::{Error, Result};
pub use grid::{Cell, Grid};
pub use tour::Tour;
