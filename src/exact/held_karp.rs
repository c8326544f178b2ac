//! Bitmask dynamic programming over subsets of waypoints.
//!
//! `dp[mask][j]` holds the cheapest walk that leaves the start, visits
//! exactly the waypoints in `mask` and ends at waypoint `j`. States are
//! filled forward in increasing mask order with strict improvement, so ties
//! always keep the first predecessor found.

use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};
use crate::tour::{waypoints, Tour};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Masks processed between two clock checks.
const CLOCK_STRIDE: usize = 1024;
const NO_PARENT: u8 = u8::MAX;

/// Exact solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactConfig {
    /// Largest matrix (start included) the solver accepts
    pub max_nodes: usize,
    /// Wall-clock budget in seconds
    pub time_limit: f64,
}

impl Default for ExactConfig {
    fn default() -> Self {
        ExactConfig {
            max_nodes: 18,
            time_limit: 30.0,
        }
    }
}

impl ExactConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_nodes == 0 || self.max_nodes > 24 {
            return Err(Error::InvalidConfig(format!(
                "exact.max_nodes must be in 1..=24, got {}",
                self.max_nodes
            )));
        }
        if !(self.time_limit > 0.0) {
            return Err(Error::InvalidConfig("exact.time_limit must be positive".into()));
        }
        Ok(())
    }
}

/// Held-Karp solver.
pub struct HeldKarp {
    config: ExactConfig,
}

impl HeldKarp {
    pub fn new(config: ExactConfig) -> Self {
        HeldKarp { config }
    }

    pub fn solve(&self, matrix: &DistanceMatrix, start: usize) -> Result<Tour> {
        let timer = Instant::now();
        let n = matrix.len();

        if n <= 2 {
            let mut tour = Tour::trivial(matrix, start, "exact");
            tour.computation_time = timer.elapsed().as_secs_f64();
            return Ok(tour);
        }
        if n > self.config.max_nodes {
            return Err(Error::ExactTooLarge {
                nodes: n,
                max_nodes: self.config.max_nodes,
            });
        }

        let others = waypoints(n, start);
        let m = others.len();
        let full = 1usize << m;

        let mut dp = vec![f64::INFINITY; full * m];
        let mut parent = vec![NO_PARENT; full * m];

        for (j, &node) in others.iter().enumerate() {
            dp[(1 << j) * m + j] = matrix.get(start, node);
        }

        for mask in 1..full {
            if mask % CLOCK_STRIDE == 0 {
                let elapsed = timer.elapsed().as_secs_f64();
                if elapsed > self.config.time_limit {
                    log::warn!("exact solver gave up on {} nodes after {:.2}s", n, elapsed);
                    return Err(Error::ExactTimeout {
                        elapsed_secs: elapsed,
                        limit_secs: self.config.time_limit,
                    });
                }
            }

            for j in 0..m {
                if mask & (1 << j) == 0 {
                    continue;
                }
                let current = dp[mask * m + j];
                if current == f64::INFINITY {
                    continue;
                }
                let row = matrix.row(others[j]);
                for k in 0..m {
                    if mask & (1 << k) != 0 {
                        continue;
                    }
                    let next = (mask | (1 << k)) * m + k;
                    let candidate = current + row[others[k]];
                    if candidate < dp[next] {
                        dp[next] = candidate;
                        parent[next] = j as u8;
                    }
                }
            }
        }

        let last_mask = full - 1;
        let mut best_cost = f64::INFINITY;
        let mut end = 0;
        for (j, &node) in others.iter().enumerate() {
            let candidate = dp[last_mask * m + j] + matrix.get(node, start);
            if candidate < best_cost {
                best_cost = candidate;
                end = j;
            }
        }

        let mut order = Vec::with_capacity(m);
        let mut mask = last_mask;
        let mut j = end;
        loop {
            order.push(others[j]);
            let p = parent[mask * m + j];
            mask &= !(1 << j);
            if p == NO_PARENT {
                break;
            }
            j = p as usize;
        }
        order.reverse();

        let mut tour = Tour::from_order(matrix, start, order, "exact");
        tour.computation_time = timer.elapsed().as_secs_f64();
        tour.iterations = full;
        log::info!(
            "exact: optimum {:.2} over {} nodes in {:.3}s",
            tour.cost,
            n,
            tour.computation_time
        );
        Ok(tour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceOracle;
    use crate::grid::Grid;

    fn create_test_matrix() -> DistanceMatrix {
        DistanceMatrix::from_rows(vec![
            vec![0.0, 3.0, 4.0, 2.0, 7.0],
            vec![3.0, 0.0, 4.0, 6.0, 3.0],
            vec![4.0, 4.0, 0.0, 5.0, 8.0],
            vec![2.0, 6.0, 5.0, 0.0, 6.0],
            vec![7.0, 3.0, 8.0, 6.0, 0.0],
        ])
        .unwrap()
    }

    fn brute_force(matrix: &DistanceMatrix, start: usize) -> f64 {
        fn permute(rest: &mut Vec<usize>, k: usize, best: &mut f64, matrix: &DistanceMatrix, start: usize) {
            if k == rest.len() {
                *best = best.min(matrix.tour_cost(start, rest));
                return;
            }
            for i in k..rest.len() {
                rest.swap(k, i);
                permute(rest, k + 1, best, matrix, start);
                rest.swap(k, i);
            }
        }
        let mut rest = waypoints(matrix.len(), start);
        let mut best = f64::INFINITY;
        permute(&mut rest, 0, &mut best, matrix, start);
        best
    }

    #[test]
    fn test_matches_brute_force() {
        let m = create_test_matrix();
        for start in 0..m.len() {
            let tour = HeldKarp::new(ExactConfig::default()).solve(&m, start).unwrap();
            assert!(tour.is_valid(m.len(), start));
            assert_eq!(tour.cost, brute_force(&m, start));
            assert!(tour.cost_matches(&m, start));
        }
    }

    #[test]
    fn test_matches_brute_force_asymmetric() {
        let m = DistanceMatrix::from_fn(7, |i, j| ((i * 7 + j * 3) % 11 + 1) as f64).unwrap();
        let tour = HeldKarp::new(ExactConfig::default()).solve(&m, 2).unwrap();
        assert_eq!(tour.cost, brute_force(&m, 2));
    }

    #[test]
    fn test_open_grid_scenario() {
        let grid = Grid::new(5, 5);
        let mut oracle = DistanceOracle::new(&grid);
        let m = oracle.build(&[(0, 0), (4, 4), (0, 4), (4, 0)]).unwrap();
        let tour = HeldKarp::new(ExactConfig::default()).solve(&m, 0).unwrap();
        assert_eq!(tour.cost, 16.0);
        assert_eq!(tour.cost, brute_force(&m, 0));
        // The diagonal corner must sit in the middle of the tour
        assert_eq!(tour.order[1], 1);
    }

    #[test]
    fn test_degenerate() {
        let single = DistanceMatrix::from_rows(vec![vec![0.0]]).unwrap();
        let tour = HeldKarp::new(ExactConfig::default()).solve(&single, 0).unwrap();
        assert!(tour.order.is_empty());
        assert_eq!(tour.cost, 0.0);

        let pair = DistanceMatrix::from_rows(vec![vec![0.0, 2.0], vec![2.0, 0.0]]).unwrap();
        let tour = HeldKarp::new(ExactConfig::default()).solve(&pair, 0).unwrap();
        assert_eq!(tour.order, vec![1]);
        assert_eq!(tour.cost, 4.0);
    }

    #[test]
    fn test_too_large() {
        let m = DistanceMatrix::from_fn(20, |_, _| 1.0).unwrap();
        let err = HeldKarp::new(ExactConfig::default()).solve(&m, 0).unwrap_err();
        assert!(matches!(err, Error::ExactTooLarge { nodes: 20, max_nodes: 18 }));
    }

    #[test]
    fn test_timeout() {
        let m = DistanceMatrix::from_fn(16, |i, j| (i + j) as f64).unwrap();
        let config = ExactConfig {
            max_nodes: 18,
            time_limit: 1e-9,
        };
        let err = HeldKarp::new(config).solve(&m, 0).unwrap_err();
        assert!(matches!(err, Error::ExactTimeout { .. }));
    }

    #[test]
    fn test_config_validation() {
        assert!(ExactConfig::default().validate().is_ok());
        let bad = ExactConfig {
            max_nodes: 40,
            ..ExactConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
