//! Local search improvement heuristics.
//!
//! This module implements:
//! - 2-opt edge exchange on the closed tour, with swap and time budgets
//! - NN + 2-opt (one construction, one improvement pass)
//! - Hybrid NN + 2-opt (several construction seeds, larger budgets)

use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};
use crate::heuristics::construction::{nearest_neighbor_sequence, order_from_cycle};
use crate::tour::Tour;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Trait for local search improvement methods
pub trait LocalSearch {
    fn improve(&self, matrix: &DistanceMatrix, start: usize, tour: &mut Tour) -> bool;
    fn name(&self) -> &str;
}

/// Budgets of one 2-opt pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoOptConfig {
    /// Maximum accepted exchanges
    pub max_swaps: usize,
    /// Wall-clock budget in seconds
    pub max_time: f64,
}

impl Default for TwoOptConfig {
    fn default() -> Self {
        TwoOptConfig {
            max_swaps: 1000,
            max_time: 1.0,
        }
    }
}

impl TwoOptConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_time >= 0.0) {
            return Err(Error::InvalidConfig("two_opt.max_time must be non-negative".into()));
        }
        Ok(())
    }
}

/// Instant `seconds` from now, or `None` when the budget does not fit in an
/// `Instant` (treated as unbounded).
pub fn deadline_after(seconds: f64) -> Option<Instant> {
    Duration::try_from_secs_f64(seconds.max(0.0))
        .ok()
        .and_then(|budget| Instant::now().checked_add(budget))
}

/// Cost change of reversing `closed[i..=j]`, where `closed` starts and ends
/// at the start node and `1 <= i < j <= closed.len() - 2`.
pub fn two_opt_delta(matrix: &DistanceMatrix, closed: &[usize], i: usize, j: usize) -> f64 {
    let (a, b) = (closed[i - 1], closed[i]);
    let (c, e) = (closed[j], closed[j + 1]);
    let mut delta = matrix.get(a, c) + matrix.get(b, e) - matrix.get(a, b) - matrix.get(c, e);
    if !matrix.is_symmetric() {
        // Inner edges change direction too
        for k in i..j {
            delta += matrix.get(closed[k + 1], closed[k]) - matrix.get(closed[k], closed[k + 1]);
        }
    }
    delta
}

/// First-improvement 2-opt on `order` (start node excluded). Restarts the
/// scan after every accepted exchange and stops when no exchange improves,
/// `max_swaps` exchanges were made, or `deadline` passed. Returns the
/// accepted exchanges; `on_swap` sees the tour cost after each one.
pub fn two_opt_order<F>(
    matrix: &DistanceMatrix,
    start: usize,
    order: &mut Vec<usize>,
    max_swaps: usize,
    deadline: Option<Instant>,
    mut on_swap: F,
) -> usize
where
    F: FnMut(f64),
{
    if order.len() < 2 {
        return 0;
    }

    let mut closed = Vec::with_capacity(order.len() + 2);
    closed.push(start);
    closed.extend_from_slice(order);
    closed.push(start);

    let len = closed.len();
    let mut cost = matrix.path_cost(&closed);
    let mut swaps = 0;
    let expired = |deadline: Option<Instant>| deadline.is_some_and(|d| Instant::now() >= d);

    'search: while swaps < max_swaps && !expired(deadline) {
        for i in 1..len - 2 {
            for j in i + 1..len - 1 {
                let delta = two_opt_delta(matrix, &closed, i, j);
                if delta < -1e-9 {
                    closed[i..=j].reverse();
                    cost += delta;
                    swaps += 1;
                    on_swap(cost);
                    continue 'search;
                }
            }
            if expired(deadline) {
                break 'search;
            }
        }
        break;
    }

    order.clear();
    order.extend_from_slice(&closed[1..len - 1]);
    swaps
}

/// 2-Opt Local Search
///
/// Reverses tour segments while that strictly shortens the closed tour.
#[derive(Debug, Clone, Default)]
pub struct TwoOptSearch {
    pub config: TwoOptConfig,
}

impl TwoOptSearch {
    pub fn new(config: TwoOptConfig) -> Self {
        TwoOptSearch { config }
    }
}

impl LocalSearch for TwoOptSearch {
    fn improve(&self, matrix: &DistanceMatrix, start: usize, tour: &mut Tour) -> bool {
        let deadline = deadline_after(self.config.max_time);
        let history = &mut tour.history;
        let swaps = two_opt_order(
            matrix,
            start,
            &mut tour.order,
            self.config.max_swaps,
            deadline,
            |cost| history.push(cost),
        );
        tour.cost = matrix.tour_cost(start, &tour.order);
        tour.iterations += swaps;
        swaps > 0
    }

    fn name(&self) -> &str {
        "2-Opt"
    }
}

/// Nearest neighbor followed by one 2-opt pass.
pub struct NnTwoOpt {
    config: TwoOptConfig,
}

impl NnTwoOpt {
    pub fn new(config: TwoOptConfig) -> Self {
        NnTwoOpt { config }
    }

    pub fn solve(&self, matrix: &DistanceMatrix, start: usize) -> Tour {
        let timer = Instant::now();
        let name = "nn-2opt";

        if matrix.len() <= 2 {
            let mut tour = Tour::trivial(matrix, start, name);
            tour.computation_time = timer.elapsed().as_secs_f64();
            return tour;
        }

        let order: Vec<usize> = nearest_neighbor_sequence(matrix, start).into_iter().skip(1).collect();
        let mut tour = Tour::from_order(matrix, start, order, name);
        tour.initial_cost = Some(tour.cost);
        tour.history.push(tour.cost);

        TwoOptSearch::new(self.config.clone()).improve(matrix, start, &mut tour);
        tour.computation_time = timer.elapsed().as_secs_f64();

        log::debug!(
            "nn-2opt: {:.2} -> {:.2} after {} swaps",
            tour.initial_cost.unwrap_or(tour.cost),
            tour.cost,
            tour.iterations
        );
        tour
    }
}

/// Hybrid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    /// Number of construction seeds to try
    pub max_nn_starts: usize,
    /// Maximum accepted exchanges per seed
    pub max_swaps: usize,
    /// Wall-clock budget per seed in seconds
    pub max_time: f64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        HybridConfig {
            max_nn_starts: 3,
            max_swaps: 3000,
            max_time: 3.0,
        }
    }
}

impl HybridConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_nn_starts == 0 {
            return Err(Error::InvalidConfig("hybrid.max_nn_starts must be at least 1".into()));
        }
        if !(self.max_time >= 0.0) {
            return Err(Error::InvalidConfig("hybrid.max_time must be non-negative".into()));
        }
        Ok(())
    }
}

/// Nearest neighbor from several seed nodes, each improved by 2-opt.
pub struct HybridNnTwoOpt {
    config: HybridConfig,
}

impl HybridNnTwoOpt {
    pub fn new(config: HybridConfig) -> Self {
        HybridNnTwoOpt { config }
    }

    /// Seed nodes: the start, the middle index and the quarter index,
    /// without repeats.
    pub fn seeds(&self, num_nodes: usize, start: usize) -> Vec<usize> {
        let mut seeds = vec![start];
        if num_nodes > 2 {
            let mid = num_nodes / 2;
            if mid != start {
                seeds.push(mid);
            }
            if num_nodes > 4 {
                let quarter = num_nodes / 4;
                if quarter != start && quarter != mid {
                    seeds.push(quarter);
                }
            }
        }
        seeds.truncate(self.config.max_nn_starts.max(1));
        seeds
    }

    pub fn solve(&self, matrix: &DistanceMatrix, start: usize) -> Tour {
        let timer = Instant::now();
        let name = "hybrid-nn-2opt";

        if matrix.len() <= 2 {
            let mut tour = Tour::trivial(matrix, start, name);
            tour.computation_time = timer.elapsed().as_secs_f64();
            return tour;
        }

        let two_opt = TwoOptSearch::new(TwoOptConfig {
            max_swaps: self.config.max_swaps,
            max_time: self.config.max_time,
        });

        let mut best: Option<Tour> = None;
        let mut best_initial = f64::INFINITY;

        for seed in self.seeds(matrix.len(), start) {
            let cycle = nearest_neighbor_sequence(matrix, seed);
            let mut candidate = Tour::from_order(matrix, start, order_from_cycle(&cycle, start), name);
            best_initial = best_initial.min(candidate.cost);
            candidate.history.push(candidate.cost);
            two_opt.improve(matrix, start, &mut candidate);
            log::debug!("hybrid seed {}: {:.2}", seed, candidate.cost);

            if best.as_ref().map_or(true, |b| candidate.cost < b.cost) {
                best = Some(candidate);
            }
        }

        let mut tour = best.unwrap_or_else(|| Tour::trivial(matrix, start, name));
        tour.initial_cost = Some(best_initial);
        tour.computation_time = timer.elapsed().as_secs_f64();
        tour
    }
}
