//! Ant Colony Optimization for tour planning.
//!
//! Classic Ant System: every ant builds a full cycle by roulette selection
//! on `tau^alpha * eta^beta`, then all trails evaporate by `(1 - rho)` and
//! every ant deposits `q / length` on the edges it used.

use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};
use crate::heuristics::construction::order_from_cycle;
use crate::tour::{waypoints, Tour};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// ACO configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ACOConfig {
    /// Number of ants
    pub num_ants: usize,
    /// Number of iterations
    pub max_iterations: usize,
    /// Pheromone importance (alpha)
    pub alpha: f64,
    /// Heuristic importance (beta)
    pub beta: f64,
    /// Evaporation rate (rho)
    pub evaporation_rate: f64,
    /// Pheromone deposit factor
    pub q: f64,
    /// Random seed
    pub seed: u64,
    /// Time limit in seconds for the ACO run
    pub time_limit: f64,
}

impl Default for ACOConfig {
    fn default() -> Self {
        ACOConfig {
            num_ants: 10,
            max_iterations: 50,
            alpha: 1.0,
            beta: 2.0,
            evaporation_rate: 0.1,
            q: 100.0,
            seed: 0,
            time_limit: 60.0,
        }
    }
}

impl ACOConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_ants == 0 {
            return Err(Error::InvalidConfig("aco.num_ants must be at least 1".into()));
        }
        if !(self.evaporation_rate > 0.0 && self.evaporation_rate <= 1.0) {
            return Err(Error::InvalidConfig("aco.evaporation_rate must be in (0, 1]".into()));
        }
        if self.alpha < 0.0 || self.beta < 0.0 || !(self.q > 0.0) {
            return Err(Error::InvalidConfig("aco.alpha and aco.beta must be non-negative, aco.q positive".into()));
        }
        if !(self.time_limit > 0.0) {
            return Err(Error::InvalidConfig("aco.time_limit must be positive".into()));
        }
        Ok(())
    }
}

/// Trail strengths, one per directed node pair.
#[derive(Debug, Clone)]
pub struct PheromoneMatrix {
    n: usize,
    tau: Vec<f64>,
}

impl PheromoneMatrix {
    pub fn new(n: usize, initial: f64) -> Self {
        PheromoneMatrix {
            n,
            tau: vec![initial; n * n],
        }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.tau[i * self.n + j]
    }

    /// Multiply every trail by `1 - rho`.
    pub fn evaporate(&mut self, rho: f64) {
        let keep = 1.0 - rho;
        for t in &mut self.tau {
            *t *= keep;
        }
    }

    /// Add `amount` on both directions of every edge of the closed `cycle`.
    pub fn deposit(&mut self, cycle: &[usize], amount: f64) {
        let len = cycle.len();
        for k in 0..len {
            let (a, b) = (cycle[k], cycle[(k + 1) % len]);
            self.tau[a * self.n + b] += amount;
            self.tau[b * self.n + a] += amount;
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.tau
    }
}

/// Ant Colony Optimization solver
///
/// Owns its pheromone matrix; one instance serves one planning call.
pub struct AntColonyOptimization<'a> {
    config: ACOConfig,
    matrix: &'a DistanceMatrix,
    start: usize,
    pheromone: PheromoneMatrix,
    heuristic: Vec<f64>,
    best_cycle: Vec<usize>,
    best_cost: f64,
    rng: ChaCha8Rng,
}

impl<'a> AntColonyOptimization<'a> {
    pub fn new(matrix: &'a DistanceMatrix, start: usize, config: ACOConfig) -> Self {
        let n = matrix.len();

        // tau0 = 1 / (n * first non-zero distance)
        let first = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .map(|(i, j)| matrix.get(i, j))
            .find(|&d| d > 1e-10)
            .unwrap_or(1.0);
        let tau0 = 1.0 / (n as f64 * first).max(1e-10);

        let heuristic = (0..n * n)
            .map(|k| 1.0 / matrix.get(k / n, k % n).max(1e-10))
            .collect();

        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        AntColonyOptimization {
            config,
            matrix,
            start,
            pheromone: PheromoneMatrix::new(n, tau0),
            heuristic,
            best_cycle: Vec::new(),
            best_cost: f64::INFINITY,
            rng,
        }
    }

    /// Construct a closed cycle for one ant
    fn construct_cycle(&mut self, ant_start: usize) -> Vec<usize> {
        let n = self.matrix.len();
        let mut cycle = Vec::with_capacity(n);
        let mut visited = vec![false; n];
        visited[ant_start] = true;
        cycle.push(ant_start);
        let mut current = ant_start;

        while cycle.len() < n {
            let next = self.select_next_node(current, &visited);
            visited[next] = true;
            cycle.push(next);
            current = next;
        }
        cycle
    }

    /// Roulette selection; falls back to the nearest unvisited node when the
    /// weights degenerate.
    fn select_next_node(&mut self, current: usize, visited: &[bool]) -> usize {
        let n = self.matrix.len();
        let mut candidates: Vec<(usize, f64)> = Vec::with_capacity(n);
        for j in (0..n).filter(|&j| !visited[j]) {
            let tau = self.pheromone.get(current, j).powf(self.config.alpha);
            let eta = self.heuristic[current * n + j].powf(self.config.beta);
            candidates.push((j, tau * eta));
        }

        let total: f64 = candidates.iter().map(|&(_, w)| w).sum();
        if total > 0.0 && total.is_finite() {
            let pick = self.rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            for &(j, weight) in &candidates {
                cumulative += weight;
                if pick <= cumulative {
                    return j;
                }
            }
            if let Some(&(j, _)) = candidates.last() {
                return j;
            }
        }

        let row = self.matrix.row(current);
        let mut nearest = candidates.first().map_or(current, |&(j, _)| j);
        for &(j, _) in &candidates {
            if row[j] < row[nearest] {
                nearest = j;
            }
        }
        nearest
    }

    /// Run ACO algorithm
    pub fn run(&mut self) -> Tour {
        let timer = Instant::now();
        let name = "aco";
        let n = self.matrix.len();

        if n <= 2 {
            let mut tour = Tour::trivial(self.matrix, self.start, name);
            tour.computation_time = timer.elapsed().as_secs_f64();
            return tour;
        }

        let others = waypoints(n, self.start);
        let mut history = Vec::with_capacity(self.config.max_iterations);
        let mut iteration = 0;

        while iteration < self.config.max_iterations
            && timer.elapsed().as_secs_f64() < self.config.time_limit
        {
            let mut ant_cycles = Vec::with_capacity(self.config.num_ants);

            for ant in 0..self.config.num_ants {
                let ant_start = if ant == 0 {
                    self.start
                } else {
                    others[self.rng.gen_range(0..others.len())]
                };
                let cycle = self.construct_cycle(ant_start);
                let length = self.cycle_cost(&cycle);
                if length < self.best_cost {
                    self.best_cost = length;
                    self.best_cycle = cycle.clone();
                }
                ant_cycles.push((cycle, length));
            }

            self.pheromone.evaporate(self.config.evaporation_rate);
            for (cycle, length) in &ant_cycles {
                self.pheromone.deposit(cycle, self.config.q / length.max(1e-10));
            }

            history.push(self.best_cost);
            iteration += 1;
            log::debug!("[ACO] iter {} best {:.3}", iteration, self.best_cost);
        }

        let order = if self.best_cycle.is_empty() {
            others
        } else {
            order_from_cycle(&self.best_cycle, self.start)
        };
        let mut tour = Tour::from_order(self.matrix, self.start, order, name);
        tour.computation_time = timer.elapsed().as_secs_f64();
        tour.iterations = iteration;
        tour.history = history;
        tour
    }

    fn cycle_cost(&self, cycle: &[usize]) -> f64 {
        let len = cycle.len();
        (0..len)
            .map(|k| self.matrix.get(cycle[k], cycle[(k + 1) % len]))
            .sum()
    }

    pub fn pheromone(&self) -> &PheromoneMatrix {
        &self.pheromone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_matrix() -> DistanceMatrix {
        let pts: [(f64, f64); 6] = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (0.0, 1.0)];
        DistanceMatrix::from_fn(pts.len(), |i, j| {
            (pts[i].0 - pts[j].0).abs() + (pts[i].1 - pts[j].1).abs()
        })
        .unwrap()
    }

    #[test]
    fn test_aco() {
        let m = create_test_matrix();
        let config = ACOConfig {
            num_ants: 5,
            max_iterations: 20,
            seed: 1,
            ..Default::default()
        };
        let tour = AntColonyOptimization::new(&m, 0, config).run();
        assert!(tour.is_valid(m.len(), 0));
        assert!(tour.cost_matches(&m, 0));
        assert!(tour.cost >= 6.0);
        assert_eq!(tour.iterations, 20);
    }

    #[test]
    fn test_best_history_monotone() {
        let m = create_test_matrix();
        let tour = AntColonyOptimization::new(&m, 3, ACOConfig::default()).run();
        for w in tour.history.windows(2) {
            assert!(w[1] <= w[0]);
        }
        assert!((tour.history.last().copied().unwrap_or(f64::NAN) - tour.cost).abs() < 1e-9);
    }

    #[test]
    fn test_evaporation_bound() {
        let mut pheromone = PheromoneMatrix::new(4, 0.5);
        pheromone.deposit(&[0, 1, 2, 3], 2.0);
        let before = pheromone.values().to_vec();
        pheromone.evaporate(0.1);
        for (after, before) in pheromone.values().iter().zip(&before) {
            assert!(after < before);
            assert!(*after >= 0.0);
        }
    }

    #[test]
    fn test_deposit_is_symmetric() {
        let mut pheromone = PheromoneMatrix::new(3, 0.0);
        pheromone.deposit(&[0, 2, 1], 1.0);
        assert_eq!(pheromone.get(0, 2), 1.0);
        assert_eq!(pheromone.get(2, 0), 1.0);
        assert_eq!(pheromone.get(1, 0), 1.0);
        assert_eq!(pheromone.get(0, 0), 0.0);
    }

    #[test]
    fn test_fresh_pheromone_per_run() {
        let m = create_test_matrix();
        let a = AntColonyOptimization::new(&m, 0, ACOConfig::default());
        let mut b = AntColonyOptimization::new(&m, 0, ACOConfig::default());
        b.run();
        let c = AntColonyOptimization::new(&m, 0, ACOConfig::default());
        assert_eq!(a.pheromone().values(), c.pheromone().values());
        assert_ne!(a.pheromone().values(), b.pheromone().values());
    }

    #[test]
    fn test_zero_distances() {
        let m = DistanceMatrix::from_fn(4, |_, _| 0.0).unwrap();
        let tour = AntColonyOptimization::new(&m, 1, ACOConfig::default()).run();
        assert!(tour.is_valid(4, 1));
        assert_eq!(tour.cost, 0.0);
    }

    #[test]
    fn test_degenerate() {
        let m = DistanceMatrix::from_rows(vec![vec![0.0, 4.0], vec![4.0, 0.0]]).unwrap();
        let tour = AntColonyOptimization::new(&m, 1, ACOConfig::default()).run();
        assert_eq!(tour.order, vec![0]);
        assert_eq!(tour.cost, 8.0);
    }
}
