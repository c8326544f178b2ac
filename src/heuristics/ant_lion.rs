//! Ant Lion Optimization for tour planning.
//!
//! A population of ant lions (candidate tours) is refined by random walks:
//! each walk perturbs either the elite or a random ant lion with a swap and a
//! segment reversal, then polishes the result with a few 2-opt exchanges.

use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};
use crate::heuristics::local_search::two_opt_order;
use crate::tour::{waypoints, Tour};
use rand::prelude::*;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// ALO configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ALOConfig {
    /// Number of ant lions
    pub population_size: usize,
    /// Number of iterations
    pub max_iterations: usize,
    /// Probability that a walk starts from the elite
    pub elite_prob: f64,
    /// Probability of a swap during a walk
    pub swap_prob: f64,
    /// Probability of a segment reversal during a walk
    pub reversal_prob: f64,
    /// 2-opt exchanges after each walk
    pub walk_swaps: usize,
    /// 2-opt exchanges applied to the initial ant lions
    pub init_swaps: usize,
    /// Random seed
    pub seed: u64,
    /// Time limit in seconds
    pub time_limit: f64,
}

impl Default for ALOConfig {
    fn default() -> Self {
        ALOConfig {
            population_size: 20,
            max_iterations: 100,
            elite_prob: 0.5,
            swap_prob: 0.3,
            reversal_prob: 0.3,
            walk_swaps: 3,
            init_swaps: 5,
            seed: 0,
            time_limit: 60.0,
        }
    }
}

impl ALOConfig {
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(Error::InvalidConfig("ant_lion.population_size must be at least 1".into()));
        }
        for (name, p) in [
            ("elite_prob", self.elite_prob),
            ("swap_prob", self.swap_prob),
            ("reversal_prob", self.reversal_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidConfig(format!("ant_lion.{name} must be in [0, 1]")));
            }
        }
        if !(self.time_limit > 0.0) {
            return Err(Error::InvalidConfig("ant_lion.time_limit must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct AntLion {
    order: Vec<usize>,
    cost: f64,
}

pub struct AntLionOptimization<'a> {
    config: ALOConfig,
    matrix: &'a DistanceMatrix,
    start: usize,
    lions: Vec<AntLion>,
    elite: Option<AntLion>,
    rng: ChaCha8Rng,
}

impl<'a> AntLionOptimization<'a> {
    pub fn new(matrix: &'a DistanceMatrix, start: usize, config: ALOConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        AntLionOptimization {
            config,
            matrix,
            start,
            lions: Vec::new(),
            elite: None,
            rng,
        }
    }

    fn polish(&self, order: &mut Vec<usize>, swaps: usize) -> f64 {
        two_opt_order(self.matrix, self.start, order, swaps, None, |_| {});
        self.matrix.tour_cost(self.start, order)
    }

    fn initialize(&mut self) {
        let genes = waypoints(self.matrix.len(), self.start);
        self.lions.clear();
        for _ in 0..self.config.population_size {
            let mut order = genes.clone();
            order.shuffle(&mut self.rng);
            let cost = self.polish(&mut order, self.config.init_swaps);
            self.lions.push(AntLion { order, cost });
        }
        self.elite = self.best_lion().cloned();
    }

    fn best_lion(&self) -> Option<&AntLion> {
        let mut best: Option<&AntLion> = None;
        for lion in &self.lions {
            if best.map_or(true, |b| lion.cost < b.cost) {
                best = Some(lion);
            }
        }
        best
    }

    /// Perturb `order` in place: maybe swap two genes, maybe reverse a segment.
    fn random_walk(&mut self, order: &mut [usize]) {
        if order.len() < 2 {
            return;
        }
        if self.rng.gen::<f64>() < self.config.swap_prob {
            let picked = index::sample(&mut self.rng, order.len(), 2);
            order.swap(picked.index(0), picked.index(1));
        }
        if self.rng.gen::<f64>() < self.config.reversal_prob {
            let mut cut = index::sample(&mut self.rng, order.len(), 2).into_vec();
            cut.sort_unstable();
            order[cut[0]..=cut[1]].reverse();
        }
    }

    fn iterate(&mut self) {
        for i in 0..self.lions.len() {
            let from_elite = self.rng.gen::<f64>() < self.config.elite_prob;
            let (slot, mut ant) = match (&self.elite, from_elite) {
                (Some(elite), true) => (i, elite.order.clone()),
                _ => {
                    let s = self.rng.gen_range(0..self.lions.len());
                    (s, self.lions[s].order.clone())
                }
            };

            self.random_walk(&mut ant);
            let cost = self.polish(&mut ant, self.config.walk_swaps);

            if cost < self.lions[slot].cost {
                self.lions[slot] = AntLion { order: ant, cost };
            }
        }

        if let Some(best) = self.best_lion().cloned() {
            if self.elite.as_ref().map_or(true, |e| best.cost < e.cost) {
                self.elite = Some(best);
            }
        }
    }

    pub fn run(&mut self) -> Tour {
        let timer = Instant::now();
        let name = "alo";

        if self.matrix.len() <= 2 {
            let mut tour = Tour::trivial(self.matrix, self.start, name);
            tour.computation_time = timer.elapsed().as_secs_f64();
            return tour;
        }

        self.initialize();
        let mut history = Vec::with_capacity(self.config.max_iterations + 1);
        history.extend(self.elite.as_ref().map(|e| e.cost));

        let mut iteration = 0;
        while iteration < self.config.max_iterations
            && timer.elapsed().as_secs_f64() < self.config.time_limit
        {
            self.iterate();
            iteration += 1;
            history.extend(self.elite.as_ref().map(|e| e.cost));
        }

        let order = match &self.elite {
            Some(elite) => elite.order.clone(),
            None => waypoints(self.matrix.len(), self.start),
        };
        let mut tour = Tour::from_order(self.matrix, self.start, order, name);
        tour.computation_time = timer.elapsed().as_secs_f64();
        tour.iterations = iteration;
        tour.history = history;
        log::debug!("[ALO] {} iterations, elite {:.3}", iteration, tour.cost);
        tour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::{ExactConfig, HeldKarp};

    fn create_test_matrix() -> DistanceMatrix {
        let pts: [(f64, f64); 9] = [
            (0.0, 0.0),
            (4.0, 0.0),
            (8.0, 1.0),
            (9.0, 5.0),
            (6.0, 8.0),
            (2.0, 9.0),
            (0.0, 5.0),
            (5.0, 4.0),
            (3.0, 3.0),
        ];
        DistanceMatrix::from_fn(pts.len(), |i, j| {
            (pts[i].0 - pts[j].0).abs() + (pts[i].1 - pts[j].1).abs()
        })
        .unwrap()
    }

    #[test]
    fn test_alo() {
        let m = create_test_matrix();
        let config = ALOConfig {
            seed: 5,
            ..ALOConfig::default()
        };
        let tour = AntLionOptimization::new(&m, 0, config).run();
        assert!(tour.is_valid(m.len(), 0));
        assert!(tour.cost_matches(&m, 0));
        let optimum = HeldKarp::new(ExactConfig::default()).solve(&m, 0).unwrap().cost;
        assert!(tour.cost >= optimum);
    }

    #[test]
    fn test_elite_never_regresses() {
        let m = create_test_matrix();
        let config = ALOConfig {
            seed: 9,
            max_iterations: 40,
            ..ALOConfig::default()
        };
        let tour = AntLionOptimization::new(&m, 4, config).run();
        assert_eq!(tour.history.len(), 41);
        for w in tour.history.windows(2) {
            assert!(w[1] <= w[0]);
        }
        assert_eq!(tour.history.last().copied(), Some(tour.cost));
    }

    #[test]
    fn test_random_walk_keeps_permutation() {
        let m = create_test_matrix();
        let config = ALOConfig {
            swap_prob: 1.0,
            reversal_prob: 1.0,
            ..ALOConfig::default()
        };
        let mut alo = AntLionOptimization::new(&m, 0, config);
        let mut order: Vec<usize> = (1..9).collect();
        for _ in 0..20 {
            alo.random_walk(&mut order);
        }
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (1..9).collect::<Vec<_>>());

        let mut single = vec![1];
        alo.random_walk(&mut single);
        assert_eq!(single, vec![1]);
    }

    #[test]
    fn test_small_instances() {
        for n in 1..=4 {
            let m = DistanceMatrix::from_fn(n, |i, j| (i * 2 + j) as f64).unwrap();
            let tour = AntLionOptimization::new(&m, n - 1, ALOConfig::default()).run();
            assert!(tour.is_valid(n, n - 1));
            assert!(tour.cost_matches(&m, n - 1));
        }
    }
}
