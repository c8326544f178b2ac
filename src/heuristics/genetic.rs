//! Genetic Algorithm for tour planning.
//!
//! Chromosomes are permutations of the waypoints (start node excluded).
//! - Random initial population
//! - Tournament selection
//! - Order crossover (OX) and swap mutation
//! - Generational replacement with elitism

use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};
use crate::tour::{waypoints, Tour};
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Individual in the genetic algorithm population
#[derive(Debug, Clone)]
pub struct Individual {
    /// Visiting order
    pub order: Vec<usize>,
    /// Closed-tour cost, lower is fitter
    pub cost: f64,
}

impl Individual {
    pub fn new(order: Vec<usize>, matrix: &DistanceMatrix, start: usize) -> Self {
        let cost = matrix.tour_cost(start, &order);
        Individual { order, cost }
    }
}

/// Genetic Algorithm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GAConfig {
    /// Population size
    pub population_size: usize,
    /// Number of generations
    pub max_generations: usize,
    /// Crossover probability
    pub crossover_prob: f64,
    /// Per-individual mutation probability
    pub mutation_prob: f64,
    /// Tournament size for selection
    pub tournament_size: usize,
    /// Best individuals copied unchanged into the next generation
    pub elite_count: usize,
    /// Random seed
    pub seed: u64,
    /// Time limit in seconds for the GA run
    pub time_limit: f64,
}

impl Default for GAConfig {
    fn default() -> Self {
        GAConfig {
            population_size: 48,
            max_generations: 200,
            crossover_prob: 0.9,
            mutation_prob: 0.2,
            tournament_size: 2,
            elite_count: 1,
            seed: 0,
            time_limit: 60.0,
        }
    }
}

impl GAConfig {
    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(Error::InvalidConfig("genetic.population_size must be at least 2".into()));
        }
        if self.tournament_size == 0 {
            return Err(Error::InvalidConfig("genetic.tournament_size must be at least 1".into()));
        }
        if self.elite_count == 0 || self.elite_count >= self.population_size {
            return Err(Error::InvalidConfig(format!(
                "genetic.elite_count must be in 1..{}",
                self.population_size
            )));
        }
        for (name, p) in [("crossover_prob", self.crossover_prob), ("mutation_prob", self.mutation_prob)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidConfig(format!("genetic.{name} must be in [0, 1]")));
            }
        }
        if !(self.time_limit > 0.0) {
            return Err(Error::InvalidConfig("genetic.time_limit must be positive".into()));
        }
        Ok(())
    }
}

/// Genetic Algorithm implementation.
///
/// The population and random source belong to one run; create a fresh
/// instance per planning call.
pub struct GeneticAlgorithm<'a> {
    config: GAConfig,
    matrix: &'a DistanceMatrix,
    start: usize,
    population: Vec<Individual>,
    best_individual: Option<Individual>,
    rng: ChaCha8Rng,
    generation: usize,
    history: Vec<f64>,
}

impl<'a> GeneticAlgorithm<'a> {
    pub fn new(matrix: &'a DistanceMatrix, start: usize, config: GAConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        GeneticAlgorithm {
            config,
            matrix,
            start,
            population: Vec::new(),
            best_individual: None,
            rng,
            generation: 0,
            history: Vec::new(),
        }
    }

    fn initialize_population(&mut self) {
        let genes = waypoints(self.matrix.len(), self.start);
        self.population = (0..self.config.population_size)
            .map(|_| {
                let mut order = genes.clone();
                order.shuffle(&mut self.rng);
                Individual::new(order, self.matrix, self.start)
            })
            .collect();
        self.population.sort_by_key(|ind| OrderedFloat(ind.cost));
        self.best_individual = self.population.first().cloned();
    }

    /// Tournament selection
    fn tournament_select(&mut self) -> &Individual {
        let mut best_idx = self.rng.gen_range(0..self.population.len());
        for _ in 1..self.config.tournament_size {
            let idx = self.rng.gen_range(0..self.population.len());
            if self.population[idx].cost < self.population[best_idx].cost {
                best_idx = idx;
            }
        }
        &self.population[best_idx]
    }

    /// Order Crossover (OX)
    ///
    /// Keeps `parent1[a..b]` in place and fills the other positions with the
    /// remaining genes in `parent2` order. Tours with fewer than three genes
    /// have no meaningful cut and come back as a copy of `parent1`.
    fn order_crossover(&mut self, parent1: &[usize], parent2: &[usize]) -> Vec<usize> {
        let m = parent1.len();
        if m < 3 {
            return parent1.to_vec();
        }

        let mut cuts = index::sample(&mut self.rng, m + 1, 2).into_vec();
        cuts.sort_unstable();
        let (a, b) = (cuts[0], cuts[1]);

        let mut in_segment = vec![false; self.matrix.len()];
        for &gene in &parent1[a..b] {
            in_segment[gene] = true;
        }
        let mut fill = parent2.iter().copied().filter(|&g| !in_segment[g]);

        let mut child = Vec::with_capacity(m);
        for i in 0..m {
            if (a..b).contains(&i) {
                child.push(parent1[i]);
            } else if let Some(gene) = fill.next() {
                child.push(gene);
            }
        }
        child
    }

    /// Swap mutation
    fn mutate_swap(&mut self, order: &mut [usize]) {
        if order.len() < 2 || self.rng.gen::<f64>() >= self.config.mutation_prob {
            return;
        }
        let picked = index::sample(&mut self.rng, order.len(), 2);
        order.swap(picked.index(0), picked.index(1));
    }

    /// Create new generation
    fn evolve(&mut self) {
        let size = self.config.population_size;
        let mut new_population = Vec::with_capacity(size);

        new_population.extend(self.population.iter().take(self.config.elite_count).cloned());

        while new_population.len() < size {
            let parent1 = self.tournament_select().order.clone();
            let parent2 = self.tournament_select().order.clone();

            let mut child = if self.rng.gen::<f64>() < self.config.crossover_prob {
                self.order_crossover(&parent1, &parent2)
            } else {
                parent1
            };
            self.mutate_swap(&mut child);
            new_population.push(Individual::new(child, self.matrix, self.start));
        }

        new_population.sort_by_key(|ind| OrderedFloat(ind.cost));

        if let Some(best) = new_population.first() {
            let improved = self
                .best_individual
                .as_ref()
                .map_or(true, |current| best.cost < current.cost);
            if improved {
                self.best_individual = Some(best.clone());
            }
        }

        self.population = new_population;
        self.generation += 1;
    }

    /// Run the genetic algorithm
    pub fn run(&mut self) -> Tour {
        let timer = Instant::now();
        let name = "genetic";

        if self.matrix.len() <= 2 {
            let mut tour = Tour::trivial(self.matrix, self.start, name);
            tour.computation_time = timer.elapsed().as_secs_f64();
            return tour;
        }

        self.initialize_population();
        if let Some(best) = &self.best_individual {
            self.history.push(best.cost);
        }

        while self.generation < self.config.max_generations
            && timer.elapsed().as_secs_f64() < self.config.time_limit
        {
            self.evolve();
            if let Some(best) = &self.best_individual {
                self.history.push(best.cost);
                log::debug!("[GA] gen {} best {:.3}", self.generation, best.cost);
            }
        }

        let order = match &self.best_individual {
            Some(best) => best.order.clone(),
            None => waypoints(self.matrix.len(), self.start),
        };
        let mut tour = Tour::from_order(self.matrix, self.start, order, name);
        tour.computation_time = timer.elapsed().as_secs_f64();
        tour.iterations = self.generation;
        tour.history = std::mem::take(&mut self.history);
        tour
    }

    /// Get current generation
    pub fn current_generation(&self) -> usize {
        self.generation
    }
}
