//! Distance oracle and the cost matrix consumed by every tour algorithm.
//!
//! The oracle routes each ordered pair of nodes through the grid, memoizing
//! routes by `(start, goal)`. In weighted mode each leg is scored as
//!
//! `α·steps + β·turns + γ·risk + δ·violations - ε·[target near a dock]`
//!
//! and clamped at zero. Weighted legs are routed by a search over
//! `(cell, heading)` that minimizes steps, turns and violations together, so
//! `turns` is the fewest heading changes any route of that cost can make.

use crate::error::{Error, Result};
use crate::grid::{manhattan, Cell, Grid};
use crate::routing::{self, Route};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Square matrix of non-negative leg costs between node indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
    symmetric: bool,
}

impl DistanceMatrix {
    /// Build from row vectors. Rows must be square and entries finite and
    /// non-negative.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(Error::InvalidConfig(format!(
                    "distance row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            data.extend(row);
        }
        Self::from_flat(n, data)
    }

    fn from_flat(n: usize, data: Vec<f64>) -> Result<Self> {
        if let Some(bad) = data.iter().find(|d| !d.is_finite() || **d < 0.0) {
            return Err(Error::InvalidConfig(format!("invalid distance entry {bad}")));
        }
        let symmetric = (0..n).all(|i| (i + 1..n).all(|j| data[i * n + j] == data[j * n + i]));
        Ok(DistanceMatrix { n, data, symmetric })
    }

    /// Build by evaluating `f(i, j)` for every pair; the diagonal is zero.
    pub fn from_fn<F>(n: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    data[i * n + j] = f(i, j);
                }
            }
        }
        Self::from_flat(n, data)
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// True when `d(i, j) == d(j, i)` for every pair.
    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Cost of the closed tour `start -> order... -> start`.
    pub fn tour_cost(&self, start: usize, order: &[usize]) -> f64 {
        let Some((&first, _)) = order.split_first() else {
            return 0.0;
        };
        let mut cost = self.get(start, first);
        for w in order.windows(2) {
            cost += self.get(w[0], w[1]);
        }
        cost + order.last().map_or(0.0, |&last| self.get(last, start))
    }

    /// Cost of walking a node sequence without returning.
    pub fn path_cost(&self, nodes: &[usize]) -> f64 {
        nodes.windows(2).map(|w| self.get(w[0], w[1])).sum()
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n).map(|i| self.row(i).to_vec()).collect()
    }
}

/// Weights of the weighted cost mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Weighting {
    /// Path length weight
    pub alpha: f64,
    /// Turn penalty weight
    pub beta: f64,
    /// Collision risk weight
    pub gamma: f64,
    /// Penalty per one-way violation
    pub delta: f64,
    /// Bonus for legs ending near a dock
    pub epsilon: f64,
    /// Manhattan radius that counts as "near a dock"
    pub dock_radius: usize,
    /// Substitute straight-line distance when no route exists.
    /// Off by default: unreachable pairs are errors.
    pub euclidean_fallback: bool,
}

impl Default for Weighting {
    fn default() -> Self {
        Weighting {
            alpha: 1.0,
            beta: 2.0,
            gamma: 3.0,
            delta: 1000.0,
            epsilon: 0.5,
            dock_radius: 2,
            euclidean_fallback: false,
        }
    }
}

/// Per-leg congestion score used by the weighted mode.
pub trait CongestionModel: Send + Sync {
    /// Risk of the leg routed along `path` (first and last cells are the
    /// leg endpoints).
    fn risk(&self, grid: &Grid, path: &[Cell]) -> f64;
    fn name(&self) -> &str;
}

/// No congestion information.
#[derive(Debug, Clone, Default)]
pub struct NoCongestion;

impl CongestionModel for NoCongestion {
    fn risk(&self, _grid: &Grid, _path: &[Cell]) -> f64 {
        0.0
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Externally measured congestion per endpoint pair; the score of a leg is
/// the larger of its two directions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficMap {
    levels: HashMap<(Cell, Cell), f64>,
}

impl TrafficMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: Cell, to: Cell, level: f64) {
        self.levels.insert((from, to), level);
    }

    /// Accumulate observed wait time at collision locations, e.g. from a
    /// previous simulation run.
    pub fn record(&mut self, from: Cell, to: Cell, amount: f64) {
        *self.levels.entry((from, to)).or_insert(0.0) += amount;
    }
}

impl CongestionModel for TrafficMap {
    fn risk(&self, _grid: &Grid, path: &[Cell]) -> f64 {
        let (Some(&a), Some(&b)) = (path.first(), path.last()) else {
            return 0.0;
        };
        let forward = self.levels.get(&(a, b)).copied().unwrap_or(0.0);
        let backward = self.levels.get(&(b, a)).copied().unwrap_or(0.0);
        forward.max(backward)
    }

    fn name(&self) -> &str {
        "traffic-map"
    }
}

/// Static estimate: fraction of intermediate cells that sit in a single-lane
/// corridor (at most two free neighbors), where agents cannot pass each other.
#[derive(Debug, Clone, Default)]
pub struct AisleWidthEstimate;

impl CongestionModel for AisleWidthEstimate {
    fn risk(&self, grid: &Grid, path: &[Cell]) -> f64 {
        if path.len() <= 2 {
            return 0.0;
        }
        let inner = &path[1..path.len() - 1];
        let narrow = inner
            .iter()
            .filter(|&&c| grid.neighbors(c).len() <= 2)
            .count();
        narrow as f64 / inner.len() as f64
    }

    fn name(&self) -> &str {
        "aisle-width"
    }
}

enum CostMode {
    Plain,
    Weighted {
        weighting: Weighting,
        docks: Vec<Cell>,
        congestion: Box<dyn CongestionModel>,
    },
}

/// Memoizing distance service over one grid.
pub struct DistanceOracle<'g> {
    grid: &'g Grid,
    mode: CostMode,
    cache: HashMap<(Cell, Cell), Route>,
    searches: usize,
}

impl<'g> DistanceOracle<'g> {
    /// Plain mode: cost is the number of moves on the shortest legal route.
    pub fn new(grid: &'g Grid) -> Self {
        DistanceOracle {
            grid,
            mode: CostMode::Plain,
            cache: HashMap::new(),
            searches: 0,
        }
    }

    /// Weighted mode.
    pub fn weighted(
        grid: &'g Grid,
        weighting: Weighting,
        docks: Vec<Cell>,
        congestion: Box<dyn CongestionModel>,
    ) -> Self {
        DistanceOracle {
            grid,
            mode: CostMode::Weighted {
                weighting,
                docks,
                congestion,
            },
            cache: HashMap::new(),
            searches: 0,
        }
    }

    pub fn grid(&self) -> &Grid {
        self.grid
    }

    /// Number of searches actually run (cache misses).
    pub fn searches(&self) -> usize {
        self.searches
    }

    /// Routed path between two cells, memoized.
    pub fn route(&mut self, start: Cell, goal: Cell) -> Result<Route> {
        if let Some(route) = self.cache.get(&(start, goal)) {
            return Ok(route.clone());
        }
        // Without one-way edges every route can be walked backwards
        if !self.grid.has_one_way() {
            if let Some(route) = self.cache.get(&(goal, start)) {
                let reversed = route.reversed();
                self.cache.insert((start, goal), reversed.clone());
                return Ok(reversed);
            }
        }

        self.searches += 1;
        let route = match &self.mode {
            CostMode::Plain => routing::shortest_path(self.grid, start, goal)?,
            CostMode::Weighted { weighting, .. } => {
                let (alpha, delta) = (weighting.alpha, weighting.delta);
                let step = |_: Cell, _: Cell, legal: bool| Some(if legal { alpha } else { alpha + delta });
                if weighting.beta > 0.0 {
                    routing::turn_aware_path(self.grid, start, goal, weighting.beta, step)?
                } else {
                    routing::uniform_cost_path(self.grid, start, goal, step)?
                }
            }
        };
        self.cache.insert((start, goal), route.clone());
        Ok(route)
    }

    /// Leg cost between two cells under the oracle's cost mode.
    pub fn cost(&mut self, start: Cell, goal: Cell) -> Result<f64> {
        if start == goal {
            return Ok(0.0);
        }

        let route = match self.route(start, goal) {
            Ok(route) => route,
            Err(Error::NoPath { .. }) if self.euclidean_fallback() => {
                let dx = start.0 as f64 - goal.0 as f64;
                let dy = start.1 as f64 - goal.1 as f64;
                log::warn!(
                    "no route {:?} -> {:?}, using straight-line distance as configured",
                    start,
                    goal
                );
                return Ok((dx * dx + dy * dy).sqrt());
            }
            Err(e) => return Err(e),
        };

        match &self.mode {
            CostMode::Plain => Ok(route.steps() as f64),
            CostMode::Weighted {
                weighting,
                docks,
                congestion,
            } => {
                let near_dock = docks
                    .iter()
                    .any(|&d| manhattan(goal, d) <= weighting.dock_radius);
                let cost = weighting.alpha * route.steps() as f64
                    + weighting.beta * route.turns() as f64
                    + weighting.gamma * congestion.risk(self.grid, &route.cells)
                    + weighting.delta * route.violations(self.grid) as f64
                    - if near_dock { weighting.epsilon } else { 0.0 };
                Ok(cost.max(0.0))
            }
        }
    }

    fn euclidean_fallback(&self) -> bool {
        matches!(&self.mode, CostMode::Weighted { weighting, .. } if weighting.euclidean_fallback)
    }

    /// Full matrix over `nodes`, node `i` being `nodes[i]`.
    pub fn build(&mut self, nodes: &[Cell]) -> Result<DistanceMatrix> {
        for &node in nodes {
            self.grid.check_cell(node)?;
        }
        let n = nodes.len();
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    data[i * n + j] = self.cost(nodes[i], nodes[j])?;
                }
            }
        }
        log::debug!(
            "distance matrix over {} nodes built with {} searches",
            n,
            self.searches
        );
        DistanceMatrix::from_flat(n, data)
    }

    /// Concatenate routes visiting `cells` in order. Consecutive duplicates
    /// at leg joins are dropped.
    pub fn expand(&mut self, cells: &[Cell]) -> Result<Vec<Cell>> {
        let mut path: Vec<Cell> = Vec::new();
        for w in cells.windows(2) {
            let route = self.route(w[0], w[1])?;
            for cell in route.cells {
                if path.last() != Some(&cell) {
                    path.push(cell);
                }
            }
        }
        if path.is_empty() {
            path.extend(cells.first());
        }
        Ok(path)
    }
}
