//! Warehouse scenario generation.
//!
//! Builds aisle-pattern maps, places depots inside the largest connected
//! region and samples pick locations from that same region, so every
//! waypoint of a scenario can reach every other one on a two-way map.

use crate::distance::DistanceOracle;
use crate::error::{Error, Result};
use crate::grid::{manhattan, Cell, Grid, GridBuilder};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Warehouse layout family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    /// No shelves
    Open,
    /// Shelf columns every third column, cross aisles every sixth row
    Narrow,
    /// Shelf columns every fifth column, cross aisles every eighth row
    Wide,
    /// Shelf grid with carved 3x3 crossings
    Cross,
}

impl MapType {
    pub const ALL: [MapType; 4] = [MapType::Open, MapType::Narrow, MapType::Wide, MapType::Cross];

    pub fn as_str(self) -> &'static str {
        match self {
            MapType::Open => "open",
            MapType::Narrow => "narrow",
            MapType::Wide => "wide",
            MapType::Cross => "cross",
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MapType::ALL
            .into_iter()
            .find(|m| m.as_str() == s.to_ascii_lowercase())
            .ok_or_else(|| Error::InvalidConfig(format!("unknown map type: {s}")))
    }
}

/// Build a `width x height` map of the given layout.
///
/// With `one_way` set, vertical moves are restricted per column: even
/// columns run south, odd columns run north. Horizontal moves stay two-way.
pub fn make_map(map_type: MapType, width: usize, height: usize, one_way: bool) -> Result<Grid> {
    let mut blocked: HashSet<Cell> = HashSet::new();

    match map_type {
        MapType::Open => {}
        MapType::Narrow => {
            for x in (2..width.saturating_sub(2)).step_by(3) {
                blocked.extend((0..height).filter(|y| y % 6 != 0).map(|y| (x, y)));
            }
        }
        MapType::Wide => {
            for x in (3..width.saturating_sub(3)).step_by(5) {
                blocked.extend((0..height).filter(|y| y % 8 != 0).map(|y| (x, y)));
            }
        }
        MapType::Cross => {
            let shelf_rows: Vec<usize> = (2..height.saturating_sub(2)).step_by(4).collect();
            let shelf_cols: Vec<usize> = (3..width.saturating_sub(3)).step_by(6).collect();
            for &y in &shelf_rows {
                blocked.extend((0..width).map(|x| (x, y)));
            }
            for &x in &shelf_cols {
                blocked.extend((0..height).map(|y| (x, y)));
            }
            // Open a 3x3 crossing at every shelf intersection
            for &cx in &shelf_cols {
                for &cy in &shelf_rows {
                    for x in cx - 1..=cx + 1 {
                        for y in cy - 1..=cy + 1 {
                            blocked.remove(&(x, y));
                        }
                    }
                }
            }
        }
    }

    let mut builder = GridBuilder::new(width, height);
    for &cell in &blocked {
        builder = builder.block(cell);
    }
    if one_way {
        for x in 0..width {
            for y in 0..height.saturating_sub(1) {
                let (upper, lower) = ((x, y), (x, y + 1));
                if blocked.contains(&upper) || blocked.contains(&lower) {
                    continue;
                }
                builder = if x % 2 == 0 {
                    builder.one_way(upper, lower)
                } else {
                    builder.one_way(lower, upper)
                };
            }
        }
    }
    builder.build()
}

/// Free cell of `region` closest to the map centre with at least two legal
/// moves; ties go to the smaller `(x, y)`.
pub fn central_depot(grid: &Grid, region: &HashSet<Cell>) -> Option<Cell> {
    let centre = (grid.width() / 2, grid.height() / 2);
    let mut cells: Vec<Cell> = region.iter().copied().collect();
    cells.sort_unstable();
    cells
        .iter()
        .copied()
        .filter(|&c| grid.traversable_neighbors(c).count() >= 2)
        .min_by_key(|&c| (manhattan(c, centre), c))
        .or_else(|| cells.first().copied())
}

/// Pick `count` further depots far apart: each new depot maximises its
/// minimum routed distance to the depots already chosen.
pub fn spread_depots(
    oracle: &mut DistanceOracle<'_>,
    region: &HashSet<Cell>,
    first: Cell,
    count: usize,
) -> Vec<Cell> {
    let mut candidates: Vec<Cell> = region.iter().copied().filter(|&c| c != first).collect();
    candidates.sort_unstable();
    let mut depots = vec![first];

    while depots.len() < count && !candidates.is_empty() {
        let mut best: Option<(usize, f64)> = None;
        for (idx, &candidate) in candidates.iter().enumerate() {
            let mut nearest = f64::INFINITY;
            for &depot in &depots {
                match oracle.cost(candidate, depot) {
                    Ok(d) => nearest = nearest.min(d),
                    Err(_) => nearest = f64::NEG_INFINITY,
                }
            }
            if nearest.is_finite() && best.map_or(true, |(_, d)| nearest > d) {
                best = Some((idx, nearest));
            }
        }
        match best {
            Some((idx, _)) => depots.push(candidates.remove(idx)),
            None => break,
        }
    }
    depots
}

/// Assign each pick to its nearest depot by routed distance (lowest depot
/// index on ties), then move one pick to every empty depot from a random
/// depot that still has more than one.
pub fn assign_to_depots(
    oracle: &mut DistanceOracle<'_>,
    depots: &[Cell],
    picks: &[Cell],
    seed: u64,
) -> Result<Vec<Vec<usize>>> {
    let mut assignments: Vec<Vec<usize>> = vec![Vec::new(); depots.len()];
    if depots.is_empty() {
        return Ok(assignments);
    }

    for (pick_idx, &pick) in picks.iter().enumerate() {
        let mut nearest = 0;
        let mut nearest_dist = f64::INFINITY;
        for (depot_idx, &depot) in depots.iter().enumerate() {
            let d = oracle.cost(pick, depot)?;
            if d < nearest_dist {
                nearest_dist = d;
                nearest = depot_idx;
            }
        }
        assignments[nearest].push(pick_idx);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let empty: Vec<usize> = (0..depots.len()).filter(|&d| assignments[d].is_empty()).collect();
    for empty_idx in empty {
        let donors: Vec<usize> = (0..depots.len()).filter(|&d| assignments[d].len() > 1).collect();
        let Some(&donor) = donors.choose(&mut rng) else {
            break;
        };
        if let Some(pick) = assignments[donor].pop() {
            assignments[empty_idx].push(pick);
        }
    }
    Ok(assignments)
}

/// Parameters of one generated scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub map_type: MapType,
    pub width: usize,
    pub height: usize,
    /// Number of picks
    pub k: usize,
    pub seed: u64,
    /// One agent per depot
    pub num_depots: usize,
    pub one_way: bool,
}

impl Default for ScenarioSpec {
    fn default() -> Self {
        ScenarioSpec {
            map_type: MapType::Narrow,
            width: 20,
            height: 20,
            k: 10,
            seed: 0,
            num_depots: 1,
            one_way: false,
        }
    }
}

/// A generated warehouse instance.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub spec: ScenarioSpec,
    pub grid: Grid,
    pub depots: Vec<Cell>,
    pub picks: Vec<Cell>,
    /// Pick indices served by each depot
    pub assignments: Vec<Vec<usize>>,
}

impl Scenario {
    pub fn generate(spec: ScenarioSpec) -> Result<Scenario> {
        let grid = make_map(spec.map_type, spec.width, spec.height, spec.one_way)?;
        Scenario::on_grid(grid, spec)
    }

    /// Place depots and picks on an existing grid. Only `k`, `seed` and
    /// `num_depots` of the spec are used.
    pub fn on_grid(grid: Grid, spec: ScenarioSpec) -> Result<Scenario> {
        if spec.num_depots == 0 {
            return Err(Error::InvalidConfig("a scenario needs at least one depot".into()));
        }
        let region = grid.largest_component();
        let first = central_depot(&grid, &region)
            .ok_or_else(|| Error::InvalidConfig("map has no free cell".into()))?;

        let mut oracle = DistanceOracle::new(&grid);
        let depots = if spec.num_depots > 1 {
            spread_depots(&mut oracle, &region, first, spec.num_depots)
        } else {
            vec![first]
        };

        let mut available: Vec<Cell> = region.iter().copied().filter(|c| !depots.contains(c)).collect();
        available.sort_unstable();
        let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
        if available.len() < spec.k {
            log::warn!(
                "{} map has only {} free cells for {} picks",
                spec.map_type,
                available.len(),
                spec.k
            );
        }
        let picks: Vec<Cell> = available
            .choose_multiple(&mut rng, spec.k.min(available.len()))
            .copied()
            .collect();

        let assignments = if depots.len() == 1 {
            vec![(0..picks.len()).collect()]
        } else {
            assign_to_depots(&mut oracle, &depots, &picks, spec.seed)?
        };

        Ok(Scenario {
            spec,
            grid,
            depots,
            picks,
            assignments,
        })
    }

    /// Waypoints of one agent: its depot as node 0, then its picks.
    pub fn agent_nodes(&self, agent: usize) -> Vec<Cell> {
        let mut nodes = Vec::new();
        if let Some(&depot) = self.depots.get(agent) {
            nodes.push(depot);
            if let Some(assigned) = self.assignments.get(agent) {
                nodes.extend(assigned.iter().filter_map(|&p| self.picks.get(p).copied()));
            }
        }
        nodes
    }

    pub fn num_agents(&self) -> usize {
        self.depots.len()
    }
}
