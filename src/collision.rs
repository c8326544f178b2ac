//! Discrete-event replay of several agent paths on one shared grid.
//!
//! Every grid cell is a mutually exclusive resource. Each step an agent
//! releases the cell it stands on and then requests the next cell of its
//! path; a request on an occupied cell queues the agent until the cell is
//! released. Waiters are served first-come first-served. Events run on an
//! integer tick clock ordered by `(tick, insertion sequence)`, and agents are
//! scheduled in input order at tick 0, so the replay is reproducible.
//!
//! An agent never holds a cell while it waits, so the replay cannot deadlock.

use crate::distance::DistanceOracle;
use crate::error::{Error, Result};
use crate::grid::{Cell, Grid};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, VecDeque};

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated seconds needed to traverse one cell
    pub step_time: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig { step_time: 0.2 }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.step_time > 0.0) {
            return Err(Error::InvalidConfig("simulation.step_time must be positive".into()));
        }
        Ok(())
    }
}

/// Cell sequence walked by one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPath {
    pub agent: usize,
    pub cells: Vec<Cell>,
}

impl AgentPath {
    pub fn new(agent: usize, cells: Vec<Cell>) -> Self {
        AgentPath { agent, cells }
    }
}

/// Congestion measured by one replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollisionRecord {
    /// Number of wait events
    pub total_collisions: usize,
    pub total_wait_time: f64,
    /// Mean duration of a wait event
    pub avg_wait_time: f64,
    pub max_wait_time: f64,
    /// Duration of every wait event, in occurrence order
    pub wait_events: Vec<f64>,
    /// Accumulated wait per agent id
    pub agent_wait_times: BTreeMap<usize, f64>,
    /// Contested cell of every wait event
    pub collision_locations: Vec<Cell>,
    /// Time the last agent finished
    pub makespan: f64,
    /// Longest individual path duration, ignoring other agents
    pub theoretical_makespan: f64,
}

impl CollisionRecord {
    /// Extra completion time caused by waiting.
    pub fn makespan_overhead(&self) -> f64 {
        self.makespan - self.theoretical_makespan
    }
}

#[derive(Debug)]
struct AgentState {
    next: usize,
    held: Option<Cell>,
    wait_since: Option<u64>,
    finished_at: Option<u64>,
}

/// Single-threaded event-queue simulator.
pub struct CollisionSimulator<'g> {
    grid: &'g Grid,
    config: SimulationConfig,
}

impl<'g> CollisionSimulator<'g> {
    pub fn new(grid: &'g Grid, config: SimulationConfig) -> Self {
        CollisionSimulator { grid, config }
    }

    pub fn run(&self, paths: &[AgentPath]) -> Result<CollisionRecord> {
        for path in paths {
            for &cell in &path.cells {
                self.grid.check_cell(cell)?;
            }
        }
        let mut replay = Replay::new(paths);
        replay.run();
        Ok(replay.into_record(paths, self.config.step_time))
    }
}

struct Replay<'p> {
    paths: &'p [AgentPath],
    agents: Vec<AgentState>,
    owner: HashMap<Cell, usize>,
    waiters: HashMap<Cell, VecDeque<usize>>,
    queue: BinaryHeap<Reverse<(u64, u64, usize)>>,
    sequence: u64,
    /// (agent slot, cell, wait ticks) per positive wait
    waits: Vec<(usize, Cell, u64)>,
}

impl<'p> Replay<'p> {
    fn new(paths: &'p [AgentPath]) -> Self {
        let agents = paths
            .iter()
            .map(|p| AgentState {
                next: 0,
                held: None,
                wait_since: None,
                finished_at: p.cells.is_empty().then_some(0),
            })
            .collect();
        let mut replay = Replay {
            paths,
            agents,
            owner: HashMap::new(),
            waiters: HashMap::new(),
            queue: BinaryHeap::new(),
            sequence: 0,
            waits: Vec::new(),
        };
        for (slot, path) in paths.iter().enumerate() {
            if !path.cells.is_empty() {
                replay.schedule(0, slot);
            }
        }
        replay
    }

    fn schedule(&mut self, tick: u64, slot: usize) {
        self.queue.push(Reverse((tick, self.sequence, slot)));
        self.sequence += 1;
    }

    fn run(&mut self) {
        while let Some(Reverse((tick, _, slot))) = self.queue.pop() {
            let mut grants = VecDeque::new();
            if let Some(cell) = self.agents[slot].held.take() {
                self.release(cell, &mut grants);
            }
            let cell = self.paths[slot].cells[self.agents[slot].next];
            if self.owner.contains_key(&cell) {
                self.agents[slot].wait_since = Some(tick);
                self.waiters.entry(cell).or_default().push_back(slot);
            } else {
                grants.push_back((slot, cell));
            }
            self.process_grants(tick, grants);
        }
    }

    /// Free `cell` and hand it to the first waiter, if any.
    fn release(&mut self, cell: Cell, grants: &mut VecDeque<(usize, Cell)>) {
        self.owner.remove(&cell);
        if let Some(waiter) = self.waiters.get_mut(&cell).and_then(VecDeque::pop_front) {
            // Reserve now so no later request at this tick can overtake
            self.owner.insert(cell, waiter);
            grants.push_back((waiter, cell));
        }
    }

    fn process_grants(&mut self, tick: u64, mut grants: VecDeque<(usize, Cell)>) {
        while let Some((slot, cell)) = grants.pop_front() {
            self.owner.insert(cell, slot);
            let agent = &mut self.agents[slot];
            agent.held = Some(cell);
            if let Some(since) = agent.wait_since.take() {
                if tick > since {
                    self.waits.push((slot, cell, tick - since));
                }
            }
            agent.next += 1;
            if agent.next == self.paths[slot].cells.len() {
                agent.finished_at = Some(tick);
                agent.held = None;
                self.release(cell, &mut grants);
            } else {
                self.schedule(tick + 1, slot);
            }
        }
    }

    fn into_record(self, paths: &[AgentPath], step_time: f64) -> CollisionRecord {
        let mut record = CollisionRecord::default();
        for path in paths {
            record.agent_wait_times.entry(path.agent).or_insert(0.0);
        }
        for &(slot, cell, ticks) in &self.waits {
            let wait = ticks as f64 * step_time;
            record.total_collisions += 1;
            record.total_wait_time += wait;
            record.max_wait_time = record.max_wait_time.max(wait);
            record.wait_events.push(wait);
            record.collision_locations.push(cell);
            *record.agent_wait_times.entry(paths[slot].agent).or_insert(0.0) += wait;
        }
        if record.total_collisions > 0 {
            record.avg_wait_time = record.total_wait_time / record.total_collisions as f64;
        }

        let last_tick = self
            .agents
            .iter()
            .filter_map(|a| a.finished_at)
            .max()
            .unwrap_or(0);
        record.makespan = last_tick as f64 * step_time;
        record.theoretical_makespan = paths
            .iter()
            .map(|p| p.cells.len().saturating_sub(1))
            .max()
            .unwrap_or(0) as f64
            * step_time;
        record
    }
}

/// Expand a tour into the cell sequence an agent walks: start node, the
/// visiting order, back to the start, each leg routed through the oracle.
pub fn tour_to_path(
    oracle: &mut DistanceOracle<'_>,
    nodes: &[Cell],
    start: usize,
    order: &[usize],
) -> Result<Vec<Cell>> {
    let stops: Vec<Cell> = std::iter::once(start)
        .chain(order.iter().copied())
        .chain(std::iter::once(start))
        .filter_map(|i| nodes.get(i).copied())
        .collect();
    if stops.len() != order.len() + 2 {
        return Err(Error::InvalidStart {
            start,
            nodes: nodes.len(),
        });
    }
    oracle.expand(&stops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridBuilder;

    fn corridor_grid() -> Grid {
        Grid::new(5, 1)
    }

    fn row(y: usize, xs: impl Iterator<Item = usize>) -> Vec<Cell> {
        xs.map(|x| (x, y)).collect()
    }

    #[test]
    fn test_head_on_corridor_waits() {
        let grid = corridor_grid();
        let paths = vec![
            AgentPath::new(0, row(0, 0..5)),
            AgentPath::new(1, row(0, (0..5).rev())),
        ];
        let record = CollisionSimulator::new(&grid, SimulationConfig::default())
            .run(&paths)
            .unwrap();
        assert!(record.total_collisions >= 1);
        assert!(record.total_wait_time > 0.0);
        assert!(record.makespan > record.theoretical_makespan);
        assert!((record.theoretical_makespan - 0.8).abs() < 1e-9);
        assert_eq!(record.collision_locations.len(), record.total_collisions);
    }

    #[test]
    fn test_disjoint_paths_no_overhead() {
        let grid = Grid::new(5, 3);
        let paths = vec![
            AgentPath::new(0, row(0, 0..5)),
            AgentPath::new(1, row(2, (0..5).rev())),
        ];
        let record = CollisionSimulator::new(&grid, SimulationConfig::default())
            .run(&paths)
            .unwrap();
        assert_eq!(record.total_collisions, 0);
        assert_eq!(record.makespan, record.theoretical_makespan);
        assert_eq!(record.makespan_overhead(), 0.0);
    }

    #[test]
    fn test_follower_has_no_wait() {
        // Agent 1 trails agent 0 by one cell; hand-offs happen at the same tick
        let grid = Grid::new(6, 1);
        let paths = vec![
            AgentPath::new(0, row(0, 1..6)),
            AgentPath::new(1, row(0, 0..5)),
        ];
        let record = CollisionSimulator::new(&grid, SimulationConfig::default())
            .run(&paths)
            .unwrap();
        assert_eq!(record.total_collisions, 0);
        assert_eq!(record.makespan, record.theoretical_makespan);
    }

    #[test]
    fn test_deterministic_replay() {
        let grid = Grid::new(4, 4);
        let paths = vec![
            AgentPath::new(3, vec![(0, 1), (1, 1), (2, 1), (3, 1)]),
            AgentPath::new(7, vec![(1, 0), (1, 1), (1, 2), (1, 3)]),
            AgentPath::new(9, vec![(2, 3), (2, 2), (2, 1), (2, 0)]),
        ];
        let sim = CollisionSimulator::new(&grid, SimulationConfig::default());
        let a = sim.run(&paths).unwrap();
        let b = sim.run(&paths).unwrap();
        assert_eq!(a.wait_events, b.wait_events);
        assert_eq!(a.collision_locations, b.collision_locations);
        assert_eq!(a.makespan, b.makespan);
        assert!(a.makespan >= a.theoretical_makespan);
        assert_eq!(a.agent_wait_times.len(), 3);
    }

    #[test]
    fn test_crossing_wait_goes_to_later_agent() {
        // Both agents reach (1, 1) at tick 1; the first listed agent wins
        let grid = Grid::new(3, 3);
        let paths = vec![
            AgentPath::new(0, vec![(0, 1), (1, 1), (2, 1)]),
            AgentPath::new(1, vec![(1, 0), (1, 1), (1, 2)]),
        ];
        let record = CollisionSimulator::new(&grid, SimulationConfig::default())
            .run(&paths)
            .unwrap();
        assert_eq!(record.total_collisions, 1);
        assert_eq!(record.agent_wait_times[&0], 0.0);
        assert!((record.agent_wait_times[&1] - 0.2).abs() < 1e-9);
        assert_eq!(record.collision_locations, vec![(1, 1)]);
        assert!((record.makespan - 0.6).abs() < 1e-9);
        assert!((record.max_wait_time - 0.2).abs() < 1e-9);
        assert!((record.avg_wait_time - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_empty_and_single_cell_paths() {
        let grid = Grid::new(2, 2);
        let paths = vec![AgentPath::new(0, vec![]), AgentPath::new(1, vec![(0, 0)])];
        let record = CollisionSimulator::new(&grid, SimulationConfig::default())
            .run(&paths)
            .unwrap();
        assert_eq!(record.makespan, 0.0);
        assert_eq!(record.total_collisions, 0);
    }

    #[test]
    fn test_blocked_cell_rejected() {
        let grid = GridBuilder::new(3, 1).block((1, 0)).build().unwrap();
        let paths = vec![AgentPath::new(0, row(0, 0..3))];
        let err = CollisionSimulator::new(&grid, SimulationConfig::default())
            .run(&paths)
            .unwrap_err();
        assert!(matches!(err, Error::CellBlocked { .. }));
    }

    #[test]
    fn test_tour_to_path() {
        let grid = Grid::new(3, 3);
        let mut oracle = DistanceOracle::new(&grid);
        let nodes = [(0, 0), (2, 0), (2, 2)];
        let path = tour_to_path(&mut oracle, &nodes, 0, &[1, 2]).unwrap();
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(0, 0)));
        assert_eq!(path.len(), 9);
        assert!(tour_to_path(&mut oracle, &nodes, 5, &[1]).is_err());
    }
}
