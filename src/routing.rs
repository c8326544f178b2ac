//! Shortest-path search over the warehouse grid.
//!
//! Two searches share one best-first loop:
//! - A* with the Manhattan heuristic over legal unit-cost moves
//! - uniform-cost search with a caller-supplied step cost, used when step
//!   costs are asymmetric and the heuristic is no longer safe
//!
//! A third search, [`turn_aware_path`], runs over `(cell, heading)` states so
//! heading changes can be priced.
//!
//! Frontier entries are ordered by `(priority, discovery sequence)`, so equal
//! priorities always pop in the order they were discovered.

use crate::error::{Error, Result};
use crate::grid::{manhattan, Cell, Direction, Grid};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A routed path between two cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Accumulated step cost
    pub cost: f64,
    /// Cells from start to goal, both included
    pub cells: Vec<Cell>,
}

impl Route {
    /// Number of moves along the route.
    pub fn steps(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }

    /// Sum of heading changes along the route (quarter turn 1, reversal 2).
    pub fn turns(&self) -> u32 {
        count_turns(&self.cells)
    }

    /// Moves that go against a one-way restriction.
    pub fn violations(&self, grid: &Grid) -> usize {
        self.cells
            .windows(2)
            .filter(|w| !grid.direction_allowed(w[0], w[1]))
            .count()
    }

    /// The same route walked backwards.
    pub fn reversed(&self) -> Route {
        let mut cells = self.cells.clone();
        cells.reverse();
        Route { cost: self.cost, cells }
    }
}

/// Heading changes along a cell sequence.
pub fn count_turns(cells: &[Cell]) -> u32 {
    let headings: Vec<Direction> = cells
        .windows(2)
        .filter_map(|w| Direction::between(w[0], w[1]))
        .collect();
    headings.windows(2).map(|h| h[0].turn_cost(h[1])).sum()
}

/// A* shortest path using only legal moves, each costing 1.
pub fn shortest_path(grid: &Grid, start: Cell, goal: Cell) -> Result<Route> {
    best_first(
        grid,
        start,
        goal,
        |cell| manhattan(cell, goal) as f64,
        |_, _, legal| legal.then_some(1.0),
    )
}

/// Uniform-cost search with an arbitrary non-negative step cost.
///
/// `step_cost(from, to, legal)` is called for every free neighbor; `legal`
/// tells whether the move respects the one-way restrictions. Returning `None`
/// forbids the move outright.
pub fn uniform_cost_path<F>(grid: &Grid, start: Cell, goal: Cell, step_cost: F) -> Result<Route>
where
    F: Fn(Cell, Cell, bool) -> Option<f64>,
{
    best_first(grid, start, goal, |_| 0.0, step_cost)
}

/// Uniform-cost search over `(cell, heading)` states. Every move pays
/// `step_cost(from, to, legal)` plus `turn_weight` per quarter turn against
/// the previous move (a reversal counts two); the first move has no heading
/// to turn from. The returned route minimizes the combined cost.
pub fn turn_aware_path<F>(grid: &Grid, start: Cell, goal: Cell, turn_weight: f64, step_cost: F) -> Result<Route>
where
    F: Fn(Cell, Cell, bool) -> Option<f64>,
{
    grid.check_cell(start)?;
    grid.check_cell(goal)?;

    if start == goal {
        return Ok(Route {
            cost: 0.0,
            cells: vec![start],
        });
    }

    // Slots 0..4 follow Direction::ALL, the last one means "not moved yet"
    const SLOTS: usize = Direction::ALL.len() + 1;
    const UNMOVED: usize = SLOTS - 1;
    let width = grid.width();
    let state = |c: Cell, slot: usize| (c.1 * width + c.0) * SLOTS + slot;
    let size = width * grid.height() * SLOTS;

    let mut g_cost = vec![f64::INFINITY; size];
    let mut came_from: Vec<Option<(Cell, usize)>> = vec![None; size];
    let mut closed = vec![false; size];
    let mut open: BinaryHeap<Reverse<(OrderedFloat<f64>, u64, Cell, usize)>> = BinaryHeap::new();
    let mut sequence: u64 = 0;

    g_cost[state(start, UNMOVED)] = 0.0;
    open.push(Reverse((OrderedFloat(0.0), sequence, start, UNMOVED)));

    while let Some(Reverse((_, _, current, slot))) = open.pop() {
        let si = state(current, slot);
        if closed[si] {
            continue;
        }
        closed[si] = true;

        if current == goal {
            let mut cells = vec![goal];
            let mut at = (current, slot);
            while let Some(prev) = came_from[state(at.0, at.1)] {
                cells.push(prev.0);
                at = prev;
            }
            cells.reverse();
            return Ok(Route {
                cost: g_cost[si],
                cells,
            });
        }

        let heading = Direction::ALL.get(slot).copied();
        for (next, legal) in grid.neighbors(current) {
            let Some(dir) = Direction::between(current, next) else {
                continue;
            };
            let Some(next_slot) = Direction::ALL.iter().position(|&d| d == dir) else {
                continue;
            };
            let ni = state(next, next_slot);
            if closed[ni] {
                continue;
            }
            let Some(step) = step_cost(current, next, legal) else {
                continue;
            };
            let turns = heading.map_or(0, |h| h.turn_cost(dir));
            let tentative = g_cost[si] + step + turn_weight * turns as f64;
            if tentative < g_cost[ni] {
                g_cost[ni] = tentative;
                came_from[ni] = Some((current, slot));
                sequence += 1;
                open.push(Reverse((OrderedFloat(tentative), sequence, next, next_slot)));
            }
        }
    }

    Err(Error::NoPath { start, goal })
}

fn best_first<H, F>(grid: &Grid, start: Cell, goal: Cell, heuristic: H, step_cost: F) -> Result<Route>
where
    H: Fn(Cell) -> f64,
    F: Fn(Cell, Cell, bool) -> Option<f64>,
{
    grid.check_cell(start)?;
    grid.check_cell(goal)?;

    if start == goal {
        return Ok(Route {
            cost: 0.0,
            cells: vec![start],
        });
    }

    let width = grid.width();
    let index = |c: Cell| c.1 * width + c.0;
    let size = width * grid.height();

    let mut g_cost = vec![f64::INFINITY; size];
    let mut came_from: Vec<Option<Cell>> = vec![None; size];
    let mut closed = vec![false; size];
    let mut open: BinaryHeap<Reverse<(OrderedFloat<f64>, u64, Cell)>> = BinaryHeap::new();
    let mut sequence: u64 = 0;

    g_cost[index(start)] = 0.0;
    open.push(Reverse((OrderedFloat(heuristic(start)), sequence, start)));

    while let Some(Reverse((_, _, current))) = open.pop() {
        let ci = index(current);
        if closed[ci] {
            continue;
        }
        closed[ci] = true;

        if current == goal {
            return Ok(Route {
                cost: g_cost[ci],
                cells: reconstruct(&came_from, index, current),
            });
        }

        for (next, legal) in grid.neighbors(current) {
            let ni = index(next);
            if closed[ni] {
                continue;
            }
            let Some(step) = step_cost(current, next, legal) else {
                continue;
            };
            let tentative = g_cost[ci] + step;
            if tentative < g_cost[ni] {
                g_cost[ni] = tentative;
                came_from[ni] = Some(current);
                sequence += 1;
                open.push(Reverse((OrderedFloat(tentative + heuristic(next)), sequence, next)));
            }
        }
    }

    Err(Error::NoPath { start, goal })
}

fn reconstruct<I>(came_from: &[Option<Cell>], index: I, goal: Cell) -> Vec<Cell>
where
    I: Fn(Cell) -> usize,
{
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(prev) = came_from[index(current)] {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
