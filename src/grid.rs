//! Warehouse occupancy grid.
//!
//! A 4-connected grid of free and blocked cells. Some adjacent pairs may be
//! declared one-way: the declared direction stays traversable while the
//! reverse move is flagged as illegal. The grid is immutable once built.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::Path;

/// Grid coordinate as `(x, y)`.
pub type Cell = (usize, usize);

/// Axis-aligned move direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    East,
    West,
    South,
    North,
}

impl Direction {
    /// Expansion order used everywhere a deterministic neighbor order matters.
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::West,
        Direction::South,
        Direction::North,
    ];

    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::South => (0, 1),
            Direction::North => (0, -1),
        }
    }

    /// Direction of a single step from `from` to `to`, if they are adjacent.
    pub fn between(from: Cell, to: Cell) -> Option<Direction> {
        let dx = to.0 as isize - from.0 as isize;
        let dy = to.1 as isize - from.1 as isize;
        Direction::ALL.into_iter().find(|d| d.delta() == (dx, dy))
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::South => Direction::North,
            Direction::North => Direction::South,
        }
    }

    /// Turn cost between two consecutive headings: 0 straight, 1 for a
    /// quarter turn, 2 for a reversal.
    pub fn turn_cost(self, next: Direction) -> u32 {
        if self == next {
            0
        } else if self.opposite() == next {
            2
        } else {
            1
        }
    }
}

/// Manhattan distance between two cells.
#[inline]
pub fn manhattan(a: Cell, b: Cell) -> usize {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1)
}

/// Immutable warehouse grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    height: usize,
    /// Row-major blocked flags (`y * width + x`)
    blocked: Vec<bool>,
    /// Declared one-way edges, stored in their allowed direction
    one_way: HashSet<(Cell, Cell)>,
}

impl Grid {
    /// An obstacle-free grid.
    pub fn new(width: usize, height: usize) -> Self {
        Grid {
            width,
            height,
            blocked: vec![false; width * height],
            one_way: HashSet::new(),
        }
    }

    /// Build a grid from a set of blocked coordinates.
    pub fn with_obstacles<I>(width: usize, height: usize, obstacles: I) -> Result<Self>
    where
        I: IntoIterator<Item = Cell>,
    {
        let mut builder = GridBuilder::new(width, height);
        for cell in obstacles {
            builder = builder.block(cell);
        }
        builder.build()
    }

    /// Parse an ASCII map: `.` is free, `@`, `#`, `T` and `O` are blocked.
    /// Every non-empty line is one row; all rows must have the same width.
    pub fn from_ascii(text: &str) -> Result<Self> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        Self::from_rows(&rows)
    }

    /// Load a MovingAI `.map` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_movingai(&text)
    }

    /// Parse MovingAI map text: `type`, `height`, `width` and `map` header
    /// lines followed by exactly `height` rows of `width` tiles.
    pub fn from_movingai(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let mut height = None;
        let mut width = None;
        let mut saw_map = false;

        for line in lines.by_ref() {
            let line = line.trim();
            if line == "map" {
                saw_map = true;
                break;
            }
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("height"), Some(v)) => {
                    height = Some(v.parse::<usize>().map_err(|_| Error::MapParse(format!("bad height: {v}")))?)
                }
                (Some("width"), Some(v)) => {
                    width = Some(v.parse::<usize>().map_err(|_| Error::MapParse(format!("bad width: {v}")))?)
                }
                _ => {}
            }
        }

        let height = height.ok_or_else(|| Error::MapParse("missing height".into()))?;
        let width = width.ok_or_else(|| Error::MapParse("missing width".into()))?;
        if !saw_map {
            return Err(Error::MapParse("missing map section".into()));
        }

        let rows: Vec<&str> = lines.take(height).map(str::trim_end).collect();
        let grid = Self::from_rows(&rows)?;

        if grid.width != width || grid.height != height {
            return Err(Error::MapParse(format!(
                "header says {}x{}, rows give {}x{}",
                width, height, grid.width, grid.height
            )));
        }
        Ok(grid)
    }

    fn from_rows(rows: &[&str]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        let mut builder = GridBuilder::new(width, height);

        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(Error::MapParse(format!(
                    "row {} has width {}, expected {}",
                    y,
                    row.chars().count(),
                    width
                )));
            }
            for (x, ch) in row.chars().enumerate() {
                match ch {
                    '.' | 'G' | 'S' => {}
                    '@' | '#' | 'T' | 'O' | 'W' => builder = builder.block((x, y)),
                    other => return Err(Error::MapParse(format!("unexpected tile '{other}' at ({x}, {y})"))),
                }
            }
        }
        builder.build()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.0 < self.width && cell.1 < self.height
    }

    #[inline]
    pub fn is_free(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && !self.blocked[cell.1 * self.width + cell.0]
    }

    /// Check that `cell` is inside the grid and not blocked.
    pub fn check_cell(&self, cell: Cell) -> Result<()> {
        if !self.in_bounds(cell) {
            return Err(Error::CellOutOfBounds {
                cell,
                width: self.width,
                height: self.height,
            });
        }
        if !self.is_free(cell) {
            return Err(Error::CellBlocked { cell });
        }
        Ok(())
    }

    /// Whether the grid declares any one-way edge.
    pub fn has_one_way(&self) -> bool {
        !self.one_way.is_empty()
    }

    /// Whether the move `from -> to` respects the one-way restrictions.
    /// Does not check adjacency or occupancy.
    #[inline]
    pub fn direction_allowed(&self, from: Cell, to: Cell) -> bool {
        !self.one_way.contains(&(to, from)) || self.one_way.contains(&(from, to))
    }

    /// Free adjacent cells in `Direction::ALL` order, each flagged with
    /// whether the move is legal under the one-way restrictions.
    pub fn neighbors(&self, cell: Cell) -> Vec<(Cell, bool)> {
        let mut result = Vec::with_capacity(4);
        for dir in Direction::ALL {
            if let Some(next) = self.step(cell, dir) {
                if self.is_free(next) {
                    result.push((next, self.direction_allowed(cell, next)));
                }
            }
        }
        result
    }

    /// Neighbors reachable by a legal move.
    pub fn traversable_neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        self.neighbors(cell)
            .into_iter()
            .filter_map(|(c, ok)| ok.then_some(c))
    }

    fn step(&self, cell: Cell, dir: Direction) -> Option<Cell> {
        let (dx, dy) = dir.delta();
        let x = cell.0.checked_add_signed(dx)?;
        let y = cell.1.checked_add_signed(dy)?;
        self.in_bounds((x, y)).then_some((x, y))
    }

    /// All free cells in row-major order.
    pub fn free_cells(&self) -> Vec<Cell> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter(|&c| self.is_free(c))
            .collect()
    }

    pub fn num_free(&self) -> usize {
        self.blocked.iter().filter(|b| !**b).count()
    }

    /// Free cells connected to `start`, ignoring one-way restrictions.
    pub fn component_of(&self, start: Cell) -> HashSet<Cell> {
        let mut seen = HashSet::new();
        if !self.is_free(start) {
            return seen;
        }
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some(current) = queue.pop_front() {
            for (next, _) in self.neighbors(current) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    /// The largest connected set of free cells, ties going to the component
    /// found first in row-major order.
    pub fn largest_component(&self) -> HashSet<Cell> {
        let mut visited: HashSet<Cell> = HashSet::new();
        let mut best = HashSet::new();
        for cell in self.free_cells() {
            if visited.contains(&cell) {
                continue;
            }
            let component = self.component_of(cell);
            visited.extend(component.iter().copied());
            if component.len() > best.len() {
                best = component;
            }
        }
        best
    }

    /// Render as ASCII, one row per line.
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(if self.is_free((x, y)) { '.' } else { '@' });
            }
            out.push('\n');
        }
        out
    }
}

/// Incremental grid construction with bounds validation at `build`.
#[derive(Debug, Clone)]
pub struct GridBuilder {
    width: usize,
    height: usize,
    blocked: HashSet<Cell>,
    one_way: Vec<(Cell, Cell)>,
}

impl GridBuilder {
    pub fn new(width: usize, height: usize) -> Self {
        GridBuilder {
            width,
            height,
            blocked: HashSet::new(),
            one_way: Vec::new(),
        }
    }

    pub fn block(mut self, cell: Cell) -> Self {
        self.blocked.insert(cell);
        self
    }

    /// Block the inclusive rectangle, clipped to the grid.
    pub fn block_rect(mut self, x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        for x in x0..=x1.min(self.width.saturating_sub(1)) {
            for y in y0..=y1.min(self.height.saturating_sub(1)) {
                self.blocked.insert((x, y));
            }
        }
        self
    }

    pub fn unblock(mut self, cell: Cell) -> Self {
        self.blocked.remove(&cell);
        self
    }

    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.blocked.contains(&cell)
    }

    /// Restrict the edge between two adjacent cells to `from -> to`.
    pub fn one_way(mut self, from: Cell, to: Cell) -> Self {
        self.one_way.push((from, to));
        self
    }

    pub fn build(self) -> Result<Grid> {
        let (width, height) = (self.width, self.height);
        let mut blocked = vec![false; width * height];

        for &cell in &self.blocked {
            if cell.0 >= width || cell.1 >= height {
                return Err(Error::CellOutOfBounds { cell, width, height });
            }
            blocked[cell.1 * width + cell.0] = true;
        }

        let mut one_way = HashSet::new();
        for (from, to) in self.one_way {
            for cell in [from, to] {
                if cell.0 >= width || cell.1 >= height {
                    return Err(Error::CellOutOfBounds { cell, width, height });
                }
            }
            if Direction::between(from, to).is_none() {
                return Err(Error::InvalidOneWay { from, to });
            }
            one_way.insert((from, to));
        }

        Ok(Grid {
            width,
            height,
            blocked,
            one_way,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_grid_neighbors() {
        let grid = Grid::new(3, 3);
        let corner: Vec<Cell> = grid.traversable_neighbors((0, 0)).collect();
        assert_eq!(corner, vec![(1, 0), (0, 1)]);
        assert_eq!(grid.neighbors((1, 1)).len(), 4);
    }

    #[test]
    fn test_blocked_cells_are_skipped() {
        let grid = Grid::with_obstacles(3, 3, [(1, 0), (0, 1)]).unwrap();
        assert!(!grid.is_free((1, 0)));
        assert!(grid.neighbors((0, 0)).is_empty());
    }

    #[test]
    fn test_out_of_bounds_obstacle_rejected() {
        let err = Grid::with_obstacles(3, 3, [(3, 0)]).unwrap_err();
        assert!(matches!(err, Error::CellOutOfBounds { .. }));
    }

    #[test]
    fn test_one_way_edge() {
        let grid = GridBuilder::new(3, 1).one_way((0, 0), (1, 0)).build().unwrap();
        assert!(grid.direction_allowed((0, 0), (1, 0)));
        assert!(!grid.direction_allowed((1, 0), (0, 0)));
        // The restricted move is still listed, just flagged as illegal
        let from_mid = grid.neighbors((1, 0));
        assert!(from_mid.contains(&((0, 0), false)));
        assert!(from_mid.contains(&((2, 0), true)));
        assert!(grid.has_one_way());
    }

    #[test]
    fn test_one_way_requires_adjacency() {
        let err = GridBuilder::new(3, 3).one_way((0, 0), (2, 2)).build().unwrap_err();
        assert!(matches!(err, Error::InvalidOneWay { .. }));
    }

    #[test]
    fn test_from_ascii() {
        let grid = Grid::from_ascii(
            "
            ...
            .@.
            ...
            "
            .lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
            .as_str(),
        )
        .unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 3);
        assert!(!grid.is_free((1, 1)));
        assert_eq!(grid.num_free(), 8);
        assert_eq!(grid.to_ascii(), "...\n.@.\n...\n");
    }

    #[test]
    fn test_from_ascii_ragged_rows() {
        assert!(matches!(Grid::from_ascii("...\n..\n"), Err(Error::MapParse(_))));
    }

    const MOVINGAI_MAP: &str = "type octile\nheight 3\nwidth 4\nmap\n..@.\n.T..\n....\n";

    #[test]
    fn test_from_movingai() {
        let grid = Grid::from_movingai(MOVINGAI_MAP).unwrap();
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 3);
        assert!(!grid.is_free((2, 0)));
        assert!(!grid.is_free((1, 1)));
        assert!(grid.is_free((3, 2)));
        assert_eq!(grid.num_free(), 10);
    }

    #[test]
    fn test_from_movingai_malformed_header() {
        let bad_height = "type octile\nheight x\nwidth 4\nmap\n....\n";
        assert!(matches!(Grid::from_movingai(bad_height), Err(Error::MapParse(_))));

        let no_width = "type octile\nheight 1\nmap\n....\n";
        assert!(matches!(Grid::from_movingai(no_width), Err(Error::MapParse(_))));

        let no_map = "type octile\nheight 1\nwidth 4\n....\n";
        assert!(matches!(Grid::from_movingai(no_map), Err(Error::MapParse(_))));

        let wrong_size = "type octile\nheight 2\nwidth 4\nmap\n....\n";
        assert!(matches!(Grid::from_movingai(wrong_size), Err(Error::MapParse(_))));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("wtb-grid-{}.map", std::process::id()));
        fs::write(&path, MOVINGAI_MAP).unwrap();
        let loaded = Grid::from_file(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded.unwrap().to_ascii(), "..@.\n.@..\n....\n");

        let missing = std::env::temp_dir().join("wtb-grid-does-not-exist.map");
        assert!(matches!(Grid::from_file(missing), Err(Error::Io(_))));
    }

    #[test]
    fn test_largest_component() {
        let grid = Grid::from_ascii("..@...\n..@...\n").unwrap();
        let component = grid.largest_component();
        assert_eq!(component.len(), 6);
        assert!(component.contains(&(5, 1)));
        assert!(!component.contains(&(0, 0)));
    }

    #[test]
    fn test_turn_cost() {
        assert_eq!(Direction::East.turn_cost(Direction::East), 0);
        assert_eq!(Direction::East.turn_cost(Direction::North), 1);
        assert_eq!(Direction::East.turn_cost(Direction::West), 2);
        assert_eq!(Direction::between((1, 1), (1, 0)), Some(Direction::North));
        assert_eq!(Direction::between((1, 1), (2, 2)), None);
    }
}
