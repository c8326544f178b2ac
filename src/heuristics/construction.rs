use crate::distance::DistanceMatrix;
use crate::tour::Tour;
use std::time::Instant;

pub trait ConstructionHeuristic {
    fn construct(&self, matrix: &DistanceMatrix, start: usize) -> Tour;
    fn name(&self) -> &str;
}

/// Visit every node greedily from `from`, always moving to the closest
/// unvisited node (lowest index on ties). Returns the full node sequence
/// beginning with `from`.
pub fn nearest_neighbor_sequence(matrix: &DistanceMatrix, from: usize) -> Vec<usize> {
    let n = matrix.len();
    let mut visited = vec![false; n];
    let mut sequence = Vec::with_capacity(n);
    if from >= n {
        return sequence;
    }

    visited[from] = true;
    sequence.push(from);
    let mut current = from;

    while sequence.len() < n {
        let mut nearest = None;
        let mut nearest_dist = f64::INFINITY;
        for (node, &d) in matrix.row(current).iter().enumerate() {
            if !visited[node] && (nearest.is_none() || d < nearest_dist) {
                nearest = Some(node);
                nearest_dist = d;
            }
        }
        let Some(next) = nearest else { break };
        visited[next] = true;
        sequence.push(next);
        current = next;
    }
    sequence
}

/// Rotate a node cycle so that it begins at `start`, then drop `start`.
pub fn order_from_cycle(cycle: &[usize], start: usize) -> Vec<usize> {
    match cycle.iter().position(|&node| node == start) {
        Some(pos) => cycle[pos + 1..]
            .iter()
            .chain(&cycle[..pos])
            .copied()
            .collect(),
        None => cycle.to_vec(),
    }
}

/// Nearest Neighbor Heuristic
///
/// Builds a tour by repeatedly visiting the nearest unvisited node.
#[derive(Debug, Clone, Default)]
pub struct NearestNeighborHeuristic;

impl NearestNeighborHeuristic {
    pub fn new() -> Self {
        NearestNeighborHeuristic
    }
}

impl ConstructionHeuristic for NearestNeighborHeuristic {
    fn construct(&self, matrix: &DistanceMatrix, start: usize) -> Tour {
        let timer = Instant::now();
        let sequence = nearest_neighbor_sequence(matrix, start);
        let order = sequence.into_iter().skip(1).collect();
        let mut tour = Tour::from_order(matrix, start, order, self.name());
        tour.computation_time = timer.elapsed().as_secs_f64();
        tour
    }

    fn name(&self) -> &str {
        "astar-greedy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_matrix() -> DistanceMatrix {
        DistanceMatrix::from_rows(vec![
            vec![0.0, 5.0, 1.0, 9.0],
            vec![5.0, 0.0, 2.0, 1.0],
            vec![1.0, 2.0, 0.0, 7.0],
            vec![9.0, 1.0, 7.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_nearest_neighbor() {
        let m = create_test_matrix();
        let tour = NearestNeighborHeuristic::new().construct(&m, 0);
        assert_eq!(tour.order, vec![2, 1, 3]);
        assert_eq!(tour.cost, 1.0 + 2.0 + 1.0 + 9.0);
        assert!(tour.is_valid(4, 0));
    }

    #[test]
    fn test_ties_pick_lowest_index() {
        let m = DistanceMatrix::from_fn(4, |_, _| 1.0).unwrap();
        assert_eq!(nearest_neighbor_sequence(&m, 2), vec![2, 0, 1, 3]);
    }

    #[test]
    fn test_order_from_cycle() {
        assert_eq!(order_from_cycle(&[3, 1, 0, 2], 0), vec![2, 3, 1]);
        assert_eq!(order_from_cycle(&[0, 1, 2], 0), vec![1, 2]);
    }

    #[test]
    fn test_single_node() {
        let m = DistanceMatrix::from_rows(vec![vec![0.0]]).unwrap();
        let tour = NearestNeighborHeuristic::new().construct(&m, 0);
        assert!(tour.order.is_empty());
        assert_eq!(tour.cost, 0.0);
    }
}
