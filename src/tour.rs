//! Tour representation.
//!
//! A tour is a visiting order over node indices that leaves out the start
//! node; the start is the implicit first and last stop.

use crate::distance::DistanceMatrix;
use serde::{Deserialize, Serialize};

/// Result of one planning call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
    /// Visiting order, start node excluded
    pub order: Vec<usize>,
    /// Closed-tour cost under the distance matrix
    pub cost: f64,
    /// Algorithm that produced this tour
    pub algorithm: String,
    /// Wall-clock planning time in seconds
    pub computation_time: f64,
    /// Iterations, generations or accepted swaps, depending on the algorithm
    pub iterations: usize,
    /// Cost of the construction tour before improvement, when there is one
    pub initial_cost: Option<f64>,
    /// Best cost after each iteration
    pub history: Vec<f64>,
}

impl Tour {
    /// Evaluate `order` against the matrix.
    pub fn from_order(matrix: &DistanceMatrix, start: usize, order: Vec<usize>, algorithm: &str) -> Self {
        let cost = matrix.tour_cost(start, &order);
        Tour {
            order,
            cost,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            iterations: 0,
            initial_cost: None,
            history: Vec::new(),
        }
    }

    /// The only possible tour when at most one node besides the start exists.
    pub fn trivial(matrix: &DistanceMatrix, start: usize, algorithm: &str) -> Self {
        let order = (0..matrix.len()).filter(|&i| i != start).collect();
        Self::from_order(matrix, start, order, algorithm)
    }

    /// Order with the start node at both ends.
    pub fn closed(&self, start: usize) -> Vec<usize> {
        let mut nodes = Vec::with_capacity(self.order.len() + 2);
        nodes.push(start);
        nodes.extend_from_slice(&self.order);
        nodes.push(start);
        nodes
    }

    /// Relative improvement of `cost` over `initial_cost`, in percent.
    pub fn improvement_pct(&self) -> Option<f64> {
        self.initial_cost
            .filter(|&initial| initial > 0.0)
            .map(|initial| (initial - self.cost) / initial * 100.0)
    }

    /// Whether `order` visits every non-start node exactly once.
    pub fn is_valid(&self, num_nodes: usize, start: usize) -> bool {
        is_permutation(&self.order, num_nodes, start)
    }

    /// Whether the stored cost matches the matrix.
    pub fn cost_matches(&self, matrix: &DistanceMatrix, start: usize) -> bool {
        (matrix.tour_cost(start, &self.order) - self.cost).abs() <= 1e-6 * self.cost.max(1.0)
    }
}

/// Whether `order` is a permutation of `0..num_nodes` without `start`.
pub fn is_permutation(order: &[usize], num_nodes: usize, start: usize) -> bool {
    if order.len() + 1 != num_nodes.max(1) {
        return false;
    }
    let mut seen = vec![false; num_nodes];
    for &node in order {
        if node >= num_nodes || node == start || seen[node] {
            return false;
        }
        seen[node] = true;
    }
    true
}

/// Every node except `start`, in index order.
pub fn waypoints(num_nodes: usize, start: usize) -> Vec<usize> {
    (0..num_nodes).filter(|&i| i != start).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_matrix() -> DistanceMatrix {
        DistanceMatrix::from_rows(vec![
            vec![0.0, 1.0, 2.0],
            vec![1.0, 0.0, 1.5],
            vec![2.0, 1.5, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_from_order() {
        let m = create_test_matrix();
        let tour = Tour::from_order(&m, 0, vec![1, 2], "test");
        assert_eq!(tour.cost, 4.5);
        assert_eq!(tour.closed(0), vec![0, 1, 2, 0]);
        assert!(tour.is_valid(3, 0));
        assert!(tour.cost_matches(&m, 0));
    }

    #[test]
    fn test_trivial() {
        let single = DistanceMatrix::from_rows(vec![vec![0.0]]).unwrap();
        let tour = Tour::trivial(&single, 0, "test");
        assert!(tour.order.is_empty());
        assert_eq!(tour.cost, 0.0);
        assert!(tour.is_valid(1, 0));

        let pair = DistanceMatrix::from_rows(vec![vec![0.0, 3.0], vec![2.0, 0.0]]).unwrap();
        let tour = Tour::trivial(&pair, 1, "test");
        assert_eq!(tour.order, vec![0]);
        assert_eq!(tour.cost, 5.0);
    }

    #[test]
    fn test_is_permutation() {
        assert!(is_permutation(&[2, 1], 3, 0));
        assert!(!is_permutation(&[2, 2], 3, 0));
        assert!(!is_permutation(&[0, 1], 3, 0));
        assert!(!is_permutation(&[1], 3, 0));
        assert!(is_permutation(&[], 0, 0));
    }

    #[test]
    fn test_improvement_pct() {
        let m = create_test_matrix();
        let mut tour = Tour::from_order(&m, 0, vec![1, 2], "test");
        assert_eq!(tour.improvement_pct(), None);
        tour.initial_cost = Some(9.0);
        assert_eq!(tour.improvement_pct(), Some(50.0));
    }
}
