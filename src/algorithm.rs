//! Algorithm registry.
//!
//! Every tour algorithm is reachable through one call,
//! [`plan`]`(algorithm, matrix, start, seed, params)`, which validates the
//! start index, runs the algorithm on a fresh run-local state and stamps the
//! result with the registry identifier and wall-clock planning time.

use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};
use crate::exact::{ExactConfig, HeldKarp};
use crate::heuristics::{
    ACOConfig, ALOConfig, AntColonyOptimization, AntLionOptimization, ConstructionHeuristic,
    GAConfig, GeneticAlgorithm, HybridConfig, HybridNnTwoOpt, NearestNeighborHeuristic, NnTwoOpt,
    TwoOptConfig,
};
use crate::tour::Tour;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

/// Registered tour algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    /// Bitmask dynamic programming, optimal
    Exact,
    /// Nearest neighbor on routed distances, no improvement
    AstarGreedy,
    /// Nearest neighbor followed by 2-opt
    NnTwoOpt,
    /// Several nearest-neighbor seeds, each improved by 2-opt
    HybridNnTwoOpt,
    Genetic,
    AntColony,
    AntLion,
}

impl Algorithm {
    pub const ALL: [Algorithm; 7] = [
        Algorithm::Exact,
        Algorithm::AstarGreedy,
        Algorithm::NnTwoOpt,
        Algorithm::HybridNnTwoOpt,
        Algorithm::Genetic,
        Algorithm::AntColony,
        Algorithm::AntLion,
    ];

    /// Canonical identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Exact => "exact",
            Algorithm::AstarGreedy => "astar-greedy",
            Algorithm::NnTwoOpt => "nn-2opt",
            Algorithm::HybridNnTwoOpt => "hybrid-nn-2opt",
            Algorithm::Genetic => "genetic",
            Algorithm::AntColony => "aco",
            Algorithm::AntLion => "alo",
        }
    }

    /// Whether the result depends on the random seed.
    pub fn is_stochastic(self) -> bool {
        matches!(self, Algorithm::Genetic | Algorithm::AntColony | Algorithm::AntLion)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        let algorithm = match key.as_str() {
            "exact" | "held-karp" | "dp" => Algorithm::Exact,
            "astar-greedy" | "astar" | "greedy" | "nn" => Algorithm::AstarGreedy,
            "nn-2opt" | "nn2opt" => Algorithm::NnTwoOpt,
            "hybrid-nn-2opt" | "hybrid-nn2opt" | "hybrid" => Algorithm::HybridNnTwoOpt,
            "genetic" | "ga" => Algorithm::Genetic,
            "aco" | "ant-colony" => Algorithm::AntColony,
            "alo" | "ant-lion" => Algorithm::AntLion,
            _ => return Err(Error::UnsupportedAlgorithm(s.to_string())),
        };
        Ok(algorithm)
    }
}

impl TryFrom<String> for Algorithm {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Algorithm> for String {
    fn from(value: Algorithm) -> Self {
        value.as_str().to_string()
    }
}

/// Per-algorithm parameters. Any subset may be given in a JSON file; the
/// rest keeps its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmParams {
    pub two_opt: TwoOptConfig,
    pub hybrid: HybridConfig,
    pub exact: ExactConfig,
    pub genetic: GAConfig,
    pub aco: ACOConfig,
    pub ant_lion: ALOConfig,
}

impl AlgorithmParams {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let params: AlgorithmParams = serde_json::from_str(&text)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        self.two_opt.validate()?;
        self.hybrid.validate()?;
        self.exact.validate()?;
        self.genetic.validate()?;
        self.aco.validate()?;
        self.ant_lion.validate()
    }
}

/// Plan a tour with `algorithm` over a shared, read-only matrix.
pub fn plan(
    algorithm: Algorithm,
    matrix: &DistanceMatrix,
    start: usize,
    seed: u64,
    params: &AlgorithmParams,
) -> Result<Tour> {
    if start >= matrix.len() {
        return Err(Error::InvalidStart {
            start,
            nodes: matrix.len(),
        });
    }
    params.validate()?;

    let timer = Instant::now();
    let mut tour = match algorithm {
        Algorithm::Exact => HeldKarp::new(params.exact.clone()).solve(matrix, start)?,
        Algorithm::AstarGreedy => NearestNeighborHeuristic::new().construct(matrix, start),
        Algorithm::NnTwoOpt => NnTwoOpt::new(params.two_opt.clone()).solve(matrix, start),
        Algorithm::HybridNnTwoOpt => HybridNnTwoOpt::new(params.hybrid.clone()).solve(matrix, start),
        Algorithm::Genetic => {
            let config = GAConfig {
                seed,
                ..params.genetic.clone()
            };
            GeneticAlgorithm::new(matrix, start, config).run()
        }
        Algorithm::AntColony => {
            let config = ACOConfig {
                seed,
                ..params.aco.clone()
            };
            AntColonyOptimization::new(matrix, start, config).run()
        }
        Algorithm::AntLion => {
            let config = ALOConfig {
                seed,
                ..params.ant_lion.clone()
            };
            AntLionOptimization::new(matrix, start, config).run()
        }
    };

    tour.algorithm = algorithm.as_str().to_string();
    tour.computation_time = timer.elapsed().as_secs_f64();
    Ok(tour)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceOracle;
    use crate::grid::{Grid, GridBuilder};

    fn create_test_matrix() -> DistanceMatrix {
        let grid = GridBuilder::new(8, 8).block_rect(3, 0, 3, 5).build().unwrap();
        let nodes = [(0, 0), (6, 1), (2, 7), (7, 7), (5, 4), (1, 3), (4, 6)];
        DistanceOracle::new(&grid).build(&nodes).unwrap()
    }

    #[test]
    fn test_identifier_round_trip() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.as_str().parse::<Algorithm>().unwrap(), algorithm);
        }
        assert_eq!("GA".parse::<Algorithm>().unwrap(), Algorithm::Genetic);
        assert_eq!("nn_2opt".parse::<Algorithm>().unwrap(), Algorithm::NnTwoOpt);
    }

    #[test]
    fn test_unsupported_identifier() {
        let err = "simulated-annealing".parse::<Algorithm>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(ref name) if name == "simulated-annealing"));
    }

    #[test]
    fn test_every_algorithm_valid_and_consistent() {
        let m = create_test_matrix();
        let params = AlgorithmParams::default();
        let optimum = plan(Algorithm::Exact, &m, 0, 0, &params).unwrap().cost;
        for algorithm in Algorithm::ALL {
            let tour = plan(algorithm, &m, 0, 42, &params).unwrap();
            assert!(tour.is_valid(m.len(), 0), "{algorithm} returned an invalid order");
            assert!(tour.cost_matches(&m, 0), "{algorithm} cost mismatch");
            assert!(tour.cost >= optimum - 1e-9);
            assert_eq!(tour.algorithm, algorithm.as_str());
        }
    }

    #[test]
    fn test_degenerate_inputs_never_fail() {
        let params = AlgorithmParams::default();
        let depot_only = DistanceMatrix::from_rows(vec![vec![0.0]]).unwrap();
        let one_pick = DistanceMatrix::from_rows(vec![vec![0.0, 3.0], vec![3.0, 0.0]]).unwrap();
        for algorithm in Algorithm::ALL {
            let tour = plan(algorithm, &depot_only, 0, 1, &params).unwrap();
            assert!(tour.order.is_empty());
            assert_eq!(tour.cost, 0.0);

            let tour = plan(algorithm, &one_pick, 0, 1, &params).unwrap();
            assert_eq!(tour.order, vec![1]);
            assert_eq!(tour.cost, 6.0);
        }
    }

    #[test]
    fn test_invalid_start() {
        let m = create_test_matrix();
        let err = plan(Algorithm::NnTwoOpt, &m, 99, 0, &AlgorithmParams::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidStart { start: 99, .. }));
    }

    #[test]
    fn test_concrete_open_grid_scenario() {
        let grid = Grid::new(5, 5);
        let m = DistanceOracle::new(&grid)
            .build(&[(0, 0), (4, 4), (0, 4), (4, 0)])
            .unwrap();
        let tour = plan(Algorithm::Exact, &m, 0, 0, &AlgorithmParams::default()).unwrap();
        assert_eq!(tour.cost, 16.0);
    }

    #[test]
    fn test_params_partial_json() {
        let params: AlgorithmParams =
            serde_json::from_str(r#"{ "genetic": { "population_size": 10 }, "aco": { "num_ants": 3 } }"#).unwrap();
        assert_eq!(params.genetic.population_size, 10);
        assert_eq!(params.genetic.max_generations, 200);
        assert_eq!(params.aco.num_ants, 3);
        assert_eq!(params.exact.max_nodes, 18);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_validation_rejects_bad_values() {
        let mut params = AlgorithmParams::default();
        params.aco.evaporation_rate = 0.0;
        assert!(matches!(params.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_plan_rejects_invalid_params() {
        let m = create_test_matrix();
        let mut params = AlgorithmParams::default();
        params.genetic.population_size = 0;
        let err = plan(Algorithm::Genetic, &m, 0, 0, &params).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_plan_with_unbounded_two_opt_budget() {
        let m = create_test_matrix();
        let mut params = AlgorithmParams::default();
        params.two_opt.max_time = 1e20;
        params.hybrid.max_time = 1e20;
        assert!(params.validate().is_ok());
        for algorithm in [Algorithm::NnTwoOpt, Algorithm::HybridNnTwoOpt] {
            let tour = plan(algorithm, &m, 0, 0, &params).unwrap();
            assert!(tour.is_valid(m.len(), 0));
        }
    }

    #[test]
    fn test_algorithm_serde() {
        let json = serde_json::to_string(&Algorithm::HybridNnTwoOpt).unwrap();
        assert_eq!(json, "\"hybrid-nn-2opt\"");
        assert!(serde_json::from_str::<Algorithm>("\"bogus\"").is_err());
    }
}
