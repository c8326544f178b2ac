//! Benchmarking and experimentation module.
//!
//! Generates warehouse scenarios, plans every configured algorithm on the
//! same distance matrices, replays multi-agent plans through the collision
//! simulator, and collects records, statistics and reports.

use crate::algorithm::{plan, Algorithm, AlgorithmParams};
use crate::collision::{tour_to_path, AgentPath, CollisionRecord, CollisionSimulator, SimulationConfig};
use crate::distance::{AisleWidthEstimate, DistanceMatrix, DistanceOracle, Weighting};
use crate::error::{Error, Result};
use crate::grid::Cell;
use crate::scenario::{MapType, Scenario, ScenarioSpec};
use crate::tour::Tour;

use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Result of running one algorithm on one scenario.
///
/// Single-agent scenarios carry one order; multi-agent scenarios carry one
/// order per agent, summed costs and the collision figures of the joint replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub algorithm: String,
    pub map_type: MapType,
    pub k: usize,
    pub seed: u64,
    pub num_agents: usize,
    /// Visiting order per agent, indices into that agent's node list
    #[serde(with = "orders_column")]
    pub orders: Vec<Vec<usize>>,
    /// Sum of agent tour costs
    pub cost: f64,
    /// Wall-clock planning time in seconds, summed over agents
    pub planning_time: f64,
    pub iterations: usize,
    /// Nearest-neighbor cost before improvement
    pub initial_cost: Option<f64>,
    pub improvement_pct: Option<f64>,
    pub collisions: Option<usize>,
    pub total_wait_time: Option<f64>,
    pub avg_wait_time: Option<f64>,
    pub max_wait_time: Option<f64>,
    pub makespan: Option<f64>,
    pub theoretical_makespan: Option<f64>,
}

impl PlanRecord {
    pub fn scenario_label(&self) -> String {
        format!("{}-k{}-s{}", self.map_type, self.k, self.seed)
    }

    fn set_collisions(&mut self, collisions: &CollisionRecord) {
        self.collisions = Some(collisions.total_collisions);
        self.total_wait_time = Some(collisions.total_wait_time);
        self.avg_wait_time = Some(collisions.avg_wait_time);
        self.max_wait_time = Some(collisions.max_wait_time);
        self.makespan = Some(collisions.makespan);
        self.theoretical_makespan = Some(collisions.theoretical_makespan);
    }
}

/// Orders are written as one CSV cell: agents separated by `|`, nodes by spaces.
mod orders_column {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(orders: &[Vec<usize>], serializer: S) -> Result<S::Ok, S::Error> {
        let text = orders
            .iter()
            .map(|order| order.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("|");
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<usize>>, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.split('|')
            .map(|agent| {
                agent
                    .split_whitespace()
                    .map(|i| i.parse::<usize>().map_err(D::Error::custom))
                    .collect()
            })
            .collect()
    }
}

/// A planning run that produced no record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRun {
    pub scenario: String,
    /// `None` when the whole scenario failed
    pub algorithm: Option<String>,
    pub reason: String,
}

/// Aggregated statistics for an algorithm, over successful records only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmStatistics {
    pub algorithm: String,
    pub num_records: usize,
    pub avg_cost: f64,
    pub std_cost: f64,
    pub best_cost: f64,
    pub worst_cost: f64,
    pub avg_time: f64,
    pub std_time: f64,
    pub total_time: f64,
    pub avg_improvement_pct: Option<f64>,
    pub avg_collisions: Option<f64>,
    pub avg_makespan: Option<f64>,
}

/// Benchmark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub map_types: Vec<MapType>,
    /// Pick counts
    pub ks: Vec<usize>,
    pub seeds: Vec<u64>,
    pub algorithms: Vec<Algorithm>,
    pub width: usize,
    pub height: usize,
    /// One agent per depot
    pub num_depots: usize,
    pub one_way: bool,
    /// Weighted distances instead of plain step counts
    pub weighting: Option<Weighting>,
    pub params: AlgorithmParams,
    pub simulation: SimulationConfig,
    /// Plan the algorithms of a scenario in parallel. Planning times are
    /// then measured under contention.
    pub parallel: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            map_types: MapType::ALL.to_vec(),
            ks: vec![5, 10, 15],
            seeds: (0..5).collect(),
            algorithms: Algorithm::ALL.to_vec(),
            width: 20,
            height: 20,
            num_depots: 1,
            one_way: false,
            weighting: None,
            params: AlgorithmParams::default(),
            simulation: SimulationConfig::default(),
            parallel: false,
        }
    }
}

impl BenchmarkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.map_types.is_empty() || self.ks.is_empty() || self.seeds.is_empty() {
            return Err(Error::InvalidConfig("benchmark needs at least one map type, K and seed".into()));
        }
        if self.algorithms.is_empty() {
            return Err(Error::InvalidConfig("benchmark needs at least one algorithm".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidConfig("grid dimensions must be positive".into()));
        }
        if self.num_depots == 0 {
            return Err(Error::InvalidConfig("num_depots must be at least 1".into()));
        }
        self.params.validate()?;
        self.simulation.validate()
    }

    /// Every scenario of the sweep, map type outermost.
    pub fn scenarios(&self) -> Vec<ScenarioSpec> {
        let mut specs = Vec::new();
        for &map_type in &self.map_types {
            for &k in &self.ks {
                for &seed in &self.seeds {
                    specs.push(ScenarioSpec {
                        map_type,
                        width: self.width,
                        height: self.height,
                        k,
                        seed,
                        num_depots: self.num_depots,
                        one_way: self.one_way,
                    });
                }
            }
        }
        specs
    }
}

/// Records and skips produced by one scenario.
#[derive(Debug, Default)]
pub struct ScenarioOutcome {
    pub records: Vec<PlanRecord>,
    pub skipped: Vec<SkippedRun>,
}

impl ScenarioOutcome {
    /// Keep a planned record. A failed collision replay only leaves the
    /// collision columns empty and is listed as a skipped run.
    fn push_planned(&mut self, mut record: PlanRecord, replay: Option<Result<CollisionRecord>>, label: &str) {
        match replay {
            Some(Ok(collisions)) => record.set_collisions(&collisions),
            Some(Err(e)) => {
                log::warn!("Collision replay of {} on {} failed: {}", record.algorithm, label, e);
                self.skipped.push(SkippedRun {
                    scenario: label.to_string(),
                    algorithm: Some(record.algorithm.clone()),
                    reason: format!("collision replay: {e}"),
                });
            }
            None => {}
        }
        self.records.push(record);
    }
}

fn scenario_label(spec: &ScenarioSpec) -> String {
    format!("{}-k{}-s{}", spec.map_type, spec.k, spec.seed)
}

fn oracle_for<'g>(scenario: &'g Scenario, weighting: Option<&Weighting>) -> DistanceOracle<'g> {
    match weighting {
        Some(w) => DistanceOracle::weighted(
            &scenario.grid,
            w.clone(),
            scenario.depots.clone(),
            Box::new(AisleWidthEstimate),
        ),
        None => DistanceOracle::new(&scenario.grid),
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    records: Vec<PlanRecord>,
    skipped: Vec<SkippedRun>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run the whole sweep. Per-scenario failures are logged and counted;
    /// configuration errors abort.
    pub fn run(&mut self, progress: &ProgressBar) -> Result<()> {
        self.config.validate()?;
        let specs = self.config.scenarios();
        progress.set_length(specs.len() as u64);

        for spec in specs {
            let label = scenario_label(&spec);
            progress.set_message(label.clone());
            match self.run_scenario(spec) {
                Ok(outcome) => {
                    self.records.extend(outcome.records);
                    self.skipped.extend(outcome.skipped);
                }
                Err(e) if e.is_scenario_failure() => {
                    log::warn!("Skipping scenario {}: {}", label, e);
                    self.skipped.push(SkippedRun {
                        scenario: label,
                        algorithm: None,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
            progress.inc(1);
        }
        progress.finish_with_message("done");

        log::info!(
            "Benchmark finished: {} records, {} skipped runs",
            self.records.len(),
            self.skipped.len()
        );
        Ok(())
    }

    /// Plan every configured algorithm on one scenario.
    ///
    /// Each agent's matrix is built once and shared read-only by all
    /// algorithms.
    pub fn run_scenario(&self, spec: ScenarioSpec) -> Result<ScenarioOutcome> {
        let label = scenario_label(&spec);
        let seed = spec.seed;
        let scenario = Scenario::generate(spec)?;
        let mut oracle = oracle_for(&scenario, self.config.weighting.as_ref());

        let agents: Vec<(Vec<Cell>, DistanceMatrix)> = (0..scenario.num_agents())
            .map(|agent| {
                let nodes = scenario.agent_nodes(agent);
                oracle.build(&nodes).map(|matrix| (nodes, matrix))
            })
            .collect::<Result<_>>()?;
        log::debug!(
            "Scenario {}: {} agents, {} routed searches",
            label,
            agents.len(),
            oracle.searches()
        );

        let plan_all = |algorithm: Algorithm| -> (Algorithm, Result<Vec<Tour>>) {
            let tours = agents
                .iter()
                .map(|(_, matrix)| plan(algorithm, matrix, 0, seed, &self.config.params))
                .collect();
            (algorithm, tours)
        };
        let planned: Vec<(Algorithm, Result<Vec<Tour>>)> = if self.config.parallel {
            self.config.algorithms.par_iter().map(|&a| plan_all(a)).collect()
        } else {
            self.config.algorithms.iter().map(|&a| plan_all(a)).collect()
        };

        let mut outcome = ScenarioOutcome::default();
        for (algorithm, tours) in planned {
            let tours = match tours {
                Ok(tours) => tours,
                Err(e) if e.is_scenario_failure() => {
                    log::warn!("Skipping {} on {}: {}", algorithm, label, e);
                    outcome.skipped.push(SkippedRun {
                        scenario: label.clone(),
                        algorithm: Some(algorithm.to_string()),
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let record = self.make_record(&scenario, algorithm, &tours);
            let replay = (tours.len() > 1).then(|| self.simulate(&mut oracle, &agents, &tours));
            outcome.push_planned(record, replay, &label);
        }
        Ok(outcome)
    }

    fn make_record(&self, scenario: &Scenario, algorithm: Algorithm, tours: &[Tour]) -> PlanRecord {
        let initial: Option<f64> = tours
            .iter()
            .map(|t| t.initial_cost)
            .sum::<Option<f64>>();
        let cost: f64 = tours.iter().map(|t| t.cost).sum();
        let improvement_pct = initial.filter(|&c| c > 0.0).map(|c| (c - cost) / c * 100.0);

        PlanRecord {
            algorithm: algorithm.to_string(),
            map_type: scenario.spec.map_type,
            k: scenario.spec.k,
            seed: scenario.spec.seed,
            num_agents: tours.len(),
            orders: tours.iter().map(|t| t.order.clone()).collect(),
            cost,
            planning_time: tours.iter().map(|t| t.computation_time).sum(),
            iterations: tours.iter().map(|t| t.iterations).sum(),
            initial_cost: initial,
            improvement_pct,
            collisions: None,
            total_wait_time: None,
            avg_wait_time: None,
            max_wait_time: None,
            makespan: None,
            theoretical_makespan: None,
        }
    }

    fn simulate(
        &self,
        oracle: &mut DistanceOracle<'_>,
        agents: &[(Vec<Cell>, DistanceMatrix)],
        tours: &[Tour],
    ) -> Result<CollisionRecord> {
        let paths = agents
            .iter()
            .zip(tours)
            .enumerate()
            .map(|(agent, ((nodes, _), tour))| {
                tour_to_path(oracle, nodes, 0, &tour.order).map(|cells| AgentPath::new(agent, cells))
            })
            .collect::<Result<Vec<_>>>()?;

        let simulator = CollisionSimulator::new(oracle.grid(), self.config.simulation.clone());
        simulator.run(&paths)
    }

    pub fn records(&self) -> &[PlanRecord] {
        &self.records
    }

    pub fn skipped(&self) -> &[SkippedRun] {
        &self.skipped
    }

    pub fn compute_statistics(&self) -> Vec<AlgorithmStatistics> {
        compute_statistics(&self.records)
    }

    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_csv(path, &self.records)
    }

    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_csv(path, &self.compute_statistics())
    }

    pub fn generate_report(&self) -> String {
        let mut report = generate_report(&self.records, self.skipped.len());
        if self.config.parallel {
            report.push_str("\nNote: algorithms were planned concurrently; planning times include contention.\n");
        }
        report
    }
}

fn write_csv<P: AsRef<Path>, T: Serialize>(path: P, rows: &[T]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read records previously written by [`Benchmark::export_to_csv`].
pub fn load_records_csv<P: AsRef<Path>>(path: P) -> Result<Vec<PlanRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

fn mean_of<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let values: Vec<f64> = values.into_iter().collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().mean())
    }
}

/// Per-algorithm statistics, sorted by average cost.
pub fn compute_statistics(records: &[PlanRecord]) -> Vec<AlgorithmStatistics> {
    let mut groups: BTreeMap<&str, Vec<&PlanRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.algorithm.as_str()).or_default().push(record);
    }

    let mut statistics: Vec<AlgorithmStatistics> = groups
        .into_iter()
        .map(|(algorithm, group)| {
            let costs: Vec<f64> = group.iter().map(|r| r.cost).collect();
            let times: Vec<f64> = group.iter().map(|r| r.planning_time).collect();

            AlgorithmStatistics {
                algorithm: algorithm.to_string(),
                num_records: group.len(),
                avg_cost: costs.iter().mean(),
                std_cost: costs.iter().population_std_dev(),
                best_cost: costs.iter().copied().fold(f64::INFINITY, f64::min),
                worst_cost: costs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                avg_time: times.iter().mean(),
                std_time: times.iter().population_std_dev(),
                total_time: times.iter().sum(),
                avg_improvement_pct: mean_of(group.iter().filter_map(|r| r.improvement_pct)),
                avg_collisions: mean_of(group.iter().filter_map(|r| r.collisions.map(|c| c as f64))),
                avg_makespan: mean_of(group.iter().filter_map(|r| r.makespan)),
            }
        })
        .collect();

    statistics.sort_by(|a, b| a.avg_cost.total_cmp(&b.avg_cost));
    statistics
}

/// Generate summary report
pub fn generate_report(records: &[PlanRecord], skipped: usize) -> String {
    let mut report = String::new();

    report.push_str("========================================\n");
    report.push_str("    Warehouse Tour Benchmark Report\n");
    report.push_str("========================================\n");
    report.push_str(&format!(
        "Generated: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    report.push_str(&format!("Records: {}  Skipped runs: {}\n\n", records.len(), skipped));

    let stats = compute_statistics(records);

    report.push_str("Algorithm Performance Summary:\n");
    report.push_str("-".repeat(96).as_str());
    report.push('\n');
    report.push_str(&format!(
        "{:<16} {:>7} {:>11} {:>9} {:>11} {:>11} {:>10} {:>8} {:>9}\n",
        "Algorithm", "Runs", "Avg Cost", "Std", "Best Cost", "Avg Time", "Improv%", "Coll.", "Makespan"
    ));
    report.push_str("-".repeat(96).as_str());
    report.push('\n');

    let or_dash = |v: Option<f64>, precision: usize| {
        v.map(|x| format!("{:.*}", precision, x))
            .unwrap_or_else(|| "-".to_string())
    };
    for stat in &stats {
        report.push_str(&format!(
            "{:<16} {:>7} {:>11.2} {:>9.2} {:>11.2} {:>11.4} {:>10} {:>8} {:>9}\n",
            stat.algorithm,
            stat.num_records,
            stat.avg_cost,
            stat.std_cost,
            stat.best_cost,
            stat.avg_time,
            or_dash(stat.avg_improvement_pct, 2),
            or_dash(stat.avg_collisions, 1),
            or_dash(stat.avg_makespan, 1),
        ));
    }

    report.push_str("-".repeat(96).as_str());
    report.push('\n');

    report.push_str("\nBest Tour per Scenario:\n");
    let mut scenario_best: BTreeMap<String, &PlanRecord> = BTreeMap::new();
    for record in records {
        let entry = scenario_best.entry(record.scenario_label()).or_insert(record);
        if record.cost < entry.cost {
            *entry = record;
        }
    }
    for (scenario, best) in &scenario_best {
        report.push_str(&format!("  {}: {:.2} ({})\n", scenario, best.cost, best.algorithm));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> BenchmarkConfig {
        let mut params = AlgorithmParams::default();
        params.genetic.population_size = 10;
        params.genetic.max_generations = 20;
        params.aco.max_iterations = 10;
        params.ant_lion.max_iterations = 10;
        BenchmarkConfig {
            map_types: vec![MapType::Narrow],
            ks: vec![5],
            seeds: vec![1, 2],
            width: 12,
            height: 12,
            params,
            ..BenchmarkConfig::default()
        }
    }

    fn sample_record(algorithm: &str, cost: f64, time: f64) -> PlanRecord {
        PlanRecord {
            algorithm: algorithm.to_string(),
            map_type: MapType::Open,
            k: 3,
            seed: 0,
            num_agents: 1,
            orders: vec![vec![1, 2, 3]],
            cost,
            planning_time: time,
            iterations: 0,
            initial_cost: None,
            improvement_pct: None,
            collisions: None,
            total_wait_time: None,
            avg_wait_time: None,
            max_wait_time: None,
            makespan: None,
            theoretical_makespan: None,
        }
    }

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scenarios().len(), 4 * 3 * 5);

        let bad = BenchmarkConfig {
            algorithms: Vec::new(),
            ..BenchmarkConfig::default()
        };
        assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_pipeline_end_to_end() {
        let mut benchmark = Benchmark::new(small_config());
        benchmark.run(&ProgressBar::hidden()).unwrap();

        assert_eq!(benchmark.records().len(), 2 * Algorithm::ALL.len());
        assert!(benchmark.skipped().is_empty());
        for record in benchmark.records() {
            assert_eq!(record.num_agents, 1);
            assert_eq!(record.orders[0].len(), 5);
            assert!(record.collisions.is_none());
        }

        // exact is optimal on each scenario
        for seed in [1, 2] {
            let of_seed: Vec<&PlanRecord> = benchmark.records().iter().filter(|r| r.seed == seed).collect();
            let exact = of_seed.iter().find(|r| r.algorithm == "exact").unwrap().cost;
            assert!(of_seed.iter().all(|r| r.cost >= exact - 1e-9));
        }

        let stats = benchmark.compute_statistics();
        assert_eq!(stats.len(), Algorithm::ALL.len());
        assert!(stats.iter().all(|s| s.num_records == 2));
        let report = benchmark.generate_report();
        assert!(report.contains("nn-2opt"));
        assert!(report.contains("narrow-k5-s1"));
    }

    #[test]
    fn test_too_large_exact_is_skipped() {
        let mut config = small_config();
        config.ks = vec![8];
        config.seeds = vec![3];
        config.algorithms = vec![Algorithm::Exact, Algorithm::NnTwoOpt];
        config.params.exact.max_nodes = 4;

        let mut benchmark = Benchmark::new(config);
        benchmark.run(&ProgressBar::hidden()).unwrap();
        assert_eq!(benchmark.records().len(), 1);
        assert_eq!(benchmark.records()[0].algorithm, "nn-2opt");
        assert_eq!(benchmark.skipped().len(), 1);
        assert_eq!(benchmark.skipped()[0].algorithm.as_deref(), Some("exact"));
    }

    #[test]
    fn test_multi_agent_records_collisions() {
        let mut config = small_config();
        config.ks = vec![8];
        config.seeds = vec![4];
        config.num_depots = 2;
        config.algorithms = vec![Algorithm::AstarGreedy, Algorithm::HybridNnTwoOpt];

        let benchmark = Benchmark::new(config.clone());
        let outcome = benchmark.run_scenario(config.scenarios()[0].clone()).unwrap();
        assert_eq!(outcome.records.len(), 2);
        for record in &outcome.records {
            assert_eq!(record.num_agents, 2);
            assert_eq!(record.orders.iter().map(Vec::len).sum::<usize>(), 8);
            let makespan = record.makespan.unwrap();
            assert!(makespan >= record.theoretical_makespan.unwrap());
            assert!(record.collisions.is_some());
        }
    }

    #[test]
    fn test_failed_replay_keeps_plan_record() {
        let mut outcome = ScenarioOutcome::default();
        let mut record = sample_record("nn-2opt", 30.0, 0.1);
        record.num_agents = 2;
        let failure = Err(Error::NoPath {
            start: (0, 0),
            goal: (3, 3),
        });
        outcome.push_planned(record.clone(), Some(failure), "narrow-k5-s1");

        assert_eq!(outcome.records, vec![record]);
        assert!(outcome.records[0].collisions.is_none());
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].algorithm.as_deref(), Some("nn-2opt"));
        assert!(outcome.skipped[0].reason.starts_with("collision replay"));

        let replay = CollisionRecord {
            total_collisions: 2,
            makespan: 9.0,
            theoretical_makespan: 8.0,
            ..CollisionRecord::default()
        };
        outcome.push_planned(sample_record("aco", 31.0, 0.2), Some(Ok(replay)), "narrow-k5-s1");
        assert_eq!(outcome.records[1].collisions, Some(2));
        assert_eq!(outcome.records[1].makespan, Some(9.0));
        assert_eq!(outcome.skipped.len(), 1);
    }

    #[test]
    fn test_parallel_planning_is_flagged_in_report() {
        let mut config = small_config();
        config.seeds = vec![1];
        config.algorithms = vec![Algorithm::AstarGreedy, Algorithm::Genetic];
        assert!(!config.parallel);

        let mut sequential = Benchmark::new(config.clone());
        sequential.run(&ProgressBar::hidden()).unwrap();
        assert!(!sequential.generate_report().contains("concurrently"));

        config.parallel = true;
        let mut parallel = Benchmark::new(config);
        parallel.run(&ProgressBar::hidden()).unwrap();
        assert!(parallel.generate_report().contains("concurrently"));

        let costs = |b: &Benchmark| b.records().iter().map(|r| (r.algorithm.clone(), r.cost)).collect::<Vec<_>>();
        assert_eq!(costs(&sequential), costs(&parallel));
    }

    #[test]
    fn test_weighted_mode_runs() {
        let mut config = small_config();
        config.seeds = vec![5];
        config.weighting = Some(Weighting::default());
        config.algorithms = vec![Algorithm::NnTwoOpt];
        let mut benchmark = Benchmark::new(config);
        benchmark.run(&ProgressBar::hidden()).unwrap();
        assert_eq!(benchmark.records().len(), 1);
        assert!(benchmark.records()[0].cost > 0.0);
    }

    #[test]
    fn test_statistics_over_records() {
        let records = vec![
            sample_record("a", 10.0, 1.0),
            sample_record("a", 14.0, 3.0),
            sample_record("b", 9.0, 0.5),
        ];
        let stats = compute_statistics(&records);
        assert_eq!(stats[0].algorithm, "b");
        let a = &stats[1];
        assert_eq!(a.num_records, 2);
        assert!((a.avg_cost - 12.0).abs() < 1e-12);
        assert!((a.std_cost - 2.0).abs() < 1e-12);
        assert_eq!(a.best_cost, 10.0);
        assert_eq!(a.worst_cost, 14.0);
        assert!((a.total_time - 4.0).abs() < 1e-12);
        assert!(a.avg_collisions.is_none());
    }

    #[test]
    fn test_csv_round_trip_of_records() {
        let mut record = sample_record("aco", 21.5, 0.25);
        record.num_agents = 2;
        record.orders = vec![vec![2, 1], vec![3]];
        record.collisions = Some(3);
        record.makespan = Some(12.4);

        let path = std::env::temp_dir().join(format!("wtb-records-{}.csv", std::process::id()));
        write_csv(&path, &[record.clone()]).unwrap();
        let loaded = load_records_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, vec![record]);
    }
}
