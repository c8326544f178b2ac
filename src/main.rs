//! Warehouse Tour Bench - Command Line Interface
//!
//! Plans order-picking tours on warehouse grids, benchmarks tour algorithms
//! and replays multi-agent plans to measure congestion.

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use warehouse_tour_bench::algorithm::{plan, Algorithm, AlgorithmParams};
use warehouse_tour_bench::benchmark::{
    compute_statistics, generate_report, load_records_csv, Benchmark, BenchmarkConfig,
};
use warehouse_tour_bench::collision::{tour_to_path, AgentPath, CollisionSimulator, SimulationConfig};
use warehouse_tour_bench::distance::{AisleWidthEstimate, DistanceOracle, Weighting};
use warehouse_tour_bench::error::Result;
use warehouse_tour_bench::grid::Grid;
use warehouse_tour_bench::scenario::{MapType, Scenario, ScenarioSpec};

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "warehouse-tour-bench")]
#[command(version = "1.0")]
#[command(about = "Order-picking tour algorithms on warehouse grids")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the scenario comes from.
#[derive(Args, Clone)]
struct ScenarioArgs {
    /// Map layout
    #[arg(short, long, value_enum, default_value = "narrow")]
    map_type: MapType,

    /// Load the grid from a MovingAI `.map` or ASCII file instead
    #[arg(long)]
    map_file: Option<PathBuf>,

    #[arg(long, default_value = "20")]
    width: usize,

    #[arg(long, default_value = "20")]
    height: usize,

    /// Number of picks
    #[arg(short, long, default_value = "10")]
    k: usize,

    /// Random seed
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of depots (one agent each)
    #[arg(long, default_value = "1")]
    depots: usize,

    /// Alternate one-way vertical aisles
    #[arg(long)]
    one_way: bool,

    /// Use weighted distances (turns, congestion, one-way, dock bias)
    #[arg(long)]
    weighted: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan one scenario with one algorithm
    Solve {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Algorithm identifier
        #[arg(short, long, default_value = "hybrid-nn-2opt")]
        algorithm: String,

        /// JSON file with algorithm parameters
        #[arg(long)]
        params: Option<PathBuf>,

        /// Write the planned tours as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the grid with the planned route
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run the benchmark sweep
    Benchmark {
        /// JSON benchmark configuration (flags below override it)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Map layouts
        #[arg(long, value_enum, value_delimiter = ',')]
        map_types: Vec<MapType>,

        /// Pick counts
        #[arg(long, value_delimiter = ',')]
        ks: Vec<usize>,

        /// Number of seeds per (map, K)
        #[arg(long)]
        seeds: Option<u64>,

        /// Algorithm identifiers
        #[arg(short, long, value_delimiter = ',')]
        algorithms: Vec<String>,

        #[arg(long)]
        width: Option<usize>,

        #[arg(long)]
        height: Option<usize>,

        #[arg(long)]
        depots: Option<usize>,

        #[arg(long)]
        one_way: bool,

        #[arg(long)]
        weighted: bool,

        /// JSON file with algorithm parameters
        #[arg(long)]
        params: Option<PathBuf>,

        /// Plan the algorithms of a scenario concurrently (planning times then include contention)
        #[arg(long)]
        parallel: bool,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Plan every agent of a multi-depot scenario and replay the tours
    Simulate {
        #[command(flatten)]
        scenario: ScenarioArgs,

        #[arg(short, long, default_value = "hybrid-nn-2opt")]
        algorithm: String,

        #[arg(long)]
        params: Option<PathBuf>,

        /// Simulated seconds per cell
        #[arg(long, default_value = "0.2")]
        step_time: f64,
    },

    /// Summarize a results CSV written by `benchmark`
    Analyze {
        #[arg(short, long)]
        results: PathBuf,

        /// Write per-algorithm statistics to this CSV
        #[arg(long)]
        statistics: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Solve {
            scenario,
            algorithm,
            params,
            output,
            verbose,
        } => solve(&scenario, &algorithm, params.as_deref(), output.as_deref(), verbose),

        Commands::Benchmark {
            config,
            map_types,
            ks,
            seeds,
            algorithms,
            width,
            height,
            depots,
            one_way,
            weighted,
            params,
            parallel,
            output,
        } => load_benchmark_config(config.as_deref()).and_then(|mut cfg| {
            if !map_types.is_empty() {
                cfg.map_types = map_types;
            }
            if !ks.is_empty() {
                cfg.ks = ks;
            }
            if let Some(n) = seeds {
                cfg.seeds = (0..n).collect();
            }
            if !algorithms.is_empty() {
                cfg.algorithms = parse_algorithms(&algorithms)?;
            }
            cfg.width = width.unwrap_or(cfg.width);
            cfg.height = height.unwrap_or(cfg.height);
            cfg.num_depots = depots.unwrap_or(cfg.num_depots);
            cfg.one_way |= one_way;
            if weighted && cfg.weighting.is_none() {
                cfg.weighting = Some(Weighting::default());
            }
            if let Some(path) = params {
                cfg.params = AlgorithmParams::from_json_file(path)?;
            }
            cfg.parallel |= parallel;
            run_benchmark(cfg, &output)
        }),

        Commands::Simulate {
            scenario,
            algorithm,
            params,
            step_time,
        } => simulate(&scenario, &algorithm, params.as_deref(), step_time),

        Commands::Analyze { results, statistics } => analyze(&results, statistics.as_deref()),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn parse_algorithms(names: &[String]) -> Result<Vec<Algorithm>> {
    names.iter().map(|n| n.parse()).collect()
}

fn load_params(path: Option<&Path>) -> Result<AlgorithmParams> {
    match path {
        Some(p) => AlgorithmParams::from_json_file(p),
        None => Ok(AlgorithmParams::default()),
    }
}

fn load_benchmark_config(path: Option<&Path>) -> Result<BenchmarkConfig> {
    match path {
        Some(p) => {
            let text = fs::read_to_string(p)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(BenchmarkConfig::default()),
    }
}

fn load_scenario(args: &ScenarioArgs) -> Result<Scenario> {
    let spec = ScenarioSpec {
        map_type: args.map_type,
        width: args.width,
        height: args.height,
        k: args.k,
        seed: args.seed,
        num_depots: args.depots,
        one_way: args.one_way,
    };
    match &args.map_file {
        Some(path) => {
            let grid = if path.extension().map_or(false, |e| e == "map") {
                Grid::from_file(path)?
            } else {
                Grid::from_ascii(&fs::read_to_string(path)?)?
            };
            log::info!("Loaded {}x{} grid from {:?}", grid.width(), grid.height(), path);
            Scenario::on_grid(grid, spec)
        }
        None => Scenario::generate(spec),
    }
}

fn make_oracle<'g>(scenario: &'g Scenario, weighted: bool) -> DistanceOracle<'g> {
    if weighted {
        DistanceOracle::weighted(
            &scenario.grid,
            Weighting::default(),
            scenario.depots.clone(),
            Box::new(AisleWidthEstimate),
        )
    } else {
        DistanceOracle::new(&scenario.grid)
    }
}

fn solve(
    args: &ScenarioArgs,
    algorithm: &str,
    params: Option<&Path>,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let algorithm: Algorithm = algorithm.parse()?;
    let params = load_params(params)?;
    let scenario = load_scenario(args)?;
    let mut oracle = make_oracle(&scenario, args.weighted);

    println!(
        "Scenario: {} {}x{}, {} picks, {} depot(s), seed {}",
        scenario.spec.map_type,
        scenario.grid.width(),
        scenario.grid.height(),
        scenario.picks.len(),
        scenario.num_agents(),
        scenario.spec.seed
    );
    println!("Solving with {} ...", algorithm);

    let mut tours = Vec::with_capacity(scenario.num_agents());
    for agent in 0..scenario.num_agents() {
        let nodes = scenario.agent_nodes(agent);
        let matrix = oracle.build(&nodes)?;
        let tour = plan(algorithm, &matrix, 0, args.seed, &params)?;

        println!("\n========== Agent {} ==========", agent);
        println!("Depot: {:?}", nodes[0]);
        println!("Cost: {:.2}", tour.cost);
        if let Some(initial) = tour.initial_cost {
            println!("Initial (nearest neighbor) cost: {:.2}", initial);
        }
        if let Some(pct) = tour.improvement_pct() {
            println!("Improvement: {:.2}%", pct);
        }
        println!("Time: {:.4}s", tour.computation_time);
        println!("Iterations: {}", tour.iterations);
        let visits: Vec<_> = tour.order.iter().map(|&i| nodes[i]).collect();
        println!("Visits: {:?}", visits);

        if verbose {
            let path = tour_to_path(&mut oracle, &nodes, 0, &tour.order)?;
            println!("Route: {} steps", path.len().saturating_sub(1));
            println!("{}", render_route(&scenario.grid, &path, &nodes));
        }
        tours.push(tour);
    }

    if let Some(out_path) = output {
        let json = serde_json::to_string_pretty(&tours)?;
        fs::write(out_path, json)?;
        println!("\nTours saved to {:?}", out_path);
    }
    Ok(())
}

/// ASCII map with the route (`*`), picks (`P`) and depot (`D`).
fn render_route(grid: &Grid, path: &[(usize, usize)], nodes: &[(usize, usize)]) -> String {
    let mut rows: Vec<Vec<char>> = grid.to_ascii().lines().map(|l| l.chars().collect()).collect();
    for &(x, y) in path {
        rows[y][x] = '*';
    }
    for &(x, y) in nodes.iter().skip(1) {
        rows[y][x] = 'P';
    }
    if let Some(&(x, y)) = nodes.first() {
        rows[y][x] = 'D';
    }
    rows.into_iter()
        .map(|r| r.into_iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

fn run_benchmark(config: BenchmarkConfig, output: &Path) -> Result<()> {
    fs::create_dir_all(output)?;

    let scenarios = config.scenarios().len();
    println!(
        "Running {} algorithm(s) on {} scenario(s)...",
        config.algorithms.len(),
        scenarios
    );
    fs::write(output.join("config.json"), serde_json::to_string_pretty(&config)?)?;

    let progress = ProgressBar::new(scenarios as u64);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut benchmark = Benchmark::new(config);
    benchmark.run(&progress)?;

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    if !benchmark.skipped().is_empty() {
        let skipped_path = output.join("skipped.json");
        fs::write(&skipped_path, serde_json::to_string_pretty(benchmark.skipped())?)?;
        println!("Skipped runs listed in {:?}", skipped_path);
    }

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);
    Ok(())
}

fn simulate(args: &ScenarioArgs, algorithm: &str, params: Option<&Path>, step_time: f64) -> Result<()> {
    let algorithm: Algorithm = algorithm.parse()?;
    let params = load_params(params)?;
    let sim_config = SimulationConfig { step_time };
    sim_config.validate()?;

    let scenario = load_scenario(args)?;
    let mut oracle = make_oracle(&scenario, args.weighted);

    let mut paths = Vec::with_capacity(scenario.num_agents());
    for agent in 0..scenario.num_agents() {
        let nodes = scenario.agent_nodes(agent);
        let matrix = oracle.build(&nodes)?;
        let tour = plan(algorithm, &matrix, 0, args.seed, &params)?;
        log::info!(
            "Agent {}: {} picks, tour cost {:.2}",
            agent,
            tour.order.len(),
            tour.cost
        );
        let cells = tour_to_path(&mut oracle, &nodes, 0, &tour.order)?;
        paths.push(AgentPath::new(agent, cells));
    }

    let record = CollisionSimulator::new(oracle.grid(), sim_config).run(&paths)?;

    println!("========== Collision Replay ==========");
    println!("Agents: {}", paths.len());
    println!("Collisions: {}", record.total_collisions);
    println!("Total wait: {:.2}s", record.total_wait_time);
    println!("Average wait: {:.2}s", record.avg_wait_time);
    println!("Max wait: {:.2}s", record.max_wait_time);
    println!(
        "Makespan: {:.2}s (collision-free {:.2}s, +{:.2}s)",
        record.makespan,
        record.theoretical_makespan,
        record.makespan_overhead()
    );
    for (agent, wait) in &record.agent_wait_times {
        println!("  agent {}: waited {:.2}s", agent, wait);
    }
    if !record.collision_locations.is_empty() {
        println!("Collision cells: {:?}", record.collision_locations);
    }
    Ok(())
}

fn analyze(results: &Path, statistics: Option<&Path>) -> Result<()> {
    let records = load_records_csv(results)?;
    println!("Loaded {} records from {:?}\n", records.len(), results);

    if let Some(path) = statistics {
        let file = fs::File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        for stat in compute_statistics(&records) {
            writer.serialize(stat)?;
        }
        writer.flush()?;
        println!("Statistics exported to {:?}", path);
    }

    println!("{}", generate_report(&records, 0));
    Ok(())
}
