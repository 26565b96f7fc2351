//! PD Tour Solver - Command Line Interface
//!
//! Hill climbing and grid search for single-driver pickup and delivery routes.

use clap::{Args, Parser, Subcommand, ValueEnum};
use pd_tour_solver::codec::Codec;
use pd_tour_solver::config::{GridSearchConfig, SearchConfig};
use pd_tour_solver::evaluators::DistanceEvaluator;
use pd_tour_solver::heuristics::construction::InitializationMethod;
use pd_tour_solver::heuristics::grid_search::{GridSearch, GridSearchResult};
use pd_tour_solver::heuristics::hill_climbing::HillClimbing;
use pd_tour_solver::instance::ProblemInstance;
use pd_tour_solver::output::{self, RunStatistics};
use pd_tour_solver::route::Route;

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "pd-tour-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Local search for single-driver pickup and delivery routes")]
struct Cli {
    /// Debug logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an initial route and improve it by hill climbing
    Solve {
        #[arg(short, long)]
        instance: PathBuf,

        #[command(flatten)]
        search: SearchArgs,

        /// Directory to write the route JSON into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sweep iteration counts and tabu list sizes
    Grid {
        #[arg(short, long)]
        instance: PathBuf,

        #[arg(long)]
        iterations_start: Option<usize>,

        /// Exclusive
        #[arg(long)]
        iterations_end: Option<usize>,

        #[arg(long)]
        step: Option<usize>,

        #[arg(long)]
        tabu_start: Option<usize>,

        /// Exclusive
        #[arg(long)]
        tabu_end: Option<usize>,

        /// Grid parameters as JSON; flags override file values
        #[arg(long)]
        grid_config: Option<PathBuf>,

        /// Number of sweeps, each with shifted seeds
        #[arg(short, long, default_value = "1")]
        runs: usize,

        /// CSV file to append run statistics to
        #[arg(long)]
        stats: Option<PathBuf>,

        #[command(flatten)]
        search: SearchArgs,

        /// Directory to write the best route JSON into
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Analyze an instance
    Analyze {
        #[arg(short, long)]
        instance: PathBuf,
    },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Score arrival times with one store visit per job
    #[arg(long)]
    time_windows: bool,

    #[arg(long)]
    tabu: bool,

    #[arg(long)]
    tabu_size: Option<usize>,

    #[arg(long)]
    iterations: Option<usize>,

    /// Keep routes breaking precedence instead of repairing them
    #[arg(long)]
    allow_infeasibilities: bool,

    #[arg(long, value_enum)]
    init: Option<InitArg>,

    /// Size of the initial pool
    #[arg(long)]
    pool: Option<usize>,

    /// Seed of the first pool member
    #[arg(short, long)]
    seed: Option<u64>,

    /// Score candidate batches in parallel
    #[arg(long)]
    parallel: bool,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Time limit in seconds
    #[arg(short, long)]
    time_limit: Option<f64>,

    /// Do not score the leg back to the deliverer
    #[arg(long)]
    open_route: bool,

    /// Search parameters as JSON; flags override file values
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InitArg {
    Random,
    RelaxedRandom,
    Greedy,
    Grasp,
}

impl From<InitArg> for InitializationMethod {
    fn from(arg: InitArg) -> Self {
        match arg {
            InitArg::Random => InitializationMethod::Random,
            InitArg::RelaxedRandom => InitializationMethod::RelaxedRandom,
            InitArg::Greedy => InitializationMethod::Greedy,
            InitArg::Grasp => InitializationMethod::Grasp,
        }
    }
}

impl SearchArgs {
    /// Overlay the flags on `base`.
    fn apply(&self, mut config: SearchConfig) -> SearchConfig {
        config.with_time_windows |= self.time_windows;
        config.tabu |= self.tabu;
        config.allow_infeasibilities |= self.allow_infeasibilities;
        config.parallel |= self.parallel;
        if self.open_route {
            config.driver_returns_to_start = false;
        }
        if let Some(size) = self.tabu_size {
            config.tabu_size = size;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(init) = self.init {
            config.initialization = init.into();
        } else if config.with_time_windows && config.initialization == InitializationMethod::Random {
            config.initialization = InitializationMethod::RelaxedRandom;
        }
        if let Some(pool) = self.pool {
            config.initial_pool_size = pool;
        }
        if let Some(seed) = self.seed {
            config.initial_seed = seed;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if self.time_limit.is_some() {
            config.time_limit = self.time_limit;
        }
        config
    }

    fn load(&self) -> SearchConfig {
        let base = match &self.config {
            Some(path) => exit_on_error(SearchConfig::from_file(path), "Error loading search config"),
            None => SearchConfig::default(),
        };
        self.apply(base)
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match cli.command {
        Commands::Solve { instance, search, output } => {
            solve_instance(&instance, &search, output);
        }

        Commands::Grid {
            instance,
            iterations_start,
            iterations_end,
            step,
            tabu_start,
            tabu_end,
            grid_config,
            runs,
            stats,
            search,
            output,
            progress,
        } => {
            let mut grid = match &grid_config {
                Some(path) => exit_on_error(GridSearchConfig::from_file(path), "Error loading grid config"),
                None => GridSearchConfig::default(),
            };
            if search.config.is_some() {
                grid.search = search.load();
            } else {
                grid.search = search.apply(grid.search);
            }
            if let Some(v) = iterations_start {
                grid.iterations_start = v;
            }
            if let Some(v) = iterations_end {
                grid.iterations_end = v;
            }
            if let Some(v) = step {
                grid.iterations_step = v;
            }
            if let Some(v) = tabu_start {
                grid.tabu_size_start = v;
            }
            if let Some(v) = tabu_end {
                grid.tabu_size_end = v;
            }
            grid_search(&instance, grid, runs, stats, output, progress);
        }

        Commands::Analyze { instance } => {
            analyze_instance(&instance);
        }
    }
}

fn exit_on_error<T>(result: pd_tour_solver::Result<T>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            eprintln!("{}: {}", context, e);
            std::process::exit(1);
        }
    }
}

fn load_instance(path: &Path) -> ProblemInstance {
    println!("Loading instance from {:?}...", path);
    exit_on_error(ProblemInstance::from_file(path), "Error loading instance")
}

fn solve_instance(path: &Path, args: &SearchArgs, output: Option<PathBuf>) {
    let instance = load_instance(path);
    let config = args.load();
    let time_windows = config.with_time_windows;
    let codec = Codec::new(&instance);

    println!("{}", instance.statistics());
    let mut hc = exit_on_error(HillClimbing::new(&instance, &codec, config), "Invalid configuration");
    println!(
        "Solving with {} evaluator, {} iterations, tabu list size {}",
        hc.evaluator().name(),
        hc.config().iterations,
        hc.config().effective_tabu_size()
    );

    let start = Instant::now();
    let (initial_score, _) = exit_on_error(hc.generate_initial_solution(), "Error building initial solution");
    println!("Initial score: {:.4}", initial_score);

    let outcome = exit_on_error(hc.solve(), "Search failed");
    let elapsed = start.elapsed();

    print_route(&outcome.route, outcome.score, time_windows);
    match outcome.improved_at {
        Some(iteration) => println!("Last improvement: iteration {}", iteration + 1),
        None => println!("Last improvement: none"),
    }
    if outcome.cancelled {
        println!("Stopped early after {} iterations", outcome.iterations_run);
    }
    println!("Time: {:.3}s", elapsed.as_secs_f64());

    if let Some(dir) = output {
        let suffix = if time_windows { Some("tw") } else { None };
        let path = exit_on_error(output::write_route(&dir, &outcome.route, time_windows, suffix), "Error writing route");
        println!("Route written to {:?}", path);
    }
}

fn grid_search(
    path: &Path,
    grid: GridSearchConfig,
    runs: usize,
    stats: Option<PathBuf>,
    output: Option<PathBuf>,
    progress: bool,
) {
    let instance = load_instance(path);
    let codec = Codec::new(&instance);
    let time_windows = grid.search.with_time_windows;
    println!("{}", instance.statistics());

    let start = Instant::now();
    let mut best: Option<GridSearchResult<'_>> = None;
    let mut rows = Vec::with_capacity(runs);

    for run in 0..runs.max(1) {
        let config = GridSearchConfig {
            search: grid.search.for_run(run),
            ..grid.clone()
        };
        let search = exit_on_error(GridSearch::new(&instance, &codec, config), "Invalid grid configuration")
            .with_progress(progress);
        let result = exit_on_error(search.run(), "Grid search failed");

        let summary = result.summary();
        println!(
            "Run {}: best {:.4} ({} iterations, tabu size {}), mean {:.4} +/- {:.4} over {} trials",
            run + 1,
            result.score,
            result.iterations,
            result.tabu_size,
            summary.mean,
            summary.std_dev,
            summary.trials
        );
        rows.push(RunStatistics::now(
            instance.name.clone(),
            run,
            result.score,
            result.iterations,
            result.tabu_size,
        ));

        if best.as_ref().map_or(true, |b| result.score < b.score) {
            best = Some(result);
        }
    }

    let Some(best) = best else {
        eprintln!("Grid search produced no result");
        std::process::exit(1);
    };
    println!("\nBest over {} runs:", rows.len());
    print_route(&best.route, best.score, time_windows);
    println!("Iterations: {}, tabu list size: {}", best.iterations, best.tabu_size);
    println!("Time: {:.3}s", start.elapsed().as_secs_f64());

    if let Some(stats) = stats {
        exit_on_error(output::append_statistics(&stats, &rows), "Error writing statistics");
        println!("Statistics appended to {:?}", stats);
    }
    if let Some(dir) = output {
        let suffix = format!("{}_{}", best.iterations, best.tabu_size);
        let path = exit_on_error(
            output::write_route(&dir, &best.route, time_windows, Some(&suffix)),
            "Error writing route",
        );
        println!("Route written to {:?}", path);
    }
}

fn print_route(route: &Route<'_>, score: f64, time_windows: bool) {
    println!("\n========== Route ==========");
    println!("Score: {:.4}", score);
    println!("Stops: {}", route.len());
    println!("{}", route.pretty_print());
    if !time_windows {
        match DistanceEvaluator::precedence_violations(route.instance(), &route.tour) {
            Ok(0) => println!("Feasible: yes"),
            Ok(n) => println!("Feasible: no ({} precedence violations)", n),
            Err(e) => println!("Feasible: unknown ({})", e),
        }
    }
}

fn analyze_instance(path: &Path) {
    let instance = load_instance(path);

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    let codec = Codec::new(&instance);
    println!("Request groups: {}", codec.len());
    for store in instance.stores() {
        let jobs: Vec<String> = instance.jobs_for_store(store.id).map(|j| j.id.to_string()).collect();
        if !jobs.is_empty() {
            println!("  Store {} ({}): jobs [{}]", store.id, store.label, jobs.join(", "));
        }
    }
    let unmatched = instance.unmatched_jobs();
    if !unmatched.is_empty() {
        println!("Jobs without a known store: {:?}", unmatched);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solve_search(args: &[&str]) -> SearchConfig {
        let mut argv = vec!["pd-tour-solver", "solve", "--instance", "problem.json"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Solve { search, .. } => search.apply(SearchConfig::default()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_time_windows_default_to_relaxed_random() {
        let config = solve_search(&["--time-windows"]);
        assert_eq!(config.initialization, InitializationMethod::RelaxedRandom);
        assert!(config.validate().is_ok());

        let explicit = solve_search(&["--time-windows", "--init", "random"]);
        assert_eq!(explicit.initialization, InitializationMethod::Random);
        assert!(explicit.validate().is_err());

        assert_eq!(solve_search(&[]).initialization, InitializationMethod::Random);
    }
}
