//! PDP SLS Solver - Command Line Interface
//!
//! Plans multi-vehicle pickup and delivery with a stochastic local search.

use clap::{Args, Parser, Subcommand, ValueEnum};
use pdp_sls_solver::benchmark::{load_instances_from_dir, standard_variants, Benchmark, BenchmarkConfig};
use pdp_sls_solver::error::SolverError;
use pdp_sls_solver::heuristics::construction::InitialPolicy;
use pdp_sls_solver::heuristics::neighborhood::{SwapMode, TransferMode};
use pdp_sls_solver::heuristics::sls::{Sls, SlsConfig, SlsResult};
use pdp_sls_solver::instance::{Instance, RandomInstanceParams};
use pdp_sls_solver::plan::{materialize, VehiclePlan};

use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pdp-sls-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Stochastic local search for multi-vehicle pickup and delivery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one instance
    Solve {
        #[arg(short, long)]
        instance: PathBuf,

        #[command(flatten)]
        search: SearchArgs,

        /// Write the result and the vehicle plans as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print agendas and plans
        #[arg(short, long)]
        verbose: bool,
    },

    /// Compare search variants over several seeds
    Benchmark {
        /// Directory containing instance files
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Number of random instances to generate when no directory is given
        #[arg(long, default_value = "3")]
        generated: usize,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Number of runs (seeds) per variant
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Time limit per run in milliseconds
        #[arg(short, long, default_value = "5000")]
        time_limit_ms: u64,

        /// Iteration cap per run
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Base configuration of the variants (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Run one search at a time
        #[arg(long)]
        sequential: bool,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,
    },

    /// Write a random instance as JSON
    Generate {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "16")]
        cities: usize,

        #[arg(long, default_value = "4")]
        vehicles: usize,

        #[arg(long, default_value = "20")]
        tasks: usize,

        #[arg(long, default_value = "10")]
        max_weight: i32,

        #[arg(long, default_value = "30")]
        max_capacity: i32,

        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

/// Search settings; every flag overrides the configuration file
#[derive(Args)]
struct SearchArgs {
    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Time limit in milliseconds
    #[arg(short, long)]
    time_limit_ms: Option<u64>,

    /// Random seed
    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(long)]
    archive_size: Option<usize>,

    /// Draws below this move to the best neighbor
    #[arg(long)]
    p_lower: Option<f64>,

    /// Draws above this move to a random neighbor
    #[arg(long)]
    p_upper: Option<f64>,

    /// Iterations without improvement before a forced random move
    #[arg(long)]
    max_repeat: Option<usize>,

    #[arg(long)]
    max_iterations: Option<usize>,

    #[arg(long, value_enum)]
    initial: Option<Initial>,

    #[arg(long, value_enum)]
    transfer: Option<Transfer>,

    #[arg(long, value_enum)]
    swap: Option<Swap>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Initial {
    /// Naive when every vehicle fits every task, greedy otherwise
    Auto,
    /// Round-robin over the fleet
    Naive,
    /// First vehicle able to carry the task
    Greedy,
    /// Round-robin following delivery cities
    Chaining,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Transfer {
    /// Every task of the source vehicle to every position of every vehicle
    All,
    /// First task of the source vehicle to the front of other vehicles
    First,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Swap {
    Off,
    /// Swaps on top of each transfer neighbor
    Layered,
    /// Swaps of the current solution next to the transfers
    Independent,
}

impl SearchArgs {
    fn to_config(&self) -> Result<SlsConfig, SolverError> {
        let mut config = match &self.config {
            Some(path) => SlsConfig::from_json_file(path)?,
            None => SlsConfig::default(),
        };

        if let Some(v) = self.time_limit_ms {
            config.time_limit_ms = v;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(v) = self.archive_size {
            config.archive_size = v;
        }
        if let Some(v) = self.p_lower {
            config.p_lower = v;
        }
        if let Some(v) = self.p_upper {
            config.p_upper = v;
        }
        if let Some(v) = self.max_repeat {
            config.max_repeat = v;
        }
        if self.max_iterations.is_some() {
            config.max_iterations = self.max_iterations;
        }
        if let Some(initial) = self.initial {
            config.initial = match initial {
                Initial::Auto => InitialPolicy::Auto,
                Initial::Naive => InitialPolicy::Naive,
                Initial::Greedy => InitialPolicy::Greedy,
                Initial::Chaining => InitialPolicy::Chaining,
            };
        }
        if let Some(transfer) = self.transfer {
            config.neighborhood.transfer = match transfer {
                Transfer::All => TransferMode::AllTasks,
                Transfer::First => TransferMode::FirstTask,
            };
        }
        if let Some(swap) = self.swap {
            config.neighborhood.swap = match swap {
                Swap::Off => SwapMode::Off,
                Swap::Layered => SwapMode::Layered,
                Swap::Independent => SwapMode::Independent,
            };
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Serialize)]
struct SolveOutput<'a> {
    instance: &'a str,
    config: &'a SlsConfig,
    result: &'a SlsResult,
    plans: Vec<VehiclePlan>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Solve { instance, search, output, verbose } => {
            solve_instance(&instance, &search, output.as_deref(), verbose)
        }

        Commands::Benchmark { dir, generated, output, runs, time_limit_ms, max_iterations, config: base, sequential } => {
            let config = BenchmarkConfig {
                num_runs: runs,
                time_limit_ms,
                max_iterations,
                parallel: !sequential,
                ..Default::default()
            };
            run_benchmark(dir.as_deref(), generated, &output, base.as_deref(), config)
        }

        Commands::Analyze { instance } => analyze_instance(&instance),

        Commands::Generate { output, cities, vehicles, tasks, max_weight, max_capacity, seed } => {
            let params = RandomInstanceParams {
                num_cities: cities,
                num_vehicles: vehicles,
                num_tasks: tasks,
                max_weight,
                max_capacity,
                ..Default::default()
            };
            generate_instance(&output, &params, seed)
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn solve_instance(path: &Path, search: &SearchArgs, output: Option<&Path>, verbose: bool) -> Result<(), SolverError> {
    println!("Loading instance from {:?}...", path);
    let instance = Instance::load(path)?;
    let config = search.to_config()?;

    if verbose {
        println!("{}", instance.statistics());
        println!("Configuration: {:?}", config);
    }

    println!(
        "Solving with SLS ({} ms, archive {}, p_lower {}, p_upper {})...",
        config.time_limit_ms, config.archive_size, config.p_lower, config.p_upper
    );
    let mut sls = Sls::new(&instance, config.clone())?;
    let result = sls.run()?;
    let plans = materialize(&instance, &result.best);

    println!("\n========== Results ==========");
    println!("Initial cost: {:.2}", result.initial_cost);
    println!("Best cost: {:.2}", result.best.total_cost());
    if result.initial_cost > 0.0 {
        println!(
            "Improvement: {:.2}%",
            (result.initial_cost - result.best.total_cost()) / result.initial_cost * 100.0
        );
    }
    println!("Feasible: {}", result.best.is_capacity_feasible(&instance));
    println!("Iterations: {}", result.iterations);
    println!("Improvements: {}", result.improvements);
    println!("Forced random moves: {}", result.forced_escapes);
    println!("Archive size: {}", result.archive.len());
    println!("Time: {:.4}s", result.computation_time);

    if verbose {
        println!("\n{}", result.best);
        for plan in &plans {
            let actions: Vec<String> = plan.actions.iter().map(|a| a.to_string()).collect();
            println!(
                "Vehicle {} ({:.2} km, cost {:.2}): {}",
                plan.vehicle,
                plan.distance,
                plan.cost,
                actions.join(", ")
            );
        }
    }

    if let Some(out_path) = output {
        let out = SolveOutput {
            instance: &instance.name,
            config: &config,
            result: &result,
            plans,
        };
        std::fs::write(out_path, serde_json::to_string_pretty(&out)?)?;
        println!("\nSolution saved to {:?}", out_path);
    }

    Ok(())
}

fn run_benchmark(
    dir: Option<&Path>,
    generated: usize,
    output: &Path,
    base: Option<&Path>,
    config: BenchmarkConfig,
) -> Result<(), SolverError> {
    let instances = match dir {
        Some(dir) => {
            println!("Loading instances from {:?}...", dir);
            load_instances_from_dir(dir)
        }
        None => {
            println!("Generating {} random instances...", generated);
            (0..generated as u64)
                .map(|seed| Instance::random(&RandomInstanceParams::default(), seed))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    println!("Found {} instances", instances.len());
    if instances.is_empty() {
        eprintln!("No instances found!");
        return Ok(());
    }

    std::fs::create_dir_all(output)?;

    let base = match base {
        Some(path) => SlsConfig::from_json_file(path)?,
        None => SlsConfig::default(),
    };
    let mut benchmark = Benchmark::new(config, standard_variants(&base));

    for (i, instance) in instances.iter().enumerate() {
        println!(
            "\n[{}/{}] Processing {} ({} vehicles, {} tasks)...",
            i + 1,
            instances.len(),
            instance.name,
            instance.num_vehicles(),
            instance.num_tasks()
        );
        benchmark.run_instance(instance)?;
    }

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);

    Ok(())
}

fn analyze_instance(path: &Path) -> Result<(), SolverError> {
    let instance = Instance::load(path)?;

    println!("{}", instance.statistics());

    println!("Initial solutions:");
    for policy in [InitialPolicy::Naive, InitialPolicy::Greedy, InitialPolicy::Chaining] {
        match policy.construct(&instance) {
            Ok(solution) => println!(
                "  {:<10} cost {:>12.2}  busy vehicles {}",
                format!("{:?}", policy),
                solution.total_cost(),
                solution.busy_vehicles().len()
            ),
            Err(e) => println!("  {:<10} {}", format!("{:?}", policy), e),
        }
    }

    Ok(())
}

fn generate_instance(output: &Path, params: &RandomInstanceParams, seed: u64) -> Result<(), SolverError> {
    let instance = Instance::random(params, seed)?;
    std::fs::write(output, serde_json::to_string_pretty(&instance.to_data())?)?;
    println!("Instance {} saved to {:?}", instance.name, output);
    println!("{}", instance.statistics());
    Ok(())
}
