//! Benchmarking and experimentation module.
//!
//! Runs several SLS variants over a set of instances and seeds, collects one
//! record per run and aggregates them per variant.

use crate::error::SolverError;
use crate::heuristics::construction::InitialPolicy;
use crate::heuristics::neighborhood::{NeighborhoodConfig, SwapMode, TransferMode};
use crate::heuristics::sls::{Sls, SlsConfig};
use crate::instance::Instance;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// Result of a single search run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Variant name
    pub variant: String,
    /// Instance name
    pub instance: String,
    pub num_vehicles: usize,
    pub num_tasks: usize,
    pub seed: u64,
    /// Cost of the initial solution
    pub initial_cost: f64,
    /// Best cost found
    pub cost: f64,
    /// False when no initial solution could be built
    pub feasible: bool,
    /// Computation time in seconds
    pub time: f64,
    pub iterations: usize,
    pub improvements: usize,
    pub forced_escapes: usize,
    /// Gap to the best run on the same instance, in percent
    pub gap_to_best: Option<f64>,
}

/// Aggregated statistics for a variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantStatistics {
    pub variant: String,
    pub num_runs: usize,
    pub num_feasible: usize,
    pub avg_cost: f64,
    pub median_cost: f64,
    pub best_cost: f64,
    pub worst_cost: f64,
    /// Sample standard deviation of the cost (0 for a single run)
    pub std_cost: f64,
    /// Average relative improvement over the initial solution, in percent
    pub avg_improvement: f64,
    pub avg_time: f64,
    pub avg_iterations: f64,
    pub avg_gap: Option<f64>,
}

/// A named search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub config: SlsConfig,
}

impl Variant {
    pub fn new(name: &str, config: SlsConfig) -> Self {
        Variant { name: name.to_string(), config }
    }
}

/// The variants compared by default, derived from `base`
pub fn standard_variants(base: &SlsConfig) -> Vec<Variant> {
    vec![
        Variant::new("greedy", base.clone()),
        Variant::new(
            "stochastic",
            SlsConfig { p_lower: 0.6, p_upper: 0.9, ..base.clone() },
        ),
        Variant::new(
            "swap-layered",
            SlsConfig {
                neighborhood: NeighborhoodConfig { transfer: TransferMode::AllTasks, swap: SwapMode::Layered },
                ..base.clone()
            },
        ),
        Variant::new(
            "first-task",
            SlsConfig {
                neighborhood: NeighborhoodConfig { transfer: TransferMode::FirstTask, swap: SwapMode::Independent },
                ..base.clone()
            },
        ),
        Variant::new(
            "chaining-start",
            SlsConfig { initial: InitialPolicy::Chaining, ..base.clone() },
        ),
    ]
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of runs (seeds) per variant and instance
    pub num_runs: usize,
    /// Time limit per run in milliseconds
    pub time_limit_ms: u64,
    /// Optional iteration cap per run
    pub max_iterations: Option<usize>,
    /// Seed of the first run, following runs use the next seeds
    pub base_seed: u64,
    /// Run in parallel
    pub parallel: bool,
    pub show_progress: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 5,
            time_limit_ms: 5_000,
            max_iterations: None,
            base_seed: 0,
            parallel: true,
            show_progress: true,
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    variants: Vec<Variant>,
    results: Vec<RunResult>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig, variants: Vec<Variant>) -> Self {
        Benchmark {
            config,
            variants,
            results: Vec::new(),
        }
    }

    fn run_config(&self, variant: &Variant, seed: u64) -> SlsConfig {
        SlsConfig {
            time_limit_ms: self.config.time_limit_ms,
            max_iterations: self.config.max_iterations,
            seed: Some(seed),
            ..variant.config.clone()
        }
    }

    /// Run every variant with every seed on one instance
    pub fn run_instance(&mut self, instance: &Instance) -> Result<(), SolverError> {
        log::info!("Running benchmark on instance: {}", instance.name);

        let mut jobs = Vec::new();
        for variant in &self.variants {
            for run in 0..self.config.num_runs {
                let seed = self.config.base_seed + run as u64;
                variant.config.validate()?;
                jobs.push((variant, seed, self.run_config(variant, seed)));
            }
        }

        let bar = if self.config.show_progress {
            let bar = ProgressBar::new(jobs.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{bar:40}] {pos}/{len} ({elapsed})") {
                bar.set_style(style);
            }
            bar.set_message(instance.name.clone());
            bar
        } else {
            ProgressBar::hidden()
        };

        let run = |(variant, seed, config): &(&Variant, u64, SlsConfig)| {
            let record = run_once(instance, &variant.name, *seed, config.clone());
            bar.inc(1);
            record
        };
        let mut records: Vec<RunResult> = if self.config.parallel {
            jobs.par_iter().map(run).collect::<Result<Vec<_>, SolverError>>()?
        } else {
            jobs.iter().map(run).collect::<Result<Vec<_>, SolverError>>()?
        };
        bar.finish_and_clear();

        let best = records
            .iter()
            .filter(|r| r.feasible)
            .map(|r| r.cost)
            .fold(f64::INFINITY, f64::min);
        if best.is_finite() && best > 0.0 {
            for record in records.iter_mut().filter(|r| r.feasible) {
                record.gap_to_best = Some((record.cost - best) / best * 100.0);
            }
        }

        self.results.append(&mut records);
        Ok(())
    }

    /// Run benchmark on multiple instances
    pub fn run_on_instances(&mut self, instances: &[Instance]) -> Result<(), SolverError> {
        for instance in instances {
            self.run_instance(instance)?;
        }
        Ok(())
    }

    /// Compute statistics for each variant, best average cost first
    pub fn compute_statistics(&self) -> Vec<VariantStatistics> {
        let mut by_variant: HashMap<&str, Vec<&RunResult>> = HashMap::new();
        for result in &self.results {
            by_variant.entry(result.variant.as_str()).or_default().push(result);
        }

        let mut statistics: Vec<VariantStatistics> = by_variant
            .into_iter()
            .filter_map(|(variant, results)| variant_statistics(variant, &results))
            .collect();
        statistics.sort_by(|a, b| a.avg_cost.total_cmp(&b.avg_cost));
        statistics
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), SolverError> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for result in &self.results {
            writer.serialize(result)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), SolverError> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("     PDP Local Search Benchmark Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!("Generated: {}\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));
        report.push_str(&format!(
            "Runs per variant: {}, time limit: {} ms\n\n",
            self.config.num_runs, self.config.time_limit_ms
        ));

        let stats = self.compute_statistics();

        report.push_str("Variant Performance Summary:\n");
        report.push_str("-".repeat(96).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<18} {:>10} {:>12} {:>12} {:>10} {:>10} {:>10} {:>10}\n",
            "Variant", "Feasible", "Avg Cost", "Best Cost", "Std", "Improv%", "Avg Gap%", "Avg Time"
        ));
        report.push_str("-".repeat(96).as_str());
        report.push('\n');

        for stat in &stats {
            let gap_str = stat
                .avg_gap
                .map(|g| format!("{:.2}%", g))
                .unwrap_or_else(|| "-".to_string());

            report.push_str(&format!(
                "{:<18} {:>10} {:>12.2} {:>12.2} {:>10.2} {:>10.2} {:>10} {:>10.3}\n",
                stat.variant,
                format!("{}/{}", stat.num_feasible, stat.num_runs),
                stat.avg_cost,
                stat.best_cost,
                stat.std_cost,
                stat.avg_improvement,
                gap_str,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(96).as_str());
        report.push('\n');

        report.push_str("\nBest Solutions per Instance:\n");

        let mut instance_best: Vec<&RunResult> = Vec::new();
        for result in self.results.iter().filter(|r| r.feasible) {
            match instance_best.iter_mut().find(|b| b.instance == result.instance) {
                Some(best) if result.cost < best.cost => *best = result,
                Some(_) => {}
                None => instance_best.push(result),
            }
        }

        for best in &instance_best {
            report.push_str(&format!(
                "  {}: {:.2} ({}, seed {})\n",
                best.instance, best.cost, best.variant, best.seed
            ));
        }

        report
    }

    /// Get all results
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }
}

/// One search run. Only an invalid configuration is an error; an instance
/// without initial solution gives an infeasible record.
fn run_once(instance: &Instance, variant: &str, seed: u64, config: SlsConfig) -> Result<RunResult, SolverError> {
    let mut record = RunResult {
        variant: variant.to_string(),
        instance: instance.name.clone(),
        num_vehicles: instance.num_vehicles(),
        num_tasks: instance.num_tasks(),
        seed,
        initial_cost: f64::INFINITY,
        cost: f64::INFINITY,
        feasible: false,
        time: 0.0,
        iterations: 0,
        improvements: 0,
        forced_escapes: 0,
        gap_to_best: None,
    };

    let mut sls = Sls::new(instance, config)?;
    match sls.run() {
        Ok(result) => {
            record.initial_cost = result.initial_cost;
            record.cost = result.best.total_cost();
            record.feasible = result.best.is_capacity_feasible(instance);
            record.time = result.computation_time;
            record.iterations = result.iterations;
            record.improvements = result.improvements;
            record.forced_escapes = result.forced_escapes;
        }
        Err(e) => {
            log::warn!("{} on {} (seed {}): {}", variant, instance.name, seed, e);
        }
    }
    Ok(record)
}

fn variant_statistics(variant: &str, results: &[&RunResult]) -> Option<VariantStatistics> {
    let feasible: Vec<&RunResult> = results.iter().copied().filter(|r| r.feasible).collect();
    if feasible.is_empty() {
        return None;
    }

    let costs: Vec<f64> = feasible.iter().map(|r| r.cost).collect();
    let times: Vec<f64> = feasible.iter().map(|r| r.time).collect();
    let iterations: Vec<f64> = feasible.iter().map(|r| r.iterations as f64).collect();
    let improvements: Vec<f64> = feasible
        .iter()
        .filter(|r| r.initial_cost > 0.0)
        .map(|r| (r.initial_cost - r.cost) / r.initial_cost * 100.0)
        .collect();
    let gaps: Vec<f64> = feasible.iter().filter_map(|r| r.gap_to_best).collect();

    let std_cost = if costs.len() > 1 { costs.iter().std_dev() } else { 0.0 };
    let avg_improvement = if improvements.is_empty() { 0.0 } else { improvements.iter().mean() };
    let avg_gap = if gaps.is_empty() { None } else { Some(gaps.iter().mean()) };

    Some(VariantStatistics {
        variant: variant.to_string(),
        num_runs: results.len(),
        num_feasible: feasible.len(),
        avg_cost: costs.iter().mean(),
        median_cost: Data::new(costs.clone()).median(),
        best_cost: costs.iter().copied().fold(f64::INFINITY, f64::min),
        worst_cost: costs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        std_cost,
        avg_improvement,
        avg_time: times.iter().mean(),
        avg_iterations: iterations.iter().mean(),
        avg_gap,
    })
}

/// Load every instance (`.json`, `.pdp` or `.txt`) of a directory, skipping
/// unreadable files
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> Vec<Instance> {
    let mut instances = Vec::new();

    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let known = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e, "json" | "pdp" | "txt"))
                .unwrap_or(false);
            if !known {
                continue;
            }
            match Instance::load(&path) {
                Ok(instance) => instances.push(instance),
                Err(e) => log::warn!("skipping {}: {}", path.display(), e),
            }
        }
    }

    // Smallest first
    instances.sort_by_key(|i| (i.num_tasks(), i.name.clone()));

    instances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::RandomInstanceParams;
    use crate::test_utils::line_instance;

    fn quick_config() -> BenchmarkConfig {
        BenchmarkConfig {
            num_runs: 3,
            time_limit_ms: 60_000,
            max_iterations: Some(10),
            base_seed: 1,
            parallel: true,
            show_progress: false,
        }
    }

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.num_runs, 5);
        assert!(standard_variants(&SlsConfig::default()).iter().all(|v| v.config.validate().is_ok()));
    }

    #[test]
    fn test_run_instance_records_every_run() {
        let params = RandomInstanceParams { num_tasks: 8, ..Default::default() };
        let instance = Instance::random(&params, 3).unwrap();
        let variants = standard_variants(&SlsConfig::default());
        let mut benchmark = Benchmark::new(quick_config(), variants);

        benchmark.run_instance(&instance).unwrap();
        assert_eq!(benchmark.results().len(), 5 * 3);
        assert!(benchmark.results().iter().all(|r| r.feasible && r.cost <= r.initial_cost + 1e-9));
        assert!(benchmark.results().iter().any(|r| r.gap_to_best == Some(0.0)));

        let stats = benchmark.compute_statistics();
        assert_eq!(stats.len(), 5);
        assert!(stats.windows(2).all(|w| w[0].avg_cost <= w[1].avg_cost));
        for stat in &stats {
            assert!(stat.best_cost <= stat.median_cost && stat.median_cost <= stat.worst_cost);
        }

        let report = benchmark.generate_report();
        assert!(report.contains("stochastic"));
        assert!(report.contains(&instance.name));
    }

    #[test]
    fn test_unsolvable_instance_gives_infeasible_records() {
        let instance = line_instance(&[(5, 1.0, 0)], &[(1, 2, 6)]);
        let config = BenchmarkConfig { parallel: false, ..quick_config() };
        let mut benchmark = Benchmark::new(config, vec![Variant::new("greedy", SlsConfig::default())]);

        benchmark.run_instance(&instance).unwrap();
        assert_eq!(benchmark.results().len(), 3);
        assert!(benchmark.results().iter().all(|r| !r.feasible));
        assert!(benchmark.compute_statistics().is_empty());
    }

    #[test]
    fn test_invalid_variant_is_rejected() {
        let instance = line_instance(&[(10, 1.0, 0)], &[(1, 2, 1)]);
        let bad = SlsConfig { p_lower: 2.0, ..Default::default() };
        let mut benchmark = Benchmark::new(quick_config(), vec![Variant::new("bad", bad)]);

        assert!(matches!(benchmark.run_instance(&instance), Err(SolverError::Config(_))));
    }
}
