//! Stochastic local search driver.
//!
//! Starting from an initial solution, each iteration picks a busy vehicle,
//! expands the neighborhood of the current ("home") solution around it, feeds
//! the lowest-cost candidates to the elite archive, then moves to the best
//! candidate, stays home, or jumps to a random candidate depending on a
//! uniform draw. After too many iterations without archive improvement a
//! random candidate is forced.

use crate::error::{ConfigError, InfeasibleFleetError, SolverError};
use crate::heuristics::archive::EliteArchive;
use crate::heuristics::construction::InitialPolicy;
use crate::heuristics::neighborhood::{NeighborhoodConfig, NeighborhoodGenerator};
use crate::instance::Instance;
use crate::solution::Solution;
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

/// Stochastic local search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlsConfig {
    /// Wall-clock budget in milliseconds
    pub time_limit_ms: u64,
    /// Subtracted from the budget so a result is ready before the hard cutoff
    pub safety_margin_ms: u64,
    /// Number of solutions kept in the elite archive
    pub archive_size: usize,
    /// Draws below this move to the best candidate
    pub p_lower: f64,
    /// Draws above this move to a random candidate, the others stay home
    pub p_upper: f64,
    /// Iterations without archive improvement before a forced random move
    pub max_repeat: usize,
    /// Initial solution construction
    pub initial: InitialPolicy,
    pub neighborhood: NeighborhoodConfig,
    /// Random seed, drawn from the OS when absent
    pub seed: Option<u64>,
    /// Stop after this many iterations even if time remains
    pub max_iterations: Option<usize>,
}

impl Default for SlsConfig {
    fn default() -> Self {
        SlsConfig {
            time_limit_ms: 30_000,
            safety_margin_ms: 500,
            archive_size: 10,
            p_lower: 1.0,
            p_upper: 1.0,
            max_repeat: 10,
            initial: InitialPolicy::Auto,
            neighborhood: NeighborhoodConfig::default(),
            seed: None,
            max_iterations: None,
        }
    }
}

impl SlsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_unit = |p: f64| (0.0..=1.0).contains(&p);
        if !in_unit(self.p_lower) || !in_unit(self.p_upper) || self.p_lower > self.p_upper {
            return Err(ConfigError(format!(
                "acceptance thresholds must satisfy 0 <= p_lower <= p_upper <= 1 (got {} and {})",
                self.p_lower, self.p_upper
            )));
        }
        if self.archive_size == 0 {
            return Err(ConfigError("archive_size must be at least 1".to_string()));
        }
        if self.max_repeat == 0 {
            return Err(ConfigError("max_repeat must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Search budget once the safety margin is taken off
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms.saturating_sub(self.safety_margin_ms))
    }

    /// Read a configuration from a JSON file, missing fields take their default
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, SolverError> {
        let text = std::fs::read_to_string(path)?;
        let config: SlsConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Initializing,
    Searching,
    Done,
}

/// Where the search goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Lowest-cost candidate
    LocalMin,
    /// Keep the current solution
    Home,
    /// Uniformly random candidate
    Random,
    /// Random candidate forced by stagnation
    Escape,
}

/// Acceptance rule of the search
#[derive(Debug, Clone, Copy)]
pub struct AcceptancePolicy {
    pub p_lower: f64,
    pub p_upper: f64,
    pub max_repeat: usize,
}

impl AcceptancePolicy {
    pub fn from_config(config: &SlsConfig) -> Self {
        AcceptancePolicy {
            p_lower: config.p_lower,
            p_upper: config.p_upper,
            max_repeat: config.max_repeat,
        }
    }

    /// Decide from a draw `x` in `[0, 1)` and the current stagnation count
    pub fn choose(&self, x: f64, stagnation: usize) -> Choice {
        if stagnation >= self.max_repeat {
            Choice::Escape
        } else if x < self.p_lower {
            Choice::LocalMin
        } else if x <= self.p_upper {
            Choice::Home
        } else {
            Choice::Random
        }
    }
}

/// Outcome of a search
#[derive(Debug, Clone, Serialize)]
pub struct SlsResult {
    /// First element of the archive
    pub best: Solution,
    pub archive: Vec<Solution>,
    pub initial_cost: f64,
    pub iterations: usize,
    /// Iterations whose merge admitted a new solution into the archive
    pub improvements: usize,
    pub forced_escapes: usize,
    /// Seconds
    pub computation_time: f64,
    /// `(iteration, cost)` each time the best archived cost went down
    pub best_cost_history: Vec<(usize, f64)>,
}

/// Stochastic local search driver
pub struct Sls<'a> {
    instance: &'a Instance,
    config: SlsConfig,
    generator: NeighborhoodGenerator,
    policy: AcceptancePolicy,
    rng: ChaCha8Rng,
    state: DriverState,
    archive: EliteArchive,
    home: Option<Solution>,
    stagnation: usize,
    initial_cost: f64,
    iterations: usize,
    improvements: usize,
    forced_escapes: usize,
    best_cost_history: Vec<(usize, f64)>,
}

impl<'a> Sls<'a> {
    pub fn new(instance: &'a Instance, config: SlsConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(Sls {
            instance,
            generator: NeighborhoodGenerator::new(&config.neighborhood),
            policy: AcceptancePolicy::from_config(&config),
            archive: EliteArchive::new(config.archive_size),
            config,
            rng,
            state: DriverState::Initializing,
            home: None,
            stagnation: 0,
            initial_cost: 0.0,
            iterations: 0,
            improvements: 0,
            forced_escapes: 0,
            best_cost_history: Vec::new(),
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn config(&self) -> &SlsConfig {
        &self.config
    }

    pub fn archive(&self) -> &EliteArchive {
        &self.archive
    }

    /// Solution the next iteration expands
    pub fn home(&self) -> Option<&Solution> {
        self.home.as_ref()
    }

    /// Build the initial solution and seed the archive with it
    pub fn initialize(&mut self) -> Result<(), InfeasibleFleetError> {
        let heuristic = self.config.initial.heuristic(self.instance);
        let initial = heuristic.construct(self.instance)?;
        log::info!(
            "SLS on {}: initial cost {:.2} ({}), {} vehicles, {} tasks",
            self.instance.name,
            initial.total_cost(),
            heuristic.name(),
            self.instance.num_vehicles(),
            self.instance.num_tasks()
        );

        self.initial_cost = initial.total_cost();
        self.best_cost_history.push((0, initial.total_cost()));
        self.archive.add(initial.clone());
        self.home = Some(initial);
        self.state = DriverState::Searching;
        Ok(())
    }

    /// Run one iteration. Returns `false` once the search is over.
    pub fn step(&mut self) -> bool {
        if self.state != DriverState::Searching {
            return false;
        }
        let home = match self.home.take() {
            Some(home) => home,
            None => {
                self.state = DriverState::Done;
                return false;
            }
        };

        let busy = home.busy_vehicles();
        let source = match busy.choose(&mut self.rng) {
            Some(&vehicle) => vehicle,
            None => {
                log::debug!("no vehicle has a task, nothing to search");
                self.home = Some(home);
                self.state = DriverState::Done;
                return false;
            }
        };

        let mut candidates = Vec::new();
        candidates.push(home.clone());
        candidates.extend(self.generator.generate(self.instance, &home, source));
        // Stable: on equal cost the home solution stays first
        candidates.sort_by_key(|s| OrderedFloat(s.total_cost()));

        let k = self.archive.capacity().min(candidates.len());
        let best_local = candidates[0].total_cost();
        let admitted = match self.archive.worst_cost() {
            Some(worst) if self.archive.is_full() && best_local > worst => 0,
            _ => self.archive.merge(candidates[..k].iter().cloned()),
        };

        self.iterations += 1;
        if admitted > 0 {
            self.improvements += 1;
            self.stagnation = 0;
            self.record_best();
        } else {
            self.stagnation += 1;
        }

        let x: f64 = self.rng.gen();
        let next = match self.policy.choose(x, self.stagnation) {
            Choice::LocalMin => candidates.swap_remove(0),
            Choice::Home => home,
            Choice::Random => self.random_candidate(candidates, home),
            Choice::Escape => {
                log::debug!(
                    "iteration {}: no improvement for {} iterations, forcing a random move",
                    self.iterations,
                    self.stagnation
                );
                self.stagnation = 0;
                self.forced_escapes += 1;
                self.random_candidate(candidates, home)
            }
        };
        self.home = Some(next);
        true
    }

    fn random_candidate(&mut self, mut candidates: Vec<Solution>, home: Solution) -> Solution {
        if candidates.is_empty() {
            return home;
        }
        let index = self.rng.gen_range(0..candidates.len());
        candidates.swap_remove(index)
    }

    fn record_best(&mut self) {
        let Some(best) = self.archive.best() else {
            return;
        };
        let cost = best.total_cost();
        let improved = self.best_cost_history.last().map_or(true, |&(_, last)| cost < last);
        if improved {
            log::debug!("iteration {}: new best cost {:.2}", self.iterations, cost);
            self.best_cost_history.push((self.iterations, cost));
        }
    }

    fn budget_exhausted(&self, start: Instant, deadline: Duration) -> bool {
        if start.elapsed() >= deadline {
            return true;
        }
        matches!(self.config.max_iterations, Some(max) if self.iterations >= max)
    }

    /// Run the search until the deadline and return the archive
    pub fn run(&mut self) -> Result<SlsResult, InfeasibleFleetError> {
        let start = Instant::now();
        let deadline = self.config.deadline();

        if self.state == DriverState::Initializing {
            self.initialize()?;
        }

        while self.state == DriverState::Searching {
            if self.budget_exhausted(start, deadline) {
                self.state = DriverState::Done;
                break;
            }
            self.step();
        }

        let computation_time = start.elapsed().as_secs_f64();
        let archive = self.archive.solutions().to_vec();
        let best = match archive.first().or(self.home.as_ref()) {
            Some(best) => best.clone(),
            // The archive is seeded by initialize, which succeeded above
            None => self.config.initial.construct(self.instance)?,
        };

        log::info!(
            "SLS done: best cost {:.2} (initial {:.2}) after {} iterations, {} improvements, {} forced moves, {:.2}s",
            best.total_cost(),
            self.initial_cost,
            self.iterations,
            self.improvements,
            self.forced_escapes,
            computation_time
        );

        Ok(SlsResult {
            best,
            archive,
            initial_cost: self.initial_cost,
            iterations: self.iterations,
            improvements: self.improvements,
            forced_escapes: self.forced_escapes,
            computation_time,
            best_cost_history: self.best_cost_history.clone(),
        })
    }
}

/// Validate the configuration and run a search
pub fn solve(instance: &Instance, config: SlsConfig) -> Result<SlsResult, SolverError> {
    let mut sls = Sls::new(instance, config)?;
    Ok(sls.run()?)
}
