//! PDP SLS Solver Library
//!
//! Assigns pickup-and-delivery tasks to a fleet of capacity-constrained
//! vehicles and orders each vehicle's events to minimize the weighted travel
//! distance, under a wall-clock deadline.
//!
//! # Features
//!
//! - Per-vehicle agendas with a prefix-load capacity check
//! - Initial solutions (round-robin, first-fit, chaining)
//! - Task transfer and task swap neighborhoods
//! - Bounded elite archive of distinct solutions
//! - Stochastic local search with configurable acceptance thresholds
//! - Action plans along shortest paths, benchmarking tools
//!
//! # Example
//!
//! ```no_run
//! use pdp_sls_solver::instance::Instance;
//! use pdp_sls_solver::heuristics::sls::{Sls, SlsConfig};
//! use pdp_sls_solver::plan::materialize;
//!
//! // Load instance
//! let instance = Instance::load("instance.json").unwrap();
//!
//! // Search for five seconds
//! let config = SlsConfig { time_limit_ms: 5_000, seed: Some(42), ..Default::default() };
//! let mut sls = Sls::new(&instance, config).unwrap();
//! let result = sls.run().unwrap();
//!
//! println!("Solution cost: {:.2}", result.best.total_cost());
//! for plan in materialize(&instance, &result.best) {
//!     println!("vehicle {}: {} actions", plan.vehicle, plan.actions.len());
//! }
//! ```

pub mod error;
pub mod instance;
pub mod agenda;
pub mod solution;
pub mod heuristics;
pub mod plan;
pub mod benchmark;

#[cfg(test)]
mod test_utils;

pub use error::{InfeasibleFleetError, SolverError, StructuralError};
pub use instance::Instance;
pub use solution::Solution;
