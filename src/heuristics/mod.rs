//! Search heuristics for the pickup and delivery planner.
//!
//! Initial construction, neighborhood operators, the elite archive and the
//! stochastic local search driver that ties them together.

pub mod construction;
pub mod neighborhood;
pub mod archive;
pub mod sls;

pub use construction::*;
pub use neighborhood::*;
pub use archive::*;
pub use sls::*;
