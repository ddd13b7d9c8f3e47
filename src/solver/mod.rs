//! Solver-side connections.
//!
//! Solvers produce data instead of querying it, and their channels are much
//! simpler than the client's: one frame in flight at a time, no tickets, no
//! background task. Each connection owns its stream and reuses the shared
//! wire primitives.
//!
//! - [`SolverWorldModel`] pushes solved attributes into a world model
//! - [`SolverAggregator`] subscribes to raw sensor samples
//! - [`SolverDistributor`] publishes solutions to a distributor

mod aggregator;
mod distributor;
mod world_model;

pub use aggregator::SolverAggregator;
pub use distributor::SolverDistributor;
pub use world_model::{SolverWorldModel, TransientCallback};
