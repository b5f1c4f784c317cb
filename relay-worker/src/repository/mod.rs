//! Repository layer
//!
//! The worker reaches the orchestrator only through [`TaskRepository`], so
//! the processor and scheduler can be exercised without a network.

mod tasks;

pub use tasks::TaskRepository;
