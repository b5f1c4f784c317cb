//! Service layer
//!
//! Services contain the per-task business logic: running the work for a
//! claimed task and mapping its outcome to a status transition.
//!
//! The work itself sits behind a trait so it can be swapped out.

mod processor;
mod work;

// Re-export traits
pub use work::WorkHandler;

// Re-export implementations
pub use processor::{ProcessOutcome, TaskProcessor};
pub use work::SimulatedWork;
