//! Core domain types
//!
//! The worker never owns these entities. It holds a read-only snapshot of
//! each task for the duration of one poll cycle.

pub mod task;
