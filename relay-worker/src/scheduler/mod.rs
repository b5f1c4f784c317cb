//! Scheduler layer for the worker
//!
//! This layer drives the poll cycle: list pending tasks, hand each to the
//! processor, sleep, repeat until shutdown is requested.

pub mod poller;

pub use poller::TaskPoller;
