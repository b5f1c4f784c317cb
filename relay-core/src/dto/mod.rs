//! Data Transfer Objects sent from the worker to the orchestrator

pub mod task;
