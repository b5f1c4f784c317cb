//! Relay Core
//!
//! Core types shared by the Relay worker and its orchestrator client.
//!
//! This crate contains:
//! - Domain types: Tasks as the orchestrator reports them
//! - DTOs: Request bodies sent back to the orchestrator

pub mod domain;
pub mod dto;
