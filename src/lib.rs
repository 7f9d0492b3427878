// ABOUTME: Library root for shipwright - the release orchestrator core.
// ABOUTME: The main binary is in main.rs.

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod output;
pub mod release;
pub mod types;
pub mod workflow;
