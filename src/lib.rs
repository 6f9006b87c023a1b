//! Agent Cluster: a task orchestrator that routes queued work to
//! concurrently running agents.

pub mod agent;
pub mod config;
pub mod controller;
pub mod error;
pub mod llm;
pub mod logging;
pub mod memory;

pub use error::{Error, Result};
