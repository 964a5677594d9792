//! The coding agent: decision parsing, prompt building and the run loop.
//!
//! [`AgentLoop`] owns the per-run [`state::AgentState`]; tools are reached only
//! through the shared registry.

pub mod agent_loop;
pub mod decision;
pub mod prompt;
pub mod state;

pub use agent_loop::{AgentConfig, AgentLoop};
