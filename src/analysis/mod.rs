//! Post-run analysis of a finished history.

pub mod evaluator;

pub use evaluator::{
    execution_count, failure_count, files_written, last_execution, tool_usage, verdict,
};
