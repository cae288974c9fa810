//! stressjudge - Differential Stress Testing for Competitive Programming
//!
//! Given a brute-force solution, a candidate solution and a test generator,
//! stressjudge generates inputs forever, runs both solutions on each one and
//! stops at the first input where their outputs differ, saving it to disk.
//!
//! # Architecture
//!
//! - **Template**: placeholder expansion and command splitting
//! - **Resolver**: naming pattern to source file and code template
//! - **Runner**: one external process per call, stdin in, stdout out
//! - **Verdict**: whitespace-insensitive output comparison
//! - **Stress**: the worker pool with stop-on-first-failure
//! - **CLI**: `stress` and `config` commands

pub mod cli;
pub mod config;
pub mod console;
pub mod constants;
pub mod error;
pub mod resolver;
pub mod runner;
pub mod stress;
pub mod template;
pub mod utils;
pub mod verdict;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, AppResult};
pub use stress::{PreparedRun, RunOutcome, RunReport, StressRequest, StressTester};
