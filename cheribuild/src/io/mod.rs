//! Side-effecting helpers: configuration, environment, processes, git, and
//! filesystem guards.

pub mod config;
pub mod env;
pub mod git;
pub mod process;
pub mod runner;
pub mod stash;
