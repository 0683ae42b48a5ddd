//! Deterministic, pure types shared by the build lifecycle.
//!
//! Core modules must be free of I/O side effects. They describe targets,
//! flags, options, and project records as plain data.

pub mod flags;
pub mod options;
pub mod project;
pub mod target;
