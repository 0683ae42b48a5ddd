//! Cross-compilation build tool for CHERI targets.
//!
//! Projects are described by recipes ([`recipes`]) that plug into a fixed
//! lifecycle: update sources, configure, compile, install. The crate keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure data (targets, flags, CMake options, project records).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config files, git, processes,
//!   renaming toolchain binaries). Isolated behind small types and the
//!   [`io::runner::CommandRunner`] trait.
//!
//! Orchestration modules ([`resolve`], [`lifecycle`], [`build`]) combine the
//! two to implement CLI commands.

pub mod build;
pub mod context;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod lifecycle;
pub mod logging;
pub mod recipes;
pub mod resolve;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
