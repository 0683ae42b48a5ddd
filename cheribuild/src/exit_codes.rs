//! Stable exit codes for cheribuild CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// A build step (update, configure, compile, install) failed.
pub const BUILD_FAILED: i32 = 1;
/// Invalid invocation: unknown target, unreadable or invalid config.
pub const INVALID: i32 = 2;
