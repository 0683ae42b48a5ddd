//! Explicit context threaded through every lifecycle hook.

use anyhow::Result;

use crate::core::target::CrossTarget;
use crate::io::config::CheriConfig;
use crate::io::env::HostEnv;

/// Everything a recipe may consult: resolved config, selected target, and a
/// snapshot of the host environment.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub config: CheriConfig,
    pub env: HostEnv,
    /// Target requested for projects that do not pin one.
    pub target: CrossTarget,
}

impl BuildContext {
    /// Resolve config paths against `env` and select `target` (or the config default).
    pub fn new(mut config: CheriConfig, env: HostEnv, target: Option<CrossTarget>) -> Result<Self> {
        config.resolve_paths(&env)?;
        config.validate()?;
        let target = target.unwrap_or(config.default_target);
        Ok(Self {
            config,
            env,
            target,
        })
    }
}
