//! Test-only helpers: recording command runner and context builders.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::context::BuildContext;
use crate::core::target::CrossTarget;
use crate::io::config::CheriConfig;
use crate::io::env::HostEnv;
use crate::io::runner::{CommandRunner, Invocation};

type Probe = Box<dyn Fn(&Invocation)>;

/// Runner that records invocations instead of spawning processes.
#[derive(Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<Invocation>>,
    fail_on: Option<String>,
    probe: Option<Probe>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any invocation whose program or arguments contain `needle`.
    pub fn failing_on(needle: impl Into<String>) -> Self {
        Self {
            fail_on: Some(needle.into()),
            ..Self::default()
        }
    }

    /// Call `probe` while each command "runs" (before success/failure is decided).
    pub fn with_probe(mut self, probe: impl Fn(&Invocation) + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        self.calls.borrow_mut().push(invocation.clone());
        if let Some(probe) = &self.probe {
            probe(invocation);
        }
        if let Some(needle) = &self.fail_on {
            let hit = invocation.program.contains(needle.as_str())
                || invocation.args.iter().any(|a| a.contains(needle.as_str()));
            if hit {
                return Err(anyhow!("scripted failure: {}", invocation.command_line()));
            }
        }
        Ok(())
    }
}

/// Config rooted at `root` (`src/`, `build/`, `output/`) with 4 jobs and GNU make as `make`.
pub fn test_config(root: &Path) -> CheriConfig {
    CheriConfig {
        source_root: root.join("src"),
        build_root: root.join("build"),
        output_root: root.join("output"),
        make_jobs: 4,
        gnu_make: "make".to_string(),
        ..CheriConfig::default()
    }
}

pub fn test_context(root: &Path, target: CrossTarget) -> BuildContext {
    test_context_with_env(root, target, HostEnv::default())
}

pub fn test_context_with_env(root: &Path, target: CrossTarget, env: HostEnv) -> BuildContext {
    BuildContext::new(test_config(root), env, Some(target)).expect("test context")
}

/// Create the SDK bin dir under `root` containing the given files.
pub fn populate_sdk_bin(root: &Path, names: &[&str]) -> PathBuf {
    let bin = root.join("output/sdk/bin");
    std::fs::create_dir_all(&bin).expect("create sdk bin");
    for name in names {
        std::fs::write(bin.join(name), format!("#!/bin/sh\n# {name}\n")).expect("write tool");
    }
    bin
}
