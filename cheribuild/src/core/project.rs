//! Project records: the declarative spec a recipe returns and the resolved
//! per-invocation project the lifecycle runs against.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::flags::CompilerFlags;
use crate::core::options::{CMakeOptions, EnvVars};
use crate::core::target::{CrossTarget, Linker};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRepository {
    pub url: String,
    /// Branch to check out; `None` uses the remote default.
    pub branch: Option<String>,
}

impl GitRepository {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    CMake,
    Autotools,
}

/// How a project picks its cross target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetPolicy {
    /// Use the target selected by config or the command line.
    Configured,
    /// Always build for this target regardless of the selection.
    Fixed(CrossTarget),
}

impl TargetPolicy {
    pub fn select(self, requested: CrossTarget) -> CrossTarget {
        match self {
            TargetPolicy::Configured => requested,
            TargetPolicy::Fixed(target) => target,
        }
    }
}

/// Where `install` places files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallLocation {
    /// `<output_root>/rootfs-<target>` with prefix `/usr/local`.
    TargetRootfs,
    /// The CheriBSD root filesystem with prefix `/usr/local`.
    CheriBsdRootfs,
}

/// Declarative description of a project, returned by its recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub name: String,
    pub repository: GitRepository,
    pub build_system: BuildSystem,
    pub target: TargetPolicy,
    pub install: InstallLocation,
    pub linker: Linker,
    pub optimization: Vec<String>,
    pub requires_gnu_make: bool,
}

impl ProjectSpec {
    pub fn new(name: impl Into<String>, repository: GitRepository, build_system: BuildSystem) -> Self {
        Self {
            name: name.into(),
            repository,
            build_system,
            target: TargetPolicy::Configured,
            install: InstallLocation::TargetRootfs,
            linker: Linker::Lld,
            optimization: vec!["-O2".to_string()],
            requires_gnu_make: false,
        }
    }
}

/// A project resolved against the build context, ready for the lifecycle.
///
/// Built fresh for every invocation; recipes extend the lists in `setup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub spec: ProjectSpec,
    pub target: CrossTarget,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub install_prefix: PathBuf,
    /// Staging root passed as `DESTDIR` during install.
    pub destdir: Option<PathBuf>,
    pub sysroot: Option<PathBuf>,
    pub sdk_bin_dir: PathBuf,
    pub make_command: String,
    pub make_jobs: u32,
    pub cc: PathBuf,
    pub cxx: PathBuf,
    pub host_cc: String,
    pub host_cxx: String,
    pub flags: CompilerFlags,
    pub cmake_options: CMakeOptions,
    pub configure_args: Vec<String>,
    pub configure_env: EnvVars,
    pub common_make_args: Vec<String>,
    /// User-supplied arguments appended to the configure step.
    pub extra_args: Vec<String>,
}

impl Project {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// `-j<N>` for make invocations.
    pub fn make_j_flag(&self) -> String {
        format!("-j{}", self.make_jobs)
    }

    pub fn target_flags(&self) -> Vec<String> {
        let mut flags = self.target.compiler_flags();
        if let Some(sysroot) = &self.sysroot {
            flags.push(format!("--sysroot={}", sysroot.display()));
        }
        flags
    }

    pub fn cflags(&self) -> String {
        self.flags.render_cflags(&self.target_flags())
    }

    pub fn cxxflags(&self) -> String {
        self.flags.render_cxxflags(&self.target_flags())
    }

    pub fn ldflags(&self) -> String {
        self.flags
            .render_ldflags(&self.target_flags(), self.spec.linker)
    }
}
