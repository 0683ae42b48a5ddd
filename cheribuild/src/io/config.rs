//! Build configuration stored in `~/.config/cheribuild.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::target::CrossTarget;
use crate::io::env::HostEnv;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV_VAR: &str = "CHERIBUILD_CONFIG";

/// Build configuration (TOML).
///
/// Empty directory fields are derived from `source_root` (itself defaulting
/// to `$HOME/cheri`) by [`CheriConfig::resolve_paths`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CheriConfig {
    /// Checkouts live in `<source_root>/<project>`.
    pub source_root: PathBuf,
    /// Defaults to `<source_root>/build`.
    pub build_root: PathBuf,
    /// Defaults to `<source_root>/output`.
    pub output_root: PathBuf,
    /// Cross toolchain SDK. Defaults to `<output_root>/sdk`.
    pub sdk_dir: PathBuf,
    /// CheriBSD root filesystem. Defaults to `<output_root>/rootfs`.
    pub cheribsd_rootfs: PathBuf,

    /// Defaults to `<sdk_dir>/bin/clang`.
    pub clang_path: Option<PathBuf>,
    /// Defaults to `<sdk_dir>/bin/clang++`.
    pub clang_plus_plus_path: Option<PathBuf>,

    /// Parallel jobs passed to make / cmake --build.
    pub make_jobs: u32,
    /// Command used for projects that require GNU make.
    pub gnu_make: String,
    pub cmake_generator: String,
    pub cmake_build_type: String,
    pub default_target: CrossTarget,

    /// Kill any single build command running longer than this.
    pub command_timeout_secs: u64,
    /// Bytes of stderr kept in memory for error reports.
    pub log_output_limit_bytes: usize,

    pub projects: BTreeMap<String, ProjectOverrides>,
}

/// Per-project settings under `[projects.<name>]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectOverrides {
    pub source_dir: Option<PathBuf>,
    pub build_dir: Option<PathBuf>,
    pub repository: Option<String>,
    pub git_branch: Option<String>,
    /// Appended to the configure (or CMake) command line.
    pub extra_args: Vec<String>,
}

impl Default for CheriConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::new(),
            build_root: PathBuf::new(),
            output_root: PathBuf::new(),
            sdk_dir: PathBuf::new(),
            cheribsd_rootfs: PathBuf::new(),
            clang_path: None,
            clang_plus_plus_path: None,
            make_jobs: default_make_jobs(),
            gnu_make: default_gnu_make().to_string(),
            cmake_generator: "Ninja".to_string(),
            cmake_build_type: "Release".to_string(),
            default_target: CrossTarget::Mips64Purecap,
            command_timeout_secs: 6 * 60 * 60,
            log_output_limit_bytes: 1_000_000,
            projects: BTreeMap::new(),
        }
    }
}

fn default_make_jobs() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

fn default_gnu_make() -> &'static str {
    if cfg!(any(target_os = "freebsd", target_os = "macos")) {
        "gmake"
    } else {
        "make"
    }
}

impl CheriConfig {
    pub fn validate(&self) -> Result<()> {
        if self.make_jobs == 0 {
            return Err(anyhow!("make_jobs must be > 0"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.log_output_limit_bytes == 0 {
            return Err(anyhow!("log_output_limit_bytes must be > 0"));
        }
        if self.gnu_make.trim().is_empty() {
            return Err(anyhow!("gnu_make must be non-empty"));
        }
        if self.cmake_generator.trim().is_empty() {
            return Err(anyhow!("cmake_generator must be non-empty"));
        }
        for (name, overrides) in &self.projects {
            if overrides
                .git_branch
                .as_deref()
                .is_some_and(|b| b.trim().is_empty())
            {
                return Err(anyhow!("projects.{name}.git_branch must be non-empty"));
            }
        }
        Ok(())
    }

    /// Fill empty directory fields from `source_root`, defaulting that to `$HOME/cheri`.
    pub fn resolve_paths(&mut self, env: &HostEnv) -> Result<()> {
        if self.source_root.as_os_str().is_empty() {
            let home = env
                .home_dir()
                .ok_or_else(|| anyhow!("source_root is not set and $HOME is unavailable"))?;
            self.source_root = home.join("cheri");
        }
        if self.build_root.as_os_str().is_empty() {
            self.build_root = self.source_root.join("build");
        }
        if self.output_root.as_os_str().is_empty() {
            self.output_root = self.source_root.join("output");
        }
        if self.sdk_dir.as_os_str().is_empty() {
            self.sdk_dir = self.output_root.join("sdk");
        }
        if self.cheribsd_rootfs.as_os_str().is_empty() {
            self.cheribsd_rootfs = self.output_root.join("rootfs");
        }
        debug!(
            source_root = %self.source_root.display(),
            build_root = %self.build_root.display(),
            output_root = %self.output_root.display(),
            "resolved config paths"
        );
        Ok(())
    }

    pub fn sdk_bin_dir(&self) -> PathBuf {
        self.sdk_dir.join("bin")
    }

    pub fn clang(&self) -> PathBuf {
        self.clang_path
            .clone()
            .unwrap_or_else(|| self.sdk_bin_dir().join("clang"))
    }

    pub fn clang_plus_plus(&self) -> PathBuf {
        self.clang_plus_plus_path
            .clone()
            .unwrap_or_else(|| self.sdk_bin_dir().join("clang++"))
    }

    /// Sysroot for a cross target; `None` for native builds.
    pub fn sysroot(&self, target: CrossTarget) -> Option<PathBuf> {
        if target.is_native() {
            return None;
        }
        Some(self.sdk_dir.join(format!("sysroot-{}", target.name())))
    }

    pub fn target_rootfs(&self, target: CrossTarget) -> PathBuf {
        self.output_root.join(format!("rootfs-{}", target.name()))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.build_root.join("logs")
    }

    pub fn project_overrides(&self, name: &str) -> Option<&ProjectOverrides> {
        self.projects.get(name)
    }
}

/// `$CHERIBUILD_CONFIG`, else `$HOME/.config/cheribuild.toml`.
pub fn default_config_path(env: &HostEnv) -> Result<PathBuf> {
    if let Some(path) = env.get(CONFIG_ENV_VAR)
        && !path.is_empty()
    {
        return Ok(PathBuf::from(path));
    }
    let home = env
        .home_dir()
        .ok_or_else(|| anyhow!("cannot locate config: neither ${CONFIG_ENV_VAR} nor $HOME set"))?;
    Ok(home.join(".config").join("cheribuild.toml"))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CheriConfig::default()`.
pub fn load_config(path: &Path) -> Result<CheriConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = CheriConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CheriConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CheriConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
