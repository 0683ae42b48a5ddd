//! Cross-compilation build tool for CHERI targets.
//!
//! Selects projects by name (`boost`, `gdb`, ...) and runs their lifecycle:
//! fetch sources, configure, compile, install.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::error;

use cheribuild::build::{BuildOptions, build_targets, select_recipes};
use cheribuild::context::BuildContext;
use cheribuild::core::target::CrossTarget;
use cheribuild::exit_codes;
use cheribuild::io::config::{CheriConfig, default_config_path, load_config, write_config};
use cheribuild::io::env::HostEnv;
use cheribuild::io::runner::ProcessRunner;
use cheribuild::logging;
use cheribuild::recipes::Registry;
use cheribuild::resolve::resolve_project;

#[derive(Parser)]
#[command(
    name = "cheribuild",
    version,
    about = "Build third-party projects for CHERI and related cross targets"
)]
struct Cli {
    /// Config file (default: $CHERIBUILD_CONFIG, else ~/.config/cheribuild.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the names of all known targets.
    List,
    /// Print the resolved configuration of a target as JSON.
    Show {
        target: String,
        /// Architecture for projects that do not pin one.
        #[arg(long)]
        target_arch: Option<CrossTarget>,
    },
    /// Fetch, configure, compile, and install targets in the given order.
    Build {
        #[arg(required = true)]
        targets: Vec<String>,
        /// Print commands instead of running them.
        #[arg(short, long)]
        pretend: bool,
        #[arg(long)]
        skip_update: bool,
        #[arg(long)]
        skip_configure: bool,
        #[arg(long)]
        skip_compile: bool,
        #[arg(long)]
        skip_install: bool,
        /// Remove the build directory first.
        #[arg(long)]
        clean: bool,
        /// Parallel jobs (overrides `make_jobs`).
        #[arg(short = 'j', long)]
        jobs: Option<u32>,
        #[arg(long)]
        target_arch: Option<CrossTarget>,
    },
    /// Write the default config file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let env = HostEnv::capture();
    match cli.command {
        Command::List => cmd_list(),
        Command::Show {
            target,
            target_arch,
        } => {
            let path = config_path(cli.config, &env)?;
            cmd_show(load_context(&path, env, target_arch, None)?, &target)
        }
        Command::Build {
            targets,
            pretend,
            skip_update,
            skip_configure,
            skip_compile,
            skip_install,
            clean,
            jobs,
            target_arch,
        } => {
            let path = config_path(cli.config, &env)?;
            let ctx = load_context(&path, env, target_arch, jobs)?;
            let options = BuildOptions {
                skip_update,
                skip_configure,
                skip_compile,
                skip_install,
                clean,
            };
            cmd_build(&ctx, &targets, &options, pretend)
        }
        Command::InitConfig { force } => {
            let path = config_path(cli.config, &env)?;
            cmd_init_config(&path, env, force)
        }
    }
}

fn config_path(explicit: Option<PathBuf>, env: &HostEnv) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => default_config_path(env),
    }
}

fn load_context(
    path: &Path,
    env: HostEnv,
    target: Option<CrossTarget>,
    jobs: Option<u32>,
) -> Result<BuildContext> {
    let mut config = load_config(path)?;
    if let Some(jobs) = jobs {
        config.make_jobs = jobs;
    }
    BuildContext::new(config, env, target)
}

fn cmd_list() -> Result<i32> {
    for name in Registry::builtin().names() {
        println!("{name}");
    }
    Ok(exit_codes::OK)
}

fn cmd_show(ctx: BuildContext, target: &str) -> Result<i32> {
    let registry = Registry::builtin();
    let project = resolve_project(registry.require(target)?, &ctx)?;
    println!("{}", serde_json::to_string_pretty(&project)?);
    Ok(exit_codes::OK)
}

fn cmd_build(
    ctx: &BuildContext,
    targets: &[String],
    options: &BuildOptions,
    pretend: bool,
) -> Result<i32> {
    let registry = Registry::builtin();
    let recipes = select_recipes(&registry, targets)?;
    let runner = ProcessRunner {
        pretend,
        timeout: Duration::from_secs(ctx.config.command_timeout_secs),
        output_limit_bytes: ctx.config.log_output_limit_bytes,
        log_dir: Some(ctx.config.logs_dir()),
    };
    match build_targets(ctx, &recipes, options, &runner) {
        Ok(outcomes) => {
            for outcome in outcomes {
                println!("built {} ({})", outcome.project, outcome.target);
            }
            Ok(exit_codes::OK)
        }
        Err(err) => {
            error!("build failed");
            eprintln!("error: {:#}", err);
            Ok(exit_codes::BUILD_FAILED)
        }
    }
}

fn cmd_init_config(path: &Path, env: HostEnv, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let mut config = CheriConfig::default();
    config.resolve_paths(&env)?;
    write_config(path, &config)?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_build_flags() {
        let cli = Cli::parse_from([
            "cheribuild",
            "build",
            "gdb",
            "boost",
            "--pretend",
            "-j",
            "16",
            "--target-arch",
            "riscv64-purecap",
        ]);
        match cli.command {
            Command::Build {
                targets,
                pretend,
                jobs,
                target_arch,
                skip_update,
                ..
            } => {
                assert_eq!(targets, vec!["gdb", "boost"]);
                assert!(pretend);
                assert!(!skip_update);
                assert_eq!(jobs, Some(16));
                assert_eq!(target_arch, Some(CrossTarget::Riscv64Purecap));
            }
            _ => panic!("expected build command"),
        }
    }

    #[test]
    fn build_requires_a_target() {
        assert!(Cli::try_parse_from(["cheribuild", "build"]).is_err());
    }

    #[test]
    fn parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["cheribuild", "list", "--config", "/tmp/cb.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/cb.toml")));
        assert!(matches!(cli.command, Command::List));
    }

    #[test]
    fn parse_init_config_force() {
        let cli = Cli::parse_from(["cheribuild", "init-config", "--force"]);
        assert!(matches!(cli.command, Command::InitConfig { force: true }));
    }
}
