//! Orchestration for `cheribuild build`.
//!
//! A build of one target runs: resolve → update sources → (clean) →
//! configure → compile → install. Targets are built one after another and
//! the first failure stops the run.

use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, info_span, instrument};

use crate::context::BuildContext;
use crate::core::project::Project;
use crate::core::target::CrossTarget;
use crate::io::git::Git;
use crate::io::runner::CommandRunner;
use crate::recipes::{Recipe, Registry};
use crate::resolve::resolve_project;

/// Which lifecycle phases to skip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub skip_update: bool,
    pub skip_configure: bool,
    pub skip_compile: bool,
    pub skip_install: bool,
    /// Remove the build directory before configuring.
    pub clean: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Update,
    Clean,
    Configure,
    Compile,
    Install,
}

/// What happened while building one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub project: String,
    pub target: CrossTarget,
    pub phases: Vec<Phase>,
}

/// Look up every name, failing on the first unknown one before anything is built.
pub fn select_recipes<'r>(
    registry: &'r Registry,
    names: &[String],
) -> Result<Vec<&'r dyn Recipe>> {
    names.iter().map(|name| registry.require(name)).collect()
}

/// Build `recipes` in order, stopping at the first failure.
pub fn build_targets(
    ctx: &BuildContext,
    recipes: &[&dyn Recipe],
    options: &BuildOptions,
    runner: &dyn CommandRunner,
) -> Result<Vec<BuildOutcome>> {
    let mut outcomes = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let name = recipe.spec().name;
        let outcome =
            build_target(ctx, *recipe, options, runner).with_context(|| format!("build {name}"))?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[instrument(skip_all, fields(project = %recipe.spec().name))]
pub fn build_target(
    ctx: &BuildContext,
    recipe: &dyn Recipe,
    options: &BuildOptions,
    runner: &dyn CommandRunner,
) -> Result<BuildOutcome> {
    let started = Instant::now();
    let project = resolve_project(recipe, ctx)?;
    let pretend = runner.pretend();
    let mut phases = Vec::new();
    info!(arch = %project.target, pretend, "building {}", project.name());

    if !options.skip_update {
        let _span = info_span!("update").entered();
        update_sources(&project, pretend)?;
        phases.push(Phase::Update);
    }

    if options.clean {
        let _span = info_span!("clean").entered();
        clean_build_dir(&project, pretend)?;
        phases.push(Phase::Clean);
    }

    if !pretend {
        fs::create_dir_all(&project.build_dir)
            .with_context(|| format!("create build dir {}", project.build_dir.display()))?;
    }

    if !options.skip_configure {
        let _span = info_span!("configure").entered();
        recipe
            .configure(ctx, &project, runner)
            .context("configure")?;
        phases.push(Phase::Configure);
    }
    if !options.skip_compile {
        let _span = info_span!("compile").entered();
        recipe.compile(ctx, &project, runner).context("compile")?;
        phases.push(Phase::Compile);
    }
    if !options.skip_install {
        let _span = info_span!("install").entered();
        recipe.install(ctx, &project, runner).context("install")?;
        phases.push(Phase::Install);
    }

    info!(
        elapsed_secs = started.elapsed().as_secs(),
        "finished {}",
        project.name()
    );
    Ok(BuildOutcome {
        project: project.name().to_string(),
        target: project.target,
        phases,
    })
}

fn update_sources(project: &Project, pretend: bool) -> Result<()> {
    let git = Git::new(&project.source_dir);
    let repo = &project.spec.repository;
    if pretend {
        if git.is_checkout() {
            info!("would update {}", project.source_dir.display());
        } else {
            info!(
                "would clone {} (branch {}) into {}",
                repo.url,
                repo.branch.as_deref().unwrap_or("default"),
                project.source_dir.display()
            );
        }
        return Ok(());
    }
    git.clone_or_update(repo)
        .with_context(|| format!("update sources in {}", project.source_dir.display()))
}

fn clean_build_dir(project: &Project, pretend: bool) -> Result<()> {
    let dir = &project.build_dir;
    if pretend {
        info!("would remove {}", dir.display());
        return Ok(());
    }
    if dir.exists() {
        info!("removing {}", dir.display());
        fs::remove_dir_all(dir).with_context(|| format!("remove {}", dir.display()))?;
    }
    Ok(())
}
