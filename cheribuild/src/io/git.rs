//! Git adapter for source checkouts.
//!
//! Sources are cloned once and then fast-forwarded; we keep a small,
//! explicit wrapper around `git` subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::project::GitRepository;

/// A project source checkout, driven through the `git` binary.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// True if the working directory contains a git checkout.
    pub fn is_checkout(&self) -> bool {
        self.workdir.join(".git").exists()
    }

    /// Clone `repo` into the working directory (which must not exist or be empty).
    #[instrument(skip_all, fields(url = %repo.url, branch = ?repo.branch))]
    pub fn clone_repository(&self, repo: &GitRepository) -> Result<()> {
        let parent = self
            .workdir
            .parent()
            .ok_or_else(|| anyhow!("source dir has no parent: {}", self.workdir.display()))?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;

        let dest = self.workdir.display().to_string();
        let mut args = vec!["clone"];
        if let Some(branch) = &repo.branch {
            args.extend(["--branch", branch.as_str()]);
        }
        args.extend([repo.url.as_str(), dest.as_str()]);
        info!(dest = %dest, "cloning repository");
        run_checked_in(parent, &args)?;
        Ok(())
    }

    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// Fast-forward the current branch from its upstream.
    #[instrument(skip_all)]
    pub fn pull_ff_only(&self) -> Result<()> {
        debug!("pulling with --ff-only");
        self.run_checked(&["pull", "--ff-only"])?;
        Ok(())
    }

    /// Clone when missing, otherwise fast-forward. Warns if the checkout is on
    /// a different branch than the repository asks for.
    pub fn clone_or_update(&self, repo: &GitRepository) -> Result<()> {
        if !self.is_checkout() {
            return self.clone_repository(repo);
        }
        if let Some(wanted) = &repo.branch {
            match self.current_branch() {
                Ok(current) if &current != wanted => {
                    warn!(
                        current = %current,
                        wanted = %wanted,
                        "checkout is on an unexpected branch, updating it anyway"
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(err = %format!("{e:#}"), "cannot determine current branch"),
            }
        }
        self.pull_ff_only()
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        run_checked_in(&self.workdir, args)
    }
}

fn run_checked_in(dir: &Path, args: &[&str]) -> Result<Output> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git(dir: &Path, args: &[&str]) {
        run_checked_in(dir, args).expect("git command");
    }

    fn upstream_with_branch(root: &Path, branch: &str) -> PathBuf {
        let upstream = root.join("upstream");
        std::fs::create_dir_all(&upstream).expect("mkdir");
        git(&upstream, &["init", "-q", "-b", "main"]);
        git(&upstream, &["config", "user.email", "dev@example.invalid"]);
        git(&upstream, &["config", "user.name", "Dev"]);
        std::fs::write(upstream.join("README"), "hello\n").expect("write");
        git(&upstream, &["add", "README"]);
        git(&upstream, &["commit", "-q", "-m", "initial"]);
        git(&upstream, &["branch", branch]);
        upstream
    }

    #[test]
    fn clones_requested_branch_then_updates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let upstream = upstream_with_branch(temp.path(), "mips_cheri");
        let repo = GitRepository::new(upstream.display().to_string()).with_branch("mips_cheri");

        let checkout = Git::new(temp.path().join("src/gdb"));
        assert!(!checkout.is_checkout());
        checkout.clone_or_update(&repo).expect("clone");
        assert!(checkout.is_checkout());
        assert_eq!(checkout.current_branch().expect("branch"), "mips_cheri");

        checkout.clone_or_update(&repo).expect("update");
    }

    #[test]
    fn clone_of_missing_remote_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = GitRepository::new(temp.path().join("nope").display().to_string());
        let err = Git::new(temp.path().join("dest"))
            .clone_or_update(&repo)
            .expect_err("missing remote");
        assert!(err.to_string().contains("git clone"));
    }
}
