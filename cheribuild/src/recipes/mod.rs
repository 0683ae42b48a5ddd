//! Project recipes and the registry that looks them up by name.
//!
//! A recipe returns a declarative [`ProjectSpec`] and may override the
//! lifecycle hooks. Defaults delegate to [`crate::lifecycle`], which knows
//! how to drive CMake and Autotools projects.

use anyhow::{Result, anyhow};

use crate::context::BuildContext;
use crate::core::project::{Project, ProjectSpec};
use crate::io::runner::CommandRunner;
use crate::lifecycle;

pub mod boost;
pub mod gdb;

pub use boost::Boost;
pub use gdb::Gdb;

/// How to obtain and build one project.
pub trait Recipe {
    fn spec(&self) -> ProjectSpec;

    /// Extend the resolved project's options after the base values are set.
    fn setup(&self, _ctx: &BuildContext, _project: &mut Project) -> Result<()> {
        Ok(())
    }

    fn configure(
        &self,
        ctx: &BuildContext,
        project: &Project,
        runner: &dyn CommandRunner,
    ) -> Result<()> {
        lifecycle::configure(ctx, project, runner)
    }

    fn compile(
        &self,
        ctx: &BuildContext,
        project: &Project,
        runner: &dyn CommandRunner,
    ) -> Result<()> {
        lifecycle::compile(ctx, project, runner)
    }

    fn install(
        &self,
        ctx: &BuildContext,
        project: &Project,
        runner: &dyn CommandRunner,
    ) -> Result<()> {
        lifecycle::install(ctx, project, runner)
    }
}

/// Name-indexed set of recipes.
pub struct Registry {
    recipes: Vec<(String, Box<dyn Recipe>)>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            recipes: Vec::new(),
        }
    }

    /// Registry with every recipe shipped in this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(Boost));
        registry.register(Box::new(Gdb));
        registry
    }

    /// Add a recipe; a later registration with the same name replaces the earlier one.
    pub fn register(&mut self, recipe: Box<dyn Recipe>) {
        let name = recipe.spec().name;
        self.recipes.retain(|(existing, _)| *existing != name);
        self.recipes.push((name, recipe));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Recipe> {
        self.recipes
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, recipe)| recipe.as_ref())
    }

    /// Like [`Registry::get`] but errors with the list of known targets.
    pub fn require(&self, name: &str) -> Result<&dyn Recipe> {
        self.get(name).ok_or_else(|| {
            anyhow!(
                "unknown target '{name}' (known: {})",
                self.names().join(", ")
            )
        })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.recipes.iter().map(|(n, _)| n.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lists_sorted_names() {
        assert_eq!(Registry::builtin().names(), vec!["boost", "gdb"]);
    }

    #[test]
    fn require_unknown_lists_known() {
        let registry = Registry::builtin();
        let err = registry.require("llvm").err().expect("unknown target");
        assert_eq!(err.to_string(), "unknown target 'llvm' (known: boost, gdb)");
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = Registry::builtin();
        registry.register(Box::new(Boost));
        assert_eq!(registry.names(), vec!["boost", "gdb"]);
    }
}
