//! Boost, built with its CMake support.

use anyhow::Result;

use crate::context::BuildContext;
use crate::core::project::{BuildSystem, GitRepository, Project, ProjectSpec};
use crate::recipes::Recipe;

pub const REPOSITORY: &str = "https://github.com/boostorg/boost.git";

/// Libraries left out of the build.
const EXCLUDED_LIBRARIES: &[&str] = &[
    // not CHERI compatible, but used by almost all other libraries
    "function",
    // embeds dlmalloc, not CHERI compatible
    "container",
];

const INCLUDED_LIBRARIES: &[&str] = &[
    // used by kactivitymanagerd
    "range",
];

pub struct Boost;

impl Recipe for Boost {
    fn spec(&self) -> ProjectSpec {
        ProjectSpec::new("boost", GitRepository::new(REPOSITORY), BuildSystem::CMake)
    }

    fn setup(&self, _ctx: &BuildContext, project: &mut Project) -> Result<()> {
        project
            .cmake_options
            .add_list("BOOST_EXCLUDE_LIBRARIES", EXCLUDED_LIBRARIES)
            .add_list("BOOST_INCLUDE_LIBRARIES", INCLUDED_LIBRARIES);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::CrossTarget;
    use crate::resolve::resolve_project;
    use crate::test_support::test_context;

    #[test]
    fn library_selection_follows_base_options() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = test_context(temp.path(), CrossTarget::Morello);
        let project = resolve_project(&Boost, &ctx).expect("resolve");

        let args = project.cmake_options.to_args();
        let tail: Vec<&str> = args[args.len() - 2..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            [
                "-DBOOST_EXCLUDE_LIBRARIES=function;container",
                "-DBOOST_INCLUDE_LIBRARIES=range"
            ]
        );
        assert_eq!(args[0], "-DCMAKE_INSTALL_PREFIX=/usr/local");
    }

    #[test]
    fn options_present_for_every_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        for target in CrossTarget::ALL {
            let ctx = test_context(temp.path(), target);
            let project = resolve_project(&Boost, &ctx).expect("resolve");
            assert_eq!(
                project
                    .cmake_options
                    .get("BOOST_EXCLUDE_LIBRARIES")
                    .map(|v| v.as_str()),
                Some("function;container"),
                "target {target}"
            );
            assert_eq!(
                project
                    .cmake_options
                    .get("BOOST_INCLUDE_LIBRARIES")
                    .map(|v| v.as_str()),
                Some("range"),
                "target {target}"
            );
        }
    }

    #[test]
    fn follows_configured_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = test_context(temp.path(), CrossTarget::Riscv64Purecap);
        let project = resolve_project(&Boost, &ctx).expect("resolve");
        assert_eq!(project.target, CrossTarget::Riscv64Purecap);
        assert_eq!(project.spec.repository.url, REPOSITORY);
        assert_eq!(project.spec.repository.branch, None);
    }
}
