//! Turn a recipe's declarative spec into a concrete [`Project`].
//!
//! Resolution starts from scratch on every call, so running it twice yields
//! identical flag and environment lists.

use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::context::BuildContext;
use crate::core::flags::CompilerFlags;
use crate::core::options::{CMakeOptions, EnvVars};
use crate::core::project::{BuildSystem, InstallLocation, Project, ProjectSpec};
use crate::core::target::{CrossTarget, host_triple};
use crate::io::config::CheriConfig;
use crate::recipes::Recipe;

/// Resolve `recipe` against `ctx`: directories, toolchain, base options, config
/// overrides, then the recipe's own `setup`.
pub fn resolve_project(recipe: &dyn Recipe, ctx: &BuildContext) -> Result<Project> {
    let mut spec = recipe.spec();
    let overrides = ctx
        .config
        .project_overrides(&spec.name)
        .cloned()
        .unwrap_or_default();
    if let Some(url) = overrides.repository {
        spec.repository.url = url;
    }
    if let Some(branch) = overrides.git_branch {
        spec.repository.branch = Some(branch);
    }

    let cfg = &ctx.config;
    let target = spec.target.select(ctx.target);
    let source_dir = overrides
        .source_dir
        .unwrap_or_else(|| cfg.source_root.join(&spec.name));
    let build_dir = overrides
        .build_dir
        .unwrap_or_else(|| cfg.build_root.join(format!("{}-{}-build", spec.name, target)));
    let (install_prefix, destdir) = install_paths(cfg, spec.install, target);

    let make_command = if spec.requires_gnu_make {
        cfg.gnu_make.clone()
    } else {
        "make".to_string()
    };
    let cc = cfg.clang();
    let cxx = cfg.clang_plus_plus();
    let host_cc = ctx.env.get_or("HOST_CC", cc.display().to_string());
    let host_cxx = ctx.env.get_or("HOST_CXX", cxx.display().to_string());

    let flags = CompilerFlags {
        optimization: spec.optimization.clone(),
        ..CompilerFlags::default()
    };
    let sysroot = cfg.sysroot(target);

    let mut project = Project {
        cmake_options: CMakeOptions::new(),
        configure_args: Vec::new(),
        configure_env: EnvVars::new(),
        common_make_args: Vec::new(),
        extra_args: Vec::new(),
        target,
        source_dir,
        build_dir,
        install_prefix,
        destdir,
        sysroot,
        sdk_bin_dir: cfg.sdk_bin_dir(),
        make_command,
        make_jobs: cfg.make_jobs,
        cc,
        cxx,
        host_cc,
        host_cxx,
        flags,
        spec,
    };
    add_base_options(cfg, &mut project);

    recipe.setup(ctx, &mut project)?;
    project.extra_args = overrides.extra_args;

    debug!(
        project = %project.name(),
        arch = %project.target,
        build_dir = %project.build_dir.display(),
        "resolved project"
    );
    Ok(project)
}

fn install_paths(
    cfg: &CheriConfig,
    location: InstallLocation,
    target: CrossTarget,
) -> (PathBuf, Option<PathBuf>) {
    let usr_local = PathBuf::from("/usr/local");
    match location {
        InstallLocation::TargetRootfs if target.is_native() => {
            (cfg.output_root.join("local"), None)
        }
        InstallLocation::TargetRootfs => (usr_local, Some(cfg.target_rootfs(target))),
        InstallLocation::CheriBsdRootfs => (usr_local, Some(cfg.cheribsd_rootfs.clone())),
    }
}

fn add_base_options(cfg: &CheriConfig, project: &mut Project) {
    match project.spec.build_system {
        BuildSystem::CMake => {
            let opts = &mut project.cmake_options;
            opts.add("CMAKE_INSTALL_PREFIX", project.install_prefix.as_path())
                .add("CMAKE_BUILD_TYPE", cfg.cmake_build_type.as_str());
            if let Some(sysroot) = &project.sysroot {
                opts.add("CMAKE_SYSTEM_NAME", "FreeBSD")
                    .add("CMAKE_SYSROOT", sysroot.as_path())
                    .add("CMAKE_C_COMPILER", project.cc.as_path())
                    .add("CMAKE_CXX_COMPILER", project.cxx.as_path());
                if let Some(triple) = project.target.triple() {
                    opts.add("CMAKE_C_COMPILER_TARGET", triple)
                        .add("CMAKE_CXX_COMPILER_TARGET", triple);
                }
            }
        }
        BuildSystem::Autotools => {
            let args = &mut project.configure_args;
            args.push(format!("--prefix={}", project.install_prefix.display()));
            if let Some(triple) = project.target.triple() {
                args.push(format!("--host={triple}"));
                args.push(format!("--target={triple}"));
                args.push(format!("--build={}", host_triple()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project::{GitRepository, TargetPolicy};
    use crate::io::config::ProjectOverrides;
    use crate::io::env::HostEnv;

    struct Plain(BuildSystem);

    impl Recipe for Plain {
        fn spec(&self) -> ProjectSpec {
            ProjectSpec::new(
                "plain",
                GitRepository::new("https://example.invalid/plain.git"),
                self.0,
            )
        }
    }

    fn ctx(target: CrossTarget) -> BuildContext {
        let mut config = CheriConfig {
            source_root: PathBuf::from("/src"),
            make_jobs: 8,
            ..CheriConfig::default()
        };
        config.projects.insert(
            "plain".to_string(),
            ProjectOverrides {
                git_branch: Some("dev".to_string()),
                extra_args: vec!["--enable-debug".to_string()],
                ..ProjectOverrides::default()
            },
        );
        BuildContext::new(config, HostEnv::default(), Some(target)).expect("ctx")
    }

    #[test]
    fn cross_autotools_gets_triples_and_rootfs() {
        let project =
            resolve_project(&Plain(BuildSystem::Autotools), &ctx(CrossTarget::Riscv64)).expect("resolve");
        assert_eq!(project.build_dir, PathBuf::from("/src/build/plain-riscv64-build"));
        assert_eq!(
            project.configure_args[..3],
            [
                "--prefix=/usr/local",
                "--host=riscv64-unknown-freebsd",
                "--target=riscv64-unknown-freebsd"
            ]
        );
        assert_eq!(
            project.destdir,
            Some(PathBuf::from("/src/output/rootfs-riscv64"))
        );
        assert_eq!(project.make_j_flag(), "-j8");
    }

    #[test]
    fn native_cmake_has_no_cross_options() {
        let project =
            resolve_project(&Plain(BuildSystem::CMake), &ctx(CrossTarget::Native)).expect("resolve");
        assert!(project.cmake_options.get("CMAKE_SYSROOT").is_none());
        assert_eq!(project.destdir, None);
        assert_eq!(
            project.cmake_options.get("CMAKE_INSTALL_PREFIX").map(|v| v.as_str()),
            Some("/src/output/local")
        );
    }

    #[test]
    fn overrides_apply_after_setup() {
        let project =
            resolve_project(&Plain(BuildSystem::Autotools), &ctx(CrossTarget::Mips64)).expect("resolve");
        assert_eq!(project.spec.repository.branch.as_deref(), Some("dev"));
        assert_eq!(project.extra_args, vec!["--enable-debug"]);
        assert_eq!(project.spec.target, TargetPolicy::Configured);
    }

    #[test]
    fn host_compilers_default_to_configured_clang() {
        let project =
            resolve_project(&Plain(BuildSystem::CMake), &ctx(CrossTarget::Mips64)).expect("resolve");
        assert_eq!(project.host_cc, "/src/output/sdk/bin/clang");
        assert_eq!(project.host_cxx, "/src/output/sdk/bin/clang++");
    }
}
