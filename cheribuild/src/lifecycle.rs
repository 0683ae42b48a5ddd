//! Default configure/compile/install steps for CMake and Autotools projects.
//!
//! Recipes that override a hook can still call [`run_make`] and
//! [`run_make_install`] to reuse the project's make conventions.

use anyhow::Result;
use tracing::instrument;

use crate::context::BuildContext;
use crate::core::options::EnvVars;
use crate::core::project::{BuildSystem, Project};
use crate::io::runner::{CommandRunner, Invocation};

#[instrument(skip_all, fields(project = %project.name()))]
pub fn configure(ctx: &BuildContext, project: &Project, runner: &dyn CommandRunner) -> Result<()> {
    let invocation = match project.spec.build_system {
        BuildSystem::CMake => cmake_configure_invocation(ctx, project),
        BuildSystem::Autotools => autotools_configure_invocation(project),
    };
    runner.run(&invocation)
}

#[instrument(skip_all, fields(project = %project.name()))]
pub fn compile(_ctx: &BuildContext, project: &Project, runner: &dyn CommandRunner) -> Result<()> {
    match project.spec.build_system {
        BuildSystem::CMake => runner.run(
            &project_invocation(project, "cmake")
                .arg("--build")
                .arg(project.build_dir.display().to_string())
                .arg("--parallel")
                .arg(project.make_jobs.to_string()),
        ),
        BuildSystem::Autotools => {
            let mut args = project.common_make_args.clone();
            args.push(project.make_j_flag());
            run_make(project, runner, &args, None)
        }
    }
}

#[instrument(skip_all, fields(project = %project.name()))]
pub fn install(_ctx: &BuildContext, project: &Project, runner: &dyn CommandRunner) -> Result<()> {
    match project.spec.build_system {
        BuildSystem::CMake => {
            let mut invocation = project_invocation(project, "cmake")
                .arg("--install")
                .arg(project.build_dir.display().to_string());
            if let Some(destdir) = &project.destdir {
                invocation = invocation.env("DESTDIR", destdir.display().to_string());
            }
            runner.run(&invocation)
        }
        BuildSystem::Autotools => {
            run_make_install(project, runner, &project.common_make_args, "install")
        }
    }
}

/// Run `<make> <args> [target]` in the build directory.
pub fn run_make(
    project: &Project,
    runner: &dyn CommandRunner,
    args: &[String],
    target: Option<&str>,
) -> Result<()> {
    let mut invocation = project_invocation(project, &project.make_command).args(args.iter().cloned());
    if let Some(target) = target {
        invocation = invocation.arg(target);
    }
    runner.run(&invocation)
}

/// Run `<make> <args> <target>` with `DESTDIR=<destdir>` when the project stages its install.
pub fn run_make_install(
    project: &Project,
    runner: &dyn CommandRunner,
    args: &[String],
    target: &str,
) -> Result<()> {
    let mut args = args.to_vec();
    if let Some(destdir) = &project.destdir {
        args.push(format!("DESTDIR={}", destdir.display()));
    }
    run_make(project, runner, &args, Some(target))
}

/// Environment for `configure`: toolchain and flags, then the recipe's overrides.
pub fn configure_environment(project: &Project) -> EnvVars {
    let mut env = EnvVars::new();
    env.set("CC", project.cc.display().to_string())
        .set("CXX", project.cxx.display().to_string())
        .set("CFLAGS", project.cflags())
        .set("CXXFLAGS", project.cxxflags())
        .set("LDFLAGS", project.ldflags());
    env.update(project.configure_env.iter());
    env
}

fn project_invocation(project: &Project, program: &str) -> Invocation {
    Invocation::new(program, &project.build_dir).label(project.name())
}

fn autotools_configure_invocation(project: &Project) -> Invocation {
    let script = project.source_dir.join("configure");
    project_invocation(project, &script.display().to_string())
        .envs(&configure_environment(project))
        .args(project.configure_args.iter().cloned())
        .args(project.extra_args.iter().cloned())
}

fn cmake_configure_invocation(ctx: &BuildContext, project: &Project) -> Invocation {
    let mut invocation = project_invocation(project, "cmake")
        .arg("-S")
        .arg(project.source_dir.display().to_string())
        .arg("-B")
        .arg(project.build_dir.display().to_string())
        .arg("-G")
        .arg(ctx.config.cmake_generator.as_str());
    if !project.target.is_native() {
        let ldflags = project.ldflags();
        invocation = invocation
            .arg(format!("-DCMAKE_C_FLAGS={}", project.cflags()))
            .arg(format!("-DCMAKE_CXX_FLAGS={}", project.cxxflags()))
            .arg(format!("-DCMAKE_EXE_LINKER_FLAGS={ldflags}"))
            .arg(format!("-DCMAKE_SHARED_LINKER_FLAGS={ldflags}"));
    }
    invocation
        .args(project.cmake_options.to_args())
        .args(project.extra_args.iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::CrossTarget;
    use crate::recipes::{Boost, Gdb};
    use crate::resolve::resolve_project;
    use crate::test_support::{RecordingRunner, test_context};

    #[test]
    fn cmake_lifecycle_commands() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = test_context(temp.path(), CrossTarget::Mips64Purecap);
        let project = resolve_project(&Boost, &ctx).expect("resolve");
        let runner = RecordingRunner::new();

        configure(&ctx, &project, &runner).expect("configure");
        compile(&ctx, &project, &runner).expect("compile");
        install(&ctx, &project, &runner).expect("install");

        let calls = runner.invocations();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].program, "cmake");
        assert_eq!(calls[0].args[0], "-S");
        assert_eq!(calls[0].args[1], project.source_dir.display().to_string());
        assert!(
            calls[0]
                .args
                .iter()
                .any(|a| a.starts_with("-DCMAKE_C_FLAGS=-target mips64-unknown-freebsd -mabi=purecap"))
        );
        let build_dir = project.build_dir.display().to_string();
        assert_eq!(calls[1].args, vec!["--build", build_dir.as_str(), "--parallel", "4"]);
        assert_eq!(
            calls[2].env,
            vec![(
                "DESTDIR".to_string(),
                temp.path().join("output/rootfs-mips64-purecap").display().to_string()
            )]
        );
        assert!(calls.iter().all(|c| c.label.as_deref() == Some("boost")));
    }

    #[test]
    fn autotools_configure_sets_toolchain_env_before_recipe_env() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = test_context(temp.path(), CrossTarget::Mips64);
        let project = resolve_project(&Gdb, &ctx).expect("resolve");
        let runner = RecordingRunner::new();

        configure(&ctx, &project, &runner).expect("configure");
        let calls = runner.invocations();
        let call = &calls[0];
        assert!(call.program.ends_with("src/gdb/configure"));
        let names: Vec<&str> = call.env.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names[..5], ["CC", "CXX", "CFLAGS", "CXXFLAGS", "LDFLAGS"]);
        assert!(names.contains(&"CC_FOR_BUILD"));
        assert_eq!(call.args[0], "--prefix=/usr/local");
    }

    #[test]
    fn make_install_adds_destdir_argument() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = test_context(temp.path(), CrossTarget::Mips64);
        let project = resolve_project(&Gdb, &ctx).expect("resolve");
        let runner = RecordingRunner::new();

        run_make_install(&project, &runner, &[], "install").expect("install");
        let calls = runner.invocations();
        let call = &calls[0];
        assert_eq!(
            call.args,
            vec![
                format!("DESTDIR={}", temp.path().join("output/rootfs").display()),
                "install".to_string()
            ]
        );
    }
}
