//! GDB with the CHERI MIPS patches, installed into the CheriBSD rootfs.
//!
//! Flags follow the FreeBSD kernel-debugger build of the same tree. GDB does
//! not build as a CHERI purecap binary and host builds are not supported, so
//! the target is pinned to plain MIPS64.

use anyhow::Result;

use crate::context::BuildContext;
use crate::core::project::{
    BuildSystem, GitRepository, InstallLocation, Project, ProjectSpec, TargetPolicy,
};
use crate::core::target::{CrossTarget, Linker};
use crate::io::runner::CommandRunner;
use crate::io::stash::with_stashed;
use crate::lifecycle::{run_make, run_make_install};
use crate::recipes::Recipe;

pub const REPOSITORY: &str = "https://github.com/bsdjhb/gdb.git";
pub const BRANCH: &str = "mips_cheri";

/// SDK binaries that the GDB build must not pick up in place of the host tools.
pub const SHADOWED_TOOLS: [&str; 4] = ["as", "ld", "objcopy", "objdump"];

const CONFIGURE_ARGS: &[&str] = &[
    "--enable-targets=mips64-unknown-freebsd",
    "--without-python",
    "--without-expat",
    "--disable-nls",
    "--without-libunwind-ia64",
    "--enable-tui",
    "--disable-ld",
    "--enable-64-bit-bfd",
    "--without-gnu-as",
];

const WARNING_FLAGS: &[&str] = &[
    "-Wno-absolute-value",
    "-Wno-parentheses-equality",
    "-Wno-unknown-warning-option",
    "-Wno-unused-function",
    "-Wno-unused-variable",
    // TODO: drop once upstream fixes the implicit declarations in bfd/readline
    "-Wno-error=implicit-function-declaration",
    "-Wno-error=format",
    "-Wno-error=incompatible-pointer-types",
];

pub struct Gdb;

impl Recipe for Gdb {
    fn spec(&self) -> ProjectSpec {
        ProjectSpec {
            target: TargetPolicy::Fixed(CrossTarget::Mips64),
            install: InstallLocation::CheriBsdRootfs,
            linker: Linker::Lld,
            optimization: vec!["-O2".to_string()],
            requires_gnu_make: true,
            ..ProjectSpec::new(
                "gdb",
                GitRepository::new(REPOSITORY).with_branch(BRANCH),
                BuildSystem::Autotools,
            )
        }
    }

    fn setup(&self, _ctx: &BuildContext, project: &mut Project) -> Result<()> {
        let args = &mut project.configure_args;
        args.extend(CONFIGURE_ARGS.iter().map(|s| s.to_string()));
        args.push(format!(
            "--with-gdb-datadir={}",
            project.install_prefix.join("share/gdb").display()
        ));
        args.extend(
            [
                "--with-separate-debug-dir=/usr/lib/debug",
                "--mandir=/usr/local/man",
                "--infodir=/usr/local/info/",
                "--disable-werror",
                "MAKEINFO=/bin/false",
            ]
            .map(String::from),
        );

        // configure runs $CC without flags to detect the dependency style
        project.configure_env.update([
            ("gl_cv_func_gettimeofday_clobber", "no"),
            ("lt_cv_sys_max_cmd_len", "262144"),
            ("am_cv_CC_dependencies_compiler_type", "gcc3"),
            ("MAKEINFO", "/bin/false"),
        ]);

        let flags = &mut project.flags;
        flags.warning.extend(WARNING_FLAGS.iter().map(|s| s.to_string()));
        // LDFLAGS alone does not produce a static binary
        flags.ldflags.push("-static".to_string());
        flags.common.push("-static".to_string());
        flags.common.extend(
            ["-DRL_NO_COMPAT", "-DLIBICONV_PLUG", "-fno-strict-aliasing"].map(String::from),
        );
        flags.cflags.push("-std=gnu89".to_string());
        flags.ldflags.push("-L/usr/local/lib".to_string());
        // libbfd references elf_version() and friends without linking libelf
        flags.ldflags.push("-lelf".to_string());

        project.configure_env.update([
            ("CONFIGURED_M4", "m4"),
            ("CONFIGURED_BISON", "byacc"),
            ("TMPDIR", "/tmp"),
            ("LIBS", ""),
        ]);
        if project.make_command == "gmake" {
            project.configure_env.set("MAKE", "gmake");
        }
        project
            .configure_env
            .set("CC_FOR_BUILD", project.host_cc.clone())
            .set("CXX_FOR_BUILD", project.host_cxx.clone())
            .set("CFLAGS_FOR_BUILD", "-g")
            .set("CXXFLAGS_FOR_BUILD", "-g");
        Ok(())
    }

    fn compile(
        &self,
        _ctx: &BuildContext,
        project: &Project,
        runner: &dyn CommandRunner,
    ) -> Result<()> {
        let mut args = project.common_make_args.clone();
        args.push(project.make_j_flag());
        with_stashed(&project.sdk_bin_dir, &SHADOWED_TOOLS, runner.pretend(), || {
            run_make(project, runner, &args, Some("all-gdb"))
        })
    }

    fn install(
        &self,
        _ctx: &BuildContext,
        project: &Project,
        runner: &dyn CommandRunner,
    ) -> Result<()> {
        run_make_install(project, runner, &project.common_make_args, "install-gdb")
    }
}
