//! Cross-compile targets and the flags that select them.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// CPU architecture/ABI combination a project is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossTarget {
    Native,
    Mips64,
    Mips64Purecap,
    Riscv64,
    Riscv64Purecap,
    Aarch64,
    Morello,
}

impl CrossTarget {
    pub const ALL: [CrossTarget; 7] = [
        CrossTarget::Native,
        CrossTarget::Mips64,
        CrossTarget::Mips64Purecap,
        CrossTarget::Riscv64,
        CrossTarget::Riscv64Purecap,
        CrossTarget::Aarch64,
        CrossTarget::Morello,
    ];

    /// Stable identifier used on the command line and in directory names.
    pub fn name(self) -> &'static str {
        match self {
            CrossTarget::Native => "native",
            CrossTarget::Mips64 => "mips64",
            CrossTarget::Mips64Purecap => "mips64-purecap",
            CrossTarget::Riscv64 => "riscv64",
            CrossTarget::Riscv64Purecap => "riscv64-purecap",
            CrossTarget::Aarch64 => "aarch64",
            CrossTarget::Morello => "morello",
        }
    }

    /// Target triple passed to clang and configure. `None` for host builds.
    pub fn triple(self) -> Option<&'static str> {
        match self {
            CrossTarget::Native => None,
            CrossTarget::Mips64 | CrossTarget::Mips64Purecap => Some("mips64-unknown-freebsd"),
            CrossTarget::Riscv64 | CrossTarget::Riscv64Purecap => Some("riscv64-unknown-freebsd"),
            CrossTarget::Aarch64 | CrossTarget::Morello => Some("aarch64-unknown-freebsd"),
        }
    }

    pub fn is_native(self) -> bool {
        self == CrossTarget::Native
    }

    pub fn is_purecap(self) -> bool {
        matches!(
            self,
            CrossTarget::Mips64Purecap | CrossTarget::Riscv64Purecap | CrossTarget::Morello
        )
    }

    /// Compiler flags selecting this target (triple plus ABI for purecap variants).
    pub fn compiler_flags(self) -> Vec<String> {
        let Some(triple) = self.triple() else {
            return Vec::new();
        };
        let mut flags = vec!["-target".to_string(), triple.to_string()];
        let abi: &[&str] = match self {
            CrossTarget::Mips64Purecap => &["-mabi=purecap"],
            CrossTarget::Riscv64Purecap => &["-march=rv64imafdcxcheri", "-mabi=l64pc128d"],
            CrossTarget::Morello => &["-march=morello", "-mabi=purecap"],
            _ => &[],
        };
        flags.extend(abi.iter().map(|s| s.to_string()));
        flags
    }
}

impl fmt::Display for CrossTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CrossTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        CrossTarget::ALL
            .into_iter()
            .find(|target| target.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = CrossTarget::ALL.iter().map(|t| t.name()).collect();
                anyhow!("unknown target architecture '{s}' (known: {})", known.join(", "))
            })
    }
}

/// Linker selected for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linker {
    System,
    Lld,
}

impl Linker {
    pub fn flag(self) -> Option<&'static str> {
        match self {
            Linker::System => None,
            Linker::Lld => Some("-fuse-ld=lld"),
        }
    }
}

/// Triple of the machine running the build.
pub fn host_triple() -> String {
    let arch = std::env::consts::ARCH;
    match std::env::consts::OS {
        "linux" => format!("{arch}-unknown-linux-gnu"),
        "macos" => format!("{arch}-apple-darwin"),
        os => format!("{arch}-unknown-{os}"),
    }
}
