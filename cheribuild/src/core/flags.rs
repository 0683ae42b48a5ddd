//! Compiler and linker flag lists that recipes extend.

use serde::{Deserialize, Serialize};

use crate::core::target::Linker;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerFlags {
    /// Passed to both C and C++ compiles and to the link step.
    pub common: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub warning: Vec<String>,
    pub optimization: Vec<String>,
}

impl CompilerFlags {
    pub fn render_cflags(&self, target_flags: &[String]) -> String {
        self.render_compile(target_flags, &self.cflags)
    }

    pub fn render_cxxflags(&self, target_flags: &[String]) -> String {
        self.render_compile(target_flags, &self.cxxflags)
    }

    pub fn render_ldflags(&self, target_flags: &[String], linker: Linker) -> String {
        let mut parts: Vec<&str> = target_flags.iter().map(String::as_str).collect();
        if let Some(flag) = linker.flag() {
            parts.push(flag);
        }
        parts.extend(self.common.iter().map(String::as_str));
        parts.extend(self.ldflags.iter().map(String::as_str));
        parts.join(" ")
    }

    fn render_compile(&self, target_flags: &[String], language: &[String]) -> String {
        target_flags
            .iter()
            .chain(&self.optimization)
            .chain(&self.common)
            .chain(&self.warning)
            .chain(language)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cflags_order_is_target_opt_common_warning_language() {
        let flags = CompilerFlags {
            common: strings(&["-static"]),
            cflags: strings(&["-std=gnu89"]),
            cxxflags: strings(&["-std=c++17"]),
            warning: strings(&["-Wno-format"]),
            optimization: strings(&["-O2"]),
            ..CompilerFlags::default()
        };
        let target = strings(&["-target", "mips64-unknown-freebsd"]);
        assert_eq!(
            flags.render_cflags(&target),
            "-target mips64-unknown-freebsd -O2 -static -Wno-format -std=gnu89"
        );
        assert_eq!(
            flags.render_cxxflags(&target),
            "-target mips64-unknown-freebsd -O2 -static -Wno-format -std=c++17"
        );
    }

    #[test]
    fn ldflags_include_linker_selection() {
        let flags = CompilerFlags {
            common: strings(&["-static"]),
            ldflags: strings(&["-lelf"]),
            ..CompilerFlags::default()
        };
        assert_eq!(flags.render_ldflags(&[], Linker::Lld), "-fuse-ld=lld -static -lelf");
        assert_eq!(flags.render_ldflags(&[], Linker::System), "-static -lelf");
    }
}
