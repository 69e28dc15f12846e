//! Target platform descriptors.
//!
//! A [`Platform`] is an immutable per-OS record holding the file suffixes
//! applied during output resolution and the shell primitives used when
//! synthesising housekeeping commands (create a directory, delete a path,
//! strip a binary). One platform is selected per run, before any graph
//! construction happens.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Operating-system families understood by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Os {
    /// Generic POSIX system.
    Posix,
    /// Linux.
    Linux,
    /// Android.
    Android,
    /// macOS.
    #[serde(rename = "macos")]
    #[value(name = "macos")]
    MacOs,
    /// Emscripten (WebAssembly via a JavaScript loader).
    Emscripten,
    /// Windows.
    Windows,
}

/// Per-OS suffix table and shell-primitive synthesis.
#[derive(Debug, PartialEq, Eq)]
pub struct Platform {
    /// The OS family this descriptor applies to.
    pub os: Os,
    /// Suffix appended to application outputs.
    pub exe_suffix: &'static str,
    /// Suffix appended to dynamic-library outputs.
    pub dll_suffix: &'static str,
    /// Suffix appended to static-library outputs.
    pub archive_suffix: &'static str,
    /// Suffix appended to object-file and object-library outputs.
    pub obj_suffix: &'static str,
    /// Suffix of an import library, where one is distinct from the
    /// load-time binary. Empty on platforms that link against the binary
    /// itself.
    pub import_suffix: &'static str,
}

const POSIX: Platform = Platform {
    os: Os::Posix,
    exe_suffix: "",
    dll_suffix: ".so",
    archive_suffix: ".a",
    obj_suffix: ".o",
    import_suffix: "",
};

const LINUX: Platform = Platform { os: Os::Linux, ..POSIX };

const ANDROID: Platform = Platform { os: Os::Android, ..POSIX };

const MACOS: Platform = Platform {
    os: Os::MacOs,
    dll_suffix: ".dylib",
    ..POSIX
};

const EMSCRIPTEN: Platform = Platform {
    os: Os::Emscripten,
    exe_suffix: ".js",
    dll_suffix: ".wasm",
    ..POSIX
};

const WINDOWS: Platform = Platform {
    os: Os::Windows,
    exe_suffix: ".exe",
    dll_suffix: ".dll",
    archive_suffix: ".lib",
    obj_suffix: ".obj",
    import_suffix: ".lib",
};

impl Platform {
    /// Look up the descriptor for an OS family.
    #[must_use]
    pub const fn for_os(os: Os) -> &'static Self {
        match os {
            Os::Posix => &POSIX,
            Os::Linux => &LINUX,
            Os::Android => &ANDROID,
            Os::MacOs => &MACOS,
            Os::Emscripten => &EMSCRIPTEN,
            Os::Windows => &WINDOWS,
        }
    }

    /// Descriptor for the host this process runs on.
    #[must_use]
    pub const fn host() -> &'static Self {
        if cfg!(windows) {
            &WINDOWS
        } else if cfg!(target_os = "macos") {
            &MACOS
        } else if cfg!(target_os = "linux") {
            &LINUX
        } else {
            &POSIX
        }
    }

    /// Whether this platform uses Windows shell conventions.
    #[must_use]
    pub const fn is_windows(&self) -> bool {
        matches!(self.os, Os::Windows)
    }

    /// Append `suffix` to `path` unless it already carries it.
    ///
    /// This is the idempotence guarantee output resolution relies on: a
    /// correctly suffixed name is returned unchanged.
    #[must_use]
    pub fn ensure_suffix(path: &Utf8Path, suffix: &str) -> Utf8PathBuf {
        if suffix.is_empty() || path.as_str().ends_with(suffix) {
            path.to_owned()
        } else {
            Utf8PathBuf::from(format!("{path}{suffix}"))
        }
    }

    /// Strip `suffix` from `path` if present, yielding the basename stem.
    #[must_use]
    pub fn strip_suffix(path: &Utf8Path, suffix: &str) -> Utf8PathBuf {
        if suffix.is_empty() {
            return path.to_owned();
        }
        path.as_str()
            .strip_suffix(suffix)
            .map_or_else(|| path.to_owned(), Utf8PathBuf::from)
    }

    /// Shell command creating `path` as a directory, parents included.
    #[must_use]
    pub fn create_dir_command(&self, path: &Utf8Path) -> String {
        if self.is_windows() {
            format!("if not exist {path} mkdir {path}")
        } else {
            format!("mkdir -p {path}")
        }
    }

    /// Shell command deleting `path`, recursively and without prompting.
    #[must_use]
    pub fn delete_command(&self, path: &Utf8Path) -> String {
        if self.is_windows() {
            format!("if exist {path} rmdir /s /q {path}")
        } else {
            format!("rm -rf {path}")
        }
    }

    /// Shell command stripping symbols from a built binary, where the
    /// platform has a standalone strip tool. Windows toolchains fold this
    /// into the linker, so no command is synthesised there.
    #[must_use]
    pub fn strip_command(&self, path: &Utf8Path) -> Option<String> {
        if self.is_windows() {
            None
        } else {
            Some(format!("strip {path}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Os::Linux, "", ".so", ".a", ".o")]
    #[case(Os::MacOs, "", ".dylib", ".a", ".o")]
    #[case(Os::Windows, ".exe", ".dll", ".lib", ".obj")]
    #[case(Os::Emscripten, ".js", ".wasm", ".a", ".o")]
    fn suffix_table(
        #[case] os: Os,
        #[case] exe: &str,
        #[case] dll: &str,
        #[case] archive: &str,
        #[case] obj: &str,
    ) {
        let platform = Platform::for_os(os);
        assert_eq!(platform.exe_suffix, exe);
        assert_eq!(platform.dll_suffix, dll);
        assert_eq!(platform.archive_suffix, archive);
        assert_eq!(platform.obj_suffix, obj);
    }

    #[rstest]
    #[case("demo", ".o", "demo.o")]
    #[case("demo.o", ".o", "demo.o")]
    #[case("demo", "", "demo")]
    fn ensure_suffix_is_idempotent(#[case] input: &str, #[case] suffix: &str, #[case] expected: &str) {
        let once = Platform::ensure_suffix(Utf8Path::new(input), suffix);
        assert_eq!(once, Utf8PathBuf::from(expected));
        let twice = Platform::ensure_suffix(&once, suffix);
        assert_eq!(twice, once);
    }

    #[test]
    fn shell_primitives_follow_the_os() {
        let linux = Platform::for_os(Os::Linux);
        assert_eq!(linux.create_dir_command(Utf8Path::new("objs")), "mkdir -p objs");
        assert_eq!(linux.delete_command(Utf8Path::new("objs")), "rm -rf objs");
        assert_eq!(
            linux.strip_command(Utf8Path::new("demo")),
            Some("strip demo".into())
        );

        let windows = Platform::for_os(Os::Windows);
        assert_eq!(
            windows.create_dir_command(Utf8Path::new("objs")),
            "if not exist objs mkdir objs"
        );
        assert!(windows.strip_command(Utf8Path::new("demo.exe")).is_none());
    }
}
