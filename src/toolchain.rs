//! Toolchain descriptors and selection.
//!
//! A toolchain descriptor turns a normalized option set into a command line
//! for a specific vendor. Compilers and linkers are trait objects behind
//! the [`Compiler`] and [`Linker`] seams; the concrete implementations live
//! in [`gnu`] (gcc, clang, tcc, ld, llvm-link, ar, strip) and [`msvc`]
//! (cl, link, lib). [`select`] validates the compiler/linker pairing before
//! any graph work begins and assembles the full [`Toolchain`] set.

use camino::{Utf8Path, Utf8PathBuf};
use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

use crate::flags::{Flag, ToolchainId};
use crate::graph::{Graph, NodeId};

pub mod gnu;
pub mod msvc;

/// Requested optimization level, spelled the way blueprints spell it
/// (`0`..`4`, `s`, `z`). Vendors that cannot express a level reject it at
/// command-synthesis time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Optimization {
    /// No optimization.
    #[default]
    O0,
    /// Level 1.
    O1,
    /// Level 2.
    O2,
    /// Level 3.
    O3,
    /// Level 4 (passed through; GCC treats it as level 3).
    O4,
    /// Optimize for size (`-Os`).
    Size,
    /// Optimize aggressively for size (`-Oz`).
    SizeZ,
}

impl Optimization {
    /// The blueprint token for this level.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::O0 => "0",
            Self::O1 => "1",
            Self::O2 => "2",
            Self::O3 => "3",
            Self::O4 => "4",
            Self::Size => "s",
            Self::SizeZ => "z",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "0" => Some(Self::O0),
            "1" => Some(Self::O1),
            "2" => Some(Self::O2),
            "3" => Some(Self::O3),
            "4" => Some(Self::O4),
            "s" => Some(Self::Size),
            "z" => Some(Self::SizeZ),
            _ => None,
        }
    }
}

impl Display for Optimization {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl From<Optimization> for String {
    fn from(level: Optimization) -> Self {
        level.token().to_owned()
    }
}

impl<'de> Deserialize<'de> for Optimization {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Blueprints may spell levels as bare integers or as strings.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }
        let token = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n.to_string(),
            Raw::Text(s) => s,
        };
        Self::from_token(&token)
            .ok_or_else(|| D::Error::custom(format!("unsupported optimization level: {token}")))
    }
}

/// Requested debug-information level (`0` = none, `1`..`3` increasing
/// detail, GCC `-g` numbering).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub struct DebugInfo(u8);

impl DebugInfo {
    /// The maximum level any vendor understands.
    pub const MAX: u8 = 3;

    /// Validate a raw level.
    #[must_use]
    pub const fn new(level: u8) -> Option<Self> {
        if level <= Self::MAX { Some(Self(level)) } else { None }
    }

    /// The numeric level.
    #[must_use]
    pub const fn level(self) -> u8 {
        self.0
    }

    /// Whether any debug information was requested.
    #[must_use]
    pub const fn enabled(self) -> bool {
        self.0 > 0
    }
}

impl Display for DebugInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<DebugInfo> for u8 {
    fn from(debug: DebugInfo) -> Self {
        debug.0
    }
}

impl<'de> Deserialize<'de> for DebugInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // `true` means "the usual" (-g), matching what front ends emit.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Switch(bool),
            Level(u64),
        }
        let level = match Raw::deserialize(deserializer)? {
            Raw::Switch(true) => 2,
            Raw::Switch(false) => 0,
            Raw::Level(n) => n,
        };
        u8::try_from(level)
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| D::Error::custom(format!("unsupported debug level: {level}")))
    }
}

/// Errors raised by toolchain selection and command synthesis.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolchainError {
    /// The requested compiler/linker pairing is not in the supported set.
    #[error("unsupported toolchain pairing: {compiler} with {linker}")]
    UnsupportedPairing {
        /// Requested compiler.
        compiler: CompilerKind,
        /// Requested linker.
        linker: LinkerKind,
    },
    /// The vendor cannot express the requested optimization level.
    #[error("{tool} does not support optimization level {level}")]
    UnsupportedOptimization {
        /// Tool name.
        tool: &'static str,
        /// Offending level.
        level: Optimization,
    },
    /// The vendor cannot express the requested debug level.
    #[error("{tool} does not support debug level {level}")]
    UnsupportedDebug {
        /// Tool name.
        tool: &'static str,
        /// Offending level.
        level: DebugInfo,
    },
    /// A node class that can never appear in a link line reached a linker.
    /// This is a programming error in the caller, not a user error.
    #[error("node class {class} cannot be linked")]
    UnlinkableNode {
        /// Class name of the offending node.
        class: &'static str,
    },
    /// A dependency reached the linker before `prepare` resolved its
    /// output. Also a programming error.
    #[error("node {node} reached the linker without a resolved output")]
    MissingOutput {
        /// Display name of the offending node.
        node: String,
    },
    /// Stripping was requested under a toolchain without a strip tool.
    #[error("{toolchain} toolchains have no strip step")]
    StripUnavailable {
        /// Toolchain family name.
        toolchain: &'static str,
    },
}

/// Inputs to compiler command synthesis for one translation unit.
#[derive(Debug)]
pub struct CompileSpec<'a> {
    /// Object (or preprocessed) output path; the vendor suffix is appended
    /// only if missing.
    pub output: &'a Utf8Path,
    /// The translation unit.
    pub source: &'a Utf8Path,
    /// Include search paths.
    pub includes: &'a [Utf8PathBuf],
    /// Preprocessor definitions, `NAME` or `NAME=VALUE`.
    pub definitions: &'a [String],
    /// Extra flags, resolved against the compiler's scope id.
    pub flags: &'a [Flag],
    /// Optimization level.
    pub optimization: Optimization,
    /// Debug-information level.
    pub debug: DebugInfo,
    /// Force position-independent code.
    pub position_independent: bool,
    /// Stop after preprocessing.
    pub preprocess_only: bool,
}

/// Inputs to linker command synthesis for one target.
#[derive(Debug)]
pub struct LinkSpec<'a> {
    /// Linked output path; the platform suffix is already applied.
    pub output: &'a Utf8Path,
    /// Dependency inputs, already converted through [`Linker::accept`].
    pub inputs: &'a [String],
    /// Library search paths.
    pub search_paths: &'a [Utf8PathBuf],
    /// Extra flags, resolved against the linker's scope id.
    pub flags: &'a [Flag],
    /// Produce a shared/dynamic library instead of an executable.
    pub dynamic: bool,
}

/// A vendor-specific compiler front.
pub trait Compiler {
    /// Tool name, e.g. `gcc`.
    fn name(&self) -> &'static str;
    /// Flag-scope family.
    fn id(&self) -> ToolchainId;
    /// Executable invoked, honouring any explicit override.
    fn exec(&self) -> &Utf8Path;
    /// Synthesise the compile command line.
    ///
    /// # Errors
    ///
    /// Returns [`ToolchainError`] when the vendor cannot express the
    /// requested optimization or debug level.
    fn command(&self, spec: &CompileSpec<'_>) -> Result<String, ToolchainError>;
}

/// A vendor-specific linker.
pub trait Linker {
    /// Tool name, e.g. `ld`.
    fn name(&self) -> &'static str;
    /// Flag-scope family.
    fn id(&self) -> ToolchainId;
    /// Executable invoked, honouring any explicit override.
    fn exec(&self) -> &Utf8Path;
    /// Synthesise the link command line.
    ///
    /// # Errors
    ///
    /// Returns [`ToolchainError`] on options the vendor cannot express.
    fn command(&self, spec: &LinkSpec<'_>) -> Result<String, ToolchainError>;
    /// Convert one dependency node into this linker's input syntax.
    ///
    /// Object files contribute their paths; object libraries contribute
    /// their members' paths (linkers take objects, not bundles of them);
    /// extension references become `-lNAME`-style requests or drop out when
    /// scoped to another toolchain; application dependencies contribute
    /// their import libraries.
    ///
    /// # Errors
    ///
    /// Returns [`ToolchainError::UnlinkableNode`] for node classes that can
    /// never appear in a link line.
    fn accept(&self, graph: &Graph, dep: NodeId) -> Result<Option<String>, ToolchainError>;
}

/// A static-library archiver.
pub trait Archiver {
    /// Executable invoked.
    fn exec(&self) -> &Utf8Path;
    /// Synthesise the archive command line over member object paths.
    fn command(&self, output: &Utf8Path, members: &[String]) -> String;
}

/// Compilers selectable on the command line or in a blueprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CompilerKind {
    /// GNU C compiler.
    Gcc,
    /// Clang.
    Clang,
    /// Tiny C Compiler.
    Tcc,
    /// Microsoft `cl.exe`.
    Cl,
}

impl Display for CompilerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gcc => "gcc",
            Self::Clang => "clang",
            Self::Tcc => "tcc",
            Self::Cl => "cl",
        };
        f.write_str(name)
    }
}

/// Linkers selectable on the command line or in a blueprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LinkerKind {
    /// Link through the GCC-family driver.
    Ld,
    /// LLVM bitcode linker.
    LlvmLink,
    /// Microsoft `link.exe`.
    Link,
    /// TCC linking itself.
    Tcc,
}

impl Display for LinkerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ld => "ld",
            Self::LlvmLink => "llvm-link",
            Self::Link => "link",
            Self::Tcc => "tcc",
        };
        f.write_str(name)
    }
}

/// The linker a compiler pairs with when none is named explicitly.
#[must_use]
pub const fn default_linker(compiler: CompilerKind) -> LinkerKind {
    match compiler {
        CompilerKind::Gcc | CompilerKind::Clang => LinkerKind::Ld,
        CompilerKind::Tcc => LinkerKind::Tcc,
        CompilerKind::Cl => LinkerKind::Link,
    }
}

/// A validated compiler/linker/archiver set, plus the strip tool where the
/// family has one.
pub struct Toolchain {
    /// Active compiler.
    pub compiler: Box<dyn Compiler>,
    /// Active linker.
    pub linker: Box<dyn Linker>,
    /// Active archiver.
    pub archiver: Box<dyn Archiver>,
    /// Strip tool, absent for MSVC.
    pub stripper: Option<gnu::Strip>,
}

impl Toolchain {
    /// The flag-scope id compile-side flags resolve against.
    #[must_use]
    pub fn id(&self) -> ToolchainId {
        self.compiler.id()
    }
}

/// Validate a compiler/linker pairing and assemble the toolchain.
///
/// The supported pairings are gcc+ld, clang+ld, clang+llvm-link, cl+link,
/// and tcc+tcc; anything else is rejected here, before graph work begins.
///
/// # Errors
///
/// Returns [`ToolchainError::UnsupportedPairing`] for any other pairing.
pub fn select(compiler: CompilerKind, linker: LinkerKind) -> Result<Toolchain, ToolchainError> {
    let toolchain = match (compiler, linker) {
        (CompilerKind::Gcc, LinkerKind::Ld) => Toolchain {
            compiler: Box::new(gnu::Gcc::new()),
            linker: Box::new(gnu::Ld::new()),
            archiver: Box::new(gnu::Ar::new()),
            stripper: Some(gnu::Strip::new()),
        },
        (CompilerKind::Clang, LinkerKind::Ld) => Toolchain {
            compiler: Box::new(gnu::Clang::new()),
            // Clang drives its own link step.
            linker: Box::new(gnu::Ld::with_exec("clang")),
            archiver: Box::new(gnu::Ar::new()),
            stripper: Some(gnu::Strip::new()),
        },
        (CompilerKind::Clang, LinkerKind::LlvmLink) => Toolchain {
            compiler: Box::new(gnu::Clang::new()),
            linker: Box::new(gnu::LlvmLink::new()),
            archiver: Box::new(gnu::Ar::with_exec("llvm-ar")),
            stripper: Some(gnu::Strip::new()),
        },
        (CompilerKind::Cl, LinkerKind::Link) => Toolchain {
            compiler: Box::new(msvc::Cl::new()),
            linker: Box::new(msvc::MsLink::new()),
            archiver: Box::new(msvc::MsLib::new()),
            stripper: None,
        },
        (CompilerKind::Tcc, LinkerKind::Tcc) => Toolchain {
            compiler: Box::new(gnu::Tcc::new()),
            linker: Box::new(gnu::TccLink::new()),
            archiver: Box::new(gnu::Ar::new()),
            stripper: Some(gnu::Strip::new()),
        },
        _ => return Err(ToolchainError::UnsupportedPairing { compiler, linker }),
    };
    Ok(toolchain)
}

/// Incremental command-line assembly with space-aware quoting.
///
/// Arguments containing whitespace are double-quoted when the line is
/// rendered, which both `sh` and `cmd.exe` accept. Pre-assembled
/// fragments (a flattened object-library contribution, a `-lm` request)
/// go through [`CommandBuilder::raw`] and are never re-quoted.
#[derive(Debug, Default)]
pub struct CommandBuilder {
    command: String,
    args: Vec<Arg>,
}

#[derive(Debug)]
struct Arg {
    text: String,
    verbatim: bool,
}

impl CommandBuilder {
    /// Start a command line for `command`.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(Arg {
            text: arg.into(),
            verbatim: false,
        });
        self
    }

    /// Append one argument when `cond` holds.
    pub fn arg_if(&mut self, cond: bool, arg: impl Into<String>) -> &mut Self {
        if cond {
            self.arg(arg);
        }
        self
    }

    /// Append every argument in `args`.
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Append a pre-assembled fragment, exempt from quoting.
    pub fn raw(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(Arg {
            text: arg.into(),
            verbatim: true,
        });
        self
    }

    /// Append every pre-assembled fragment in `args`, exempt from quoting.
    pub fn raw_args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self.raw(arg);
        }
        self
    }

    /// Append each of `args` prefixed with `prefix` (e.g. `-I`, `/D`).
    pub fn args_with_prefix<I, S>(&mut self, prefix: &str, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Display,
    {
        for arg in args {
            self.arg(format!("{prefix}{arg}"));
        }
        self
    }

    /// Render the command line.
    #[must_use]
    pub fn build(&self) -> String {
        let mut line = self.command.clone();
        for arg in &self.args {
            line.push(' ');
            if !arg.verbatim && arg.text.contains(' ') {
                line.push('"');
                line.push_str(&arg.text);
                line.push('"');
            } else {
                line.push_str(&arg.text);
            }
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CompilerKind::Gcc, LinkerKind::Ld)]
    #[case(CompilerKind::Clang, LinkerKind::Ld)]
    #[case(CompilerKind::Clang, LinkerKind::LlvmLink)]
    #[case(CompilerKind::Cl, LinkerKind::Link)]
    #[case(CompilerKind::Tcc, LinkerKind::Tcc)]
    fn supported_pairings_select(#[case] compiler: CompilerKind, #[case] linker: LinkerKind) {
        assert!(select(compiler, linker).is_ok());
    }

    #[rstest]
    #[case(CompilerKind::Cl, LinkerKind::Ld)]
    #[case(CompilerKind::Gcc, LinkerKind::Link)]
    #[case(CompilerKind::Gcc, LinkerKind::LlvmLink)]
    #[case(CompilerKind::Tcc, LinkerKind::Ld)]
    fn incompatible_pairings_are_rejected(#[case] compiler: CompilerKind, #[case] linker: LinkerKind) {
        assert_eq!(
            select(compiler, linker).err(),
            Some(ToolchainError::UnsupportedPairing { compiler, linker })
        );
    }

    #[test]
    fn clang_paired_with_ld_links_through_clang() {
        let toolchain = select(CompilerKind::Clang, LinkerKind::Ld).expect("pairing");
        assert_eq!(toolchain.linker.exec(), Utf8Path::new("clang"));
    }

    #[test]
    fn command_builder_quotes_embedded_spaces() {
        let mut builder = CommandBuilder::new("cc");
        builder.arg("-c").arg("a file.c").args_with_prefix("-I", ["include dir"]);
        assert_eq!(builder.build(), "cc -c \"a file.c\" \"-Iinclude dir\"");
    }

    #[rstest]
    #[case("0", Optimization::O0)]
    #[case("s", Optimization::Size)]
    #[case("z", Optimization::SizeZ)]
    fn optimization_tokens_round_trip(#[case] token: &str, #[case] level: Optimization) {
        assert_eq!(Optimization::from_token(token), Some(level));
        assert_eq!(level.token(), token);
    }

    #[test]
    fn debug_levels_are_bounded() {
        assert_eq!(DebugInfo::new(2).map(DebugInfo::level), Some(2));
        assert!(DebugInfo::new(4).is_none());
    }
}
