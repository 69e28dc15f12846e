//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure and its subcommands. The
//! real configuration surface is the blueprint; the flags here only pick
//! the toolchain pair, the target OS, and the backend.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::platform::Os;
use crate::toolchain::{CompilerKind, LinkerKind};
use crate::vs_gen::VsPlatform;

/// A dependency-graph compiler/linker driver that runs builds directly or
/// emits Makefiles, NMake files, and Visual Studio solutions.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the blueprint file to use.
    #[arg(short, long, value_name = "FILE", default_value = "tsugite.json")]
    pub file: Utf8PathBuf,

    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Compiler to drive.
    #[arg(long, value_enum, default_value_t = CompilerKind::Gcc)]
    pub compiler: CompilerKind,

    /// Linker to pair with the compiler; derived from it when omitted.
    #[arg(long, value_enum)]
    pub linker: Option<LinkerKind>,

    /// Target OS; overrides the blueprint and the host default.
    #[arg(long, value_enum)]
    pub os: Option<Os>,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Optional subcommand to execute; defaults to `build` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Parse command-line arguments, providing `build` as the default
    /// command.
    #[must_use]
    pub fn parse_with_default() -> Self {
        Self::parse().with_default_command()
    }

    /// Parse the provided arguments, applying the default command when
    /// needed.
    ///
    /// # Panics
    ///
    /// Panics if argument parsing fails.
    #[must_use]
    pub fn parse_from_with_default<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(args)
            .unwrap_or_else(|e| panic!("CLI parsing failed: {e}"))
            .with_default_command()
    }

    /// Apply the default command if none was specified.
    #[must_use]
    fn with_default_command(mut self) -> Self {
        if self.command.is_none() {
            self.command = Some(Commands::default());
        }
        self
    }
}

/// Arguments accepted by the `build` command.
#[derive(Debug, Args, PartialEq, Eq, Clone, Default)]
pub struct BuildArgs {
    /// Print each command in execution order instead of running it.
    #[arg(long)]
    pub dry_run: bool,

    /// A list of specific targets to build.
    pub targets: Vec<String>,
}

/// Arguments accepted by the `makefile` command.
#[derive(Debug, Args, PartialEq, Eq, Clone)]
pub struct MakefileArgs {
    /// Output path for the generated file.
    ///
    /// Use `-` to write to stdout.
    #[arg(value_name = "FILE", default_value = "Makefile")]
    pub file: Utf8PathBuf,

    /// Emit NMake syntax instead of POSIX make.
    #[arg(long)]
    pub nmake: bool,
}

/// Arguments accepted by the `vs` command.
#[derive(Debug, Args, PartialEq, Eq, Clone)]
pub struct VsArgs {
    /// Directory receiving the solution and project files.
    #[arg(value_name = "DIR", default_value = ".")]
    pub dir: Utf8PathBuf,

    /// Solution platform.
    #[arg(long, value_enum, default_value_t = VsPlatform::X64)]
    pub platform: VsPlatform,
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Build by running toolchain commands directly.
    Build(BuildArgs),

    /// Write a Makefile or NMake file without building.
    Makefile(MakefileArgs),

    /// Write a Visual Studio solution and its project files.
    Vs(VsArgs),
}

impl Default for Commands {
    fn default() -> Self {
        Self::Build(BuildArgs::default())
    }
}
