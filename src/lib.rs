//! Tsugite core library.
//!
//! A build-graph compiler/linker driver: given a declarative description
//! of compilation units, libraries, applications and their dependencies,
//! it derives per-file and per-target command lines for several
//! toolchains and either executes them directly or emits equivalent
//! Makefiles, NMake files, or Visual Studio solutions.

pub mod blueprint;
pub mod cli;
pub mod extension;
pub mod flags;
pub mod graph;
pub mod make_gen;
pub mod platform;
pub mod runner;
pub mod toolchain;
pub mod vs_gen;
