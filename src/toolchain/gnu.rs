//! GCC-family, Clang, LLVM and TCC descriptors.
//!
//! The compilers here share one command shape and differ in executable,
//! flag-scope id, and the option subsets they reject. The linkers link
//! through the compiler driver (`ld` descriptor), through `llvm-link`,
//! or through `tcc` itself.

use camino::{Utf8Path, Utf8PathBuf};

use crate::flags::{ToolchainId, filter_flags};
use crate::graph::{ExtensionLink, Graph, NodeId, NodeKind};

use super::{
    Archiver, CommandBuilder, CompileSpec, Compiler, DebugInfo, LinkSpec, Linker, Optimization,
    ToolchainError,
};

fn ensure_suffix(path: &Utf8Path, suffix: &str) -> Utf8PathBuf {
    if path.as_str().ends_with(suffix) {
        path.to_owned()
    } else {
        Utf8PathBuf::from(format!("{path}{suffix}"))
    }
}

fn dep_output<'g>(graph: &'g Graph, id: NodeId) -> Result<&'g Utf8Path, ToolchainError> {
    graph
        .node(id)
        .output
        .as_deref()
        .ok_or_else(|| ToolchainError::MissingOutput {
            node: graph.node(id).name().to_owned(),
        })
}

fn debug_flag(debug: DebugInfo) -> Option<String> {
    match debug.level() {
        0 => None,
        2 => Some("-g".to_owned()),
        level => Some(format!("-g{level}")),
    }
}

fn unix_compile(
    exec: &Utf8Path,
    scope: ToolchainId,
    spec: &CompileSpec<'_>,
) -> Result<String, ToolchainError> {
    let suffix = if spec.preprocess_only { ".i" } else { ".o" };
    let output = ensure_suffix(spec.output, suffix);
    let mut builder = CommandBuilder::new(exec.as_str());
    builder
        .arg(if spec.preprocess_only { "-E" } else { "-c" })
        .arg(format!("-O{}", spec.optimization.token()));
    if let Some(flag) = debug_flag(spec.debug) {
        builder.arg(flag);
    }
    builder
        .arg_if(spec.position_independent, "-fPIC")
        .args_with_prefix("-D", spec.definitions)
        .args_with_prefix("-I", spec.includes)
        .args(filter_flags(spec.flags, scope))
        .arg("-o")
        .arg(output.as_str())
        .arg(spec.source.as_str());
    Ok(builder.build())
}

/// Convert a dependency node into Unix linker syntax.
///
/// Object files, libraries, applications and static extensions contribute
/// their output paths; object libraries contribute their members' paths;
/// named dynamic extensions become `-lNAME`; literal extension references
/// resolve against `scope` and drop out when tagged for another family.
fn unix_accept(
    scope: ToolchainId,
    graph: &Graph,
    dep: NodeId,
) -> Result<Option<String>, ToolchainError> {
    let node = graph.node(dep);
    match &node.kind {
        NodeKind::ObjectFile { .. }
        | NodeKind::StaticLibrary { .. }
        | NodeKind::DynamicLibrary { .. }
        | NodeKind::Application { .. }
        | NodeKind::StaticExtension { .. } => {
            Ok(Some(dep_output(graph, dep)?.as_str().to_owned()))
        }
        NodeKind::ObjectLibrary { .. } => {
            let members: Vec<String> = graph
                .object_members(dep)
                .into_iter()
                .map(|member| dep_output(graph, member).map(|path| path.as_str().to_owned()))
                .collect::<Result<_, _>>()?;
            Ok(Some(members.join(" ")))
        }
        NodeKind::DynamicExtension { link } => match link {
            ExtensionLink::Named(name) => Ok(Some(format!("-l{name}"))),
            ExtensionLink::Literal(flag) => Ok(flag.filter(scope).map(str::to_owned)),
        },
        NodeKind::Variable { .. } | NodeKind::Entry { .. } => Err(ToolchainError::UnlinkableNode {
            class: node.kind.class_name(),
        }),
    }
}

fn unix_link(exec: &Utf8Path, scope: ToolchainId, spec: &LinkSpec<'_>) -> String {
    let mut builder = CommandBuilder::new(exec.as_str());
    builder
        .arg_if(spec.dynamic, "-shared")
        .arg("-o")
        .arg(spec.output.as_str())
        // Inputs are pre-assembled fragments from `accept`.
        .raw_args(spec.inputs.iter().cloned())
        .args_with_prefix("-L", spec.search_paths)
        .args(filter_flags(spec.flags, scope));
    builder.build()
}

/// The GNU C compiler.
#[derive(Debug)]
pub struct Gcc {
    exec: Utf8PathBuf,
}

impl Gcc {
    /// Descriptor invoking `gcc` from the search path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exec("gcc")
    }

    /// Descriptor with an explicit executable override.
    #[must_use]
    pub fn with_exec(exec: impl Into<Utf8PathBuf>) -> Self {
        Self { exec: exec.into() }
    }
}

impl Default for Gcc {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler for Gcc {
    fn name(&self) -> &'static str {
        "gcc"
    }

    fn id(&self) -> ToolchainId {
        ToolchainId::Gnu
    }

    fn exec(&self) -> &Utf8Path {
        &self.exec
    }

    fn command(&self, spec: &CompileSpec<'_>) -> Result<String, ToolchainError> {
        unix_compile(&self.exec, self.id(), spec)
    }
}

/// Clang. Command-compatible with [`Gcc`]; kept separate so pairings and
/// executable defaults stay explicit.
#[derive(Debug)]
pub struct Clang {
    exec: Utf8PathBuf,
}

impl Clang {
    /// Descriptor invoking `clang` from the search path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exec("clang")
    }

    /// Descriptor with an explicit executable override.
    #[must_use]
    pub fn with_exec(exec: impl Into<Utf8PathBuf>) -> Self {
        Self { exec: exec.into() }
    }
}

impl Default for Clang {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler for Clang {
    fn name(&self) -> &'static str {
        "clang"
    }

    fn id(&self) -> ToolchainId {
        ToolchainId::Gnu
    }

    fn exec(&self) -> &Utf8Path {
        &self.exec
    }

    fn command(&self, spec: &CompileSpec<'_>) -> Result<String, ToolchainError> {
        unix_compile(&self.exec, self.id(), spec)
    }
}

/// The Tiny C Compiler.
#[derive(Debug)]
pub struct Tcc {
    exec: Utf8PathBuf,
}

impl Tcc {
    /// Descriptor invoking `tcc` from the search path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exec("tcc")
    }

    /// Descriptor with an explicit executable override.
    #[must_use]
    pub fn with_exec(exec: impl Into<Utf8PathBuf>) -> Self {
        Self { exec: exec.into() }
    }
}

impl Default for Tcc {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler for Tcc {
    fn name(&self) -> &'static str {
        "tcc"
    }

    fn id(&self) -> ToolchainId {
        ToolchainId::Tcc
    }

    fn exec(&self) -> &Utf8Path {
        &self.exec
    }

    fn command(&self, spec: &CompileSpec<'_>) -> Result<String, ToolchainError> {
        // tcc has no size-optimization modes.
        if matches!(spec.optimization, Optimization::Size | Optimization::SizeZ) {
            return Err(ToolchainError::UnsupportedOptimization {
                tool: self.name(),
                level: spec.optimization,
            });
        }
        unix_compile(&self.exec, self.id(), spec)
    }
}

/// Link through the GCC-family compiler driver.
#[derive(Debug)]
pub struct Ld {
    exec: Utf8PathBuf,
}

impl Ld {
    /// Descriptor linking through `gcc`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exec("gcc")
    }

    /// Descriptor with an explicit driver override (e.g. `clang`).
    #[must_use]
    pub fn with_exec(exec: impl Into<Utf8PathBuf>) -> Self {
        Self { exec: exec.into() }
    }
}

impl Default for Ld {
    fn default() -> Self {
        Self::new()
    }
}

impl Linker for Ld {
    fn name(&self) -> &'static str {
        "ld"
    }

    fn id(&self) -> ToolchainId {
        ToolchainId::Gnu
    }

    fn exec(&self) -> &Utf8Path {
        &self.exec
    }

    fn command(&self, spec: &LinkSpec<'_>) -> Result<String, ToolchainError> {
        Ok(unix_link(&self.exec, self.id(), spec))
    }

    fn accept(&self, graph: &Graph, dep: NodeId) -> Result<Option<String>, ToolchainError> {
        unix_accept(self.id(), graph, dep)
    }
}

/// The LLVM bitcode linker.
#[derive(Debug)]
pub struct LlvmLink {
    exec: Utf8PathBuf,
}

impl LlvmLink {
    /// Descriptor invoking `llvm-link` from the search path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exec("llvm-link")
    }

    /// Descriptor with an explicit executable override.
    #[must_use]
    pub fn with_exec(exec: impl Into<Utf8PathBuf>) -> Self {
        Self { exec: exec.into() }
    }
}

impl Default for LlvmLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Linker for LlvmLink {
    fn name(&self) -> &'static str {
        "llvm-link"
    }

    fn id(&self) -> ToolchainId {
        ToolchainId::Llvm
    }

    fn exec(&self) -> &Utf8Path {
        &self.exec
    }

    fn command(&self, spec: &LinkSpec<'_>) -> Result<String, ToolchainError> {
        // llvm-link has no shared/executable distinction; the output kind
        // is decided downstream.
        let mut builder = CommandBuilder::new(self.exec.as_str());
        builder
            .arg("-o")
            .arg(spec.output.as_str())
            .raw_args(spec.inputs.iter().cloned())
            .args_with_prefix("-L", spec.search_paths)
            .args(filter_flags(spec.flags, self.id()));
        Ok(builder.build())
    }

    fn accept(&self, graph: &Graph, dep: NodeId) -> Result<Option<String>, ToolchainError> {
        unix_accept(self.id(), graph, dep)
    }
}

/// TCC linking its own objects.
#[derive(Debug)]
pub struct TccLink {
    exec: Utf8PathBuf,
}

impl TccLink {
    /// Descriptor invoking `tcc` from the search path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exec("tcc")
    }

    /// Descriptor with an explicit executable override.
    #[must_use]
    pub fn with_exec(exec: impl Into<Utf8PathBuf>) -> Self {
        Self { exec: exec.into() }
    }
}

impl Default for TccLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Linker for TccLink {
    fn name(&self) -> &'static str {
        "tcc"
    }

    fn id(&self) -> ToolchainId {
        ToolchainId::Tcc
    }

    fn exec(&self) -> &Utf8Path {
        &self.exec
    }

    fn command(&self, spec: &LinkSpec<'_>) -> Result<String, ToolchainError> {
        Ok(unix_link(&self.exec, self.id(), spec))
    }

    fn accept(&self, graph: &Graph, dep: NodeId) -> Result<Option<String>, ToolchainError> {
        unix_accept(self.id(), graph, dep)
    }
}

/// The `ar` archiver.
#[derive(Debug)]
pub struct Ar {
    exec: Utf8PathBuf,
}

impl Ar {
    /// Descriptor invoking `ar` from the search path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exec("ar")
    }

    /// Descriptor with an explicit executable override (e.g. `llvm-ar`).
    #[must_use]
    pub fn with_exec(exec: impl Into<Utf8PathBuf>) -> Self {
        Self { exec: exec.into() }
    }
}

impl Default for Ar {
    fn default() -> Self {
        Self::new()
    }
}

impl Archiver for Ar {
    fn exec(&self) -> &Utf8Path {
        &self.exec
    }

    fn command(&self, output: &Utf8Path, members: &[String]) -> String {
        let mut builder = CommandBuilder::new(self.exec.as_str());
        builder
            .arg("rcs")
            .arg(output.as_str())
            .args(members.iter().cloned());
        builder.build()
    }
}

/// The binutils strip tool.
#[derive(Debug)]
pub struct Strip {
    exec: Utf8PathBuf,
}

impl Strip {
    /// Descriptor invoking `strip` from the search path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exec("strip")
    }

    /// Descriptor with an explicit executable override.
    #[must_use]
    pub fn with_exec(exec: impl Into<Utf8PathBuf>) -> Self {
        Self { exec: exec.into() }
    }

    /// Executable invoked.
    #[must_use]
    pub fn exec(&self) -> &Utf8Path {
        &self.exec
    }

    /// Synthesise the strip command for a linked binary.
    #[must_use]
    pub fn command(&self, binary: &Utf8Path) -> String {
        let mut builder = CommandBuilder::new(self.exec.as_str());
        builder.arg(binary.as_str());
        builder.build()
    }
}

impl Default for Strip {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::Flag;
    use crate::graph::Settings;
    use crate::platform::{Os, Platform};
    use rstest::rstest;

    fn spec<'a>(
        output: &'a Utf8Path,
        source: &'a Utf8Path,
        flags: &'a [Flag],
    ) -> CompileSpec<'a> {
        CompileSpec {
            output,
            source,
            includes: &[],
            definitions: &[],
            flags,
            optimization: Optimization::O2,
            debug: DebugInfo::default(),
            position_independent: false,
            preprocess_only: false,
        }
    }

    #[test]
    fn gcc_compile_command_shape() {
        let gcc = Gcc::new();
        let flags = [Flag::universal("-Wall"), Flag::scoped(ToolchainId::Msc, "/W4")];
        let includes = [Utf8PathBuf::from("include")];
        let definitions = ["NDEBUG".to_owned()];
        let compile = CompileSpec {
            includes: &includes,
            definitions: &definitions,
            debug: DebugInfo::new(2).expect("level"),
            position_independent: true,
            ..spec(Utf8Path::new("src/main.o"), Utf8Path::new("src/main.c"), &flags)
        };
        assert_eq!(
            gcc.command(&compile).expect("command"),
            "gcc -c -O2 -g -fPIC -DNDEBUG -Iinclude -Wall -o src/main.o src/main.c"
        );
    }

    #[test]
    fn output_suffix_is_appended_once() {
        let gcc = Gcc::new();
        let flags = [];
        let bare = gcc
            .command(&spec(Utf8Path::new("main"), Utf8Path::new("main.c"), &flags))
            .expect("command");
        let suffixed = gcc
            .command(&spec(Utf8Path::new("main.o"), Utf8Path::new("main.c"), &flags))
            .expect("command");
        assert_eq!(bare, suffixed);
        assert!(bare.contains("-o main.o"));
    }

    #[test]
    fn preprocess_only_swaps_mode_and_suffix() {
        let gcc = Gcc::new();
        let flags = [];
        let command = gcc
            .command(&CompileSpec {
                preprocess_only: true,
                ..spec(Utf8Path::new("main"), Utf8Path::new("main.c"), &flags)
            })
            .expect("command");
        assert!(command.contains("-E"), "command: {command}");
        assert!(command.contains("-o main.i"), "command: {command}");
    }

    #[test]
    fn tcc_rejects_size_optimization() {
        let tcc = Tcc::new();
        let flags = [];
        let err = tcc
            .command(&CompileSpec {
                optimization: Optimization::Size,
                ..spec(Utf8Path::new("main.o"), Utf8Path::new("main.c"), &flags)
            })
            .expect_err("unsupported");
        assert_eq!(
            err,
            ToolchainError::UnsupportedOptimization {
                tool: "tcc",
                level: Optimization::Size
            }
        );
    }

    #[rstest]
    #[case(false, "gcc -o demo a.o -lm")]
    #[case(true, "gcc -shared -o demo a.o -lm")]
    fn ld_link_command_shape(#[case] dynamic: bool, #[case] expected: &str) {
        let ld = Ld::new();
        let inputs = vec!["a.o".to_owned(), "-lm".to_owned()];
        let command = ld
            .command(&LinkSpec {
                output: Utf8Path::new("demo"),
                inputs: &inputs,
                search_paths: &[],
                flags: &[],
                dynamic,
            })
            .expect("command");
        assert_eq!(command, expected);
    }

    #[test]
    fn accept_covers_every_linkable_class() {
        let mut graph = Graph::default();
        let object = graph.add_object_file("a.c", Settings::default());
        let bundle = graph.add_object_library("core", Settings::default());
        let other = graph.add_object_file("b.c", Settings::default());
        let named = graph.add_dynamic_extension(ExtensionLink::Named("m".into()));
        let scoped = graph.add_dynamic_extension(ExtensionLink::Literal(Flag::scoped(
            ToolchainId::Msc,
            "winmm.lib",
        )));
        let archive = graph.add_static_extension("vendor/libz.a");
        graph.add_dep(bundle, object);
        graph.add_dep(bundle, other);
        graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");

        let ld = Ld::new();
        assert_eq!(ld.accept(&graph, object).expect("object"), Some("a.o".into()));
        assert_eq!(
            ld.accept(&graph, bundle).expect("bundle"),
            Some("a.o b.o".into())
        );
        assert_eq!(ld.accept(&graph, named).expect("named"), Some("-lm".into()));
        // Tagged for MSVC, dropped under gnu.
        assert_eq!(ld.accept(&graph, scoped).expect("scoped"), None);
        assert_eq!(
            ld.accept(&graph, archive).expect("archive"),
            Some("vendor/libz.a".into())
        );
    }

    #[test]
    fn accept_rejects_unlinkable_classes() {
        let mut graph = Graph::default();
        let var = graph.add_variable("CC", Some("gcc".into()), None);
        graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");
        assert_eq!(
            Ld::new().accept(&graph, var),
            Err(ToolchainError::UnlinkableNode { class: "variable" })
        );
    }

    #[test]
    fn ar_archives_members() {
        let ar = Ar::new();
        let members = vec!["a.o".to_owned(), "b.o".to_owned()];
        assert_eq!(
            ar.command(Utf8Path::new("libcore.a"), &members),
            "ar rcs libcore.a a.o b.o"
        );
    }

    #[test]
    fn strip_command_names_the_binary() {
        assert_eq!(Strip::new().command(Utf8Path::new("demo")), "strip demo");
    }
}
