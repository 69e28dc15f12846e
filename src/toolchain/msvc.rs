//! Microsoft `cl`, `link` and `lib` descriptors.

use camino::{Utf8Path, Utf8PathBuf};

use crate::flags::{ToolchainId, filter_flags};
use crate::graph::{ExtensionLink, Graph, NodeId, NodeKind};

use super::{
    Archiver, CommandBuilder, CompileSpec, Compiler, LinkSpec, Linker, Optimization,
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

fn import_library(graph: &Graph, id: NodeId) -> Result<String, ToolchainError> {
    let basename = graph
        .node(id)
        .basename
        .as_deref()
        .ok_or_else(|| ToolchainError::MissingOutput {
            node: graph.node(id).name().to_owned(),
        })?;
    Ok(format!("{basename}.lib"))
}

/// The Microsoft C compiler, `cl.exe`.
#[derive(Debug)]
pub struct Cl {
    exec: Utf8PathBuf,
}

impl Cl {
    /// Descriptor invoking `cl` from the search path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exec("cl")
    }

    /// Descriptor with an explicit executable override.
    #[must_use]
    pub fn with_exec(exec: impl Into<Utf8PathBuf>) -> Self {
        Self { exec: exec.into() }
    }
}

impl Default for Cl {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler for Cl {
    fn name(&self) -> &'static str {
        "cl"
    }

    fn id(&self) -> ToolchainId {
        ToolchainId::Msc
    }

    fn exec(&self) -> &Utf8Path {
        &self.exec
    }

    fn command(&self, spec: &CompileSpec<'_>) -> Result<String, ToolchainError> {
        let optimization = match spec.optimization {
            Optimization::O0 => "/Od",
            Optimization::O1 => "/O1",
            Optimization::O2 => "/O2",
            level => {
                return Err(ToolchainError::UnsupportedOptimization {
                    tool: self.name(),
                    level,
                });
            }
        };
        // cl emits one PDB flavour; the graduated -g levels have no
        // equivalent beyond on/off.
        let debug = match spec.debug.level() {
            0 => None,
            1 | 2 => Some("/Zi"),
            _ => {
                return Err(ToolchainError::UnsupportedDebug {
                    tool: self.name(),
                    level: spec.debug,
                });
            }
        };
        let output = ensure_suffix(spec.output, ".obj");
        let mut builder = CommandBuilder::new(self.exec.as_str());
        builder
            .arg("/nologo")
            .arg(if spec.preprocess_only { "/P" } else { "/c" })
            .arg(optimization);
        if let Some(flag) = debug {
            builder.arg(flag);
        }
        // Position independence is the default on Windows; nothing to emit.
        builder
            .args_with_prefix("/D", spec.definitions)
            .args_with_prefix("/I", spec.includes)
            .args(filter_flags(spec.flags, self.id()))
            .arg(format!("/Fo{output}"))
            .arg(spec.source.as_str());
        Ok(builder.build())
    }
}

/// The Microsoft linker, `link.exe`.
#[derive(Debug)]
pub struct MsLink {
    exec: Utf8PathBuf,
}

impl MsLink {
    /// Descriptor invoking `link` from the search path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exec("link")
    }

    /// Descriptor with an explicit executable override.
    #[must_use]
    pub fn with_exec(exec: impl Into<Utf8PathBuf>) -> Self {
        Self { exec: exec.into() }
    }
}

impl Default for MsLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Linker for MsLink {
    fn name(&self) -> &'static str {
        "link"
    }

    fn id(&self) -> ToolchainId {
        ToolchainId::Msc
    }

    fn exec(&self) -> &Utf8Path {
        &self.exec
    }

    fn command(&self, spec: &LinkSpec<'_>) -> Result<String, ToolchainError> {
        let mut builder = CommandBuilder::new(self.exec.as_str());
        builder
            .arg("/NOLOGO")
            .arg_if(spec.dynamic, "/DLL")
            .arg(format!("/OUT:{}", spec.output))
            // Inputs are pre-assembled fragments from `accept`.
            .raw_args(spec.inputs.iter().cloned())
            .args_with_prefix("/LIBPATH:", spec.search_paths)
            .args(filter_flags(spec.flags, self.id()));
        Ok(builder.build())
    }

    fn accept(&self, graph: &Graph, dep: NodeId) -> Result<Option<String>, ToolchainError> {
        let node = graph.node(dep);
        match &node.kind {
            NodeKind::ObjectFile { .. }
            | NodeKind::StaticLibrary { .. }
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
            // Linking against a DLL or an executable goes through the
            // import library, which is distinct from the load-time binary.
            NodeKind::DynamicLibrary { .. } | NodeKind::Application { .. } => {
                Ok(Some(import_library(graph, dep)?))
            }
            NodeKind::DynamicExtension { link } => match link {
                ExtensionLink::Named(name) => Ok(Some(format!("{name}.lib"))),
                ExtensionLink::Literal(flag) => Ok(flag.filter(self.id()).map(str::to_owned)),
            },
            NodeKind::Variable { .. } | NodeKind::Entry { .. } => {
                Err(ToolchainError::UnlinkableNode {
                    class: node.kind.class_name(),
                })
            }
        }
    }
}

/// The Microsoft archiver, `lib.exe`.
#[derive(Debug)]
pub struct MsLib {
    exec: Utf8PathBuf,
}

impl MsLib {
    /// Descriptor invoking `lib` from the search path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exec("lib")
    }

    /// Descriptor with an explicit executable override.
    #[must_use]
    pub fn with_exec(exec: impl Into<Utf8PathBuf>) -> Self {
        Self { exec: exec.into() }
    }
}

impl Default for MsLib {
    fn default() -> Self {
        Self::new()
    }
}

impl Archiver for MsLib {
    fn exec(&self) -> &Utf8Path {
        &self.exec
    }

    fn command(&self, output: &Utf8Path, members: &[String]) -> String {
        let mut builder = CommandBuilder::new(self.exec.as_str());
        builder
            .arg("/NOLOGO")
            .arg(format!("/OUT:{output}"))
            .args(members.iter().cloned());
        builder.build()
    }
}
