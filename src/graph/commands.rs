//! Per-node command synthesis.
//!
//! Bridges the graph and the active toolchain: an object file becomes one
//! compile command from its composed settings; a library or application
//! becomes an archive or link command over its flattened dependencies;
//! an entry contributes its explicit command list verbatim, `$(VAR)`
//! placeholders intact (reification is a backend decision).

use thiserror::Error;

use crate::toolchain::{CompileSpec, LinkSpec, Toolchain, ToolchainError};

use super::model::{Graph, NodeId, NodeKind};
use super::settings::effective;

/// Errors raised while synthesising a node's commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    /// The active toolchain rejected the request.
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
    /// The node has no resolved output; `prepare` has not run.
    #[error("node {node} has no resolved output; prepare the graph first")]
    Unprepared {
        /// Display name of the offending node.
        node: String,
    },
}

/// Synthesise the commands building one node, in execution order.
///
/// Grouping constructs (object libraries), references (extensions) and
/// variables build nothing and yield an empty list.
///
/// # Errors
///
/// Returns [`SynthesisError`] when the toolchain cannot express the
/// node's settings or the graph was not prepared.
pub fn node_commands(
    graph: &Graph,
    id: NodeId,
    toolchain: &Toolchain,
) -> Result<Vec<String>, SynthesisError> {
    let node = graph.node(id);
    match &node.kind {
        NodeKind::ObjectFile {
            source,
            preprocess_only,
        } => {
            let composed = effective(graph, id);
            let output = resolved_output(graph, id)?;
            let spec = CompileSpec {
                output,
                source,
                includes: &composed.settings.includes,
                definitions: &composed.settings.definitions,
                flags: &composed.settings.cflags,
                optimization: composed.optimization(),
                debug: composed.debug(),
                position_independent: composed.position_independent,
                preprocess_only: *preprocess_only,
            };
            Ok(vec![toolchain.compiler.command(&spec)?])
        }
        NodeKind::StaticLibrary { .. } => {
            let output = resolved_output(graph, id)?;
            let members: Vec<String> = graph
                .object_members(id)
                .into_iter()
                .map(|member| resolved_output(graph, member).map(|path| path.as_str().to_owned()))
                .collect::<Result<_, _>>()?;
            Ok(vec![toolchain.archiver.command(output, &members)])
        }
        NodeKind::DynamicLibrary { .. } | NodeKind::Application { .. } => {
            let composed = effective(graph, id);
            let output = resolved_output(graph, id)?;
            let mut inputs = Vec::new();
            for dep in &node.deps {
                if let Some(input) = toolchain.linker.accept(graph, *dep)? {
                    inputs.push(input);
                }
            }
            let dynamic = matches!(node.kind, NodeKind::DynamicLibrary { .. });
            let spec = LinkSpec {
                output,
                inputs: &inputs,
                search_paths: &composed.settings.searches,
                flags: &composed.settings.ldflags,
                dynamic,
            };
            let mut commands = vec![toolchain.linker.command(&spec)?];
            if let NodeKind::Application { strip: true, .. } = node.kind {
                let stripper = toolchain.stripper.as_ref().ok_or_else(|| {
                    ToolchainError::StripUnavailable {
                        toolchain: toolchain.id().as_str(),
                    }
                })?;
                commands.push(stripper.command(output));
            }
            Ok(commands)
        }
        NodeKind::Entry { commands, .. } => Ok(commands.clone()),
        NodeKind::ObjectLibrary { .. }
        | NodeKind::DynamicExtension { .. }
        | NodeKind::StaticExtension { .. }
        | NodeKind::Variable { .. } => Ok(Vec::new()),
    }
}

fn resolved_output(graph: &Graph, id: NodeId) -> Result<&camino::Utf8Path, SynthesisError> {
    graph
        .node(id)
        .output
        .as_deref()
        .ok_or_else(|| SynthesisError::Unprepared {
            node: graph.node(id).name().to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ExtensionLink, Settings};
    use crate::platform::{Os, Platform};
    use crate::toolchain::{CompilerKind, LinkerKind, select};

    fn gcc_ld() -> Toolchain {
        select(CompilerKind::Gcc, LinkerKind::Ld).expect("pairing")
    }

    #[test]
    fn application_link_flattens_object_library_members() {
        let mut graph = Graph::default();
        let a = graph.add_object_file("a.c", Settings::default());
        let b = graph.add_object_file("b.c", Settings::default());
        let bundle = graph.add_object_library("core", Settings::default());
        let app = graph.add_application("demo", false, Settings::default());
        let ext = graph.add_dynamic_extension(ExtensionLink::Named("m".into()));
        graph.add_dep(bundle, a);
        graph.add_dep(bundle, b);
        graph.add_dep(app, bundle);
        graph.add_dep(app, ext);
        graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");

        let commands = node_commands(&graph, app, &gcc_ld()).expect("synthesis");
        assert_eq!(commands.len(), 1);
        let link = commands.first().expect("link command");
        assert!(link.contains("a.o"), "link line: {link}");
        assert!(link.contains("b.o"), "link line: {link}");
        assert!(link.contains("-lm"), "link line: {link}");
    }

    #[test]
    fn stripping_without_a_strip_tool_is_rejected() {
        let mut graph = Graph::default();
        let object = graph.add_object_file("a.c", Settings::default());
        let app = graph.add_application("demo", true, Settings::default());
        graph.add_dep(app, object);
        graph
            .prepare(Platform::for_os(Os::Windows))
            .expect("acyclic");

        let toolchain = select(CompilerKind::Cl, LinkerKind::Link).expect("pairing");
        assert_eq!(
            node_commands(&graph, app, &toolchain),
            Err(SynthesisError::Toolchain(
                ToolchainError::StripUnavailable { toolchain: "msc" }
            ))
        );
    }

    #[test]
    fn grouping_nodes_build_nothing() {
        let mut graph = Graph::default();
        let bundle = graph.add_object_library("core", Settings::default());
        graph.add_variable("CC", Some("gcc".into()), None);
        graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");
        assert_eq!(node_commands(&graph, bundle, &gcc_ld()), Ok(Vec::new()));
    }
}
