//! Makefile and NMake file generation.
//!
//! Converts a prepared [`Graph`] into the textual representation expected
//! by POSIX `make` or Microsoft `nmake`. Variable nodes become a
//! definition block and their `$(VAR)` references are left unresolved for
//! the external tool to substitute at its own run time. Rules are emitted
//! dependencies-first in a single deduplicated pass, so a node shared by
//! several dependents appears exactly once.

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use crate::graph::{
    ExtensionLink, Graph, NodeId, NodeKind, SynthesisError, Visited, node_commands,
};
use crate::toolchain::Toolchain;

/// The make dialect to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MakeFlavor {
    /// POSIX make: `.PHONY` markers for word targets.
    Posix,
    /// NMake: no `.PHONY`; a word target is phony by not existing.
    NMake,
}

/// Generate a make file as a string.
///
/// # Errors
///
/// Returns [`SynthesisError`] when a node's commands cannot be
/// synthesised for the active toolchain.
pub fn generate(
    graph: &Graph,
    toolchain: &Toolchain,
    flavor: MakeFlavor,
) -> Result<String, SynthesisError> {
    let mut out = String::new();

    let vars = graph.variables();
    for (name, value) in &vars {
        out.push_str(name);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
    if !vars.is_empty() {
        out.push('\n');
    }

    let mut visited = Visited::new(graph);
    let mut rules = Vec::new();
    for root in graph.roots() {
        collect_rules(graph, root, toolchain, &mut visited, &mut rules)?;
    }
    for rule in &rules {
        out.push_str(&DisplayRule { rule, flavor }.to_string());
    }
    Ok(out)
}

struct Rule {
    target: String,
    deps: Vec<String>,
    commands: Vec<String>,
    phony: bool,
}

/// Wrapper struct to display one rule under a make dialect.
struct DisplayRule<'a> {
    rule: &'a Rule,
    flavor: MakeFlavor,
}

impl Display for DisplayRule<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.rule.phony && self.flavor == MakeFlavor::Posix {
            writeln!(f, ".PHONY: {}", self.rule.target)?;
        }
        if self.rule.deps.is_empty() {
            writeln!(f, "{}:", self.rule.target)?;
        } else {
            writeln!(f, "{}: {}", self.rule.target, self.rule.deps.iter().join(" "))?;
        }
        for command in &self.rule.commands {
            writeln!(f, "\t{command}")?;
        }
        writeln!(f)
    }
}

fn collect_rules(
    graph: &Graph,
    id: NodeId,
    toolchain: &Toolchain,
    visited: &mut Visited,
    rules: &mut Vec<Rule>,
) -> Result<(), SynthesisError> {
    if !visited.insert(id) {
        return Ok(());
    }
    for dep in graph.node(id).deps.clone() {
        collect_rules(graph, dep, toolchain, visited, rules)?;
    }

    let node = graph.node(id);
    match &node.kind {
        NodeKind::ObjectFile { source, .. } => {
            rules.push(Rule {
                target: target_of(graph, id)?,
                deps: vec![source.as_str().to_owned()],
                commands: node_commands(graph, id, toolchain)?,
                phony: false,
            });
        }
        NodeKind::StaticLibrary { .. }
        | NodeKind::DynamicLibrary { .. }
        | NodeKind::Application { .. } => {
            rules.push(Rule {
                target: target_of(graph, id)?,
                deps: dep_list(graph, id),
                commands: node_commands(graph, id, toolchain)?,
                phony: false,
            });
        }
        NodeKind::Entry { name, .. } => {
            let (target, phony) = node.output.as_ref().map_or_else(
                || (name.clone(), true),
                |output| (output.as_str().to_owned(), false),
            );
            rules.push(Rule {
                target,
                deps: dep_list(graph, id),
                commands: node_commands(graph, id, toolchain)?,
                phony,
            });
        }
        // Grouping constructs and references get no rule of their own:
        // object-library members surface directly in their consumers,
        // extensions and variables surface in dependency lists.
        NodeKind::ObjectLibrary { .. }
        | NodeKind::DynamicExtension { .. }
        | NodeKind::StaticExtension { .. }
        | NodeKind::Variable { .. } => {}
    }
    Ok(())
}

fn target_of(graph: &Graph, id: NodeId) -> Result<String, SynthesisError> {
    graph
        .node(id)
        .output
        .as_deref()
        .map(|path| path.as_str().to_owned())
        .ok_or_else(|| SynthesisError::Unprepared {
            node: graph.node(id).name().to_owned(),
        })
}

/// Prerequisites for one rule: dependency outputs, with object libraries
/// flattened to their members and variables kept as `$(NAME)` references
/// for make itself to resolve.
fn dep_list(graph: &Graph, id: NodeId) -> Vec<String> {
    let mut deps = Vec::new();
    for dep in &graph.node(id).deps {
        let node = graph.node(*dep);
        match &node.kind {
            NodeKind::ObjectLibrary { .. } => {
                for member in graph.object_members(*dep) {
                    if let Some(output) = graph.node(member).output.as_deref() {
                        deps.push(output.as_str().to_owned());
                    }
                }
            }
            NodeKind::Variable { name, .. } => deps.push(format!("$({name})")),
            NodeKind::DynamicExtension { link } => match link {
                ExtensionLink::Named(name) => deps.push(name.clone()),
                // A scoped literal is a link argument, not a file; it has
                // no place in a prerequisite list.
                ExtensionLink::Literal(_) => {}
            },
            _ => {
                if let Some(output) = node.output.as_deref() {
                    deps.push(output.as_str().to_owned());
                }
            }
        }
    }
    deps
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
    fn generate_object_and_application_rules() {
        let mut graph = Graph::default();
        let object = graph.add_object_file("main.c", Settings::default());
        let app = graph.add_application("demo", false, Settings::default());
        graph.add_dep(app, object);
        graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");

        let makefile = generate(&graph, &gcc_ld(), MakeFlavor::Posix).expect("generate");
        let expected = concat!(
            "main.o: main.c\n",
            "\tgcc -c -O0 -o main.o main.c\n",
            "\n",
            "demo: main.o\n",
            "\tgcc -o demo main.o\n",
            "\n",
        );
        assert_eq!(makefile, expected);
    }

    #[test]
    fn variables_head_the_file_and_stay_deferred() {
        let mut graph = Graph::default();
        graph.add_variable("PREFIX", Some("/usr/local".into()), None);
        graph.add_entry("install", vec!["cp demo $(PREFIX)/bin/demo".into()], None);
        graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");

        let makefile = generate(&graph, &gcc_ld(), MakeFlavor::Posix).expect("generate");
        let expected = concat!(
            "PREFIX = /usr/local\n",
            "\n",
            ".PHONY: install\n",
            "install:\n",
            "\tcp demo $(PREFIX)/bin/demo\n",
            "\n",
        );
        assert_eq!(makefile, expected);
    }

    #[test]
    fn nmake_flavor_omits_phony_markers() {
        let mut graph = Graph::default();
        graph.add_entry("clean", vec!["del /q demo.exe".into()], None);
        graph
            .prepare(Platform::for_os(Os::Windows))
            .expect("acyclic");

        let makefile = generate(&graph, &gcc_ld(), MakeFlavor::NMake).expect("generate");
        assert!(!makefile.contains(".PHONY"));
        assert!(makefile.starts_with("clean:\n"));
    }

    #[test]
    fn diamond_dependency_emits_shared_node_once() {
        let mut graph = Graph::default();
        let shared = graph.add_object_file("shared.c", Settings::default());
        let left = graph.add_object_library("left", Settings::default());
        let right = graph.add_object_library("right", Settings::default());
        let app = graph.add_application("demo", false, Settings::default());
        graph.add_dep(left, shared);
        graph.add_dep(right, shared);
        graph.add_dep(app, left);
        graph.add_dep(app, right);
        graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");

        let makefile = generate(&graph, &gcc_ld(), MakeFlavor::Posix).expect("generate");
        assert_eq!(makefile.matches("shared.o: shared.c").count(), 1);
    }

    #[test]
    fn application_rule_lists_flattened_members_and_extensions() {
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

        let makefile = generate(&graph, &gcc_ld(), MakeFlavor::Posix).expect("generate");
        assert!(makefile.contains("a.o: a.c"), "makefile:\n{makefile}");
        assert!(makefile.contains("b.o: b.c"), "makefile:\n{makefile}");
        assert!(
            makefile.contains("demo: a.o b.o m\n"),
            "makefile:\n{makefile}"
        );
    }
}
