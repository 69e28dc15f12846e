//! The direct-execution backend.
//!
//! Visits the graph dependencies-first and runs each node's reified
//! commands through the host shell, synchronously, stopping at the first
//! nonzero exit. A file target whose output already exists is skipped;
//! this is deliberately only an existence check, not a timestamp
//! comparison. Finer staleness tracking is what the generated
//! Makefile/solution backends delegate to their external tools.

use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use tracing::debug;

use crate::graph::{Graph, NodeId, Visited, node_commands, reify};
use crate::toolchain::Toolchain;

use super::process;

/// One command scheduled by the planner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedCommand {
    /// Display name of the node the command builds.
    pub node: String,
    /// Fully reified command text.
    pub command: String,
}

/// Plan the commands a build would run, in execution order.
///
/// Skipped nodes (existing file targets) contribute nothing, exactly as
/// in a real run.
///
/// # Errors
///
/// Returns an error for unknown target names, unsupported toolchain
/// options, or unresolved variables.
pub fn command_plan(
    graph: &Graph,
    toolchain: &Toolchain,
    targets: &[String],
) -> Result<Vec<PlannedCommand>> {
    let starts = start_nodes(graph, targets)?;
    let vars = graph.variables();
    let mut visited = Visited::new(graph);
    let mut plan = Vec::new();
    for start in starts {
        plan_node(graph, start, toolchain, &vars, &mut visited, &mut plan)?;
    }
    Ok(plan)
}

/// Run the build directly, or print the plan when `dry_run` is set.
///
/// # Errors
///
/// Returns an error when planning fails or a spawned command exits
/// nonzero; nothing after a failed command runs.
pub fn execute(
    graph: &Graph,
    toolchain: &Toolchain,
    targets: &[String],
    dry_run: bool,
) -> Result<()> {
    let plan = command_plan(graph, toolchain, targets)?;
    if dry_run {
        let mut listing = String::new();
        for planned in &plan {
            listing.push_str(&planned.command);
            listing.push('\n');
        }
        process::write_stdout(&listing).context("writing dry-run plan")?;
        return Ok(());
    }
    for planned in &plan {
        process::run_command(&planned.command)
            .with_context(|| format!("building {}", planned.node))?;
    }
    Ok(())
}

fn start_nodes(graph: &Graph, targets: &[String]) -> Result<Vec<NodeId>> {
    if targets.is_empty() {
        return Ok(graph.roots());
    }
    targets
        .iter()
        .map(|name| {
            graph
                .find(name)
                .ok_or_else(|| anyhow!("unknown target: {name}"))
        })
        .collect()
}

fn plan_node(
    graph: &Graph,
    id: NodeId,
    toolchain: &Toolchain,
    vars: &IndexMap<String, String>,
    visited: &mut Visited,
    plan: &mut Vec<PlannedCommand>,
) -> Result<()> {
    if !visited.insert(id) {
        return Ok(());
    }
    for dep in graph.node(id).deps.clone() {
        plan_node(graph, dep, toolchain, vars, visited, plan)?;
    }

    let node = graph.node(id);
    if node.is_file_target()
        && let Some(output) = node.output.as_deref()
        && output.as_std_path().exists()
    {
        // Existence only; no dependency timestamps are consulted.
        debug!("skipping {}: output {output} exists", node.name());
        return Ok(());
    }

    for command in node_commands(graph, id, toolchain)? {
        let reified = reify(&command, vars)
            .with_context(|| format!("reifying command for {}", node.name()))?;
        plan.push(PlannedCommand {
            node: node.name().to_owned(),
            command: reified,
        });
    }
    Ok(())
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
    fn plan_compiles_then_links() {
        let mut graph = Graph::default();
        let a = graph.add_object_file("/nonexistent/a.c", Settings::default());
        let b = graph.add_object_file("/nonexistent/b.c", Settings::default());
        let bundle = graph.add_object_library("core", Settings::default());
        let app = graph.add_application("/nonexistent/demo", false, Settings::default());
        let ext = graph.add_dynamic_extension(ExtensionLink::Named("m".into()));
        graph.add_dep(bundle, a);
        graph.add_dep(bundle, b);
        graph.add_dep(app, bundle);
        graph.add_dep(app, ext);
        graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");

        let plan = command_plan(&graph, &gcc_ld(), &[]).expect("plan");
        assert_eq!(plan.len(), 3);
        assert!(plan.first().is_some_and(|p| p.command.contains(" -c ")));
        assert!(plan.get(1).is_some_and(|p| p.command.contains(" -c ")));
        let link = plan.get(2).expect("link step");
        assert!(link.command.contains("/nonexistent/a.o"), "link: {}", link.command);
        assert!(link.command.contains("/nonexistent/b.o"), "link: {}", link.command);
        assert!(link.command.contains("-lm"), "link: {}", link.command);
    }

    #[test]
    fn plan_reifies_entry_commands() {
        let mut graph = Graph::default();
        graph.add_variable("OUT", Some("dist".into()), None);
        graph.add_entry("stage", vec!["cp demo $(OUT)/demo".into()], None);
        graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");

        let plan = command_plan(&graph, &gcc_ld(), &[]).expect("plan");
        assert_eq!(
            plan,
            vec![PlannedCommand {
                node: "stage".into(),
                command: "cp demo dist/demo".into(),
            }]
        );
    }

    #[test]
    fn unknown_target_is_an_error() {
        let graph = Graph::default();
        let err = command_plan(&graph, &gcc_ld(), &["nowhere".into()]).expect_err("unknown");
        assert!(err.to_string().contains("unknown target"));
    }

    #[test]
    fn named_targets_restrict_the_plan() {
        let mut graph = Graph::default();
        graph.add_entry("first", vec!["echo first".into()], None);
        graph.add_entry("second", vec!["echo second".into()], None);
        graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");

        let plan = command_plan(&graph, &gcc_ld(), &["second".into()]).expect("plan");
        assert_eq!(plan.len(), 1);
        assert!(plan.first().is_some_and(|p| p.command == "echo second"));
    }
}
