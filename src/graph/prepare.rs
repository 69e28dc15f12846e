//! Graph preparation: cycle detection and output-name resolution.
//!
//! `prepare` must run after construction and before any backend pass. It
//! verifies the DAG invariant, then resolves every node's `output` and
//! `basename` depth-first, dependencies before dependents. Both steps are
//! idempotent; visitation state lives in a pass-scoped [`Visited`] set
//! rather than on the nodes, so re-running a pass on the same graph is
//! always safe.

use std::collections::HashMap;

use camino::Utf8PathBuf;

use crate::platform::Platform;

use super::model::{Graph, GraphError, NodeId, NodeKind};

/// Tracks the visitation state of a node during cycle detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VisitState {
    Visiting,
    Visited,
}

/// A pass-scoped visited set keyed by node identity.
///
/// Each backend pass owns one of these; nothing is stored on the nodes,
/// which is what makes shared subgraphs (diamonds) emit exactly once and
/// repeated passes independent of each other.
#[derive(Debug)]
pub struct Visited(Vec<bool>);

impl Visited {
    /// A fresh set sized for `graph`.
    #[must_use]
    pub fn new(graph: &Graph) -> Self {
        Self(vec![false; graph.len()])
    }

    /// Mark `id` visited, returning `true` when it was not yet marked.
    pub fn insert(&mut self, id: NodeId) -> bool {
        self.0
            .get_mut(id.index())
            .map(|slot| !std::mem::replace(slot, true))
            .unwrap_or(false)
    }

    /// Whether `id` was already visited this pass.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.0.get(id.index()).copied().unwrap_or(false)
    }
}

impl Graph {
    /// Resolve output names for every node, dependencies first.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::CircularDependency`] when the `depends`
    /// relation loops.
    pub fn prepare(&mut self, platform: &Platform) -> Result<(), GraphError> {
        self.detect_cycles()?;
        let mut visited = Visited::new(self);
        for id in self.ids().collect::<Vec<_>>() {
            self.resolve_output(id, platform, &mut visited);
        }
        Ok(())
    }

    fn resolve_output(&mut self, id: NodeId, platform: &Platform, visited: &mut Visited) {
        if !visited.insert(id) {
            return;
        }
        for dep in self.node(id).deps.clone() {
            self.resolve_output(dep, platform, visited);
        }

        enum Plan {
            Suffixed(Utf8PathBuf, &'static str),
            Fixed(Option<Utf8PathBuf>),
            Keep,
        }

        let node = self.node(id);
        let declared = node.output.as_ref();
        let plan = match &node.kind {
            NodeKind::ObjectFile { source, .. } => Plan::Suffixed(
                declared.cloned().unwrap_or_else(|| source.with_extension("")),
                platform.obj_suffix,
            ),
            NodeKind::ObjectLibrary { name } => {
                Plan::Suffixed(declared_or(declared, name), platform.obj_suffix)
            }
            NodeKind::StaticLibrary { name } => {
                Plan::Suffixed(declared_or(declared, name), platform.archive_suffix)
            }
            NodeKind::DynamicLibrary { name } => {
                Plan::Suffixed(declared_or(declared, name), platform.dll_suffix)
            }
            NodeKind::Application { name, .. } => {
                Plan::Suffixed(declared_or(declared, name), platform.exe_suffix)
            }
            NodeKind::DynamicExtension { link } => Plan::Fixed(match link {
                super::model::ExtensionLink::Named(name) => Some(Utf8PathBuf::from(name)),
                super::model::ExtensionLink::Literal(_) => None,
            }),
            NodeKind::StaticExtension { path } => Plan::Fixed(Some(path.clone())),
            // Entries keep whatever output they were constructed with;
            // variables have none.
            NodeKind::Variable { .. } | NodeKind::Entry { .. } => Plan::Keep,
        };

        match plan {
            Plan::Suffixed(stem, suffix) => {
                let output = Platform::ensure_suffix(&stem, suffix);
                let basename = Platform::strip_suffix(&output, suffix);
                let node_mut = self.node_mut(id);
                node_mut.output = Some(output);
                node_mut.basename = Some(basename);
            }
            Plan::Fixed(output) => {
                self.node_mut(id).output = output;
            }
            Plan::Keep => {}
        }
    }

    fn detect_cycles(&self) -> Result<(), GraphError> {
        let mut detector = CycleDetector::new(self);
        for id in self.ids() {
            if detector.is_visited(id) {
                continue;
            }
            if let Some(cycle) = detector.visit(id) {
                return Err(GraphError::CircularDependency { cycle });
            }
        }
        Ok(())
    }
}

fn declared_or(declared: Option<&Utf8PathBuf>, name: &str) -> Utf8PathBuf {
    declared.cloned().unwrap_or_else(|| Utf8PathBuf::from(name))
}

struct CycleDetector<'a> {
    graph: &'a Graph,
    stack: Vec<NodeId>,
    states: HashMap<NodeId, VisitState>,
}

impl<'a> CycleDetector<'a> {
    fn new(graph: &'a Graph) -> Self {
        Self {
            graph,
            stack: Vec::new(),
            states: HashMap::new(),
        }
    }

    fn is_visited(&self, id: NodeId) -> bool {
        matches!(self.states.get(&id), Some(VisitState::Visited))
    }

    fn visit(&mut self, id: NodeId) -> Option<Vec<String>> {
        match self.states.get(&id) {
            Some(VisitState::Visited) => return None,
            Some(VisitState::Visiting) => {
                let start = self.stack.iter().position(|n| *n == id).unwrap_or(0);
                let mut cycle: Vec<String> = self
                    .stack
                    .iter()
                    .skip(start)
                    .map(|n| self.graph.node(*n).name().to_owned())
                    .collect();
                cycle.push(self.graph.node(id).name().to_owned());
                return Some(cycle);
            }
            None => {
                self.states.insert(id, VisitState::Visiting);
            }
        }

        self.stack.push(id);
        for dep in &self.graph.node(id).deps {
            if let Some(cycle) = self.visit(*dep) {
                return Some(cycle);
            }
        }
        self.stack.pop();
        self.states.insert(id, VisitState::Visited);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Settings;
    use crate::platform::Os;
    use rstest::rstest;

    fn linux() -> &'static Platform {
        Platform::for_os(Os::Linux)
    }

    #[rstest]
    #[case(Os::Linux, "demo", "core.o", "src/main.o")]
    #[case(Os::Windows, "demo.exe", "core.obj", "src/main.obj")]
    fn outputs_follow_the_platform(
        #[case] os: Os,
        #[case] app_out: &str,
        #[case] lib_out: &str,
        #[case] obj_out: &str,
    ) {
        let mut graph = Graph::default();
        let object = graph.add_object_file("src/main.c", Settings::default());
        let lib = graph.add_object_library("core", Settings::default());
        let app = graph.add_application("demo", false, Settings::default());
        graph.add_dep(lib, object);
        graph.add_dep(app, lib);
        graph.prepare(Platform::for_os(os)).expect("acyclic");

        assert_eq!(graph.node(app).output.as_deref().map(|p| p.as_str()), Some(app_out));
        assert_eq!(graph.node(lib).output.as_deref().map(|p| p.as_str()), Some(lib_out));
        assert_eq!(graph.node(object).output.as_deref().map(|p| p.as_str()), Some(obj_out));
        assert_eq!(
            graph.node(app).basename.as_deref().map(|p| p.as_str()),
            Some("demo")
        );
    }

    #[test]
    fn prepare_is_idempotent() {
        let mut graph = Graph::default();
        let object = graph.add_object_file("a.c", Settings::default());
        let app = graph.add_application("demo", false, Settings::default());
        graph.add_dep(app, object);

        graph.prepare(linux()).expect("first pass");
        let first: Vec<_> = graph
            .ids()
            .map(|id| graph.node(id).output.clone())
            .collect();
        graph.prepare(linux()).expect("second pass");
        let second: Vec<_> = graph
            .ids()
            .map(|id| graph.node(id).output.clone())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn declared_output_keeps_its_suffix() {
        let mut graph = Graph::default();
        let app = graph.add_application("demo", false, Settings::default());
        graph.node_mut(app).output = Some("bin/demo.exe".into());
        graph.prepare(Platform::for_os(Os::Windows)).expect("acyclic");
        assert_eq!(
            graph.node(app).output.as_deref().map(|p| p.as_str()),
            Some("bin/demo.exe")
        );
        assert_eq!(
            graph.node(app).basename.as_deref().map(|p| p.as_str()),
            Some("bin/demo")
        );
    }

    #[test]
    fn named_extension_output_is_the_bare_name() {
        let mut graph = Graph::default();
        let ext = graph.add_dynamic_extension(crate::graph::ExtensionLink::Named("m".into()));
        graph.prepare(linux()).expect("acyclic");
        assert_eq!(graph.node(ext).output.as_deref().map(|p| p.as_str()), Some("m"));
    }

    #[test]
    fn self_cycle_is_reported() {
        let mut graph = Graph::default();
        let app = graph.add_application("demo", false, Settings::default());
        graph.add_dep(app, app);
        assert_eq!(
            graph.prepare(linux()),
            Err(GraphError::CircularDependency {
                cycle: vec!["demo".into(), "demo".into()]
            })
        );
    }

    #[test]
    fn two_node_cycle_is_reported() {
        let mut graph = Graph::default();
        let a = graph.add_entry("a", Vec::new(), None);
        let b = graph.add_entry("b", Vec::new(), None);
        graph.add_dep(a, b);
        graph.add_dep(b, a);
        let err = graph.prepare(linux()).expect_err("cycle");
        match err {
            GraphError::CircularDependency { cycle } => {
                assert_eq!(cycle.len(), 3);
                assert_eq!(cycle.first(), cycle.last());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut graph = Graph::default();
        let shared = graph.add_object_file("shared.c", Settings::default());
        let left = graph.add_object_library("left", Settings::default());
        let right = graph.add_object_library("right", Settings::default());
        let app = graph.add_application("demo", false, Settings::default());
        graph.add_dep(left, shared);
        graph.add_dep(right, shared);
        graph.add_dep(app, left);
        graph.add_dep(app, right);
        assert!(graph.prepare(linux()).is_ok());
    }
}
