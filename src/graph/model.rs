//! Node and graph structures.

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::flags::Flag;

use super::settings::Settings;

/// Identity of one node in a [`Graph`] arena.
///
/// Node identity, not path, is the unit of "already processed": a node
/// reachable through several dependents is still visited once per pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the owning arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// How a dynamic-extension reference names the library it stands for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ExtensionLink {
    /// A bare library name, rendered as `-lNAME` or `NAME.lib`.
    Named(String),
    /// A literal link argument, possibly scoped to one toolchain and
    /// dropped under the others.
    Literal(Flag),
}

/// The tagged union of node classes.
///
/// Every consumer matches this exhaustively; adding a class fails to
/// compile until each backend handles it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    /// One compiled translation unit. Leaf.
    ObjectFile {
        /// Source file path.
        source: Utf8PathBuf,
        /// Stop after preprocessing.
        preprocess_only: bool,
    },
    /// A named bundle of object files, not independently linkable.
    ObjectLibrary {
        /// Bundle name.
        name: String,
    },
    /// A linkable archive.
    StaticLibrary {
        /// Library name.
        name: String,
    },
    /// A linkable shared object.
    DynamicLibrary {
        /// Library name.
        name: String,
    },
    /// A final executable.
    Application {
        /// Application name.
        name: String,
        /// Strip the linked binary.
        strip: bool,
    },
    /// A pre-built external library, loaded at run time.
    DynamicExtension {
        /// How the library is named on the link line.
        link: ExtensionLink,
    },
    /// A pre-built external archive, linked in statically.
    StaticExtension {
        /// Archive file path.
        path: Utf8PathBuf,
    },
    /// A named build-time substitution value.
    Variable {
        /// Variable name.
        name: String,
        /// Assigned value.
        value: Option<String>,
        /// Fallback when no value is assigned.
        default: Option<String>,
    },
    /// A target with an explicit command list; phony when it has no
    /// output file.
    Entry {
        /// Target word.
        name: String,
        /// Commands run when the target is built, `$(VAR)` placeholders
        /// intact.
        commands: Vec<String>,
    },
}

impl NodeKind {
    /// The class name used in diagnostics.
    #[must_use]
    pub const fn class_name(&self) -> &'static str {
        match self {
            Self::ObjectFile { .. } => "object-file",
            Self::ObjectLibrary { .. } => "object-library",
            Self::StaticLibrary { .. } => "static-library",
            Self::DynamicLibrary { .. } => "dynamic-library",
            Self::Application { .. } => "application",
            Self::DynamicExtension { .. } => "dynamic-extension",
            Self::StaticExtension { .. } => "static-extension",
            Self::Variable { .. } => "variable",
            Self::Entry { .. } => "entry",
        }
    }
}

/// One vertex of the dependency graph.
#[derive(Clone, Debug, Serialize)]
pub struct Node {
    /// Class and class-specific payload.
    pub kind: NodeKind,
    /// Build settings, composed with ancestors at synthesis time.
    pub settings: Settings,
    /// Output file path, resolved by [`Graph::prepare`] unless declared.
    pub output: Option<Utf8PathBuf>,
    /// Output path minus the platform suffix, for import-library naming.
    pub basename: Option<Utf8PathBuf>,
    /// Direct dependencies.
    pub deps: Vec<NodeId>,
    /// The node settings are inherited from, fixed at the first
    /// `add_dep` naming this node as a child.
    pub parent: Option<NodeId>,
}

impl Node {
    /// Display name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::ObjectFile { source, .. } => source.as_str(),
            NodeKind::ObjectLibrary { name }
            | NodeKind::StaticLibrary { name }
            | NodeKind::DynamicLibrary { name }
            | NodeKind::Application { name, .. }
            | NodeKind::Variable { name, .. }
            | NodeKind::Entry { name, .. } => name,
            NodeKind::DynamicExtension { link } => match link {
                ExtensionLink::Named(name) => name,
                ExtensionLink::Literal(flag) => match flag {
                    Flag::Universal(value) | Flag::Scoped { value, .. } => value,
                },
            },
            NodeKind::StaticExtension { path } => path.as_str(),
        }
    }

    /// Whether the node stands for a file the build produces.
    ///
    /// Variables and extension references never do; entries do only when
    /// given an explicit output path.
    #[must_use]
    pub const fn is_file_target(&self) -> bool {
        match self.kind {
            NodeKind::ObjectFile { .. }
            | NodeKind::ObjectLibrary { .. }
            | NodeKind::StaticLibrary { .. }
            | NodeKind::DynamicLibrary { .. }
            | NodeKind::Application { .. } => true,
            NodeKind::Entry { .. } => self.output.is_some(),
            NodeKind::DynamicExtension { .. }
            | NodeKind::StaticExtension { .. }
            | NodeKind::Variable { .. } => false,
        }
    }
}

/// Errors raised during graph construction and preparation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// The `depends` relation loops.
    #[error("circular dependency: {}", cycle.join(" -> "))]
    CircularDependency {
        /// Node names along the loop, first repeated at the end.
        cycle: Vec<String>,
    },
    /// Two nodes claim the same referable name.
    #[error("duplicate node name: {name}")]
    DuplicateName {
        /// The contested name.
        name: String,
    },
    /// A `depends` entry names no known node.
    #[error("target {target} depends on unknown node {dependency}")]
    UnknownDependency {
        /// The dependent target.
        target: String,
        /// The missing name.
        dependency: String,
    },
}

/// The dependency graph: an arena of [`Node`]s.
#[derive(Debug, Default, Serialize)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    fn push(&mut self, kind: NodeKind, settings: Settings) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            settings,
            output: None,
            basename: None,
            deps: Vec::new(),
            parent: None,
        });
        id
    }

    /// Add an object-file node for `source`.
    pub fn add_object_file(&mut self, source: impl Into<Utf8PathBuf>, settings: Settings) -> NodeId {
        self.push(
            NodeKind::ObjectFile {
                source: source.into(),
                preprocess_only: false,
            },
            settings,
        )
    }

    /// Add an object-file node that stops after preprocessing.
    pub fn add_preprocessed_file(
        &mut self,
        source: impl Into<Utf8PathBuf>,
        settings: Settings,
    ) -> NodeId {
        self.push(
            NodeKind::ObjectFile {
                source: source.into(),
                preprocess_only: true,
            },
            settings,
        )
    }

    /// Add an object-library node.
    pub fn add_object_library(&mut self, name: impl Into<String>, settings: Settings) -> NodeId {
        self.push(NodeKind::ObjectLibrary { name: name.into() }, settings)
    }

    /// Add a static-library node.
    pub fn add_static_library(&mut self, name: impl Into<String>, settings: Settings) -> NodeId {
        self.push(NodeKind::StaticLibrary { name: name.into() }, settings)
    }

    /// Add a dynamic-library node.
    pub fn add_dynamic_library(&mut self, name: impl Into<String>, settings: Settings) -> NodeId {
        self.push(NodeKind::DynamicLibrary { name: name.into() }, settings)
    }

    /// Add an application node.
    pub fn add_application(
        &mut self,
        name: impl Into<String>,
        strip: bool,
        settings: Settings,
    ) -> NodeId {
        self.push(
            NodeKind::Application {
                name: name.into(),
                strip,
            },
            settings,
        )
    }

    /// Add a dynamic-extension reference.
    pub fn add_dynamic_extension(&mut self, link: ExtensionLink) -> NodeId {
        self.push(NodeKind::DynamicExtension { link }, Settings::default())
    }

    /// Add a static-extension reference.
    pub fn add_static_extension(&mut self, path: impl Into<Utf8PathBuf>) -> NodeId {
        self.push(
            NodeKind::StaticExtension { path: path.into() },
            Settings::default(),
        )
    }

    /// Add a variable node.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        value: Option<String>,
        default: Option<String>,
    ) -> NodeId {
        self.push(
            NodeKind::Variable {
                name: name.into(),
                value,
                default,
            },
            Settings::default(),
        )
    }

    /// Add an entry node. An `output` path makes it a file target;
    /// without one it is a phony word target.
    pub fn add_entry(
        &mut self,
        name: impl Into<String>,
        commands: Vec<String>,
        output: Option<Utf8PathBuf>,
    ) -> NodeId {
        let id = self.push(
            NodeKind::Entry {
                name: name.into(),
                commands,
            },
            Settings::default(),
        );
        self.node_mut(id).output = output;
        id
    }

    /// Attach a `depends` edge from `parent` to `child`.
    ///
    /// The first edge naming `child` also fixes its settings parent;
    /// further edges only add reachability.
    pub fn add_dep(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(parent).deps.push(child);
        let child_node = self.node_mut(child);
        if child_node.parent.is_none() {
            child_node.parent = Some(parent);
        }
    }

    /// Borrow a node.
    ///
    /// # Panics
    ///
    /// Panics when `id` belongs to another graph.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes
            .get(id.index())
            .unwrap_or_else(|| panic!("node id {} is foreign to this graph", id.index()))
    }

    /// Mutably borrow a node.
    ///
    /// # Panics
    ///
    /// Panics when `id` belongs to another graph.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes
            .get_mut(id.index())
            .unwrap_or_else(|| panic!("node id {} is foreign to this graph", id.index()))
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate node identities in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Find a node by its referable name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.ids().find(|id| self.node(*id).name() == name)
    }

    /// The flattened variable map consumed by reification, in declaration
    /// order. A variable without value or default contributes an empty
    /// string.
    #[must_use]
    pub fn variables(&self) -> IndexMap<String, String> {
        let mut vars = IndexMap::new();
        for node in &self.nodes {
            if let NodeKind::Variable {
                name,
                value,
                default,
            } = &node.kind
            {
                let resolved = value
                    .clone()
                    .or_else(|| default.clone())
                    .unwrap_or_default();
                vars.insert(name.clone(), resolved);
            }
        }
        vars
    }

    /// Buildable nodes no other node depends on, in insertion order.
    /// These are the starting points of a backend pass.
    #[must_use]
    pub fn roots(&self) -> Vec<NodeId> {
        let mut depended = vec![false; self.nodes.len()];
        for node in &self.nodes {
            for dep in &node.deps {
                if let Some(slot) = depended.get_mut(dep.index()) {
                    *slot = true;
                }
            }
        }
        self.ids()
            .filter(|id| {
                let node = self.node(*id);
                let buildable = !matches!(
                    node.kind,
                    NodeKind::Variable { .. }
                        | NodeKind::DynamicExtension { .. }
                        | NodeKind::StaticExtension { .. }
                );
                buildable && !depended.get(id.index()).copied().unwrap_or(false)
            })
            .collect()
    }

    /// Flatten a node's dependencies to the object files a linker or
    /// archiver actually consumes: object-file deps directly, and the
    /// members of nested object libraries recursively.
    #[must_use]
    pub fn object_members(&self, id: NodeId) -> Vec<NodeId> {
        let mut members = Vec::new();
        self.collect_object_members(id, &mut members);
        members
    }

    fn collect_object_members(&self, id: NodeId, members: &mut Vec<NodeId>) {
        for dep in &self.node(id).deps {
            match &self.node(*dep).kind {
                NodeKind::ObjectFile { .. } => members.push(*dep),
                NodeKind::ObjectLibrary { .. } => self.collect_object_members(*dep, members),
                _ => {}
            }
        }
    }
}
