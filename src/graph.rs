//! The typed dependency graph.
//!
//! This module defines the backend-agnostic project model: an arena of
//! tagged nodes (object files, libraries, applications, extension
//! references, variables, phony entries) linked by a `depends` relation.
//! The graph is built by an external front end through the `add_*`
//! constructors, then [`Graph::prepare`] resolves output names and checks
//! the DAG invariant, after which any backend may walk it.
//!
//! # Examples
//!
//! ```
//! use tsugite::graph::{Graph, Settings};
//! use tsugite::platform::{Os, Platform};
//!
//! let mut graph = Graph::default();
//! let object = graph.add_object_file("hello.c", Settings::default());
//! let app = graph.add_application("hello", false, Settings::default());
//! graph.add_dep(app, object);
//! graph.prepare(Platform::for_os(Os::Linux)).expect("acyclic");
//! assert_eq!(graph.node(app).output.as_deref().map(|p| p.as_str()), Some("hello"));
//! ```

mod commands;
mod from_blueprint;
mod model;
mod prepare;
mod reify;
mod settings;

pub use commands::{SynthesisError, node_commands};
pub use model::{ExtensionLink, Graph, GraphError, Node, NodeId, NodeKind};
pub use prepare::Visited;
pub use reify::{ReifyError, reify};
pub use settings::{Effective, Settings, effective};
