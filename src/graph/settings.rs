//! Build-setting composition.
//!
//! `includes`, `definitions` and the flag lists compose by concatenation
//! down the parent chain (a child sees the parent's entries before its
//! own, without deduplication); `optimization` and `debug` are overrides
//! where the nearest explicit value wins.

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::flags::Flag;
use crate::toolchain::{DebugInfo, Optimization};

use super::model::{Graph, NodeId, NodeKind};

/// Per-node build settings, each inheritable from the node's parent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Include search paths.
    pub includes: Vec<Utf8PathBuf>,
    /// Preprocessor definitions.
    pub definitions: Vec<String>,
    /// Compile-side flags.
    pub cflags: Vec<Flag>,
    /// Library search paths.
    pub searches: Vec<Utf8PathBuf>,
    /// Link-side flags.
    pub ldflags: Vec<Flag>,
    /// Optimization override.
    pub optimization: Option<Optimization>,
    /// Debug-information override.
    pub debug: Option<DebugInfo>,
}

impl Settings {
    /// Compose `self` under `parent`: list settings concatenate with the
    /// parent's entries first, level overrides keep the child value when
    /// present.
    #[must_use]
    pub fn inherit(&self, parent: &Self) -> Self {
        let mut merged = parent.clone();
        merged.includes.extend(self.includes.iter().cloned());
        merged.definitions.extend(self.definitions.iter().cloned());
        merged.cflags.extend(self.cflags.iter().cloned());
        merged.searches.extend(self.searches.iter().cloned());
        merged.ldflags.extend(self.ldflags.iter().cloned());
        if self.optimization.is_some() {
            merged.optimization = self.optimization;
        }
        if self.debug.is_some() {
            merged.debug = self.debug;
        }
        merged
    }
}

/// Settings after ancestor composition, ready for command synthesis.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Effective {
    /// Composed settings.
    pub settings: Settings,
    /// Position independence, forced when the node is reachable under a
    /// dynamic library.
    pub position_independent: bool,
}

impl Effective {
    /// The optimization level, defaulting to none.
    #[must_use]
    pub fn optimization(&self) -> Optimization {
        self.settings.optimization.unwrap_or_default()
    }

    /// The debug level, defaulting to none.
    #[must_use]
    pub fn debug(&self) -> DebugInfo {
        self.settings.debug.unwrap_or_default()
    }
}

/// Compose a node's settings with its ancestor chain and derive forced
/// position independence.
#[must_use]
pub fn effective(graph: &Graph, id: NodeId) -> Effective {
    let mut chain = Vec::new();
    let mut position_independent = false;
    let mut cursor = Some(id);
    while let Some(node_id) = cursor {
        let node = graph.node(node_id);
        if matches!(node.kind, NodeKind::DynamicLibrary { .. }) {
            position_independent = true;
        }
        chain.push(node_id);
        cursor = node.parent;
    }

    let mut settings = Settings::default();
    for node_id in chain.iter().rev() {
        settings = graph.node(*node_id).settings.inherit(&settings);
    }
    Effective {
        settings,
        position_independent,
    }
}
