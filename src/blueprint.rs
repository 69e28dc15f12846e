//! Blueprint loading.
//!
//! A blueprint is the JSON hand-off point between the language-specific
//! front end (which decides what belongs to which target) and this
//! driver. It carries already-resolved data: file paths, flag literals,
//! variable values and extension metadata. No discovery or expansion
//! happens here; the structures below deserialise 1:1 onto the graph
//! construction API.
//!
//! ```json
//! {
//!     "version": "1.0.0",
//!     "projects": [
//!         { "kind": "application", "name": "demo", "sources": ["main.c"] }
//!     ]
//! }
//! ```

use std::io;
use std::path::Path;

use camino::Utf8PathBuf;
use semver::Version;
use serde::Deserialize;
use thiserror::Error;

use crate::extension::SequenceError;
use crate::flags::Flag;
use crate::graph::GraphError;
use crate::platform::Os;
use crate::toolchain::{DebugInfo, Optimization};

/// Errors raised while loading or converting a blueprint.
#[derive(Debug, Error)]
pub enum BlueprintError {
    /// The blueprint file could not be read.
    #[error("failed to read blueprint {path}")]
    Read {
        /// Path attempted.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The blueprint is not valid JSON for this schema.
    #[error("failed to parse blueprint")]
    Parse {
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The blueprint declares a format version this driver does not speak.
    #[error("unsupported blueprint format version {version}")]
    UnsupportedVersion {
        /// Declared version.
        version: Version,
    },
    /// Graph construction rejected the description.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// Extension sequencing failed.
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    /// An extension's `library` literal failed flag parsing.
    #[error("extension {name}: {source}")]
    ExtensionLiteral {
        /// The declaring extension.
        name: String,
        /// Underlying flag error.
        #[source]
        source: crate::flags::FlagError,
    },
    /// An entry asks for a shell primitive the target OS does not have.
    #[error("entry {entry}: no {op} command on {os:?}")]
    UnsupportedPrimitive {
        /// The declaring entry.
        entry: String,
        /// The primitive kind.
        op: &'static str,
        /// The selected OS.
        os: Os,
    },
}

/// Top-level blueprint structure.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Blueprint {
    /// Blueprint format version; major version 1 is understood.
    pub version: Version,
    /// Target OS override; the host platform applies when absent.
    #[serde(default)]
    pub os: Option<Os>,
    /// Build-time substitution variables.
    #[serde(default)]
    pub variables: Vec<VariableDef>,
    /// External extension references, sequenced by their requirements.
    #[serde(default)]
    pub extensions: Vec<ExtensionDef>,
    /// Compilation targets.
    #[serde(default)]
    pub projects: Vec<ProjectDef>,
    /// Phony or file targets with explicit command lists.
    #[serde(default)]
    pub entries: Vec<EntryDef>,
}

impl Blueprint {
    /// Parse a blueprint from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError`] on malformed JSON or an unsupported
    /// format version.
    pub fn from_str(text: &str) -> Result<Self, BlueprintError> {
        let blueprint: Self =
            serde_json::from_str(text).map_err(|source| BlueprintError::Parse { source })?;
        if blueprint.version.major != 1 {
            return Err(BlueprintError::UnsupportedVersion {
                version: blueprint.version,
            });
        }
        Ok(blueprint)
    }

    /// Read and parse a blueprint file.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError`] when the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, BlueprintError> {
        let text = std::fs::read_to_string(path).map_err(|source| BlueprintError::Read {
            path: Utf8PathBuf::from(path.display().to_string()),
            source,
        })?;
        Self::from_str(&text)
    }
}

/// One substitution variable.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableDef {
    /// Variable name.
    pub name: String,
    /// Assigned value.
    #[serde(default)]
    pub value: Option<String>,
    /// Fallback when no value is assigned.
    #[serde(default)]
    pub default: Option<String>,
}

/// One external extension reference.
///
/// An `archive` makes the reference static; otherwise it is dynamic and
/// links by `library` (defaulting to the extension's own name). A
/// `library` in `<id:value>` form becomes a toolchain-scoped link literal.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionDef {
    /// Extension name.
    pub name: String,
    /// Extensions that must initialise first.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Link name or scoped literal for a dynamic reference.
    #[serde(default)]
    pub library: Option<String>,
    /// Archive path for a static reference.
    #[serde(default)]
    pub archive: Option<Utf8PathBuf>,
}

/// Target kinds a project may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectKind {
    /// Final executable.
    Application,
    /// Shared object.
    DynamicLibrary,
    /// Archive.
    StaticLibrary,
    /// Bundle of objects for other targets to absorb.
    ObjectLibrary,
}

/// One compilation target.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectDef {
    /// Target kind.
    pub kind: ProjectKind,
    /// Target name, referable from `depends` lists.
    pub name: String,
    /// Declared output path; derived from the name when absent.
    #[serde(default)]
    pub output: Option<Utf8PathBuf>,
    /// Translation units, plain paths or per-file overrides.
    #[serde(default)]
    pub sources: Vec<SourceDef>,
    /// Names of projects, extensions or entries this target needs.
    #[serde(default)]
    pub depends: Vec<String>,
    /// Include search paths.
    #[serde(default)]
    pub includes: Vec<Utf8PathBuf>,
    /// Preprocessor definitions.
    #[serde(default)]
    pub definitions: Vec<String>,
    /// Compile-side flags, scoped literals allowed.
    #[serde(default)]
    pub cflags: Vec<Flag>,
    /// Library search paths.
    #[serde(default)]
    pub searches: Vec<Utf8PathBuf>,
    /// Link-side flags, scoped literals allowed.
    #[serde(default)]
    pub ldflags: Vec<Flag>,
    /// Optimization level.
    #[serde(default)]
    pub optimization: Option<Optimization>,
    /// Debug-information level.
    #[serde(default)]
    pub debug: Option<DebugInfo>,
    /// Strip the linked binary (applications only).
    #[serde(default)]
    pub strip: bool,
}

/// A translation unit, with optional per-file overrides.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SourceDef {
    /// A bare source path.
    Path(Utf8PathBuf),
    /// A source with local settings.
    Detailed(FileOverrides),
}

/// Per-file settings layered over the owning project's.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileOverrides {
    /// Source file path.
    pub source: Utf8PathBuf,
    /// Declared object output; derived from the source when absent.
    #[serde(default)]
    pub output: Option<Utf8PathBuf>,
    /// Extra include search paths.
    #[serde(default)]
    pub includes: Vec<Utf8PathBuf>,
    /// Extra preprocessor definitions.
    #[serde(default)]
    pub definitions: Vec<String>,
    /// Extra compile-side flags.
    #[serde(default)]
    pub cflags: Vec<Flag>,
    /// Optimization override.
    #[serde(default)]
    pub optimization: Option<Optimization>,
    /// Debug-information override.
    #[serde(default)]
    pub debug: Option<DebugInfo>,
    /// Stop after preprocessing.
    #[serde(default)]
    pub preprocess: bool,
}

/// One phony or file target with explicit commands.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryDef {
    /// Target word.
    pub name: String,
    /// Commands run when the target builds.
    #[serde(default)]
    pub commands: Vec<EntryCommand>,
    /// Output path; present only for file targets.
    #[serde(default)]
    pub output: Option<Utf8PathBuf>,
    /// Names this entry depends on; variables are allowed and surface as
    /// `$(NAME)` references in emitted Makefiles.
    #[serde(default)]
    pub depends: Vec<String>,
}

/// One entry command: verbatim shell text, or a portable primitive
/// synthesised per platform.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EntryCommand {
    /// Verbatim shell text, `$(VAR)` placeholders allowed.
    Shell(String),
    /// A platform-synthesised primitive.
    Primitive(EntryPrimitive),
}

/// Shell primitives with per-OS spellings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryPrimitive {
    /// Create a directory, parents included.
    CreateDir(Utf8PathBuf),
    /// Delete a path recursively.
    Delete(Utf8PathBuf),
    /// Strip a built binary.
    Strip(Utf8PathBuf),
}
