//! Toolchain-scoped flag resolution.
//!
//! One project description serves GCC, Clang, TCC and MSVC without
//! branching at every call site: a flag is either universal or tagged for
//! exactly one toolchain family, and resolution against the active
//! toolchain silently drops the flags tagged for the others.
//!
//! The blueprint carries scoped flags in their literal `<id:value>` form;
//! parsing happens once at that boundary, so a malformed or unknown tag is
//! a configuration error instead of a silently ignored string.
//!
//! # Examples
//!
//! ```
//! use tsugite::flags::{Flag, ToolchainId};
//!
//! let flags = [
//!     Flag::parse("-DNDEBUG").expect("parse"),
//!     Flag::parse("<gnu:-Wall>").expect("parse"),
//!     Flag::parse("<msc:/W4>").expect("parse"),
//! ];
//! let gnu: Vec<&str> = flags.iter().filter_map(|f| f.filter(ToolchainId::Gnu)).collect();
//! assert_eq!(gnu, ["-DNDEBUG", "-Wall"]);
//! ```

use serde::de::{Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Short scope tag identifying a toolchain family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolchainId {
    /// GCC-compatible tools (gcc, ld-via-gcc).
    Gnu,
    /// Microsoft tools (cl, link, lib).
    Msc,
    /// LLVM tools addressed directly (clang with llvm-link).
    Llvm,
    /// Tiny C Compiler.
    Tcc,
}

impl ToolchainId {
    /// The tag spelled the way scoped flag literals spell it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gnu => "gnu",
            Self::Msc => "msc",
            Self::Llvm => "llvm",
            Self::Tcc => "tcc",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "gnu" => Some(Self::Gnu),
            "msc" => Some(Self::Msc),
            "llvm" => Some(Self::Llvm),
            "tcc" => Some(Self::Tcc),
            _ => None,
        }
    }
}

impl Display for ToolchainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when parsing a flag literal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlagError {
    /// A `<...>` literal without the `id:value` interior shape.
    #[error("malformed scoped flag literal: {literal}")]
    Malformed {
        /// The offending literal.
        literal: String,
    },
    /// A scope tag naming no known toolchain family.
    #[error("unknown toolchain scope '{scope}' in flag literal: {literal}")]
    UnknownScope {
        /// The unrecognised tag.
        scope: String,
        /// The offending literal.
        literal: String,
    },
}

/// A compiler or linker flag, universal or restricted to one toolchain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flag {
    /// Applies under every toolchain.
    Universal(String),
    /// Applies only when the named toolchain family is active.
    Scoped {
        /// The toolchain the flag is restricted to.
        scope: ToolchainId,
        /// The flag text emitted when the scope matches.
        value: String,
    },
}

impl Flag {
    /// Parse a flag literal, accepting the scoped `<id:value>` form.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError`] when a `<...>` literal is malformed or names an
    /// unknown scope tag.
    pub fn parse(literal: &str) -> Result<Self, FlagError> {
        let Some(interior) = literal
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
        else {
            return Ok(Self::Universal(literal.to_owned()));
        };
        let Some((tag, value)) = interior.split_once(':') else {
            return Err(FlagError::Malformed {
                literal: literal.to_owned(),
            });
        };
        if value.is_empty() {
            return Err(FlagError::Malformed {
                literal: literal.to_owned(),
            });
        }
        let scope = ToolchainId::from_tag(tag).ok_or_else(|| FlagError::UnknownScope {
            scope: tag.to_owned(),
            literal: literal.to_owned(),
        })?;
        Ok(Self::Scoped {
            scope,
            value: value.to_owned(),
        })
    }

    /// Build a universal flag.
    #[must_use]
    pub fn universal(value: impl Into<String>) -> Self {
        Self::Universal(value.into())
    }

    /// Build a scoped flag.
    #[must_use]
    pub fn scoped(scope: ToolchainId, value: impl Into<String>) -> Self {
        Self::Scoped {
            scope,
            value: value.into(),
        }
    }

    /// Resolve the flag against the active toolchain.
    ///
    /// A universal flag always passes; a scoped flag passes only under its
    /// own toolchain, yielding the unscoped value.
    #[must_use]
    pub fn filter(&self, active: ToolchainId) -> Option<&str> {
        match self {
            Self::Universal(value) => Some(value),
            Self::Scoped { scope, value } if *scope == active => Some(value),
            Self::Scoped { .. } => None,
        }
    }
}

impl Display for Flag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Universal(value) => f.write_str(value),
            Self::Scoped { scope, value } => write!(f, "<{scope}:{value}>"),
        }
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let literal = String::deserialize(deserializer)?;
        Self::parse(&literal).map_err(D::Error::custom)
    }
}

/// Resolve a flag list against the active toolchain, preserving order.
#[must_use]
pub fn filter_flags<'a>(flags: &'a [Flag], active: ToolchainId) -> Vec<&'a str> {
    flags.iter().filter_map(|flag| flag.filter(active)).collect()
}
