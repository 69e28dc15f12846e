//! Extension sequencing.
//!
//! Optional runtime components may require one another; initialisation
//! must honour those `requires` edges. Each component is assigned an
//! integer sequence number strictly greater than every requirement's,
//! computed by memoized recursion with an in-progress mark that turns a
//! loop into a [`SequenceError::Cycle`]. The final order is a stable sort
//! by sequence number, so declaration order is preserved among ties.

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

/// One optional component and the components it requires.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Extension {
    /// Component name.
    pub name: String,
    /// Names of components that must initialise first.
    #[serde(default)]
    pub requires: Vec<String>,
}

impl Extension {
    /// A component without requirements.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires: Vec::new(),
        }
    }

    /// A component requiring the named components.
    #[must_use]
    pub fn requiring<I, S>(name: impl Into<String>, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            requires: requires.into_iter().map(Into::into).collect(),
        }
    }
}

/// A component with its assigned sequence number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sequenced {
    /// Component name.
    pub name: String,
    /// Assigned number; exceeds every requirement's number.
    pub rank: usize,
}

/// Errors raised during sequencing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    /// The `requires` relation loops through the named component.
    #[error("extension requirement cycle through {name}")]
    Cycle {
        /// A component on the loop.
        name: String,
    },
    /// A requirement names no declared component.
    #[error("extension {name} requires unknown extension {required}")]
    UnknownRequirement {
        /// The requiring component.
        name: String,
        /// The missing name.
        required: String,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done(usize),
}

struct Sequencer<'a> {
    extensions: &'a IndexMap<&'a str, &'a Extension>,
    marks: IndexMap<&'a str, Mark>,
}

impl<'a> Sequencer<'a> {
    fn sequence(&mut self, name: &'a str) -> Result<usize, SequenceError> {
        match self.marks.get(name) {
            Some(Mark::Done(rank)) => return Ok(*rank),
            Some(Mark::InProgress) => {
                return Err(SequenceError::Cycle {
                    name: name.to_owned(),
                });
            }
            None => {}
        }
        let Some(extension) = self.extensions.get(name) else {
            // The caller reports the requiring side; signal with the
            // missing name only.
            return Err(SequenceError::UnknownRequirement {
                name: String::new(),
                required: name.to_owned(),
            });
        };

        self.marks.insert(name, Mark::InProgress);
        let mut rank = 0;
        for required in &extension.requires {
            let required_rank =
                self.sequence(required)
                    .map_err(|err| match err {
                        SequenceError::UnknownRequirement { name: from, required: missing }
                            if from.is_empty() =>
                        {
                            SequenceError::UnknownRequirement {
                                name: extension.name.clone(),
                                required: missing,
                            }
                        }
                        other => other,
                    })?;
            rank = rank.max(required_rank + 1);
        }
        self.marks.insert(name, Mark::Done(rank));
        Ok(rank)
    }
}

/// Assign sequence numbers and return the components in initialisation
/// order: ascending rank, declaration order among ties.
///
/// # Errors
///
/// Returns [`SequenceError`] on a requirement loop or a requirement that
/// names no declared component.
pub fn sequence(extensions: &[Extension]) -> Result<Vec<Sequenced>, SequenceError> {
    let by_name: IndexMap<&str, &Extension> = extensions
        .iter()
        .map(|extension| (extension.name.as_str(), extension))
        .collect();
    let mut sequencer = Sequencer {
        extensions: &by_name,
        marks: IndexMap::new(),
    };

    let mut ordered: Vec<Sequenced> = Vec::with_capacity(extensions.len());
    for extension in extensions {
        let rank = sequencer.sequence(&extension.name)?;
        ordered.push(Sequenced {
            name: extension.name.clone(),
            rank,
        });
    }
    ordered.sort_by_key(|sequenced| sequenced.rank);
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ranks(ordered: &[Sequenced]) -> Vec<(&str, usize)> {
        ordered
            .iter()
            .map(|sequenced| (sequenced.name.as_str(), sequenced.rank))
            .collect()
    }

    #[test]
    fn chain_ranks_strictly_increase() {
        let extensions = [
            Extension::new("a"),
            Extension::requiring("b", ["a"]),
            Extension::requiring("c", ["b"]),
        ];
        let ordered = sequence(&extensions).expect("acyclic");
        assert_eq!(ranks(&ordered), [("a", 0), ("b", 1), ("c", 2)]);
    }

    #[test]
    fn rank_exceeds_every_requirement() {
        let extensions = [
            Extension::new("base"),
            Extension::requiring("mid", ["base"]),
            Extension::requiring("top", ["base", "mid"]),
        ];
        let ordered = sequence(&extensions).expect("acyclic");
        assert_eq!(ranks(&ordered), [("base", 0), ("mid", 1), ("top", 2)]);
    }

    #[test]
    fn ties_keep_declaration_order() {
        let extensions = [
            Extension::new("z"),
            Extension::new("a"),
            Extension::requiring("user", ["z", "a"]),
        ];
        let ordered = sequence(&extensions).expect("acyclic");
        assert_eq!(ranks(&ordered), [("z", 0), ("a", 0), ("user", 1)]);
    }

    #[rstest]
    #[case::direct(vec![Extension::requiring("x", ["x"])], "x")]
    #[case::indirect(
        vec![Extension::requiring("x", ["y"]), Extension::requiring("y", ["x"])],
        "x"
    )]
    fn cycles_are_reported(#[case] extensions: Vec<Extension>, #[case] name: &str) {
        assert_eq!(
            sequence(&extensions),
            Err(SequenceError::Cycle {
                name: name.to_owned()
            })
        );
    }

    #[test]
    fn unknown_requirement_names_both_sides() {
        let extensions = [Extension::requiring("net", ["tls"])];
        assert_eq!(
            sequence(&extensions),
            Err(SequenceError::UnknownRequirement {
                name: "net".into(),
                required: "tls".into()
            })
        );
    }
}
