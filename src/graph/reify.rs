//! Variable reification for command text.
//!
//! Resolves `$(NAME)` and `$NAME` placeholders against the graph's
//! flattened variable map, iterating to a fixed point so variables may
//! reference other variables. The Makefile backend does not use this
//! (make substitutes at its own run time); direct execution and the
//! Visual Studio backend do.

use indexmap::IndexMap;
use thiserror::Error;

/// Errors raised during placeholder substitution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReifyError {
    /// A placeholder survived fixed-point substitution, either because the
    /// name is unknown or because the definitions substitute forever.
    #[error("unresolved variable ${name} in command: {command}")]
    Unresolved {
        /// The placeholder name.
        name: String,
        /// The command text after the last substitution round.
        command: String,
    },
}

/// Returns whether `ch` may appear in a bare `$NAME` placeholder.
fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Locate the first placeholder in `chars` starting at `pos`, returning
/// the name and the number of characters the placeholder spans.
fn find_placeholder(chars: &[char], pos: usize) -> Option<(String, usize)> {
    if chars.get(pos) != Some(&'$') {
        return None;
    }
    if chars.get(pos + 1) == Some(&'(') {
        let mut name = String::new();
        let mut offset = pos + 2;
        while let Some(&ch) = chars.get(offset) {
            if ch == ')' {
                return (!name.is_empty()).then_some((name, offset + 1 - pos));
            }
            if !is_identifier_char(ch) {
                return None;
            }
            name.push(ch);
            offset += 1;
        }
        return None;
    }
    let mut name = String::new();
    let mut offset = pos + 1;
    while let Some(&ch) = chars.get(offset) {
        if !is_identifier_char(ch) {
            break;
        }
        name.push(ch);
        offset += 1;
    }
    (!name.is_empty()).then_some((name, offset - pos))
}

/// Run one substitution round, returning the rewritten text and whether
/// any placeholder was replaced.
fn substitute_once(text: &str, vars: &IndexMap<String, String>) -> (String, bool) {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut replaced = false;
    let mut i = 0;
    while let Some(&ch) = chars.get(i) {
        if ch == '$'
            && let Some((name, span)) = find_placeholder(&chars, i)
            && let Some(value) = vars.get(&name)
        {
            out.push_str(value);
            i += span;
            replaced = true;
            continue;
        }
        out.push(ch);
        i += 1;
    }
    (out, replaced)
}

/// Find the first remaining placeholder name in `text`, if any.
fn first_placeholder(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    (0..chars.len()).find_map(|i| find_placeholder(&chars, i).map(|(name, _)| name))
}

/// Substitute placeholders in `command` to a fixed point.
///
/// # Errors
///
/// Returns [`ReifyError::Unresolved`] when a placeholder survives every
/// substitution round: an unknown name, or mutually recursive definitions
/// that can never settle. The round count is capped at one more than the
/// number of variables, which any terminating chain fits inside.
pub fn reify(command: &str, vars: &IndexMap<String, String>) -> Result<String, ReifyError> {
    let mut text = command.to_owned();
    for _ in 0..=vars.len() {
        let (rewritten, replaced) = substitute_once(&text, vars);
        text = rewritten;
        if !replaced {
            break;
        }
    }
    if let Some(name) = first_placeholder(&text) {
        return Err(ReifyError::Unresolved {
            name,
            command: text,
        });
    }
    Ok(text)
}
