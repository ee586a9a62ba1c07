//! Router error types.

use thiserror::Error;

use super::descriptor::RouteKind;

/// A routing conflict found while building the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("duplicate {kind} `{key}`: {first} is shadowed by {second}")]
    Duplicate {
        kind: RouteKind,
        key: String,
        first: &'static str,
        second: &'static str,
    },

    #[error(
        "ambiguous callback prefixes `{shorter}` ({shorter_entry}) and `{longer}` ({longer_entry})"
    )]
    AmbiguousPrefix {
        shorter: String,
        shorter_entry: &'static str,
        longer: String,
        longer_entry: &'static str,
    },

    #[error("invalid text pattern `{pattern}` for {entry}: {reason}")]
    InvalidPattern {
        pattern: String,
        entry: &'static str,
        reason: String,
    },

    #[error("empty {kind} key for {entry}")]
    EmptyKey { kind: RouteKind, entry: &'static str },

    #[error("command `{key}` of {entry} can never match: {reason}")]
    InvalidKey {
        key: String,
        entry: &'static str,
        reason: &'static str,
    },

    #[error("duplicate job `{name}`")]
    DuplicateJob { name: String },
}

/// Registry construction failed. Startup must abort.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("registry build failed with {} conflict(s): {}", .0.len(), join(.0))]
    Conflicts(Vec<Conflict>),
}

impl BuildError {
    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            Self::Conflicts(conflicts) => conflicts,
        }
    }
}

fn join(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
