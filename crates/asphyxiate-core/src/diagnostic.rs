//! Diagnostics collected during a run
//!
//! Nothing in a run is fatal: every problem degrades to less linked
//! documentation and is reported here instead.

use serde::Serialize;
use thiserror::Error;

use crate::doc::{ReferenceShape, UnresolvedReason};
use crate::lexer::SourceLocation;

/// The four diagnostic families a renderer can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    /// Unrecognized fragments, dangling comments, `@param` mismatches
    ParseWarning,
    /// References that did not resolve to exactly one symbol
    ReferenceUnresolved,
    /// Unbalanced group markers
    GroupMismatch,
    /// A group defined more than once
    DuplicateGroupName,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ParseWarning => "parse warning",
            Self::ReferenceUnresolved => "unresolved reference",
            Self::GroupMismatch => "group mismatch",
            Self::DuplicateGroupName => "duplicate group",
        };
        write!(f, "{s}")
    }
}

/// The kind of diagnostic
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),

    #[error("unrecognized declaration `{0}`")]
    UnrecognizedDeclaration(String),

    #[error("documentation comment is not attached to any declaration")]
    DanglingComment,

    #[error("documented parameter `{param}` is not a parameter of `{function}`")]
    ParamMismatch { function: String, param: String },

    #[error("`{0}` command does not name anything")]
    MissingCommandTarget(&'static str),

    #[error("unresolved {shape} reference `{text}`: {reason}")]
    ReferenceUnresolved {
        text: String,
        shape: ReferenceShape,
        reason: UnresolvedReason,
    },

    #[error("group close without a matching open; group tracking stops for the rest of the file")]
    UnmatchedGroupClose,

    #[error("group `{0}` is still open at end of file")]
    UnclosedGroup(String),

    #[error("group `{group}` cannot be nested in `{parent}` without a cycle")]
    GroupCycle { group: String, parent: String },

    #[error("group `{0}` is defined more than once")]
    DuplicateGroupName(String),
}

impl DiagnosticKind {
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::UnexpectedCharacter(_)
            | Self::UnrecognizedDeclaration(_)
            | Self::DanglingComment
            | Self::ParamMismatch { .. }
            | Self::MissingCommandTarget(_) => Category::ParseWarning,
            Self::ReferenceUnresolved { .. } => Category::ReferenceUnresolved,
            Self::UnmatchedGroupClose | Self::UnclosedGroup(_) | Self::GroupCycle { .. } => {
                Category::GroupMismatch
            }
            Self::DuplicateGroupName(_) => Category::DuplicateGroupName,
        }
    }
}

/// A diagnostic with source location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub location: SourceLocation,
    /// Optional hint, e.g. the candidates of an ambiguous reference
    pub hint: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(kind: DiagnosticKind, location: SourceLocation) -> Self {
        Self {
            kind,
            location,
            hint: None,
        }
    }

    /// Add a hint to this diagnostic
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        self.kind.category()
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.category(), self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// Sort diagnostics into a stable (file, line, column, message) order
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_cached_key(|d| {
        (
            d.location.file,
            d.location.location,
            d.location.span.start,
            d.kind.to_string(),
            d.hint.clone(),
        )
    });
}
