//! Cross-reference resolution for documentation text
//!
//! Text is scanned left to right for three reference shapes, tried in this
//! order at each position:
//! - `::Name` (scoped): struct, typedef or enum symbols only
//! - `name(` (call): function symbols only
//! - `name` (bare): any kind, but only inside reference-enabled regions
//!
//! Resolution reads the frozen [`Registry`] and nothing else, so linking the
//! same text twice always gives the same answer.

use serde::Serialize;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::lexer::{SourceLocation, Span};
use crate::registry::{Registry, RegistryError};
use crate::scanner::SourceComment;
use crate::symbol::{KindFilter, Symbol, SymbolId};

/// The textual form of a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReferenceShape {
    /// `::Name`
    Scoped,
    /// `name(` or `name()`
    Call,
    /// A plain identifier
    Bare,
}

impl std::fmt::Display for ReferenceShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Scoped => "scoped",
            Self::Call => "call",
            Self::Bare => "bare",
        };
        f.write_str(s)
    }
}

/// Why a reference did not resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnresolvedReason {
    /// No symbol of an acceptable kind has this name
    NotFound,
    /// Bare reference outside any `@file` or open group
    ReferencesDisabled,
    /// Several symbols of different kinds share the name
    Ambiguous,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotFound => "no matching symbol",
            Self::ReferencesDisabled => "bare references are disabled here",
            Self::Ambiguous => "several symbols match",
        };
        f.write_str(s)
    }
}

/// The outcome of resolving one reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    Resolved {
        symbol: SymbolId,
    },
    /// A function with several declarations; all of them are listed
    ResolvedSet {
        symbol: SymbolId,
        declarations: Vec<SourceLocation>,
    },
    Unresolved {
        reason: UnresolvedReason,
        candidates: Vec<SymbolId>,
    },
}

impl Resolution {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved { .. })
    }

    /// The symbol this resolved to, if exactly one
    #[must_use]
    pub fn symbol(&self) -> Option<SymbolId> {
        match self {
            Self::Resolved { symbol } | Self::ResolvedSet { symbol, .. } => Some(*symbol),
            Self::Unresolved { .. } => None,
        }
    }
}

/// A reference as found in text, before resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference<'t> {
    pub shape: ReferenceShape,
    /// Name to look up, qualifiers included (`one::a`)
    pub name: &'t str,
    /// Byte range of the whole reference text (`::one`, `sum()`)
    pub range: std::ops::Range<usize>,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// End of an identifier with optional `::` qualifiers starting at `start`
fn qualified_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && is_ident_char(bytes[end]) {
        end += 1;
    }
    while end + 2 < bytes.len()
        && bytes[end] == b':'
        && bytes[end + 1] == b':'
        && is_ident_start(bytes[end + 2])
    {
        end += 2;
        while end < bytes.len() && is_ident_char(bytes[end]) {
            end += 1;
        }
    }
    end
}

/// Find every reference-shaped span in `text`.
///
/// Words right after `%` are suppressed, and words right after `@` or `\`
/// are command names, not references.
#[must_use]
pub fn scan_references(text: &str) -> Vec<RawReference<'_>> {
    let bytes = text.as_bytes();
    let mut refs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let prev = i.checked_sub(1).map(|p| bytes[p]);
        let at_boundary = prev.map_or(true, |p| !is_ident_char(p));

        if b == b':'
            && at_boundary
            && bytes.get(i + 1) == Some(&b':')
            && bytes.get(i + 2).is_some_and(|&c| is_ident_start(c))
        {
            let end = qualified_end(bytes, i + 2);
            refs.push(RawReference {
                shape: ReferenceShape::Scoped,
                name: &text[i + 2..end],
                range: i..end,
            });
            i = end;
            continue;
        }

        if b.is_ascii_digit() && at_boundary {
            // Skip numbers such as 0x1f
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            continue;
        }

        if is_ident_start(b) && at_boundary {
            let end = qualified_end(bytes, i);
            if matches!(prev, Some(b'%' | b'@' | b'\\')) {
                i = end;
                continue;
            }
            let (shape, range_end) = if bytes.get(end) == Some(&b'(') {
                let close = if bytes.get(end + 1) == Some(&b')') { end + 2 } else { end + 1 };
                (ReferenceShape::Call, close)
            } else {
                (ReferenceShape::Bare, end)
            };
            refs.push(RawReference {
                shape,
                name: &text[i..end],
                range: i..range_end,
            });
            i = end;
            continue;
        }

        i += 1;
    }
    refs
}

/// A resolved reference inside a comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub shape: ReferenceShape,
    /// The reference as written
    pub text: String,
    pub name: String,
    /// Range in the comment body
    pub span: Span,
    pub location: SourceLocation,
    #[serde(flatten)]
    pub resolution: Resolution,
}

/// A piece of linked text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Segment {
    Text(String),
    Reference(Reference),
}

/// Text with its references replaced by resolution records
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LinkedText {
    /// Range in the comment body
    pub span: Span,
    pub segments: Vec<Segment>,
}

impl LinkedText {
    /// The linked range as plain text
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) => t.as_str(),
                Segment::Reference(r) => r.text.as_str(),
            })
            .collect()
    }

    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Reference(r) => Some(r),
            Segment::Text(_) => None,
        })
    }
}

/// Resolves references against a frozen registry
#[derive(Debug, Clone, Copy)]
pub struct CrossLinker<'a> {
    registry: &'a Registry,
}

impl<'a> CrossLinker<'a> {
    /// Create a cross-linker.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFrozen`] if registration is still open.
    pub fn new(registry: &'a Registry) -> Result<Self, RegistryError> {
        if !registry.is_frozen() {
            return Err(RegistryError::NotFrozen);
        }
        Ok(Self { registry })
    }

    fn lookup(&self, name: &str, filter: KindFilter) -> Vec<&'a Symbol> {
        // The registry is frozen, checked in `new`
        self.registry
            .symbols()
            .lookup(name, filter)
            .unwrap_or_default()
    }

    /// Resolve one reference. `None` means a bare word that names no
    /// symbol, which is plain text rather than a reference.
    #[must_use]
    pub fn resolve(&self, shape: ReferenceShape, name: &str, enabled: bool) -> Option<Resolution> {
        let unresolved = |reason, found: &[&Symbol]| Resolution::Unresolved {
            reason,
            candidates: found.iter().map(|s| s.id).collect(),
        };
        let resolution = match shape {
            ReferenceShape::Scoped => match self.lookup(name, KindFilter::Types).as_slice() {
                [] => unresolved(UnresolvedReason::NotFound, &[]),
                [one] => Resolution::Resolved { symbol: one.id },
                many => unresolved(UnresolvedReason::Ambiguous, many),
            },
            ReferenceShape::Call => {
                let found = self.lookup(name, KindFilter::Only(crate::symbol::SymbolKind::Function));
                match found.first() {
                    None => unresolved(UnresolvedReason::NotFound, &[]),
                    Some(symbol) if symbol.declarations.len() > 1 => Resolution::ResolvedSet {
                        symbol: symbol.id,
                        declarations: symbol.declarations.iter().map(|d| d.location).collect(),
                    },
                    Some(symbol) => Resolution::Resolved { symbol: symbol.id },
                }
            }
            ReferenceShape::Bare => {
                let found = self.lookup(name, KindFilter::Any);
                match found.as_slice() {
                    [] => return None,
                    found if !enabled => unresolved(UnresolvedReason::ReferencesDisabled, found),
                    [one] => Resolution::Resolved { symbol: one.id },
                    many => unresolved(UnresolvedReason::Ambiguous, many),
                }
            }
        };
        Some(resolution)
    }

    /// Link a range of a comment body, reporting unresolved references
    #[must_use]
    pub fn link(
        &self,
        comment: &SourceComment,
        span: Span,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> LinkedText {
        let Some(text) = comment.body.get(span.as_range()) else {
            return LinkedText {
                span,
                segments: Vec::new(),
            };
        };
        let base = span.start as usize;
        let mut segments = Vec::new();
        let mut cursor = 0;

        for raw in scan_references(text) {
            let Some(resolution) = self.resolve(raw.shape, raw.name, comment.references_enabled)
            else {
                continue;
            };
            if raw.range.start > cursor {
                segments.push(Segment::Text(text[cursor..raw.range.start].to_string()));
            }
            cursor = raw.range.end;

            let body_span = Span::from_range(base + raw.range.start..base + raw.range.end);
            let location = comment.location_of(body_span);
            let written = &text[raw.range.clone()];
            if let Resolution::Unresolved { reason, candidates } = &resolution {
                diagnostics.push(self.unresolved_diagnostic(raw.shape, written, *reason, candidates, location));
            }
            segments.push(Segment::Reference(Reference {
                shape: raw.shape,
                text: written.to_string(),
                name: raw.name.to_string(),
                span: body_span,
                location,
                resolution,
            }));
        }
        if cursor < text.len() {
            segments.push(Segment::Text(text[cursor..].to_string()));
        }
        LinkedText { span, segments }
    }

    fn unresolved_diagnostic(
        &self,
        shape: ReferenceShape,
        text: &str,
        reason: UnresolvedReason,
        candidates: &[SymbolId],
        location: SourceLocation,
    ) -> Diagnostic {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::ReferenceUnresolved {
                text: text.to_string(),
                shape,
                reason,
            },
            location,
        );
        if candidates.is_empty() {
            return diagnostic;
        }
        let names: Vec<String> = candidates
            .iter()
            .filter_map(|&id| self.registry.symbols().get(id))
            .map(|s| format!("{} `{}`", s.kind, s.name))
            .collect();
        diagnostic.with_hint(format!("candidates: {}", names.join(", ")))
    }
}
