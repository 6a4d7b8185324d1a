//! Documentation comments as they appear in header text
//!
//! A comment's body keeps one line per source line, so a byte offset in the
//! body maps back to a source line by counting newlines.

use serde::Serialize;

use crate::lexer::{FileId, Location, SourceLocation, Span, Token, TokenKind};

/// The syntactic form of a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommentStyle {
    /// `// ...`, `/// ...`, `//! ...`
    Line,
    /// `/* ... */`, `/** ... */`, `/*! ... */`
    Block,
}

/// Classify a comment token's text
#[must_use]
pub fn is_doc_comment(text: &str) -> bool {
    if text.starts_with("/**") {
        // `/**/` is an empty plain comment, `/***...` is decoration
        text.len() > 4 && !text.starts_with("/***")
    } else {
        text.starts_with("/*!")
            || (text.starts_with("///") && !text.starts_with("////"))
            || text.starts_with("//!")
    }
}

/// True for `/**<`, `/*!<`, `///<` and `//!<` comments, which document the
/// declaration before them
#[must_use]
pub fn is_trailing_doc_comment(text: &str) -> bool {
    is_doc_comment(text) && text.get(3..4) == Some("<")
}

/// What a documentation comment ended up documenting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Attachment {
    /// Not yet decided, or not attached to anything
    Loose,
    /// The declaration that follows (or precedes, for trailing comments)
    Declaration,
    /// The named group it defines
    Group(String),
    /// The file as a whole
    File,
}

/// A documentation comment block with its location and cleaned body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceComment {
    pub file: FileId,
    /// Byte range of the raw comment in the file
    pub span: Span,
    /// Line/column of the comment start
    pub location: Location,
    pub style: CommentStyle,
    /// Body with delimiters, decoration and markup commands blanked out
    pub body: String,
    /// A `/**<` style comment
    pub trailing: bool,
    /// Whether bare-word references may resolve inside this comment
    pub references_enabled: bool,
    pub attachment: Attachment,
}

impl SourceComment {
    /// Build a comment from one or more adjacent comment tokens.
    ///
    /// Several tokens are only passed for runs of `///` lines.
    #[must_use]
    pub fn from_tokens(file: FileId, tokens: &[Token<'_>], location: Location) -> Self {
        let span = tokens
            .iter()
            .map(|t| t.span)
            .reduce(Span::merge)
            .unwrap_or_default();
        let first = tokens.first().map(|t| t.lexeme).unwrap_or_default();
        let style = match tokens.first().map(|t| t.kind) {
            Some(TokenKind::LineComment) => CommentStyle::Line,
            _ => CommentStyle::Block,
        };
        let body = match style {
            CommentStyle::Block => clean_block(first),
            CommentStyle::Line => tokens
                .iter()
                .map(|t| clean_line(t.lexeme))
                .collect::<Vec<_>>()
                .join("\n"),
        };
        Self {
            file,
            span,
            location,
            style,
            body,
            trailing: is_trailing_doc_comment(first),
            references_enabled: false,
            attachment: Attachment::Loose,
        }
    }

    /// True when nothing but whitespace is left of the body
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.body.trim().is_empty()
    }

    /// Source location of a byte offset inside the body
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn location_of(&self, body_span: Span) -> SourceLocation {
        let before = &self.body[..(body_span.start as usize).min(self.body.len())];
        let newlines = before.matches('\n').count() as u32;
        let column = match before.rfind('\n') {
            Some(nl) => (before.len() - nl) as u32,
            None => self.location.column + body_span.start,
        };
        SourceLocation::new(
            self.file,
            self.span,
            Location::new(self.location.line + newlines, column),
        )
    }
}

/// Strip `/**`, `*/` and leading `*` columns, keeping the line structure
fn clean_block(text: &str) -> String {
    let inner = text
        .strip_prefix("/**")
        .or_else(|| text.strip_prefix("/*!"))
        .or_else(|| text.strip_prefix("/*"))
        .unwrap_or(text);
    let inner = inner.strip_prefix('<').unwrap_or(inner);
    let inner = inner.strip_suffix("*/").unwrap_or(inner);
    let inner = inner.trim_end_matches('*');

    let mut lines = Vec::new();
    for (i, line) in inner.split('\n').enumerate() {
        let line = line.trim_end_matches('\r');
        if i == 0 {
            lines.push(line.trim().to_string());
            continue;
        }
        let trimmed = line.trim_start();
        let stripped = match trimmed.strip_prefix('*') {
            Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
            None => trimmed,
        };
        lines.push(stripped.trim_end().to_string());
    }
    lines.join("\n")
}

fn clean_line(text: &str) -> String {
    let inner = text
        .strip_prefix("///")
        .or_else(|| text.strip_prefix("//!"))
        .or_else(|| text.strip_prefix("//"))
        .unwrap_or(text);
    let inner = inner.strip_prefix('<').unwrap_or(inner);
    inner.trim().to_string()
}
