//! Lexer for C and C++ header text
//!
//! The lexer converts header source into a flat token stream. It only needs
//! enough structure for the comment scanner and the declaration parser:
//! - Comments (kept, so documentation can be paired with code)
//! - Preprocessor directives as single tokens
//! - Identifiers, literals, brackets and separators
//! - Source location tracking

#![allow(clippy::cast_possible_truncation)] // Spans are u32; inputs > 4GB are unsupported

mod span;
mod token;

pub use span::{FileId, LineIndex, Location, SourceLocation, Span};
pub use token::TokenKind;

use logos::Logos;
use thiserror::Error;

/// A token with its kind, span, and source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub span: Span,
    pub lexeme: &'src str,
}

impl<'src> Token<'src> {
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span, lexeme: &'src str) -> Self {
        Self { kind, span, lexeme }
    }

    /// True for an identifier token with exactly this text
    #[must_use]
    pub fn is_ident(&self, text: &str) -> bool {
        self.kind == TokenKind::Ident && self.lexeme == text
    }
}

/// Lexer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
}

/// A lexer error with location information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedError {
    pub error: LexError,
    pub span: Span,
}

impl SpannedError {
    #[must_use]
    pub const fn new(error: LexError, span: Span) -> Self {
        Self { error, span }
    }
}

impl std::fmt::Display for SpannedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.error, self.span)
    }
}

impl std::error::Error for SpannedError {}

/// The header lexer
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, TokenKind>,
    errors: Vec<SpannedError>,
}

impl<'src> Lexer<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            errors: Vec::new(),
        }
    }

    /// Tokenize the entire source, returning all tokens and any errors
    #[must_use]
    pub fn tokenize(source: &'src str) -> (Vec<Token<'src>>, Vec<SpannedError>) {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.by_ref().collect();
        (tokens, lexer.errors)
    }

    /// Errors collected so far
    #[must_use]
    pub fn errors(&self) -> &[SpannedError] {
        &self.errors
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let result = self.inner.next()?;
            let span = Span::from_range(self.inner.span());
            let lexeme = self.inner.slice();
            match result {
                Ok(kind) => return Some(Token::new(kind, span, lexeme)),
                Err(()) => {
                    // Error recovery: record and skip the invalid input
                    let c = lexeme.chars().next().unwrap_or('\u{fffd}');
                    self.errors
                        .push(SpannedError::new(LexError::UnexpectedChar(c), span));
                }
            }
        }
    }
}
