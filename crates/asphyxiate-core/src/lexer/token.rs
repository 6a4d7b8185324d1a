//! Token types for the C header lexer

use logos::Logos;

/// The kind of token produced by the lexer
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    // ========== Keywords ==========
    #[token("struct")]
    Struct,
    #[token("union")]
    Union,
    #[token("enum")]
    Enum,
    #[token("typedef")]
    Typedef,
    #[token("extern")]
    Extern,

    // ========== Literals ==========
    /// Integer or floating literal, lexed loosely as a preprocessing number
    #[regex(r"[0-9][0-9a-zA-Z_.]*")]
    Number,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StringLit,

    #[regex(r"'([^'\\\n]|\\.)*'")]
    CharLit,

    // ========== Identifiers ==========
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ========== Delimiters ==========
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token("::")]
    ColonColon,
    #[token(":")]
    Colon,
    #[token("*")]
    Star,
    #[token("&")]
    Ampersand,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    /// Any other operator character
    #[regex(r"[!%^+\-|?./@$`\\~]")]
    Punct,

    // ========== Preprocessor ==========
    /// A whole directive line, including backslash continuations
    #[regex(r"#([^\n\\]|\\\r?\n|\\[^\n])*")]
    Directive,

    // ========== Comments ==========
    #[regex(r"//[^\n]*")]
    LineComment,

    /// Ends at the first `*/`; block comments do not nest
    #[token("/*", block_comment)]
    BlockComment,
}

/// Extend a `/*` match through its terminator. An unterminated comment
/// swallows the rest of the input and is reported as an error.
fn block_comment(lex: &mut logos::Lexer<TokenKind>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.bump(lex.remainder().len());
            false
        }
    }
}

impl TokenKind {
    #[must_use]
    pub const fn is_comment(&self) -> bool {
        matches!(self, Self::LineComment | Self::BlockComment)
    }

    /// Tokens that open a nesting level
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::LParen | Self::LBrace | Self::LBracket)
    }

    /// Tokens that close a nesting level
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Self::RParen | Self::RBrace | Self::RBracket)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Struct => "struct",
            Self::Union => "union",
            Self::Enum => "enum",
            Self::Typedef => "typedef",
            Self::Extern => "extern",
            Self::Number => "number",
            Self::StringLit => "string literal",
            Self::CharLit => "character literal",
            Self::Ident => "identifier",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Semicolon => ";",
            Self::Comma => ",",
            Self::ColonColon => "::",
            Self::Colon => ":",
            Self::Star => "*",
            Self::Ampersand => "&",
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Punct => "punctuation",
            Self::Directive => "preprocessor directive",
            Self::LineComment => "line comment",
            Self::BlockComment => "block comment",
        };
        write!(f, "{s}")
    }
}
