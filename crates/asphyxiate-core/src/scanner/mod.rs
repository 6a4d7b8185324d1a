//! Comment scanner
//!
//! Walks one file's token stream and pairs every documentation comment with
//! the declaration fragment it documents. Along the way it follows the group
//! markup (`@defgroup`, `@{`, `@}`...) and the `@file` marker, which decide
//! group membership and whether bare-word references are enabled.
//!
//! The scanner never fails: lexer errors, stray braces and unbalanced group
//! markers all become diagnostics and scanning continues.

mod comment;
mod markup;

pub use comment::{
    is_doc_comment, is_trailing_doc_comment, Attachment, CommentStyle, SourceComment,
};
pub use markup::{parse as parse_markup, Command, CommandKind, DocTarget, GroupMode, Markup, TargetKind};

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::group::{GroupDefinition, GroupStack};
use crate::lexer::{FileId, LexError, Lexer, LineIndex, SourceLocation, Span, Token, TokenKind};

/// A run of tokens that makes up one top-level declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment<'src> {
    /// Tokens of the declaration, comments inside it included
    pub tokens: Vec<Token<'src>>,
    pub span: Span,
}

impl<'src> Fragment<'src> {
    #[must_use]
    pub fn new(tokens: Vec<Token<'src>>) -> Self {
        let span = tokens
            .iter()
            .map(|t| t.span)
            .reduce(Span::merge)
            .unwrap_or_default();
        Self { tokens, span }
    }

    /// Tokens that are not comments
    pub fn code(&self) -> impl Iterator<Item = &Token<'src>> {
        self.tokens.iter().filter(|t| !t.kind.is_comment())
    }
}

/// A documentation comment paired with what it documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'src> {
    /// Leading documentation comment
    pub comment: Option<SourceComment>,
    /// `/**<` comment that followed the fragment
    pub trailing: Option<SourceComment>,
    /// Explicit target named by the leading comment
    pub target: Option<DocTarget>,
    /// Groups named with `@ingroup`
    pub in_groups: Vec<String>,
    /// The declaration text; `None` for comments documenting an explicit
    /// target with no code after them
    pub fragment: Option<Fragment<'src>>,
    /// Innermost open group at the declaration
    pub group: Option<String>,
}

impl Entry<'_> {
    /// True if any comment documents this entry
    #[must_use]
    pub fn is_documented(&self) -> bool {
        self.comment.is_some() || self.trailing.is_some()
    }
}

/// Group nesting events, in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupEvent {
    Defined(GroupDefinition),
    Opened {
        name: Option<String>,
        location: SourceLocation,
    },
    Closed {
        name: Option<String>,
        location: SourceLocation,
    },
}

/// One item of scanner output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem<'src> {
    Group(GroupEvent),
    Entry(Entry<'src>),
    /// Comment documenting the file itself
    FileDoc(SourceComment),
    /// Comment that documents nothing
    Loose(SourceComment),
}

/// Everything the scanner found in one file
#[derive(Debug, Clone)]
pub struct ScannedFile<'src> {
    pub file: FileId,
    pub source: &'src str,
    pub has_file_marker: bool,
    pub items: Vec<ScanItem<'src>>,
    pub diagnostics: Vec<Diagnostic>,
    pub line_index: LineIndex,
}

impl ScannedFile<'_> {
    /// Source location of a byte span in this file
    #[must_use]
    pub fn location(&self, span: Span) -> SourceLocation {
        SourceLocation::new(self.file, span, self.line_index.location(span.start))
    }
}

struct PendingDoc {
    comment: SourceComment,
    target: Option<DocTarget>,
    in_groups: Vec<String>,
}

/// Scan one header
#[must_use]
pub fn scan(file: FileId, source: &str) -> ScannedFile<'_> {
    Scanner::new(file, source).run()
}

struct Scanner<'src> {
    file: FileId,
    source: &'src str,
    tokens: Vec<Token<'src>>,
    pos: usize,
    line_index: LineIndex,
    stack: GroupStack,
    file_marker_seen: bool,
    /// Group defined most recently in this file; a bare `@{` opens it
    last_defined: Option<String>,
    pending: Option<PendingDoc>,
    extern_depth: usize,
    items: Vec<ScanItem<'src>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Scanner<'src> {
    fn new(file: FileId, source: &'src str) -> Self {
        let line_index = LineIndex::new(source);
        let (tokens, errors) = Lexer::tokenize(source);
        let diagnostics = errors
            .into_iter()
            .map(|e| {
                let LexError::UnexpectedChar(c) = e.error;
                Diagnostic::new(
                    DiagnosticKind::UnexpectedCharacter(c),
                    SourceLocation::new(file, e.span, line_index.location(e.span.start)),
                )
            })
            .collect();
        Self {
            file,
            source,
            tokens,
            pos: 0,
            line_index,
            stack: GroupStack::new(),
            file_marker_seen: false,
            last_defined: None,
            pending: None,
            extern_depth: 0,
            items: Vec::new(),
            diagnostics,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn run(mut self) -> ScannedFile<'src> {
        while let Some(tok) = self.tokens.get(self.pos).copied() {
            match tok.kind {
                TokenKind::LineComment | TokenKind::BlockComment => self.scan_comment(),
                TokenKind::Directive => {
                    self.pos += 1;
                    self.push_entry(Fragment::new(vec![tok]));
                }
                TokenKind::Extern if self.opens_linkage_block() => {
                    // `extern "C" {` wraps declarations without scoping them
                    self.pos += 3;
                    self.flush_pending();
                    self.extern_depth += 1;
                }
                TokenKind::RBrace if self.extern_depth > 0 => {
                    self.pos += 1;
                    self.flush_pending();
                    self.extern_depth -= 1;
                }
                TokenKind::RBrace
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::Semicolon => {
                    self.pos += 1;
                }
                _ => {
                    if let Some(fragment) = self.collect_fragment() {
                        self.push_entry(fragment);
                    }
                }
            }
        }
        self.flush_pending();

        let end = Span::new(self.source.len() as u32, self.source.len() as u32);
        let location = self.location(end);
        for name in std::mem::take(&mut self.stack).finish() {
            self.diagnostics
                .push(Diagnostic::new(DiagnosticKind::UnclosedGroup(name), location));
        }

        tracing::trace!(
            file = %self.file,
            items = self.items.len(),
            diagnostics = self.diagnostics.len(),
            "scanned file"
        );

        ScannedFile {
            file: self.file,
            source: self.source,
            has_file_marker: self.file_marker_seen,
            items: self.items,
            diagnostics: self.diagnostics,
            line_index: self.line_index,
        }
    }

    fn location(&self, span: Span) -> SourceLocation {
        SourceLocation::new(self.file, span, self.line_index.location(span.start))
    }

    fn references_enabled(&self) -> bool {
        self.file_marker_seen || self.stack.has_open_group()
    }

    fn opens_linkage_block(&self) -> bool {
        matches!(
            (self.tokens.get(self.pos + 1), self.tokens.get(self.pos + 2)),
            (Some(a), Some(b)) if a.kind == TokenKind::StringLit && b.kind == TokenKind::LBrace
        )
    }

    /// Consume a comment (or a run of `///` lines) and act on it
    fn scan_comment(&mut self) {
        let start = self.pos;
        let first = self.tokens[start];
        if !is_doc_comment(first.lexeme) {
            self.pos += 1;
            return;
        }

        let mut end = start + 1;
        if first.kind == TokenKind::LineComment && !is_trailing_doc_comment(first.lexeme) {
            let prefix = &first.lexeme[..3];
            let mut line = self.line_index.location(first.span.start).line;
            while let Some(next) = self.tokens.get(end) {
                let next_line = self.line_index.location(next.span.start).line;
                let continues = next.kind == TokenKind::LineComment
                    && next.lexeme.starts_with(prefix)
                    && is_doc_comment(next.lexeme)
                    && !is_trailing_doc_comment(next.lexeme)
                    && next_line == line + 1;
                if !continues {
                    break;
                }
                line = next_line;
                end += 1;
            }
        }
        self.pos = end;

        let location = self.line_index.location(first.span.start);
        let mut comment = SourceComment::from_tokens(self.file, &self.tokens[start..end], location);
        let markup = markup::parse(&comment.body);
        comment.body.clone_from(&markup.body);

        if comment.trailing {
            comment.references_enabled = self.references_enabled();
            self.attach_trailing(comment);
            return;
        }

        self.flush_pending();
        let comment_location = self.location(comment.span);
        let mut enabled = self.references_enabled();
        let mut defined_at = None;

        for command in &markup.commands {
            match &command.kind {
                CommandKind::File => {
                    self.file_marker_seen = true;
                    enabled = true;
                }
                CommandKind::Group { mode, name, title } => {
                    let parent = markup
                        .in_groups()
                        .into_iter()
                        .next()
                        .or_else(|| self.stack.innermost().map(str::to_string))
                        .filter(|p| p != name);
                    if defined_at.is_none() {
                        defined_at = Some(self.items.len());
                    }
                    self.items.push(ScanItem::Group(GroupEvent::Defined(GroupDefinition {
                        name: name.clone(),
                        title: title.clone(),
                        mode: *mode,
                        parent,
                        doc: None,
                        location: comment_location,
                    })));
                    self.last_defined = Some(name.clone());
                }
                CommandKind::Open => {
                    if self.stack.is_aborted() {
                        continue;
                    }
                    let name = match self.last_defined.clone() {
                        Some(name) => {
                            self.stack.open_group(name.clone());
                            Some(name)
                        }
                        None => {
                            self.stack.open_anonymous();
                            None
                        }
                    };
                    enabled |= self.stack.has_open_group();
                    self.items.push(ScanItem::Group(GroupEvent::Opened {
                        name,
                        location: comment_location,
                    }));
                }
                CommandKind::Close => {
                    if self.stack.is_aborted() {
                        continue;
                    }
                    match self.stack.close_group() {
                        Ok(name) => self.items.push(ScanItem::Group(GroupEvent::Closed {
                            name,
                            location: comment_location,
                        })),
                        Err(_) => {
                            tracing::warn!(
                                file = %self.file,
                                line = comment_location.line(),
                                "unmatched group close"
                            );
                            self.diagnostics.push(Diagnostic::new(
                                DiagnosticKind::UnmatchedGroupClose,
                                comment_location,
                            ));
                        }
                    }
                }
                CommandKind::InGroup(_) | CommandKind::Target(_) => {}
            }
        }
        comment.references_enabled = enabled;

        if let Some(index) = defined_at {
            if let Some(ScanItem::Group(GroupEvent::Defined(def))) = self.items.get_mut(index) {
                comment.attachment = Attachment::Group(def.name.clone());
                if !comment.is_blank() {
                    def.doc = Some(comment);
                }
            }
            return;
        }

        if markup.has_file_marker() {
            comment.attachment = Attachment::File;
            if !comment.is_blank() {
                self.items.push(ScanItem::FileDoc(comment));
            }
            return;
        }

        let target = markup.target().cloned();
        if comment.is_blank() && target.is_none() {
            // Pure markup such as `/** @{ */`
            return;
        }
        self.pending = Some(PendingDoc {
            comment,
            target,
            in_groups: markup.in_groups(),
        });
    }

    /// A `/**<` comment documents the entry just before it
    fn attach_trailing(&mut self, comment: SourceComment) {
        if self.pending.is_none() {
            if let Some(ScanItem::Entry(entry)) = self.items.last_mut() {
                if entry.fragment.is_some() && entry.trailing.is_none() {
                    entry.trailing = Some(comment);
                    return;
                }
            }
        }
        self.dangling(comment);
    }

    /// The pending comment saw no declaration
    fn flush_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if pending.target.is_some() {
            let group = self.stack.innermost().map(str::to_string);
            self.items.push(ScanItem::Entry(Entry {
                comment: Some(pending.comment),
                trailing: None,
                target: pending.target,
                in_groups: pending.in_groups,
                fragment: None,
                group,
            }));
        } else {
            self.dangling(pending.comment);
        }
    }

    fn dangling(&mut self, comment: SourceComment) {
        let location = self.location(comment.span);
        self.diagnostics
            .push(Diagnostic::new(DiagnosticKind::DanglingComment, location));
        self.items.push(ScanItem::Loose(comment));
    }

    fn push_entry(&mut self, fragment: Fragment<'src>) {
        let trailing = self.trailing_in_fragment(&fragment);
        let group = self.stack.innermost().map(str::to_string);
        let (comment, target, in_groups) = match self.pending.take() {
            Some(p) => (Some(p.comment), p.target, p.in_groups),
            None => (None, None, Vec::new()),
        };
        self.items.push(ScanItem::Entry(Entry {
            comment,
            trailing,
            target,
            in_groups,
            fragment: Some(fragment),
            group,
        }));
    }

    /// First `/**<` comment at the top level of a fragment
    fn trailing_in_fragment(&self, fragment: &Fragment<'src>) -> Option<SourceComment> {
        let mut depth = 0usize;
        for tok in &fragment.tokens {
            if tok.kind.is_open() {
                depth += 1;
            } else if tok.kind.is_close() {
                depth = depth.saturating_sub(1);
            } else if depth == 0 && tok.kind.is_comment() && is_trailing_doc_comment(tok.lexeme) {
                let location = self.line_index.location(tok.span.start);
                let mut comment =
                    SourceComment::from_tokens(self.file, std::slice::from_ref(tok), location);
                comment.body = markup::parse(&comment.body).body;
                comment.references_enabled = self.references_enabled();
                return Some(comment);
            }
        }
        None
    }

    /// Collect tokens up to the end of the next declaration.
    ///
    /// A fragment ends after a top-level `;`, after the closing brace of a
    /// function body, or before a top-level directive or leading doc comment.
    fn collect_fragment(&mut self) -> Option<Fragment<'src>> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut function_body = false;
        let mut last_code = None;

        while let Some(tok) = self.tokens.get(self.pos).copied() {
            if depth == 0 {
                let stop = match tok.kind {
                    TokenKind::Directive => true,
                    TokenKind::RBrace => self.extern_depth > 0,
                    k if k.is_comment() => {
                        is_doc_comment(tok.lexeme) && !is_trailing_doc_comment(tok.lexeme)
                    }
                    _ => false,
                };
                if stop {
                    break;
                }
            }
            self.pos += 1;
            if tok.kind.is_comment() {
                continue;
            }
            if tok.kind.is_open() {
                if depth == 0 && tok.kind == TokenKind::LBrace {
                    function_body = last_code == Some(TokenKind::RParen);
                }
                depth += 1;
            } else if tok.kind.is_close() {
                depth = depth.saturating_sub(1);
                if depth == 0 && tok.kind == TokenKind::RBrace && function_body {
                    break;
                }
            } else if depth == 0 && tok.kind == TokenKind::Semicolon {
                break;
            }
            last_code = Some(tok.kind);
        }

        if self.pos == start {
            self.pos += 1;
            return None;
        }
        Some(Fragment::new(self.tokens[start..self.pos].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries<'a>(scanned: &'a ScannedFile<'_>) -> Vec<&'a Entry<'a>> {
        scanned
            .items
            .iter()
            .filter_map(|item| match item {
                ScanItem::Entry(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    fn fragment_text(entry: &Entry<'_>) -> String {
        entry
            .fragment
            .as_ref()
            .map(|f| f.code().map(|t| t.lexeme).collect::<Vec<_>>().join(" "))
            .unwrap_or_default()
    }

    #[test]
    fn test_comment_pairs_with_next_declaration() {
        let source = "/** Sum two numbers. */\nint sum(int a, int b);\nint undocumented(void);\n";
        let scanned = scan(FileId(0), source);
        let entries = entries(&scanned);
        assert_eq!(entries.len(), 2);
        assert_eq!(fragment_text(entries[0]), "int sum ( int a , int b ) ;");
        assert!(entries[0].is_documented());
        assert!(!entries[1].is_documented());
        assert!(scanned.diagnostics.is_empty());
    }

    #[test]
    fn test_function_body_ends_fragment() {
        let source = "/** One. */\nstatic int one(void) { return 1; }\n/** Two. */\nint two;";
        let scanned = scan(FileId(0), source);
        let entries = entries(&scanned);
        assert_eq!(entries.len(), 2);
        assert!(fragment_text(entries[0]).ends_with('}'));
        assert_eq!(fragment_text(entries[1]), "int two ;");
    }

    #[test]
    fn test_struct_body_runs_to_semicolon() {
        let source = "/** A pair. */\nstruct pair {\n  int a; /**< first */\n  int b;\n};\n";
        let scanned = scan(FileId(0), source);
        let entries = entries(&scanned);
        assert_eq!(entries.len(), 1);
        assert!(fragment_text(entries[0]).ends_with("} ;"));
        assert!(entries[0].trailing.is_none());
    }

    #[test]
    fn test_trailing_comment_attaches_backwards() {
        let source = "int width; /**< In pixels. */\n";
        let scanned = scan(FileId(0), source);
        let entries = entries(&scanned);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].trailing.as_ref().unwrap().body, "In pixels.");
    }

    #[test]
    fn test_dangling_comment() {
        let source = "/** First. */\n/** Second. */\nint x;\n";
        let scanned = scan(FileId(0), source);
        assert_eq!(scanned.diagnostics.len(), 1);
        assert_eq!(scanned.diagnostics[0].kind, DiagnosticKind::DanglingComment);
        assert_eq!(scanned.diagnostics[0].location.line(), 1);
        assert!(matches!(scanned.items[0], ScanItem::Loose(_)));
        let entries = entries(&scanned);
        assert_eq!(entries[0].comment.as_ref().unwrap().body, "Second.");
    }

    #[test]
    fn test_groups_and_reference_regions() {
        let source = "\
/** @defgroup init Setup
 * @{
 */
/** Start. */
int start(void);
/** @} */
/** Later. */
int later(void);
";
        let scanned = scan(FileId(0), source);
        let def = scanned.items.iter().find_map(|item| match item {
            ScanItem::Group(GroupEvent::Defined(def)) => Some(def),
            _ => None,
        });
        assert_eq!(def.unwrap().title.as_deref(), Some("Setup"));

        let entries = entries(&scanned);
        assert_eq!(entries[0].group.as_deref(), Some("init"));
        assert!(entries[0].comment.as_ref().unwrap().references_enabled);
        assert_eq!(entries[1].group, None);
        assert!(!entries[1].comment.as_ref().unwrap().references_enabled);
        assert!(scanned.diagnostics.is_empty());
    }

    #[test]
    fn test_file_marker_enables_references() {
        let source = "/** @file\n * Cluster API.\n */\n/** Go. */\nint go(void);\n";
        let scanned = scan(FileId(0), source);
        assert!(scanned.has_file_marker);
        assert!(matches!(scanned.items[0], ScanItem::FileDoc(_)));
        let entries = entries(&scanned);
        assert!(entries[0].comment.as_ref().unwrap().references_enabled);
    }

    #[test]
    fn test_unbalanced_groups() {
        let source = "/** @} */\nint a;\n/** @defgroup g G\n@{ */\nint b;\n";
        let scanned = scan(FileId(0), source);
        let kinds: Vec<_> = scanned.diagnostics.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(kinds, vec![DiagnosticKind::UnmatchedGroupClose]);
        // Tracking stopped at the unmatched close
        assert!(entries(&scanned).iter().all(|e| e.group.is_none()));

        let scanned = scan(FileId(0), "/** @defgroup g G\n@{ */\nint b;\n");
        assert_eq!(
            scanned.diagnostics[0].kind,
            DiagnosticKind::UnclosedGroup("g".into())
        );
    }

    #[test]
    fn test_bare_open_reuses_last_defined_group() {
        let source = "/** @defgroup io I/O */\n/** @{ */\n/** Read. */\nint rd(void);\n/** @} */\n/** @{ */\n/** Write. */\nint wr(void);\n/** @} */\n";
        let scanned = scan(FileId(0), source);
        let groups: Vec<_> = entries(&scanned).iter().map(|e| e.group.clone()).collect();
        assert_eq!(groups, vec![Some("io".to_string()), Some("io".to_string())]);
        assert!(scanned.diagnostics.is_empty());
    }

    #[test]
    fn test_extern_c_is_transparent() {
        let source = "#ifdef __cplusplus\nextern \"C\" {\n#endif\n/** Go. */\nint go(void);\n#ifdef __cplusplus\n}\n#endif\n";
        let scanned = scan(FileId(0), source);
        let documented: Vec<_> = entries(&scanned)
            .into_iter()
            .filter(|e| e.is_documented())
            .collect();
        assert_eq!(documented.len(), 1);
        assert_eq!(fragment_text(documented[0]), "int go ( void ) ;");
    }

    #[test]
    fn test_triple_slash_run_is_one_comment() {
        let source = "/// Line one.\n/// Line two.\nint x;\n";
        let scanned = scan(FileId(0), source);
        let entries = entries(&scanned);
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].comment.as_ref().unwrap().body,
            "Line one.\nLine two."
        );
    }

    #[test]
    fn test_explicit_target_without_code() {
        let source = "/** @typedef cb_t\n * Callback.\n */\n";
        let scanned = scan(FileId(0), source);
        let entries = entries(&scanned);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].fragment.is_none());
        assert_eq!(entries[0].target.as_ref().unwrap().name(), Some("cb_t"));
        assert!(scanned.diagnostics.is_empty());
    }

    #[test]
    fn test_lexer_errors_become_diagnostics() {
        let scanned = scan(FileId(0), "int \u{1} x;");
        assert_eq!(
            scanned.diagnostics[0].kind,
            DiagnosticKind::UnexpectedCharacter('\u{1}')
        );
    }
}
