//! Declaration parser for C header fragments
//!
//! The parser classifies one fragment from the scanner at a time. It is a
//! recognizer, not a C compiler: it knows prototypes and definitions,
//! structs and unions with their members, enums, typedefs (function
//! pointers included), `#define` macros and plain variables. Anything else
//! comes back as [`DeclKind::Unrecognized`], never as an error.

mod declaration;

pub use declaration::{DeclKind, Declaration, Member, Param};

use crate::doc::Documentation;
use crate::lexer::{FileId, Lexer, LineIndex, SourceLocation, Span, Token, TokenKind};
use crate::scanner::{
    is_doc_comment, is_trailing_doc_comment, parse_markup, DocTarget, Fragment, SourceComment,
    TargetKind,
};

/// Words that can end a type but never name a declaration
const TYPE_WORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "const",
    "volatile", "restrict", "_Bool", "_Complex", "bool",
];

/// Storage and linkage words skipped before classifying a fragment
const SPECIFIERS: &[&str] = &["static", "inline", "__inline", "__inline__", "__extension__"];

fn is_type_word(tok: &Token<'_>) -> bool {
    tok.kind == TokenKind::Ident && TYPE_WORDS.contains(&tok.lexeme)
}

/// Name, kind and signature of a classified fragment
struct Parsed {
    name: Option<String>,
    kind: DeclKind,
    signature: String,
}

impl Parsed {
    fn unrecognized(signature: String) -> Self {
        Self {
            name: None,
            kind: DeclKind::Unrecognized,
            signature,
        }
    }
}

/// Parses fragments of one file
pub struct DeclParser<'a> {
    file: FileId,
    line_index: &'a LineIndex,
    autobrief: bool,
}

impl<'a> DeclParser<'a> {
    #[must_use]
    pub fn new(file: FileId, line_index: &'a LineIndex, autobrief: bool) -> Self {
        Self {
            file,
            line_index,
            autobrief,
        }
    }

    fn location(&self, span: Span) -> SourceLocation {
        SourceLocation::new(self.file, span, self.line_index.location(span.start))
    }

    /// Classify a fragment
    #[must_use]
    pub fn parse(&self, fragment: &Fragment<'_>) -> Declaration {
        let code: Vec<Token<'_>> = fragment.code().copied().collect();
        let span = code
            .first()
            .map_or(fragment.span, |t| Span::new(t.span.start, fragment.span.end));
        let parsed = self.classify(&fragment.tokens, &code);
        Declaration {
            name: parsed.name,
            kind: parsed.kind,
            signature: parsed.signature,
            location: self.location(span),
            doc: None,
        }
    }

    /// Build a declaration from an explicit `@struct`/`@fn`/... command
    #[must_use]
    pub fn parse_target(&self, target: &DocTarget, location: SourceLocation) -> Declaration {
        let name = target.name().map(str::to_string);
        let text = target.text.trim();
        let keyword_signature = |kw: &str| match &name {
            Some(name) => format!("{kw} {name}"),
            None => kw.to_string(),
        };

        let parsed = match target.kind {
            TargetKind::Struct | TargetKind::Union => Parsed {
                name: name.clone(),
                kind: DeclKind::Struct {
                    is_union: target.kind == TargetKind::Union,
                    members: Vec::new(),
                },
                signature: keyword_signature(if target.kind == TargetKind::Union {
                    "union"
                } else {
                    "struct"
                }),
            },
            TargetKind::Enum => Parsed {
                name: name.clone(),
                kind: DeclKind::Enum {
                    enumerators: Vec::new(),
                },
                signature: keyword_signature("enum"),
            },
            TargetKind::Macro => parse_directive(&format!("#define {text}")),
            TargetKind::Function | TargetKind::Typedef | TargetKind::Variable => {
                let source = if target.kind == TargetKind::Typedef && !text.starts_with("typedef") {
                    format!("typedef {text};")
                } else {
                    format!("{text};")
                };
                let (tokens, _) = Lexer::tokenize(&source);
                let code: Vec<Token<'_>> =
                    tokens.iter().filter(|t| !t.kind.is_comment()).copied().collect();
                let parsed = self.classify(&tokens, &code);
                let fits = matches!(
                    (target.kind, &parsed.kind),
                    (TargetKind::Function, DeclKind::Function { .. })
                        | (TargetKind::Typedef, DeclKind::Typedef { .. })
                        | (TargetKind::Variable, DeclKind::Variable { .. })
                );
                if fits && parsed.name.is_some() {
                    parsed
                } else {
                    let kind = match target.kind {
                        TargetKind::Function => DeclKind::Function {
                            return_type: String::new(),
                            params: Vec::new(),
                            variadic: false,
                            is_definition: false,
                        },
                        TargetKind::Typedef => DeclKind::Typedef {
                            target: String::new(),
                        },
                        _ => DeclKind::Variable { ty: String::new() },
                    };
                    Parsed {
                        name: name.clone(),
                        kind,
                        signature: text.to_string(),
                    }
                }
            }
        };

        Declaration {
            name: parsed.name.or(name),
            kind: parsed.kind,
            signature: parsed.signature,
            location,
            doc: None,
        }
    }

    fn classify(&self, all: &[Token<'_>], code: &[Token<'_>]) -> Parsed {
        let Some(first) = code.first() else {
            return Parsed::unrecognized(String::new());
        };
        if first.kind == TokenKind::Directive {
            return parse_directive(first.lexeme);
        }

        let body = strip_specifiers(code);
        let body = match body.last() {
            Some(t) if t.kind == TokenKind::Semicolon => &body[..body.len() - 1],
            _ => body,
        };
        match body.first().map(|t| t.kind) {
            Some(TokenKind::Typedef) => parse_typedef(body),
            Some(TokenKind::Struct | TokenKind::Union) => self
                .parse_struct(all, body)
                .unwrap_or_else(|| parse_function_or_variable(body)),
            Some(TokenKind::Enum) => {
                parse_enum(body).unwrap_or_else(|| parse_function_or_variable(body))
            }
            Some(_) => parse_function_or_variable(body),
            None => Parsed::unrecognized(render(code, None, true)),
        }
    }

    /// `struct name { ... }`, `struct name;` or `struct { ... }`
    fn parse_struct(&self, all: &[Token<'_>], body: &[Token<'_>]) -> Option<Parsed> {
        let is_union = body[0].kind == TokenKind::Union;
        let keyword = if is_union { "union" } else { "struct" };
        let (name, open) = match body.get(1) {
            Some(t) if t.kind == TokenKind::Ident => (Some(t.lexeme.to_string()), 2),
            Some(t) if t.kind == TokenKind::LBrace => (None, 1),
            _ => return None,
        };

        let members = match body.get(open) {
            None if name.is_some() => Vec::new(),
            Some(brace) if brace.kind == TokenKind::LBrace => {
                let start = all.iter().position(|t| t.span == brace.span)?;
                let end = matching_close(all, start)?;
                self.parse_members(&all[start + 1..end])
            }
            _ => return None,
        };

        let signature = match &name {
            Some(name) => format!("{keyword} {name}"),
            None => keyword.to_string(),
        };
        Some(Parsed {
            name,
            kind: DeclKind::Struct { is_union, members },
            signature,
        })
    }

    /// Members of a struct body, comments included
    fn parse_members(&self, tokens: &[Token<'_>]) -> Vec<Member> {
        let mut members: Vec<Member> = Vec::new();
        let mut statement: Vec<Token<'_>> = Vec::new();
        let mut leading: Option<SourceComment> = None;
        let mut trailing: Option<SourceComment> = None;
        let mut last_batch = 0..0;
        let mut depth = 0usize;

        for tok in tokens {
            if tok.kind.is_comment() {
                if depth > 0 || !is_doc_comment(tok.lexeme) {
                    continue;
                }
                let comment = self.member_comment(tok);
                if !is_trailing_doc_comment(tok.lexeme) {
                    leading = Some(comment);
                } else if statement.is_empty() {
                    let documentation = Documentation::parse(comment, self.autobrief);
                    for member in &mut members[last_batch.clone()] {
                        if member.doc.is_none() {
                            member.doc = Some(documentation.clone());
                        }
                    }
                } else {
                    trailing = Some(comment);
                }
                continue;
            }

            if tok.kind.is_open() {
                depth += 1;
            } else if tok.kind.is_close() {
                depth = depth.saturating_sub(1);
            } else if depth == 0 && tok.kind == TokenKind::Semicolon {
                let location = match statement.first() {
                    Some(first) => self.location(Span::new(first.span.start, tok.span.end)),
                    None => continue,
                };
                let doc = leading
                    .take()
                    .or_else(|| trailing.take())
                    .map(|c| Documentation::parse(c, self.autobrief));
                let start = members.len();
                for (name, ty) in member_declarators(&statement) {
                    members.push(Member {
                        name,
                        ty,
                        doc: doc.clone(),
                        location,
                    });
                }
                last_batch = start..members.len();
                statement.clear();
                continue;
            }
            statement.push(*tok);
        }
        members
    }

    fn member_comment(&self, tok: &Token<'_>) -> SourceComment {
        let location = self.line_index.location(tok.span.start);
        let mut comment = SourceComment::from_tokens(self.file, std::slice::from_ref(tok), location);
        comment.body = parse_markup(&comment.body).body;
        comment
    }
}

/// Skip `extern`, `extern "C"`, `static`, `inline` and similar
fn strip_specifiers<'t, 'src>(mut tokens: &'t [Token<'src>]) -> &'t [Token<'src>] {
    loop {
        match tokens.first() {
            Some(t) if t.kind == TokenKind::Extern => {
                tokens = &tokens[1..];
                if tokens.first().is_some_and(|t| t.kind == TokenKind::StringLit) {
                    tokens = &tokens[1..];
                }
            }
            Some(t) if t.kind == TokenKind::Ident && SPECIFIERS.contains(&t.lexeme) => {
                tokens = &tokens[1..];
            }
            _ => return tokens,
        }
    }
}

/// Index of the bracket closing the one at `open`
fn matching_close(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        if tok.kind.is_open() {
            depth += 1;
        } else if tok.kind.is_close() {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// First index of `kind` outside any brackets
fn find_top_level(tokens: &[Token<'_>], kind: TokenKind) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate() {
        if depth == 0 && tok.kind == kind {
            return Some(i);
        }
        if tok.kind.is_open() {
            depth += 1;
        } else if tok.kind.is_close() {
            depth = depth.saturating_sub(1);
        }
    }
    None
}

/// Split on `sep` outside any brackets
fn split_top_level<'t, 'src>(tokens: &'t [Token<'src>], sep: TokenKind) -> Vec<&'t [Token<'src>]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind.is_open() {
            depth += 1;
        } else if tok.kind.is_close() {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tok.kind == sep {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// Index of the name in a declarator such as `char *buf`, `int a[4]` or
/// `void (*cb)(int)`.
///
/// With `needs_type`, a lone name is not accepted, so `int` or
/// `struct foo` as an unnamed parameter yields `None`.
fn declarator_name(tokens: &[Token<'_>], needs_type: bool) -> Option<usize> {
    if let Some(i) = tokens.windows(3).position(|w| {
        w[0].kind == TokenKind::LParen && w[1].kind == TokenKind::Star && w[2].kind == TokenKind::Ident
    }) {
        return Some(i + 2);
    }

    let mut depth = 0usize;
    let mut candidate = None;
    for (i, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::LBracket if depth == 0 => break,
            TokenKind::Colon | TokenKind::Eq if depth == 0 => break,
            k if k.is_open() => depth += 1,
            k if k.is_close() => depth = depth.saturating_sub(1),
            TokenKind::Ident if depth == 0 => candidate = Some(i),
            _ => {}
        }
    }

    let i = candidate?;
    if is_type_word(&tokens[i]) {
        return None;
    }
    if needs_type {
        let before = tokens[..i].last()?;
        if matches!(
            before.kind,
            TokenKind::Struct | TokenKind::Union | TokenKind::Enum
        ) {
            return None;
        }
    }
    Some(i)
}

/// Rebuild declaration text from tokens.
///
/// Tokens that were separated by whitespace get one space; `skip` drops
/// one token (a declarator name); `elide` replaces brace bodies with
/// `{ ... }`.
fn render(tokens: &[Token<'_>], skip: Option<usize>, elide: bool) -> String {
    let mut out = String::new();
    let mut prev_end: Option<u32> = None;
    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i];
        if Some(i) == skip || tok.kind.is_comment() {
            i += 1;
            continue;
        }
        if let Some(end) = prev_end {
            if end < tok.span.start && !out.ends_with(' ') {
                out.push(' ');
            }
        }
        if elide && tok.kind == TokenKind::LBrace {
            if let Some(close) = matching_close(tokens, i) {
                out.push_str("{ ... }");
                prev_end = Some(tokens[close].span.end);
                i = close + 1;
                continue;
            }
        }
        out.push_str(tok.lexeme);
        prev_end = Some(tok.span.end);
        i += 1;
    }
    out.trim().to_string()
}

fn parse_typedef(body: &[Token<'_>]) -> Parsed {
    let signature = render(body, None, true);
    let rest = &body[1..];
    match declarator_name(rest, true) {
        Some(i) => Parsed {
            name: Some(rest[i].lexeme.to_string()),
            kind: DeclKind::Typedef {
                target: render(rest, Some(i), true),
            },
            signature,
        },
        None => Parsed::unrecognized(signature),
    }
}

/// `enum name { A, B = 2 }` or `enum name;`
fn parse_enum(body: &[Token<'_>]) -> Option<Parsed> {
    let (name, open) = match body.get(1) {
        Some(t) if t.kind == TokenKind::Ident => (Some(t.lexeme.to_string()), 2),
        Some(t) if t.kind == TokenKind::LBrace => (None, 1),
        _ => return None,
    };
    let enumerators = match body.get(open) {
        None if name.is_some() => Vec::new(),
        Some(t) if t.kind == TokenKind::LBrace => {
            let close = matching_close(body, open)?;
            split_top_level(&body[open + 1..close], TokenKind::Comma)
                .into_iter()
                .filter_map(|part| part.first())
                .filter(|t| t.kind == TokenKind::Ident)
                .map(|t| t.lexeme.to_string())
                .collect()
        }
        _ => return None,
    };
    let signature = match &name {
        Some(name) => format!("enum {name}"),
        None => "enum".to_string(),
    };
    Some(Parsed {
        name,
        kind: DeclKind::Enum { enumerators },
        signature,
    })
}

fn parse_function_or_variable(body: &[Token<'_>]) -> Parsed {
    let paren = find_top_level(body, TokenKind::LParen);
    let assign = find_top_level(body, TokenKind::Eq);
    let Some(p) = paren.filter(|&p| assign.map_or(true, |e| p < e)) else {
        return parse_variable(body);
    };
    if body.get(p + 1).is_some_and(|t| t.kind == TokenKind::Star) {
        // `void (*handler)(int)`
        return parse_variable(body);
    }

    let unrecognized = || Parsed::unrecognized(render(body, None, true));
    let Some(name_tok) = p.checked_sub(1).map(|i| body[i]) else {
        return unrecognized();
    };
    if name_tok.kind != TokenKind::Ident || is_type_word(&name_tok) {
        return unrecognized();
    }
    let mut name_start = p - 1;
    while name_start >= 2
        && body[name_start - 1].kind == TokenKind::ColonColon
        && body[name_start - 2].kind == TokenKind::Ident
    {
        name_start -= 2;
    }
    if name_start == 0 {
        // No return type: a macro invocation such as `DECLARE(foo);`
        return unrecognized();
    }
    let Some(close) = matching_close(body, p) else {
        return unrecognized();
    };

    let name: String = body[name_start..p].iter().map(|t| t.lexeme).collect();
    let (params, variadic) = parse_params(&body[p + 1..close]);
    Parsed {
        name: Some(name),
        kind: DeclKind::Function {
            return_type: render(&body[..name_start], None, false),
            params,
            variadic,
            is_definition: body[close + 1..].iter().any(|t| t.kind == TokenKind::LBrace),
        },
        signature: render(&body[..=close], None, false),
    }
}

fn parse_variable(body: &[Token<'_>]) -> Parsed {
    let signature = render(body, None, true);
    match declarator_name(body, true) {
        Some(i) if i > 0 => Parsed {
            name: Some(body[i].lexeme.to_string()),
            kind: DeclKind::Variable {
                ty: render(declarator_tokens(body), Some(i), true),
            },
            signature,
        },
        _ => Parsed::unrecognized(signature),
    }
}

/// Declarator tokens without an initializer
fn declarator_tokens<'t, 'src>(tokens: &'t [Token<'src>]) -> &'t [Token<'src>] {
    match find_top_level(tokens, TokenKind::Eq) {
        Some(e) => &tokens[..e],
        None => tokens,
    }
}

/// Parameters and whether the list ends in `...`
fn parse_params(tokens: &[Token<'_>]) -> (Vec<Param>, bool) {
    if tokens.is_empty() || (tokens.len() == 1 && tokens[0].is_ident("void")) {
        return (Vec::new(), false);
    }
    let mut params = Vec::new();
    let mut variadic = false;
    for part in split_top_level(tokens, TokenKind::Comma) {
        if !part.is_empty() && part.iter().all(|t| t.lexeme == ".") {
            variadic = true;
            continue;
        }
        let name = declarator_name(part, true);
        params.push(Param {
            name: name.map(|i| part[i].lexeme.to_string()),
            ty: render(part, name, false),
        });
    }
    (params, variadic)
}

/// `(name, type)` for each declarator of a member statement
fn member_declarators(statement: &[Token<'_>]) -> Vec<(String, String)> {
    let parts = split_top_level(statement, TokenKind::Comma);
    let Some(first) = parts.first() else {
        return Vec::new();
    };
    let Some(i) = declarator_name(first, true) else {
        return Vec::new();
    };

    let base = render(&first[..i], None, true);
    let base = base.trim_end_matches(|c| c == '*' || c == ' ').to_string();
    let mut out = vec![(first[i].lexeme.to_string(), render(first, Some(i), true))];
    for part in &parts[1..] {
        if let Some(j) = declarator_name(part, false) {
            let rest = render(part, Some(j), true);
            let ty = if rest.is_empty() {
                base.clone()
            } else {
                format!("{base} {rest}")
            };
            out.push((part[j].lexeme.to_string(), ty));
        }
    }
    out
}

/// Remove `/* */` and `//` comments from directive text
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |end| &after[end + 2..]);
            out.push(' ');
        } else if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |end| &after[end..]);
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out
}

/// `#define NAME`, `#define NAME(a, b) body`; other directives are unrecognized
fn parse_directive(text: &str) -> Parsed {
    let text = strip_comments(text)
        .replace("\\\r\n", " ")
        .replace("\\\n", " ");
    let rest = text.trim().trim_start_matches('#').trim_start();
    let unrecognized = || Parsed::unrecognized(rest.split_whitespace().collect::<Vec<_>>().join(" "));

    let Some(def) = rest.strip_prefix("define") else {
        return unrecognized();
    };
    if !def.starts_with(char::is_whitespace) {
        return unrecognized();
    }
    let def = def.trim_start();
    let name_len = def
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(def.len());
    if name_len == 0 {
        return unrecognized();
    }
    let name = &def[..name_len];
    let after = &def[name_len..];

    let (params, body, signature) = match after.strip_prefix('(') {
        Some(list) => {
            let Some(close) = list.find(')') else {
                return unrecognized();
            };
            let params: Vec<String> = list[..close]
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            let signature = format!("#define {name}({})", params.join(", "));
            (Some(params), &list[close + 1..], signature)
        }
        None => (None, after, format!("#define {name}")),
    };

    Parsed {
        name: Some(name.to_string()),
        kind: DeclKind::Macro {
            params,
            body: body.split_whitespace().collect::<Vec<_>>().join(" "),
        },
        signature,
    }
}
