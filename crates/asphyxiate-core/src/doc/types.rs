//! Types for representing parsed documentation comments
//!
//! A [`DocComment`] does not copy text out of the comment. Every field is a
//! byte range into the comment body, so later passes can find references
//! and report them at their exact source position.

use serde::Serialize;

use crate::lexer::Span;
use crate::scanner::SourceComment;

/// Parsed documentation comment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocComment {
    /// Brief summary: `@brief`, or the first sentence of the first paragraph
    pub brief: Option<Span>,
    /// Remaining paragraphs
    pub details: Vec<Span>,
    /// `@param` blocks, in written order
    pub params: Vec<ParamDoc>,
    /// `@return` / `@returns` / `@retval` blocks
    pub returns: Vec<Span>,
    /// Other tagged blocks such as `@note` and `@see`
    pub sections: Vec<DocSection>,
}

/// Documentation for one parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamDoc {
    pub name: String,
    pub direction: Option<ParamDirection>,
    /// Range of the parameter name
    pub name_span: Span,
    /// Range of the description (may be empty)
    pub text: Span,
}

/// `@param[in]`, `@param[out]`, `@param[in,out]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamDirection {
    In,
    Out,
    InOut,
}

/// A tagged block other than brief, param and return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocSection {
    pub kind: SectionKind,
    pub text: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SectionKind {
    Note,
    Warning,
    Pre,
    Post,
    See,
    Deprecated,
    Since,
    Bug,
    Todo,
}

impl SectionKind {
    /// Heading a renderer would show
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Note => "Note",
            Self::Warning => "Warning",
            Self::Pre => "Precondition",
            Self::Post => "Postcondition",
            Self::See => "See also",
            Self::Deprecated => "Deprecated",
            Self::Since => "Since",
            Self::Bug => "Bug",
            Self::Todo => "Todo",
        }
    }
}

/// Block being accumulated
#[derive(Debug, Clone, PartialEq)]
enum Block {
    Paragraph,
    Brief,
    Param {
        name: String,
        direction: Option<ParamDirection>,
        name_span: Span,
    },
    Returns,
    Section(SectionKind),
}

enum Tag {
    Brief,
    Param,
    Returns,
    Section(SectionKind),
}

fn parse_tag(word: &str) -> Option<Tag> {
    let tag = match word {
        "brief" | "short" => Tag::Brief,
        "param" => Tag::Param,
        "return" | "returns" | "result" | "retval" => Tag::Returns,
        "note" | "remark" | "remarks" => Tag::Section(SectionKind::Note),
        "warning" | "attention" => Tag::Section(SectionKind::Warning),
        "pre" => Tag::Section(SectionKind::Pre),
        "post" => Tag::Section(SectionKind::Post),
        "see" | "sa" => Tag::Section(SectionKind::See),
        "deprecated" => Tag::Section(SectionKind::Deprecated),
        "since" => Tag::Section(SectionKind::Since),
        "bug" => Tag::Section(SectionKind::Bug),
        "todo" => Tag::Section(SectionKind::Todo),
        _ => return None,
    };
    Some(tag)
}

impl DocComment {
    /// Parse a cleaned comment body.
    ///
    /// With `autobrief`, a comment without `@brief` takes its brief from the
    /// first sentence; otherwise the whole first paragraph is the brief.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn parse(body: &str, autobrief: bool) -> Self {
        let mut parser = BodyParser {
            body,
            doc: Self::default(),
            paragraphs: Vec::new(),
            current: None,
        };

        let mut offset = 0usize;
        for line in body.split('\n') {
            let line_start = offset;
            let line_end = offset + line.len();
            offset = line_end + 1;

            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                parser.close();
                continue;
            }
            let lead = line_start + (line.len() - trimmed.len());

            if let Some((tag, after)) = leading_tag(trimmed) {
                parser.close();
                parser.open_tag(tag, lead + after, line_end);
                continue;
            }

            match &mut parser.current {
                Some((_, _, end)) => *end = line_end,
                None => parser.current = Some((Block::Paragraph, lead, line_end)),
            }
        }
        parser.close();
        parser.finish(autobrief)
    }

    /// Check if the doc comment carries no text at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.brief.is_none()
            && self.details.is_empty()
            && self.params.is_empty()
            && self.returns.is_empty()
            && self.sections.is_empty()
    }

    /// Documentation of the named parameter
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamDoc> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// A tag at the start of a line, with the offset just past it
fn leading_tag(line: &str) -> Option<(Tag, usize)> {
    let rest = line.strip_prefix('@').or_else(|| line.strip_prefix('\\'))?;
    let word_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let tag = parse_tag(&rest[..word_len])?;
    Some((tag, 1 + word_len))
}

struct BodyParser<'a> {
    body: &'a str,
    doc: DocComment,
    paragraphs: Vec<Span>,
    /// Block kind, start and end offsets
    current: Option<(Block, usize, usize)>,
}

impl BodyParser<'_> {
    fn open_tag(&mut self, tag: Tag, start: usize, line_end: usize) {
        let block = match tag {
            Tag::Brief => Block::Brief,
            Tag::Returns => Block::Returns,
            Tag::Section(kind) => Block::Section(kind),
            Tag::Param => {
                let (direction, name, name_span, text_start) =
                    parse_param_head(self.body, start, line_end);
                self.current = Some((
                    Block::Param {
                        name,
                        direction,
                        name_span,
                    },
                    text_start,
                    line_end,
                ));
                return;
            }
        };
        self.current = Some((block, start, line_end));
    }

    fn close(&mut self) {
        let Some((block, start, end)) = self.current.take() else {
            return;
        };
        let text = trim_span(self.body, start, end.max(start));
        match block {
            Block::Paragraph => {
                if !text.is_empty() {
                    self.paragraphs.push(text);
                }
            }
            Block::Brief => {
                if self.doc.brief.is_none() && !text.is_empty() {
                    self.doc.brief = Some(text);
                }
            }
            Block::Param {
                name,
                direction,
                name_span,
            } => self.doc.params.push(ParamDoc {
                name,
                direction,
                name_span,
                text,
            }),
            Block::Returns => {
                if !text.is_empty() {
                    self.doc.returns.push(text);
                }
            }
            Block::Section(kind) => self.doc.sections.push(DocSection { kind, text }),
        }
    }

    fn finish(mut self, autobrief: bool) -> DocComment {
        let mut paragraphs = self.paragraphs.into_iter();
        if self.doc.brief.is_none() {
            if let Some(first) = paragraphs.next() {
                match autobrief.then(|| split_first_sentence(self.body, first)).flatten() {
                    Some((brief, rest)) => {
                        self.doc.brief = Some(brief);
                        self.doc.details.push(rest);
                    }
                    None => self.doc.brief = Some(first),
                }
            }
        }
        self.doc.details.extend(paragraphs);
        self.doc
    }
}

/// `@param[dir] name` head: direction, name, name range, text start
#[allow(clippy::cast_possible_truncation)]
fn parse_param_head(
    body: &str,
    start: usize,
    line_end: usize,
) -> (Option<ParamDirection>, String, Span, usize) {
    let line = &body[start..line_end];
    let mut cursor = 0;
    let mut direction = None;

    if let Some(rest) = line.strip_prefix('[') {
        if let Some(close) = rest.find(']') {
            let dir: String = rest[..close].chars().filter(|c| !c.is_whitespace()).collect();
            direction = match dir.as_str() {
                "in" => Some(ParamDirection::In),
                "out" => Some(ParamDirection::Out),
                "in,out" | "out,in" | "inout" => Some(ParamDirection::InOut),
                _ => None,
            };
            cursor = close + 2;
        }
    }

    let after = &line[cursor..];
    let skipped = after.len() - after.trim_start().len();
    let name_start = cursor + skipped;
    let name_len = line[name_start..]
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.' || c == ','))
        .unwrap_or(line.len() - name_start);
    let name = line[name_start..name_start + name_len].trim_end_matches(',');
    let name_span = Span::from_range(start + name_start..start + name_start + name.len());
    (
        direction,
        name.to_string(),
        name_span,
        start + name_start + name_len,
    )
}

/// Shrink a range to exclude surrounding whitespace
fn trim_span(body: &str, start: usize, end: usize) -> Span {
    let text = &body[start..end];
    let leading = text.len() - text.trim_start().len();
    let trimmed = text.trim();
    Span::from_range(start + leading..start + leading + trimmed.len())
}

/// Split a paragraph after its first `.` followed by whitespace
fn split_first_sentence(body: &str, paragraph: Span) -> Option<(Span, Span)> {
    let text = &body[paragraph.as_range()];
    let bytes = text.as_bytes();
    let dot = (0..bytes.len().saturating_sub(1))
        .find(|&i| bytes[i] == b'.' && bytes[i + 1].is_ascii_whitespace())?;
    let start = paragraph.start as usize;
    let brief = trim_span(body, start, start + dot + 1);
    let rest = trim_span(body, start + dot + 1, paragraph.end as usize);
    (!rest.is_empty()).then_some((brief, rest))
}

/// A comment together with its parsed structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Documentation {
    pub comment: SourceComment,
    pub doc: DocComment,
}

impl Documentation {
    #[must_use]
    pub fn parse(comment: SourceComment, autobrief: bool) -> Self {
        let doc = DocComment::parse(&comment.body, autobrief);
        Self { comment, doc }
    }

    /// Text of a range of the comment body
    #[must_use]
    pub fn text(&self, span: Span) -> &str {
        self.comment.body.get(span.as_range()).unwrap_or_default()
    }

    /// The brief, as plain text
    #[must_use]
    pub fn brief(&self) -> Option<&str> {
        self.doc.brief.map(|s| self.text(s))
    }
}
