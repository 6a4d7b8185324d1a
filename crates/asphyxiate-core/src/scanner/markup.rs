//! Structural markup commands inside documentation comments
//!
//! Grouping (`@defgroup`, `@{`, `@}`...), the `@file` marker and the
//! explicit-target commands (`@struct`, `@typedef`...) steer the scanner
//! rather than document anything. They are lifted out of the comment body
//! and blanked with spaces, so every other byte keeps its offset.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::lexer::Span;

/// How a grouping command treats an existing group of the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupMode {
    /// `@defgroup`: defines the group; a second definition is a duplicate
    Define,
    /// `@addtogroup`: extends the group, defining it if needed
    Add,
    /// `@weakgroup`: like `@addtogroup`, never overrides a title
    Weak,
}

/// The entity kind named by an explicit-target command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetKind {
    Struct,
    Union,
    Enum,
    Typedef,
    Function,
    Macro,
    Variable,
}

/// `@struct name`, `@fn int f(void)` and friends
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocTarget {
    pub kind: TargetKind,
    /// The command argument, as written
    pub text: String,
}

impl DocTarget {
    /// The name of the entity the command documents
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        let text = self.text.trim();
        match self.kind {
            TargetKind::Struct | TargetKind::Union | TargetKind::Enum | TargetKind::Macro => {
                text.split(|c: char| c.is_whitespace() || c == '(')
                    .find(|w| !w.is_empty())
            }
            TargetKind::Function => {
                let head = text.split('(').next()?;
                last_identifier(head)
            }
            TargetKind::Typedef | TargetKind::Variable => {
                // Function pointer: `void (*name)(int)`
                if let Some(start) = text.find("(*") {
                    let rest = &text[start + 2..];
                    let end = rest.find(')')?;
                    return Some(rest[..end].trim());
                }
                last_identifier(text.trim_end_matches(';'))
            }
        }
    }
}

fn last_identifier(text: &str) -> Option<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == ':'))
        .filter(|w| !w.is_empty())
        .last()
}

/// One recognised command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// `@file`
    File,
    /// `@defgroup`, `@addtogroup`, `@weakgroup`
    Group {
        mode: GroupMode,
        name: String,
        title: Option<String>,
    },
    /// `@ingroup a b`
    InGroup(Vec<String>),
    /// `@{`
    Open,
    /// `@}`
    Close,
    Target(DocTarget),
}

/// A command and where it sat in the comment body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub span: Span,
}

/// The commands lifted from a comment, plus the blanked body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Markup {
    pub commands: Vec<Command>,
    pub body: String,
}

impl Markup {
    /// True if the comment carries a `@file` marker
    #[must_use]
    pub fn has_file_marker(&self) -> bool {
        self.commands.iter().any(|c| c.kind == CommandKind::File)
    }

    /// The first group defined by this comment, if any
    #[must_use]
    pub fn group_definition(&self) -> Option<(&str, Option<&str>, GroupMode)> {
        self.commands.iter().find_map(|c| match &c.kind {
            CommandKind::Group { mode, name, title } => {
                Some((name.as_str(), title.as_deref(), *mode))
            }
            _ => None,
        })
    }

    /// Group names from every `@ingroup` in the comment
    #[must_use]
    pub fn in_groups(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|c| match &c.kind {
                CommandKind::InGroup(names) => Some(names.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// The explicit target, if the comment names one
    #[must_use]
    pub fn target(&self) -> Option<&DocTarget> {
        self.commands.iter().find_map(|c| match &c.kind {
            CommandKind::Target(target) => Some(target),
            _ => None,
        })
    }
}

fn command_regex() -> Option<&'static Regex> {
    static COMMAND: OnceLock<Option<Regex>> = OnceLock::new();
    COMMAND
        .get_or_init(|| {
            Regex::new(
                r"(?m)(?:^|\s)([@\\](?:defgroup|addtogroup|weakgroup|ingroup|file|struct|union|enum|typedef|fn|def|var))\b|([@\\][{}])",
            )
            .map_err(|e| tracing::error!(error = %e, "markup command pattern failed to compile"))
            .ok()
        })
        .as_ref()
}

/// Extract markup commands from a cleaned comment body
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse(body: &str) -> Markup {
    let Some(re) = command_regex() else {
        return Markup {
            commands: Vec::new(),
            body: body.to_string(),
        };
    };

    let mut commands = Vec::new();
    let mut blanks = Vec::new();

    for caps in re.captures_iter(body) {
        if let Some(m) = caps.get(2) {
            let kind = if m.as_str().ends_with('{') {
                CommandKind::Open
            } else {
                CommandKind::Close
            };
            // Text after `@}` is a free-form label, e.g. `@} init`
            let end = if kind == CommandKind::Close {
                line_end(body, m.end())
            } else {
                m.end()
            };
            blanks.push(m.start()..end);
            commands.push(Command {
                kind,
                span: Span::from_range(m.start()..end),
            });
            continue;
        }

        let Some(m) = caps.get(1) else { continue };
        let word = &m.as_str()[1..];
        let args_end = argument_end(body, m.end());
        let args = body[m.end()..args_end].trim();
        blanks.push(m.start()..args_end);

        let kind = match word {
            "file" => CommandKind::File,
            "defgroup" | "addtogroup" | "weakgroup" => {
                let mode = match word {
                    "defgroup" => GroupMode::Define,
                    "addtogroup" => GroupMode::Add,
                    _ => GroupMode::Weak,
                };
                let mut parts = args.splitn(2, char::is_whitespace);
                let Some(name) = parts.next().filter(|n| !n.is_empty()) else {
                    continue;
                };
                let title = parts
                    .next()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string);
                CommandKind::Group {
                    mode,
                    name: name.to_string(),
                    title,
                }
            }
            "ingroup" => CommandKind::InGroup(
                args.split_whitespace().map(str::to_string).collect(),
            ),
            _ => {
                let kind = match word {
                    "struct" => TargetKind::Struct,
                    "union" => TargetKind::Union,
                    "enum" => TargetKind::Enum,
                    "typedef" => TargetKind::Typedef,
                    "fn" => TargetKind::Function,
                    "def" => TargetKind::Macro,
                    _ => TargetKind::Variable,
                };
                CommandKind::Target(DocTarget {
                    kind,
                    text: args.to_string(),
                })
            }
        };
        commands.push(Command {
            kind,
            span: Span::from_range(m.start()..args_end),
        });
    }

    Markup {
        commands,
        body: blank_ranges(body, &blanks),
    }
}

fn line_end(body: &str, from: usize) -> usize {
    body[from..].find('\n').map_or(body.len(), |i| from + i)
}

/// Arguments run to the end of the line or the next `@{`/`@}` on it
fn argument_end(body: &str, from: usize) -> usize {
    let end = line_end(body, from);
    let line = &body[from..end];
    ["@{", "@}", "\\{", "\\}"]
        .iter()
        .filter_map(|marker| line.find(marker))
        .min()
        .map_or(end, |i| from + i)
}

fn blank_ranges(body: &str, ranges: &[std::ops::Range<usize>]) -> String {
    let mut out = String::with_capacity(body.len());
    let mut cursor = 0;
    for range in ranges {
        if range.start < cursor {
            continue;
        }
        out.push_str(&body[cursor..range.start]);
        out.extend(std::iter::repeat(' ').take(range.end - range.start));
        cursor = range.end;
    }
    out.push_str(&body[cursor..]);
    out
}
