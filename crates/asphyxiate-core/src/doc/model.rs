//! The documentation model handed to renderers
//!
//! Built from a frozen [`Registry`] in one pass that resolves every comment.
//! Symbols, groups and files are resolved independently, so the pass can
//! run on a rayon pool; results are collected in registry order either way.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::diagnostic::Diagnostic;
use crate::group::{Group, GroupId};
use crate::lexer::{FileId, SourceLocation, Span};
use crate::parser::{DeclKind, Declaration};
use crate::registry::{FileRecord, Registry, RegistryError};
use crate::scanner::SourceComment;
use crate::symbol::{Symbol, SymbolId, SymbolKind};

use super::crosslink::{CrossLinker, LinkedText};
use super::types::{Documentation, ParamDirection, SectionKind};

/// A parameter with linked documentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedParam {
    pub name: String,
    pub direction: Option<ParamDirection>,
    pub text: LinkedText,
}

/// A titled section with linked text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSection {
    pub kind: SectionKind,
    pub title: &'static str,
    pub text: LinkedText,
}

/// A documentation comment with every reference resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDoc {
    pub brief: Option<LinkedText>,
    pub details: Vec<LinkedText>,
    pub params: Vec<ResolvedParam>,
    pub returns: Vec<LinkedText>,
    pub sections: Vec<ResolvedSection>,
    pub references_enabled: bool,
    pub location: SourceLocation,
}

/// One declaration of a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclarationDoc {
    pub signature: String,
    pub location: SourceLocation,
    #[serde(flatten)]
    pub kind: DeclKind,
    pub doc: Option<ResolvedDoc>,
}

/// Everything known about one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolDoc {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    /// Stable link target, e.g. `function-rados-connect`
    pub anchor: String,
    /// Group names from the root down; empty for root-level symbols
    pub group_path: Vec<String>,
    /// Ordered by (file, line)
    pub declarations: Vec<DeclarationDoc>,
}

impl SymbolDoc {
    /// Documentation of the first documented declaration
    #[must_use]
    pub fn doc(&self) -> Option<&ResolvedDoc> {
        self.declarations.iter().find_map(|d| d.doc.as_ref())
    }
}

/// A group with its resolved documentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDoc {
    pub id: GroupId,
    pub name: String,
    pub title: Option<String>,
    /// Group names from the root down to this group
    pub path: Vec<String>,
    pub subgroups: Vec<String>,
    pub members: Vec<SymbolId>,
    pub docs: Vec<ResolvedDoc>,
}

/// Symbols of one kind family in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSection {
    pub title: &'static str,
    pub symbols: Vec<SymbolId>,
}

/// Documentation of one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDoc {
    pub id: FileId,
    pub name: String,
    pub has_file_marker: bool,
    /// `@file` documentation
    pub docs: Vec<ResolvedDoc>,
    /// Comments that document nothing
    pub loose: Vec<ResolvedDoc>,
    /// Functions, Defines, Types and Members, in that order; empty ones omitted
    pub sections: Vec<FileSection>,
}

const FILE_SECTIONS: [(&str, &[SymbolKind]); 4] = [
    ("Functions", &[SymbolKind::Function]),
    ("Defines", &[SymbolKind::Macro]),
    ("Types", &[SymbolKind::Struct, SymbolKind::Typedef, SymbolKind::Enum]),
    ("Members", &[SymbolKind::Variable]),
];

/// The resolved documentation of a batch
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DocModel {
    pub symbols: Vec<SymbolDoc>,
    pub groups: Vec<GroupDoc>,
    pub files: Vec<FileDoc>,
    #[serde(skip)]
    by_name: HashMap<String, Vec<usize>>,
}

impl DocModel {
    /// Resolve everything in a frozen registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFrozen`] if registration is still open.
    #[tracing::instrument(level = "debug", skip_all, fields(symbols = registry.symbols().len()))]
    pub fn assemble(
        registry: &Registry,
        autobrief: bool,
        parallel: bool,
    ) -> Result<(Self, Vec<Diagnostic>), RegistryError> {
        let linker = CrossLinker::new(registry)?;
        let resolver = Resolver {
            registry,
            linker,
            autobrief,
        };

        let symbols: Vec<&Symbol> = registry.symbols().iter().collect();
        let groups: Vec<&Group> = registry.groups().iter().collect();
        let files = registry.files();

        let symbols = map_ordered(&symbols, parallel, |s| resolver.symbol(s));
        let groups = map_ordered(&groups, parallel, |g| resolver.group(g));
        let files = map_ordered(files, parallel, |f| resolver.file(f));

        let mut diagnostics = Vec::new();
        let mut model = Self::default();
        for (doc, diags) in symbols {
            model.symbols.push(doc);
            diagnostics.extend(diags);
        }
        for (doc, diags) in groups {
            model.groups.push(doc);
            diagnostics.extend(diags);
        }
        for (doc, diags) in files {
            model.files.push(doc);
            diagnostics.extend(diags);
        }
        for (i, symbol) in model.symbols.iter().enumerate() {
            model.by_name.entry(symbol.name.clone()).or_default().push(i);
        }

        tracing::debug!(diagnostics = diagnostics.len(), "assembled documentation model");
        Ok((model, diagnostics))
    }

    /// All symbols with this qualified name, one per kind
    #[must_use]
    pub fn symbols_named(&self, name: &str) -> Vec<&SymbolDoc> {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(|&i| &self.symbols[i])
            .collect()
    }

    #[must_use]
    pub fn symbol(&self, name: &str, kind: SymbolKind) -> Option<&SymbolDoc> {
        self.symbols_named(name).into_iter().find(|s| s.kind == kind)
    }

    #[must_use]
    pub fn symbol_by_id(&self, id: SymbolId) -> Option<&SymbolDoc> {
        self.symbols.get(id.0 as usize)
    }

    /// Look a group up by its path from the root, e.g. `&["rados", "init"]`
    #[must_use]
    pub fn group(&self, path: &[&str]) -> Option<&GroupDoc> {
        self.groups
            .iter()
            .find(|g| g.path.iter().map(String::as_str).eq(path.iter().copied()))
    }

    #[must_use]
    pub fn group_named(&self, name: &str) -> Option<&GroupDoc> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Documentation of an input file; `None` if it was not in the batch
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&FileDoc> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Serialize the model for an external renderer
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Run `f` over `items` in order, on the current rayon pool if `parallel`
fn map_ordered<T, R, F>(items: &[T], parallel: bool, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if parallel {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}

/// Create an anchor ID from a kind and name
fn make_anchor(kind: SymbolKind, name: &str) -> String {
    let name: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    format!("{kind}-{name}")
}

struct Resolver<'a> {
    registry: &'a Registry,
    linker: CrossLinker<'a>,
    autobrief: bool,
}

impl Resolver<'_> {
    fn resolve_doc(&self, doc: &Documentation, diagnostics: &mut Vec<Diagnostic>) -> ResolvedDoc {
        let comment = &doc.comment;
        let mut link = |span: Span| self.linker.link(comment, span, diagnostics);
        ResolvedDoc {
            brief: doc.doc.brief.map(&mut link),
            details: doc.doc.details.iter().map(|&s| link(s)).collect(),
            params: doc
                .doc
                .params
                .iter()
                .map(|p| ResolvedParam {
                    name: p.name.clone(),
                    direction: p.direction,
                    text: link(p.text),
                })
                .collect(),
            returns: doc.doc.returns.iter().map(|&s| link(s)).collect(),
            sections: doc
                .doc
                .sections
                .iter()
                .map(|s| ResolvedSection {
                    kind: s.kind,
                    title: s.kind.title(),
                    text: link(s.text),
                })
                .collect(),
            references_enabled: comment.references_enabled,
            location: SourceLocation::new(comment.file, comment.span, comment.location),
        }
    }

    fn resolve_comment(&self, comment: &SourceComment, diagnostics: &mut Vec<Diagnostic>) -> ResolvedDoc {
        let doc = Documentation::parse(comment.clone(), self.autobrief);
        self.resolve_doc(&doc, diagnostics)
    }

    fn declaration(&self, decl: &Declaration, diagnostics: &mut Vec<Diagnostic>) -> DeclarationDoc {
        DeclarationDoc {
            signature: decl.signature.clone(),
            location: decl.location,
            kind: decl.kind.clone(),
            doc: decl.doc.as_ref().map(|d| self.resolve_doc(d, diagnostics)),
        }
    }

    fn symbol(&self, symbol: &Symbol) -> (SymbolDoc, Vec<Diagnostic>) {
        tracing::trace!(symbol = %symbol.name, kind = %symbol.kind, "resolving symbol");
        let mut diagnostics = Vec::new();
        let declarations = symbol
            .declarations
            .iter()
            .map(|d| self.declaration(d, &mut diagnostics))
            .collect();
        let group_path = symbol
            .group
            .map(|g| self.registry.groups().path(g))
            .unwrap_or_default();
        let doc = SymbolDoc {
            id: symbol.id,
            name: symbol.name.clone(),
            kind: symbol.kind,
            anchor: make_anchor(symbol.kind, &symbol.name),
            group_path,
            declarations,
        };
        (doc, diagnostics)
    }

    fn group(&self, group: &Group) -> (GroupDoc, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let docs = group
            .docs
            .iter()
            .map(|c| self.resolve_comment(c, &mut diagnostics))
            .collect();
        let doc = GroupDoc {
            id: group.id,
            name: group.name.clone(),
            title: group.title.clone(),
            path: self.registry.groups().path(group.id),
            subgroups: self
                .registry
                .groups()
                .children(group.id)
                .map(|g| g.name.clone())
                .collect(),
            members: group.members.clone(),
            docs,
        };
        (doc, diagnostics)
    }

    fn file(&self, file: &FileRecord) -> (FileDoc, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let docs = file
            .docs
            .iter()
            .map(|c| self.resolve_comment(c, &mut diagnostics))
            .collect();
        let loose = file
            .loose
            .iter()
            .map(|c| self.resolve_comment(c, &mut diagnostics))
            .collect();

        let symbols = self.registry.symbols();
        let sections = FILE_SECTIONS
            .iter()
            .map(|&(title, kinds)| FileSection {
                title,
                symbols: file
                    .symbols
                    .iter()
                    .copied()
                    .filter(|&id| symbols.get(id).is_some_and(|s| kinds.contains(&s.kind)))
                    .collect(),
            })
            .filter(|section| !section.symbols.is_empty())
            .collect();

        let doc = FileDoc {
            id: file.id,
            name: file.name.clone(),
            has_file_marker: file.has_file_marker,
            docs,
            loose,
            sections,
        };
        (doc, diagnostics)
    }
}
